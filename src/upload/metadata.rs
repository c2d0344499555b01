use serde::Serialize;
use serde_json::Value;

use crate::models::{format_publish_at, UploadConfig, Visibility};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Snippet<'a> {
    title: &'a str,
    description: &'a str,
    tags: &'a [String],
    category_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    privacy_status: Visibility,
    self_declared_made_for_kids: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    publish_at: Option<String>,
}

#[derive(Serialize)]
struct VideoResource<'a> {
    snippet: Snippet<'a>,
    status: Status,
}

/// Video resource body plus the `part` list naming exactly its top-level keys.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub body: Value,
    pub parts: String,
}

impl VideoMetadata {
    pub fn from_config(config: &UploadConfig) -> Result<Self, serde_json::Error> {
        let resource = VideoResource {
            snippet: Snippet {
                title: config.title(),
                description: config.description(),
                tags: config.tags(),
                category_id: config.category_id(),
            },
            status: Status {
                privacy_status: config.visibility(),
                self_declared_made_for_kids: config.made_for_kids(),
                publish_at: config.publish_at().map(format_publish_at),
            },
        };
        let body = serde_json::to_value(resource)?;
        let parts = match &body {
            Value::Object(map) => map.keys().cloned().collect::<Vec<_>>().join(","),
            _ => String::new(),
        };
        Ok(Self { body, parts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UploadConfig;

    #[test]
    fn test_public_body() {
        let config = UploadConfig::builder("My clip")
            .video_bytes(vec![1u8; 8], "video/mp4")
            .description("desc")
            .tags(["rust", "automation"])
            .category_id("28")
            .visibility(Visibility::Public)
            .build()
            .unwrap();

        let meta = VideoMetadata::from_config(&config).unwrap();

        assert_eq!(
            meta.body,
            serde_json::json!({
                "snippet": {
                    "title": "My clip",
                    "description": "desc",
                    "tags": ["rust", "automation"],
                    "categoryId": "28",
                },
                "status": {
                    "privacyStatus": "public",
                    "selfDeclaredMadeForKids": false,
                },
            })
        );
        let mut parts: Vec<&str> = meta.parts.split(',').collect();
        parts.sort_unstable();
        assert_eq!(parts, vec!["snippet", "status"]);
    }

    #[test]
    fn test_scheduled_publish_is_rendered_with_offset() {
        let config = UploadConfig::builder("Scheduled")
            .video_bytes(vec![1u8; 8], "video/mp4")
            .visibility(Visibility::Private)
            .publish_at_str("2026-01-01T10:00:00+09:00")
            .made_for_kids(true)
            .build()
            .unwrap();

        let meta = VideoMetadata::from_config(&config).unwrap();

        assert_eq!(meta.body["status"]["publishAt"], "2026-01-01T10:00:00+09:00");
        assert_eq!(meta.body["status"]["privacyStatus"], "private");
        assert_eq!(meta.body["status"]["selfDeclaredMadeForKids"], true);
    }

    #[test]
    fn test_publish_at_omitted_when_unset() {
        let config = UploadConfig::builder("Now")
            .video_bytes(vec![1u8; 8], "video/mp4")
            .build()
            .unwrap();

        let meta = VideoMetadata::from_config(&config).unwrap();

        let status = meta.body["status"].as_object().unwrap();
        assert!(!status.contains_key("publishAt"));
        assert_eq!(meta.body["snippet"]["tags"], serde_json::json!([]));
    }
}
