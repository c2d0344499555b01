use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{DEFAULT_CATEGORY_ID, DEFAULT_VIDEO_MIMETYPE, WATCH_URL_PREFIX};
use crate::media::Media;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("no video payload was given")]
    MissingVideo,
    #[error("a scheduled publish time requires privacy status 'private' (got '{0}')")]
    ScheduleRequiresPrivate(Visibility),
    #[error("scheduled publish time '{0}' has no UTC offset, e.g. 2025-10-20T02:30:00+09:00")]
    NaivePublishAt(String),
    #[error("invalid scheduled publish time '{0}'")]
    InvalidPublishAt(String),
    #[error("thumbnail bytes were given without a thumbnail mimetype")]
    MissingThumbnailMimetype,
    #[error("unknown privacy status '{0}' (expected public, private or unlisted)")]
    UnknownVisibility(String),
}

/// Publication scope of the uploaded video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
    Unlisted,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Unlisted => "unlisted",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            "unlisted" => Ok(Visibility::Unlisted),
            other => Err(ConfigError::UnknownVisibility(other.to_string())),
        }
    }
}

/// Parse a scheduled publish time. Accepts RFC 3339 and the ISO-8601
/// variant with a space separator; rejects anything without a UTC offset.
pub fn parse_publish_at(s: &str) -> Result<DateTime<FixedOffset>, ConfigError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if NaiveDateTime::parse_from_str(s, fmt).is_ok() {
            return Err(ConfigError::NaivePublishAt(s.to_string()));
        }
    }
    Err(ConfigError::InvalidPublishAt(s.to_string()))
}

/// Render a publish time the way the API expects it, keeping the original offset.
pub fn format_publish_at(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Scheduled publish time as handed to the builder, before offset checks.
#[derive(Debug, Clone)]
enum PublishAt {
    Aware(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
    Text(String),
}

/// Everything needed for one upload. Only obtainable through
/// [`UploadConfigBuilder::build`], so every instance satisfies:
///
/// - a scheduled publish time implies [`Visibility::Private`];
/// - the scheduled publish time carries a UTC offset;
/// - thumbnail bytes always come with a thumbnail mimetype.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    video: Media,
    title: String,
    description: String,
    tags: Vec<String>,
    category_id: String,
    made_for_kids: bool,
    visibility: Visibility,
    publish_at: Option<DateTime<FixedOffset>>,
    thumbnail: Option<Media>,
}

impl UploadConfig {
    pub fn builder(title: impl Into<String>) -> UploadConfigBuilder {
        UploadConfigBuilder::new(title)
    }

    pub fn video(&self) -> &Media {
        &self.video
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn category_id(&self) -> &str {
        &self.category_id
    }

    pub fn made_for_kids(&self) -> bool {
        self.made_for_kids
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn publish_at(&self) -> Option<&DateTime<FixedOffset>> {
        self.publish_at.as_ref()
    }

    pub fn thumbnail(&self) -> Option<&Media> {
        self.thumbnail.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct UploadConfigBuilder {
    video: Option<Media>,
    title: String,
    description: String,
    tags: Vec<String>,
    category_id: String,
    made_for_kids: bool,
    visibility: Visibility,
    publish_at: Option<PublishAt>,
    thumbnail_bytes: Option<Vec<u8>>,
    thumbnail_mimetype: Option<String>,
}

impl UploadConfigBuilder {
    fn new(title: impl Into<String>) -> Self {
        Self {
            video: None,
            title: title.into(),
            description: String::new(),
            tags: Vec::new(),
            category_id: DEFAULT_CATEGORY_ID.to_string(),
            made_for_kids: false,
            visibility: Visibility::default(),
            publish_at: None,
            thumbnail_bytes: None,
            thumbnail_mimetype: None,
        }
    }

    pub fn video_bytes(mut self, data: impl Into<Vec<u8>>, mimetype: impl Into<String>) -> Self {
        self.video = Some(Media::from_bytes(data, mimetype));
        self
    }

    /// Reference a video file. The file is read lazily at upload time.
    pub fn video_file(mut self, path: impl Into<PathBuf>, mimetype: Option<&str>) -> Self {
        let mimetype = mimetype.unwrap_or(DEFAULT_VIDEO_MIMETYPE);
        self.video = Some(Media::from_file(path, mimetype));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn category_id(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = category_id.into();
        self
    }

    pub fn made_for_kids(mut self, made_for_kids: bool) -> Self {
        self.made_for_kids = made_for_kids;
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn publish_at(mut self, at: DateTime<FixedOffset>) -> Self {
        self.publish_at = Some(PublishAt::Aware(at));
        self
    }

    /// A wall-clock time with no offset. Always rejected by [`build`](Self::build).
    pub fn publish_at_naive(mut self, at: NaiveDateTime) -> Self {
        self.publish_at = Some(PublishAt::Naive(at));
        self
    }

    /// Publish time as text, parsed by [`parse_publish_at`] during `build`.
    pub fn publish_at_str(mut self, at: impl Into<String>) -> Self {
        self.publish_at = Some(PublishAt::Text(at.into()));
        self
    }

    pub fn thumbnail_bytes(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.thumbnail_bytes = Some(data.into());
        self
    }

    pub fn thumbnail_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.thumbnail_mimetype = Some(mimetype.into());
        self
    }

    pub fn build(self) -> Result<UploadConfig, ConfigError> {
        if self.title.trim().is_empty() {
            return Err(ConfigError::EmptyTitle);
        }
        let video = self.video.ok_or(ConfigError::MissingVideo)?;

        let publish_at = match self.publish_at {
            None => None,
            Some(PublishAt::Aware(dt)) => Some(dt),
            Some(PublishAt::Naive(naive)) => {
                return Err(ConfigError::NaivePublishAt(naive.to_string()))
            }
            Some(PublishAt::Text(text)) => Some(parse_publish_at(&text)?),
        };
        if publish_at.is_some() && self.visibility != Visibility::Private {
            return Err(ConfigError::ScheduleRequiresPrivate(self.visibility));
        }

        let thumbnail = match (self.thumbnail_bytes, self.thumbnail_mimetype) {
            (Some(data), Some(mimetype)) => Some(Media::from_bytes(data, mimetype)),
            (Some(_), None) => return Err(ConfigError::MissingThumbnailMimetype),
            (None, _) => None,
        };

        Ok(UploadConfig {
            video,
            title: self.title,
            description: self.description,
            tags: self.tags,
            category_id: self.category_id,
            made_for_kids: self.made_for_kids,
            visibility: self.visibility,
            publish_at,
            thumbnail,
        })
    }
}

/// Final response of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub id: String,
    /// The full video resource returned by the API.
    pub response: serde_json::Value,
}

impl UploadResult {
    pub fn watch_url(&self) -> String {
        format!("{WATCH_URL_PREFIX}{}", self.id)
    }
}
