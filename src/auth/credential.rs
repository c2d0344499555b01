use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_TOKEN_URI, TOKEN_EXPIRY_SKEW_SECS, UPLOAD_SCOPE};

/// OAuth2 user credential, stored in Google's "authorized user" JSON layout.
///
/// Treated as an immutable value: a refresh produces a new `Credential`
/// instead of patching this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

fn default_scopes() -> Vec<String> {
    vec![UPLOAD_SCOPE.to_string()]
}

impl Credential {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry - Duration::seconds(TOKEN_EXPIRY_SKEW_SECS) <= now,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Usable as-is: has an access token that has not expired.
    pub fn is_valid(&self) -> bool {
        !self.token.is_empty() && !self.is_expired()
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("cannot parse {}", path.display()))
    }

    /// Overwrite `path` with this credential. Written to a sibling temp
    /// file first so a crash never leaves a half-written token behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("cannot write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("cannot replace {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(expiry: Option<DateTime<Utc>>, refresh: Option<&str>) -> Credential {
        Credential {
            token: "ya29.token".into(),
            refresh_token: refresh.map(Into::into),
            token_uri: DEFAULT_TOKEN_URI.into(),
            client_id: "id".into(),
            client_secret: "secret".into(),
            scopes: default_scopes(),
            expiry,
        }
    }

    #[test]
    fn test_expiry_with_skew() {
        let now = Utc::now();
        assert!(!credential(None, None).is_expired_at(now));
        assert!(!credential(Some(now + Duration::hours(1)), None).is_expired_at(now));
        assert!(credential(Some(now + Duration::seconds(5)), None).is_expired_at(now));
        assert!(credential(Some(now - Duration::hours(1)), None).is_expired_at(now));
    }

    #[test]
    fn test_validity_and_refresh() {
        let fresh = credential(Some(Utc::now() + Duration::hours(1)), None);
        assert!(fresh.is_valid());
        assert!(!fresh.can_refresh());

        let stale = credential(Some(Utc::now() - Duration::hours(1)), Some("1//refresh"));
        assert!(!stale.is_valid());
        assert!(stale.can_refresh());

        let mut blank = fresh.clone();
        blank.token.clear();
        assert!(!blank.is_valid());

        assert!(!credential(None, Some("")).can_refresh());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token.json");
        let cred = credential(Some(Utc::now() + Duration::hours(1)), Some("1//refresh"));

        cred.save(&path).unwrap();
        assert_eq!(Credential::load(&path).unwrap(), cred);
        assert!(!path.with_extension("json.tmp").exists());

        // Overwritten wholesale, not merged
        let other = credential(None, None);
        other.save(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("refresh_token"));
    }

    #[test]
    fn test_load_minimal_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");

        fs::write(&path, r#"{"token": "abc"}"#).unwrap();
        let cred = Credential::load(&path).unwrap();
        assert_eq!(cred.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(cred.scopes, vec![UPLOAD_SCOPE.to_string()]);
        assert!(cred.expiry.is_none());

        fs::write(&path, "not json at all").unwrap();
        assert!(Credential::load(&path).is_err());
    }
}
