use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use oauth2::basic::BasicClient;
use oauth2::{AuthType, AuthUrl, ClientId, ClientSecret, TokenUrl};
use serde::Deserialize;

use crate::config::{DEFAULT_AUTH_URI, DEFAULT_TOKEN_URI};

/// OAuth client identity downloaded from the Google API console.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The console wraps the identity in an `installed` or `web` section.
#[derive(Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn from_json(text: &str) -> Result<Self> {
        let file: SecretsFile = serde_json::from_str(text)?;
        file.installed
            .or(file.web)
            .context("client secrets contain neither an 'installed' nor a 'web' section")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid client secrets in {}", path.display()))
    }

    /// OAuth client for these endpoints. Google expects the client secret
    /// in the form body rather than as HTTP basic auth.
    pub fn oauth_client(&self) -> Result<BasicClient> {
        let auth_url = AuthUrl::new(self.auth_uri.clone())
            .with_context(|| format!("invalid auth_uri '{}'", self.auth_uri))?;
        let token_url = TokenUrl::new(self.token_uri.clone())
            .with_context(|| format!("invalid token_uri '{}'", self.token_uri))?;
        Ok(BasicClient::new(
            ClientId::new(self.client_id.clone()),
            Some(ClientSecret::new(self.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody))
    }
}
