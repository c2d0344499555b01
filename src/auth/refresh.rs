use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use oauth2::basic::BasicTokenResponse;
use oauth2::reqwest::http_client;
use oauth2::{RefreshToken, TokenResponse};

use super::credential::Credential;
use super::secrets::ClientSecrets;
use super::TokenRefresher;
use crate::config::DEFAULT_AUTH_URI;

/// Build a credential from a token endpoint response, keeping
/// `previous_refresh` when the endpoint does not rotate the refresh token.
pub(crate) fn credential_from_token(
    token: &BasicTokenResponse,
    secrets: &ClientSecrets,
    default_scopes: &[String],
    previous_refresh: Option<String>,
) -> Credential {
    let scopes = match token.scopes() {
        Some(scopes) => scopes.iter().map(|s| s.to_string()).collect(),
        None => default_scopes.to_vec(),
    };
    let expiry = token
        .expires_in()
        .and_then(|d| Duration::from_std(d).ok())
        .map(|d| Utc::now() + d);
    Credential {
        token: token.access_token().secret().clone(),
        refresh_token: token
            .refresh_token()
            .map(|t| t.secret().clone())
            .or(previous_refresh),
        token_uri: secrets.token_uri.clone(),
        client_id: secrets.client_id.clone(),
        client_secret: secrets.client_secret.clone(),
        scopes,
        expiry,
    }
}

/// Refreshes a credential against its own `token_uri`. Single attempt.
#[derive(Debug, Default, Clone, Copy)]
pub struct OAuthRefresher;

impl TokenRefresher for OAuthRefresher {
    fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .clone()
            .context("credential has no refresh token")?;
        // The authorization endpoint is never contacted on refresh
        let secrets = ClientSecrets {
            client_id: credential.client_id.clone(),
            client_secret: credential.client_secret.clone(),
            auth_uri: DEFAULT_AUTH_URI.to_string(),
            token_uri: credential.token_uri.clone(),
        };
        let token = secrets
            .oauth_client()?
            .exchange_refresh_token(&RefreshToken::new(refresh_token))
            .request(http_client)
            .with_context(|| format!("token refresh at {} failed", credential.token_uri))?;
        Ok(credential_from_token(
            &token,
            &secrets,
            &credential.scopes,
            credential.refresh_token.clone(),
        ))
    }
}
