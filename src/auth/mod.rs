//! Credential lifecycle: load a persisted token, refresh it when it has
//! expired, fall back to interactive authorization when there is nothing
//! usable, and persist whatever was newly obtained.

pub mod credential;
pub mod flow;
pub mod paths;
pub mod refresh;
pub mod secrets;

use anyhow::Result;
use log::{info, warn};

pub use credential::Credential;
pub use flow::LoopbackFlow;
pub use paths::AuthPaths;
pub use refresh::OAuthRefresher;
pub use secrets::ClientSecrets;

use crate::error::UploaderError;

/// Obtains a brand-new credential from the user. Blocks until the user
/// has completed (or abandoned) the consent screen.
pub trait InteractiveAuthorizer {
    fn acquire_interactively(&self, secrets: &ClientSecrets) -> Result<Credential>;
}

/// Exchanges a refresh token for a new credential.
pub trait TokenRefresher {
    fn refresh(&self, credential: &Credential) -> Result<Credential>;
}

/// Produces a valid credential for one account.
///
/// Not safe to run concurrently for the same account: the token file is
/// read and rewritten without locking.
pub struct CredentialManager {
    paths: AuthPaths,
    authorizer: Box<dyn InteractiveAuthorizer>,
    refresher: Box<dyn TokenRefresher>,
}

impl CredentialManager {
    pub fn new(
        paths: AuthPaths,
        authorizer: Box<dyn InteractiveAuthorizer>,
        refresher: Box<dyn TokenRefresher>,
    ) -> Self {
        Self {
            paths,
            authorizer,
            refresher,
        }
    }

    pub fn paths(&self) -> &AuthPaths {
        &self.paths
    }

    /// Run the lifecycle once: load → (valid | refresh | interactive) → persist.
    ///
    /// The client secrets file must exist even when a usable token is on
    /// disk. A corrupt token file only logs a warning. A failed refresh is
    /// fatal and never falls back to the interactive flow.
    pub fn acquire(&self) -> Result<Credential, UploaderError> {
        self.require_secrets()?;
        let loaded = self.load_persisted();

        let credential = match loaded {
            Some(cred) if cred.is_valid() => return Ok(cred),
            Some(cred) if cred.is_expired() && cred.can_refresh() => {
                info!("credential expired, refreshing");
                self.refresher
                    .refresh(&cred)
                    .map_err(|e| UploaderError::auth_with("refresh failed", e))?
            }
            _ => self.authorize_interactively()?,
        };

        self.persist(&credential)?;
        Ok(credential)
    }

    fn load_persisted(&self) -> Option<Credential> {
        let path = &self.paths.token;
        if !path.exists() {
            return None;
        }
        match Credential::load(path) {
            Ok(cred) => Some(cred),
            Err(e) => {
                warn!("ignoring unreadable token file ({e:#}); re-authorizing");
                None
            }
        }
    }

    fn require_secrets(&self) -> Result<(), UploaderError> {
        let secrets_path = &self.paths.client_secrets;
        if !secrets_path.is_file() {
            return Err(UploaderError::NotFound(format!(
                "client secrets not found: {}",
                secrets_path.display()
            )));
        }
        Ok(())
    }

    fn authorize_interactively(&self) -> Result<Credential, UploaderError> {
        info!("authorization required; complete the consent screen in your browser");
        let secrets = ClientSecrets::load(&self.paths.client_secrets)
            .map_err(|e| UploaderError::auth_with("interactive flow failed", e))?;
        self.authorizer
            .acquire_interactively(&secrets)
            .map_err(|e| UploaderError::auth_with("interactive flow failed", e))
    }

    fn persist(&self, credential: &Credential) -> Result<(), UploaderError> {
        credential
            .save(&self.paths.token)
            .map_err(|e| UploaderError::auth_with("cannot persist credential", e))?;
        info!("saved new credential to '{}'", self.paths.token.display());
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::Ordering;

    use super::testing::*;
    use super::*;
    use crate::config::CLIENT_SECRETS_FILE;

    struct Fixture {
        dir: tempfile::TempDir,
        authorizer: FakeAuthorizer,
        refresher: FakeRefresher,
    }

    impl Fixture {
        fn new(with_secrets: bool) -> Self {
            let dir = tempfile::tempdir().unwrap();
            if with_secrets {
                fs::write(dir.path().join(CLIENT_SECRETS_FILE), SECRETS_JSON).unwrap();
            }
            Self {
                dir,
                authorizer: FakeAuthorizer::default(),
                refresher: FakeRefresher::default(),
            }
        }

        fn paths(&self) -> AuthPaths {
            AuthPaths::unchecked(self.dir.path())
        }

        fn manager(&self) -> CredentialManager {
            CredentialManager::new(
                self.paths(),
                Box::new(self.authorizer.clone()),
                Box::new(self.refresher.clone()),
            )
        }

        fn interactive_calls(&self) -> usize {
            self.authorizer.calls.load(Ordering::SeqCst)
        }

        fn refresh_calls(&self) -> usize {
            self.refresher.calls.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_no_token_runs_interactive_flow_and_persists() {
        let fx = Fixture::new(true);
        let cred = fx.manager().acquire().unwrap();

        assert_eq!(cred.token, "interactive-token");
        assert_eq!(fx.interactive_calls(), 1);
        assert_eq!(fx.refresh_calls(), 0);
        assert_eq!(Credential::load(&fx.paths().token).unwrap(), cred);
    }

    #[test]
    fn test_valid_token_is_used_without_rewrite() {
        let fx = Fixture::new(true);
        let stored = credential("stored-token", 3600, Some("1//r"));
        stored.save(&fx.paths().token).unwrap();
        let before = fs::metadata(&fx.paths().token).unwrap().modified().unwrap();

        let cred = fx.manager().acquire().unwrap();

        assert_eq!(cred, stored);
        assert_eq!(fx.interactive_calls(), 0);
        assert_eq!(fx.refresh_calls(), 0);
        let after = fs::metadata(&fx.paths().token).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_corrupt_token_falls_back_to_interactive() {
        let fx = Fixture::new(true);
        fs::write(&fx.paths().token, "{ this is not json").unwrap();

        let cred = fx.manager().acquire().unwrap();

        assert_eq!(cred.token, "interactive-token");
        assert_eq!(fx.interactive_calls(), 1);
        // The corrupt file was replaced
        assert_eq!(Credential::load(&fx.paths().token).unwrap(), cred);
    }

    #[test]
    fn test_expired_token_is_refreshed_once_and_persisted() {
        let fx = Fixture::new(true);
        credential("old-token", -3600, Some("1//r"))
            .save(&fx.paths().token)
            .unwrap();

        let cred = fx.manager().acquire().unwrap();

        assert_eq!(cred.token, "refreshed-token");
        assert_eq!(fx.refresh_calls(), 1);
        assert_eq!(fx.interactive_calls(), 0);
        assert_eq!(Credential::load(&fx.paths().token).unwrap().token, "refreshed-token");
    }

    #[test]
    fn test_refresh_failure_is_fatal_without_interactive_fallback() {
        let mut fx = Fixture::new(true);
        fx.refresher.fail = true;
        credential("old-token", -3600, Some("1//r"))
            .save(&fx.paths().token)
            .unwrap();

        let err = fx.manager().acquire().unwrap_err();

        assert!(matches!(err, UploaderError::Auth { ref message, .. } if message == "refresh failed"));
        assert_eq!(fx.refresh_calls(), 1);
        assert_eq!(fx.interactive_calls(), 0);
        // Stale token left untouched
        assert_eq!(Credential::load(&fx.paths().token).unwrap().token, "old-token");
    }

    #[test]
    fn test_expired_without_refresh_token_goes_interactive() {
        let fx = Fixture::new(true);
        credential("old-token", -3600, None)
            .save(&fx.paths().token)
            .unwrap();

        let cred = fx.manager().acquire().unwrap();

        assert_eq!(cred.token, "interactive-token");
        assert_eq!(fx.refresh_calls(), 0);
        assert_eq!(fx.interactive_calls(), 1);
    }

    #[test]
    fn test_interactive_failure_is_auth_error() {
        let mut fx = Fixture::new(true);
        fx.authorizer.fail = true;

        let err = fx.manager().acquire().unwrap_err();

        assert!(
            matches!(err, UploaderError::Auth { ref message, .. } if message == "interactive flow failed")
        );
        assert!(!fx.paths().token.exists());
    }

    #[test]
    fn test_missing_secrets_is_not_found() {
        let fx = Fixture::new(false);
        let err = fx.manager().acquire().unwrap_err();
        assert!(matches!(err, UploaderError::NotFound(_)));
        assert_eq!(fx.interactive_calls(), 0);
    }

    #[test]
    fn test_missing_secrets_is_not_found_even_with_valid_token() {
        let fx = Fixture::new(false);
        let stored = credential("stored-token", 3600, Some("1//r"));
        stored.save(&fx.paths().token).unwrap();

        let err = fx.manager().acquire().unwrap_err();

        assert!(matches!(err, UploaderError::NotFound(ref m) if m.contains("client_secrets.json")));
        assert_eq!(fx.interactive_calls(), 0);
        assert_eq!(fx.refresh_calls(), 0);
        // Token left as it was
        assert_eq!(Credential::load(&fx.paths().token).unwrap(), stored);
    }
}
