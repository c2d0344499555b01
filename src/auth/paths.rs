use std::path::{Path, PathBuf};

use crate::config::{AUTH_HOME_DIR, AUTH_HOME_ENV, CLIENT_SECRETS_FILE, TOKEN_FILE};
use crate::error::UploaderError;

/// Location of the client secrets and of the persisted token for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPaths {
    pub client_secrets: PathBuf,
    pub token: PathBuf,
}

impl AuthPaths {
    /// Derive both paths from `base`. A leading `~` expands to the home
    /// directory. Fails with [`UploaderError::NotFound`] when the client
    /// secrets file is absent; it is never created here.
    pub fn resolve(base: impl AsRef<Path>) -> Result<Self, UploaderError> {
        let base = expand_home(base.as_ref());
        let paths = Self::unchecked(&base);
        if !paths.client_secrets.is_file() {
            return Err(UploaderError::NotFound(format!(
                "client secrets not found; place them at {}",
                paths.client_secrets.display()
            )));
        }
        Ok(paths)
    }

    /// Resolve the directory for `account` under [`auth_root`].
    pub fn for_account(account: &str) -> Result<Self, UploaderError> {
        Self::resolve(account_dir(account))
    }

    /// Paths under `base` without checking anything exists.
    pub(crate) fn unchecked(base: &Path) -> Self {
        Self {
            client_secrets: base.join(CLIENT_SECRETS_FILE),
            token: base.join(TOKEN_FILE),
        }
    }
}

/// Root for per-account auth directories: `$TUBECAST_HOME` when set,
/// otherwise `~/.secrets/youtube-uploader`.
pub fn auth_root() -> PathBuf {
    match std::env::var_os(AUTH_HOME_ENV) {
        Some(dir) if !dir.is_empty() => expand_home(Path::new(&dir)),
        _ => home_dir().join(AUTH_HOME_DIR),
    }
}

pub fn account_dir(account: &str) -> PathBuf {
    auth_root().join(account)
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home_dir().join(rest),
        Err(_) => path.to_path_buf(),
    }
}
