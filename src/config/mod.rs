use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// OAuth
pub const UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/youtube.upload";
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Seconds subtracted from a token's expiry before it is considered stale.
pub const TOKEN_EXPIRY_SKEW_SECS: i64 = 10;

// YouTube Data API v3
pub const DEFAULT_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/youtube/v3";
pub const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

// Auth file layout
pub const CLIENT_SECRETS_FILE: &str = "client_secrets.json";
pub const TOKEN_FILE: &str = "token.json";
pub const AUTH_HOME_ENV: &str = "TUBECAST_HOME";
/// Per-account directories live under `~/<AUTH_HOME_DIR>/<account>` by default.
pub const AUTH_HOME_DIR: &str = ".secrets/youtube-uploader";

// Upload defaults
pub const DEFAULT_CATEGORY_ID: &str = "24"; // Entertainment
pub const DEFAULT_VIDEO_MIMETYPE: &str = "video/*";
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024; // 8 MiB
/// Resumable chunks other than the last must be a multiple of this.
pub const CHUNK_GRANULARITY: usize = 256 * 1024;

/// How much of the payload each "send next chunk" call transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSize {
    /// At most this many bytes per request.
    Bytes(usize),
    /// The whole payload in one request. No intermediate progress is reported.
    Whole,
}

impl ChunkSize {
    /// Number of bytes to send next, given `remaining` bytes left in the payload.
    pub fn next_len(&self, remaining: u64) -> u64 {
        match *self {
            ChunkSize::Bytes(n) => remaining.min(n.max(1) as u64),
            ChunkSize::Whole => remaining,
        }
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        ChunkSize::Bytes(DEFAULT_CHUNK_SIZE)
    }
}

impl fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkSize::Bytes(n) => write!(f, "{n}"),
            ChunkSize::Whole => f.write_str("whole"),
        }
    }
}

impl FromStr for ChunkSize {
    type Err = String;

    /// `0`, `-1` and `whole` select [`ChunkSize::Whole`]; anything else is a byte count.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" | "-1" | "whole" => Ok(ChunkSize::Whole),
            other => other
                .parse::<usize>()
                .map(ChunkSize::Bytes)
                .map_err(|e| format!("invalid chunk size '{other}': {e}")),
        }
    }
}

/// Runtime configuration for connecting and uploading.
#[derive(Debug, Clone)]
pub struct UploaderSettings {
    pub chunk_size: ChunkSize,
    /// Per-request timeout. `None` lets a stalled chunk block indefinitely.
    pub timeout: Option<Duration>,
    pub upload_base: String,
    /// Loopback port for the interactive authorization redirect; 0 picks a free one.
    pub redirect_port: u16,
}

impl Default for UploaderSettings {
    fn default() -> Self {
        Self {
            chunk_size: ChunkSize::default(),
            timeout: None,
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            redirect_port: 0,
        }
    }
}
