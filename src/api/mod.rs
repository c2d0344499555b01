pub mod youtube;

use anyhow::Result;
use thiserror::Error;

use crate::auth::Credential;
use crate::config::ChunkSize;
use crate::media::Media;

pub use youtube::{YoutubeApi, YoutubeConnector};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ServiceError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, ServiceError::Http { status: 403, .. })
    }
}

/// Outcome of sending one chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkStatus {
    /// Fraction of the payload the server has acknowledged, in `[0.0, 1.0]`.
    Progress(f64),
    /// The server's final response body.
    Complete(serde_json::Value),
}

/// An open resumable transfer.
pub trait ResumableUpload {
    /// Send the next chunk, blocking until the server answers.
    fn next_chunk(&mut self) -> Result<ChunkStatus, ServiceError>;
}

/// The remote video platform, authenticated with one credential.
///
/// Implementations need not be safe for concurrent use; callers serialize.
pub trait VideoService {
    /// Open a resumable upload for `media` described by `body`.
    /// `parts` names the top-level sections present in `body`.
    fn create_upload_session<'a>(
        &'a self,
        parts: &str,
        body: &serde_json::Value,
        media: &'a Media,
        chunk_size: ChunkSize,
    ) -> Result<Box<dyn ResumableUpload + 'a>, ServiceError>;

    /// Attach `image` as the thumbnail of `video_id`.
    fn set_thumbnail(&self, video_id: &str, image: &Media) -> Result<(), ServiceError>;
}

/// Builds an authenticated [`VideoService`] from a credential.
pub trait ServiceConnector {
    fn connect(&self, credential: &Credential) -> Result<Box<dyn VideoService>>;
}
