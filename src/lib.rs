pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod media;
pub mod models;
pub mod upload;

pub use auth::{AuthPaths, Credential, CredentialManager};
pub use config::{ChunkSize, UploaderSettings};
pub use error::UploaderError;
pub use models::{ConfigError, UploadConfig, UploadResult, Visibility};
pub use upload::Uploader;
