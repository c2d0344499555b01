use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures surfaced by connecting and uploading.
#[derive(Error, Debug)]
pub enum UploaderError {
    /// A required local file (client secrets or media source) is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Credential lifecycle failure, or an upload attempted while unconnected.
    #[error("authentication error: {message}")]
    Auth {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The metadata/media transfer failed or the final response broke the contract.
    #[error("upload error: {message}")]
    Upload {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl UploaderError {
    pub fn auth(message: impl Into<String>) -> Self {
        UploaderError::Auth {
            message: message.into(),
            source: None,
        }
    }

    pub fn auth_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        UploaderError::Auth {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn upload(message: impl Into<String>) -> Self {
        UploaderError::Upload {
            message: message.into(),
            source: None,
        }
    }

    pub fn upload_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        UploaderError::Upload {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}
