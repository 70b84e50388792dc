use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("local storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn remote(err: impl std::fmt::Display) -> Self {
        Self::RemoteUnavailable(err.to_string())
    }

    pub fn upload(err: impl std::fmt::Display) -> Self {
        Self::UploadFailed(err.to_string())
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::StorageUnavailable(err.to_string())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::RemoteUnavailable(_) => "remote_unavailable",
            Self::UploadFailed(_) => "upload_failed",
            Self::NotFound(_) => "not_found",
            Self::ValidationFailed(_) => "validation_failed",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::Serialization(_) => "serialization_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Text suitable for showing to the person using the app.
    pub fn user_message(&self) -> String {
        match self {
            Self::RemoteUnavailable(_) => {
                "Oops! Our server is down. Please try again later.".to_string()
            }
            Self::UploadFailed(_) => {
                "The upload did not finish. Please try again or pick a different file.".to_string()
            }
            Self::NotFound(what) => format!("{what} could not be found."),
            Self::ValidationFailed(messages) => messages.join("\n"),
            Self::StorageUnavailable(_) => {
                "Device storage is unavailable. Please restart the app.".to_string()
            }
            Self::Serialization(_) | Self::Internal(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }

    /// Messages carried by a validation failure, empty for any other error.
    pub fn validation_messages(&self) -> &[String] {
        match self {
            Self::ValidationFailed(messages) => messages,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
