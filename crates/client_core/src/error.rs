use shared::{error::CLIENT_FALLBACK_MESSAGE, protocol::DataUriError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("relay responded with status {status}")]
    Relay { status: u16, message: Option<String> },
    #[error("relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("no processed image available to download")]
    NothingToDownload,
    #[error("processed image is not a usable data uri: {0}")]
    InvalidResult(#[from] DataUriError),
    #[error("file system error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// The single string a user gets to see for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::Relay {
                message: Some(message),
                ..
            } => message.clone(),
            _ => CLIENT_FALLBACK_MESSAGE.to_string(),
        }
    }
}
