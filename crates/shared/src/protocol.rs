use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const REMOVE_BACKGROUND_ROUTE: &str = "/api/remove-background";
pub const HEALTH_ROUTE: &str = "/healthz";

/// Multipart field carrying the image, both towards the relay and the provider.
pub const IMAGE_FIELD: &str = "image_file";

pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveBackgroundResponse {
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

impl RemoveBackgroundResponse {
    /// Wraps a provider payload without touching its encoding.
    pub fn from_png_base64(payload: &str) -> Self {
        Self {
            image_url: format!("{PNG_DATA_URI_PREFIX}{payload}"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataUriError {
    #[error("not a data uri")]
    MissingScheme,
    #[error("data uri is not base64 encoded")]
    NotBase64,
    #[error("invalid base64 payload: {0}")]
    InvalidPayload(String),
}

pub fn encode_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

/// Splits `data:<mime>;base64,<payload>` into its mime type and decoded bytes.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), DataUriError> {
    let rest = uri.strip_prefix("data:").ok_or(DataUriError::MissingScheme)?;
    let (header, payload) = rest.split_once(',').ok_or(DataUriError::MissingScheme)?;
    let mime_type = header
        .strip_suffix(";base64")
        .ok_or(DataUriError::NotBase64)?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| DataUriError::InvalidPayload(e.to_string()))?;
    Ok((mime_type.to_string(), bytes))
}
