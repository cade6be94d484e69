use crate::protocol::{decode_data_uri, encode_data_uri, DataUriError, PNG_DATA_URI_PREFIX};

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";
pub const DEFAULT_FILENAME: &str = "image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Locally displayable form of the upload.
    pub fn preview_data_uri(&self) -> String {
        encode_data_uri(&self.mime_type, &self.bytes)
    }
}

/// Processed image as returned by the relay, kept as an inline data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultImage(String);

impl ResultImage {
    pub fn from_data_uri(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn from_png_base64(payload: &str) -> Self {
        Self(format!("{PNG_DATA_URI_PREFIX}{payload}"))
    }

    pub fn as_data_uri(&self) -> &str {
        &self.0
    }

    pub fn decode(&self) -> Result<Vec<u8>, DataUriError> {
        decode_data_uri(&self.0).map(|(_, bytes)| bytes)
    }
}
