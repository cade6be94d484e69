use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::{
    domain::UploadedImage,
    error::{
        ApiError, IMAGE_TOO_LARGE_MESSAGE, MISSING_API_KEY_MESSAGE, NO_IMAGE_MESSAGE,
        PROCESSING_FAILED_MESSAGE,
    },
    protocol::RemoveBackgroundResponse,
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    config::CredentialSource,
    provider::{ProviderClient, ProviderError},
};

#[derive(Clone)]
pub struct RelayContext {
    pub provider: ProviderClient,
    pub credentials: Arc<dyn CredentialSource>,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no image supplied")]
    Input,
    #[error("upload exceeds the body limit")]
    TooLarge,
    #[error("provider credential is not configured")]
    Configuration,
    #[error("provider rejected the image ({status}): {message}")]
    Upstream { status: StatusCode, message: String },
    #[error("relay failed: {detail}")]
    Internal { detail: String },
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Input => StatusCode::BAD_REQUEST,
            Self::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Configuration | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream { status, .. } => *status,
        }
    }

    /// Localized text exposed to clients.
    pub fn public_message(&self) -> &str {
        match self {
            Self::Input => NO_IMAGE_MESSAGE,
            Self::TooLarge => IMAGE_TOO_LARGE_MESSAGE,
            Self::Configuration => MISSING_API_KEY_MESSAGE,
            Self::Upstream { message, .. } => message,
            Self::Internal { .. } => PROCESSING_FAILED_MESSAGE,
        }
    }
}

impl From<ProviderError> for RelayError {
    fn from(value: ProviderError) -> Self {
        match value {
            ProviderError::Rejected { status, title } => Self::Upstream {
                status: relayable_status(status),
                message: title.unwrap_or_else(|| PROCESSING_FAILED_MESSAGE.to_string()),
            },
            other => Self::Internal {
                detail: other.to_string(),
            },
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), Json(ApiError::new(self.public_message()))).into_response()
    }
}

pub async fn relay_image(
    ctx: &RelayContext,
    upload: Option<UploadedImage>,
) -> Result<RemoveBackgroundResponse, RelayError> {
    let image = upload
        .filter(|image| !image.is_empty())
        .ok_or(RelayError::Input)?;

    let Some(api_key) = ctx.credentials.api_key() else {
        error!("provider credential missing; refusing to relay image");
        return Err(RelayError::Configuration);
    };

    let payload = ctx
        .provider
        .remove_background(&api_key, &image)
        .await
        .map_err(|err| {
            let err = RelayError::from(err);
            match &err {
                RelayError::Upstream { status, message } => {
                    warn!(status = status.as_u16(), %message, filename = %image.filename, "provider rejected image");
                }
                other => error!(error = %other, filename = %image.filename, "error processing image"),
            }
            err
        })?;

    info!(
        filename = %image.filename,
        input_bytes = image.bytes.len(),
        result_b64_len = payload.len(),
        "background removed"
    );
    Ok(RemoveBackgroundResponse::from_png_base64(&payload))
}

/// Provider statuses are forwarded as-is unless they would not read as a failure.
fn relayable_status(status: StatusCode) -> StatusCode {
    if status.is_client_error() || status.is_server_error() {
        status
    } else {
        StatusCode::BAD_GATEWAY
    }
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
