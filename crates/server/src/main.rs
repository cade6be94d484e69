use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use shared::{
    domain::{UploadedImage, DEFAULT_FILENAME, DEFAULT_MIME_TYPE},
    protocol::{HEALTH_ROUTE, IMAGE_FIELD, REMOVE_BACKGROUND_ROUTE},
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;
mod provider;

use api::{relay_image, RelayContext, RelayError};
use app_state::AppState;
use config::{load_settings, parse_provider_url, CredentialSource, EnvCredential};
use provider::ProviderClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let endpoint = parse_provider_url(&settings.provider_url)?;
    let credentials = EnvCredential::new(&settings.api_key_env);
    if credentials.api_key().is_none() {
        tracing::warn!(
            var = %settings.api_key_env,
            "provider credential not set; removal requests will fail until it is"
        );
    }

    let state = AppState {
        relay: RelayContext {
            provider: ProviderClient::new(endpoint),
            credentials: Arc::new(credentials),
        },
    };
    let app = build_router(Arc::new(state), settings.max_upload_bytes);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, provider = %settings.provider_url, "relay listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route(HEALTH_ROUTE, get(healthz))
        .route(REMOVE_BACKGROUND_ROUTE, post(remove_background))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn remove_background(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, RelayError> {
    let upload = match multipart {
        Ok(multipart) => read_image_field(multipart).await?,
        Err(rejection) => {
            debug!(%rejection, "request is not multipart");
            None
        }
    };

    let response = relay_image(&state.relay, upload).await?;
    Ok(Json(response))
}

/// Pulls the first non-empty `image_file` field out of the form.
async fn read_image_field(mut multipart: Multipart) -> Result<Option<UploadedImage>, RelayError> {
    while let Some(field) = multipart.next_field().await.map_err(unreadable_body)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_FILENAME)
            .to_string();
        let mime_type = field
            .content_type()
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();
        let bytes = field.bytes().await.map_err(unreadable_body)?;

        if !bytes.is_empty() {
            return Ok(Some(UploadedImage::new(filename, mime_type, bytes.to_vec())));
        }
    }

    Ok(None)
}

/// The body limit surfaces while streaming fields, so it is told apart from
/// a malformed form here.
fn unreadable_body(error: MultipartError) -> RelayError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!(%error, "upload exceeds the body limit");
        RelayError::TooLarge
    } else {
        debug!(%error, "unreadable multipart body");
        RelayError::Input
    }
}

#[cfg(test)]
#[path = "tests/provider_stub.rs"]
mod provider_stub;

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
