use reqwest::{
    header::ACCEPT,
    multipart::{Form, Part},
    Client, StatusCode,
};
use serde::Deserialize;
use shared::{domain::UploadedImage, protocol::IMAGE_FIELD};
use thiserror::Error;
use url::Url;

pub const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: Client,
    endpoint: Url,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider rejected the image with status {status}")]
    Rejected {
        status: StatusCode,
        title: Option<String>,
    },
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned a malformed body: {0}")]
    MalformedBody(String),
}

#[derive(Debug, Deserialize)]
struct RemovalSuccess {
    data: RemovalResult,
}

#[derive(Debug, Deserialize)]
struct RemovalResult {
    result_b64: String,
}

#[derive(Debug, Default, Deserialize)]
struct RemovalErrors {
    #[serde(default)]
    errors: Vec<RemovalErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct RemovalErrorEntry {
    #[serde(default)]
    title: Option<String>,
}

impl ProviderClient {
    pub fn new(endpoint: Url) -> Self {
        Self {
            http: Client::new(),
            endpoint,
        }
    }

    /// Sends one removal request and returns the base64 PNG payload untouched.
    pub async fn remove_background(
        &self,
        api_key: &str,
        image: &UploadedImage,
    ) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(API_KEY_HEADER, api_key)
            .header(ACCEPT, "application/json")
            .multipart(removal_form(image))
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(ProviderError::Rejected {
                status,
                title: first_error_title(&body),
            });
        }

        let success: RemovalSuccess = serde_json::from_slice(&body)
            .map_err(|e| ProviderError::MalformedBody(e.to_string()))?;
        Ok(success.data.result_b64)
    }
}

fn removal_form(image: &UploadedImage) -> Form {
    Form::new()
        .part(
            IMAGE_FIELD,
            Part::bytes(image.bytes.clone()).file_name(image.filename.clone()),
        )
        .text("size", "auto")
        .text("format", "auto")
}

fn first_error_title(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<RemovalErrors>(body)
        .unwrap_or_default()
        .errors
        .into_iter()
        .next()
        .and_then(|entry| entry.title)
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
}
