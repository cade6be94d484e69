use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use shared::{
    domain::{ResultImage, UploadedImage},
    error::ApiError,
    protocol::{RemoveBackgroundResponse, IMAGE_FIELD, REMOVE_BACKGROUND_ROUTE},
};

use crate::error::ClientError;

/// The controller's only collaborator: the relay endpoint.
#[async_trait]
pub trait RelayClient: Send + Sync {
    async fn remove_background(&self, image: &UploadedImage) -> Result<ResultImage, ClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpRelayClient {
    http: Client,
    relay_url: String,
}

impl HttpRelayClient {
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            relay_url: relay_url.into(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}{REMOVE_BACKGROUND_ROUTE}",
            self.relay_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl RelayClient for HttpRelayClient {
    async fn remove_background(&self, image: &UploadedImage) -> Result<ResultImage, ClientError> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.filename.clone())
            .mime_str(&image.mime_type)?;
        let response = self
            .http
            .post(self.endpoint())
            .multipart(Form::new().part(IMAGE_FIELD, part))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiError>()
                .await
                .ok()
                .and_then(|body| body.message().map(str::to_string));
            return Err(ClientError::Relay {
                status: status.as_u16(),
                message,
            });
        }

        let body: RemoveBackgroundResponse = response.json().await?;
        Ok(ResultImage::from_data_uri(body.image_url))
    }
}

#[cfg(test)]
#[path = "tests/relay_client_tests.rs"]
mod tests;
