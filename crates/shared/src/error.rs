use serde::{Deserialize, Serialize};

pub const NO_IMAGE_MESSAGE: &str = "Nenhuma imagem foi enviada";
pub const MISSING_API_KEY_MESSAGE: &str = "API key não configurada";
pub const IMAGE_TOO_LARGE_MESSAGE: &str = "A imagem excede o tamanho máximo permitido";
pub const PROCESSING_FAILED_MESSAGE: &str = "Erro ao processar a imagem";

/// Shown by clients when a failure carries no message of its own.
pub const CLIENT_FALLBACK_MESSAGE: &str = "Falha ao processar a imagem. Isso pode ser devido ao tamanho ou resolução da imagem estar fora dos limites aceitáveis. Tente usar uma imagem com tamanho e resolução adequados.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }

    /// The message when it carries any text.
    pub fn message(&self) -> Option<&str> {
        let trimmed = self.error.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}
