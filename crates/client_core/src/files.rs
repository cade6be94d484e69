use std::path::{Path, PathBuf};

use shared::domain::{ResultImage, UploadedImage, DEFAULT_FILENAME};

use crate::error::ClientError;

/// Fixed name the processed image is saved under.
pub const DOWNLOAD_FILENAME: &str = "imagem-sem-fundo.png";

pub async fn load_image(path: &Path) -> Result<UploadedImage, ClientError> {
    let bytes = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(DEFAULT_FILENAME)
        .to_string();
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    Ok(UploadedImage::new(filename, mime_type, bytes))
}

pub(crate) async fn save_result(result: &ResultImage, dir: &Path) -> Result<PathBuf, ClientError> {
    let bytes = result.decode()?;
    let path = dir.join(DOWNLOAD_FILENAME);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}
