use std::path::{Path, PathBuf};

use shared::protocol::EncodedImage;
use thiserror::Error;
use tracing::debug;

/// Same ceiling the desktop client applies to attachments.
pub const DEFAULT_MAX_LOGO_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum LogoError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} is not an image (detected {mime_type})", path.display())]
    NotAnImage { path: PathBuf, mime_type: String },
    #[error("{} is {size_bytes} bytes, above the {limit_bytes} byte limit", path.display())]
    TooLarge {
        path: PathBuf,
        size_bytes: u64,
        limit_bytes: u64,
    },
    #[error("{} is empty", path.display())]
    Empty { path: PathBuf },
}

/// Reads a user-selected image and turns it into an inline data URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoEncoder {
    max_bytes: Option<u64>,
}

impl Default for LogoEncoder {
    fn default() -> Self {
        Self::new(Some(DEFAULT_MAX_LOGO_BYTES))
    }
}

impl LogoEncoder {
    pub fn new(max_bytes: Option<u64>) -> Self {
        Self { max_bytes }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub async fn encode(&self, path: &Path) -> Result<EncodedImage, LogoError> {
        let mime_type = image_mime_type(path)?;

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| LogoError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        self.check_size(path, metadata.len())?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| LogoError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        self.encode_bytes_as(path, &mime_type, &bytes)
    }

    /// Encodes bytes already in memory; `filename` drives mime detection.
    pub fn encode_bytes(&self, filename: &Path, bytes: &[u8]) -> Result<EncodedImage, LogoError> {
        let mime_type = image_mime_type(filename)?;
        self.encode_bytes_as(filename, &mime_type, bytes)
    }

    fn encode_bytes_as(
        &self,
        path: &Path,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<EncodedImage, LogoError> {
        // The file may have grown between stat and read.
        self.check_size(path, bytes.len() as u64)?;
        if bytes.is_empty() {
            return Err(LogoError::Empty {
                path: path.to_path_buf(),
            });
        }

        let encoded = EncodedImage::from_bytes(mime_type, bytes);
        debug!(
            path = %path.display(),
            mime_type,
            bytes = bytes.len(),
            "encoded logo"
        );
        Ok(encoded)
    }

    fn check_size(&self, path: &Path, size_bytes: u64) -> Result<(), LogoError> {
        match self.max_bytes {
            Some(limit_bytes) if size_bytes > limit_bytes => Err(LogoError::TooLarge {
                path: path.to_path_buf(),
                size_bytes,
                limit_bytes,
            }),
            _ => Ok(()),
        }
    }
}

fn image_mime_type(path: &Path) -> Result<String, LogoError> {
    let guessed = mime_guess::from_path(path).first_raw();
    match guessed {
        Some(mime_type) if mime_type.starts_with("image/") => Ok(mime_type.to_string()),
        other => Err(LogoError::NotAnImage {
            path: path.to_path_buf(),
            mime_type: other.unwrap_or("unknown").to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "tests/logo_tests.rs"]
mod tests;
