//! Input resolution: load a user-supplied path or URL into memory.
//!
//! The remote service receives the document inline as base64, so there is no
//! need for a file on disk once the bytes are read. Both sources are checked
//! for the `%PDF` magic bytes here, so a wrong file fails before any upload.

use crate::error::ExtractError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// A document ready for submission.
#[derive(Debug, Clone)]
pub struct Document {
    /// File name used in logs and batch error reports.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Document {
    /// Wrap in-memory bytes, validating the PDF magic.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ExtractError> {
        let name = name.into();
        check_magic(&name, &bytes)?;
        Ok(Self { name, bytes })
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a local file or download a URL.
pub async fn load_document(input: &str, timeout_secs: u64) -> Result<Document, ExtractError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else if input.trim().is_empty() {
        Err(ExtractError::InvalidInput {
            input: input.to_string(),
        })
    } else {
        load_local(Path::new(input)).await
    }
}

async fn load_local(path: &Path) -> Result<Document, ExtractError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ExtractError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(ExtractError::ReadFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    debug!("Loaded local PDF: {} ({} bytes)", path.display(), bytes.len());
    Document::from_bytes(name, bytes)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Document, ExtractError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let download_err = |e: reqwest::Error| {
        if e.is_timeout() {
            ExtractError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(download_err)?;
    if !response.status().is_success() {
        return Err(ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(download_err)?;
    info!("Downloaded {} bytes", bytes.len());
    Document::from_bytes(filename_from_url(url), bytes.to_vec())
}

/// Last path segment of a URL when it looks like a file name.
pub fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded.pdf".to_string()
}

fn check_magic(name: &str, bytes: &[u8]) -> Result<(), ExtractError> {
    if bytes.starts_with(b"%PDF") {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(ExtractError::NotAPdf {
        name: name.to_string(),
        magic,
    })
}

/// Output path next to the input: `invoice.pdf` → `invoice.xlsx`.
pub fn default_output_path(input: &str) -> PathBuf {
    if is_url(input) {
        Path::new(&filename_from_url(input)).with_extension("xlsx")
    } else {
        Path::new(input).with_extension("xlsx")
    }
}
