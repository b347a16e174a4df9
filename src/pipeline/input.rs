//! Input resolution: read the anthology PDF from the local filesystem.
//!
//! The OCR service takes the raw bytes plus a file name, so the whole file is
//! read up front. Magic bytes (`%PDF`) are checked before anything is
//! uploaded so a wrong path fails locally rather than as an opaque OCR error.

use crate::error::PoemsError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A PDF read into memory, ready for upload.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    /// Final path component, sent to the OCR service as the upload name.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Resolve a local path to a [`SourceDocument`].
pub async fn resolve_input(path: impl AsRef<Path>) -> Result<SourceDocument, PoemsError> {
    let path = path.as_ref().to_path_buf();

    if !path.is_file() {
        return Err(PoemsError::FileNotFound { path });
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PoemsError::PermissionDenied { path });
        }
        Err(_) => return Err(PoemsError::FileNotFound { path }),
    };

    check_magic(&path, &bytes)?;

    let file_name = file_name_of(&path);
    debug!("Resolved local PDF: {} ({} bytes)", path.display(), bytes.len());

    Ok(SourceDocument {
        path,
        file_name,
        bytes,
    })
}

fn check_magic(path: &Path, bytes: &[u8]) -> Result<(), PoemsError> {
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    if &magic != b"%PDF" {
        return Err(PoemsError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "document.pdf".to_string())
}
