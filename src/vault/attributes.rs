//! Cleartext attribute resolution: consults a live [`OpenFile`] for size when
//! one exists, otherwise derives cleartext size from the ciphertext file's
//! length on the host.

use std::path::Path;
use std::time::SystemTime;

use thiserror::Error;

use crate::crypto::cryptor::VaultCryptor;
use crate::fs::file::{CHUNK_OVERHEAD, HEADER_SIZE};
use crate::vault::ops::cleartext_size_from_ciphertext_len;
use crate::vault::openfile::OpenFile;

#[derive(Error, Debug)]
pub enum AttributesError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cleartext metadata for a resolved entry.
#[derive(Debug, Clone)]
pub struct Attributes {
    pub size: u64,
    pub is_directory: bool,
    pub is_symlink: bool,
    pub last_modified: Option<SystemTime>,
}

/// Read attributes for a host ciphertext path, preferring a live `OpenFile`'s
/// in-memory size over recomputing it from the ciphertext length.
pub async fn read_attributes(
    host_path: &Path,
    open_file: Option<&OpenFile>,
    cryptor: &dyn VaultCryptor,
) -> Result<Attributes, AttributesError> {
    let metadata = tokio::fs::metadata(host_path).await?;

    if metadata.is_dir() {
        return Ok(Attributes {
            size: metadata.len(),
            is_directory: true,
            is_symlink: false,
            last_modified: metadata.modified().ok(),
        });
    }

    let size = if let Some(open_file) = open_file {
        open_file.size().await
    } else {
        cleartext_size_from_ciphertext_len(
            metadata.len(),
            HEADER_SIZE as u64,
            cryptor.chunk_payload_size() as u64,
            CHUNK_OVERHEAD as u64,
        )
    };

    Ok(Attributes {
        size,
        is_directory: false,
        is_symlink: false,
        last_modified: metadata.modified().ok(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::cryptor::SivGcmCryptor;
    use tempfile::tempdir;

    #[tokio::test]
    async fn directory_size_passes_through_untouched() {
        let dir = tempdir().unwrap();
        let attrs = read_attributes(dir.path(), None, &SivGcmCryptor).await.unwrap();
        assert!(attrs.is_directory);
    }

    #[tokio::test]
    async fn undersized_ciphertext_reports_zero_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.c9r");
        tokio::fs::write(&path, b"too short").await.unwrap();

        let attrs = read_attributes(&path, None, &SivGcmCryptor).await.unwrap();
        assert_eq!(attrs.size, 0);
        assert!(!attrs.is_directory);
    }

    #[tokio::test]
    async fn cleartext_size_derived_from_ciphertext_length_without_open_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.c9r");
        // Header + one chunk holding 10 cleartext bytes.
        tokio::fs::write(&path, vec![0u8; HEADER_SIZE + 28 + 10]).await.unwrap();

        let attrs = read_attributes(&path, None, &SivGcmCryptor).await.unwrap();
        assert_eq!(attrs.size, 10);
    }
}
