//! Top-level error taxonomy for the vault filesystem.
//!
//! Component-level errors (name, streaming, directory, ...) carry rich
//! diagnostic context; this enum classifies them into the coarse kinds a
//! caller actually needs to branch on.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::crypto::keys::KeyAccessError;
use crate::fs::name::NameError;
use crate::vault::cache::ChunkCacheError;
use crate::vault::config::ClaimValidationError;
use crate::vault::ops::StoragePathError;

/// Errors surfaced by the vault filesystem to its callers.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("not found: {0}")]
    NotFound(PathBuf),

    #[error("already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("is a directory: {0}")]
    IsADirectory(PathBuf),

    #[error("name too long ({len} bytes, limit {limit}): {name}")]
    NameTooLong { name: String, len: usize, limit: usize },

    /// A chunk, header, filename, or vault-config MAC failed to verify.
    /// Distinct from [`VaultError::Corrupted`]: this is specifically an
    /// authentication failure, which may indicate a forged ciphertext.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("master key does not unlock this vault")]
    VaultKeyInvalid,

    #[error("unsupported vault format: {0}")]
    VaultVersionMismatch(i32),

    #[error("operation not permitted on a read-only mount")]
    ReadOnly,

    #[error("filesystem or file handle is closed")]
    Closed,

    #[error("vault structure is corrupted: {0}")]
    Corrupted(String),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VaultError {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        VaultError::NotFound(path.into())
    }
}

impl From<NameError> for VaultError {
    fn from(err: NameError) -> Self {
        match err {
            NameError::DecryptionFailed { .. } => VaultError::AuthenticationFailed(err.to_string()),
            NameError::KeyAccess(_) => VaultError::AuthenticationFailed(err.to_string()),
            other => VaultError::Corrupted(other.to_string()),
        }
    }
}

impl From<KeyAccessError> for VaultError {
    fn from(err: KeyAccessError) -> Self {
        VaultError::AuthenticationFailed(err.to_string())
    }
}

impl From<StoragePathError> for VaultError {
    fn from(err: StoragePathError) -> Self {
        VaultError::Corrupted(err.to_string())
    }
}

impl From<ClaimValidationError> for VaultError {
    fn from(err: ClaimValidationError) -> Self {
        match err {
            ClaimValidationError::UnsupportedVaultFormat(v) => VaultError::VaultVersionMismatch(v),
            ClaimValidationError::JwtDecode(_) | ClaimValidationError::JwtValidation(_) => {
                VaultError::VaultKeyInvalid
            }
            other => VaultError::Corrupted(other.to_string()),
        }
    }
}

impl From<ChunkCacheError> for VaultError {
    fn from(err: ChunkCacheError) -> Self {
        match err {
            ChunkCacheError::Io(e) => VaultError::Io(e),
            ChunkCacheError::Authentication(msg) => VaultError::AuthenticationFailed(msg),
        }
    }
}

impl From<crate::vault::openfile::OpenFileError> for VaultError {
    fn from(err: crate::vault::openfile::OpenFileError) -> Self {
        use crate::vault::openfile::OpenFileError;
        match err {
            OpenFileError::Io(e) => VaultError::Io(e),
            OpenFileError::Cache(e) => VaultError::from(e),
            OpenFileError::Header(msg) => VaultError::Corrupted(msg),
            OpenFileError::ReadOnly => VaultError::ReadOnly,
            OpenFileError::Closed => VaultError::Closed,
        }
    }
}

impl From<crate::vault::registry::RegistryError> for VaultError {
    fn from(err: crate::vault::registry::RegistryError) -> Self {
        use crate::vault::registry::RegistryError;
        match err {
            RegistryError::OpenFile(e) => VaultError::from(e),
            RegistryError::ReadOnly => VaultError::ReadOnly,
        }
    }
}

impl From<crate::vault::longname::LongNameError> for VaultError {
    fn from(err: crate::vault::longname::LongNameError) -> Self {
        use crate::vault::longname::LongNameError;
        match err {
            LongNameError::Io(e) => VaultError::Io(e),
            LongNameError::InvalidUtf8 => VaultError::Corrupted("name.c9s is not valid UTF-8".into()),
            LongNameError::Mismatch => {
                VaultError::Corrupted("name.c9s does not match the expected encrypted name".into())
            }
        }
    }
}

impl From<crate::vault::directory::DirectoryListError> for VaultError {
    fn from(err: crate::vault::directory::DirectoryListError) -> Self {
        use crate::vault::directory::DirectoryListError;
        match err {
            DirectoryListError::Io(e) => VaultError::Io(e),
        }
    }
}

impl From<crate::vault::attributes::AttributesError> for VaultError {
    fn from(err: crate::vault::attributes::AttributesError) -> Self {
        use crate::vault::attributes::AttributesError;
        match err {
            AttributesError::Io(e) => VaultError::Io(e),
        }
    }
}

impl From<crate::fs::symlink::SymlinkError> for VaultError {
    fn from(err: crate::fs::symlink::SymlinkError) -> Self {
        VaultError::AuthenticationFailed(err.to_string())
    }
}

impl From<crate::vault::creator::VaultOpenError> for VaultError {
    fn from(err: crate::vault::creator::VaultOpenError) -> Self {
        use crate::vault::creator::VaultOpenError;
        match err {
            VaultOpenError::Io(e) => VaultError::Io(e),
            VaultOpenError::ClaimValidation(e) => VaultError::from(e),
        }
    }
}
