//! Storage of original encrypted names for entries whose name exceeds the
//! vault's shortening threshold (the `.c9s` format).
//!
//! When an AES-SIV-encrypted filename is longer than the configured
//! threshold (220 chars by default), Cryptomator stores the entry under a
//! directory named by the SHA-1 hash of the encrypted name (`{hash}.c9s`)
//! and writes the full encrypted name into a `name.c9s` file inside it, so
//! it can be recovered without re-deriving the hash.
//!
//! # Reference Implementation
//! - Java: [`LongFileNameProvider`](https://github.com/cryptomator/cryptofs/blob/develop/src/main/java/org/cryptomator/cryptofs/LongFileNameProvider.java)

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{instrument, trace};

use crate::fs::name::create_c9s_filename;
use crate::vault::ops::helpers::NAME_FILE;

#[derive(Error, Debug)]
pub enum LongNameError {
    #[error("I/O error reading/writing name.c9s: {0}")]
    Io(#[from] std::io::Error),

    #[error("name.c9s content is not valid UTF-8")]
    InvalidUtf8,

    #[error("name.c9s does not match the expected encrypted name for this entry")]
    Mismatch,
}

/// Reads and writes `name.c9s` files for shortened entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct LongNameStore;

impl LongNameStore {
    /// Whether an encrypted name needs the `.c9s` shortened form.
    pub fn needs_shortening(&self, encrypted_name: &str, threshold: usize) -> bool {
        encrypted_name.len() > threshold
    }

    /// The deterministic `.c9s` directory name for a long encrypted name.
    pub fn shortened_name(&self, encrypted_name: &str) -> String {
        format!("{}.c9s", create_c9s_filename(encrypted_name))
    }

    /// Persist the original encrypted name inside `{entry_dir}/name.c9s`.
    ///
    /// If a `name.c9s` already exists for this entry it must match
    /// `encrypted_name` exactly; a mismatch means either a hash collision
    /// between two distinct encrypted names or a corrupted vault, and is
    /// rejected rather than silently overwritten.
    #[instrument(skip(self), fields(entry_dir = %entry_dir.display()))]
    pub async fn write(&self, entry_dir: &Path, encrypted_name: &str) -> Result<(), LongNameError> {
        let name_path = entry_dir.join(NAME_FILE);
        match tokio::fs::read(&name_path).await {
            Ok(existing) => {
                if existing != encrypted_name.as_bytes() {
                    return Err(LongNameError::Mismatch);
                }
                trace!("name.c9s already matches, skipping write");
                return Ok(());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        tokio::fs::create_dir_all(entry_dir).await?;
        tokio::fs::write(&name_path, encrypted_name.as_bytes()).await?;
        trace!("wrote name.c9s");
        Ok(())
    }

    /// Recover the original encrypted name from `{entry_dir}/name.c9s`.
    #[instrument(skip(self), fields(entry_dir = %entry_dir.display()))]
    pub async fn read(&self, entry_dir: &Path) -> Result<String, LongNameError> {
        let bytes = tokio::fs::read(entry_dir.join(NAME_FILE)).await?;
        String::from_utf8(bytes).map_err(|_| LongNameError::InvalidUtf8)
    }

    /// Resolve the on-disk entry path for an encrypted name under `storage_dir`,
    /// taking shortening into account.
    pub fn entry_path(&self, storage_dir: &Path, encrypted_name: &str, threshold: usize) -> PathBuf {
        if self.needs_shortening(encrypted_name, threshold) {
            storage_dir.join(self.shortened_name(encrypted_name))
        } else {
            storage_dir.join(format!("{encrypted_name}.c9r"))
        }
    }
}
