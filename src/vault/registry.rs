//! Process-wide interning of [`OpenFile`] by normalized host path, so at most
//! one handle exists per ciphertext file at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::instrument;

use crate::crypto::cryptor::VaultCryptor;
use crate::crypto::keys::MasterKey;
use crate::vault::locks::VaultLockManager;
use crate::vault::openfile::{OpenFile, OpenFileError, OpenOptions};
use crate::vault::path::DirId;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("open file error: {0}")]
    OpenFile(#[from] OpenFileError),

    #[error("operation not permitted on a read-only mount")]
    ReadOnly,
}

/// Maps normalized host paths to their live [`OpenFile`], reference-counted
/// by open count so a second opener of the same ciphertext file reuses the
/// existing handle instead of racing it on disk.
pub struct OpenFileRegistry {
    entries: DashMap<PathBuf, Arc<OpenFile>>,
    cryptor: Arc<dyn VaultCryptor>,
    master_key: Arc<MasterKey>,
    readonly: bool,
}

impl OpenFileRegistry {
    pub fn new(cryptor: Arc<dyn VaultCryptor>, master_key: Arc<MasterKey>, readonly: bool) -> Self {
        Self { entries: DashMap::new(), cryptor, master_key, readonly }
    }

    /// Get or create the `OpenFile` for `host_path`, incrementing its open
    /// count. Rejects writable opens on a read-only registry.
    #[instrument(skip(self, options), fields(path = %host_path.display()))]
    pub async fn get(&self, host_path: &Path, options: OpenOptions) -> Result<Arc<OpenFile>, RegistryError> {
        self.get_inner(host_path, options, None).await
    }

    /// Like [`OpenFileRegistry::get`], additionally having the new handle
    /// hold a per-file lock from `lock_manager` (keyed by `dir_id`/`filename`)
    /// for as long as it stays open.
    #[instrument(skip(self, options, lock_manager), fields(path = %host_path.display()))]
    pub async fn get_with_lock(
        &self,
        host_path: &Path,
        options: OpenOptions,
        lock_manager: Arc<VaultLockManager>,
        dir_id: DirId,
        filename: String,
    ) -> Result<Arc<OpenFile>, RegistryError> {
        self.get_inner(host_path, options, Some((lock_manager, dir_id, filename))).await
    }

    async fn get_inner(
        &self,
        host_path: &Path,
        mut options: OpenOptions,
        lock_context: Option<(Arc<VaultLockManager>, DirId, String)>,
    ) -> Result<Arc<OpenFile>, RegistryError> {
        if self.readonly {
            if !options.readonly && (options.create || options.create_new || options.truncate_existing) {
                return Err(RegistryError::ReadOnly);
            }
            options.readonly = true;
        }

        let normalized = normalize(host_path);

        if let Some(existing) = self.entries.get(&normalized) {
            existing.open(options).await?;
            return Ok(Arc::clone(&existing));
        }

        let mut file = OpenFile::new(normalized.clone(), Arc::clone(&self.cryptor), Arc::clone(&self.master_key));
        if let Some((lock_manager, dir_id, filename)) = lock_context {
            file = file.with_lock(lock_manager, dir_id, filename);
        }
        let file = Arc::new(file);
        file.open(options).await?;
        self.entries.insert(normalized, Arc::clone(&file));
        Ok(file)
    }

    /// Close one reference to `host_path`'s `OpenFile`, removing it from the
    /// registry once its open count reaches zero.
    #[instrument(skip(self), fields(path = %host_path.display()))]
    pub async fn close(&self, host_path: &Path) -> Result<(), RegistryError> {
        let normalized = normalize(host_path);
        let Some(file) = self.entries.get(&normalized).map(|e| Arc::clone(&e)) else {
            return Ok(());
        };

        let fully_closed = file.close().await?;
        if fully_closed {
            self.entries.remove(&normalized);
        }
        Ok(())
    }

    /// Look up an already-open handle without opening or creating one.
    pub fn peek(&self, host_path: &Path) -> Option<Arc<OpenFile>> {
        self.entries.get(&normalize(host_path)).map(|e| Arc::clone(&e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.to_path_buf()
}
