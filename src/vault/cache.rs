//! Bounded, write-back cache of a single file's plaintext chunks.
//!
//! A [`ChunkCache`] sits between an [`crate::vault::openfile::OpenFile`] and the
//! ciphertext on disk. Reads and writes operate on decrypted chunks; a chunk
//! evicted from the bounded LRU is re-encrypted and flushed to the host file
//! if it was modified. Flush failures during eviction (the caller isn't
//! necessarily the one who dirtied the chunk) are queued rather than
//! propagated, and surface the next time the cache is flushed or the file is
//! closed — mirroring how a page cache reports write-back failures on the
//! next `fsync` rather than on the write that triggered eviction.

use std::io::SeekFrom;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use lru::LruCache;
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, instrument, trace, warn};

use crate::crypto::cryptor::VaultCryptor;
use crate::fs::file::HEADER_SIZE;

/// Default number of chunks kept resident per open file (~160 KiB of plaintext).
pub const DEFAULT_CAPACITY: usize = 5;

#[derive(Error, Debug)]
pub enum ChunkCacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk authentication failed: {0}")]
    Authentication(String),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    plaintext: Vec<u8>,
    dirty: bool,
}

/// Per-file cache of decrypted chunks, backed by the ciphertext file on disk.
pub struct ChunkCache {
    ciphertext_path: PathBuf,
    cryptor: Arc<dyn VaultCryptor>,
    content_key: [u8; 32],
    header_nonce: [u8; 12],
    chunks: LruCache<u64, CacheEntry>,
    pending_write_errors: Vec<ChunkCacheError>,
}

impl ChunkCache {
    pub fn new(
        ciphertext_path: PathBuf,
        cryptor: Arc<dyn VaultCryptor>,
        content_key: [u8; 32],
        header_nonce: [u8; 12],
    ) -> Self {
        Self::with_capacity(ciphertext_path, cryptor, content_key, header_nonce, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(
        ciphertext_path: PathBuf,
        cryptor: Arc<dyn VaultCryptor>,
        content_key: [u8; 32],
        header_nonce: [u8; 12],
        capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            ciphertext_path,
            cryptor,
            content_key,
            header_nonce,
            chunks: LruCache::new(capacity),
            pending_write_errors: Vec::new(),
        }
    }

    /// Maximum cleartext bytes held in a single cached chunk.
    pub fn chunk_payload_size(&self) -> usize {
        self.cryptor.chunk_payload_size()
    }

    /// Per-chunk ciphertext overhead (12-byte nonce + 16-byte GCM tag).
    pub fn chunk_ciphertext_overhead(&self) -> usize {
        28
    }

    fn chunk_ciphertext_size(&self) -> usize {
        self.chunk_payload_size() + self.chunk_ciphertext_overhead()
    }

    fn ciphertext_offset(&self, chunk_index: u64) -> u64 {
        HEADER_SIZE as u64 + chunk_index * self.chunk_ciphertext_size() as u64
    }

    /// Read a chunk's plaintext, loading and decrypting it from disk on a
    /// cache miss. Reads past the end of the ciphertext file return an empty
    /// chunk (a sparse gap, or the chunk just past the current end-of-file).
    #[instrument(skip(self), fields(path = %self.ciphertext_path.display(), chunk_index))]
    pub async fn read_chunk(&mut self, chunk_index: u64) -> Result<Vec<u8>, ChunkCacheError> {
        if let Some(entry) = self.chunks.get(&chunk_index) {
            trace!("chunk cache hit");
            return Ok(entry.plaintext.clone());
        }

        trace!("chunk cache miss, loading from disk");
        let plaintext = self.load_chunk_from_disk(chunk_index).await?;
        self.insert(chunk_index, CacheEntry { plaintext: plaintext.clone(), dirty: false }).await;
        Ok(plaintext)
    }

    async fn load_chunk_from_disk(&self, chunk_index: u64) -> Result<Vec<u8>, ChunkCacheError> {
        let mut file = match OpenOptions::new().read(true).open(&self.ciphertext_path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let offset = self.ciphertext_offset(chunk_index);
        let file_len = file.metadata().await?.len();
        if offset >= file_len {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(offset)).await?;
        let remaining = (file_len - offset).min(self.chunk_ciphertext_size() as u64) as usize;
        let mut ciphertext = vec![0u8; remaining];
        file.read_exact(&mut ciphertext).await?;

        self.cryptor
            .decrypt_chunk(chunk_index, &ciphertext, &self.content_key, &self.header_nonce)
            .map_err(|e| ChunkCacheError::Authentication(e.to_string()))
    }

    /// Overwrite a chunk's plaintext in the cache, marking it dirty. The
    /// chunk is not written to disk until evicted or flushed.
    #[instrument(skip(self, plaintext), fields(path = %self.ciphertext_path.display(), chunk_index, len = plaintext.len()))]
    pub async fn write_chunk(&mut self, chunk_index: u64, plaintext: Vec<u8>) -> Result<(), ChunkCacheError> {
        debug_assert!(plaintext.len() <= self.chunk_payload_size());
        self.insert(chunk_index, CacheEntry { plaintext, dirty: true }).await;
        Ok(())
    }

    async fn insert(&mut self, chunk_index: u64, entry: CacheEntry) {
        if let Some((evicted_index, evicted_entry)) = self.chunks.push(chunk_index, entry) {
            if evicted_index != chunk_index && evicted_entry.dirty {
                if let Err(e) = self.flush_entry(evicted_index, &evicted_entry).await {
                    warn!(chunk_index = evicted_index, error = %e, "deferred write-back failure on eviction");
                    self.pending_write_errors.push(e);
                }
            }
        }
    }

    async fn flush_entry(&self, chunk_index: u64, entry: &CacheEntry) -> Result<(), ChunkCacheError> {
        let ciphertext = self
            .cryptor
            .encrypt_chunk(chunk_index, &entry.plaintext, &self.content_key, &self.header_nonce)
            .map_err(|e| ChunkCacheError::Authentication(e.to_string()))?;

        let mut file = OpenOptions::new().write(true).create(true).open(&self.ciphertext_path).await?;
        let offset = self.ciphertext_offset(chunk_index);
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(&ciphertext).await?;
        Ok(())
    }

    /// Write back every dirty chunk currently cached, draining any
    /// previously deferred eviction errors first.
    #[instrument(skip(self), fields(path = %self.ciphertext_path.display()))]
    pub async fn flush(&mut self) -> Result<(), ChunkCacheError> {
        if let Some(err) = self.pending_write_errors.drain(..).next() {
            return Err(err);
        }

        let dirty: Vec<(u64, CacheEntry)> = self
            .chunks
            .iter()
            .filter(|(_, e)| e.dirty)
            .map(|(k, v)| (*k, v.clone()))
            .collect();

        for (index, entry) in &dirty {
            self.flush_entry(*index, entry).await?;
        }

        for (index, _) in dirty {
            if let Some(entry) = self.chunks.get_mut(&index) {
                entry.dirty = false;
            }
        }

        debug!("flushed all dirty chunks");
        Ok(())
    }

    /// Any write-back errors queued since the last successful flush.
    pub fn take_pending_errors(&mut self) -> Vec<ChunkCacheError> {
        std::mem::take(&mut self.pending_write_errors)
    }

    /// Drop cached entries at or beyond `keep_through + 1` without flushing
    /// them. Used after truncating the host file out from under the cache,
    /// where those chunks no longer correspond to anything on disk.
    pub fn discard_after(&mut self, keep_through: Option<u64>) {
        let stale: Vec<u64> = self
            .chunks
            .iter()
            .map(|(k, _)| *k)
            .filter(|k| keep_through.map(|keep| *k > keep).unwrap_or(true))
            .collect();
        for index in stale {
            self.chunks.pop(&index);
        }
    }
}
