//! Per-ciphertext-file open state: header, logical size, and the chunk cache,
//! serialized behind a single lock so `read`/`write`/`truncate`/`force`/`close`
//! observe each other in program order.
//!
//! Unlike the real Cryptomator header format (a fixed-size opaque blob), the
//! logical (cleartext) file size is not stored inside the header; it is
//! derived from the ciphertext length the way the on-disk format already
//! implies, the same as the upstream implementation does. `OpenFile` tracks
//! it in memory as the authoritative value for already-open files so
//! concurrent readers see writes made through the same handle immediately.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OwnedRwLockReadGuard, OwnedRwLockWriteGuard};
use tracing::{debug, instrument, trace};

use crate::crypto::cryptor::VaultCryptor;
use crate::crypto::keys::MasterKey;
use crate::fs::file::{CHUNK_OVERHEAD, HEADER_SIZE};
use crate::vault::cache::{ChunkCache, ChunkCacheError};
use crate::vault::locks::{cleartext_range_to_ciphertext_range, VaultLockManager};
use crate::vault::ops::cleartext_size_from_ciphertext_len;
use crate::vault::path::DirId;

#[derive(Error, Debug)]
pub enum OpenFileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk cache error: {0}")]
    Cache(#[from] ChunkCacheError),

    #[error("header decryption failed: {0}")]
    Header(String),

    #[error("operation not permitted on a read-only handle")]
    ReadOnly,

    #[error("file handle is closed")]
    Closed,
}

/// Options under which a host ciphertext file is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    pub create: bool,
    pub create_new: bool,
    pub truncate_existing: bool,
    pub readonly: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Open,
    Closing,
    Closed,
}

/// Held for the lifetime of an open handle once acquired, translating the
/// handle's read/write mode to the matching [`VaultLockManager`] file lock.
enum HandleLock {
    Read(OwnedRwLockReadGuard<()>),
    Write(OwnedRwLockWriteGuard<()>),
}

struct Inner {
    state: State,
    open_count: usize,
    content_key: [u8; 32],
    header_nonce: [u8; 12],
    size: u64,
    readonly: bool,
    cache: ChunkCache,
    lock_guard: Option<HandleLock>,
}

/// Live state for one ciphertext file, shared by every caller with it open.
///
/// At most one `OpenFile` should exist per normalized host path at a time;
/// enforcing that is [`crate::vault::registry::OpenFileRegistry`]'s job, not
/// this type's.
pub struct OpenFile {
    host_path: PathBuf,
    cryptor: Arc<dyn VaultCryptor>,
    master_key: Arc<MasterKey>,
    inner: Mutex<Inner>,
    lock_context: Option<(Arc<VaultLockManager>, DirId, String)>,
}

impl OpenFile {
    /// Construct an unopened handle. Call [`OpenFile::open`] before using it.
    pub fn new(host_path: PathBuf, cryptor: Arc<dyn VaultCryptor>, master_key: Arc<MasterKey>) -> Self {
        Self {
            host_path,
            cryptor,
            master_key,
            inner: Mutex::new(Inner {
                state: State::Uninitialized,
                open_count: 0,
                content_key: [0u8; 32],
                header_nonce: [0u8; 12],
                size: 0,
                readonly: false,
                cache: ChunkCache::new(PathBuf::new(), Arc::new(crate::crypto::cryptor::SivGcmCryptor), [0u8; 32], [0u8; 12]),
                lock_guard: None,
            }),
            lock_context: None,
        }
    }

    /// Like [`OpenFile::new`], additionally acquiring a per-file lock from
    /// `lock_manager` (keyed by `dir_id`/`filename`) for the lifetime of each
    /// open handle: a shared lock for read-only opens, exclusive otherwise.
    pub fn with_lock(mut self, lock_manager: Arc<VaultLockManager>, dir_id: DirId, filename: String) -> Self {
        self.lock_context = Some((lock_manager, dir_id, filename));
        self
    }

    pub fn host_path(&self) -> &Path {
        &self.host_path
    }

    /// Increment the open count, loading or creating the header on first open.
    #[instrument(skip(self, options), fields(path = %self.host_path.display()))]
    pub async fn open(&self, options: OpenOptions) -> Result<(), OpenFileError> {
        let mut inner = self.inner.lock().await;

        if inner.state == State::Open {
            inner.open_count += 1;
            return Ok(());
        }

        let fresh = options.create_new || options.truncate_existing || !self.host_path.exists();
        if fresh && !options.create && !options.create_new && !options.truncate_existing {
            return Err(OpenFileError::Io(std::io::Error::from(std::io::ErrorKind::NotFound)));
        }

        let (content_key, header_nonce, size) = if fresh {
            let mut content_key = [0u8; 32];
            OsRng.fill_bytes(&mut content_key);
            let header_bytes = self
                .cryptor
                .encrypt_header(&content_key, &self.master_key)
                .map_err(|e| OpenFileError::Header(e.to_string()))?;
            let header_nonce: [u8; 12] = header_bytes[0..12].try_into().expect("header starts with 12-byte nonce");

            if let Some(parent) = self.host_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut file = tokio::fs::File::create(&self.host_path).await?;
            file.write_all(&header_bytes).await?;
            (content_key, header_nonce, 0u64)
        } else {
            let raw = tokio::fs::read(&self.host_path).await?;
            if raw.len() < HEADER_SIZE {
                return Err(OpenFileError::Header("ciphertext shorter than header".into()));
            }
            let (content_key, header_nonce) = self
                .cryptor
                .decrypt_header(&raw[..HEADER_SIZE], &self.master_key)
                .map_err(|e| OpenFileError::Header(e.to_string()))?;
            let size = cleartext_size_from_ciphertext_len(
                raw.len() as u64,
                HEADER_SIZE as u64,
                self.cryptor.chunk_payload_size() as u64,
                CHUNK_OVERHEAD as u64,
            );
            (content_key, header_nonce, size)
        };

        inner.cache = ChunkCache::new(self.host_path.clone(), Arc::clone(&self.cryptor), content_key, header_nonce);
        inner.content_key = content_key;
        inner.header_nonce = header_nonce;
        inner.size = size;
        inner.readonly = options.readonly;

        if let Some((lock_manager, dir_id, filename)) = &self.lock_context {
            inner.lock_guard = Some(if options.readonly {
                HandleLock::Read(lock_manager.file_read(dir_id, filename).await)
            } else {
                HandleLock::Write(lock_manager.file_write(dir_id, filename).await)
            });
        }

        inner.state = State::Open;
        inner.open_count = 1;
        debug!(size, "opened file handle");
        Ok(())
    }

    fn ensure_open(inner: &Inner) -> Result<(), OpenFileError> {
        match inner.state {
            State::Open => Ok(()),
            _ => Err(OpenFileError::Closed),
        }
    }

    /// Current logical (cleartext) size.
    pub async fn size(&self) -> u64 {
        self.inner.lock().await.size
    }

    #[instrument(skip(self, buf), fields(path = %self.host_path.display(), position, len = buf.len()))]
    pub async fn read(&self, position: u64, buf: &mut [u8]) -> Result<usize, OpenFileError> {
        let mut inner = self.inner.lock().await;
        Self::ensure_open(&inner)?;

        if position >= inner.size || buf.is_empty() {
            return Ok(0);
        }

        let payload_size = inner.cache.chunk_payload_size() as u64;
        let to_read = buf.len().min((inner.size - position) as usize);
        let (lock_start, lock_end) = cleartext_range_to_ciphertext_range(
            position,
            to_read as u64,
            HEADER_SIZE as u64,
            payload_size,
            inner.cache.chunk_ciphertext_overhead() as u64 + payload_size,
        );
        trace!(lock_start, lock_end, "ciphertext range covering this read");
        let mut read = 0usize;

        while read < to_read {
            let pos = position + read as u64;
            let chunk_index = pos / payload_size;
            let offset_in_chunk = (pos % payload_size) as usize;

            let chunk = inner.cache.read_chunk(chunk_index).await?;
            let available = chunk.len().saturating_sub(offset_in_chunk);
            if available == 0 {
                break;
            }
            let n = available.min(to_read - read);
            buf[read..read + n].copy_from_slice(&chunk[offset_in_chunk..offset_in_chunk + n]);
            read += n;
        }

        trace!(bytes_read = read, "read");
        Ok(read)
    }

    #[instrument(skip(self, data), fields(path = %self.host_path.display(), position, len = data.len()))]
    pub async fn write(&self, position: u64, data: &[u8]) -> Result<(), OpenFileError> {
        let mut inner = self.inner.lock().await;
        Self::ensure_open(&inner)?;
        if inner.readonly {
            return Err(OpenFileError::ReadOnly);
        }
        if data.is_empty() {
            return Ok(());
        }

        let payload_size = inner.cache.chunk_payload_size() as u64;
        let (lock_start, lock_end) = cleartext_range_to_ciphertext_range(
            position,
            data.len() as u64,
            HEADER_SIZE as u64,
            payload_size,
            inner.cache.chunk_ciphertext_overhead() as u64 + payload_size,
        );
        trace!(lock_start, lock_end, "ciphertext range covering this write");

        if position > inner.size {
            let gap = vec![0u8; (position - inner.size) as usize];
            let old_size = inner.size;
            Self::write_at(&mut inner, old_size, &gap).await?;
        }

        let end = Self::write_at(&mut inner, position, data).await?;
        inner.size = inner.size.max(end);
        Ok(())
    }

    /// Write `data` at `position`, returning the logical end offset reached.
    async fn write_at(inner: &mut Inner, position: u64, data: &[u8]) -> Result<u64, OpenFileError> {
        let payload_size = inner.cache.chunk_payload_size();
        let mut pos = position;
        let mut remaining = data;

        while !remaining.is_empty() {
            let chunk_index = pos / payload_size as u64;
            let offset_in_chunk = (pos % payload_size as u64) as usize;

            let mut chunk = inner.cache.read_chunk(chunk_index).await?;
            if chunk.len() < offset_in_chunk {
                chunk.resize(offset_in_chunk, 0);
            }
            let writable = (payload_size - offset_in_chunk).min(remaining.len());
            let end = offset_in_chunk + writable;
            if chunk.len() < end {
                chunk.resize(end, 0);
            }
            chunk[offset_in_chunk..end].copy_from_slice(&remaining[..writable]);
            inner.cache.write_chunk(chunk_index, chunk).await?;

            pos += writable as u64;
            remaining = &remaining[writable..];
        }

        Ok(pos)
    }

    /// Grow or shrink the logical size, zero-filling on growth and discarding
    /// ciphertext past the new end on shrink.
    #[instrument(skip(self), fields(path = %self.host_path.display(), new_size))]
    pub async fn truncate(&self, new_size: u64) -> Result<(), OpenFileError> {
        let mut inner = self.inner.lock().await;
        Self::ensure_open(&inner)?;
        if inner.readonly {
            return Err(OpenFileError::ReadOnly);
        }

        if new_size > inner.size {
            let gap = vec![0u8; (new_size - inner.size) as usize];
            let old_size = inner.size;
            Self::write_at(&mut inner, old_size, &gap).await?;
            inner.size = new_size;
            return Ok(());
        }

        if new_size == inner.size {
            return Ok(());
        }

        inner.cache.flush().await?;
        let payload_size = inner.cache.chunk_payload_size() as u64;

        let new_chunk_count = if new_size == 0 { 0 } else { (new_size - 1) / payload_size + 1 };

        if new_size > 0 {
            let last_index = new_chunk_count - 1;
            let tail_len = (new_size - last_index * payload_size) as usize;
            let mut tail = inner.cache.read_chunk(last_index).await?;
            tail.truncate(tail_len);
            inner.cache.write_chunk(last_index, tail).await?;
            inner.cache.flush().await?;
        }

        inner.cache.discard_after(if new_size == 0 { None } else { Some(new_chunk_count - 1) });

        inner.size = new_size;
        self.sync_ciphertext_len(&inner).await?;
        Ok(())
    }

    /// Flush dirty chunks to disk, then trim the ciphertext file to the exact
    /// length `inner.size` implies so a subsequent open recovers the same
    /// size from ciphertext length alone, the way the Cryptomator header
    /// (which has no spare bytes for a size field) relies on file length
    /// rather than a stored value.
    #[instrument(skip(self), fields(path = %self.host_path.display()))]
    pub async fn force(&self) -> Result<(), OpenFileError> {
        let mut inner = self.inner.lock().await;
        Self::ensure_open(&inner)?;
        inner.cache.flush().await?;
        self.sync_ciphertext_len(&inner).await?;
        Ok(())
    }

    /// Trim (never grow) the on-disk ciphertext to the length implied by
    /// `inner.size`, discarding any stale trailing bytes a prior shrink left
    /// behind so ciphertext length stays authoritative.
    async fn sync_ciphertext_len(&self, inner: &Inner) -> Result<(), OpenFileError> {
        let payload_size = inner.cache.chunk_payload_size() as u64;
        let chunk_overhead = inner.cache.chunk_ciphertext_overhead() as u64;
        let chunk_count = if inner.size == 0 { 0 } else { (inner.size - 1) / payload_size + 1 };
        let expected_len = HEADER_SIZE as u64 + chunk_count * (payload_size + chunk_overhead);

        let file = match tokio::fs::OpenOptions::new().write(true).open(&self.host_path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let actual_len = file.metadata().await?.len();
        if actual_len > expected_len {
            file.set_len(expected_len).await?;
        }
        Ok(())
    }

    /// Decrement the open count; at zero, flush and release resources.
    #[instrument(skip(self), fields(path = %self.host_path.display()))]
    pub async fn close(&self) -> Result<bool, OpenFileError> {
        let mut inner = self.inner.lock().await;
        if inner.state != State::Open {
            return Ok(true);
        }

        inner.open_count = inner.open_count.saturating_sub(1);
        if inner.open_count > 0 {
            return Ok(false);
        }

        inner.state = State::Closing;
        let result = match inner.cache.flush().await {
            Ok(()) => self.sync_ciphertext_len(&inner).await,
            Err(e) => Err(e.into()),
        };
        inner.state = State::Closed;
        inner.lock_guard = None;
        result?;
        debug!("closed file handle");
        Ok(true)
    }
}
