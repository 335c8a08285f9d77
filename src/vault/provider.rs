//! The vault's top-level dispatch surface: resolves cleartext paths into
//! ciphertext storage locations and wires together [`OpenFileRegistry`],
//! [`DirectoryLister`], [`LongNameStore`], and the pure path math in
//! [`VaultCore`].
//!
//! `open`/`create` return the [`OpenFile`] handle directly; callers drive
//! `read`/`write`/`truncate`/`force` on it and call [`Provider::close`] when
//! done. Everything above the single-handle level (listing, attributes,
//! symlinks, directory and entry lifecycle, copy) is dispatched by path here.
//!
//! # Reference Implementation
//! - Java: [`CryptoFileSystemProvider`](https://github.com/cryptomator/cryptofs/blob/develop/src/main/java/org/cryptomator/cryptofs/CryptoFileSystemProvider.java),
//!   [`CryptoFileSystemImpl`](https://github.com/cryptomator/cryptofs/blob/develop/src/main/java/org/cryptomator/cryptofs/CryptoFileSystemImpl.java)

use std::path::PathBuf;
use std::sync::Arc;

use tracing::instrument;

use crate::crypto::cryptor::{SivGcmCryptor, VaultCryptor};
use crate::crypto::keys::MasterKey;
use crate::error::VaultError;
use crate::fs::file::encrypt_dir_id_backup;
use crate::vault::attributes::{read_attributes, Attributes};
use crate::vault::config::CipherCombo;
use crate::vault::creator::VaultCreator;
use crate::vault::directory::{DirEntry, DirectoryLister, EntryKind};
use crate::vault::locks::{VaultLockManager, VaultLockRegistry};
use crate::vault::longname::LongNameStore;
use crate::vault::ops::core::VaultCore;
use crate::vault::ops::helpers::{
    calculate_directory_lookup_paths, calculate_file_lookup_paths, calculate_symlink_lookup_paths,
    CONTENTS_FILE, DIR_MARKER, SYMLINK_MARKER,
};
use crate::vault::openfile::{OpenFile, OpenOptions};
use crate::vault::path::{DirId, VaultPath};
use crate::vault::registry::OpenFileRegistry;

/// Where an entry actually lives on the host, and what kind it is.
struct Located {
    entry_path: PathBuf,
    content_path: PathBuf,
    is_shortened: bool,
    kind: EntryKind,
}

/// Configurable options governing a vault's behavior (§6 of the external
/// interface: `readonly`, `maxCleartextNameLength`, `pepper`).
#[derive(Debug, Clone, Default)]
pub struct VaultOptions {
    pub readonly: bool,
    /// Cleartext names longer than this are rejected with `NameTooLong`
    /// before any disk I/O. `None` disables the check.
    pub max_cleartext_name_length: Option<usize>,
    /// Mixed into name and directory-id hashing when non-empty.
    pub pepper: Vec<u8>,
}

impl VaultOptions {
    pub fn readonly() -> Self {
        Self { readonly: true, ..Default::default() }
    }
}

/// Dispatches cleartext-path operations against a single vault.
pub struct Provider {
    core: VaultCore,
    cryptor: Arc<dyn VaultCryptor>,
    master_key: Arc<MasterKey>,
    longnames: LongNameStore,
    open_files: OpenFileRegistry,
    locks: Arc<VaultLockManager>,
    options: VaultOptions,
}

impl Provider {
    pub fn new(vault_path: PathBuf, cryptor: Arc<dyn VaultCryptor>, master_key: Arc<MasterKey>, readonly: bool) -> Self {
        Self::with_options(vault_path, cryptor, master_key, VaultOptions { readonly, ..Default::default() })
    }

    /// Build a `Provider` with full control over [`VaultOptions`].
    pub fn with_options(
        vault_path: PathBuf,
        cryptor: Arc<dyn VaultCryptor>,
        master_key: Arc<MasterKey>,
        options: VaultOptions,
    ) -> Self {
        let locks = VaultLockRegistry::global().get_or_create(&vault_path);
        let core = VaultCore::new(vault_path, CipherCombo::SivGcm).with_pepper(options.pepper.clone());
        let open_files = OpenFileRegistry::new(Arc::clone(&cryptor), Arc::clone(&master_key), options.readonly);
        Self { core, cryptor, master_key, longnames: LongNameStore, open_files, locks, options }
    }

    /// Validate an existing vault's config token and build a `Provider` for it.
    pub async fn open_vault(vault_path: PathBuf, master_key: MasterKey, readonly: bool) -> Result<Self, VaultError> {
        Self::open_vault_with_options(vault_path, master_key, VaultOptions { readonly, ..Default::default() }).await
    }

    /// Like [`Provider::open_vault`], with full control over [`VaultOptions`].
    pub async fn open_vault_with_options(
        vault_path: PathBuf,
        master_key: MasterKey,
        options: VaultOptions,
    ) -> Result<Self, VaultError> {
        let master_key = Arc::new(master_key);
        VaultCreator::open(&vault_path, &master_key).await?;
        Ok(Self::with_options(vault_path, Arc::new(SivGcmCryptor), master_key, options))
    }

    pub fn vault_path(&self) -> &std::path::Path {
        self.core.vault_path()
    }

    fn ensure_writable(&self) -> Result<(), VaultError> {
        if self.options.readonly {
            Err(VaultError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Reject `name` with `NameTooLong` before any disk I/O if it exceeds the
    /// configured `maxCleartextNameLength`. A no-op when the option is unset.
    fn assert_cleartext_name_length_ok(&self, name: &str) -> Result<(), VaultError> {
        let Some(limit) = self.options.max_cleartext_name_length else {
            return Ok(());
        };
        let len = name.len();
        if len > limit {
            return Err(VaultError::NameTooLong { name: name.to_string(), len, limit });
        }
        Ok(())
    }

    fn directory_storage_path(&self, dir_id: &DirId) -> Result<PathBuf, VaultError> {
        Ok(self.core.calculate_directory_storage_path(dir_id, &self.master_key)?)
    }

    async fn read_dir_id(&self, marker_path: &std::path::Path) -> Result<DirId, VaultError> {
        let raw = tokio::fs::read_to_string(marker_path).await?;
        Ok(DirId::from_raw(raw.trim()))
    }

    /// Walk `path`'s ancestors down to the dir_id and storage path of its
    /// immediate parent directory.
    async fn resolve_parent(&self, path: &VaultPath) -> Result<(DirId, PathBuf), VaultError> {
        let mut dir_id = DirId::root();
        let mut storage = self.directory_storage_path(&dir_id)?;

        let ancestors: Vec<String> =
            path.parent().map(|p| p.components().map(str::to_owned).collect()).unwrap_or_default();
        for name in &ancestors {
            let encrypted = self.core.encrypt_filename(name, &dir_id, &self.master_key)?;
            let lookup = calculate_directory_lookup_paths(&storage, &encrypted, self.core.shortening_threshold());
            if !tokio::fs::try_exists(&lookup.content_path).await? {
                return Err(VaultError::not_found(lookup.entry_path));
            }
            dir_id = self.read_dir_id(&lookup.content_path).await?;
            storage = self.directory_storage_path(&dir_id)?;
        }
        Ok((dir_id, storage))
    }

    /// Classify and locate whatever lives at `path` under its parent directory.
    async fn locate(&self, path: &VaultPath) -> Result<Located, VaultError> {
        let (parent_dir_id, parent_storage) = self.resolve_parent(path).await?;
        let name = path.file_name().ok_or_else(|| VaultError::not_found(path.as_str()))?;
        let encrypted_name = self.core.encrypt_filename(name, &parent_dir_id, &self.master_key)?;
        let threshold = self.core.shortening_threshold();
        let is_shortened = self.longnames.needs_shortening(&encrypted_name, threshold);
        let entry_path = self.longnames.entry_path(&parent_storage, &encrypted_name, threshold);

        if !tokio::fs::try_exists(&entry_path).await? {
            return Err(VaultError::not_found(entry_path));
        }

        let metadata = tokio::fs::metadata(&entry_path).await?;
        if metadata.is_file() {
            return Ok(Located { content_path: entry_path.clone(), entry_path, is_shortened, kind: EntryKind::File });
        }

        let symlink_marker = entry_path.join(SYMLINK_MARKER);
        if tokio::fs::try_exists(&symlink_marker).await? {
            return Ok(Located { content_path: symlink_marker, entry_path, is_shortened, kind: EntryKind::Symlink });
        }
        let dir_marker = entry_path.join(DIR_MARKER);
        if tokio::fs::try_exists(&dir_marker).await? {
            let dir_id = self.read_dir_id(&dir_marker).await?;
            return Ok(Located { content_path: dir_marker, entry_path, is_shortened, kind: EntryKind::Directory { dir_id } });
        }
        let contents_marker = entry_path.join(CONTENTS_FILE);
        if tokio::fs::try_exists(&contents_marker).await? {
            return Ok(Located { content_path: contents_marker, entry_path, is_shortened, kind: EntryKind::File });
        }

        Err(VaultError::Corrupted(format!("unclassifiable entry at {}", entry_path.display())))
    }

    /// Resolve a directory path (root or otherwise) to its dir_id and storage path.
    async fn directory_location(&self, path: &VaultPath) -> Result<(DirId, PathBuf), VaultError> {
        if path.is_root() {
            let dir_id = DirId::root();
            let storage = self.directory_storage_path(&dir_id)?;
            return Ok((dir_id, storage));
        }
        let located = self.locate(path).await?;
        match located.kind {
            EntryKind::Directory { dir_id } => {
                let storage = self.directory_storage_path(&dir_id)?;
                Ok((dir_id, storage))
            }
            _ => Err(VaultError::NotADirectory(located.entry_path)),
        }
    }

    // ------------------------------------------------------------------
    // Listing and attributes
    // ------------------------------------------------------------------

    #[instrument(skip(self), fields(path = %path))]
    pub async fn list(&self, path: &VaultPath) -> Result<Vec<DirEntry>, VaultError> {
        let (dir_id, storage) = self.directory_location(path).await?;
        let _guard = self.locks.directory_read(&dir_id).await;
        let lister = DirectoryLister::with_pepper(self.cryptor.as_ref(), &self.master_key, &self.options.pepper);
        Ok(lister.list(&storage, &dir_id).await?)
    }

    #[instrument(skip(self), fields(path = %path))]
    pub async fn read_attributes(&self, path: &VaultPath) -> Result<Attributes, VaultError> {
        if path.is_root() {
            let storage = self.directory_storage_path(&DirId::root())?;
            return Ok(read_attributes(&storage, None, self.cryptor.as_ref()).await?);
        }

        let located = self.locate(path).await?;
        match located.kind {
            EntryKind::Directory { .. } => Ok(read_attributes(&located.entry_path, None, self.cryptor.as_ref()).await?),
            EntryKind::Symlink => {
                let encrypted = tokio::fs::read(&located.content_path).await?;
                let target = self.core.decrypt_symlink_target(&encrypted, &self.master_key)?;
                let metadata = tokio::fs::metadata(&located.content_path).await?;
                Ok(Attributes {
                    size: target.len() as u64,
                    is_directory: false,
                    is_symlink: true,
                    last_modified: metadata.modified().ok(),
                })
            }
            EntryKind::File => {
                let handle = self.open_files.peek(&located.content_path);
                Ok(read_attributes(&located.content_path, handle.as_deref(), self.cryptor.as_ref()).await?)
            }
        }
    }

    // ------------------------------------------------------------------
    // File handles
    // ------------------------------------------------------------------

    /// Resolve `path` to its ciphertext file and open (or create) a handle.
    #[instrument(skip(self, options), fields(path = %path))]
    pub async fn open(&self, path: &VaultPath, options: OpenOptions) -> Result<Arc<OpenFile>, VaultError> {
        if self.options.readonly && !options.readonly && (options.create || options.create_new || options.truncate_existing) {
            return Err(VaultError::ReadOnly);
        }

        let (parent_dir_id, parent_storage) = self.resolve_parent(path).await?;
        let name = path.file_name().ok_or_else(|| VaultError::not_found(path.as_str()))?;
        if options.create || options.create_new {
            self.assert_cleartext_name_length_ok(name)?;
        }
        let encrypted_name = self.core.encrypt_filename(name, &parent_dir_id, &self.master_key)?;
        let threshold = self.core.shortening_threshold();
        let lookup = calculate_file_lookup_paths(&parent_storage, &encrypted_name, threshold);

        if options.create_new && tokio::fs::try_exists(&lookup.entry_path).await? {
            return Err(VaultError::AlreadyExists(lookup.entry_path));
        }

        if lookup.is_shortened && !tokio::fs::try_exists(&lookup.entry_path).await? {
            if !(options.create || options.create_new) {
                return Err(VaultError::not_found(lookup.entry_path));
            }
            self.longnames.write(&lookup.entry_path, &encrypted_name).await?;
        }

        Ok(self
            .open_files
            .get_with_lock(
                &lookup.content_path,
                options,
                Arc::clone(&self.locks),
                parent_dir_id,
                name.to_string(),
            )
            .await?)
    }

    pub async fn create(&self, path: &VaultPath) -> Result<Arc<OpenFile>, VaultError> {
        self.open(path, OpenOptions { create: true, create_new: true, ..Default::default() }).await
    }

    /// Release one reference to `path`'s open handle, flushing on last close.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn close(&self, path: &VaultPath) -> Result<(), VaultError> {
        let located = self.locate(path).await?;
        self.open_files.close(&located.content_path).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Directories
    // ------------------------------------------------------------------

    #[instrument(skip(self), fields(path = %path))]
    pub async fn create_directory(&self, path: &VaultPath) -> Result<(), VaultError> {
        self.ensure_writable()?;
        let (parent_dir_id, parent_storage) = self.resolve_parent(path).await?;
        let _guard = self.locks.directory_write(&parent_dir_id).await;
        let name = path.file_name().ok_or_else(|| VaultError::not_found(path.as_str()))?;
        self.assert_cleartext_name_length_ok(name)?;
        let encrypted_name = self.core.encrypt_filename(name, &parent_dir_id, &self.master_key)?;
        let threshold = self.core.shortening_threshold();
        let lookup = calculate_directory_lookup_paths(&parent_storage, &encrypted_name, threshold);

        if tokio::fs::try_exists(&lookup.entry_path).await? {
            return Err(VaultError::AlreadyExists(lookup.entry_path));
        }

        tokio::fs::create_dir_all(&lookup.entry_path).await?;
        if lookup.is_shortened {
            self.longnames.write(&lookup.entry_path, &encrypted_name).await?;
        }

        let new_dir_id = self.core.generate_dir_id();
        tokio::fs::write(&lookup.content_path, new_dir_id.as_str()).await?;

        let new_storage = self.directory_storage_path(&new_dir_id)?;
        tokio::fs::create_dir_all(&new_storage).await?;
        let backup = encrypt_dir_id_backup(new_dir_id.as_str(), &self.master_key)
            .map_err(|e| VaultError::Corrupted(e.to_string()))?;
        tokio::fs::write(new_storage.join("dirid.c9r"), backup).await?;

        Ok(())
    }

    /// Remove an empty directory's storage subtree and its parent entry node.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn delete_directory(&self, path: &VaultPath) -> Result<(), VaultError> {
        self.ensure_writable()?;
        let located = self.locate(path).await?;
        let EntryKind::Directory { dir_id } = located.kind else {
            return Err(VaultError::NotADirectory(located.entry_path));
        };
        let _guard = self.locks.directory_write(&dir_id).await;

        let storage = self.directory_storage_path(&dir_id)?;
        if tokio::fs::try_exists(&storage).await? {
            let mut entries = tokio::fs::read_dir(&storage).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_name() != "dirid.c9r" {
                    return Err(VaultError::DirectoryNotEmpty(located.entry_path));
                }
            }
            tokio::fs::remove_dir_all(&storage).await?;
        }

        tokio::fs::remove_dir_all(&located.entry_path).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Files and symlinks
    // ------------------------------------------------------------------

    #[instrument(skip(self), fields(path = %path))]
    pub async fn delete_file(&self, path: &VaultPath) -> Result<(), VaultError> {
        self.ensure_writable()?;
        let located = self.locate(path).await?;
        if let EntryKind::Directory { .. } = located.kind {
            return Err(VaultError::IsADirectory(located.entry_path));
        }

        let metadata = tokio::fs::metadata(&located.entry_path).await?;
        if metadata.is_dir() {
            tokio::fs::remove_dir_all(&located.entry_path).await?;
        } else {
            tokio::fs::remove_file(&located.entry_path).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, target), fields(path = %path))]
    pub async fn create_symlink(&self, path: &VaultPath, target: &str) -> Result<(), VaultError> {
        self.ensure_writable()?;
        let (parent_dir_id, parent_storage) = self.resolve_parent(path).await?;
        let name = path.file_name().ok_or_else(|| VaultError::not_found(path.as_str()))?;
        self.assert_cleartext_name_length_ok(name)?;
        let encrypted_name = self.core.encrypt_filename(name, &parent_dir_id, &self.master_key)?;
        let threshold = self.core.shortening_threshold();
        let lookup = calculate_symlink_lookup_paths(&parent_storage, &encrypted_name, threshold);

        if tokio::fs::try_exists(&lookup.entry_path).await? {
            return Err(VaultError::AlreadyExists(lookup.entry_path));
        }

        tokio::fs::create_dir_all(&lookup.entry_path).await?;
        if lookup.is_shortened {
            self.longnames.write(&lookup.entry_path, &encrypted_name).await?;
        }

        let encrypted_target = self.core.encrypt_symlink_target(target, &self.master_key)?;
        tokio::fs::write(&lookup.content_path, encrypted_target).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    pub async fn read_symlink(&self, path: &VaultPath) -> Result<String, VaultError> {
        let located = self.locate(path).await?;
        if located.kind != EntryKind::Symlink {
            return Err(VaultError::Corrupted(format!("not a symlink: {path}")));
        }
        let encrypted = tokio::fs::read(&located.content_path).await?;
        Ok(self.core.decrypt_symlink_target(&encrypted, &self.master_key)?)
    }

    // ------------------------------------------------------------------
    // Rename and copy
    // ------------------------------------------------------------------

    /// Move an entry to a new path. For directories this only relocates the
    /// `.c9r`/`.c9s` pointer node; the directory's own `d/AA/BB` storage and
    /// dir_id never change. Does not repack a file's `.c9s`/`.c9r` container
    /// if the destination name's shortening status differs from the source's.
    #[instrument(skip(self), fields(from = %from, to = %to))]
    pub async fn rename(&self, from: &VaultPath, to: &VaultPath) -> Result<(), VaultError> {
        self.ensure_writable()?;
        let (from_parent_dir_id, _) = self.resolve_parent(from).await?;
        let (dest_parent_dir_id, dest_parent_storage) = self.resolve_parent(to).await?;
        let _guards = self.locks.lock_directories_write_ordered(&[&from_parent_dir_id, &dest_parent_dir_id]).await;

        let source = self.locate(from).await?;
        let dest_name = to.file_name().ok_or_else(|| VaultError::not_found(to.as_str()))?;
        self.assert_cleartext_name_length_ok(dest_name)?;
        let dest_encrypted_name = self.core.encrypt_filename(dest_name, &dest_parent_dir_id, &self.master_key)?;
        let threshold = self.core.shortening_threshold();
        let dest_entry_path = self.longnames.entry_path(&dest_parent_storage, &dest_encrypted_name, threshold);

        if tokio::fs::try_exists(&dest_entry_path).await? {
            return Err(VaultError::AlreadyExists(dest_entry_path));
        }
        if let Some(parent) = dest_entry_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::rename(&source.entry_path, &dest_entry_path).await?;

        if self.longnames.needs_shortening(&dest_encrypted_name, threshold) {
            self.longnames.write(&dest_entry_path, &dest_encrypted_name).await?;
        }

        Ok(())
    }

    /// Copy `from` in this vault to `to` in `dest` (which may be this same
    /// vault or a different one) by streaming cleartext through both ends.
    #[instrument(skip(self, dest), fields(from = %from, to = %to))]
    pub async fn copy_to(&self, from: &VaultPath, dest: &Provider, to: &VaultPath) -> Result<(), VaultError> {
        self.ensure_writable()?;
        dest.ensure_writable()?;

        let source = self.open(from, OpenOptions::default()).await?;
        let size = source.size().await;
        let dest_file = dest.create(to).await?;

        let mut position = 0u64;
        let mut buf = vec![0u8; 256 * 1024];
        while position < size {
            let want = buf.len().min((size - position) as usize);
            let n = source.read(position, &mut buf[..want]).await?;
            if n == 0 {
                break;
            }
            dest_file.write(position, &buf[..n]).await?;
            position += n as u64;
        }
        dest_file.force().await?;

        self.close(from).await?;
        dest.close(to).await?;
        Ok(())
    }

    pub async fn copy(&self, from: &VaultPath, to: &VaultPath) -> Result<(), VaultError> {
        self.copy_to(from, self, to).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn provider(readonly: bool) -> (tempfile::TempDir, Provider) {
        let dir = tempdir().unwrap();
        let master_key = MasterKey::random().unwrap();
        VaultCreator::create(dir.path(), &master_key, CipherCombo::SivGcm).await.unwrap();
        let provider = Provider::new(dir.path().to_path_buf(), Arc::new(SivGcmCryptor), Arc::new(master_key), readonly);
        (dir, provider)
    }

    #[tokio::test]
    async fn create_write_read_and_list_round_trip() {
        let (_dir, provider) = provider(false).await;
        let path = VaultPath::new("report.txt");

        let file = provider.create(&path).await.unwrap();
        file.write(0, b"hello vault").await.unwrap();
        file.force().await.unwrap();
        provider.close(&path).await.unwrap();

        let entries = provider.list(&VaultPath::root()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].cleartext_name, "report.txt");

        let attrs = provider.read_attributes(&path).await.unwrap();
        assert_eq!(attrs.size, 11);
    }

    #[tokio::test]
    async fn nested_directories_resolve_through_parent_chain() {
        let (_dir, provider) = provider(false).await;
        let docs = VaultPath::new("docs");
        provider.create_directory(&docs).await.unwrap();

        let nested = VaultPath::new("docs/notes.txt");
        let file = provider.create(&nested).await.unwrap();
        file.write(0, b"nested").await.unwrap();
        provider.close(&nested).await.unwrap();

        let entries = provider.list(&docs).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].cleartext_name, "notes.txt");
    }

    #[tokio::test]
    async fn symlink_round_trips() {
        let (_dir, provider) = provider(false).await;
        let link = VaultPath::new("shortcut");
        provider.create_symlink(&link, "/target/path").await.unwrap();

        let target = provider.read_symlink(&link).await.unwrap();
        assert_eq!(target, "/target/path");

        let attrs = provider.read_attributes(&link).await.unwrap();
        assert!(attrs.is_symlink);
    }

    #[tokio::test]
    async fn rename_moves_entry_under_new_parent() {
        let (_dir, provider) = provider(false).await;
        let original = VaultPath::new("a.txt");
        let file = provider.create(&original).await.unwrap();
        file.write(0, b"data").await.unwrap();
        provider.close(&original).await.unwrap();

        let renamed = VaultPath::new("b.txt");
        provider.rename(&original, &renamed).await.unwrap();

        assert!(provider.locate(&original).await.is_err());
        let attrs = provider.read_attributes(&renamed).await.unwrap();
        assert_eq!(attrs.size, 4);
    }

    #[tokio::test]
    async fn delete_directory_rejects_non_empty() {
        let (_dir, provider) = provider(false).await;
        let docs = VaultPath::new("docs");
        provider.create_directory(&docs).await.unwrap();
        let file = provider.create(&VaultPath::new("docs/a.txt")).await.unwrap();
        file.force().await.unwrap();
        provider.close(&VaultPath::new("docs/a.txt")).await.unwrap();

        let result = provider.delete_directory(&docs).await;
        assert!(matches!(result, Err(VaultError::DirectoryNotEmpty(_))));
    }

    #[tokio::test]
    async fn readonly_provider_rejects_mutation() {
        let (_dir, provider) = provider(true).await;
        let result = provider.create_directory(&VaultPath::new("docs")).await;
        assert!(matches!(result, Err(VaultError::ReadOnly)));
    }

    #[tokio::test]
    async fn create_rejects_name_exceeding_configured_length_cap() {
        let dir = tempdir().unwrap();
        let master_key = MasterKey::random().unwrap();
        VaultCreator::create(dir.path(), &master_key, CipherCombo::SivGcm).await.unwrap();
        let options = VaultOptions { max_cleartext_name_length: Some(5), ..Default::default() };
        let provider =
            Provider::with_options(dir.path().to_path_buf(), Arc::new(SivGcmCryptor), Arc::new(master_key), options);

        let result = provider.create(&VaultPath::new("too-long-name.txt")).await;
        assert!(matches!(result, Err(VaultError::NameTooLong { .. })));

        provider.create(&VaultPath::new("ok.txt")).await.unwrap();
    }

    #[tokio::test]
    async fn create_directory_rejects_name_exceeding_configured_length_cap() {
        let dir = tempdir().unwrap();
        let master_key = MasterKey::random().unwrap();
        VaultCreator::create(dir.path(), &master_key, CipherCombo::SivGcm).await.unwrap();
        let options = VaultOptions { max_cleartext_name_length: Some(5), ..Default::default() };
        let provider =
            Provider::with_options(dir.path().to_path_buf(), Arc::new(SivGcmCryptor), Arc::new(master_key), options);

        let result = provider.create_directory(&VaultPath::new("too-long-name")).await;
        assert!(matches!(result, Err(VaultError::NameTooLong { .. })));
    }

    #[tokio::test]
    async fn create_symlink_rejects_name_exceeding_configured_length_cap() {
        let dir = tempdir().unwrap();
        let master_key = MasterKey::random().unwrap();
        VaultCreator::create(dir.path(), &master_key, CipherCombo::SivGcm).await.unwrap();
        let options = VaultOptions { max_cleartext_name_length: Some(5), ..Default::default() };
        let provider =
            Provider::with_options(dir.path().to_path_buf(), Arc::new(SivGcmCryptor), Arc::new(master_key), options);

        let result = provider.create_symlink(&VaultPath::new("too-long-name"), "/target").await;
        assert!(matches!(result, Err(VaultError::NameTooLong { .. })));
    }

    #[tokio::test]
    async fn peppered_provider_round_trips_create_write_read_and_list() {
        let dir = tempdir().unwrap();
        let master_key = MasterKey::random().unwrap();
        let pepper = b"vault-pepper".to_vec();
        VaultCreator::create_with_pepper(dir.path(), &master_key, CipherCombo::SivGcm, &pepper).await.unwrap();
        let options = VaultOptions { pepper: pepper.clone(), ..Default::default() };
        let provider =
            Provider::with_options(dir.path().to_path_buf(), Arc::new(SivGcmCryptor), Arc::new(master_key), options);

        let path = VaultPath::new("report.txt");
        let file = provider.create(&path).await.unwrap();
        file.write(0, b"hello peppered vault").await.unwrap();
        file.force().await.unwrap();
        provider.close(&path).await.unwrap();

        let entries = provider.list(&VaultPath::root()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].cleartext_name, "report.txt");
    }

    #[tokio::test]
    async fn two_providers_on_the_same_vault_path_share_a_lock_manager() {
        let (dir, provider_a) = provider(false).await;
        let master_key = MasterKey::random().unwrap();
        let provider_b =
            Provider::new(dir.path().to_path_buf(), Arc::new(SivGcmCryptor), Arc::new(master_key), false);
        assert!(Arc::ptr_eq(&provider_a.locks, &provider_b.locks));
    }

    #[tokio::test]
    async fn copy_across_providers_preserves_content() {
        let (_dir_a, provider_a) = provider(false).await;
        let (_dir_b, provider_b) = provider(false).await;

        let source = VaultPath::new("source.bin");
        let file = provider_a.create(&source).await.unwrap();
        let payload: Vec<u8> = (0..(64 * 1024)).map(|i| (i % 251) as u8).collect();
        file.write(0, &payload).await.unwrap();
        provider_a.close(&source).await.unwrap();

        let dest = VaultPath::new("copied.bin");
        provider_a.copy_to(&source, &provider_b, &dest).await.unwrap();

        let attrs = provider_b.read_attributes(&dest).await.unwrap();
        assert_eq!(attrs.size, payload.len() as u64);
    }
}
