//! Vault-level abstractions: configuration, path mapping, locking, and the
//! per-file chunk cache.
//!
//! The provider surface for this crate is built in `provider`, `openfile`,
//! and `directory` against the `MasterKeySource`-backed key model.

pub mod attributes;
pub mod cache;
pub mod config;
pub mod creator;
pub mod directory;
pub mod info;
pub mod locks;
pub mod longname;
pub mod openfile;
pub mod ops;
pub mod path;
pub mod provider;
pub mod registry;
pub mod uri;

pub use cache::{ChunkCache, ChunkCacheError};
pub use config::{
    create_vault_config, validate_vault_claims, CipherCombo, CiphertextDir, ClaimValidationError,
    VaultConfig, VaultConfigCreationError, VaultConfigurationClaims, DEFAULT_SHORTENING_THRESHOLD,
    SUPPORTED_VAULT_FORMAT, VAULT_CONFIG_KID,
};
pub use attributes::{read_attributes, Attributes, AttributesError};
pub use creator::{VaultCreationError, VaultCreator, VaultOpenError, VAULT_CONFIG_FILENAME};
pub use directory::{DirEntry, DirectoryListError, DirectoryLister, EntryKind as DirEntryKind};
pub use info::{VaultDirectoryInfo, VaultFileInfo, VaultSymlinkInfo};
pub use locks::{cleartext_range_to_ciphertext_range, VaultLockManager, VaultLockRegistry};
pub use longname::{LongNameError, LongNameStore};
pub use openfile::{OpenFile, OpenFileError, OpenOptions};
pub use path::{DirId, VaultPath};
pub use provider::{Provider, VaultOptions};
pub use registry::OpenFileRegistry;
pub use uri::{VaultUri, VaultUriError};
