//! Info structs describing vault entries to callers of a provider, independent
//! of whether the entry was resolved through the sync or async operation path.

use std::path::PathBuf;

use crate::vault::path::DirId;

/// Information about a file entry resolved inside a vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultFileInfo {
    pub name: String,
    pub encrypted_name: String,
    pub encrypted_path: PathBuf,
    pub encrypted_size: u64,
    pub is_shortened: bool,
}

/// Information about a directory entry resolved inside a vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultDirectoryInfo {
    pub name: String,
    pub directory_id: DirId,
    pub encrypted_path: PathBuf,
    pub parent_directory_id: DirId,
}

/// Information about a symlink entry resolved inside a vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultSymlinkInfo {
    pub name: String,
    pub target: String,
    pub encrypted_path: PathBuf,
    pub is_shortened: bool,
}
