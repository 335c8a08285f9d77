//! Builder functions for vault info structs.
//!
//! These functions provide a single location for constructing `VaultFileInfo`,
//! `VaultDirectoryInfo`, and `VaultSymlinkInfo` structs. Both sync and async
//! implementations use these to ensure consistency.

use std::path::PathBuf;

use crate::vault::path::DirId;

use crate::vault::info::{VaultDirectoryInfo, VaultFileInfo, VaultSymlinkInfo};

/// Build a `VaultFileInfo` from its components.
///
/// This is the canonical way to construct file info in both sync and async
/// implementations, ensuring field assignment consistency.
#[inline]
pub fn build_file_info(
    name: String,
    encrypted_name: String,
    encrypted_path: PathBuf,
    encrypted_size: u64,
    is_shortened: bool,
) -> VaultFileInfo {
    VaultFileInfo {
        name,
        encrypted_name,
        encrypted_path,
        encrypted_size,
        is_shortened,
    }
}

/// Build a `VaultDirectoryInfo` from its components.
///
/// This is the canonical way to construct directory info in both sync and async
/// implementations, ensuring field assignment consistency.
#[inline]
pub fn build_directory_info(
    name: String,
    directory_id: DirId,
    encrypted_path: PathBuf,
    parent_directory_id: DirId,
) -> VaultDirectoryInfo {
    VaultDirectoryInfo {
        name,
        directory_id,
        encrypted_path,
        parent_directory_id,
    }
}

/// Build a `VaultSymlinkInfo` from its components.
///
/// This is the canonical way to construct symlink info in both sync and async
/// implementations, ensuring field assignment consistency.
#[inline]
pub fn build_symlink_info(
    name: String,
    target: String,
    encrypted_path: PathBuf,
    is_shortened: bool,
) -> VaultSymlinkInfo {
    VaultSymlinkInfo {
        name,
        target,
        encrypted_path,
        is_shortened,
    }
}
