//! Pure helper functions shared between sync and async vault operations.
//!
//! This module contains functions that have no I/O and can be used by both
//! `VaultOperations` (sync) and `VaultOperationsAsync` without modification.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::crypto::keys::MasterKey;
use crate::fs::name::{create_c9s_filename, hash_dir_id, hash_dir_id_with_pepper, NameError};
use crate::vault::path::DirId;

// ============================================================================
// Entry Lookup Path Calculation
// ============================================================================

/// Pre-computed paths for looking up a file or directory entry.
///
/// This struct contains all the path information needed to check if an entry
/// exists, without performing any I/O. Both sync and async implementations
/// use this to separate pure path calculation from filesystem operations.
#[derive(Debug, Clone)]
pub struct EntryPaths {
    /// The encrypted filename (base64url encoded).
    pub encrypted_name: String,
    /// Whether this name exceeds the shortening threshold.
    pub is_shortened: bool,
    /// Path to the .c9r or .c9s entry itself.
    pub entry_path: PathBuf,
    /// Path to check for existence (contents.c9r for shortened files,
    /// dir.c9r for directories, or the .c9r file itself for regular files).
    pub content_path: PathBuf,
}

/// Calculate paths for looking up a file by its encrypted name.
///
/// For regular files (.c9r format):
/// - `entry_path` = `storage_path/{encrypted_name}.c9r`
/// - `content_path` = same as `entry_path` (the file itself)
///
/// For shortened files (.c9s format):
/// - `entry_path` = `storage_path/{hash}.c9s`
/// - `content_path` = `storage_path/{hash}.c9s/contents.c9r`
///
/// # Arguments
///
/// * `storage_path` - The parent directory's storage path (from `calculate_directory_storage_path`)
/// * `encrypted_name` - The encrypted filename to look up
/// * `shortening_threshold` - Names longer than this use .c9s format
pub fn calculate_file_lookup_paths(
    storage_path: &Path,
    encrypted_name: &str,
    shortening_threshold: usize,
) -> EntryPaths {
    let is_shortened = encrypted_name.len() > shortening_threshold;

    if is_shortened {
        let hash = create_c9s_filename(encrypted_name);
        let entry_path = storage_path.join(format!("{hash}.c9s"));
        let content_path = entry_path.join("contents.c9r");
        EntryPaths {
            encrypted_name: encrypted_name.to_string(),
            is_shortened: true,
            entry_path,
            content_path,
        }
    } else {
        let entry_path = storage_path.join(format!("{encrypted_name}.c9r"));
        EntryPaths {
            encrypted_name: encrypted_name.to_string(),
            is_shortened: false,
            content_path: entry_path.clone(),
            entry_path,
        }
    }
}

/// Calculate paths for looking up a directory by its encrypted name.
///
/// For regular directories (.c9r format):
/// - `entry_path` = `storage_path/{encrypted_name}.c9r`
/// - `content_path` = `storage_path/{encrypted_name}.c9r/dir.c9r`
///
/// For shortened directories (.c9s format):
/// - `entry_path` = `storage_path/{hash}.c9s`
/// - `content_path` = `storage_path/{hash}.c9s/dir.c9r`
///
/// # Arguments
///
/// * `storage_path` - The parent directory's storage path (from `calculate_directory_storage_path`)
/// * `encrypted_name` - The encrypted directory name to look up
/// * `shortening_threshold` - Names longer than this use .c9s format
pub fn calculate_directory_lookup_paths(
    storage_path: &Path,
    encrypted_name: &str,
    shortening_threshold: usize,
) -> EntryPaths {
    let is_shortened = encrypted_name.len() > shortening_threshold;

    if is_shortened {
        let hash = create_c9s_filename(encrypted_name);
        let entry_path = storage_path.join(format!("{hash}.c9s"));
        let content_path = entry_path.join("dir.c9r");
        EntryPaths {
            encrypted_name: encrypted_name.to_string(),
            is_shortened: true,
            entry_path,
            content_path,
        }
    } else {
        let entry_path = storage_path.join(format!("{encrypted_name}.c9r"));
        let content_path = entry_path.join("dir.c9r");
        EntryPaths {
            encrypted_name: encrypted_name.to_string(),
            is_shortened: false,
            entry_path,
            content_path,
        }
    }
}

/// Calculate paths for looking up a symlink by its encrypted name.
///
/// For regular symlinks (.c9r format):
/// - `entry_path` = `storage_path/{encrypted_name}.c9r`
/// - `content_path` = `storage_path/{encrypted_name}.c9r/symlink.c9r`
///
/// For shortened symlinks (.c9s format):
/// - `entry_path` = `storage_path/{hash}.c9s`
/// - `content_path` = `storage_path/{hash}.c9s/symlink.c9r`
///
/// # Arguments
///
/// * `storage_path` - The parent directory's storage path (from `calculate_directory_storage_path`)
/// * `encrypted_name` - The encrypted symlink name to look up
/// * `shortening_threshold` - Names longer than this use .c9s format
pub fn calculate_symlink_lookup_paths(
    storage_path: &Path,
    encrypted_name: &str,
    shortening_threshold: usize,
) -> EntryPaths {
    let is_shortened = encrypted_name.len() > shortening_threshold;

    if is_shortened {
        let hash = create_c9s_filename(encrypted_name);
        let entry_path = storage_path.join(format!("{hash}.c9s"));
        let content_path = entry_path.join("symlink.c9r");
        EntryPaths {
            encrypted_name: encrypted_name.to_string(),
            is_shortened: true,
            entry_path,
            content_path,
        }
    } else {
        let entry_path = storage_path.join(format!("{encrypted_name}.c9r"));
        let content_path = entry_path.join("symlink.c9r");
        EntryPaths {
            encrypted_name: encrypted_name.to_string(),
            is_shortened: false,
            entry_path,
            content_path,
        }
    }
}

// ============================================================================
// Ciphertext Size Calculation
// ============================================================================

/// Derive the cleartext size of a file from its ciphertext length.
///
/// Shared by [`crate::vault::openfile::OpenFile`] (recovering size on open)
/// and [`crate::vault::attributes`] (stat'ing files with no live `OpenFile`).
/// A ciphertext whose body length falls `1..overhead` bytes into a chunk is
/// truncated mid-chunk-header and cannot have held any cleartext; this is
/// clamped to zero and logged rather than allowed to underflow.
pub fn cleartext_size_from_ciphertext_len(
    ciphertext_len: u64,
    header_size: u64,
    payload_size: u64,
    overhead: u64,
) -> u64 {
    let body_len = ciphertext_len.saturating_sub(header_size);
    if body_len == 0 {
        return 0;
    }

    let chunk_size = payload_size + overhead;
    let full_chunks = body_len / chunk_size;
    let remainder = body_len % chunk_size;

    if remainder == 0 {
        return full_chunks * payload_size;
    }

    if remainder < overhead {
        warn!(
            remainder,
            overhead, "ciphertext truncated inside chunk overhead; treating trailing chunk as empty"
        );
        return full_chunks * payload_size;
    }

    full_chunks * payload_size + (remainder - overhead)
}

// ============================================================================
// Directory Storage Path Calculation
// ============================================================================

/// Calculate the storage path for a directory given its ID.
///
/// The path is constructed as: `vault_path/d/{first_two_chars}/{remaining_chars}`
/// where the hash is derived from the directory ID using the master key.
///
/// # Arguments
///
/// * `vault_path` - The root path of the vault
/// * `dir_id` - The directory ID to calculate the path for
/// * `master_key` - The master key for hashing
///
/// # Returns
///
/// The full path to the directory's storage location, or an error if hashing fails.
pub fn calculate_directory_storage_path(
    vault_path: &Path,
    dir_id: &DirId,
    master_key: &MasterKey,
) -> Result<PathBuf, StoragePathError> {
    calculate_directory_storage_path_with_pepper(vault_path, dir_id, &[], master_key)
}

/// Like [`calculate_directory_storage_path`], but mixes `pepper` into the
/// directory ID hash. Must be called with the same pepper the vault was
/// created with, or the storage path will not match.
pub fn calculate_directory_storage_path_with_pepper(
    vault_path: &Path,
    dir_id: &DirId,
    pepper: &[u8],
    master_key: &MasterKey,
) -> Result<PathBuf, StoragePathError> {
    let hashed = if pepper.is_empty() {
        hash_dir_id(dir_id.as_str(), master_key)?
    } else {
        hash_dir_id_with_pepper(dir_id.as_str(), pepper, master_key)?
    };
    let hash_chars: Vec<char> = hashed.chars().collect();

    if hash_chars.len() < 32 {
        return Err(StoragePathError::HashTooShort {
            length: hash_chars.len(),
            dir_id: dir_id.as_str().to_string(),
        });
    }

    let first_two: String = hash_chars[0..2].iter().collect();
    let remaining: String = hash_chars[2..32].iter().collect();

    Ok(vault_path.join("d").join(&first_two).join(&remaining))
}

/// Parse a vault path into its components.
///
/// Splits the path by '/' and filters out empty segments.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(parse_path_components("/foo/bar"), vec!["foo", "bar"]);
/// assert_eq!(parse_path_components("foo/bar/"), vec!["foo", "bar"]);
/// assert_eq!(parse_path_components("/"), Vec::<&str>::new());
/// ```
#[inline]
pub fn parse_path_components(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Check if an encrypted filename needs shortening.
///
/// Filenames longer than the threshold use the `.c9s` format instead of `.c9r`.
#[inline]
pub fn needs_shortening(encrypted_name: &str, threshold: usize) -> bool {
    encrypted_name.len() > threshold
}

/// Extract the base name from a `.c9r` or `.c9s` filename.
///
/// Returns `None` if the filename doesn't have a recognized extension.
pub fn extract_encrypted_base_name(filename: &str) -> Option<&str> {
    if let Some(base) = filename.strip_suffix(".c9r") {
        Some(base)
    } else if let Some(base) = filename.strip_suffix(".c9s") {
        Some(base)
    } else {
        None
    }
}

/// Check if a path represents a shortened entry (`.c9s` format).
#[inline]
pub fn is_shortened_entry(filename: &str) -> bool {
    filename.ends_with(".c9s")
}

/// Check if a path represents a regular encrypted entry (`.c9r` format).
#[inline]
pub fn is_regular_entry(filename: &str) -> bool {
    filename.ends_with(".c9r")
}

/// Determine the entry type from a `.c9r` directory's contents.
///
/// A `.c9r` directory can contain:
/// - `dir.c9r` - indicates a directory
/// - `symlink.c9r` - indicates a symlink
/// - Neither - indicates a regular file (the directory itself is the file container)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C9rEntryType {
    /// The entry is a directory (contains `dir.c9r`)
    Directory,
    /// The entry is a symlink (contains `symlink.c9r`)
    Symlink,
    /// The entry is a regular file
    File,
}

// ============================================================================
// Entry Marker Constants
// ============================================================================

/// Marker file inside a `.c9r` directory indicating it's a directory entry.
pub const DIR_MARKER: &str = "dir.c9r";

/// Marker file inside a `.c9r` directory indicating it's a symlink entry.
pub const SYMLINK_MARKER: &str = "symlink.c9r";

/// Content file inside a `.c9s` directory for shortened files.
pub const CONTENTS_FILE: &str = "contents.c9r";

/// Name file inside a `.c9s` directory storing the original encrypted name.
pub const NAME_FILE: &str = "name.c9s";

// ============================================================================
// Entry Classification
// ============================================================================

/// Result of classifying a vault entry by its filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFormat {
    /// Regular encrypted entry (`.c9r` extension)
    Regular,
    /// Shortened entry (`.c9s` extension, name exceeded threshold)
    Shortened,
}

/// Classify an entry by its filename extension and extract the base name.
///
/// Returns `None` if the filename doesn't have a recognized vault extension.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(
///     classify_entry_format("encrypted_name.c9r"),
///     Some((EntryFormat::Regular, "encrypted_name"))
/// );
/// assert_eq!(
///     classify_entry_format("abc123.c9s"),
///     Some((EntryFormat::Shortened, "abc123"))
/// );
/// assert_eq!(classify_entry_format("not_a_vault_file.txt"), None);
/// ```
#[inline]
pub fn classify_entry_format(filename: &str) -> Option<(EntryFormat, &str)> {
    if let Some(base) = filename.strip_suffix(".c9r") {
        Some((EntryFormat::Regular, base))
    } else if let Some(base) = filename.strip_suffix(".c9s") {
        Some((EntryFormat::Shortened, base))
    } else {
        None
    }
}

/// Errors that can occur during storage path calculation.
#[derive(Debug, thiserror::Error)]
pub enum StoragePathError {
    #[error("Hashed directory ID is too short ({length} chars) for dir_id: {dir_id}")]
    HashTooShort { length: usize, dir_id: String },

    #[error("Name hashing error: {0}")]
    NameError(#[from] NameError),
}
