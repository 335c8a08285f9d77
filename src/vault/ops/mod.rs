//! Shared operations infrastructure for vault implementations.
//!
//! This module contains the shared infrastructure used across the vault:
//!
//! - [`core`] - `VaultCore` with shared state and pure methods
//! - [`helpers`] - Pure helper functions with no I/O
//! - [`info_builders`] - Canonical constructors for info structs
//!
//! `VaultCore` is the path-math façade consumed by [`crate::vault::provider::Provider`].

pub mod core;
pub mod helpers;
pub mod info_builders;

// Re-export commonly used types from core
pub use core::{VaultCore, DEFAULT_SHORTENING_THRESHOLD};
pub use helpers::{
    calculate_directory_lookup_paths, calculate_directory_storage_path,
    calculate_file_lookup_paths, classify_entry_format, cleartext_size_from_ciphertext_len,
    extract_encrypted_base_name, is_regular_entry, is_shortened_entry, needs_shortening,
    parse_path_components, C9rEntryType, EntryFormat, EntryPaths, StoragePathError,
    CONTENTS_FILE, DIR_MARKER, NAME_FILE, SYMLINK_MARKER,
};
pub use info_builders::{build_directory_info, build_file_info, build_symlink_info};
