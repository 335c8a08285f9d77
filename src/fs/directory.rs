//! Directory traversal and tree building for Cryptomator vaults.
//!
//! This module provides the [`VaultExplorer`] for traversing encrypted vault
//! directory structures and building a cleartext representation of the file tree.
//!
//! # Reference Implementation
//!
//! - Java: [`CryptoPathMapper`](https://github.com/cryptomator/cryptofs/blob/develop/src/main/java/org/cryptomator/cryptofs/CryptoPathMapper.java)
//!   handles path resolution and directory ID management
//! - Java: [`CryptoDirectoryStream`](https://github.com/cryptomator/cryptofs/blob/develop/src/main/java/org/cryptomator/cryptofs/dir/CryptoDirectoryStream.java)
//!   provides directory listing functionality

use crate::crypto::keys::MasterKey;
use crate::fs::name::{decrypt_filename, hash_dir_id, NameError};
use crate::fs::symlink::decrypt_symlink_target;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during directory exploration operations.
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// IO error during directory operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Filename or directory ID encryption/decryption error.
    ///
    /// Note: Decryption failures may indicate **integrity violations** -
    /// see `NameError` documentation for security classification.
    #[error("Name error: {0}")]
    Name(#[from] NameError),

    /// The vault structure is invalid or corrupted.
    #[error("Invalid vault structure: {0}")]
    InvalidStructure(String),

    /// A required file is missing from the vault.
    #[error("Missing file: {0}")]
    MissingFile(PathBuf),
}

/// The type of a directory entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryKind {
    /// A regular file.
    File,
    /// A directory with its unique ID.
    Directory { id: String },
    /// A symbolic link with its target path.
    Symlink { target: String },
}

impl EntryKind {
    /// Returns true if this is a directory.
    pub fn is_directory(&self) -> bool {
        matches!(self, EntryKind::Directory { .. })
    }

    /// Returns true if this is a file.
    pub fn is_file(&self) -> bool {
        matches!(self, EntryKind::File)
    }

    /// Returns true if this is a symlink.
    pub fn is_symlink(&self) -> bool {
        matches!(self, EntryKind::Symlink { .. })
    }

    /// Returns the directory ID if this is a directory.
    pub fn directory_id(&self) -> Option<&str> {
        match self {
            EntryKind::Directory { id } => Some(id),
            _ => None,
        }
    }

    /// Returns the symlink target if this is a symlink.
    pub fn symlink_target(&self) -> Option<&str> {
        match self {
            EntryKind::Symlink { target } => Some(target),
            _ => None,
        }
    }
}

/// A decrypted directory entry in the vault.
#[derive(Debug)]
pub struct DirectoryEntry {
    /// The decrypted name of this entry.
    pub name: String,
    /// The encrypted path on disk.
    pub path: PathBuf,
    /// The type of this entry (file, directory, or symlink).
    pub kind: EntryKind,
    /// Child entries (only populated for directories).
    pub children: Vec<DirectoryEntry>,
}

impl DirectoryEntry {
    /// Returns true if this is a directory.
    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    /// Returns true if this is a file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a symlink.
    pub fn is_symlink(&self) -> bool {
        self.kind.is_symlink()
    }

    /// Returns the directory ID if this is a directory.
    pub fn directory_id(&self) -> Option<&str> {
        self.kind.directory_id()
    }

    /// Returns the symlink target if this is a symlink.
    pub fn symlink_target(&self) -> Option<&str> {
        self.kind.symlink_target()
    }
}

/// Explores an encrypted Cryptomator vault and builds a cleartext directory tree.
///
/// # Reference Implementation
///
/// - Java: [`CryptoPathMapper`](https://github.com/cryptomator/cryptofs/blob/develop/src/main/java/org/cryptomator/cryptofs/CryptoPathMapper.java)
///   provides the `getCiphertextDir()` method for resolving directory IDs to paths
/// - Java: [`CryptoDirectoryStream`](https://github.com/cryptomator/cryptofs/blob/develop/src/main/java/org/cryptomator/cryptofs/dir/CryptoDirectoryStream.java)
///   iterates over encrypted directory contents
pub struct VaultExplorer {
    vault_path: PathBuf,
}

impl VaultExplorer {
    pub fn new(vault_path: &Path) -> Self {
        Self {
            vault_path: vault_path.to_path_buf(),
        }
    }

    pub fn build_directory_tree(
        &self,
        master_key: &MasterKey,
    ) -> Result<DirectoryEntry, DirectoryError> {
        let dir_map = self.build_directory_map()?;

        let mut root = DirectoryEntry {
            name: "/".to_string(),
            path: self.vault_path.clone(),
            kind: EntryKind::Directory { id: String::new() }, // Root directory ID is empty string
            children: vec![],
        };

        println!("\n[DEBUG] Starting directory tree build from root");
        self.explore_directory(&mut root, master_key, &dir_map)?;

        Ok(root)
    }

    fn build_directory_map(&self) -> Result<HashMap<String, String>, DirectoryError> {
        let mut dir_map = HashMap::new();
        let d_dir = self.vault_path.join("d");

        // Walk through all directories under /d/
        for prefix_entry in fs::read_dir(&d_dir)? {
            let prefix_entry = prefix_entry?;
            let prefix_path = prefix_entry.path();

            if prefix_path.is_dir() {
                for hash_entry in fs::read_dir(&prefix_path)? {
                    let hash_entry = hash_entry?;
                    let hash_path = hash_entry.path();

                    if hash_path.is_dir() {
                        // Note: dirid.c9r files are encrypted, not plain text
                        // We'll skip the directory mapping for now and rely on dir.c9r files
                        let hash_name = hash_path
                            .file_name()
                            .ok_or_else(|| DirectoryError::InvalidStructure(
                                format!("Directory path has no filename: {:?}", hash_path)
                            ))?
                            .to_string_lossy()
                            .to_string();
                        println!("[DEBUG] Found directory: {hash_name}");
                        // For now, just note that this directory exists
                        dir_map.insert(hash_name, "unknown".to_string());
                    }
                }
            }
        }

        Ok(dir_map)
    }

    fn explore_directory(
        &self,
        parent_entry: &mut DirectoryEntry,
        master_key: &MasterKey,
        dir_map: &HashMap<String, String>,
    ) -> Result<(), DirectoryError> {
        // Clone the directory ID to avoid borrow issues
        let parent_dir_id = parent_entry
            .directory_id()
            .ok_or_else(|| DirectoryError::InvalidStructure(
                format!("Directory '{}' has no directory ID", parent_entry.name)
            ))?
            .to_string();

        println!(
            "\n[DEBUG] Exploring directory: {} (ID: '{}')",
            parent_entry.name, parent_dir_id
        );

        // Calculate storage path for this directory
        let storage_path = self.calculate_directory_path(&parent_dir_id, master_key)?;
        println!("[DEBUG] Storage path: {storage_path:?}");

        if !storage_path.exists() {
            println!("[DEBUG] Storage path doesn't exist, directory is empty");
            return Ok(());
        }

        self.process_items_in_directory(
            parent_entry,
            &storage_path,
            &parent_dir_id,
            master_key,
            dir_map,
        )?;

        Ok(())
    }

    fn process_items_in_directory(
        &self,
        parent_entry: &mut DirectoryEntry,
        dir_path: &Path,
        parent_dir_id: &str,
        master_key: &MasterKey,
        dir_map: &HashMap<String, String>,
    ) -> Result<(), DirectoryError> {
        println!("\n[DEBUG] Processing items in directory: {dir_path:?}");
        println!(
            "[DEBUG] Parent directory ID for decryption: '{parent_dir_id}'"
        );

        let mut item_count = 0;

        for entry in fs::read_dir(dir_path)? {
            let entry = entry?;
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().to_string();

            println!(
                "[DEBUG] Found item: {} (is_dir: {})",
                file_name,
                path.is_dir()
            );
            item_count += 1;

            // Skip special files
            if file_name == "dirid.c9r" {
                println!("[DEBUG] Skipping dirid.c9r");
                continue;
            }

            // Process based on file type
            if file_name.ends_with(".c9r") {
                if path.is_dir() {
                    // This is a directory
                    self.process_directory(&path, &file_name, parent_dir_id, master_key, parent_entry, dir_map)?;
                } else {
                    // This is a regular file
                    self.process_file(&path, &file_name, parent_dir_id, master_key, parent_entry)?;
                }
            } else if file_name.ends_with(".c9s") {
                // Handle shortened names
                self.process_shortened_item(&path, &file_name, parent_dir_id, master_key, parent_entry, dir_map)?;
            }
        }

        println!("[DEBUG] Processed {item_count} items in directory");

        // Sort children by name for consistent output
        parent_entry.children.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(())
    }

    fn process_directory(
        &self,
        path: &Path,
        file_name: &str,
        parent_dir_id: &str,
        master_key: &MasterKey,
        parent_entry: &mut DirectoryEntry,
        dir_map: &HashMap<String, String>,
    ) -> Result<(), DirectoryError> {
        println!("[DEBUG] Processing directory: {file_name}");

        // Check if this is a symlink (has symlink.c9r)
        let symlink_file = path.join("symlink.c9r");
        if symlink_file.exists() {
            println!("[DEBUG] Found symlink.c9r - processing as symlink");
            return self.process_symlink(path, file_name, parent_dir_id, master_key, parent_entry, false);
        }

        match self.read_directory_id(path) {
            Ok(dir_id) => {
                println!("[DEBUG] Directory ID: '{dir_id}'");

                match decrypt_filename(file_name, parent_dir_id, master_key) {
                    Ok(decrypted_name) => {
                        println!("[DEBUG] Decrypted directory name: {decrypted_name}");

                        let mut dir_entry = DirectoryEntry {
                            name: decrypted_name,
                            path: path.to_path_buf(),
                            kind: EntryKind::Directory { id: dir_id },
                            children: vec![],
                        };

                        // Recursively explore this directory
                        self.explore_directory(&mut dir_entry, master_key, dir_map)?;
                        parent_entry.children.push(dir_entry);
                    }
                    Err(e) => {
                        println!(
                            "[ERROR] Failed to decrypt directory name {file_name}: {e}"
                        );
                    }
                }
            }
            Err(e) => {
                println!(
                    "[ERROR] Failed to read directory ID from {}: {}",
                    path.display(),
                    e
                );
            }
        }

        Ok(())
    }

    fn process_file(
        &self,
        path: &Path,
        file_name: &str,
        parent_dir_id: &str,
        master_key: &MasterKey,
        parent_entry: &mut DirectoryEntry,
    ) -> Result<(), DirectoryError> {
        println!("[DEBUG] Processing file: {file_name}");

        match decrypt_filename(file_name, parent_dir_id, master_key) {
            Ok(decrypted_name) => {
                println!("[DEBUG] Decrypted file name: {decrypted_name}");

                parent_entry.children.push(DirectoryEntry {
                    name: decrypted_name,
                    path: path.to_path_buf(),
                    kind: EntryKind::File,
                    children: vec![],
                });
            }
            Err(e) => {
                println!("[ERROR] Failed to decrypt file name {file_name}: {e}");
            }
        }

        Ok(())
    }

    fn process_symlink(
        &self,
        path: &Path,
        file_name: &str,
        parent_dir_id: &str,
        master_key: &MasterKey,
        parent_entry: &mut DirectoryEntry,
        _is_shortened: bool,
    ) -> Result<(), DirectoryError> {
        // For shortened symlinks, file_name is the original encrypted name from name.c9s
        // For regular symlinks, file_name is the .c9r directory name
        let encrypted_name = file_name;

        println!("[DEBUG] Processing symlink: {encrypted_name}");

        match decrypt_filename(encrypted_name, parent_dir_id, master_key) {
            Ok(decrypted_name) => {
                println!("[DEBUG] Decrypted symlink name: {decrypted_name}");

                // Read and decrypt the symlink target
                let symlink_file = path.join("symlink.c9r");
                match fs::read(&symlink_file) {
                    Ok(encrypted_data) => {
                        match decrypt_symlink_target(&encrypted_data, master_key) {
                            Ok(target) => {
                                println!("[DEBUG] Symlink target: {target}");
                                parent_entry.children.push(DirectoryEntry {
                                    name: decrypted_name,
                                    path: path.to_path_buf(),
                                    kind: EntryKind::Symlink { target },
                                    children: vec![],
                                });
                            }
                            Err(e) => {
                                println!("[ERROR] Failed to decrypt symlink target: {e}");
                            }
                        }
                    }
                    Err(e) => {
                        println!("[ERROR] Failed to read symlink.c9r: {e}");
                    }
                }
            }
            Err(e) => {
                println!("[ERROR] Failed to decrypt symlink name {encrypted_name}: {e}");
            }
        }

        Ok(())
    }

    fn process_shortened_item(
        &self,
        path: &Path,
        file_name: &str,
        parent_dir_id: &str,
        master_key: &MasterKey,
        parent_entry: &mut DirectoryEntry,
        dir_map: &HashMap<String, String>,
    ) -> Result<(), DirectoryError> {
        println!("[DEBUG] Processing shortened name: {file_name}");

        match self.read_shortened_name(path) {
            Ok(original_name) => {
                println!("[DEBUG] Original encrypted name: {original_name}");

                let is_dir = path.join("dir.c9r").exists();
                let is_symlink = path.join("symlink.c9r").exists();

                if is_symlink {
                    // Process as a symlink - use original_name for decryption
                    println!("[DEBUG] Found symlink.c9r - processing as shortened symlink");
                    return self.process_symlink(path, &original_name, parent_dir_id, master_key, parent_entry, true);
                }

                match decrypt_filename(&original_name, parent_dir_id, master_key) {
                    Ok(decrypted_name) => {
                        println!("[DEBUG] Decrypted shortened name: {decrypted_name}");

                        if is_dir {
                            match self.read_directory_id(path) {
                                Ok(dir_id) => {
                                    let mut dir_entry = DirectoryEntry {
                                        name: decrypted_name,
                                        path: path.to_path_buf(),
                                        kind: EntryKind::Directory { id: dir_id },
                                        children: vec![],
                                    };

                                    self.explore_directory(&mut dir_entry, master_key, dir_map)?;
                                    parent_entry.children.push(dir_entry);
                                }
                                Err(e) => {
                                    println!("[ERROR] Failed to read directory ID from shortened dir: {e}");
                                }
                            }
                        } else {
                            parent_entry.children.push(DirectoryEntry {
                                name: decrypted_name,
                                path: path.to_path_buf(),
                                kind: EntryKind::File,
                                children: vec![],
                            });
                        }
                    }
                    Err(e) => {
                        println!("[ERROR] Failed to decrypt shortened name: {e}");
                    }
                }
            }
            Err(e) => {
                println!("[ERROR] Failed to read shortened name: {e}");
            }
        }

        Ok(())
    }

    fn calculate_directory_path(&self, dir_id: &str, master_key: &MasterKey) -> Result<PathBuf, DirectoryError> {
        println!("[DEBUG] Calculating directory path for ID: '{dir_id}'");

        let hashed = hash_dir_id(dir_id, master_key)?;
        println!("[DEBUG] Hashed directory ID: {hashed}");

        if hashed.len() < 32 {
            return Err(DirectoryError::InvalidStructure(format!(
                "Hashed directory ID is too short: {}",
                hashed.len()
            )));
        }

        let hash_chars: Vec<char> = hashed.chars().collect();

        let first_two: String = hash_chars[0..2].iter().collect();
        let remaining: String = hash_chars[2..32].iter().collect();

        let path = self.vault_path.join("d").join(&first_two).join(&remaining);
        println!("[DEBUG] Calculated path: {path:?}");

        Ok(path)
    }

    fn read_directory_id(&self, dir_path: &Path) -> Result<String, DirectoryError> {
        let dir_file = dir_path.join("dir.c9r");

        assert!(
            dir_file.exists(),
            "dir.c9r doesn't exist at: {dir_file:?}"
        );

        let content = fs::read_to_string(&dir_file)?;
        let trimmed = content.trim().to_string();

        println!(
            "[DEBUG] Read directory ID from {dir_file:?}: '{trimmed}'"
        );

        Ok(trimmed)
    }

    fn read_shortened_name(&self, dir_path: &Path) -> Result<String, DirectoryError> {
        let name_file = dir_path.join("name.c9s");

        assert!(
            name_file.exists(),
            "name.c9s doesn't exist at: {name_file:?}"
        );

        let content = fs::read_to_string(&name_file)?;
        let trimmed = content.trim().to_string();

        println!(
            "[DEBUG] Read shortened name from {name_file:?}: '{trimmed}'"
        );

        Ok(trimmed)
    }
}

pub fn print_tree(entry: &DirectoryEntry, depth: usize) {
    let indent = "  ".repeat(depth);
    let prefix = match &entry.kind {
        EntryKind::Directory { .. } => "ðŸ“",
        EntryKind::File => "ðŸ“„",
        EntryKind::Symlink { target } => {
            println!("{indent}ðŸ”— {} -> {target}", entry.name);
            return;
        }
    };

    println!("{}{} {}", indent, prefix, entry.name);

    for child in &entry.children {
        print_tree(child, depth + 1);
    }
}
