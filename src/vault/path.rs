//! Type-safe path handling for Cryptomator vaults.
//!
//! This module provides two distinct types to prevent confusion between:
//! - `DirId`: Internal directory identifiers (opaque UUIDs)
//! - `VaultPath`: User-facing paths within the vault (e.g., "/Documents/file.txt")

use relative_path::{RelativePath, RelativePathBuf};
use std::fmt;

/// Opaque directory identifier used internally by Cryptomator.
///
/// Directory IDs are UUIDs stored in `dir.c9r` files. They are used as
/// associated data for filename encryption, binding filenames to their
/// parent directory.
///
/// # Examples
///
/// ```
/// use arcanefs_core::vault::path::DirId;
///
/// // Root directory
/// let root = DirId::root();
/// assert!(root.is_root());
///
/// // Directory ID from a dir.c9r file
/// let dir_id = DirId::from_raw("550e8400-e29b-41d4-a716-446655440000");
/// assert!(!dir_id.is_root());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirId(String);

impl DirId {
    /// The root directory (empty string ID).
    #[inline]
    pub fn root() -> Self {
        DirId(String::new())
    }

    /// Create a DirId from a raw string (e.g., from a dir.c9r file).
    ///
    /// This should only be used when reading directory IDs from the vault
    /// structure, not for user-provided paths.
    #[inline]
    pub fn from_raw(id: impl Into<String>) -> Self {
        DirId(id.into())
    }

    /// Check if this is the root directory.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the raw string representation.
    ///
    /// This is mainly useful for internal operations like hashing.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DirId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DirId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// User-facing path within a Cryptomator vault.
///
/// Vault paths use `/` as the separator regardless of the host OS.
/// They represent the logical structure the user sees, not the encrypted
/// on-disk layout.
///
/// # Examples
///
/// ```
/// use arcanefs_core::vault::path::VaultPath;
///
/// let path = VaultPath::new("/Documents/report.txt");
/// assert_eq!(path.file_name(), Some("report.txt"));
/// assert_eq!(path.parent().unwrap().as_str(), "Documents");
///
/// // Paths are normalized (leading slash removed)
/// let path2 = VaultPath::new("Documents/report.txt");
/// assert_eq!(path, path2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VaultPath(RelativePathBuf);

impl VaultPath {
    /// The root path (empty).
    #[inline]
    pub fn root() -> Self {
        VaultPath(RelativePathBuf::new())
    }

    /// Create a new vault path from a string.
    ///
    /// Leading slashes are stripped, and the path is normalized.
    pub fn new(path: impl AsRef<str>) -> Self {
        let s = path.as_ref().trim_start_matches('/');
        VaultPath(RelativePathBuf::from(s))
    }

    /// Check if this is the root path.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.as_str().is_empty()
    }

    /// Get the string representation of this path.
    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Get the underlying `RelativePath`.
    #[inline]
    pub fn as_relative_path(&self) -> &RelativePath {
        &self.0
    }

    /// Join this path with another component.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcanefs_core::vault::path::VaultPath;
    ///
    /// let docs = VaultPath::new("Documents");
    /// let file = docs.join("report.txt");
    /// assert_eq!(file.as_str(), "Documents/report.txt");
    /// ```
    pub fn join(&self, component: impl AsRef<str>) -> Self {
        VaultPath(self.0.join(component.as_ref()))
    }

    /// Get the parent path, if any.
    ///
    /// Returns `None` for the root path.
    pub fn parent(&self) -> Option<VaultPath> {
        self.0.parent().map(|p| VaultPath(p.to_relative_path_buf()))
    }

    /// Get the final component of this path (filename or directory name).
    ///
    /// Returns `None` for the root path.
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name()
    }

    /// Iterate over the components of this path.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcanefs_core::vault::path::VaultPath;
    ///
    /// let path = VaultPath::new("Documents/Photos/vacation.jpg");
    /// let components: Vec<_> = path.components().collect();
    /// assert_eq!(components, vec!["Documents", "Photos", "vacation.jpg"]);
    /// ```
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.components().map(|c| c.as_str())
    }

    /// Split this path into parent directory path and filename.
    ///
    /// Returns `None` for the root path.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcanefs_core::vault::path::VaultPath;
    ///
    /// let path = VaultPath::new("Documents/report.txt");
    /// let (parent, name) = path.split().unwrap();
    /// assert_eq!(parent.as_str(), "Documents");
    /// assert_eq!(name, "report.txt");
    /// ```
    pub fn split(&self) -> Option<(VaultPath, &str)> {
        let parent = self.parent()?;
        let name = self.file_name()?;
        Some((parent, name))
    }
}

impl AsRef<str> for VaultPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<RelativePath> for VaultPath {
    fn as_ref(&self) -> &RelativePath {
        &self.0
    }
}

impl fmt::Display for VaultPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "/{}", self.0)
        }
    }
}

impl From<&str> for VaultPath {
    fn from(s: &str) -> Self {
        VaultPath::new(s)
    }
}

impl From<String> for VaultPath {
    fn from(s: String) -> Self {
        VaultPath::new(s)
    }
}
