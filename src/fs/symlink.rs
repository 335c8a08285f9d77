//! Symlink encryption and decryption for Cryptomator vaults.
//!
//! Cryptomator stores symlinks in `.c9r` directories containing a `symlink.c9r` file.
//! The symlink target path is encrypted as file content (header + AES-GCM chunks),
//! the same way regular files are encrypted.
//!
//! # Reference Implementation
//! - Java: Symlink handling in [`CryptoFileSystemImpl`](https://github.com/cryptomator/cryptofs/blob/develop/src/main/java/org/cryptomator/cryptofs/CryptoFileSystemImpl.java)

use rand::RngCore;
use std::fmt;
use thiserror::Error;

use crate::crypto::keys::MasterKey;
use crate::fs::file::{
    decrypt_file_content, decrypt_file_header, encrypt_file_content, encrypt_file_header,
    FileDecryptionError, FileEncryptionError, HEADER_SIZE,
};

/// Context for symlink operations, providing debugging information.
#[derive(Debug, Clone, Default)]
pub struct SymlinkContext {
    pub name: Option<String>,
    pub encrypted_name: Option<String>,
    pub dir_id: Option<String>,
    pub target: Option<String>,
}

impl SymlinkContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_encrypted_name(mut self, name: impl Into<String>) -> Self {
        self.encrypted_name = Some(name.into());
        self
    }

    pub fn with_dir_id(mut self, dir_id: impl Into<String>) -> Self {
        self.dir_id = Some(dir_id.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

impl fmt::Display for SymlinkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if let Some(ref name) = self.name {
            parts.push(format!("symlink '{name}'"));
        } else if let Some(ref enc_name) = self.encrypted_name {
            let display_name = if enc_name.len() > 40 {
                format!("{}...", &enc_name[..37])
            } else {
                enc_name.clone()
            };
            parts.push(format!("encrypted symlink '{display_name}'"));
        }

        if let Some(ref dir_id) = self.dir_id {
            let display_id = if dir_id.is_empty() {
                "<root>".to_string()
            } else if dir_id.len() > 12 {
                format!("{}...", &dir_id[..12])
            } else {
                dir_id.clone()
            };
            parts.push(format!("in directory {display_id}"));
        }

        if let Some(ref target) = self.target {
            let display_target = if target.len() > 40 {
                format!("{}...", &target[..37])
            } else {
                target.clone()
            };
            parts.push(format!("-> '{display_target}'"));
        }

        if parts.is_empty() {
            write!(f, "(no context)")
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}

#[derive(Error, Debug)]
pub enum SymlinkError {
    #[error("[INTEGRITY VIOLATION] Failed to decrypt symlink target for {context}: {reason}")]
    DecryptionFailed { reason: String, context: SymlinkContext },

    #[error("Invalid UTF-8 after decryption for {context}: {reason}")]
    Utf8Decode { reason: String, context: SymlinkContext },

    #[error("Encryption failure for {context}: {reason}")]
    EncryptionFailed { reason: String, context: SymlinkContext },

    #[error("Invalid symlink file for {context}: too small ({size} bytes, minimum {HEADER_SIZE})")]
    TooSmall { size: usize, context: SymlinkContext },

    #[error("IO error for {context}: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        context: SymlinkContext,
    },
}

impl From<std::io::Error> for SymlinkError {
    fn from(source: std::io::Error) -> Self {
        SymlinkError::Io { source, context: SymlinkContext::new() }
    }
}

impl From<FileDecryptionError> for SymlinkError {
    fn from(e: FileDecryptionError) -> Self {
        SymlinkError::DecryptionFailed { reason: e.to_string(), context: SymlinkContext::new() }
    }
}

impl From<FileEncryptionError> for SymlinkError {
    fn from(e: FileEncryptionError) -> Self {
        SymlinkError::EncryptionFailed { reason: e.to_string(), context: SymlinkContext::new() }
    }
}

impl SymlinkError {
    pub fn with_context(self, new_context: SymlinkContext) -> Self {
        match self {
            SymlinkError::DecryptionFailed { reason, .. } => {
                SymlinkError::DecryptionFailed { reason, context: new_context }
            }
            SymlinkError::Utf8Decode { reason, .. } => {
                SymlinkError::Utf8Decode { reason, context: new_context }
            }
            SymlinkError::EncryptionFailed { reason, .. } => {
                SymlinkError::EncryptionFailed { reason, context: new_context }
            }
            SymlinkError::TooSmall { size, .. } => SymlinkError::TooSmall { size, context: new_context },
            SymlinkError::Io { source, .. } => SymlinkError::Io { source, context: new_context },
        }
    }
}

/// Encrypt a symlink target path using file content encryption.
///
/// Returns the encrypted target as raw bytes (to be written to `symlink.c9r`):
/// the 68-byte header followed by encrypted content.
pub fn encrypt_symlink_target(target: &str, master_key: &MasterKey) -> Result<Vec<u8>, SymlinkError> {
    let context = SymlinkContext::new().with_target(target);

    let mut content_key = [0u8; 32];
    rand::rng().fill_bytes(&mut content_key);

    let encrypted_header = encrypt_file_header(&content_key, master_key).map_err(|e| {
        SymlinkError::EncryptionFailed { reason: e.to_string(), context: context.clone() }
    })?;

    let header_nonce: [u8; 12] = encrypted_header[0..12].try_into().unwrap();

    let encrypted_content = encrypt_file_content(target.as_bytes(), &content_key, &header_nonce)
        .map_err(|e| SymlinkError::EncryptionFailed { reason: e.to_string(), context })?;

    let mut result = encrypted_header;
    result.extend_from_slice(&encrypted_content);
    Ok(result)
}

/// Decrypt a symlink target path from file content encryption.
pub fn decrypt_symlink_target(encrypted_data: &[u8], master_key: &MasterKey) -> Result<String, SymlinkError> {
    let context = SymlinkContext::new();

    if encrypted_data.len() < HEADER_SIZE {
        return Err(SymlinkError::TooSmall { size: encrypted_data.len(), context });
    }

    let header = decrypt_file_header(&encrypted_data[0..HEADER_SIZE], master_key)
        .map_err(|e| SymlinkError::DecryptionFailed { reason: e.to_string(), context: context.clone() })?;

    let header_nonce = &encrypted_data[0..12];

    let decrypted_bytes =
        decrypt_file_content(&encrypted_data[HEADER_SIZE..], &header.content_key, header_nonce)
            .map_err(|e| SymlinkError::DecryptionFailed { reason: e.to_string(), context: context.clone() })?;

    String::from_utf8(decrypted_bytes).map_err(|e| SymlinkError::Utf8Decode { reason: e.to_string(), context })
}
