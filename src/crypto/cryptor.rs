//! Pluggable cipher suite for names, file headers, and file content.
//!
//! The vault's cryptographic surface is split into three independent traits
//! so that a future cipher combination (Cryptomator's vault format also
//! defines `SIV_CTRMAC`) could be swapped in without touching callers that
//! only care about "encrypt this name" / "encrypt this chunk". [`SivGcmCryptor`]
//! is the one shipped combination: AES-SIV for names, AES-GCM for header and
//! content, matching the `SIV_GCM` cipher combo used by current vault formats.

use crate::crypto::keys::MasterKey;
use crate::fs::file::{
    self, FileDecryptionError, FileEncryptionError, CHUNK_PAYLOAD_SIZE, HEADER_SIZE,
};
use crate::fs::name::{self, NameError};

/// Deterministic, parent-directory-bound filename encryption.
pub trait NameCryptor {
    fn encrypt_name(&self, name: &str, parent_dir_id: &str, master_key: &MasterKey) -> Result<String, NameError>;

    fn decrypt_name(&self, encrypted_name: &str, parent_dir_id: &str, master_key: &MasterKey) -> Result<String, NameError>;

    fn hash_dir_id(&self, dir_id: &str, master_key: &MasterKey) -> Result<String, NameError>;

    /// Like [`NameCryptor::encrypt_name`], mixing a vault-wide `pepper` into
    /// the name's associated data when non-empty.
    fn encrypt_name_with_pepper(
        &self,
        name: &str,
        parent_dir_id: &str,
        pepper: &[u8],
        master_key: &MasterKey,
    ) -> Result<String, NameError>;

    /// Like [`NameCryptor::decrypt_name`]; `pepper` must match what the name
    /// was encrypted with.
    fn decrypt_name_with_pepper(
        &self,
        encrypted_name: &str,
        parent_dir_id: &str,
        pepper: &[u8],
        master_key: &MasterKey,
    ) -> Result<String, NameError>;

    /// Like [`NameCryptor::hash_dir_id`], mixing `pepper` into the hash.
    fn hash_dir_id_with_pepper(&self, dir_id: &str, pepper: &[u8], master_key: &MasterKey) -> Result<String, NameError>;
}

/// Per-file header carrying the random content key, wrapped with the master key.
pub trait HeaderCryptor {
    /// Size in bytes of an encrypted header.
    fn header_size(&self) -> usize;

    fn encrypt_header(&self, content_key: &[u8; 32], master_key: &MasterKey) -> Result<Vec<u8>, FileEncryptionError>;

    /// Returns the content key and the header nonce (needed as chunk AAD).
    fn decrypt_header(&self, encrypted_header: &[u8], master_key: &MasterKey) -> Result<([u8; 32], [u8; 12]), FileDecryptionError>;
}

/// Chunked AEAD content encryption, keyed by the header's content key.
pub trait ContentCryptor {
    /// Maximum cleartext bytes per chunk.
    fn chunk_payload_size(&self) -> usize;

    fn encrypt_chunk(
        &self,
        chunk_index: u64,
        plaintext: &[u8],
        content_key: &[u8; 32],
        header_nonce: &[u8; 12],
    ) -> Result<Vec<u8>, FileEncryptionError>;

    fn decrypt_chunk(
        &self,
        chunk_index: u64,
        ciphertext: &[u8],
        content_key: &[u8; 32],
        header_nonce: &[u8; 12],
    ) -> Result<Vec<u8>, FileDecryptionError>;
}

/// The full cipher suite a vault instance is configured with.
pub trait VaultCryptor: NameCryptor + HeaderCryptor + ContentCryptor + Send + Sync {}

/// `SIV_GCM`: AES-SIV names, AES-256-GCM header and content. The only
/// combination this crate implements; see `Non-goals` for `SIV_CTRMAC`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SivGcmCryptor;

impl NameCryptor for SivGcmCryptor {
    fn encrypt_name(&self, name: &str, parent_dir_id: &str, master_key: &MasterKey) -> Result<String, NameError> {
        name::encrypt_filename(name, parent_dir_id, master_key)
    }

    fn decrypt_name(&self, encrypted_name: &str, parent_dir_id: &str, master_key: &MasterKey) -> Result<String, NameError> {
        name::decrypt_filename(encrypted_name, parent_dir_id, master_key)
    }

    fn hash_dir_id(&self, dir_id: &str, master_key: &MasterKey) -> Result<String, NameError> {
        name::hash_dir_id(dir_id, master_key)
    }

    fn encrypt_name_with_pepper(
        &self,
        name: &str,
        parent_dir_id: &str,
        pepper: &[u8],
        master_key: &MasterKey,
    ) -> Result<String, NameError> {
        name::encrypt_filename_with_pepper(name, parent_dir_id, pepper, master_key)
    }

    fn decrypt_name_with_pepper(
        &self,
        encrypted_name: &str,
        parent_dir_id: &str,
        pepper: &[u8],
        master_key: &MasterKey,
    ) -> Result<String, NameError> {
        name::decrypt_filename_with_pepper(encrypted_name, parent_dir_id, pepper, master_key)
    }

    fn hash_dir_id_with_pepper(&self, dir_id: &str, pepper: &[u8], master_key: &MasterKey) -> Result<String, NameError> {
        name::hash_dir_id_with_pepper(dir_id, pepper, master_key)
    }
}

impl HeaderCryptor for SivGcmCryptor {
    fn header_size(&self) -> usize {
        HEADER_SIZE
    }

    fn encrypt_header(&self, content_key: &[u8; 32], master_key: &MasterKey) -> Result<Vec<u8>, FileEncryptionError> {
        file::encrypt_file_header(content_key, master_key)
    }

    fn decrypt_header(&self, encrypted_header: &[u8], master_key: &MasterKey) -> Result<([u8; 32], [u8; 12]), FileDecryptionError> {
        let header = file::decrypt_file_header(encrypted_header, master_key)?;
        let nonce: [u8; 12] = encrypted_header[0..12].try_into().unwrap();
        Ok((header.content_key, nonce))
    }
}

impl ContentCryptor for SivGcmCryptor {
    fn chunk_payload_size(&self) -> usize {
        CHUNK_PAYLOAD_SIZE
    }

    fn encrypt_chunk(
        &self,
        chunk_index: u64,
        plaintext: &[u8],
        content_key: &[u8; 32],
        header_nonce: &[u8; 12],
    ) -> Result<Vec<u8>, FileEncryptionError> {
        file::encrypt_chunk(chunk_index, plaintext, content_key, header_nonce)
    }

    fn decrypt_chunk(
        &self,
        chunk_index: u64,
        ciphertext: &[u8],
        content_key: &[u8; 32],
        header_nonce: &[u8; 12],
    ) -> Result<Vec<u8>, FileDecryptionError> {
        file::decrypt_chunk(chunk_index, ciphertext, content_key, header_nonce)
    }
}

impl VaultCryptor for SivGcmCryptor {}
