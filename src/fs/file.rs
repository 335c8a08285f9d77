//! Chunked AEAD encryption for regular file content.
//!
//! A ciphertext file is a 68-byte header followed by zero or more 32796-byte
//! chunks. The header carries a random per-file content key wrapped with the
//! vault's master key; each chunk is independently authenticated so that
//! random access and truncation never require re-encrypting the whole file.
//!
//! # Reference Implementation
//! - Java: [`FileContentCryptorImpl`](https://github.com/cryptomator/cryptolib/blob/develop/src/main/java/org/cryptomator/cryptolib/v2/FileContentCryptorImpl.java)

use std::{ffi::OsStr, fmt, fs, io, path::Path};

use aead::Payload;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

use crate::crypto::keys::MasterKey;

/// Length of the cleartext chunk Cryptomator uses before re-keying (32 KiB).
pub const CHUNK_PAYLOAD_SIZE: usize = 32 * 1024;
/// Per-chunk nonce (12) + GCM tag (16) overhead.
pub const CHUNK_OVERHEAD: usize = 28;
/// Ciphertext size of a full chunk.
pub const CHUNK_CIPHERTEXT_SIZE: usize = CHUNK_PAYLOAD_SIZE + CHUNK_OVERHEAD;
/// Size of the encrypted file header (nonce + wrapped content key + tag).
pub const HEADER_SIZE: usize = 68;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("File decryption error: {0}")]
    Decryption(#[from] FileDecryptionError),
    #[error("File encryption error: {0}")]
    Encryption(#[from] FileEncryptionError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum FileDecryptionError {
    #[error("Failed to decrypt file header: {0}")]
    HeaderDecryption(String),
    #[error("Failed to decrypt chunk {index}: {reason}")]
    ChunkDecryption { index: u64, reason: String },
    #[error("Failed to decrypt file content: {0}")]
    ContentDecryption(String),
    #[error("Invalid file header: {0}")]
    InvalidHeader(String),
    #[error("IO error during decryption: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum FileEncryptionError {
    #[error("Failed to encrypt file header: {0}")]
    HeaderEncryption(String),
    #[error("Failed to encrypt chunk {index}: {reason}")]
    ChunkEncryption { index: u64, reason: String },
    #[error("Failed to encrypt file content: {0}")]
    ContentEncryption(String),
    #[error("IO error during encryption: {0}")]
    Io(#[from] io::Error),
}

pub struct FileHeader {
    pub content_key: [u8; 32],
    pub tag: [u8; 16],
}

impl fmt::Debug for FileHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHeader")
            .field("content_key", &hex::encode(self.content_key))
            .field("tag", &hex::encode(self.tag))
            .finish()
    }
}

pub fn decrypt_file_header(
    encrypted_header: &[u8],
    master_key: &MasterKey,
) -> Result<FileHeader, FileDecryptionError> {
    if encrypted_header.len() != HEADER_SIZE {
        return Err(FileDecryptionError::InvalidHeader(
            "incorrect header length".to_string(),
        ));
    }

    let nonce = Nonce::from_slice(&encrypted_header[0..12]);
    let ciphertext = &encrypted_header[12..52];
    let tag: [u8; 16] = encrypted_header[52..68].try_into().unwrap();

    master_key.with_aes_key(|aes_key| {
        let key: &Key<Aes256Gcm> = aes_key.into();
        let cipher = Aes256Gcm::new(key);

        let mut ciphertext_with_tag = ciphertext.to_vec();
        ciphertext_with_tag.extend_from_slice(&tag);

        let decrypted = cipher
            .decrypt(nonce, ciphertext_with_tag.as_ref())
            .map_err(|e| FileDecryptionError::HeaderDecryption(e.to_string()))?;

        if decrypted.len() != 40 || decrypted[0..8] != [0xFF; 8] {
            return Err(FileDecryptionError::InvalidHeader(
                "decrypted header has incorrect format".to_string(),
            ));
        }

        let mut content_key = [0u8; 32];
        content_key.copy_from_slice(&decrypted[8..40]);

        Ok(FileHeader { content_key, tag })
    })
}

pub fn encrypt_file_header(
    content_key: &[u8; 32],
    master_key: &MasterKey,
) -> Result<Vec<u8>, FileEncryptionError> {
    let mut header_nonce = [0u8; 12];
    OsRng.fill_bytes(&mut header_nonce);

    master_key.with_aes_key(|aes_key| {
        let key: &Key<Aes256Gcm> = aes_key.into();
        let cipher = Aes256Gcm::new(key);

        let mut plaintext = vec![0xFF; 8];
        plaintext.extend_from_slice(content_key);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&header_nonce), plaintext.as_ref())
            .map_err(|e| FileEncryptionError::HeaderEncryption(e.to_string()))?;

        let mut encrypted_header = Vec::with_capacity(HEADER_SIZE);
        encrypted_header.extend_from_slice(&header_nonce);
        encrypted_header.extend_from_slice(&ciphertext);

        Ok(encrypted_header)
    })
}

fn chunk_aad(chunk_index: u64, header_nonce: &[u8]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(20);
    aad.extend_from_slice(&chunk_index.to_be_bytes());
    aad.extend_from_slice(header_nonce);
    aad
}

/// Encrypt a single cleartext chunk for random-access writes.
///
/// `plaintext` must be at most [`CHUNK_PAYLOAD_SIZE`] bytes; the caller is
/// responsible for splitting a file into chunk-sized pieces.
pub fn encrypt_chunk(
    chunk_index: u64,
    plaintext: &[u8],
    content_key: &[u8; 32],
    header_nonce: &[u8; 12],
) -> Result<Vec<u8>, FileEncryptionError> {
    let key = Key::<Aes256Gcm>::from_slice(content_key);
    let cipher = Aes256Gcm::new(key);

    let mut chunk_nonce = [0u8; 12];
    OsRng.fill_bytes(&mut chunk_nonce);

    let aad = chunk_aad(chunk_index, header_nonce);
    let payload = Payload { msg: plaintext, aad: &aad };

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&chunk_nonce), payload)
        .map_err(|e| FileEncryptionError::ChunkEncryption {
            index: chunk_index,
            reason: e.to_string(),
        })?;

    let mut out = Vec::with_capacity(CHUNK_OVERHEAD + plaintext.len());
    out.extend_from_slice(&chunk_nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a single ciphertext chunk (nonce || ciphertext || tag).
pub fn decrypt_chunk(
    chunk_index: u64,
    chunk: &[u8],
    content_key: &[u8; 32],
    header_nonce: &[u8],
) -> Result<Vec<u8>, FileDecryptionError> {
    if chunk.len() < CHUNK_OVERHEAD {
        return Err(FileDecryptionError::ChunkDecryption {
            index: chunk_index,
            reason: "chunk smaller than nonce + tag overhead".to_string(),
        });
    }

    let key = Key::<Aes256Gcm>::from_slice(content_key);
    let cipher = Aes256Gcm::new(key);

    let chunk_nonce = Nonce::from_slice(&chunk[0..12]);
    let ciphertext = &chunk[12..];

    let aad = chunk_aad(chunk_index, header_nonce);
    let payload = Payload { msg: ciphertext, aad: &aad };

    cipher
        .decrypt(chunk_nonce, payload)
        .map_err(|e| FileDecryptionError::ChunkDecryption {
            index: chunk_index,
            reason: e.to_string(),
        })
}

pub fn decrypt_file_content(
    encrypted_content: &[u8],
    content_key: &[u8; 32],
    header_nonce: &[u8],
) -> Result<Vec<u8>, FileDecryptionError> {
    let mut decrypted_content = Vec::new();
    for (chunk_number, chunk) in encrypted_content.chunks(CHUNK_CIPHERTEXT_SIZE).enumerate() {
        let decrypted_chunk = decrypt_chunk(chunk_number as u64, chunk, content_key, header_nonce)
            .map_err(|e| FileDecryptionError::ContentDecryption(e.to_string()))?;
        decrypted_content.extend_from_slice(&decrypted_chunk);
    }

    Ok(decrypted_content)
}

pub fn encrypt_file_content(
    content: &[u8],
    content_key: &[u8; 32],
    header_nonce: &[u8; 12],
) -> Result<Vec<u8>, FileEncryptionError> {
    let mut encrypted_content = Vec::new();

    // Always emit at least one chunk so empty files still get an authenticated tag.
    let chunks: Vec<&[u8]> = if content.is_empty() {
        vec![&[]]
    } else {
        content.chunks(CHUNK_PAYLOAD_SIZE).collect()
    };

    for (chunk_number, chunk) in chunks.iter().enumerate() {
        let encrypted_chunk = encrypt_chunk(chunk_number as u64, chunk, content_key, header_nonce)
            .map_err(|e| FileEncryptionError::ContentEncryption(e.to_string()))?;
        encrypted_content.extend_from_slice(&encrypted_chunk);
    }

    Ok(encrypted_content)
}

pub struct DecryptedFile {
    pub header: FileHeader,
    pub content: Vec<u8>,
}

impl fmt::Debug for DecryptedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snippet_len = self.content.len().min(100);
        let content = format!("{:?}", String::from_utf8_lossy(&self.content[0..snippet_len]));
        let content_str = if snippet_len < self.content.len() {
            format!("{content}...")
        } else {
            content
        };
        f.debug_struct("DecryptedFile")
            .field("header", &self.header)
            .field("content", &content_str)
            .finish()
    }
}

/// Decrypt a whole ciphertext file in one pass. Used by the directory walker
/// and tests; random-access reads go through `vault::cache::ChunkCache` instead.
pub fn decrypt_file(path: &Path, master_key: &MasterKey) -> Result<DecryptedFile, FileError> {
    if path.file_name() == Some(OsStr::new("dir.c9r")) {
        return Err(FileError::Decryption(FileDecryptionError::InvalidHeader(
            "this function cannot be used on directory files".to_string(),
        )));
    }

    let encrypted = fs::read(path).map_err(FileError::Io)?;
    if encrypted.len() < HEADER_SIZE {
        return Err(FileError::Decryption(FileDecryptionError::InvalidHeader(
            "file shorter than header".to_string(),
        )));
    }
    let header = decrypt_file_header(&encrypted[0..HEADER_SIZE], master_key)?;
    let content = decrypt_file_content(
        &encrypted[HEADER_SIZE..],
        &header.content_key,
        &encrypted[0..12],
    )?;

    Ok(DecryptedFile { header, content })
}

/// Encrypt a parent directory ID for backup storage in `dirid.c9r`.
///
/// This reuses the file content cryptor (header + single chunk) rather than
/// AES-SIV, matching Cryptomator's `DirectoryIdBackup`, which treats the
/// backup as ordinary ciphertext file content.
pub fn encrypt_dir_id_backup(
    parent_dir_id: &str,
    master_key: &MasterKey,
) -> Result<Vec<u8>, FileEncryptionError> {
    let mut content_key = [0u8; 32];
    OsRng.fill_bytes(&mut content_key);

    let header = encrypt_file_header(&content_key, master_key)?;
    let header_nonce: [u8; 12] = header[0..12].try_into().unwrap();
    let content = encrypt_file_content(parent_dir_id.as_bytes(), &content_key, &header_nonce)?;

    let mut out = header;
    out.extend_from_slice(&content);
    Ok(out)
}

pub fn decrypt_dir_id_backup(
    encrypted: &[u8],
    master_key: &MasterKey,
) -> Result<String, FileDecryptionError> {
    if encrypted.len() < HEADER_SIZE {
        return Err(FileDecryptionError::InvalidHeader(
            "dirid.c9r shorter than header".to_string(),
        ));
    }
    let header = decrypt_file_header(&encrypted[0..HEADER_SIZE], master_key)?;
    let content = decrypt_file_content(&encrypted[HEADER_SIZE..], &header.content_key, &encrypted[0..12])?;
    String::from_utf8(content)
        .map_err(|e| FileDecryptionError::ContentDecryption(format!("invalid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_master_key() -> MasterKey {
        let mut aes_key = [0u8; 32];
        let mut mac_key = [0u8; 32];
        for i in 0..32 {
            aes_key[i] = i as u8;
            mac_key[i] = (32 + i) as u8;
        }
        MasterKey::new(aes_key, mac_key).unwrap()
    }

    #[test]
    fn header_roundtrip() {
        let master_key = create_test_master_key();
        let content_key = [7u8; 32];

        let encrypted = encrypt_file_header(&content_key, &master_key).unwrap();
        let header = decrypt_file_header(&encrypted, &master_key).unwrap();

        assert_eq!(header.content_key, content_key);
    }

    #[test]
    fn content_roundtrip_single_chunk() {
        let master_key = create_test_master_key();
        let content_key = [9u8; 32];
        let header = encrypt_file_header(&content_key, &master_key).unwrap();
        let header_nonce: [u8; 12] = header[0..12].try_into().unwrap();

        let plaintext = b"hello vault";
        let encrypted = encrypt_file_content(plaintext, &content_key, &header_nonce).unwrap();
        let decrypted = decrypt_file_content(&encrypted, &content_key, &header_nonce).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn empty_file_still_authenticates_one_chunk() {
        let master_key = create_test_master_key();
        let content_key = [1u8; 32];
        let header = encrypt_file_header(&content_key, &master_key).unwrap();
        let header_nonce: [u8; 12] = header[0..12].try_into().unwrap();

        let encrypted = encrypt_file_content(b"", &content_key, &header_nonce).unwrap();
        assert_eq!(encrypted.len(), CHUNK_OVERHEAD);

        let decrypted = decrypt_file_content(&encrypted, &content_key, &header_nonce).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn multi_chunk_roundtrip() {
        let master_key = create_test_master_key();
        let content_key = [3u8; 32];
        let header = encrypt_file_header(&content_key, &master_key).unwrap();
        let header_nonce: [u8; 12] = header[0..12].try_into().unwrap();

        let plaintext = vec![0xABu8; CHUNK_PAYLOAD_SIZE * 2 + 100];
        let encrypted = encrypt_file_content(&plaintext, &content_key, &header_nonce).unwrap();
        assert_eq!(encrypted.len(), CHUNK_OVERHEAD * 3 + plaintext.len());

        let decrypted = decrypt_file_content(&encrypted, &content_key, &header_nonce).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn single_chunk_reencryption_changes_ciphertext_but_not_plaintext() {
        let content_key = [5u8; 32];
        let header_nonce = [0u8; 12];

        let chunk_a = encrypt_chunk(0, b"payload", &content_key, &header_nonce).unwrap();
        let chunk_b = encrypt_chunk(0, b"payload", &content_key, &header_nonce).unwrap();
        assert_ne!(chunk_a, chunk_b, "nonces are random per encryption");

        let plain_a = decrypt_chunk(0, &chunk_a, &content_key, &header_nonce).unwrap();
        let plain_b = decrypt_chunk(0, &chunk_b, &content_key, &header_nonce).unwrap();
        assert_eq!(plain_a, plain_b);
    }

    #[test]
    fn chunk_decryption_fails_with_wrong_index() {
        let content_key = [5u8; 32];
        let header_nonce = [0u8; 12];

        let chunk = encrypt_chunk(2, b"payload", &content_key, &header_nonce).unwrap();
        let result = decrypt_chunk(3, &chunk, &content_key, &header_nonce);

        assert!(result.is_err(), "AAD mismatch must fail authentication");
    }

    #[test]
    fn dir_id_backup_roundtrip() {
        let master_key = create_test_master_key();
        let encrypted = encrypt_dir_id_backup("parent-id", &master_key).unwrap();
        let decrypted = decrypt_dir_id_backup(&encrypted, &master_key).unwrap();
        assert_eq!(decrypted, "parent-id");
    }

    #[test]
    fn decrypt_file_rejects_dir_c9r() {
        let master_key = create_test_master_key();
        let result = decrypt_file(Path::new("/vault/d/AB/CDEF/dir.c9r"), &master_key);
        assert!(matches!(
            result,
            Err(FileError::Decryption(FileDecryptionError::InvalidHeader(_)))
        ));
    }
}
