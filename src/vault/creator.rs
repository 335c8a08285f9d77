//! Vault bootstrap: lays down `vault.cryptomator` and the root ciphertext
//! directory for a brand-new vault.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::crypto::cryptor::NameCryptor;
use crate::crypto::keys::MasterKey;
use crate::vault::config::{
    create_vault_config, validate_vault_claims, CipherCombo, ClaimValidationError, VaultConfig,
    VaultConfigCreationError, VaultConfigurationClaims, DEFAULT_SHORTENING_THRESHOLD, SUPPORTED_VAULT_FORMAT,
};
use crate::vault::path::DirId;

pub const VAULT_CONFIG_FILENAME: &str = "vault.cryptomator";

#[derive(Error, Debug)]
pub enum VaultCreationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to create vault config: {0}")]
    Config(#[from] VaultConfigCreationError),

    #[error("failed to encrypt root directory id: {0}")]
    Name(#[from] crate::fs::name::NameError),

    #[error("vault already initialized at {0}")]
    AlreadyExists(PathBuf),
}

#[derive(Error, Debug)]
pub enum VaultOpenError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("vault config invalid or key mismatch: {0}")]
    ClaimValidation(#[from] ClaimValidationError),
}

/// Bootstraps new vaults: the config token and the root directory skeleton.
pub struct VaultCreator;

impl VaultCreator {
    /// Initialize a brand-new vault at `vault_path`, writing `vault.cryptomator`
    /// and the root ciphertext directory (`d/<AA>/<BBBB...>/`).
    ///
    /// # Reference Implementation
    /// - Java: [`CryptoFileSystemProvider.initialize()`](https://github.com/cryptomator/cryptofs/blob/develop/src/main/java/org/cryptomator/cryptofs/CryptoFileSystemProvider.java)
    #[instrument(skip(master_key), fields(vault_path = %vault_path.display()))]
    pub async fn create(
        vault_path: &Path,
        master_key: &MasterKey,
        cipher_combo: CipherCombo,
    ) -> Result<(), VaultCreationError> {
        Self::create_with_pepper(vault_path, master_key, cipher_combo, &[]).await
    }

    /// Like [`VaultCreator::create`], but hashes the root directory ID with
    /// `pepper` mixed in, matching the vault's configured pepper option so the
    /// root storage path a `Provider` computes later agrees with this one.
    #[instrument(skip(master_key, pepper), fields(vault_path = %vault_path.display()))]
    pub async fn create_with_pepper(
        vault_path: &Path,
        master_key: &MasterKey,
        cipher_combo: CipherCombo,
        pepper: &[u8],
    ) -> Result<(), VaultCreationError> {
        let config_path = vault_path.join(VAULT_CONFIG_FILENAME);
        if tokio::fs::try_exists(&config_path).await? {
            return Err(VaultCreationError::AlreadyExists(config_path));
        }

        tokio::fs::create_dir_all(vault_path).await?;

        let config = VaultConfig {
            jti: Uuid::new_v4().to_string(),
            format: SUPPORTED_VAULT_FORMAT,
            shortening_threshold: DEFAULT_SHORTENING_THRESHOLD as i32,
            ciphertext_dir: None,
            payload: None,
        };
        // Cipher combo is currently fixed to SIV_GCM; parameter kept for the
        // call site's symmetry with `validate_vault_claims`'s cipher check.
        let _ = cipher_combo;
        let token = create_vault_config(&config, master_key)?;
        tokio::fs::write(&config_path, token).await?;

        let root_dir_id = DirId::root();
        let hashed =
            crate::crypto::cryptor::SivGcmCryptor.hash_dir_id_with_pepper(root_dir_id.as_str(), pepper, master_key)?;
        let root_storage = vault_path.join("d").join(&hashed[0..2]).join(&hashed[2..32]);
        tokio::fs::create_dir_all(&root_storage).await?;

        info!("vault initialized");
        Ok(())
    }

    /// Read and verify `vault.cryptomator`, returning the validated claims.
    #[instrument(skip(master_key), fields(vault_path = %vault_path.display()))]
    pub async fn open(
        vault_path: &Path,
        master_key: &MasterKey,
    ) -> Result<VaultConfigurationClaims, VaultOpenError> {
        let config_path = vault_path.join(VAULT_CONFIG_FILENAME);
        let token = tokio::fs::read_to_string(&config_path).await?;
        let claims = validate_vault_claims(&token, master_key)?;
        Ok(claims)
    }
}
