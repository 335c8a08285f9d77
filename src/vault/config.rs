//! Vault configuration (`vault.cryptomator`): a JWT signed with the vault's
//! own master key, carrying the format version, cipher combo, and filename
//! shortening threshold.
//!
//! # Reference Implementation
//! - Java: [`VaultConfig`](https://github.com/cryptomator/cryptolib/blob/develop/src/main/java/org/cryptomator/cryptolib/common/VaultConfig.java)

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use jsonwebtoken::{Algorithm, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::crypto::keys::{JwtValidationError, KeyAccessError, MasterKey};

/// Default shortening threshold for filenames (in characters of encrypted name).
pub const DEFAULT_SHORTENING_THRESHOLD: usize = 220;

/// The vault format version this crate implements.
pub const SUPPORTED_VAULT_FORMAT: i32 = 8;

/// `kid` header placed on vault config JWTs this crate creates. There is no
/// masterkey-file format here (master keys arrive through `MasterKeySource`),
/// so this is purely an interoperability marker rather than a resolvable URI.
pub const VAULT_CONFIG_KID: &str = "arcanefs:external-master-key";

/// Cipher combination used by a vault.
///
/// Cryptomator vaults may also use `SIV_CTRMAC` (AES-CTR + HMAC-SHA256,
/// legacy format); this crate only implements `SIV_GCM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherCombo {
    /// AES-SIV for filenames, AES-256-GCM for content.
    SivGcm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCipherComboError(String);

impl fmt::Display for ParseCipherComboError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown or unsupported cipher combo: {}", self.0)
    }
}

impl std::error::Error for ParseCipherComboError {}

impl FromStr for CipherCombo {
    type Err = ParseCipherComboError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SIV_GCM" => Ok(CipherCombo::SivGcm),
            _ => Err(ParseCipherComboError(s.to_owned())),
        }
    }
}

impl CipherCombo {
    pub fn as_str(&self) -> &'static str {
        match self {
            CipherCombo::SivGcm => "SIV_GCM",
        }
    }
}

/// Claims contained in the vault configuration JWT.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfigurationClaims {
    format: i32,
    #[serde(default = "default_shortening_threshold")]
    shortening_threshold: i32,
    jti: String,
    cipher_combo: String,
}

fn default_shortening_threshold() -> i32 {
    i32::try_from(DEFAULT_SHORTENING_THRESHOLD).expect("DEFAULT_SHORTENING_THRESHOLD fits in i32")
}

impl VaultConfigurationClaims {
    pub fn format(&self) -> i32 {
        self.format
    }

    pub fn cipher_combo_str(&self) -> &str {
        &self.cipher_combo
    }

    pub fn cipher_combo(&self) -> Option<CipherCombo> {
        self.cipher_combo.parse().ok()
    }

    /// Encrypted filenames longer than this are stored shortened (`.c9s`).
    pub fn shortening_threshold(&self) -> usize {
        usize::try_from(self.shortening_threshold.max(0)).expect("non-negative by construction")
    }
}

/// Vault configuration for creating new vaults.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    pub jti: String,
    pub format: i32,
    #[serde(default = "default_shortening_threshold")]
    pub shortening_threshold: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ciphertext_dir: Option<CiphertextDir>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CiphertextDir(pub String);

#[derive(Debug, Serialize, Deserialize)]
pub struct Payload {
    pub key: String,
    #[serde(flatten)]
    pub other_fields: HashMap<String, Value>,
}

#[derive(Error, Debug)]
pub enum ClaimValidationError {
    #[error("JWT decode error: {0}")]
    JwtDecode(#[from] jsonwebtoken::errors::Error),

    #[error("JWT validation error: {0}")]
    JwtValidation(#[from] JwtValidationError),

    #[error("unsupported cipher combo: {0}")]
    UnsupportedCipherCombo(String),

    #[error("unsupported vault format: {0}")]
    UnsupportedVaultFormat(i32),
}

/// Validate and decode the vault configuration JWT claims, checking the
/// signature against `master_key` and rejecting unsupported cipher combos
/// or format versions.
///
/// # Reference Implementation
/// - Java: [`VaultConfig.decode()`](https://github.com/cryptomator/cryptolib/blob/develop/src/main/java/org/cryptomator/cryptolib/common/VaultConfig.java)
pub fn validate_vault_claims(
    vault_config: &str,
    master_key: &MasterKey,
) -> Result<VaultConfigurationClaims, ClaimValidationError> {
    let header = jsonwebtoken::decode_header(vault_config)?;

    let mut validation = Validation::new(header.alg);
    validation.required_spec_claims.clear();
    validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

    let claims = master_key.validate_jwt::<VaultConfigurationClaims>(vault_config, &validation)?;

    if claims.cipher_combo().is_none() {
        return Err(ClaimValidationError::UnsupportedCipherCombo(claims.cipher_combo.clone()));
    }

    if claims.format != SUPPORTED_VAULT_FORMAT {
        return Err(ClaimValidationError::UnsupportedVaultFormat(claims.format));
    }

    Ok(claims)
}

#[derive(Error, Debug)]
pub enum VaultConfigCreationError {
    #[error("JWT encoding error: {0}")]
    JwtEncode(#[from] jsonwebtoken::errors::Error),

    #[error("key access error: {0}")]
    KeyAccess(#[from] KeyAccessError),
}

/// Create a signed vault configuration JWT for a new vault.
///
/// # Reference Implementation
/// - Java: [`VaultConfig.createNew()`](https://github.com/cryptomator/cryptolib/blob/develop/src/main/java/org/cryptomator/cryptolib/common/VaultConfig.java)
pub fn create_vault_config(
    config: &VaultConfig,
    master_key: &MasterKey,
) -> Result<String, VaultConfigCreationError> {
    let claims = VaultConfigurationClaims {
        format: config.format,
        shortening_threshold: config.shortening_threshold,
        jti: config.jti.clone(),
        cipher_combo: CipherCombo::SivGcm.as_str().to_string(),
    };

    let encoding_key = master_key.create_jwt_encoding_key()?;
    let mut header = jsonwebtoken::Header::new(Algorithm::HS256);
    header.kid = Some(VAULT_CONFIG_KID.to_string());

    Ok(jsonwebtoken::encode(&header, &claims, &encoding_key)?)
}
