//! Cryptographic primitives: key handling and the pluggable name/header/content cryptor.

pub mod cryptor;
pub mod keys;
pub mod thread_safety;

pub use cryptor::{ContentCryptor, HeaderCryptor, NameCryptor, SivGcmCryptor, VaultCryptor};
pub use keys::{JwtValidationError, KeyAccessError, MasterKey};
