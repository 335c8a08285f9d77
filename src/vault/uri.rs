//! Parsing for `cryptomator://<host-uri-of-vault>/<path-inside-vault>` URIs.

use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum VaultUriError {
    #[error("failed to parse URI: {0}")]
    Parse(#[from] url::ParseError),

    #[error("unsupported scheme: expected \"cryptomator\", got {0:?}")]
    UnsupportedScheme(String),

    #[error("missing authority (host-uri-of-vault)")]
    MissingAuthority,

    #[error("missing path inside vault")]
    MissingPath,

    #[error("query strings are not supported in a vault URI")]
    UnsupportedQuery,

    #[error("fragments are not supported in a vault URI")]
    UnsupportedFragment,
}

/// A parsed `cryptomator://` URI: the vault location and a path inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultUri {
    pub vault_host_uri: String,
    pub path_inside_vault: String,
}

impl VaultUri {
    pub fn parse(uri: &str) -> Result<Self, VaultUriError> {
        let url = Url::parse(uri)?;

        if url.scheme() != "cryptomator" {
            return Err(VaultUriError::UnsupportedScheme(url.scheme().to_string()));
        }
        if url.query().is_some() {
            return Err(VaultUriError::UnsupportedQuery);
        }
        if url.fragment().is_some() {
            return Err(VaultUriError::UnsupportedFragment);
        }

        let vault_host_uri = url.host_str().ok_or(VaultUriError::MissingAuthority)?.to_string();
        let path_inside_vault = url.path().to_string();
        if path_inside_vault.is_empty() {
            return Err(VaultUriError::MissingPath);
        }

        Ok(Self { vault_host_uri, path_inside_vault })
    }
}
