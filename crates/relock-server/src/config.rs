//! Environment configuration.
//!
//! `PRIVATE_KEY` is required. `ALLOCATOR_ADDRESS`, when set, must match the
//! key-derived address unless `SKIP_SIGNING_VERIFICATION=true`; a mismatch
//! is a fatal startup error, never a warning.

use std::env;

use relock_crypto::AllocatorSigner;
use relock_types::error::SigningError;
use relock_types::ids::parse_address;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{0}`")]
    MissingEnv(&'static str),
    #[error("invalid value for `{name}`: {message}")]
    Invalid {
        name: &'static str,
        message: String,
    },
    #[error(transparent)]
    Signing(#[from] SigningError),
}

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub private_key: String,
    pub allocator_address: Option<String>,
    pub skip_signing_verification: bool,
    pub indexer_url: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let private_key =
            env::var("PRIVATE_KEY").map_err(|_| ConfigError::MissingEnv("PRIVATE_KEY"))?;
        Ok(Self {
            private_key,
            allocator_address: env::var("ALLOCATOR_ADDRESS").ok(),
            skip_signing_verification: env::var("SKIP_SIGNING_VERIFICATION")
                .map(|value| truthy(&value))
                .unwrap_or(false),
            indexer_url: env::var("INDEXER_URL").ok(),
        })
    }

    /// Build and verify the allocator signer from the loaded key material.
    pub fn build_signer(&self) -> Result<AllocatorSigner, ConfigError> {
        let signer = AllocatorSigner::from_key_hex(&self.private_key)?;
        if let Some(configured) = self.allocator_address.as_deref() {
            if !self.skip_signing_verification {
                let configured =
                    parse_address("ALLOCATOR_ADDRESS", configured).map_err(|err| {
                        ConfigError::Invalid {
                            name: "ALLOCATOR_ADDRESS",
                            message: err.to_string(),
                        }
                    })?;
                signer.verify_configured_address(configured)?;
            }
        }
        Ok(signer)
    }
}

fn truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1")
}

#[cfg(test)]
mod tests {
    use relock_crypto::AllocatorSigner;

    use super::{EnvConfig, truthy};

    fn config(key: &str) -> EnvConfig {
        EnvConfig {
            private_key: key.to_string(),
            allocator_address: None,
            skip_signing_verification: false,
            indexer_url: None,
        }
    }

    #[test]
    fn truthy_accepts_true_and_one() {
        assert!(truthy("true"));
        assert!(truthy("TRUE"));
        assert!(truthy("1"));
        assert!(!truthy("yes"));
        assert!(!truthy(""));
    }

    #[test]
    fn signer_address_verification_is_enforced() {
        let key = format!("0x{}", hex::encode([0x07u8; 32]));
        let derived = AllocatorSigner::from_slice(&[0x07; 32]).unwrap().address();
        let other = AllocatorSigner::from_slice(&[0x08; 32]).unwrap().address();

        let mut env = config(&key);
        env.allocator_address = Some(derived.to_checksum(None));
        assert!(env.build_signer().is_ok());

        env.allocator_address = Some(other.to_checksum(None));
        assert!(env.build_signer().is_err());

        env.skip_signing_verification = true;
        assert!(env.build_signer().is_ok());
    }

    #[test]
    fn malformed_key_is_rejected() {
        assert!(config("not hex").build_signer().is_err());
        assert!(config("0x1234").build_signer().is_err());
    }
}
