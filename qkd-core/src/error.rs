// SPDX-License-Identifier: MIT
//
// QKD Link Simulator: BB84 over Free-Space Optical Channels
// Copyright (c) 2025 QKD Link Simulator Contributors

//! Error types for the QKD simulator
//!
//! Provides a unified error taxonomy using `thiserror` for ergonomic error handling.
//! Every engine failure is a locally detectable precondition or post-condition
//! violation; none of them is retried internally.

pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for QKD operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Channel parameters cannot carry a QKD session (rain, non-positive geometry)
    #[error("Invalid channel configuration: {0}")]
    InvalidChannelConfiguration(String),

    /// A request field is outside its accepted domain
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Not enough key bits to derive an AES-256 key
    #[error("Insufficient key material: {supplied} bits supplied, at least {required} required")]
    InsufficientKeyMaterial { required: usize, supplied: usize },

    /// Ciphertext could not be decrypted (tampering, wrong key, malformed input)
    #[error("Decryption failed: {0}")]
    DecryptionError(String),

    /// Configuration loading or validation failed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidChannelConfiguration(_) => "invalid_channel_configuration",
            Error::InvalidParameter(_) => "invalid_parameter",
            Error::InsufficientKeyMaterial { .. } => "insufficient_key_material",
            Error::DecryptionError(_) => "decryption_error",
            Error::Config(_) => "config",
            Error::Internal(_) => "internal",
        }
    }

    /// Check if error was caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidChannelConfiguration(_)
                | Error::InvalidParameter(_)
                | Error::InsufficientKeyMaterial { .. }
                | Error::DecryptionError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = Error::InvalidChannelConfiguration("rain".to_string());
        assert_eq!(err.kind(), "invalid_channel_configuration");
        assert!(err.is_client_error());

        let err = Error::InsufficientKeyMaterial { required: 16, supplied: 3 };
        assert_eq!(err.kind(), "insufficient_key_material");
        assert!(err.to_string().contains("3 bits supplied"));

        assert!(!Error::Internal("join".to_string()).is_client_error());
        assert!(!Error::Config("bad".to_string()).is_client_error());
    }
}
