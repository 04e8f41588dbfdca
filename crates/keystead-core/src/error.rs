//! Error types for personal key operations.
//!
//! Every failure mode a caller may want to present differently gets its own
//! variant: a wrong passphrase is not a corrupt key file, and a corrupt key
//! file is not a broken bridge certificate.

use thiserror::Error;

use crate::ring::KeyRole;

/// Errors from creating, loading and using a [`crate::PersonalKey`].
#[derive(Debug, Error)]
pub enum PersonalKeyError {
    /// Key pair generation failed inside the OpenPGP engine
    #[error("unable to generate keypair")]
    KeyGeneration {
        /// Underlying engine error
        #[source]
        source: anyhow::Error,
    },

    /// Loaded keyrings do not yield a complete, consistent key pair ring
    #[error("invalid key data: {reason}")]
    InvalidKeyData {
        /// What was missing or inconsistent
        reason: String,
    },

    /// A keyring carries more than one key for a role and the duplicate
    /// policy rejects it
    #[error("keyring contains more than one {role} key")]
    DuplicateKeyRole {
        /// Role that appeared twice
        role: KeyRole,
    },

    /// Key bytes do not parse as OpenPGP, or carry no usable master key
    #[error("malformed key: {reason}")]
    MalformedKey {
        /// Parse failure description
        reason: String,
    },

    /// A keyring to be signed contains no master key
    #[error("invalid keyring data: {reason}")]
    InvalidKeyring {
        /// Why the keyring cannot be signed
        reason: String,
    },

    /// Secret key material could not be decrypted (wrong passphrase or
    /// corrupted data)
    #[error("unable to decrypt {role} key: {reason}")]
    Decryption {
        /// Role of the key that failed to decrypt
        role: KeyRole,
        /// Engine failure description
        reason: String,
    },

    /// Producing a certification signature failed
    #[error("signature failed: {reason}")]
    Signature {
        /// Engine failure description
        reason: String,
    },

    /// X.509 bridge certificate bytes do not parse
    #[error("invalid bridge certificate: {reason}")]
    Certificate {
        /// Parse failure description
        reason: String,
    },

    /// Serializing or encrypting keyrings for storage failed
    #[error("keyring export failed: {reason}")]
    Export {
        /// Engine failure description
        reason: String,
    },

    /// Snapshot encoding or decoding failed
    #[error("snapshot error: {reason}")]
    Snapshot {
        /// Codec failure description
        reason: String,
    },
}

impl PersonalKeyError {
    /// Returns true if retrying with different user input may succeed.
    ///
    /// Only decryption failures qualify: the usual cause is a mistyped
    /// passphrase. Everything else means the key material itself is unusable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Decryption { .. } => true,

            Self::KeyGeneration { .. }
            | Self::InvalidKeyData { .. }
            | Self::DuplicateKeyRole { .. }
            | Self::MalformedKey { .. }
            | Self::InvalidKeyring { .. }
            | Self::Signature { .. }
            | Self::Certificate { .. }
            | Self::Export { .. }
            | Self::Snapshot { .. } => false,
        }
    }

    pub(crate) fn invalid_key_data(reason: impl Into<String>) -> Self {
        Self::InvalidKeyData { reason: reason.into() }
    }

    pub(crate) fn malformed_key(reason: impl std::fmt::Display) -> Self {
        Self::MalformedKey { reason: reason.to_string() }
    }

    pub(crate) fn signature(reason: impl std::fmt::Display) -> Self {
        Self::Signature { reason: reason.to_string() }
    }

    pub(crate) fn export(reason: impl std::fmt::Display) -> Self {
        Self::Export { reason: reason.to_string() }
    }

    pub(crate) fn snapshot(reason: impl std::fmt::Display) -> Self {
        Self::Snapshot { reason: reason.to_string() }
    }
}
