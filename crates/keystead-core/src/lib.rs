//! Keystead Personal Key Management
//!
//! A user's personal key material for a messaging client: an OpenPGP master
//! key used for signing and certification, one encryption subkey, and the
//! X.509 bridge certificate that ties the OpenPGP identity to certificate
//! based trust.
//!
//! # Key Lifecycle
//!
//! ```text
//! generate ─┐                    ┌─> store     -> public + secret keyrings
//!           ├─> PersonalKey ─────┼─> update    <- server-certified public key
//! load ─────┘   (ring + bridge)  ├─> sign      -> certification over a peer
//!                                └─> snapshot  -> CBOR, secrets in the clear
//! ```
//!
//! Keyrings are classified at packet level: the master key fills the signing
//! role and a subkey fills the encryption role. Repeated roles are resolved
//! by [`DuplicateRolePolicy`].
//!
//! # Security
//!
//! Secret Material:
//! - Keyrings produced by `store` carry secret keys sealed under the passphrase
//! - Decrypted secret keys live in sequoia's protected memory, wiped on drop
//! - Snapshot buffers are [`zeroize::Zeroizing`]
//! - Passphrases and secret keys are never logged
//!
//! Consistency:
//! - A loaded key always has both key pairs and a bridge certificate
//! - Public and secret halves of each key pair share a fingerprint
//! - `update` only accepts a public key for our own master key

#![forbid(unsafe_code)]

pub mod bridge;
pub mod config;
pub mod error;
pub mod personal_key;
pub mod pgp;
pub mod ring;
pub mod snapshot;

pub use bridge::BridgeCertificate;
pub use config::{DEFAULT_CIPHER_SUITE, PersonalKeyConfig};
pub use error::PersonalKeyError;
pub use personal_key::PersonalKey;
pub use pgp::KeyringBundle;
pub use ring::{DuplicateRolePolicy, EncryptionKeyPair, KeyPairRing, KeyRole, SigningKeyPair};
pub use sequoia_openpgp::{Cert, Fingerprint, cert::CipherSuite, crypto::Password};
pub use snapshot::SNAPSHOT_VERSION;
