//! OpenPGP facade over `sequoia-openpgp`.
//!
//! Everything that touches OpenPGP packets lives here so that
//! [`crate::PersonalKey`] only orchestrates:
//!
//! - [`generate`]: fresh signing key with an encryption subkey
//! - [`keyring`]: packet-level parsing, role classification, decryption
//! - [`storage`]: passphrase-sealed keyrings bound to a user ID
//! - [`certify`]: third-party certifications over other users' keys
//! - [`user_id`]: user ID formatting and network lookup

pub mod certify;
pub mod generate;
pub mod keyring;
pub mod storage;
pub mod user_id;

pub use certify::certify_key;
pub use generate::generate_key_pair_ring;
pub use keyring::{Keyring, decrypt_private_key};
pub use storage::{KeyringBundle, store_keyring};
pub use user_id::{format_user_id, lookup_user_id, user_id_matches_network};
