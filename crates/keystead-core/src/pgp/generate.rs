//! Key pair ring generation

use std::time::Duration;

use sequoia_openpgp::{Cert, cert::CertBuilder, types::KeyFlags};

use crate::{
    config::PersonalKeyConfig,
    error::PersonalKeyError,
    ring::{EncryptionKeyPair, KeyPairRing, SigningKeyPair},
};

/// Capabilities of the master key.
pub fn signing_key_flags() -> KeyFlags {
    KeyFlags::empty().set_certification().set_signing()
}

/// Capabilities of the encryption subkey.
pub fn encryption_key_flags() -> KeyFlags {
    KeyFlags::empty().set_transport_encryption().set_storage_encryption()
}

/// Generate a signing master key with one encryption subkey.
///
/// The ring carries no user ID yet; identities are bound when the ring is
/// stored. Keys never expire.
pub fn generate_key_pair_ring(config: &PersonalKeyConfig) -> Result<KeyPairRing, PersonalKeyError> {
    let (tsk, _revocation) = CertBuilder::new()
        .set_cipher_suite(config.cipher_suite)
        .set_primary_key_flags(signing_key_flags())
        .set_validity_period(None::<Duration>)
        .add_subkey(encryption_key_flags(), None::<Duration>, config.cipher_suite)
        .generate()
        .map_err(|source| PersonalKeyError::KeyGeneration { source })?;

    split_tsk(tsk).map_err(|source| PersonalKeyError::KeyGeneration { source })
}

fn split_tsk(tsk: Cert) -> anyhow::Result<KeyPairRing> {
    let signing_secret = tsk.primary_key().key().clone().parts_into_secret()?;

    let subkey = tsk
        .keys()
        .subkeys()
        .next()
        .ok_or_else(|| anyhow::anyhow!("generated certificate has no encryption subkey"))?;
    let encryption_secret = subkey.key().clone().parts_into_secret()?;
    let encryption_public = encryption_secret.clone().take_secret().0;

    let signing = SigningKeyPair::new(tsk.strip_secret_key_material(), signing_secret)?;
    let encryption = EncryptionKeyPair::new(encryption_public, encryption_secret)?;

    tracing::debug!(
        signing = %signing.fingerprint(),
        encryption = %encryption.fingerprint(),
        "generated key pair ring"
    );

    Ok(KeyPairRing::new(signing, encryption))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_distinct_signing_and_encryption_keys() {
        let ring = generate_key_pair_ring(&PersonalKeyConfig::default()).unwrap();

        assert_ne!(ring.signing().fingerprint(), ring.encryption().fingerprint());
        assert_eq!(ring.signing().public_cert().fingerprint(), ring.signing().fingerprint());
    }

    #[test]
    fn generated_secrets_are_unencrypted() {
        let ring = generate_key_pair_ring(&PersonalKeyConfig::default()).unwrap();

        assert!(!ring.signing().secret_key().secret().is_encrypted());
        assert!(!ring.encryption().secret_key().secret().is_encrypted());
    }

    #[test]
    fn public_halves_carry_no_secrets() {
        let ring = generate_key_pair_ring(&PersonalKeyConfig::default()).unwrap();

        assert!(!ring.signing().public_cert().is_tsk());
        assert!(!ring.encryption().public_key().has_secret());
    }

    #[test]
    fn generated_rings_differ() {
        let config = PersonalKeyConfig::default();
        let a = generate_key_pair_ring(&config).unwrap();
        let b = generate_key_pair_ring(&config).unwrap();

        assert_ne!(a.signing().fingerprint(), b.signing().fingerprint());
    }
}
