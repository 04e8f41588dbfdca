//! Keyring export for storage
//!
//! Storing rebuilds the certificate from the raw key pairs: the user ID and
//! the subkey are bound with fresh self-signatures, then the secret keys are
//! sealed under the passphrase. The public and secret keyrings share those
//! signatures, so either can be imported without the other.

use sequoia_openpgp::{
    Cert, Packet,
    crypto::Password,
    packet::{UserID, signature::SignatureBuilder},
    serialize::SerializeInto,
    types::SignatureType,
};

use super::generate::{encryption_key_flags, signing_key_flags};
use crate::{error::PersonalKeyError, ring::KeyPairRing};

/// Public and secret keyrings produced by storing a key pair ring.
#[derive(Debug, Clone)]
pub struct KeyringBundle {
    public: Cert,
    secret: Cert,
}

impl KeyringBundle {
    /// Public keyring (master key, user ID, encryption subkey).
    pub fn public_keyring(&self) -> &Cert {
        &self.public
    }

    /// Secret keyring; secret material is encrypted under the store
    /// passphrase.
    pub fn secret_keyring(&self) -> &Cert {
        &self.secret
    }

    /// Binary public keyring.
    pub fn public_bytes(&self) -> Result<Vec<u8>, PersonalKeyError> {
        self.public.to_vec().map_err(PersonalKeyError::export)
    }

    /// Binary secret keyring.
    pub fn secret_bytes(&self) -> Result<Vec<u8>, PersonalKeyError> {
        self.secret.as_tsk().to_vec().map_err(PersonalKeyError::export)
    }

    /// ASCII-armored public keyring.
    pub fn public_armored(&self) -> Result<String, PersonalKeyError> {
        let bytes = self.public.armored().to_vec().map_err(PersonalKeyError::export)?;
        String::from_utf8(bytes).map_err(PersonalKeyError::export)
    }

    /// ASCII-armored secret keyring.
    pub fn secret_armored(&self) -> Result<String, PersonalKeyError> {
        let bytes = self.secret.as_tsk().armored().to_vec().map_err(PersonalKeyError::export)?;
        String::from_utf8(bytes).map_err(PersonalKeyError::export)
    }
}

/// Serialize `ring` into keyrings bound to `user_id`, sealing the secret keys
/// with `passphrase`.
pub fn store_keyring(
    ring: &KeyPairRing,
    user_id: &str,
    passphrase: &Password,
) -> Result<KeyringBundle, PersonalKeyError> {
    let primary_secret = ring.signing().secret_key().clone();
    let primary_public = primary_secret.clone().take_secret().0;
    let subkey_secret = ring.encryption().secret_key().clone();
    let subkey_public = ring.encryption().public_key().clone();

    let mut signer = primary_secret.clone().into_keypair().map_err(PersonalKeyError::export)?;
    let skeleton = Cert::from_packets(std::iter::once(Packet::from(primary_public.clone())))
        .map_err(PersonalKeyError::export)?;

    let uid = UserID::from(user_id);
    let uid_builder = SignatureBuilder::new(SignatureType::PositiveCertification)
        .set_key_flags(signing_key_flags())
        .and_then(|builder| builder.set_primary_userid(true))
        .map_err(PersonalKeyError::export)?;
    let uid_sig = uid.bind(&mut signer, &skeleton, uid_builder).map_err(PersonalKeyError::export)?;

    let subkey_builder = SignatureBuilder::new(SignatureType::SubkeyBinding)
        .set_key_flags(encryption_key_flags())
        .map_err(PersonalKeyError::export)?;
    let subkey_sig = subkey_public
        .bind(&mut signer, &skeleton, subkey_builder)
        .map_err(PersonalKeyError::export)?;

    let sealed_primary = primary_secret.encrypt_secret(passphrase).map_err(PersonalKeyError::export)?;
    let sealed_subkey = subkey_secret.encrypt_secret(passphrase).map_err(PersonalKeyError::export)?;

    let public = Cert::from_packets(
        vec![
            Packet::from(primary_public),
            Packet::from(uid.clone()),
            Packet::from(uid_sig.clone()),
            Packet::from(subkey_public),
            Packet::from(subkey_sig.clone()),
        ]
        .into_iter(),
    )
    .map_err(PersonalKeyError::export)?;

    let secret = Cert::from_packets(
        vec![
            Packet::from(sealed_primary),
            Packet::from(uid),
            Packet::from(uid_sig),
            Packet::from(sealed_subkey),
            Packet::from(subkey_sig),
        ]
        .into_iter(),
    )
    .map_err(PersonalKeyError::export)?;

    tracing::debug!(fingerprint = %public.fingerprint(), "exported keyrings for storage");

    Ok(KeyringBundle { public, secret })
}
