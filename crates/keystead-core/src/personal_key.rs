//! Personal key: a key pair ring plus its X.509 bridge certificate.
//!
//! # Lifecycle
//!
//! ```text
//! create() ──────┐
//! load() ────────┼──> PersonalKey ──update()──> PersonalKey ──> drop
//! from_snapshot()┘        │
//!                         ├─ store()            -> KeyringBundle
//!                         ├─ sign_public_key()  -> certified Cert
//!                         └─ to_snapshot()      -> Zeroizing<Vec<u8>>
//! ```
//!
//! A `PersonalKey` is always complete: construction either yields both key
//! pairs or fails. Only keys from [`PersonalKey::create`] may lack a bridge
//! certificate.

use sequoia_openpgp::{Cert, Fingerprint, crypto::Password};
use zeroize::Zeroizing;

use crate::{
    bridge::BridgeCertificate,
    config::PersonalKeyConfig,
    error::PersonalKeyError,
    pgp::{self, Keyring, KeyringBundle},
    ring::{EncryptionKeyPair, KeyPairRing, RoleSlots, SigningKeyPair},
    snapshot,
};

/// A user's personal key pair ring and bridge certificate.
#[derive(Debug, Clone)]
pub struct PersonalKey {
    ring: KeyPairRing,
    bridge: Option<BridgeCertificate>,
}

impl PersonalKey {
    /// Generate a fresh key pair ring with the default configuration.
    ///
    /// The new key has no bridge certificate; attach one with
    /// [`Self::with_bridge_certificate`] once it has been issued.
    pub fn create() -> Result<Self, PersonalKeyError> {
        Self::create_with(&PersonalKeyConfig::default())
    }

    /// Generate a fresh key pair ring.
    pub fn create_with(config: &PersonalKeyConfig) -> Result<Self, PersonalKeyError> {
        let ring = pgp::generate_key_pair_ring(config)?;

        tracing::info!(fingerprint = %ring.signing().fingerprint(), "created personal key");

        Ok(Self { ring, bridge: None })
    }

    /// Load a personal key from stored keyrings with the default configuration.
    ///
    /// See [`Self::load_with`].
    pub fn load(
        private_keyring: &[u8],
        public_keyring: &[u8],
        passphrase: &Password,
        bridge_certificate: &[u8],
    ) -> Result<Self, PersonalKeyError> {
        Self::load_with(
            &PersonalKeyConfig::default(),
            private_keyring,
            public_keyring,
            passphrase,
            bridge_certificate,
        )
    }

    /// Load a personal key from stored keyrings.
    ///
    /// Master keys fill the signing role and subkeys the encryption role, in
    /// both keyrings. Every secret key is decrypted with `passphrase`. The
    /// bridge certificate may be DER or PEM; empty bytes count as missing.
    ///
    /// # Errors
    ///
    /// - [`PersonalKeyError::MalformedKey`] if either keyring does not parse
    /// - [`PersonalKeyError::Decryption`] on a wrong passphrase
    /// - [`PersonalKeyError::DuplicateKeyRole`] if the configured policy
    ///   rejects a repeated role
    /// - [`PersonalKeyError::Certificate`] if the bridge certificate does not
    ///   parse
    /// - [`PersonalKeyError::InvalidKeyData`] if any half or the certificate
    ///   is missing, or the halves of a role do not match
    pub fn load_with(
        config: &PersonalKeyConfig,
        private_keyring: &[u8],
        public_keyring: &[u8],
        passphrase: &Password,
        bridge_certificate: &[u8],
    ) -> Result<Self, PersonalKeyError> {
        let secret_ring = Keyring::from_bytes(private_keyring)?;
        let public_ring = Keyring::from_bytes(public_keyring)?;
        let policy = config.duplicate_role_policy;

        let public_slots = RoleSlots::collect(public_ring.public_keys(), policy)?;

        let decrypted = secret_ring
            .secret_keys()
            .map(|(role, key)| pgp::decrypt_private_key(role, key, passphrase).map(|k| (role, k)))
            .collect::<Result<Vec<_>, _>>()?;
        let secret_slots = RoleSlots::collect(decrypted, policy)?;

        let bridge = if bridge_certificate.is_empty() {
            None
        } else {
            Some(BridgeCertificate::from_bytes(bridge_certificate)?)
        };

        let missing: Vec<&str> = [
            (public_slots.signing().is_none(), "signing public key"),
            (secret_slots.signing().is_none(), "signing private key"),
            (public_slots.encryption().is_none(), "encryption public key"),
            (secret_slots.encryption().is_none(), "encryption private key"),
            (bridge.is_none(), "bridge certificate"),
        ]
        .into_iter()
        .filter_map(|(absent, part)| absent.then_some(part))
        .collect();

        let (
            (Some(signing_public), Some(encryption_public)),
            (Some(signing_secret), Some(encryption_secret)),
            Some(bridge),
        ) = (public_slots.into_parts(), secret_slots.into_parts(), bridge)
        else {
            return Err(PersonalKeyError::invalid_key_data(format!(
                "missing {}",
                missing.join(", ")
            )));
        };

        let signing_fingerprint = signing_public.fingerprint();
        let signing_cert = public_ring.certificate_of(&signing_fingerprint)?.ok_or_else(|| {
            PersonalKeyError::invalid_key_data("signing public key has no certificate")
        })?;

        let signing = SigningKeyPair::new(signing_cert, signing_secret.role_into_primary())?
            .with_user_id_order(public_ring.user_ids_of(&signing_fingerprint));
        let encryption = EncryptionKeyPair::new(
            encryption_public.role_into_subordinate(),
            encryption_secret.role_into_subordinate(),
        )?;

        tracing::info!(
            fingerprint = %signing.fingerprint(),
            public_keys = public_ring.key_count(),
            secret_keys = secret_ring.key_count(),
            "loaded personal key"
        );

        Ok(Self { ring: KeyPairRing::new(signing, encryption), bridge: Some(bridge) })
    }

    /// Attach (or replace) the bridge certificate.
    pub fn with_bridge_certificate(mut self, bridge: BridgeCertificate) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Underlying key pair ring.
    pub fn ring(&self) -> &KeyPairRing {
        &self.ring
    }

    /// Signing (master) key pair.
    pub fn signing_key_pair(&self) -> &SigningKeyPair {
        self.ring.signing()
    }

    /// Encryption (subkey) key pair.
    pub fn encryption_key_pair(&self) -> &EncryptionKeyPair {
        self.ring.encryption()
    }

    /// Bridge certificate, absent only for freshly created keys.
    pub fn bridge_certificate(&self) -> Option<&BridgeCertificate> {
        self.bridge.as_ref()
    }

    /// Fingerprint of the signing key.
    pub fn fingerprint(&self) -> Fingerprint {
        self.ring.signing().fingerprint()
    }

    /// Current public certificate of the signing key.
    pub fn public_keyring(&self) -> &Cert {
        self.ring.signing().public_cert()
    }

    /// First user ID on the signing public key, in keyring order, that
    /// belongs to `network`.
    ///
    /// A user ID belongs to a network when its e-mail domain equals the
    /// network label, ignoring ASCII case.
    pub fn user_id(&self, network: &str) -> Option<String> {
        let user_ids = self.ring.signing().user_ids().iter().map(String::as_str);
        pgp::lookup_user_id(user_ids, network).map(str::to_owned)
    }

    /// Export the ring as keyrings bound to `name (comment) <email>`, sealed
    /// under `passphrase`.
    ///
    /// Nothing is written anywhere; the caller persists the bundle.
    pub fn store(
        &self,
        name: &str,
        email: Option<&str>,
        comment: Option<&str>,
        passphrase: &Password,
    ) -> Result<KeyringBundle, PersonalKeyError> {
        let user_id = pgp::format_user_id(name, email, comment);
        let bundle = pgp::store_keyring(&self.ring, &user_id, passphrase)?;

        tracing::info!(fingerprint = %self.fingerprint(), "stored personal key");

        Ok(bundle)
    }

    /// [`Self::store`] with the user ID `local_part <local_part@network>`.
    pub fn store_for_network(
        &self,
        local_part: &str,
        network: &str,
        passphrase: &Password,
    ) -> Result<KeyringBundle, PersonalKeyError> {
        let email = format!("{local_part}@{network}");
        self.store(local_part, Some(&email), None, passphrase)
    }

    /// Replace the signing public key with the one in `public_keyring`.
    ///
    /// Typically called with the server-certified copy of our own public key.
    /// The private half is kept. Returns the new public certificate.
    ///
    /// # Errors
    ///
    /// [`PersonalKeyError::MalformedKey`] if the bytes do not parse, carry no
    /// master key, or carry a master key other than ours. The key is left
    /// unchanged on error.
    pub fn update(&mut self, public_keyring: &[u8]) -> Result<Cert, PersonalKeyError> {
        let keyring = Keyring::from_bytes(public_keyring)?;
        let cert = keyring
            .first_master_certificate()?
            .ok_or_else(|| PersonalKeyError::malformed_key("public keyring has no master key"))?;

        let user_id_order = keyring.user_ids_of(&cert.fingerprint());
        self.ring = self.ring.with_updated_signing_public_key(cert.clone(), user_id_order)?;

        tracing::info!(
            fingerprint = %self.fingerprint(),
            user_ids = cert.userids().count(),
            "updated signing public key"
        );

        Ok(cert)
    }

    /// Certify `identity` on the first master key in `public_keyring`.
    ///
    /// # Errors
    ///
    /// - [`PersonalKeyError::MalformedKey`] if the bytes do not parse
    /// - [`PersonalKeyError::InvalidKeyring`] if they carry no master key
    /// - [`PersonalKeyError::Signature`] if signing fails
    pub fn sign_public_key(
        &self,
        public_keyring: &[u8],
        identity: &str,
    ) -> Result<Cert, PersonalKeyError> {
        let keyring = Keyring::from_bytes(public_keyring)?;
        let target = keyring.first_master_certificate()?.ok_or_else(|| {
            PersonalKeyError::InvalidKeyring { reason: "no master key found".to_string() }
        })?;

        self.sign_certificate(&target, identity)
    }

    /// Certify `identity` on an already parsed certificate.
    pub fn sign_certificate(&self, target: &Cert, identity: &str) -> Result<Cert, PersonalKeyError> {
        pgp::certify_key(self.ring.signing(), target, identity)
    }

    /// Encode the full key, secret halves in the clear, as a snapshot.
    pub fn to_snapshot(&self) -> Result<Zeroizing<Vec<u8>>, PersonalKeyError> {
        snapshot::encode(&self.ring, self.bridge.as_ref())
    }

    /// Decode a key from [`Self::to_snapshot`] output.
    pub fn from_snapshot(bytes: &[u8]) -> Result<Self, PersonalKeyError> {
        let (ring, bridge) = snapshot::decode(bytes)?;

        tracing::debug!(fingerprint = %ring.signing().fingerprint(), "restored personal key");

        Ok(Self { ring, bridge })
    }
}

#[cfg(test)]
mod tests {
    use sequoia_openpgp::serialize::SerializeInto;

    use super::*;

    #[test]
    fn created_key_has_no_bridge() {
        let key = PersonalKey::create().unwrap();

        assert!(key.bridge_certificate().is_none());
        assert_eq!(key.fingerprint(), key.public_keyring().fingerprint());
    }

    #[test]
    fn created_key_has_no_user_ids() {
        let key = PersonalKey::create().unwrap();
        assert_eq!(key.user_id("example.net"), None);
    }

    #[test]
    fn store_for_network_formats_user_id() {
        let key = PersonalKey::create().unwrap();
        let bundle = key.store_for_network("alice", "example.net", &Password::from("pw")).unwrap();

        let user_ids: Vec<String> = bundle
            .public_keyring()
            .userids()
            .map(|ua| String::from_utf8_lossy(ua.userid().value()).into_owned())
            .collect();
        assert_eq!(user_ids, vec!["alice <alice@example.net>".to_string()]);
    }

    #[test]
    fn update_with_garbage_leaves_key_unchanged() {
        let mut key = PersonalKey::create().unwrap();
        let before = key.public_keyring().clone();

        let result = key.update(b"garbage");

        assert!(matches!(result, Err(PersonalKeyError::MalformedKey { .. })));
        assert_eq!(key.public_keyring(), &before);
    }

    #[test]
    fn sign_public_key_needs_a_master_key() {
        let signer = PersonalKey::create().unwrap();
        let other = PersonalKey::create().unwrap();
        let subkey_only = sequoia_openpgp::Packet::from(
            other.encryption_key_pair().public_key().clone(),
        )
        .to_vec()
        .unwrap();

        let result = signer.sign_public_key(&subkey_only, "bob@example.net");
        assert!(matches!(result, Err(PersonalKeyError::InvalidKeyring { .. })));
    }

    #[test]
    fn sign_certificate_with_sealed_key_is_a_signature_error() {
        let key = PersonalKey::create().unwrap();
        let target = PersonalKey::create().unwrap();

        let signing = key.signing_key_pair();
        let sealed = signing.secret_key().clone().encrypt_secret(&Password::from("pw")).unwrap();
        let signing = SigningKeyPair::new(signing.public_cert().clone(), sealed).unwrap();
        let sealed_key = PersonalKey {
            ring: KeyPairRing::new(signing, key.encryption_key_pair().clone()),
            bridge: None,
        };

        let err =
            sealed_key.sign_certificate(target.public_keyring(), "bob@example.net").unwrap_err();
        assert!(matches!(err, PersonalKeyError::Signature { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn snapshot_round_trip() {
        let key = PersonalKey::create().unwrap();

        let bytes = key.to_snapshot().unwrap();
        let restored = PersonalKey::from_snapshot(&bytes).unwrap();

        assert_eq!(restored.fingerprint(), key.fingerprint());
        assert_eq!(
            restored.encryption_key_pair().fingerprint(),
            key.encryption_key_pair().fingerprint()
        );
        assert!(restored.bridge_certificate().is_none());
    }

    #[test]
    fn personal_key_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<PersonalKey>();
    }
}
