//! Key pair ring: one signing key pair and one encryption key pair.
//!
//! A keyring on the wire is an ordered sequence of key packets, each either a
//! primary (master) key or a subkey. Loading walks that sequence once, tags
//! every key with its [`KeyRole`], and collects at most one key per role into
//! [`RoleSlots`]. What happens when a role shows up twice is decided by the
//! caller through [`DuplicateRolePolicy`].
//!
//! # Invariants
//!
//! - The signing key is always the master key of the ring
//! - The public and secret halves of each key pair share a fingerprint
//! - Secret halves held here are decrypted; they are only re-encrypted when
//!   exported for storage

use std::fmt;

use sequoia_openpgp::{
    Cert, Fingerprint,
    packet::{
        Key,
        key::{PrimaryRole, PublicParts, SecretParts, SubordinateRole},
    },
};

use crate::error::PersonalKeyError;

/// Role a key plays inside a personal key pair ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyRole {
    /// Master key: certification and signing, carries the user IDs
    Signing,
    /// Subkey: encryption only
    Encryption,
}

impl KeyRole {
    /// Role implied by the packet position: master keys sign, subkeys encrypt.
    pub fn from_master_flag(is_master: bool) -> Self {
        if is_master { Self::Signing } else { Self::Encryption }
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signing => f.write_str("signing"),
            Self::Encryption => f.write_str("encryption"),
        }
    }
}

/// What to do when a keyring carries more than one key for the same role.
///
/// Rings produced by this crate never do, but rings produced elsewhere may
/// carry several encryption subkeys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateRolePolicy {
    /// Fail with [`PersonalKeyError::DuplicateKeyRole`]
    Reject,
    /// Keep the first key seen for the role
    KeepFirst,
    /// Keep the last key seen for the role
    #[default]
    KeepLast,
}

/// At most one value per [`KeyRole`], filled in a single pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSlots<T> {
    signing: Option<T>,
    encryption: Option<T>,
}

impl<T> Default for RoleSlots<T> {
    fn default() -> Self {
        Self { signing: None, encryption: None }
    }
}

impl<T> RoleSlots<T> {
    /// Collect role-tagged items, resolving repeats with `policy`.
    pub fn collect<I>(items: I, policy: DuplicateRolePolicy) -> Result<Self, PersonalKeyError>
    where
        I: IntoIterator<Item = (KeyRole, T)>,
    {
        let mut slots = Self::default();
        for (role, item) in items {
            let slot = match role {
                KeyRole::Signing => &mut slots.signing,
                KeyRole::Encryption => &mut slots.encryption,
            };

            if slot.is_none() {
                *slot = Some(item);
                continue;
            }

            match policy {
                DuplicateRolePolicy::Reject => {
                    return Err(PersonalKeyError::DuplicateKeyRole { role });
                },
                DuplicateRolePolicy::KeepFirst => {
                    tracing::warn!(%role, "keyring has duplicate key role, keeping first");
                },
                DuplicateRolePolicy::KeepLast => {
                    tracing::warn!(%role, "keyring has duplicate key role, keeping last");
                    *slot = Some(item);
                },
            }
        }
        Ok(slots)
    }

    /// Value collected for the signing role.
    pub fn signing(&self) -> Option<&T> {
        self.signing.as_ref()
    }

    /// Value collected for the encryption role.
    pub fn encryption(&self) -> Option<&T> {
        self.encryption.as_ref()
    }

    /// Split into (signing, encryption).
    pub fn into_parts(self) -> (Option<T>, Option<T>) {
        (self.signing, self.encryption)
    }
}

/// Master key pair.
///
/// The public half is a whole certificate so that user IDs and
/// certifications travel with it. Any subkeys in that certificate are
/// ignored; the encryption subkey lives in [`EncryptionKeyPair`].
///
/// A certificate keeps its user IDs in canonical order, so the order they
/// had in the keyring is tracked separately.
#[derive(Clone)]
pub struct SigningKeyPair {
    public: Cert,
    secret: Key<SecretParts, PrimaryRole>,
    user_ids: Vec<String>,
}

impl SigningKeyPair {
    /// Pair a public certificate with the decrypted secret master key.
    ///
    /// Fails if the certificate's primary key is not the secret key's public
    /// half.
    pub fn new(
        public: Cert,
        secret: Key<SecretParts, PrimaryRole>,
    ) -> Result<Self, PersonalKeyError> {
        if public.fingerprint() != secret.fingerprint() {
            return Err(PersonalKeyError::invalid_key_data(format!(
                "signing public key {} does not match private key {}",
                public.fingerprint(),
                secret.fingerprint()
            )));
        }
        let user_ids = certificate_user_ids(&public);
        Ok(Self { public, secret, user_ids })
    }

    /// Reorder the user IDs to follow `order`.
    ///
    /// Entries not on the certificate are dropped. User IDs that `order`
    /// does not mention keep their canonical order after the listed ones.
    pub fn with_user_id_order(mut self, order: Vec<String>) -> Self {
        let canonical = certificate_user_ids(&self.public);
        let mut ordered = Vec::with_capacity(canonical.len());
        for user_id in order.into_iter().chain(canonical.iter().cloned()) {
            if canonical.contains(&user_id) && !ordered.contains(&user_id) {
                ordered.push(user_id);
            }
        }
        self.user_ids = ordered;
        self
    }

    /// User IDs of the signing key, in keyring order.
    pub fn user_ids(&self) -> &[String] {
        &self.user_ids
    }

    /// Certificate whose primary key is the signing key.
    pub fn public_cert(&self) -> &Cert {
        &self.public
    }

    /// Public master key.
    pub fn public_key(&self) -> &Key<PublicParts, PrimaryRole> {
        self.public.primary_key().key()
    }

    /// Decrypted secret master key.
    pub fn secret_key(&self) -> &Key<SecretParts, PrimaryRole> {
        &self.secret
    }

    /// Fingerprint of the master key.
    pub fn fingerprint(&self) -> Fingerprint {
        self.secret.fingerprint()
    }
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair").field("fingerprint", &self.fingerprint()).finish()
    }
}

fn certificate_user_ids(cert: &Cert) -> Vec<String> {
    cert.userids().map(|ua| String::from_utf8_lossy(ua.userid().value()).into_owned()).collect()
}

/// Encryption subkey pair.
#[derive(Clone)]
pub struct EncryptionKeyPair {
    public: Key<PublicParts, SubordinateRole>,
    secret: Key<SecretParts, SubordinateRole>,
}

impl EncryptionKeyPair {
    /// Pair a public subkey with its decrypted secret half.
    pub fn new(
        public: Key<PublicParts, SubordinateRole>,
        secret: Key<SecretParts, SubordinateRole>,
    ) -> Result<Self, PersonalKeyError> {
        if public.fingerprint() != secret.fingerprint() {
            return Err(PersonalKeyError::invalid_key_data(format!(
                "encryption public key {} does not match private key {}",
                public.fingerprint(),
                secret.fingerprint()
            )));
        }
        Ok(Self { public, secret })
    }

    /// Public subkey.
    pub fn public_key(&self) -> &Key<PublicParts, SubordinateRole> {
        &self.public
    }

    /// Decrypted secret subkey.
    pub fn secret_key(&self) -> &Key<SecretParts, SubordinateRole> {
        &self.secret
    }

    /// Fingerprint of the subkey.
    pub fn fingerprint(&self) -> Fingerprint {
        self.public.fingerprint()
    }
}

impl fmt::Debug for EncryptionKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKeyPair").field("fingerprint", &self.fingerprint()).finish()
    }
}

/// A signing key pair plus an encryption key pair.
#[derive(Debug, Clone)]
pub struct KeyPairRing {
    signing: SigningKeyPair,
    encryption: EncryptionKeyPair,
}

impl KeyPairRing {
    /// Assemble a ring from its two key pairs.
    pub fn new(signing: SigningKeyPair, encryption: EncryptionKeyPair) -> Self {
        Self { signing, encryption }
    }

    /// Master key pair.
    pub fn signing(&self) -> &SigningKeyPair {
        &self.signing
    }

    /// Encryption subkey pair.
    pub fn encryption(&self) -> &EncryptionKeyPair {
        &self.encryption
    }

    /// Ring with the signing public half replaced by `public`.
    ///
    /// The secret half is kept, which republishes the same private key under
    /// a freshly certified public key. `public` must have the same primary
    /// key as the current signing key pair. `user_id_order` is the order the
    /// user IDs had in the keyring `public` was read from.
    pub fn with_updated_signing_public_key(
        &self,
        public: Cert,
        user_id_order: Vec<String>,
    ) -> Result<Self, PersonalKeyError> {
        let signing =
            SigningKeyPair::new(public, self.signing.secret.clone()).map_err(|_| {
                PersonalKeyError::malformed_key(format!(
                    "updated public key does not belong to signing key {}",
                    self.signing.fingerprint()
                ))
            })?;
        Ok(Self {
            signing: signing.with_user_id_order(user_id_order),
            encryption: self.encryption.clone(),
        })
    }
}
