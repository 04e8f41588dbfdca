//! Packet-level keyring parsing with master/subkey classification
//!
//! Keyrings are parsed as flat packet sequences rather than as certificates so
//! that malformed-but-parseable rings (a lone subkey, several certificates
//! back to back) still reach the role classification and produce a precise
//! error instead of a generic parse failure.

use sequoia_openpgp::{
    Cert, Fingerprint, Packet, PacketPile,
    crypto::Password,
    packet::{
        Key,
        key::{PublicParts, SecretParts, UnspecifiedRole},
    },
    parse::Parse,
};

use crate::{error::PersonalKeyError, ring::KeyRole};

/// Parsed OpenPGP keyring bytes (binary or ASCII-armored).
#[derive(Debug, Clone)]
pub struct Keyring {
    packets: Vec<Packet>,
}

impl Keyring {
    /// Parse keyring bytes into their top-level packets.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PersonalKeyError> {
        let pile = PacketPile::from_bytes(bytes)
            .map_err(|e| PersonalKeyError::malformed_key(format!("{e:#}")))?;
        Ok(Self { packets: pile.into_children().collect() })
    }

    /// Number of key packets (primary keys and subkeys) in the ring.
    pub fn key_count(&self) -> usize {
        self.packets.iter().filter(|p| key_role(p).is_some()).count()
    }

    /// Public halves of every key in ring order, tagged with their role.
    ///
    /// Secret key packets contribute their public half.
    pub fn public_keys(
        &self,
    ) -> impl Iterator<Item = (KeyRole, Key<PublicParts, UnspecifiedRole>)> + '_ {
        self.packets.iter().filter_map(|packet| match packet {
            Packet::PublicKey(key) => Some((KeyRole::Signing, key.clone().role_into_unspecified())),
            Packet::PublicSubkey(key) => {
                Some((KeyRole::Encryption, key.clone().role_into_unspecified()))
            },
            Packet::SecretKey(key) => {
                Some((KeyRole::Signing, key.clone().take_secret().0.role_into_unspecified()))
            },
            Packet::SecretSubkey(key) => {
                Some((KeyRole::Encryption, key.clone().take_secret().0.role_into_unspecified()))
            },
            _ => None,
        })
    }

    /// Secret keys in ring order, tagged with their role. Public-only key
    /// packets are skipped.
    pub fn secret_keys(
        &self,
    ) -> impl Iterator<Item = (KeyRole, Key<SecretParts, UnspecifiedRole>)> + '_ {
        self.packets.iter().filter_map(|packet| match packet {
            Packet::SecretKey(key) => Some((KeyRole::Signing, key.clone().role_into_unspecified())),
            Packet::SecretSubkey(key) => {
                Some((KeyRole::Encryption, key.clone().role_into_unspecified()))
            },
            _ => None,
        })
    }

    /// Public certificate starting at the first master key in the ring.
    pub fn first_master_certificate(&self) -> Result<Option<Cert>, PersonalKeyError> {
        self.master_groups().next().map(assemble_certificate).transpose()
    }

    /// Public certificate whose master key has `fingerprint`.
    pub fn certificate_of(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Cert>, PersonalKeyError> {
        self.master_groups()
            .find(|group| group.first().and_then(master_fingerprint).as_ref() == Some(fingerprint))
            .map(assemble_certificate)
            .transpose()
    }

    /// User IDs bound to the master key with `fingerprint`, in ring order.
    pub fn user_ids_of(&self, fingerprint: &Fingerprint) -> Vec<String> {
        self.master_groups()
            .find(|group| group.first().and_then(master_fingerprint).as_ref() == Some(fingerprint))
            .into_iter()
            .flatten()
            .filter_map(|packet| match packet {
                Packet::UserID(user_id) => {
                    Some(String::from_utf8_lossy(user_id.value()).into_owned())
                },
                _ => None,
            })
            .collect()
    }

    /// Packet runs that each start at a master key and end before the next.
    fn master_groups(&self) -> impl Iterator<Item = &[Packet]> + '_ {
        let starts: Vec<usize> = self
            .packets
            .iter()
            .enumerate()
            .filter(|(_, p)| key_role(p) == Some(KeyRole::Signing))
            .map(|(i, _)| i)
            .collect();

        let ends: Vec<usize> =
            starts.iter().skip(1).copied().chain(std::iter::once(self.packets.len())).collect();

        starts.into_iter().zip(ends).map(move |(start, end)| &self.packets[start..end])
    }
}

/// Decrypt a secret key with `passphrase`.
///
/// Keys stored without a passphrase are returned unchanged.
pub fn decrypt_private_key(
    role: KeyRole,
    key: Key<SecretParts, UnspecifiedRole>,
    passphrase: &Password,
) -> Result<Key<SecretParts, UnspecifiedRole>, PersonalKeyError> {
    if !key.secret().is_encrypted() {
        tracing::debug!(%role, fingerprint = %key.fingerprint(), "secret key is not encrypted");
        return Ok(key);
    }

    key.decrypt_secret(passphrase)
        .map_err(|e| PersonalKeyError::Decryption { role, reason: format!("{e:#}") })
}

fn key_role(packet: &Packet) -> Option<KeyRole> {
    match packet {
        Packet::PublicKey(_) | Packet::SecretKey(_) => Some(KeyRole::from_master_flag(true)),
        Packet::PublicSubkey(_) | Packet::SecretSubkey(_) => Some(KeyRole::from_master_flag(false)),
        _ => None,
    }
}

fn master_fingerprint(packet: &Packet) -> Option<Fingerprint> {
    match packet {
        Packet::PublicKey(key) => Some(key.fingerprint()),
        Packet::SecretKey(key) => Some(key.fingerprint()),
        _ => None,
    }
}

fn assemble_certificate(group: &[Packet]) -> Result<Cert, PersonalKeyError> {
    let cert = Cert::from_packets(group.iter().cloned())
        .map_err(|e| PersonalKeyError::malformed_key(format!("{e:#}")))?;
    Ok(cert.strip_secret_key_material())
}

#[cfg(test)]
mod tests {
    use sequoia_openpgp::{cert::CertBuilder, serialize::SerializeInto};

    use super::*;
    use crate::{config::PersonalKeyConfig, pgp::generate_key_pair_ring};

    fn ring_bytes() -> (Vec<u8>, Fingerprint) {
        let ring = generate_key_pair_ring(&PersonalKeyConfig::default()).unwrap();
        let bytes = ring.signing().public_cert().to_vec().unwrap();
        (bytes, ring.signing().fingerprint())
    }

    #[test]
    fn rejects_garbage() {
        let result = Keyring::from_bytes(b"definitely not an openpgp keyring");
        assert!(matches!(result, Err(PersonalKeyError::MalformedKey { .. })));
    }

    #[test]
    fn classifies_master_and_subkeys() {
        let (bytes, fingerprint) = ring_bytes();
        let keyring = Keyring::from_bytes(&bytes).unwrap();

        let roles: Vec<KeyRole> = keyring.public_keys().map(|(role, _)| role).collect();
        assert_eq!(roles.first(), Some(&KeyRole::Signing));
        assert!(roles[1..].iter().all(|role| *role == KeyRole::Encryption));

        let (_, master) = keyring.public_keys().next().unwrap();
        assert_eq!(master.fingerprint(), fingerprint);
    }

    #[test]
    fn public_ring_has_no_secret_keys() {
        let (bytes, _) = ring_bytes();
        let keyring = Keyring::from_bytes(&bytes).unwrap();

        assert!(keyring.key_count() >= 2);
        assert_eq!(keyring.secret_keys().count(), 0);
    }

    #[test]
    fn finds_master_certificate() {
        let (bytes, fingerprint) = ring_bytes();
        let keyring = Keyring::from_bytes(&bytes).unwrap();

        let cert = keyring.first_master_certificate().unwrap().unwrap();
        assert_eq!(cert.fingerprint(), fingerprint);

        let by_fingerprint = keyring.certificate_of(&fingerprint).unwrap().unwrap();
        assert_eq!(by_fingerprint.fingerprint(), fingerprint);
    }

    #[test]
    fn user_ids_keep_ring_order() {
        let (cert, _) = CertBuilder::new()
            .add_userid("zed@example.net")
            .add_userid("amy@example.net")
            .generate()
            .unwrap();

        let mut packets = vec![Packet::from(cert.primary_key().key().clone())];
        for wanted in ["zed@example.net", "amy@example.net"] {
            let ua = cert.userids().find(|ua| ua.userid().value() == wanted.as_bytes()).unwrap();
            packets.push(Packet::from(ua.userid().clone()));
            packets.extend(ua.self_signatures().into_iter().cloned().map(Packet::from));
        }
        let bytes: Vec<u8> = packets.iter().flat_map(|p| p.to_vec().unwrap()).collect();
        let keyring = Keyring::from_bytes(&bytes).unwrap();

        assert_eq!(
            keyring.user_ids_of(&cert.fingerprint()),
            vec!["zed@example.net".to_string(), "amy@example.net".to_string()]
        );

        let assembled = keyring.first_master_certificate().unwrap().unwrap();
        assert_eq!(assembled.userids().count(), 2);
    }

    #[test]
    fn user_ids_of_unknown_master_is_empty() {
        let (bytes, _) = ring_bytes();
        let keyring = Keyring::from_bytes(&bytes).unwrap();
        let other = generate_key_pair_ring(&PersonalKeyConfig::default()).unwrap();

        assert!(keyring.user_ids_of(&other.signing().fingerprint()).is_empty());
    }

    #[test]
    fn subkey_only_ring_has_no_master() {
        let ring = generate_key_pair_ring(&PersonalKeyConfig::default()).unwrap();
        let bytes = Packet::from(ring.encryption().public_key().clone()).to_vec().unwrap();
        let keyring = Keyring::from_bytes(&bytes).unwrap();

        assert_eq!(keyring.key_count(), 1);
        assert!(keyring.first_master_certificate().unwrap().is_none());
    }

    #[test]
    fn unencrypted_key_passes_through_decryption() {
        let ring = generate_key_pair_ring(&PersonalKeyConfig::default()).unwrap();
        let key = ring.encryption().secret_key().clone().role_into_unspecified();

        let decrypted =
            decrypt_private_key(KeyRole::Encryption, key.clone(), &Password::from("ignored"))
                .unwrap();
        assert_eq!(decrypted.fingerprint(), key.fingerprint());
    }

    #[test]
    fn wrong_passphrase_fails_decryption() {
        let ring = generate_key_pair_ring(&PersonalKeyConfig::default()).unwrap();
        let sealed = ring
            .encryption()
            .secret_key()
            .clone()
            .encrypt_secret(&Password::from("right"))
            .unwrap()
            .role_into_unspecified();

        let result = decrypt_private_key(KeyRole::Encryption, sealed, &Password::from("wrong"));
        assert!(matches!(
            result,
            Err(PersonalKeyError::Decryption { role: KeyRole::Encryption, .. })
        ));
    }
}
