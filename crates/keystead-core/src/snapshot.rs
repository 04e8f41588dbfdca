//! Versioned CBOR snapshot of a personal key.
//!
//! A snapshot carries the whole key pair ring with its secret halves in the
//! clear, plus the bridge certificate if one is attached. It exists to hand a
//! live key across a process boundary, not to persist it: use
//! [`crate::PersonalKey::store`] for anything that touches disk.
//!
//! # Format
//!
//! A CBOR map with the fields, in order:
//!
//! | Field | Content |
//! | --- | --- |
//! | `version` | [`SNAPSHOT_VERSION`] |
//! | `signing_public` | OpenPGP certificate (binary) |
//! | `signing_user_ids` | user IDs of the certificate in keyring order |
//! | `signing_secret` | secret key packet, unencrypted |
//! | `encryption_public` | public subkey packet |
//! | `encryption_secret` | secret subkey packet, unencrypted |
//! | `bridge_certificate` | DER bytes or null |
//!
//! Key packets and the certificate are CBOR byte strings. The version is
//! read before anything else so that future layouts can be rejected with a
//! precise error.
//!
//! # Security
//!
//! Encoded snapshots are returned as [`Zeroizing`] buffers and the decoder
//! wipes its intermediate copies of the secret packets.

use serde::{Deserialize, Serialize};
use sequoia_openpgp::{Cert, Packet, PacketPile, parse::Parse, serialize::SerializeInto};
use zeroize::{Zeroize, Zeroizing};

use crate::{
    bridge::BridgeCertificate,
    error::PersonalKeyError,
    ring::{EncryptionKeyPair, KeyPairRing, SigningKeyPair},
};

/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u8 = 1;

// Field names plus map and byte string headers.
const FRAMING_OVERHEAD: usize = 256;

// Per user ID text string header.
const TEXT_HEADER: usize = 9;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u8,
    #[serde(with = "serde_bytes")]
    signing_public: Vec<u8>,
    #[serde(default)]
    signing_user_ids: Vec<String>,
    #[serde(with = "serde_bytes")]
    signing_secret: Vec<u8>,
    #[serde(with = "serde_bytes")]
    encryption_public: Vec<u8>,
    #[serde(with = "serde_bytes")]
    encryption_secret: Vec<u8>,
    #[serde(with = "serde_bytes")]
    bridge_certificate: Option<Vec<u8>>,
}

impl Snapshot {
    fn encoded_len_hint(&self) -> usize {
        let payload = self.signing_public.len()
            + self.signing_secret.len()
            + self.encryption_public.len()
            + self.encryption_secret.len()
            + self.bridge_certificate.as_ref().map_or(0, Vec::len);
        let user_ids: usize =
            self.signing_user_ids.iter().map(|user_id| user_id.len() + TEXT_HEADER).sum();
        payload + user_ids + FRAMING_OVERHEAD
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.signing_secret.zeroize();
        self.encryption_secret.zeroize();
    }
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u8,
}

/// Encode `ring` and the optional bridge certificate.
pub fn encode(
    ring: &KeyPairRing,
    bridge: Option<&BridgeCertificate>,
) -> Result<Zeroizing<Vec<u8>>, PersonalKeyError> {
    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        signing_public: ring.signing().public_cert().to_vec().map_err(PersonalKeyError::snapshot)?,
        signing_user_ids: ring.signing().user_ids().to_vec(),
        signing_secret: Packet::from(ring.signing().secret_key().clone())
            .to_vec()
            .map_err(PersonalKeyError::snapshot)?,
        encryption_public: Packet::from(ring.encryption().public_key().clone())
            .to_vec()
            .map_err(PersonalKeyError::snapshot)?,
        encryption_secret: Packet::from(ring.encryption().secret_key().clone())
            .to_vec()
            .map_err(PersonalKeyError::snapshot)?,
        bridge_certificate: bridge.map(|cert| cert.der().to_vec()),
    };

    let mut out = Zeroizing::new(Vec::with_capacity(snapshot.encoded_len_hint()));
    ciborium::into_writer(&snapshot, &mut *out).map_err(PersonalKeyError::snapshot)?;

    tracing::debug!(
        version = SNAPSHOT_VERSION,
        bytes = out.len(),
        has_bridge_certificate = bridge.is_some(),
        "encoded personal key snapshot"
    );

    Ok(out)
}

/// Decode a snapshot produced by [`encode`].
///
/// Every failure, including malformed packets inside an otherwise valid
/// snapshot, is reported as [`PersonalKeyError::Snapshot`].
pub fn decode(
    bytes: &[u8],
) -> Result<(KeyPairRing, Option<BridgeCertificate>), PersonalKeyError> {
    let header: VersionHeader =
        ciborium::from_reader(bytes).map_err(PersonalKeyError::snapshot)?;
    if header.version != SNAPSHOT_VERSION {
        return Err(PersonalKeyError::snapshot(format!(
            "unsupported snapshot version {}",
            header.version
        )));
    }

    let mut snapshot: Snapshot = ciborium::from_reader(bytes).map_err(PersonalKeyError::snapshot)?;

    let signing_public =
        Cert::from_bytes(&snapshot.signing_public).map_err(PersonalKeyError::snapshot)?;
    let signing_secret = match single_packet(&snapshot.signing_secret)? {
        Packet::SecretKey(key) => key,
        other => return Err(unexpected_packet("signing secret", &other)),
    };
    let encryption_public = match single_packet(&snapshot.encryption_public)? {
        Packet::PublicSubkey(key) => key,
        other => return Err(unexpected_packet("encryption public", &other)),
    };
    let encryption_secret = match single_packet(&snapshot.encryption_secret)? {
        Packet::SecretSubkey(key) => key,
        other => return Err(unexpected_packet("encryption secret", &other)),
    };

    let signing = SigningKeyPair::new(signing_public, signing_secret)
        .map_err(PersonalKeyError::snapshot)?
        .with_user_id_order(std::mem::take(&mut snapshot.signing_user_ids));
    let encryption = EncryptionKeyPair::new(encryption_public, encryption_secret)
        .map_err(PersonalKeyError::snapshot)?;

    let bridge = snapshot
        .bridge_certificate
        .as_deref()
        .map(BridgeCertificate::from_bytes)
        .transpose()
        .map_err(PersonalKeyError::snapshot)?;

    Ok((KeyPairRing::new(signing, encryption), bridge))
}

fn single_packet(bytes: &[u8]) -> Result<Packet, PersonalKeyError> {
    let mut packets =
        PacketPile::from_bytes(bytes).map_err(PersonalKeyError::snapshot)?.into_children();

    match (packets.next(), packets.next()) {
        (Some(packet), None) => Ok(packet),
        (None, _) => Err(PersonalKeyError::snapshot("empty key packet")),
        (Some(_), Some(_)) => Err(PersonalKeyError::snapshot("expected a single key packet")),
    }
}

fn unexpected_packet(field: &str, packet: &Packet) -> PersonalKeyError {
    PersonalKeyError::snapshot(format!("{field} field holds a {} packet", packet.tag()))
}
