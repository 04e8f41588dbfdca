//! Fuzz target for personal key snapshot decoding
//!
//! # Strategy
//!
//! - Random bytes: arbitrary CBOR (general malformation)
//! - Bit flips: a valid snapshot with corrupted bytes
//! - Field confusion: well-formed maps whose fields hold arbitrary bytes
//! - Huge lengths: fields claiming massive byte string lengths (memory)
//!
//! # Invariants
//!
//! - NEVER panic on malformed input
//! - Huge claimed lengths rejected (not allocated)
//! - Any snapshot that decodes re-encodes to the same key

#![no_main]

use std::sync::LazyLock;

use arbitrary::Arbitrary;
use ciborium::Value;
use keystead_core::PersonalKey;
use libfuzzer_sys::fuzz_target;

static VALID_SNAPSHOT: LazyLock<Vec<u8>> = LazyLock::new(|| {
    let key = PersonalKey::create().expect("key generation");
    key.to_snapshot().expect("snapshot encoding").to_vec()
});

const FIELDS: [&str; 5] =
    ["signing_public", "signing_secret", "encryption_public", "encryption_secret", "bridge_certificate"];

#[derive(Debug, Clone, Arbitrary)]
enum SnapshotAttack {
    RandomBytes { bytes: Vec<u8> },
    BitFlips { flips: Vec<(u16, u8)> },
    FieldConfusion { version: u8, fields: [Vec<u8>; 5] },
    HugeLength { field: u8, claimed_len_exponent: u8 },
}

fuzz_target!(|attack: SnapshotAttack| {
    match attack {
        SnapshotAttack::RandomBytes { bytes } => check(&bytes),

        SnapshotAttack::BitFlips { flips } => {
            let mut bytes = VALID_SNAPSHOT.clone();
            for (position, mask) in flips {
                let index = position as usize % bytes.len();
                bytes[index] ^= mask;
            }
            check(&bytes);
        }

        SnapshotAttack::FieldConfusion { version, fields } => {
            let mut entries = vec![(Value::Text("version".into()), Value::Integer(version.into()))];
            for (name, bytes) in FIELDS.iter().zip(fields) {
                entries.push((Value::Text((*name).into()), Value::Bytes(bytes)));
            }

            let mut bytes = Vec::new();
            if ciborium::into_writer(&Value::Map(entries), &mut bytes).is_ok() {
                check(&bytes);
            }
        }

        SnapshotAttack::HugeLength { field, claimed_len_exponent } => {
            let exponent = u32::from(claimed_len_exponent % 33);
            let claimed_length = if exponent < 32 { 1u32 << exponent } else { u32::MAX };

            // map(7) { "version": 1, <field>: bytes(claimed_length) h'0101..' }
            let mut bytes = vec![0xA7, 0x67];
            bytes.extend_from_slice(b"version");
            bytes.push(0x01);

            let name = FIELDS[field as usize % FIELDS.len()];
            bytes.push(0x60 | name.len() as u8);
            bytes.extend_from_slice(name.as_bytes());
            bytes.push(0x5A);
            bytes.extend_from_slice(&claimed_length.to_be_bytes());
            bytes.extend(std::iter::repeat_n(0x01, (claimed_length as usize).min(16)));

            check(&bytes);
        }
    }
});

fn check(bytes: &[u8]) {
    let Ok(key) = PersonalKey::from_snapshot(bytes) else {
        return;
    };

    let reencoded = key.to_snapshot().expect("decoded key must re-encode");
    let again = PersonalKey::from_snapshot(&reencoded).expect("re-encoded snapshot must decode");
    assert_eq!(again.fingerprint(), key.fingerprint());
    assert_eq!(again.bridge_certificate(), key.bridge_certificate());
}
