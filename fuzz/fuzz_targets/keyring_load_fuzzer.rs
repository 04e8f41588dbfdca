//! Fuzz target for keyring loading and public key operations
//!
//! # Strategy
//!
//! - Random keyrings: arbitrary bytes for both keyrings and the certificate
//! - Mixed keyrings: a valid keyring paired with arbitrary bytes
//! - Corrupted keyrings: valid stored keyrings with flipped bytes
//! - Foreign keys: arbitrary bytes passed to `update` and `sign_public_key`
//!
//! # Invariants
//!
//! - NEVER panic on malformed input
//! - A loaded key always has matching public and secret halves
//! - A failed `update` leaves the key unchanged

#![no_main]

use std::sync::LazyLock;

use arbitrary::Arbitrary;
use keystead_core::{Password, PersonalKey};
use libfuzzer_sys::fuzz_target;

const PASSPHRASE: &str = "fuzz";

struct Fixture {
    key: PersonalKey,
    secret: Vec<u8>,
    public: Vec<u8>,
    bridge_der: Vec<u8>,
}

static FIXTURE: LazyLock<Fixture> = LazyLock::new(|| {
    let key = PersonalKey::create().expect("key generation");
    let bundle = key
        .store("Fuzz", Some("fuzz@example.net"), None, &Password::from(PASSPHRASE))
        .expect("store");
    let bridge_der = rcgen::generate_simple_self_signed(vec!["fuzz.example.net".to_string()])
        .expect("bridge certificate")
        .cert
        .der()
        .to_vec();

    Fixture {
        secret: bundle.secret_bytes().expect("secret keyring"),
        public: bundle.public_bytes().expect("public keyring"),
        key,
        bridge_der,
    }
});

#[derive(Debug, Clone, Arbitrary)]
enum KeyringAttack {
    RandomKeyrings { secret: Vec<u8>, public: Vec<u8>, bridge: Vec<u8> },
    RandomPublic { public: Vec<u8> },
    RandomSecret { secret: Vec<u8> },
    CorruptedSecret { flips: Vec<(u16, u8)> },
    CorruptedPublic { flips: Vec<(u16, u8)> },
    ForeignKey { bytes: Vec<u8>, identity: String },
}

fuzz_target!(|attack: KeyringAttack| {
    let fixture = &*FIXTURE;

    match attack {
        KeyringAttack::RandomKeyrings { secret, public, bridge } => {
            check_load(&secret, &public, &bridge);
        }

        KeyringAttack::RandomPublic { public } => {
            check_load(&fixture.secret, &public, &fixture.bridge_der);
        }

        KeyringAttack::RandomSecret { secret } => {
            check_load(&secret, &fixture.public, &fixture.bridge_der);
        }

        KeyringAttack::CorruptedSecret { flips } => {
            let secret = flip(&fixture.secret, &flips);
            check_load(&secret, &fixture.public, &fixture.bridge_der);
        }

        KeyringAttack::CorruptedPublic { flips } => {
            let public = flip(&fixture.public, &flips);
            check_load(&fixture.secret, &public, &fixture.bridge_der);
        }

        KeyringAttack::ForeignKey { bytes, identity } => {
            let _ = fixture.key.sign_public_key(&bytes, &identity);

            let mut key = fixture.key.clone();
            if key.update(&bytes).is_err() {
                assert_eq!(key.public_keyring(), fixture.key.public_keyring());
            }
            assert_eq!(key.fingerprint(), fixture.key.fingerprint());
        }
    }
});

fn check_load(secret: &[u8], public: &[u8], bridge: &[u8]) {
    let Ok(key) = PersonalKey::load(secret, public, &Password::from(PASSPHRASE), bridge) else {
        return;
    };

    let signing = key.signing_key_pair();
    assert_eq!(signing.public_cert().fingerprint(), signing.secret_key().fingerprint());
    let encryption = key.encryption_key_pair();
    assert_eq!(encryption.public_key().fingerprint(), encryption.secret_key().fingerprint());
    assert!(key.bridge_certificate().is_some());
}

fn flip(bytes: &[u8], flips: &[(u16, u8)]) -> Vec<u8> {
    let mut bytes = bytes.to_vec();
    for &(position, mask) in flips {
        let index = position as usize % bytes.len();
        bytes[index] ^= mask;
    }
    bytes
}
