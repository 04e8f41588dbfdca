//! Third-party certification of other users' keys

use sequoia_openpgp::{Cert, Packet, packet::UserID, types::SignatureType};

use crate::{error::PersonalKeyError, ring::SigningKeyPair};

/// Certify `identity` on `target` with the signing key pair.
///
/// Returns `target` with the certification merged into the matching user ID
/// (added if the certificate did not carry it). Subkeys and other user IDs
/// are left untouched.
pub fn certify_key(
    signing: &SigningKeyPair,
    target: &Cert,
    identity: &str,
) -> Result<Cert, PersonalKeyError> {
    let mut signer =
        signing.secret_key().clone().into_keypair().map_err(PersonalKeyError::signature)?;

    let user_id = UserID::from(identity);
    let certification = user_id
        .certify(&mut signer, target, SignatureType::GenericCertification, None, None)
        .map_err(PersonalKeyError::signature)?;

    let signed = target
        .clone()
        .insert_packets(vec![Packet::from(user_id), Packet::from(certification)])
        .map_err(PersonalKeyError::signature)?;

    tracing::info!(
        signer = %signing.fingerprint(),
        target = %target.fingerprint(),
        "certified public key"
    );

    Ok(signed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::PersonalKeyConfig, pgp::generate_key_pair_ring};

    fn certifications(cert: &Cert, identity: &str) -> usize {
        cert.userids()
            .filter(|ua| ua.userid().value() == identity.as_bytes())
            .map(|ua| ua.certifications().into_iter().count())
            .sum()
    }

    #[test]
    fn adds_one_certification() {
        let config = PersonalKeyConfig::default();
        let signer = generate_key_pair_ring(&config).unwrap();
        let target = generate_key_pair_ring(&config).unwrap();
        let target_cert = target.signing().public_cert();

        let signed = certify_key(signer.signing(), target_cert, "bob@example.net").unwrap();

        assert_eq!(certifications(target_cert, "bob@example.net"), 0);
        assert_eq!(certifications(&signed, "bob@example.net"), 1);
        assert_eq!(signed.fingerprint(), target_cert.fingerprint());
    }

    #[test]
    fn certification_names_the_signer() {
        let config = PersonalKeyConfig::default();
        let signer = generate_key_pair_ring(&config).unwrap();
        let target = generate_key_pair_ring(&config).unwrap();

        let signed =
            certify_key(signer.signing(), target.signing().public_cert(), "bob@example.net")
                .unwrap();

        let ua = signed.userids().next().unwrap();
        let sig = ua.certifications().into_iter().next().unwrap();
        let signer_fingerprint = signer.signing().fingerprint();
        assert!(sig.issuer_fingerprints().any(|fpr| *fpr == signer_fingerprint));
        assert_eq!(sig.typ(), SignatureType::GenericCertification);
    }

    #[test]
    fn keeps_target_subkeys() {
        let config = PersonalKeyConfig::default();
        let signer = generate_key_pair_ring(&config).unwrap();
        let target = generate_key_pair_ring(&config).unwrap();
        let target_cert = target.signing().public_cert();

        let signed = certify_key(signer.signing(), target_cert, "bob@example.net").unwrap();

        assert_eq!(signed.keys().subkeys().count(), target_cert.keys().subkeys().count());
    }

    #[test]
    fn sealed_signing_key_cannot_certify() {
        let config = PersonalKeyConfig::default();
        let signer = generate_key_pair_ring(&config).unwrap();
        let target = generate_key_pair_ring(&config).unwrap();

        let sealed = signer
            .signing()
            .secret_key()
            .clone()
            .encrypt_secret(&sequoia_openpgp::crypto::Password::from("pw"))
            .unwrap();
        let signing = SigningKeyPair::new(signer.signing().public_cert().clone(), sealed).unwrap();

        let result = certify_key(&signing, target.signing().public_cert(), "bob@example.net");
        assert!(matches!(result, Err(PersonalKeyError::Signature { .. })));
    }
}
