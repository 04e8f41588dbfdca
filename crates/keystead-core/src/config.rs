//! Personal key configuration

use sequoia_openpgp::cert::CipherSuite;

use crate::ring::DuplicateRolePolicy;

/// Cipher suite for freshly generated key pair rings.
///
/// Curve25519 keeps generation fast enough for interactive onboarding.
pub const DEFAULT_CIPHER_SUITE: CipherSuite = CipherSuite::Cv25519;

/// Personal key configuration
#[derive(Debug, Clone)]
pub struct PersonalKeyConfig {
    /// Algorithms for both the master key and the encryption subkey
    pub cipher_suite: CipherSuite,
    /// How `load` treats keyrings with more than one key per role
    pub duplicate_role_policy: DuplicateRolePolicy,
}

impl Default for PersonalKeyConfig {
    fn default() -> Self {
        Self {
            cipher_suite: DEFAULT_CIPHER_SUITE,
            duplicate_role_policy: DuplicateRolePolicy::default(),
        }
    }
}
