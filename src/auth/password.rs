use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};

const ARGON2_MEMORY: u32 = 64 * 1024; // KiB
const ARGON2_ITERATIONS: u32 = 2;
const ARGON2_PARALLELISM: u32 = 4;
const ARGON2_OUTPUT_LEN: usize = 32;

/// PHC strings for every argon2 variant start with this.
const HASH_PREFIX: &str = "$argon2";

/// Hashes and verifies the admin secret.
///
/// Everything this program writes is an argon2id PHC string. Documents
/// carried over from older installs may hold the secret in plaintext; those
/// still verify (via a constant-time comparison) until the next password
/// change rewrites them hashed.
pub struct SecretHasher {
    argon2: Argon2<'static>,
}

impl Default for SecretHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretHasher {
    #[must_use]
    pub fn new() -> Self {
        let params = Params::new(
            ARGON2_MEMORY,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(ARGON2_OUTPUT_LEN),
        )
        .expect("invalid argon2 params");

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Hashes a secret with a fresh random salt, returning the PHC string.
    pub fn hash(&self, secret: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| Error::Internal(format!("failed to hash secret: {e}")))?;
        Ok(hash.to_string())
    }

    /// Verifies a candidate secret against the stored credential. Hashed
    /// storage is detected by the PHC prefix; anything else is treated as a
    /// legacy plaintext secret and compared in constant time.
    pub fn verify(&self, candidate: &str, stored: &str) -> Result<bool> {
        if !stored.starts_with(HASH_PREFIX) {
            return Ok(constant_time_eq(candidate, stored));
        }

        let parsed_hash = PasswordHash::new(stored)
            .map_err(|e| Error::Internal(format!("invalid hash format: {e}")))?;

        match self.argon2.verify_password(candidate.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Internal(format!("failed to verify secret: {e}"))),
        }
    }
}

/// Constant-time string equality. Differing lengths compare unequal without
/// short-circuiting on the content.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
