//! PBKDF2-HMAC-SHA256 password hashing
//!
//! Encoded form: `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>`.

use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Password hasher with a fixed iteration count
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    /// Create hasher; zero iterations is treated as one
    #[inline]
    #[must_use]
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    /// Hash a password with a fresh random salt
    #[must_use]
    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let digest = derive(password, &salt, self.iterations);
        format!(
            "{SCHEME}${}${}${}",
            self.iterations,
            hex::encode(salt),
            hex::encode(digest)
        )
    }

    /// Check a password against an encoded hash
    ///
    /// Malformed encodings never verify. The iteration count stored in the
    /// hash is used, so hashes survive configuration changes.
    #[must_use]
    pub fn verify(&self, password: &str, encoded: &str) -> bool {
        let mut parts = encoded.split('$');
        let (Some(SCHEME), Some(iterations), Some(salt), Some(expected), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return false;
        };
        let (Ok(iterations), Ok(salt), Ok(expected)) = (
            iterations.parse::<u32>(),
            hex::decode(salt),
            hex::decode(expected),
        ) else {
            return false;
        };
        if iterations == 0 {
            return false;
        }
        derive(password, &salt, iterations).as_slice().ct_eq(expected.as_slice()).into()
    }
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LEN] {
    let mut digest = [0u8; HASH_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut digest);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies() {
        let hasher = PasswordHasher::new(10);
        let encoded = hasher.hash("correct horse");
        assert!(encoded.starts_with("pbkdf2-sha256$10$"));
        assert!(hasher.verify("correct horse", &encoded));
        assert!(!hasher.verify("wrong horse", &encoded));
    }

    #[test]
    fn matches_published_pbkdf2_vector() {
        // RFC 7914 section 11: P = "passwd", S = "salt", c = 1, first 32 bytes
        let encoded = format!(
            "{SCHEME}$1${}$55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc",
            hex::encode("salt")
        );
        let hasher = PasswordHasher::new(1);
        assert!(hasher.verify("passwd", &encoded));
        assert!(!hasher.verify("passwe", &encoded));
    }

    #[test]
    fn salts_differ() {
        let hasher = PasswordHasher::new(2);
        assert_ne!(hasher.hash("pw"), hasher.hash("pw"));
    }

    #[test]
    fn stored_iterations_win() {
        let encoded = PasswordHasher::new(5).hash("pw");
        assert!(PasswordHasher::new(50).verify("pw", &encoded));
    }

    #[test]
    fn malformed_never_verifies() {
        let hasher = PasswordHasher::new(1);
        let truncated = &hasher.hash("pw")[..40];
        for bad in [
            "",
            "pbkdf2-sha256$1$zz$00",
            "sha256$1$00$00",
            "pbkdf2-sha256$0$00$00",
            "pbkdf2-sha256$1$00$00$extra",
            "$2b$12$bcryptlookingvalue",
            truncated,
        ] {
            assert!(!hasher.verify("pw", bad), "{bad:?}");
        }
    }
}
