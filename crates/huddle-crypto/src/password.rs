use anyhow::{Result, anyhow};
use argon2::password_hash::Output;
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 64;

/// Hashes and verifies passwords.
///
/// Cost parameters are not part of the stored form, so every hash in one
/// database must be produced by a store built with the same parameters.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    params: Params,
}

impl CredentialStore {
    /// Argon2id with the library's recommended cost.
    pub fn recommended() -> Result<Self> {
        Self::with_cost(
            Params::DEFAULT_M_COST,
            Params::DEFAULT_T_COST,
            Params::DEFAULT_P_COST,
        )
    }

    /// Custom Argon2id cost: memory in KiB, iterations, parallelism.
    pub fn with_cost(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self> {
        let params = Params::new(m_cost, t_cost, p_cost, Some(KEY_LEN))
            .map_err(|e| anyhow!("Invalid Argon2 parameters: {}", e))?;
        Ok(Self { params })
    }

    fn derive(&self, password: &[u8], salt: &[u8]) -> Result<[u8; KEY_LEN]> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let mut out = [0u8; KEY_LEN];
        argon2
            .hash_password_into(password, salt, &mut out)
            .map_err(|e| anyhow!("Key derivation failed: {}", e))?;
        Ok(out)
    }

    /// Hash a password into `derived_hex.salt_hex`.
    pub fn hash(&self, password: &str) -> Result<String> {
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);
        let salt_hex = hex::encode(salt);

        let derived = self.derive(password.as_bytes(), salt_hex.as_bytes())?;
        Ok(format!("{}.{}", hex::encode(derived), salt_hex))
    }

    /// Check a supplied password against a stored form.
    ///
    /// The final comparison is constant-time. Malformed stored forms are a
    /// mismatch, not an error.
    pub fn verify(&self, supplied: &str, stored: &str) -> bool {
        let Some((hash_hex, salt_hex)) = stored.split_once('.') else {
            return false;
        };
        let Ok(expected) = hex::decode(hash_hex) else {
            return false;
        };
        let Ok(derived) = self.derive(supplied.as_bytes(), salt_hex.as_bytes()) else {
            return false;
        };

        match (Output::new(&expected), Output::new(&derived)) {
            (Ok(expected), Ok(derived)) => expected == derived,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CredentialStore {
        CredentialStore::with_cost(1024, 1, 1).unwrap()
    }

    #[test]
    fn hash_verify_roundtrip() {
        let store = store();
        let stored = store.hash("correct horse").unwrap();

        let (derived, salt) = stored.split_once('.').unwrap();
        assert_eq!(derived.len(), KEY_LEN * 2);
        assert_eq!(salt.len(), SALT_LEN * 2);

        assert!(store.verify("correct horse", &stored));
        assert!(!store.verify("correct horsf", &stored));
    }

    #[test]
    fn same_password_gets_fresh_salt() {
        let store = store();
        let a = store.hash("admin123").unwrap();
        let b = store.hash("admin123").unwrap();
        assert_ne!(a, b);
        assert!(store.verify("admin123", &a));
        assert!(store.verify("admin123", &b));
    }

    #[test]
    fn malformed_stored_forms_never_match() {
        let store = store();
        assert!(!store.verify("pw", ""));
        assert!(!store.verify("pw", "no-separator"));
        assert!(!store.verify("pw", "zz.00112233445566778899aabbccddeeff"));
        // too short for the comparison primitive
        assert!(!store.verify("pw", "abcd.00112233445566778899aabbccddeeff"));
        // salt below the Argon2 minimum
        assert!(!store.verify("pw", &format!("{}.ab", "00".repeat(KEY_LEN))));
    }

    #[test]
    fn truncated_hash_is_a_mismatch() {
        let store = store();
        let stored = store.hash("secret").unwrap();
        let (derived, salt) = stored.split_once('.').unwrap();
        let truncated = format!("{}.{}", &derived[..40], salt);
        assert!(!store.verify("secret", &truncated));
    }
}
