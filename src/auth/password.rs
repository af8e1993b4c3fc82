use std::sync::OnceLock;

use super::AuthError;

/// Hash a password for storage. Costs below 10 are raised to 10.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost.max(10)).map_err(|e| AuthError::Hash(e.to_string()))
}

/// Constant-time comparison against a stored bcrypt hash. A malformed hash
/// counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!("Stored password hash could not be parsed: {}", e);
            false
        }
    }
}

/// Burn one comparison's worth of work when there is no hash to check, so
/// unknown emails and OAuth-only identities take as long as a wrong password.
pub fn equalize_timing(password: &str) {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    let dummy = DUMMY.get_or_init(|| bcrypt::hash("timing-equalizer", 10).ok());
    if let Some(hash) = dummy {
        let _ = bcrypt::verify(password, hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_the_original_plaintext() {
        let hash = hash_password("correct horse", 10).unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("correct hors", &hash));
        assert!(!verify_password("Correct horse", &hash));
        assert!(!verify_password("", &hash));
    }

    #[test]
    fn low_cost_is_raised() {
        let hash = hash_password("pw", 4).unwrap();
        assert!(hash.starts_with("$2b$10$"));
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        assert!(!verify_password("pw", "not-a-bcrypt-hash"));
    }
}
