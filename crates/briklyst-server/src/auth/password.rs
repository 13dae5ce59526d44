use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

const MIN_PASSWORD_CHARS: usize = 12;
const MAX_PASSWORD_BYTES: usize = 256;

/// Hash a password with Argon2id.
///
/// `m_cost` is the memory cost in KB (`BRIKLYST_ARGON2_MEMORY_KB`, default 64MB).
pub fn hash_password(password: &str, m_cost: u32) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let params = Params::new(m_cost, 3, 1, Some(32)).map_err(|e| anyhow!("argon2 params: {e}"))?;
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("hash_password: {e}"))
}

/// Verify a password against a stored PHC string. Parameters come from the hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Signup password rules: at least 12 characters, not blank, bounded length.
pub fn validate_password_strength(password: &str) -> Result<()> {
    if password.trim().is_empty() {
        return Err(anyhow!("password cannot be empty or whitespace-only"));
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(anyhow!(
            "password must be at least {MIN_PASSWORD_CHARS} characters"
        ));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(anyhow!("password must be at most {MAX_PASSWORD_BYTES} bytes"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_whitespace_only_password() {
        assert!(validate_password_strength("            ").is_err());
    }

    #[test]
    fn rejects_short_password() {
        assert!(validate_password_strength("short").is_err());
    }

    #[test]
    fn rejects_oversized_password() {
        assert!(validate_password_strength(&"x".repeat(300)).is_err());
    }

    #[test]
    fn accepts_valid_password() {
        assert!(validate_password_strength("strong_password_123").is_ok());
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("strong_password_123", 4096).expect("hash");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("strong_password_123", &hash));
        assert!(!verify_password("wrong_password_123", &hash));
        assert!(!verify_password("strong_password_123", "not-a-hash"));
    }
}
