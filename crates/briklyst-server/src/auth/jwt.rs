use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id of the session owner.
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Encode a session token for `user_id`.
///
/// Returns (token_string, expires_at_rfc3339).
pub fn encode_jwt(secret: &str, user_id: &str, session_days: u32) -> Result<(String, String)> {
    let now = Utc::now();
    let exp = now + Duration::days(i64::from(session_days));

    let claims = Claims {
        sub: user_id.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| anyhow!("encode_jwt: {}", e))?;

    Ok((token, exp.to_rfc3339()))
}

/// Decode and validate a session token.
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| anyhow!("decode_jwt: {}", e))?;

    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_subject() {
        let (token, _) = encode_jwt("secret", "usr_abc", 7).expect("encode");
        let claims = decode_jwt(&token, "secret").expect("decode");
        assert_eq!(claims.sub, "usr_abc");
    }

    #[test]
    fn rejects_wrong_secret() {
        let (token, _) = encode_jwt("secret", "usr_abc", 7).expect("encode");
        assert!(decode_jwt(&token, "other").is_err());
    }
}
