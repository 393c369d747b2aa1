//! JWT token generation and validation

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::BookwormError;

/// Claims carried in a Bookworm access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User document id (hex ObjectId)
    pub sub: String,
    /// Login identifier, for logging and display
    pub email: String,
    /// "user" or "admin"
    pub role: String,
    /// Must match the user's current token_version
    pub token_version: i32,
    /// Expiry (seconds since epoch)
    pub exp: u64,
    /// Issued-at (seconds since epoch)
    pub iat: u64,
}

/// Issues and validates Bookworm JWTs
#[derive(Clone)]
pub struct JwtValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_seconds: u64,
}

impl JwtValidator {
    pub fn new(secret: &str, expiry_seconds: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_seconds,
        }
    }

    /// Issue a token for a user
    pub fn generate(
        &self,
        user_id: &str,
        email: &str,
        role: &str,
        token_version: i32,
    ) -> Result<(String, u64), BookwormError> {
        let now = unix_now();
        let exp = now + self.expiry_seconds;

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            token_version,
            exp,
            iat: now,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| BookwormError::Auth(format!("Failed to sign token: {e}")))?;

        Ok((token, exp))
    }

    /// Validate a token and return its claims
    pub fn validate(&self, token: &str) -> Result<Claims, BookwormError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| BookwormError::Auth(format!("Invalid token: {e}")))?;

        Ok(data.claims)
    }
}

/// Extract a bearer token from an Authorization header value
pub fn extract_token_from_header(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_validate() {
        let validator = JwtValidator::new("test-secret", 3600);
        let (token, exp) = validator
            .generate("64b0c0ffee0000000000aaaa", "reader@example.com", "user", 1)
            .unwrap();

        let claims = validator.validate(&token).unwrap();
        assert_eq!(claims.sub, "64b0c0ffee0000000000aaaa");
        assert_eq!(claims.email, "reader@example.com");
        assert_eq!(claims.role, "user");
        assert_eq!(claims.token_version, 1);
        assert_eq!(claims.exp, exp);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = JwtValidator::new("secret-a", 3600);
        let verifier = JwtValidator::new("secret-b", 3600);
        let (token, _) = issuer.generate("id", "a@b.c", "user", 1).unwrap();

        assert!(verifier.validate(&token).is_err());
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(
            extract_token_from_header(Some("Bearer abc.def.ghi")),
            Some("abc.def.ghi")
        );
        assert_eq!(extract_token_from_header(Some("Basic abc")), None);
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);
        assert_eq!(extract_token_from_header(None), None);
    }
}
