use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Username (subject)
    pub sub: String,
    /// Issued at timestamp (Unix)
    pub iat: u64,
    /// Expiration timestamp (Unix)
    pub exp: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token generation failed: {0}")]
    TokenGeneration(String),
    #[error("Token validation failed: {0}")]
    TokenValidation(String),
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid token")]
    InvalidToken,
}

/// HS256 token signing and validation, keyed by a shared secret.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: u64,
}

impl JwtService {
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs,
        }
    }

    pub fn generate_token(&self, username: &str) -> Result<String, JwtError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| JwtError::TokenGeneration(e.to_string()))?
            .as_secs();

        let claims = Claims {
            sub: username.to_string(),
            iat: now,
            exp: now + self.expiration_secs,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::TokenGeneration(e.to_string()))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidToken
                | jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidToken,
                _ => JwtError::TokenValidation(e.to_string()),
            })
    }

    pub fn extract_username(&self, token: &str) -> Result<String, JwtError> {
        self.validate_token(token).map(|claims| claims.sub)
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("expiration_secs", &self.expiration_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_service() -> JwtService {
        JwtService::new("test-secret-key-32-chars-long!!", 3600)
    }

    #[test]
    fn test_generate_and_validate_token() {
        let service = create_test_service();
        let token = service
            .generate_token("jane")
            .expect("Token generation should succeed");

        let claims = service
            .validate_token(&token)
            .expect("Token validation should succeed");

        assert_eq!(claims.sub, "jane");
        assert_eq!(claims.exp, claims.iat + 3600);
    }

    #[test]
    fn test_extract_username() {
        let service = create_test_service();
        let token = service
            .generate_token("jane")
            .expect("Token generation should succeed");

        let username = service
            .extract_username(&token)
            .expect("Username extraction should succeed");

        assert_eq!(username, "jane");
    }

    #[test]
    fn test_invalid_token() {
        let service = create_test_service();
        let result = service.validate_token("invalid.token.here");

        assert!(matches!(
            result,
            Err(JwtError::InvalidToken) | Err(JwtError::TokenValidation(_))
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let service1 = JwtService::new("secret1-32-chars-long-key!!!!!", 3600);
        let service2 = JwtService::new("secret2-32-chars-long-key!!!!!", 3600);

        let token = service1
            .generate_token("jane")
            .expect("Token generation should succeed");

        let result = service2.validate_token(&token);
        assert!(matches!(result, Err(JwtError::InvalidToken)));
    }

    #[test]
    fn test_expired_token() {
        let service = create_test_service();

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Clock should be past the epoch")
            .as_secs();

        // Expired an hour ago, well past default validation leeway
        let claims = Claims {
            sub: "jane".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret-key-32-chars-long!!"),
        )
        .expect("Token encoding should succeed");

        let result = service.validate_token(&token);
        assert!(matches!(result, Err(JwtError::TokenExpired)));
    }
}
