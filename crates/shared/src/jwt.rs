//! JWT token utilities using RS256 algorithm.
//!
//! Tokens are issued by the platform's identity service; this server only
//! needs the public key to verify them. A signing key can be supplied for
//! tooling and integration tests that have to mint their own tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error type for JWT operations.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingError(String),

    #[error("Failed to decode token: {0}")]
    DecodingError(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("No signing key configured")]
    SigningDisabled,
}

/// System-wide role carried in the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SystemRole {
    #[default]
    User,
    Admin,
}

/// JWT token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// JWT ID (unique token identifier for revocation)
    pub jti: String,
    /// System role; tokens without one are plain users.
    #[serde(default)]
    pub role: SystemRole,
}

/// Configuration for JWT validation (and optional generation).
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: Option<EncodingKey>,
    decoding_key: DecodingKey,
    /// Access token expiration in seconds, used when minting tokens.
    pub access_token_expiry_secs: i64,
    /// Leeway in seconds for clock skew tolerance (default: 30)
    pub leeway_secs: u64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_token_expiry_secs", &self.access_token_expiry_secs)
            .field("leeway_secs", &self.leeway_secs)
            .field("can_sign", &self.encoding_key.is_some())
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

/// Default leeway in seconds for clock skew tolerance
pub const DEFAULT_LEEWAY_SECS: u64 = 30;

impl JwtConfig {
    /// Creates a verify-only config from an RSA public key in PEM format.
    pub fn verifier(public_key_pem: &str, leeway_secs: u64) -> Result<Self, JwtError> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(format!("Invalid public key: {}", e)))?;

        Ok(Self {
            encoding_key: None,
            decoding_key,
            access_token_expiry_secs: 3600,
            leeway_secs,
        })
    }

    /// Creates a config that can both sign and verify.
    ///
    /// # Arguments
    /// * `private_key_pem` - RSA private key in PEM format
    /// * `public_key_pem` - RSA public key in PEM format
    /// * `access_token_expiry_secs` - Access token expiration in seconds
    pub fn with_signing_key(
        private_key_pem: &str,
        public_key_pem: &str,
        access_token_expiry_secs: i64,
    ) -> Result<Self, JwtError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(format!("Invalid private key: {}", e)))?;
        let mut config = Self::verifier(public_key_pem, DEFAULT_LEEWAY_SECS)?;
        config.encoding_key = Some(encoding_key);
        config.access_token_expiry_secs = access_token_expiry_secs;
        Ok(config)
    }

    /// Creates a JwtConfig for testing with HS256 symmetric key.
    /// DO NOT use in production - only for tests.
    #[cfg(test)]
    pub fn new_for_testing(secret: &str) -> Self {
        Self {
            encoding_key: Some(EncodingKey::from_secret(secret.as_bytes())),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expiry_secs: 900,
            leeway_secs: 0, // Strict for testing - no leeway
        }
    }

    /// Generates an access token for the given user. Returns `(token, jti)`.
    pub fn generate_access_token(
        &self,
        user_id: Uuid,
        role: SystemRole,
    ) -> Result<(String, String), JwtError> {
        let encoding_key = self.encoding_key.as_ref().ok_or(JwtError::SigningDisabled)?;
        let now = Utc::now();
        let jti = Uuid::new_v4().to_string();
        let exp = (now + Duration::seconds(self.access_token_expiry_secs)).timestamp();

        let claims = Claims {
            sub: user_id.to_string(),
            exp,
            iat: now.timestamp(),
            jti: jti.clone(),
            role,
        };

        let header = Header::new(self.algorithm());
        let token = encode(&header, &claims, encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;

        Ok((token, jti))
    }

    /// Validates a token and returns its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(self.algorithm());
        validation.validate_exp = true;
        validation.leeway = self.leeway_secs;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidToken
                | jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidToken,
                _ => JwtError::DecodingError(e.to_string()),
            }
        })?;

        Ok(token_data.claims)
    }

    /// Tests use HS256, production uses RS256.
    fn algorithm(&self) -> Algorithm {
        #[cfg(test)]
        {
            Algorithm::HS256
        }
        #[cfg(not(test))]
        {
            Algorithm::RS256
        }
    }
}

/// Extracts user ID from validated claims.
pub fn extract_user_id(claims: &Claims) -> Result<Uuid, JwtError> {
    Uuid::parse_str(&claims.sub).map_err(|_| JwtError::InvalidToken)
}
