//! User JWT authentication extractor.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use shared::jwt::{extract_user_id, JwtConfig, JwtError, SystemRole};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

/// Authenticated caller, taken from the `Authorization: Bearer` token.
///
/// The system role is carried for administrative listings only; it never
/// bypasses per-group role checks.
#[derive(Debug, Clone)]
pub struct UserAuth {
    pub user_id: Uuid,
    pub jti: String,
    pub role: SystemRole,
}

impl UserAuth {
    pub fn is_admin(&self) -> bool {
        self.role == SystemRole::Admin
    }

    /// Validates the bearer token in `headers`.
    pub fn from_headers(jwt: &JwtConfig, headers: &HeaderMap) -> Result<Self, ApiError> {
        let value = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = parse_bearer(value).ok_or_else(|| {
            ApiError::Unauthorized("Invalid Authorization header format".to_string())
        })?;

        let claims = jwt.validate_token(token).map_err(|e| match e {
            JwtError::TokenExpired => ApiError::Unauthorized("Token has expired".to_string()),
            _ => ApiError::Unauthorized("Invalid or expired token".to_string()),
        })?;
        let user_id = extract_user_id(&claims)
            .map_err(|_| ApiError::Unauthorized("Invalid token subject".to_string()))?;

        Ok(Self {
            user_id,
            jti: claims.jti,
            role: claims.role,
        })
    }
}

fn parse_bearer(value: &str) -> Option<&str> {
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// User id of a valid bearer token, if any. Used where a rejection is not wanted.
pub fn bearer_user_id(state: &AppState, headers: &HeaderMap) -> Option<Uuid> {
    UserAuth::from_headers(&state.jwt, headers)
        .ok()
        .map(|auth| auth.user_id)
}

#[async_trait]
impl FromRequestParts<AppState> for UserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<UserAuth>() {
            return Ok(auth.clone());
        }
        let auth = UserAuth::from_headers(&state.jwt, &parts.headers)?;
        parts.extensions.insert(auth.clone());
        Ok(auth)
    }
}
