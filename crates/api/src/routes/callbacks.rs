//! Mobile-money gateway callback.
//!
//! Unauthenticated by JWT. The gateway signs the raw body with the shared
//! secret and sends `X-Signature: sha256=<hex>`.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use domain::models::contribution::MobileMoneyCallback;
use domain::models::wallet::LedgerEntry;
use shared::crypto::verify_signature;
use tracing::warn;

use crate::app::AppState;
use crate::error::ApiError;
use crate::response::ApiResponse;

pub const SIGNATURE_HEADER: &str = "x-signature";

/// Confirm or fail a pending mobile-money contribution.
///
/// POST /api/v1/callbacks/mobile-money
pub async fn mobile_money(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ApiResponse<LedgerEntry>, ApiError> {
    let secret = &state.config.mobile_money.callback_secret;
    if secret.is_empty() {
        return Err(ApiError::ServiceUnavailable(
            "Mobile money callbacks are not configured".to_string(),
        ));
    }

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing signature".to_string()))?;
    if !verify_signature(&body, signature, secret) {
        warn!("Rejected mobile money callback with bad signature");
        return Err(ApiError::Unauthorized("Invalid signature".to_string()));
    }

    let callback: MobileMoneyCallback = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("Invalid callback body: {}", e)))?;
    let entry = state.contributions.confirm_mobile_money(callback).await?;
    Ok(ApiResponse::ok(entry))
}
