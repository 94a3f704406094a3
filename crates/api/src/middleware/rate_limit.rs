//! Per-user rate limiting.
//!
//! Each authenticated user gets a governor quota of
//! `security.rate_limit_per_minute`. Requests without a valid bearer token are
//! passed through; the auth extractor rejects them downstream.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovRateLimiter,
};
use serde_json::json;
use std::{
    collections::HashMap,
    num::NonZeroU32,
    sync::{Arc, RwLock},
};
use uuid::Uuid;

use crate::app::AppState;
use crate::extractors::user_auth::bearer_user_id;

type UserRateLimiter = GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub struct RateLimiterState {
    limiters: RwLock<HashMap<Uuid, Arc<UserRateLimiter>>>,
    quota: Quota,
    rate_limit_per_minute: u32,
}

impl RateLimiterState {
    /// Returns `None` when the limit is 0, which disables limiting.
    pub fn new(rate_limit_per_minute: u32) -> Option<Self> {
        let per_minute = NonZeroU32::new(rate_limit_per_minute)?;
        Some(Self {
            limiters: RwLock::new(HashMap::new()),
            quota: Quota::per_minute(per_minute),
            rate_limit_per_minute,
        })
    }

    fn limiter_for(&self, user_id: Uuid) -> Arc<UserRateLimiter> {
        if let Ok(limiters) = self.limiters.read() {
            if let Some(limiter) = limiters.get(&user_id) {
                return limiter.clone();
            }
        }

        let mut limiters = match self.limiters.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        limiters
            .entry(user_id)
            .or_insert_with(|| Arc::new(GovRateLimiter::direct(self.quota)))
            .clone()
    }

    /// `Err` carries the retry-after in whole seconds (at least 1).
    pub fn check(&self, user_id: Uuid) -> Result<(), u64> {
        self.limiter_for(user_id).check().map_err(|not_until| {
            not_until
                .wait_time_from(DefaultClock::default().now())
                .as_secs()
                .max(1)
        })
    }

    pub fn rate_limit_per_minute(&self) -> u32 {
        self.rate_limit_per_minute
    }
}

impl std::fmt::Debug for RateLimiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterState")
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field(
                "active_limiters",
                &self.limiters.read().map(|l| l.len()).unwrap_or(0),
            )
            .finish()
    }
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return next.run(req).await;
    };
    let Some(user_id) = bearer_user_id(&state, req.headers()) else {
        return next.run(req).await;
    };

    if let Err(retry_after) = limiter.check(user_id) {
        tracing::debug!(user_id = %user_id, retry_after, "Rate limit exceeded");
        return rate_limited_response(limiter.rate_limit_per_minute(), retry_after);
    }

    next.run(req).await
}

fn rate_limited_response(limit: u32, retry_after: u64) -> Response {
    let body = json!({
        "success": false,
        "error": "rate_limited",
        "message": format!("Rate limit of {} requests/minute exceeded", limit),
        "details": { "retry_after": retry_after },
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_limit_disables() {
        assert!(RateLimiterState::new(0).is_none());
    }

    #[test]
    fn test_allows_within_quota() {
        let state = RateLimiterState::new(5).unwrap();
        let user = Uuid::new_v4();
        for i in 0..5 {
            assert!(state.check(user).is_ok(), "Request {} should be allowed", i);
        }
        assert!(state.check(user).unwrap_err() >= 1);
    }

    #[test]
    fn test_users_are_independent() {
        let state = RateLimiterState::new(1).unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(state.check(a).is_ok());
        assert!(state.check(b).is_ok());
        assert!(state.check(a).is_err());
    }

    #[test]
    fn test_limiter_is_reused_per_user() {
        let state = RateLimiterState::new(100).unwrap();
        let user = Uuid::new_v4();
        assert!(Arc::ptr_eq(&state.limiter_for(user), &state.limiter_for(user)));
        assert!(format!("{:?}", state).contains("active_limiters"));
    }

    #[test]
    fn test_rate_limited_response_format() {
        let response = rate_limited_response(100, 60);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "60");
    }
}
