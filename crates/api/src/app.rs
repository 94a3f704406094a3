use anyhow::Context;
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use domain::services::{CalendarService, MockCalendarService, RandomRoomIds};
use persistence::repositories::NotificationRepository;
use shared::jwt::JwtConfig;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{Config, JwtAuthConfig};
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, security_headers_middleware,
    trace_id, RateLimiterState,
};
use crate::routes::{
    callbacks, contributions, cycles, dividends, groups, health, invitations, loans, meetings,
    notifications, wallets,
};
use crate::services::{
    ContributionService, CycleService, DividendService, EmailService, EngineContext,
    GroupService, HttpCalendarService, LoanService, MeetingService, NotificationService,
    WalletService,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub jwt: Arc<JwtConfig>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
    pub groups: GroupService,
    pub wallets: WalletService,
    pub contributions: ContributionService,
    pub loans: LoanService,
    pub cycles: CycleService,
    pub dividends: DividendService,
    pub meetings: MeetingService,
    pub notifications: NotificationService,
}

impl AppState {
    /// Wires every service onto one engine context.
    pub fn new(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let jwt = Arc::new(build_jwt(&config.jwt).context("invalid JWT key material")?);
        let rate_limiter =
            RateLimiterState::new(config.security.rate_limit_per_minute).map(Arc::new);

        let ctx = EngineContext::new(pool.clone(), config.clone());
        let calendar: Arc<dyn CalendarService> = if config.calendar.enabled {
            Arc::new(
                HttpCalendarService::new(config.calendar.clone())
                    .context("failed to build calendar client")?,
            )
        } else {
            Arc::new(MockCalendarService::new())
        };
        let email = EmailService::new(config.email.clone());

        Ok(Self {
            groups: GroupService::new(ctx.clone(), email),
            wallets: WalletService::new(ctx.clone()),
            contributions: ContributionService::new(ctx.clone()),
            loans: LoanService::new(ctx.clone()),
            cycles: CycleService::new(ctx.clone()),
            dividends: DividendService::new(ctx.clone()),
            meetings: MeetingService::new(ctx, calendar, Arc::new(RandomRoomIds)),
            notifications: NotificationService::new(
                NotificationRepository::new(pool.clone()),
                config.clone(),
            ),
            pool,
            config,
            jwt,
            rate_limiter,
        })
    }
}

/// A verifier, or a signer too when a private key is configured.
fn build_jwt(config: &JwtAuthConfig) -> Result<JwtConfig, shared::jwt::JwtError> {
    match &config.private_key {
        Some(private_key) => JwtConfig::with_signing_key(
            private_key,
            &config.public_key,
            config.access_token_expiry_secs,
        ),
        None => JwtConfig::verifier(&config.public_key, config.leeway_secs),
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.security.cors_origins.is_empty() {
        // Development: any origin
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Versioned API. Handlers authenticate through the UserAuth extractor;
    // the rate limiter keys on the bearer subject.
    let protected_routes = Router::new()
        // Groups and membership
        .route(
            "/api/v1/groups",
            post(groups::create_group).get(groups::list_groups),
        )
        .route("/api/v1/groups/:group_id", get(groups::get_group))
        .route(
            "/api/v1/groups/:group_id/members/:user_id/role",
            put(groups::update_member_role),
        )
        .route(
            "/api/v1/groups/:group_id/invitations",
            post(groups::send_invitation),
        )
        .route("/api/v1/invitations", get(invitations::list_invitations))
        .route(
            "/api/v1/invitations/:invitation_id/respond",
            post(invitations::respond_invitation),
        )
        // Wallets and contributions
        .route("/api/v1/wallet", get(wallets::my_wallet))
        .route("/api/v1/wallet/transactions", get(wallets::my_transactions))
        .route("/api/v1/groups/:group_id/wallet", get(wallets::group_wallet))
        .route(
            "/api/v1/groups/:group_id/contributions",
            post(contributions::contribute),
        )
        // Loans
        .route(
            "/api/v1/groups/:group_id/loans",
            post(loans::apply).get(loans::list_loans),
        )
        .route("/api/v1/loans/:loan_id", get(loans::get_loan))
        .route(
            "/api/v1/guarantees/:guarantee_id/respond",
            post(loans::respond_guarantee),
        )
        .route("/api/v1/loans/:loan_id/approve", post(loans::approve))
        .route("/api/v1/loans/:loan_id/reject", post(loans::reject))
        .route("/api/v1/loans/:loan_id/disburse", post(loans::disburse))
        .route("/api/v1/loans/:loan_id/repayments", post(loans::repay))
        // Rotating payout
        .route("/api/v1/groups/:group_id/cycles", post(cycles::create_cycle))
        .route("/api/v1/cycles/:cycle_id", get(cycles::get_cycle))
        .route(
            "/api/v1/cycles/:cycle_id/advance",
            post(cycles::advance_cycle),
        )
        // Shares and dividends
        .route(
            "/api/v1/groups/:group_id/shares/:user_id",
            put(dividends::set_share_holding),
        )
        .route("/api/v1/groups/:group_id/dividends", post(dividends::declare))
        .route(
            "/api/v1/dividends/:declaration_id/approve",
            post(dividends::approve),
        )
        .route(
            "/api/v1/dividends/:declaration_id/process",
            post(dividends::process),
        )
        .route(
            "/api/v1/dividends/:declaration_id/payments",
            get(dividends::list_payments),
        )
        // Meetings
        .route(
            "/api/v1/groups/:group_id/meetings",
            post(meetings::create_meeting),
        )
        .route(
            "/api/v1/meetings/:meeting_id/start",
            post(meetings::start_meeting),
        )
        .route("/api/v1/meetings/:meeting_id/end", post(meetings::end_meeting))
        .route(
            "/api/v1/meetings/:meeting_id/cancel",
            post(meetings::cancel_meeting),
        )
        .route(
            "/api/v1/meetings/:meeting_id/attendance",
            post(meetings::mark_attendance),
        )
        .route(
            "/api/v1/meetings/:meeting_id/minutes",
            put(meetings::write_minutes),
        )
        .route(
            "/api/v1/meetings/:meeting_id/minutes/approve",
            post(meetings::approve_minutes),
        )
        // Notifications
        .route(
            "/api/v1/notifications",
            get(notifications::list_notifications),
        )
        .route(
            "/api/v1/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route(
            "/api/v1/notifications/read-all",
            post(notifications::mark_all_read),
        )
        .route(
            "/api/v1/notifications/:id/read",
            post(notifications::mark_read),
        )
        .route(
            "/api/v1/notifications/:id",
            delete(notifications::delete_notification),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    // Public routes (no JWT)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler))
        .route(
            "/api/v1/callbacks/mobile-money",
            post(callbacks::mobile_money),
        );

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors_layer(&config))
        .with_state(state)
}
