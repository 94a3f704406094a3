use rust_decimal::Decimal;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub limits: LimitsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    /// JWT authentication configuration
    pub jwt: JwtAuthConfig,
    /// Email service configuration
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub mobile_money: MobileMoneyConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub videoconference: VideoconferenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl From<&DatabaseConfig> for persistence::db::DatabaseConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            connect_timeout_secs: config.connect_timeout_secs,
            idle_timeout_secs: config.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Requests per minute per authenticated user; 0 disables limiting.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,

    #[serde(default)]
    pub hsts_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_contribution_amount")]
    pub max_contribution_amount: Decimal,

    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// Transactions at or above this amount show up in members' feeds.
    #[serde(default = "default_large_transaction_threshold")]
    pub large_transaction_threshold: Decimal,

    #[serde(default = "default_max_guarantors")]
    pub max_guarantors: usize,

    #[serde(default = "default_max_group_members")]
    pub default_max_members: i32,

    #[serde(default = "default_upcoming_meeting_window_hours")]
    pub upcoming_meeting_window_hours: i64,

    #[serde(default = "default_recent_activity_days")]
    pub recent_activity_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Attempts per command when the store reports a serialization conflict.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_hook_timeout_ms")]
    pub hook_timeout_ms: u64,
}

impl EngineConfig {
    pub fn hook_timeout(&self) -> Duration {
        Duration::from_millis(self.hook_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            hook_timeout_ms: default_hook_timeout_ms(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_rate_limit() -> u32 {
    120
}
fn default_max_contribution_amount() -> Decimal {
    Decimal::from(1_000_000)
}
fn default_currency() -> String {
    "KES".to_string()
}
fn default_large_transaction_threshold() -> Decimal {
    Decimal::from(10_000)
}
fn default_max_guarantors() -> usize {
    10
}
fn default_max_group_members() -> i32 {
    50
}
fn default_upcoming_meeting_window_hours() -> i64 {
    72
}
fn default_recent_activity_days() -> i64 {
    7
}
fn default_max_retries() -> u32 {
    3
}
fn default_hook_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtAuthConfig {
    /// RSA public key in PEM format for verifying tokens
    pub public_key: String,

    /// RSA private key in PEM format. Only set where this service mints
    /// tokens itself (local development and tests).
    #[serde(default)]
    pub private_key: Option<String>,

    /// Access token expiration in seconds (default: 3600 = 1 hour)
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: i64,

    /// Leeway in seconds for clock skew tolerance (default: 30)
    #[serde(default = "default_jwt_leeway")]
    pub leeway_secs: u64,
}

fn default_access_token_expiry() -> i64 {
    3600 // 1 hour
}

fn default_jwt_leeway() -> u64 {
    30
}

/// Email service configuration for invitation emails.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Whether email sending is enabled
    #[serde(default)]
    pub enabled: bool,

    /// Email provider: sendgrid or console (for development)
    #[serde(default = "default_email_provider")]
    pub provider: String,

    /// SendGrid API key (for sendgrid provider)
    #[serde(default)]
    pub sendgrid_api_key: String,

    /// Sender email address (From header)
    #[serde(default = "default_sender_email")]
    pub sender_email: String,

    /// Sender name (From header)
    #[serde(default = "default_sender_name")]
    pub sender_name: String,

    /// Base URL for email links (e.g., https://app.example.com)
    #[serde(default)]
    pub base_url: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_email_provider(),
            sendgrid_api_key: String::new(),
            sender_email: default_sender_email(),
            sender_name: default_sender_name(),
            base_url: String::new(),
        }
    }
}

fn default_email_provider() -> String {
    "console".to_string()
}

fn default_sender_email() -> String {
    "noreply@chama.app".to_string()
}

fn default_sender_name() -> String {
    "Chama".to_string()
}

/// Mobile-money gateway callback settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MobileMoneyConfig {
    /// HMAC-SHA256 secret shared with the gateway. Callbacks are refused when empty.
    #[serde(default)]
    pub callback_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_calendar_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            timeout_ms: default_calendar_timeout_ms(),
        }
    }
}

fn default_calendar_timeout_ms() -> u64 {
    3000
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoconferenceConfig {
    /// Prefix joined with a room id to form the meeting link.
    #[serde(default = "default_videoconference_base_url")]
    pub base_url: String,
}

impl Default for VideoconferenceConfig {
    fn default() -> Self {
        Self {
            base_url: default_videoconference_base_url(),
        }
    }
}

impl VideoconferenceConfig {
    pub fn room_url(&self, room_id: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), room_id)
    }
}

fn default_videoconference_base_url() -> String {
    "https://meet.chama.app".to_string()
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with CHAMA__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("CHAMA").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Defaults are embedded so tests do not depend on the working directory.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30

            [database]
            url = ""
            max_connections = 20
            min_connections = 5
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [security]
            cors_origins = []
            rate_limit_per_minute = 120
            hsts_enabled = false

            [limits]
            max_contribution_amount = "1000000"
            default_currency = "KES"
            large_transaction_threshold = "10000"
            max_guarantors = 10
            default_max_members = 50
            upcoming_meeting_window_hours = 72
            recent_activity_days = 7

            [engine]
            max_retries = 3
            hook_timeout_ms = 5000

            [jwt]
            public_key = "test-public-key"
            access_token_expiry_secs = 3600
            leeway_secs = 30

            [email]
            enabled = false
            provider = "console"
            sender_email = "test@example.com"
            sender_name = "Test"
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        // Skip validation in tests to allow partial configs
        Ok(cfg)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "CHAMA__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if format!("{}:{}", self.server.host, self.server.port)
            .parse::<SocketAddr>()
            .is_err()
        {
            return Err(ConfigValidationError::InvalidValue(format!(
                "Server host '{}' is not a valid IP address",
                self.server.host
            )));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.limits.max_contribution_amount <= Decimal::ZERO {
            return Err(ConfigValidationError::InvalidValue(
                "max_contribution_amount must be greater than zero".to_string(),
            ));
        }

        if self.calendar.enabled && self.calendar.base_url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "calendar.base_url is required when the calendar is enabled".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .expect("Invalid socket address")
    }
}
