use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub composer: ComposerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    /// Role a token must carry to use the composer
    #[serde(default = "default_admin_role")]
    pub admin_role: String,
}

/// Connection to the Carryofy REST backend
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// "http" (default) or "memory"
    #[serde(default = "default_backend_kind")]
    pub kind: String,
    #[serde(default = "default_backend_url")]
    pub base_url: String,
    /// Timeout for audience-count and product lookups
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Timeout for the create-broadcast call
    #[serde(default = "default_create_timeout_ms")]
    pub create_timeout_ms: u64,
    /// Attempts for idempotent reads. The create call is never retried.
    #[serde(default = "default_read_attempts")]
    pub read_attempts: u32,
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComposerConfig {
    /// Sessions untouched for this long are discarded
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
    /// Flat per-recipient email cost used for the review estimate
    #[serde(default = "default_email_cost")]
    pub email_cost_per_message_kobo: u64,
    #[serde(default = "default_product_limit")]
    pub default_product_limit: u32,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_admin_role() -> String {
    "ADMIN".to_string()
}

fn default_backend_kind() -> String {
    "http".to_string()
}

fn default_backend_url() -> String {
    "http://localhost:3000/api/v1".to_string()
}

fn default_read_timeout_ms() -> u64 {
    10_000
}

fn default_create_timeout_ms() -> u64 {
    30_000
}

fn default_read_attempts() -> u32 {
    3
}

fn default_retry_initial_delay_ms() -> u64 {
    200
}

fn default_retry_max_delay_ms() -> u64 {
    2_000
}

fn default_idle_timeout() -> u64 {
    1800 // 30 minutes
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_email_cost() -> u64 {
    50 // ₦0.50
}

fn default_product_limit() -> u32 {
    20
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("backend.kind", default_backend_kind())?
            .set_default("backend.base_url", default_backend_url())?
            .set_default("composer.idle_timeout_seconds", default_idle_timeout() as i64)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // CARRYOFY_SERVER__PORT, CARRYOFY_JWT__SECRET, CARRYOFY_BACKEND__BASE_URL, ...
            .add_source(
                Environment::with_prefix("CARRYOFY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            base_url: default_backend_url(),
            read_timeout_ms: default_read_timeout_ms(),
            create_timeout_ms: default_create_timeout_ms(),
            read_attempts: default_read_attempts(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: default_idle_timeout(),
            cleanup_interval_seconds: default_cleanup_interval(),
            email_cost_per_message_kobo: default_email_cost(),
            default_product_limit: default_product_limit(),
        }
    }
}
