//! Application configuration management.
//!
//! Configuration is loaded once at startup and handed to each service
//! constructor. Nothing reads it from ambient global state afterwards.

use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtConfig,
    /// Inbound webhook verification.
    pub webhook: WebhookConfig,
    /// Payment processor API client.
    pub processor: ProcessorConfig,
    /// Refund proof object storage.
    pub storage: StorageSettings,
    /// Refund authorization and proof URL lifetime.
    #[serde(default)]
    pub refunds: RefundConfig,
    /// Ledger account codes and revenue split.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// JWT configuration.
#[derive(Clone, Deserialize)]
pub struct JwtConfig {
    /// Secret key for verifying bearer tokens.
    pub secret: String,
    /// Access token expiration in seconds.
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[hidden]")
            .field("access_token_expiry_secs", &self.access_token_expiry_secs)
            .finish()
    }
}

/// Webhook signature verification settings.
#[derive(Clone, Deserialize)]
pub struct WebhookConfig {
    /// Current shared signing secret.
    pub secret: String,
    /// Previous signing secret, accepted while a rotation is in progress.
    #[serde(default)]
    pub previous_secret: Option<String>,
    /// Maximum age of a signature timestamp.
    #[serde(default = "default_freshness_window")]
    pub freshness_window_secs: u64,
    /// How far in the future a signature timestamp may lie.
    #[serde(default = "default_clock_skew")]
    pub max_clock_skew_secs: u64,
}

fn default_freshness_window() -> u64 {
    300
}

fn default_clock_skew() -> u64 {
    30
}

impl WebhookConfig {
    /// Creates a config with a single secret and default windows.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            previous_secret: None,
            freshness_window_secs: default_freshness_window(),
            max_clock_skew_secs: default_clock_skew(),
        }
    }

    /// All secrets currently accepted, newest first.
    #[must_use]
    pub fn accepted_secrets(&self) -> Vec<&str> {
        std::iter::once(self.secret.as_str())
            .chain(self.previous_secret.as_deref())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("secret", &"[hidden]")
            .field(
                "previous_secret",
                &self.previous_secret.as_ref().map(|_| "[hidden]"),
            )
            .field("freshness_window_secs", &self.freshness_window_secs)
            .field("max_clock_skew_secs", &self.max_clock_skew_secs)
            .finish()
    }
}

/// Payment processor API client settings.
#[derive(Clone, Deserialize)]
pub struct ProcessorConfig {
    /// Base URL of the processor API.
    pub base_url: String,
    /// Bearer access token for the processor API.
    pub access_token: String,
    /// Per-request timeout.
    #[serde(default = "default_processor_timeout")]
    pub timeout_secs: u64,
}

fn default_processor_timeout() -> u64 {
    10
}

impl std::fmt::Debug for ProcessorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &"[hidden]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Storage provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageProvider {
    /// S3-compatible storage: Cloudflare R2, Supabase, AWS S3, DigitalOcean Spaces
    S3 {
        /// S3 endpoint URL.
        endpoint: String,
        /// S3 bucket name.
        bucket: String,
        /// AWS access key ID.
        access_key_id: String,
        /// AWS secret access key.
        secret_access_key: String,
        /// AWS region.
        region: String,
    },
    /// Azure Blob Storage
    AzureBlob {
        /// Azure storage account name.
        account: String,
        /// Azure storage access key.
        access_key: String,
        /// Azure container name.
        container: String,
    },
    /// Local filesystem (development only)
    LocalFs {
        /// Root directory path.
        root: PathBuf,
    },
}

impl StorageProvider {
    /// Provider name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::AzureBlob { .. } => "azure_blob",
            Self::LocalFs { .. } => "local",
        }
    }
}

/// Object storage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Backend holding refund proof documents.
    pub provider: StorageProvider,
    /// Maximum proof document size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// MIME types accepted as refund proof.
    #[serde(default = "default_proof_mime_types")]
    pub allowed_mime_types: Vec<String>,
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_proof_mime_types() -> Vec<String> {
    vec![
        "application/pdf".to_string(),
        "image/png".to_string(),
        "image/jpeg".to_string(),
        "image/webp".to_string(),
    ]
}

/// Refund authorization settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RefundConfig {
    /// Roles allowed to issue refunds and read refund proofs.
    #[serde(default = "default_refund_roles")]
    pub allowed_roles: Vec<String>,
    /// Lifetime of signed proof URLs.
    #[serde(default = "default_proof_url_ttl")]
    pub proof_url_ttl_secs: u64,
}

fn default_refund_roles() -> Vec<String> {
    vec!["finance".to_string(), "admin".to_string()]
}

fn default_proof_url_ttl() -> u64 {
    300 // 5 minutes
}

impl Default for RefundConfig {
    fn default() -> Self {
        Self {
            allowed_roles: default_refund_roles(),
            proof_url_ttl_secs: default_proof_url_ttl(),
        }
    }
}

impl RefundConfig {
    /// Returns true if the role may perform refund operations.
    #[must_use]
    pub fn is_role_allowed(&self, role: &str) -> bool {
        self.allowed_roles.iter().any(|r| r == role)
    }
}

/// Ledger account codes and revenue split.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Account credited with the platform's share.
    #[serde(default = "default_revenue_account")]
    pub revenue_account: String,
    /// Account credited with the professional's payout share.
    #[serde(default = "default_payout_account")]
    pub payout_account: String,
    /// Account debited with the gross amount collected by the processor.
    #[serde(default = "default_clearing_account")]
    pub clearing_account: String,
    /// Fraction of the gross amount owed to the professional.
    #[serde(default = "default_payout_rate")]
    pub payout_rate: Decimal,
}

fn default_revenue_account() -> String {
    "revenue-service".to_string()
}

fn default_payout_account() -> String {
    "liability-professional".to_string()
}

fn default_clearing_account() -> String {
    "processor-clearing".to_string()
}

fn default_payout_rate() -> Decimal {
    Decimal::new(20, 2)
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            revenue_account: default_revenue_account(),
            payout_account: default_payout_account(),
            clearing_account: default_clearing_account(),
            payout_rate: default_payout_rate(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("CLINIPAY").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_secrets_includes_previous_during_rotation() {
        let mut config = WebhookConfig::new("current");
        assert_eq!(config.accepted_secrets(), vec!["current"]);

        config.previous_secret = Some("old".to_string());
        assert_eq!(config.accepted_secrets(), vec!["current", "old"]);
    }

    #[test]
    fn test_webhook_config_debug_hides_secrets() {
        let mut config = WebhookConfig::new("super-secret");
        config.previous_secret = Some("older-secret".to_string());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("older-secret"));
    }

    #[test]
    fn test_refund_config_defaults() {
        let config = RefundConfig::default();
        assert_eq!(config.proof_url_ttl_secs, 300);
        assert!(config.is_role_allowed("finance"));
        assert!(!config.is_role_allowed("patient"));
    }

    #[test]
    fn test_ledger_config_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.revenue_account, "revenue-service");
        assert_eq!(config.payout_account, "liability-professional");
        assert_eq!(config.payout_rate, Decimal::new(20, 2));
    }

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("CLINIPAY__SERVER__PORT", Some("9090")),
                ("CLINIPAY__DATABASE__URL", Some("postgres://localhost/clinipay")),
                ("CLINIPAY__JWT__SECRET", Some("jwt-secret")),
                ("CLINIPAY__WEBHOOK__SECRET", Some("whsec")),
                ("CLINIPAY__PROCESSOR__BASE_URL", Some("https://processor.test")),
                ("CLINIPAY__PROCESSOR__ACCESS_TOKEN", Some("token")),
                ("CLINIPAY__STORAGE__PROVIDER__TYPE", Some("local_fs")),
                ("CLINIPAY__STORAGE__PROVIDER__ROOT", Some("./storage")),
            ],
            || {
                let config = AppConfig::load().expect("config should load");
                assert_eq!(config.server.port, 9090);
                assert_eq!(config.webhook.freshness_window_secs, 300);
                assert_eq!(config.processor.timeout_secs, 10);
                assert_eq!(config.storage.provider.name(), "local");
                assert!(
                    config
                        .storage
                        .allowed_mime_types
                        .contains(&"application/pdf".to_string())
                );
                assert_eq!(config.refunds.proof_url_ttl_secs, 300);
            },
        );
    }
}
