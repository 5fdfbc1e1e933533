use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub billing: BillingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub environment: DeploymentEnvironment,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentEnvironment {
    #[default]
    Development,
    Production,
}

impl DeploymentEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, DeploymentEnvironment::Production)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Shared secret the gateway sends back on every webhook.
    pub webhook_token: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    /// Upper bound on how long the gateway waits for an answer.
    pub processing_timeout_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            processing_timeout_ms: 3000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BillingConfig {
    pub default_due_day: u32,
    pub default_description: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            default_due_day: 10,
            default_description: "Monthly tuition".to_string(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Environment variables (with ACADEMY__ prefix, double underscore separates levels)
        Self::load(Environment::with_prefix("ACADEMY").separator("__"))
    }

    fn load(environment: Environment) -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.environment", "development")?
            .set_default("database.url", "sqlite://academy-billing.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("gateway.base_url", "https://sandbox.asaas.com/api/v3")?
            .set_default("gateway.timeout_secs", 10)?
            .set_default("gateway.max_retries", 2)?
            .set_default("webhook.processing_timeout_ms", 3000)?
            .set_default("billing.default_due_day", 10)?
            .set_default("billing.default_description", "Monthly tuition")?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            .add_source(environment)

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                environment: DeploymentEnvironment::Development,
            },
            database: DatabaseConfig {
                url: "sqlite://academy-billing.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            gateway: GatewayConfig {
                base_url: "https://sandbox.asaas.com/api/v3".to_string(),
                api_key: String::new(),
                webhook_token: None,
                timeout_secs: 10,
                max_retries: 2,
            },
            webhook: WebhookConfig::default(),
            billing: BillingConfig::default(),
        }
    }
}
