//! # Configuration Module
//!
//! Startup configuration for the authentication gate.
//!
//! ## Key Features
//! - YAML configuration parsing with serde
//! - Environment variable overrides (`AUTH_GATE_<SECTION>_<FIELD>`)
//! - Validation that reports every problem at once
//!
//! Store endpoints and credentials always come from here; nothing about the
//! store is compiled into the binary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::core::error::{GateError, GateResult};
use crate::core::types::{CredentialRecord, SessionPolicy};

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "AUTH_GATE_CONFIG";

/// Configuration file used when [`CONFIG_PATH_ENV`] is unset
pub const DEFAULT_CONFIG_PATH: &str = "config/auth-gate.yaml";

/// Main gate configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Forward-auth HTTP service settings
    pub server: ServerConfig,

    /// Basic authentication settings
    pub auth: BasicAuthConfig,

    /// Credential store settings
    pub store: StoreConfig,

    /// Policy stamped onto issued sessions
    pub session: SessionPolicy,

    /// Logging settings
    pub observability: ObservabilityConfig,
}

impl GateConfig {
    /// Load configuration from a YAML file, then apply environment overrides and validate
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> GateResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;

        let mut config = Self::from_yaml_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from YAML text without overrides or validation
    pub fn from_yaml_str(content: &str) -> GateResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> GateResult<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source
    ///
    /// Variables follow the pattern `AUTH_GATE_<SECTION>_<FIELD>`, for example
    /// `AUTH_GATE_SERVER_PORT=8081` or `AUTH_GATE_STORE_REGION=us-east-2`.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> GateResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("AUTH_GATE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }

        if let Some(port) = lookup("AUTH_GATE_SERVER_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| GateError::config(format!("Invalid AUTH_GATE_SERVER_PORT: {}", e)))?;
        }

        if let Some(realm) = lookup("AUTH_GATE_AUTH_REALM") {
            self.auth.realm = realm;
        }

        if let Some(level) = lookup("AUTH_GATE_LOG_LEVEL") {
            self.observability.logging.level = level;
        }

        if let Some(format) = lookup("AUTH_GATE_LOG_FORMAT") {
            self.observability.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" | "pretty" => LogFormat::Text,
                other => {
                    return Err(GateError::config(format!(
                        "Invalid AUTH_GATE_LOG_FORMAT: {}",
                        other
                    )))
                }
            };
        }

        if let Some(timeout) = lookup("AUTH_GATE_STORE_TIMEOUT") {
            self.store.timeout = humantime::parse_duration(&timeout)
                .map_err(|e| GateError::config(format!("Invalid AUTH_GATE_STORE_TIMEOUT: {}", e)))?;
        }

        if let StoreBackendConfig::DynamoDb(ref mut dynamo) = self.store.backend {
            if let Some(table) = lookup("AUTH_GATE_STORE_TABLE") {
                dynamo.table = table;
            }
            if let Some(region) = lookup("AUTH_GATE_STORE_REGION") {
                dynamo.region = region;
            }
            if let Some(endpoint) = lookup("AUTH_GATE_STORE_ENDPOINT_URL") {
                dynamo.endpoint_url = Some(endpoint);
            }
            if let Some(access_key) = lookup("AUTH_GATE_STORE_ACCESS_KEY_ID") {
                dynamo.access_key_id = Some(access_key);
            }
            if let Some(secret_key) = lookup("AUTH_GATE_STORE_SECRET_ACCESS_KEY") {
                dynamo.secret_access_key = Some(secret_key);
            }
        }

        if let StoreBackendConfig::Redis(ref mut redis) = self.store.backend {
            if let Some(url) = lookup("AUTH_GATE_STORE_REDIS_URL") {
                redis.url = url;
            }
        }

        Ok(())
    }

    /// Configuration validation with detailed error messages
    pub fn validate(&self) -> GateResult<()> {
        let mut errors = Vec::new();

        if self.server.bind_address.is_empty() {
            errors.push("server.bind_address cannot be empty".to_string());
        }

        if self.auth.realm.is_empty() {
            errors.push("auth.realm cannot be empty".to_string());
        }

        if self.auth.realm.contains('"') {
            errors.push("auth.realm cannot contain double quotes".to_string());
        }

        if self.store.timeout.is_zero() {
            errors.push("store.timeout must be greater than 0".to_string());
        }

        if self.store.fields.username.is_empty() {
            errors.push("store.fields.username cannot be empty".to_string());
        }

        if self.store.fields.hash.is_empty() {
            errors.push("store.fields.hash cannot be empty".to_string());
        }

        match &self.store.backend {
            StoreBackendConfig::DynamoDb(dynamo) => {
                if dynamo.table.is_empty() {
                    errors.push("store.backend.table cannot be empty".to_string());
                }
                if dynamo.region.is_empty() {
                    errors.push("store.backend.region cannot be empty".to_string());
                }
                if dynamo.access_key_id.is_some() != dynamo.secret_access_key.is_some() {
                    errors.push(
                        "store.backend.access_key_id and secret_access_key must be set together"
                            .to_string(),
                    );
                }
            }
            StoreBackendConfig::Redis(redis) => {
                if redis.url.is_empty() {
                    errors.push("store.backend.url cannot be empty".to_string());
                }
            }
            StoreBackendConfig::Memory(memory) => {
                for (index, user) in memory.users.iter().enumerate() {
                    if user.username.is_empty() {
                        errors.push(format!("store.backend.users[{}] has empty username", index));
                    }
                }
            }
        }

        if self.session.organization_id.is_empty() {
            errors.push("session.organization_id cannot be empty".to_string());
        }

        if self.session.rate_period_seconds == 0 {
            errors.push("session.rate_period_seconds must be greater than 0".to_string());
        }

        match self.observability.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => errors.push(format!(
                "Invalid log level: {}",
                self.observability.logging.level
            )),
        }

        if !errors.is_empty() {
            return Err(GateError::config(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            )));
        }

        Ok(())
    }
}

/// Forward-auth service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: String,

    /// Listening port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding a listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Basic authentication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicAuthConfig {
    /// Realm advertised in `WWW-Authenticate` challenges
    pub realm: String,
}

impl Default for BasicAuthConfig {
    fn default() -> Self {
        Self {
            realm: "api-gateway".to_string(),
        }
    }
}

/// Credential store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Upper bound on a single lookup
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Attribute names of the credential item
    pub fields: CredentialFields,

    /// Backend selection and its settings
    pub backend: StoreBackendConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            fields: CredentialFields::default(),
            backend: StoreBackendConfig::default(),
        }
    }
}

/// Attribute names of the stored credential item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialFields {
    /// Primary key attribute
    pub username: String,

    /// Secret hash attribute
    pub hash: String,
}

impl Default for CredentialFields {
    fn default() -> Self {
        Self {
            username: "username".to_string(),
            hash: "hash".to_string(),
        }
    }
}

/// Credential store backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreBackendConfig {
    #[serde(rename = "dynamodb")]
    DynamoDb(DynamoDbStoreConfig),
    Redis(RedisStoreConfig),
    Memory(MemoryStoreConfig),
}

impl Default for StoreBackendConfig {
    fn default() -> Self {
        Self::DynamoDb(DynamoDbStoreConfig::default())
    }
}

/// DynamoDB backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamoDbStoreConfig {
    /// Credential table name
    pub table: String,

    /// AWS region
    pub region: String,

    /// Custom endpoint (DynamoDB Local, LocalStack)
    pub endpoint_url: Option<String>,

    /// Static access key; the default AWS provider chain is used when unset
    pub access_key_id: Option<String>,

    /// Static secret key, required together with `access_key_id`
    pub secret_access_key: Option<String>,
}

impl Default for DynamoDbStoreConfig {
    fn default() -> Self {
        Self {
            table: "users".to_string(),
            region: "us-east-2".to_string(),
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

/// Redis backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisStoreConfig {
    /// Redis connection URL
    pub url: String,

    /// Prefix prepended to the username to form the hash key
    pub key_prefix: String,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: "users:".to_string(),
        }
    }
}

/// In-memory backend settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStoreConfig {
    /// Records loaded at startup
    pub users: Vec<CredentialRecord>,
}

/// Observability configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub logging: LogConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: String,

    /// Output format
    pub format: LogFormat,

    /// Extra per-target directives, e.g. `tower_http: debug`
    pub targets: HashMap<String, String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            targets: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}
