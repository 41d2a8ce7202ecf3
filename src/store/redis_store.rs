//! # Redis Credential Store
//!
//! Each credential is a Redis hash at `<key_prefix><username>` whose fields are
//! the item attributes. A missing key reads back as an empty hash, which is
//! reported as "no record".

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use std::collections::HashMap;
use tracing::{debug, error, info, instrument};
use url::Url;

use super::{AttributeValue, CredentialStore, StoreError, StoreItem, StoreResult};
use crate::core::config::RedisStoreConfig;

/// Redis-backed credential store
#[derive(Clone)]
pub struct RedisCredentialStore {
    config: RedisStoreConfig,

    /// Multiplexed connection, reconnects on its own
    connection_manager: ConnectionManager,
}

impl RedisCredentialStore {
    /// Connect to Redis
    pub async fn connect(config: &RedisStoreConfig) -> StoreResult<Self> {
        let client = Client::open(config.url.as_str()).map_err(|e| StoreError::Configuration {
            message: format!("Invalid Redis URL: {}", e),
        })?;

        let connection_manager = ConnectionManager::new(client).await?;

        info!("Redis credential store connected to {}", redacted_url(&config.url));

        Ok(Self {
            config: config.clone(),
            connection_manager,
        })
    }

    /// Get the full hash key for a username
    fn full_key(&self, key: &str) -> String {
        full_key(&self.config.key_prefix, key)
    }
}

fn full_key(prefix: &str, key: &str) -> String {
    format!("{}{}", prefix, key)
}

/// Query parameters redis-rs reads a password from
const PASSWORD_PARAMS: [&str; 2] = ["pass", "password"];

/// Strip any password from a Redis URL before logging it
fn redacted_url(raw: &str) -> String {
    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(_) => return "<unparseable url>".to_string(),
    };

    if url.password().is_some() && url.set_password(None).is_err() {
        return "<unparseable url>".to_string();
    }

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(name, _)| !PASSWORD_PARAMS.contains(&name.to_ascii_lowercase().as_str()))
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    url.to_string()
}

fn hash_to_item(fields: HashMap<String, String>) -> Option<StoreItem> {
    if fields.is_empty() {
        return None;
    }
    Some(
        fields
            .into_iter()
            .map(|(name, value)| (name, AttributeValue::S(value)))
            .collect(),
    )
}

#[async_trait]
impl CredentialStore for RedisCredentialStore {
    #[instrument(skip(self))]
    async fn get_item(&self, key: &str) -> StoreResult<Option<StoreItem>> {
        let full_key = self.full_key(key);
        let mut conn = self.connection_manager.clone();

        let fields: HashMap<String, String> = conn.hgetall(&full_key).await.map_err(|e| {
            error!("Redis HGETALL failed: {}", e);
            StoreError::Redis(e)
        })?;

        debug!(found = !fields.is_empty(), "Redis credential lookup");
        Ok(hash_to_item(fields))
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
