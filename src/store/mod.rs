//! # Credential Stores
//!
//! Key-value backends holding credential records. A store is constructed once
//! at startup and shared by every concurrent authentication through an
//! `Arc<dyn CredentialStore>`; implementations must be safe for concurrent use.
//!
//! Backends return items in a neutral attribute map ([`StoreItem`]). Mapping an
//! item onto a [`CredentialRecord`] is a separate step so that a malformed item
//! is distinguishable from a missing one.

pub mod dynamodb;
pub mod memory;
pub mod redis_store;

pub use dynamodb::DynamoDbCredentialStore;
pub use memory::InMemoryCredentialStore;
pub use redis_store::RedisCredentialStore;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::core::config::{CredentialFields, StoreBackendConfig, StoreConfig};
use crate::core::error::GateError;
use crate::core::types::CredentialRecord;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store-specific error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store backend error: {message}")]
    Backend { message: String },

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Store operation timed out")]
    Timeout,

    #[error("Store configuration error: {message}")]
    Configuration { message: String },
}

impl StoreError {
    pub fn backend<S: Into<String>>(message: S) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

impl From<StoreError> for GateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Configuration { message } => GateError::config(message),
            other => GateError::store(other.to_string()),
        }
    }
}

/// Typed attribute value of a stored item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// String
    S(String),
    /// Number, kept in its textual form
    N(String),
    Bool(bool),
    Null,
    /// Any type the gate does not interpret, tagged by its name
    Unsupported(String),
}

impl AttributeValue {
    /// Short type name, used in decode errors
    pub fn type_name(&self) -> &str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::Bool(_) => "BOOL",
            Self::Null => "NULL",
            Self::Unsupported(name) => name,
        }
    }
}

/// A stored item in the store's native shape: attribute name to value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreItem {
    attributes: HashMap<String, AttributeValue>,
}

impl StoreItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a string attribute, builder style
    pub fn with_string(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .insert(name.into(), AttributeValue::S(value.into()));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.attributes.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Item representation of a credential record
    pub fn from_record(record: &CredentialRecord, fields: &CredentialFields) -> Self {
        Self::new()
            .with_string(fields.username.as_str(), record.username.as_str())
            .with_string(fields.hash.as_str(), record.hash.as_str())
    }
}

impl FromIterator<(String, AttributeValue)> for StoreItem {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}

/// Why an item could not be mapped onto a credential record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing attribute '{0}'")]
    MissingAttribute(String),

    #[error("attribute '{name}' has type {found}, expected S")]
    WrongType { name: String, found: String },
}

/// Map a stored item onto a [`CredentialRecord`]
pub fn decode_record(item: &StoreItem, fields: &CredentialFields) -> Result<CredentialRecord, DecodeError> {
    Ok(CredentialRecord {
        username: string_attribute(item, &fields.username)?,
        hash: string_attribute(item, &fields.hash)?,
    })
}

fn string_attribute(item: &StoreItem, name: &str) -> Result<String, DecodeError> {
    match item.get(name) {
        Some(AttributeValue::S(value)) => Ok(value.clone()),
        Some(other) => Err(DecodeError::WrongType {
            name: name.to_string(),
            found: other.type_name().to_string(),
        }),
        None => Err(DecodeError::MissingAttribute(name.to_string())),
    }
}

/// Key-value store holding credential records
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the item whose primary key equals `key`
    async fn get_item(&self, key: &str) -> StoreResult<Option<StoreItem>>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// Build the store selected by configuration
pub async fn connect(config: &StoreConfig) -> StoreResult<Arc<dyn CredentialStore>> {
    let store: Arc<dyn CredentialStore> = match &config.backend {
        StoreBackendConfig::DynamoDb(dynamo) => {
            Arc::new(DynamoDbCredentialStore::connect(dynamo, &config.fields).await?)
        }
        StoreBackendConfig::Redis(redis) => Arc::new(RedisCredentialStore::connect(redis).await?),
        StoreBackendConfig::Memory(memory) => Arc::new(InMemoryCredentialStore::from_records(
            memory.users.iter().cloned(),
            config.fields.clone(),
        )),
    };

    info!(backend = store.name(), "Credential store ready");
    Ok(store)
}
