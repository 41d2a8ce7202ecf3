//! # In-Memory Credential Store
//!
//! Concurrent map of credential items, seeded from configuration. Used for
//! local development and as the store behind most tests.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::{CredentialStore, StoreItem, StoreResult};
use crate::core::config::CredentialFields;
use crate::core::types::CredentialRecord;

/// In-memory credential store
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    /// Items keyed by username
    items: Arc<DashMap<String, StoreItem>>,

    /// Attribute names used when inserting records
    fields: CredentialFields,

    /// Number of lookups served
    reads: AtomicU64,
}

impl InMemoryCredentialStore {
    pub fn new(fields: CredentialFields) -> Self {
        Self {
            items: Arc::new(DashMap::new()),
            fields,
            reads: AtomicU64::new(0),
        }
    }

    /// Create a store pre-populated with `records`
    pub fn from_records<I>(records: I, fields: CredentialFields) -> Self
    where
        I: IntoIterator<Item = CredentialRecord>,
    {
        let store = Self::new(fields);
        for record in records {
            store.insert_record(&record);
        }
        store
    }

    /// Insert or replace a credential record
    pub fn insert_record(&self, record: &CredentialRecord) {
        let item = StoreItem::from_record(record, &self.fields);
        self.items.insert(record.username.clone(), item);
    }

    /// Insert a raw item under `key`, bypassing record encoding
    pub fn insert_item(&self, key: impl Into<String>, item: StoreItem) {
        self.items.insert(key.into(), item);
    }

    /// Remove the item stored under `key`
    pub fn remove(&self, key: &str) -> bool {
        self.items.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of `get_item` calls served so far
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get_item(&self, key: &str) -> StoreResult<Option<StoreItem>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let item = self.items.get(key).map(|entry| entry.value().clone());
        debug!(found = item.is_some(), "In-memory credential lookup");
        Ok(item)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
