//! # DynamoDB Credential Store
//!
//! Looks credentials up with a single `GetItem` on the configured table. The
//! client is built once from configuration: region, optional custom endpoint
//! (DynamoDB Local) and optional static keys. Without static keys the default
//! AWS provider chain applies.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::{Credentials, Region};
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue as DynamoValue;
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

use super::{AttributeValue, CredentialStore, StoreError, StoreItem, StoreResult};
use crate::core::config::{CredentialFields, DynamoDbStoreConfig};

/// DynamoDB-backed credential store
#[derive(Debug, Clone)]
pub struct DynamoDbCredentialStore {
    client: Client,
    table: String,
    key_attribute: String,
}

impl DynamoDbCredentialStore {
    /// Build a client from configuration
    pub async fn connect(config: &DynamoDbStoreConfig, fields: &CredentialFields) -> StoreResult<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        match (&config.access_key_id, &config.secret_access_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials = Credentials::new(
                    access_key.as_str(),
                    secret_key.as_str(),
                    None,
                    None,
                    "auth-gate-static",
                );
                loader = loader.credentials_provider(credentials);
            }
            (None, None) => {
                debug!("No static DynamoDB credentials configured, using default provider chain");
            }
            _ => {
                return Err(StoreError::Configuration {
                    message: "access_key_id and secret_access_key must be set together".to_string(),
                })
            }
        }

        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint.as_str());
        }

        let sdk_config = loader.load().await;
        debug!(
            table = %config.table,
            region = %config.region,
            endpoint = config.endpoint_url.as_deref().unwrap_or("default"),
            "DynamoDB client configured"
        );

        Ok(Self::from_client(
            Client::new(&sdk_config),
            config.table.clone(),
            fields.username.clone(),
        ))
    }

    /// Wrap an already-built client
    pub fn from_client(client: Client, table: impl Into<String>, key_attribute: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
            key_attribute: key_attribute.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl CredentialStore for DynamoDbCredentialStore {
    #[instrument(skip(self), fields(table = %self.table))]
    async fn get_item(&self, key: &str) -> StoreResult<Option<StoreItem>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(&self.key_attribute, DynamoValue::S(key.to_string()))
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                warn!(error = %message, "DynamoDB GetItem failed");
                StoreError::backend(message)
            })?;

        Ok(output.item().map(convert_item))
    }

    fn name(&self) -> &'static str {
        "dynamodb"
    }
}

/// Convert a DynamoDB item into the neutral item shape
pub(crate) fn convert_item(item: &HashMap<String, DynamoValue>) -> StoreItem {
    item.iter()
        .map(|(name, value)| (name.clone(), convert_value(value)))
        .collect()
}

fn convert_value(value: &DynamoValue) -> AttributeValue {
    match value {
        DynamoValue::S(s) => AttributeValue::S(s.clone()),
        DynamoValue::N(n) => AttributeValue::N(n.clone()),
        DynamoValue::Bool(b) => AttributeValue::Bool(*b),
        DynamoValue::Null(_) => AttributeValue::Null,
        DynamoValue::B(_) => AttributeValue::Unsupported("B".to_string()),
        DynamoValue::Ss(_) => AttributeValue::Unsupported("SS".to_string()),
        DynamoValue::Ns(_) => AttributeValue::Unsupported("NS".to_string()),
        DynamoValue::Bs(_) => AttributeValue::Unsupported("BS".to_string()),
        DynamoValue::L(_) => AttributeValue::Unsupported("L".to_string()),
        DynamoValue::M(_) => AttributeValue::Unsupported("M".to_string()),
        _ => AttributeValue::Unsupported("UNKNOWN".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CredentialRecord;
    use crate::store::{decode_record, DecodeError};
    use axum::http::{header, HeaderMap};
    use axum::Router;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// One request received by the local DynamoDB endpoint
    #[derive(Debug, Clone)]
    struct RecordedCall {
        target: String,
        body: serde_json::Value,
    }

    /// Local endpoint that answers `GetItem` for "alice" and records every request
    async fn spawn_local_dynamodb() -> (String, Arc<Mutex<Vec<RecordedCall>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = calls.clone();

        let app = Router::new().fallback(move |headers: HeaderMap, body: String| {
            let recorded = recorded.clone();
            async move {
                let body: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
                let target = headers
                    .get("x-amz-target")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let known = body["Key"]["username"]["S"] == "alice";
                recorded.lock().await.push(RecordedCall { target, body });

                let response = if known {
                    json!({"Item": {"username": {"S": "alice"}, "hash": {"S": "correcthash"}}})
                } else {
                    json!({})
                };
                (
                    [(header::CONTENT_TYPE, "application/x-amz-json-1.0")],
                    response.to_string(),
                )
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", address), calls)
    }

    #[test]
    fn test_convert_credential_item() {
        let mut item = HashMap::new();
        item.insert("username".to_string(), DynamoValue::S("alice".to_string()));
        item.insert("hash".to_string(), DynamoValue::S("correcthash".to_string()));
        item.insert("logins".to_string(), DynamoValue::N("3".to_string()));

        let converted = convert_item(&item);
        assert_eq!(converted.len(), 3);
        assert_eq!(converted.get("logins"), Some(&AttributeValue::N("3".to_string())));

        let record = decode_record(&converted, &CredentialFields::default()).unwrap();
        assert_eq!(record.username, "alice");
        assert_eq!(record.hash, "correcthash");
    }

    #[test]
    fn test_convert_unsupported_types() {
        let mut item = HashMap::new();
        item.insert("username".to_string(), DynamoValue::S("alice".to_string()));
        item.insert(
            "hash".to_string(),
            DynamoValue::Ss(vec!["a".to_string(), "b".to_string()]),
        );

        let converted = convert_item(&item);
        let err = decode_record(&converted, &CredentialFields::default()).unwrap_err();
        assert_eq!(
            err,
            DecodeError::WrongType {
                name: "hash".to_string(),
                found: "SS".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_connect_rejects_partial_static_credentials() {
        let config = DynamoDbStoreConfig {
            access_key_id: Some("AKID".to_string()),
            ..Default::default()
        };
        let err = DynamoDbCredentialStore::connect(&config, &CredentialFields::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_connect_with_local_endpoint() {
        let config = DynamoDbStoreConfig {
            endpoint_url: Some("http://localhost:8000".to_string()),
            access_key_id: Some("fakeAccessKey".to_string()),
            secret_access_key: Some("fakeSecretKey".to_string()),
            ..Default::default()
        };
        let store = DynamoDbCredentialStore::connect(&config, &CredentialFields::default())
            .await
            .unwrap();
        assert_eq!(store.table(), "users");
        assert_eq!(store.name(), "dynamodb");
    }

    #[tokio::test]
    async fn test_get_item_request_shape() {
        let (endpoint, calls) = spawn_local_dynamodb().await;
        let config = DynamoDbStoreConfig {
            endpoint_url: Some(endpoint),
            access_key_id: Some("fakeAccessKey".to_string()),
            secret_access_key: Some("fakeSecretKey".to_string()),
            ..Default::default()
        };
        let store = DynamoDbCredentialStore::connect(&config, &CredentialFields::default())
            .await
            .unwrap();

        let item = store.get_item("alice").await.unwrap().unwrap();
        assert_eq!(
            decode_record(&item, &CredentialFields::default()).unwrap(),
            CredentialRecord::new("alice", "correcthash")
        );
        assert!(store.get_item("bob").await.unwrap().is_none());

        let calls = calls.lock().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].target, "DynamoDB_20120810.GetItem");
        assert_eq!(calls[0].body["TableName"], "users");
        assert_eq!(calls[0].body["Key"], json!({"username": {"S": "alice"}}));
        assert_eq!(calls[1].body["Key"], json!({"username": {"S": "bob"}}));
    }
}
