//! # Credential Verifier
//!
//! Decode, look up, compare. One store read per verification (none when the
//! header cannot be decoded), bounded by the store timeout and by the
//! request's own deadline when the host supplies one.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::basic::{BasicCredentials, FormatError};
use super::rejection::AuthRejection;
use crate::core::config::{CredentialFields, StoreConfig};
use crate::core::types::{RequestDeadline, SessionDescriptor, SessionPolicy};
use crate::store::{decode_record, CredentialStore, StoreError, StoreItem, StoreResult};

/// Verifies Basic credentials against a credential store
#[derive(Clone)]
pub struct CredentialVerifier {
    store: Arc<dyn CredentialStore>,
    fields: CredentialFields,
    policy: SessionPolicy,
    store_timeout: Duration,
}

impl CredentialVerifier {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        fields: CredentialFields,
        policy: SessionPolicy,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            fields,
            policy,
            store_timeout,
        }
    }

    /// Verifier using the store settings from configuration
    pub fn from_config(store: Arc<dyn CredentialStore>, config: &StoreConfig, policy: SessionPolicy) -> Self {
        Self::new(store, config.fields.clone(), policy, config.timeout)
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Verify an `Authorization` header value.
    ///
    /// Returns the session to attach on success.
    pub async fn verify(
        &self,
        header_value: Option<&str>,
        deadline: Option<RequestDeadline>,
    ) -> Result<SessionDescriptor, AuthRejection> {
        let credentials = decode_header(header_value)?;
        self.verify_credentials(&credentials, deadline).await
    }

    /// Verify already decoded credentials.
    ///
    /// The supplied secret is compared verbatim with the stored hash.
    #[instrument(
        name = "verify_credentials",
        skip_all,
        fields(username = %credentials.username, store = self.store.name())
    )]
    pub async fn verify_credentials(
        &self,
        credentials: &BasicCredentials,
        deadline: Option<RequestDeadline>,
    ) -> Result<SessionDescriptor, AuthRejection> {
        let item = self
            .lookup(&credentials.username, self.lookup_budget(deadline))
            .await?
            .ok_or(AuthRejection::UserNotFound)?;

        let record = decode_record(&item, &self.fields).map_err(|e| {
            warn!("Stored credential item is malformed: {}", e);
            AuthRejection::MalformedRecord
        })?;

        if !record.matches(&credentials.secret) {
            return Err(AuthRejection::WrongPassword);
        }

        Ok(self.policy.issue())
    }

    fn lookup_budget(&self, deadline: Option<RequestDeadline>) -> Duration {
        match deadline {
            Some(deadline) => deadline.remaining().min(self.store_timeout),
            None => self.store_timeout,
        }
    }

    async fn lookup(&self, username: &str, budget: Duration) -> Result<Option<StoreItem>, AuthRejection> {
        self.fetch(username, budget).await.map_err(|e| {
            warn!(budget_ms = budget.as_millis() as u64, "Credential lookup failed: {}", e);
            AuthRejection::StoreUnavailable
        })
    }

    /// Single store read, cut off once `budget` runs out
    async fn fetch(&self, username: &str, budget: Duration) -> StoreResult<Option<StoreItem>> {
        if budget.is_zero() {
            return Err(StoreError::Timeout);
        }

        tokio::time::timeout(budget, self.store.get_item(username))
            .await
            .unwrap_or(Err(StoreError::Timeout))
    }
}

/// Decode an optional `Authorization` header value into credentials
pub fn decode_header(header_value: Option<&str>) -> Result<BasicCredentials, AuthRejection> {
    let header_value = header_value.ok_or(FormatError::MissingHeader)?;
    BasicCredentials::decode(header_value).map_err(|e| {
        debug!("Rejecting malformed authorization header: {}", e);
        AuthRejection::from(e)
    })
}
