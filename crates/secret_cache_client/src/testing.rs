// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock secret client for testing.
//!
//! This module provides [`MockSecretsClient`], an in-memory secret store that
//! records every call and supports failure injection for exercising the
//! cache's error paths.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;
use tick::Clock;

use crate::{Error, SecretMetadata, SecretValue, SecretsClient};

/// The stage label the mock moves when a current version is set.
const CURRENT_STAGE: &str = "AWSCURRENT";

/// Recorded client call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientOp {
    /// `describe_secret` was called for the given secret.
    DescribeSecret(String),
    /// `get_secret_value` was called for the given secret and version.
    GetSecretValue {
        /// The secret that was requested.
        secret_id: String,
        /// The version that was requested.
        version_id: String,
    },
}

impl ClientOp {
    /// Returns the secret id the call was made for.
    #[must_use]
    pub fn secret_id(&self) -> &str {
        match self {
            Self::DescribeSecret(secret_id) | Self::GetSecretValue { secret_id, .. } => secret_id,
        }
    }
}

type FailFn = Box<dyn Fn(&ClientOp) -> Option<Error> + Send + Sync>;

#[derive(Debug, Default)]
struct MockSecret {
    name: Option<String>,
    stages: BTreeMap<String, Vec<String>>,
    values: HashMap<String, SecretValue>,
}

impl MockSecret {
    fn metadata(&self) -> SecretMetadata {
        let metadata = self
            .stages
            .iter()
            .fold(SecretMetadata::new(), |metadata, (version_id, stages)| {
                metadata.with_version(version_id.as_str(), stages.iter().map(String::as_str))
            });

        match &self.name {
            Some(name) => metadata.with_name(name.as_str()),
            None => metadata,
        }
    }

    fn insert(&mut self, value: SecretValue, stages: Vec<String>) {
        let version_id = value.version_id().unwrap_or_default().to_string();

        // A stage labels one version at a time.
        for labels in self.stages.values_mut() {
            labels.retain(|label| !stages.contains(label));
        }

        self.stages.insert(version_id.clone(), stages);
        self.values.insert(version_id, value);
    }
}

/// A scriptable in-memory secret client for tests.
///
/// Secrets are stored per id. Every version has a payload and a list of stage
/// labels; setting a stage on one version removes it from the others, like the
/// real service does. All calls are recorded for later verification.
///
/// Failures are injected either one at a time with [`Self::fail_next`] or for
/// every matching call with [`Self::fail_when`] and [`Self::fail_with`]. A
/// latency set through [`Self::with_latency`] keeps calls in flight on a
/// controllable clock, which makes concurrent callers observable.
#[derive(Clone, Default)]
pub struct MockSecretsClient {
    secrets: Arc<Mutex<HashMap<String, MockSecret>>>,
    operations: Arc<Mutex<Vec<ClientOp>>>,
    queued_failures: Arc<Mutex<VecDeque<Error>>>,
    fail_with: Arc<Mutex<Option<FailFn>>>,
    latency: Arc<Mutex<Option<(Clock, Duration)>>>,
}

impl std::fmt::Debug for MockSecretsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSecretsClient")
            .field("secrets", &self.secrets)
            .field("operations", &self.operations)
            .field("queued_failures", &self.queued_failures.lock().len())
            .field("fail_with", &self.fail_with.lock().is_some())
            .field("latency", &self.latency.lock().as_ref().map(|(_, latency)| *latency))
            .finish()
    }
}

impl MockSecretsClient {
    /// Creates a client that knows no secrets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call wait for `latency` on `clock` before answering.
    #[must_use]
    pub fn with_latency(self, clock: Clock, latency: Duration) -> Self {
        *self.latency.lock() = Some((clock, latency));
        self
    }

    /// Stores a string payload under `version_id` and makes it the current version.
    pub fn set_current_string(&self, secret_id: impl Into<String>, version_id: impl Into<String>, secret: impl Into<String>) {
        self.insert_version(secret_id, SecretValue::from_string(version_id, secret), [CURRENT_STAGE]);
    }

    /// Stores a binary payload under `version_id` and makes it the current version.
    pub fn set_current_binary(&self, secret_id: impl Into<String>, version_id: impl Into<String>, secret: impl Into<Vec<u8>>) {
        self.insert_version(secret_id, SecretValue::from_binary(version_id, secret), [CURRENT_STAGE]);
    }

    /// Stores a version payload and attaches `stages` to it.
    ///
    /// Any of the stages attached to other versions of the same secret are moved
    /// to this version.
    pub fn insert_version<S>(&self, secret_id: impl Into<String>, value: SecretValue, stages: impl IntoIterator<Item = S>)
    where
        S: Into<String>,
    {
        let stages = stages.into_iter().map(Into::into).collect::<Vec<_>>();
        let value = value.with_stages(stages.iter().cloned());

        self.secrets.lock().entry(secret_id.into()).or_default().insert(value, stages);
    }

    /// Sets the name reported for a secret.
    pub fn set_name(&self, secret_id: impl Into<String>, name: impl Into<String>) {
        self.secrets.lock().entry(secret_id.into()).or_default().name = Some(name.into());
    }

    /// Removes a secret and all its versions.
    pub fn remove_secret(&self, secret_id: &str) {
        self.secrets.lock().remove(secret_id);
    }

    /// Queues an error returned by the next call, whatever it is.
    ///
    /// Queued errors are consumed in order before the predicate set by
    /// [`Self::fail_with`] is consulted.
    pub fn fail_next(&self, error: Error) {
        self.queued_failures.lock().push_back(error);
    }

    /// Fails every call for which `predicate` returns `true` with a service error.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&ClientOp) -> bool + Send + Sync + 'static,
    {
        self.fail_with(move |op| predicate(op).then(|| Error::service("mock: call failed")));
    }

    /// Fails every call for which `f` returns an error.
    pub fn fail_with<F>(&self, f: F)
    where
        F: Fn(&ClientOp) -> Option<Error> + Send + Sync + 'static,
    {
        *self.fail_with.lock() = Some(Box::new(f));
    }

    /// Removes queued failures and the failure predicate.
    pub fn clear_failures(&self) {
        self.queued_failures.lock().clear();
        *self.fail_with.lock() = None;
    }

    /// Returns a clone of all recorded calls.
    #[must_use]
    pub fn operations(&self) -> Vec<ClientOp> {
        self.operations.lock().clone()
    }

    /// Clears all recorded calls.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    /// Returns the total number of calls made.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.operations.lock().len()
    }

    /// Returns the number of `describe_secret` calls made for `secret_id`.
    #[must_use]
    pub fn describe_count(&self, secret_id: &str) -> usize {
        self.count(|op| matches!(op, ClientOp::DescribeSecret(id) if id == secret_id))
    }

    /// Returns the number of `get_secret_value` calls made for `secret_id`.
    #[must_use]
    pub fn get_value_count(&self, secret_id: &str) -> usize {
        self.count(|op| matches!(op, ClientOp::GetSecretValue { secret_id: id, .. } if id == secret_id))
    }

    fn count(&self, predicate: impl Fn(&ClientOp) -> bool) -> usize {
        self.operations.lock().iter().filter(|op| predicate(op)).count()
    }

    async fn begin(&self, op: ClientOp) -> Result<(), Error> {
        self.operations.lock().push(op.clone());

        let latency = self.latency.lock().clone();
        if let Some((clock, latency)) = latency {
            clock.delay(latency).await;
        }

        if let Some(error) = self.queued_failures.lock().pop_front() {
            return Err(error);
        }

        match self.fail_with.lock().as_ref().and_then(|f| f(&op)) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl SecretsClient for MockSecretsClient {
    async fn describe_secret(&self, secret_id: &str) -> Result<SecretMetadata, Error> {
        self.begin(ClientOp::DescribeSecret(secret_id.to_string())).await?;

        self.secrets
            .lock()
            .get(secret_id)
            .map(MockSecret::metadata)
            .ok_or_else(|| Error::service(format!("mock: secret {secret_id} not found")))
    }

    async fn get_secret_value(&self, secret_id: &str, version_id: &str) -> Result<SecretValue, Error> {
        self.begin(ClientOp::GetSecretValue {
            secret_id: secret_id.to_string(),
            version_id: version_id.to_string(),
        })
        .await?;

        self.secrets
            .lock()
            .get(secret_id)
            .and_then(|secret| secret.values.get(version_id))
            .cloned()
            .ok_or_else(|| Error::service(format!("mock: version {version_id} of {secret_id} not found")))
    }
}
