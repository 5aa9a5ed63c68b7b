// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Responses returned by a [`SecretsClient`](crate::SecretsClient).

use std::collections::BTreeMap;

/// Metadata describing a secret and its versions.
///
/// The part the cache cares about is the mapping from version ids to the
/// stage labels currently attached to each version.
///
/// # Examples
///
/// ```
/// use secret_cache_client::SecretMetadata;
///
/// let metadata = SecretMetadata::new()
///     .with_version("v1", ["AWSPREVIOUS"])
///     .with_version("v2", ["AWSCURRENT"]);
///
/// assert_eq!(metadata.version_for_stage("AWSCURRENT"), Some("v2"));
/// assert_eq!(metadata.version_for_stage("AWSPENDING"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretMetadata {
    name: Option<String>,
    version_ids_to_stages: BTreeMap<String, Vec<String>>,
}

impl SecretMetadata {
    /// Creates metadata with no name and no versions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the secret name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a version together with the stage labels attached to it.
    #[must_use]
    pub fn with_version<S>(mut self, version_id: impl Into<String>, stages: impl IntoIterator<Item = S>) -> Self
    where
        S: Into<String>,
    {
        self.version_ids_to_stages
            .insert(version_id.into(), stages.into_iter().map(Into::into).collect());
        self
    }

    /// Returns the secret name, if the service reported one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the mapping from version id to stage labels.
    #[must_use]
    pub fn version_ids_to_stages(&self) -> &BTreeMap<String, Vec<String>> {
        &self.version_ids_to_stages
    }

    /// Returns the id of the first version labelled with `stage`.
    #[must_use]
    pub fn version_for_stage(&self, stage: &str) -> Option<&str> {
        self.version_ids_to_stages
            .iter()
            .find(|(_, stages)| stages.iter().any(|s| s == stage))
            .map(|(version_id, _)| version_id.as_str())
    }
}

/// The payload of one secret version.
///
/// A version carries either a string or a binary payload. The cache never
/// interprets either.
///
/// # Examples
///
/// ```
/// use secret_cache_client::SecretValue;
///
/// let value = SecretValue::from_string("v1", "hunter2").with_name("db-password");
///
/// assert_eq!(value.secret_string(), Some("hunter2"));
/// assert_eq!(value.secret_binary(), None);
/// assert_eq!(value.version_id(), Some("v1"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretValue {
    name: Option<String>,
    version_id: Option<String>,
    secret_string: Option<String>,
    secret_binary: Option<Vec<u8>>,
    version_stages: Vec<String>,
}

impl SecretValue {
    /// Creates a version that holds a string payload.
    #[must_use]
    pub fn from_string(version_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            version_id: Some(version_id.into()),
            secret_string: Some(secret.into()),
            ..Self::default()
        }
    }

    /// Creates a version that holds a binary payload.
    #[must_use]
    pub fn from_binary(version_id: impl Into<String>, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            version_id: Some(version_id.into()),
            secret_binary: Some(secret.into()),
            ..Self::default()
        }
    }

    /// Sets the secret name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the stage labels attached to this version.
    #[must_use]
    pub fn with_stages<S>(mut self, stages: impl IntoIterator<Item = S>) -> Self
    where
        S: Into<String>,
    {
        self.version_stages = stages.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the secret name, if the service reported one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the version id.
    #[must_use]
    pub fn version_id(&self) -> Option<&str> {
        self.version_id.as_deref()
    }

    /// Returns the string payload, if this version holds one.
    #[must_use]
    pub fn secret_string(&self) -> Option<&str> {
        self.secret_string.as_deref()
    }

    /// Returns the binary payload, if this version holds one.
    #[must_use]
    pub fn secret_binary(&self) -> Option<&[u8]> {
        self.secret_binary.as_deref()
    }

    /// Returns the stage labels attached to this version.
    #[must_use]
    pub fn version_stages(&self) -> &[String] {
        &self.version_stages
    }

    /// Consumes the value and returns the string payload.
    #[must_use]
    pub fn into_secret_string(self) -> Option<String> {
        self.secret_string
    }

    /// Consumes the value and returns the binary payload.
    #[must_use]
    pub fn into_secret_binary(self) -> Option<Vec<u8>> {
        self.secret_binary
    }
}
