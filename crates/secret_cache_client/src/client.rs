// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The remote secret service contract consumed by the cache.

use std::sync::Arc;

use crate::{Error, SecretMetadata, SecretValue};

/// Operations the cache needs from a remote secret-management service.
///
/// Implementations wrap a concrete service SDK. Failures should be classified
/// with [`Error::service`] or [`Error::client`] so the cache can back off and
/// retry them; anything reported through [`Error::other`] is passed straight
/// back to the caller.
///
/// # Examples
///
/// ```
/// use secret_cache_client::{Error, SecretMetadata, SecretValue, SecretsClient};
///
/// struct Fixed;
///
/// impl SecretsClient for Fixed {
///     async fn describe_secret(&self, _secret_id: &str) -> Result<SecretMetadata, Error> {
///         Ok(SecretMetadata::new().with_version("v1", ["AWSCURRENT"]))
///     }
///
///     async fn get_secret_value(&self, _secret_id: &str, version_id: &str) -> Result<SecretValue, Error> {
///         Ok(SecretValue::from_string(version_id, "value"))
///     }
/// }
/// ```
pub trait SecretsClient: Send + Sync {
    /// Describes the secret, including which version carries which stage.
    fn describe_secret(&self, secret_id: &str) -> impl Future<Output = Result<SecretMetadata, Error>> + Send;

    /// Retrieves the payload of one version of the secret.
    fn get_secret_value(&self, secret_id: &str, version_id: &str) -> impl Future<Output = Result<SecretValue, Error>> + Send;
}

impl<C> SecretsClient for Arc<C>
where
    C: SecretsClient,
{
    fn describe_secret(&self, secret_id: &str) -> impl Future<Output = Result<SecretMetadata, Error>> + Send {
        self.as_ref().describe_secret(secret_id)
    }

    fn get_secret_value(&self, secret_id: &str, version_id: &str) -> impl Future<Output = Result<SecretValue, Error>> + Send {
        self.as_ref().get_secret_value(secret_id, version_id)
    }
}
