// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types shared by secret clients and the cache.

use std::fmt;

/// Classifies an [`Error`].
///
/// The cache treats [`ErrorKind::Service`] and [`ErrorKind::Client`] as transient:
/// such failures are remembered, served to readers, and retried after a backoff.
/// Everything else is [`ErrorKind::Other`] and is handed straight back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The remote service rejected or failed the request.
    Service,
    /// The request failed on the client side before a response was received.
    Client,
    /// Any failure that is not a remote call failure.
    Other,
}

impl ErrorKind {
    /// Returns a short, stable name for the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Client => "client",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error from a secret client, a cache hook or the cache itself.
///
/// Errors are cheap to clone so a cached failure can be handed to every reader
/// of the same secret.
///
/// # Examples
///
/// ```
/// use secret_cache_client::{Error, ErrorKind};
///
/// let error = Error::service("throttled");
/// assert_eq!(error.kind(), ErrorKind::Service);
/// assert!(error.is_transient());
/// ```
#[ohno::error]
#[derive(Clone)]
#[display("secret {kind} error")]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    /// Creates an error reported by the remote service.
    pub fn service(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Service, cause)
    }

    /// Creates an error raised by the client before the service answered.
    pub fn client(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Client, cause)
    }

    /// Creates an error that is not a remote call failure.
    pub fn other(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Other, cause)
    }

    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns `true` for remote call failures that the cache retries with backoff.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, ErrorKind::Service | ErrorKind::Client)
    }
}

/// A specialized [`Result`] type for secret operations.
pub type Result<T> = std::result::Result<T, Error>;
