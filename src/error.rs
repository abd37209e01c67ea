//! Error taxonomy shared by the transport, the store, and the fetch layer.

use thiserror::Error;

/// Failure modes surfaced through a fetcher's published state.
///
/// `NotFound` is distinct from failure: a missing singleton resource is
/// reported as a loaded-but-empty value, not an error. `Unauthorized` is
/// expected to trigger a sign-out flow upstream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
  /// Transport unreachable, timed out, or returned an unusable response.
  #[error("network failure: {0}")]
  Network(String),

  /// The remote resource does not exist.
  #[error("resource not found")]
  NotFound,

  /// Credential missing or rejected by the remote service.
  #[error("credential missing or rejected")]
  Unauthorized,

  /// A rename/overwrite race on a named resource (paste, short link).
  #[error("conflicting write on {0}")]
  Conflict(String),

  /// The local durable store failed to read or write.
  #[error("local store failure: {0}")]
  Storage(String),
}

impl From<crate::store::StoreError> for FetchError {
  fn from(err: crate::store::StoreError) -> Self {
    FetchError::Storage(err.to_string())
  }
}

impl From<reqwest::Error> for FetchError {
  fn from(err: reqwest::Error) -> Self {
    FetchError::Network(err.to_string())
  }
}
