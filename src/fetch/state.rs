//! Published fetcher state snapshots.

use chrono::{DateTime, Utc};

use crate::error::FetchError;

/// The phase of a fetcher's retrieval lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
  /// Never started (a primed cache value may still be present).
  Idle,
  /// A remote request is in flight.
  Loading,
  /// The last request completed successfully.
  Loaded,
  /// The last request failed; the previous payload is retained.
  Failed,
}

impl FetchPhase {
  /// Loaded or Failed; a composite is done once every child is terminal.
  pub fn is_terminal(&self) -> bool {
    matches!(self, FetchPhase::Loaded | FetchPhase::Failed)
  }
}

/// One complete, observable snapshot of a fetcher.
///
/// Snapshots are published whole through a watch channel, so observers never
/// see a torn update: the phase, payload, and error always belong together.
#[derive(Debug, Clone)]
pub struct FetchState<T> {
  pub phase: FetchPhase,
  /// The cached payload. Survives failed reloads; `None` either means never
  /// loaded or loaded-and-absent (check `last_updated` to tell them apart).
  pub value: Option<T>,
  pub error: Option<FetchError>,
  /// Wall-clock time of the last successful load (or the persisted copy's
  /// age when primed from the durable store).
  pub last_updated: Option<DateTime<Utc>>,
}

impl<T> FetchState<T> {
  pub fn idle() -> Self {
    Self {
      phase: FetchPhase::Idle,
      value: None,
      error: None,
      last_updated: None,
    }
  }

  /// Idle state pre-populated from a persisted copy.
  pub fn primed(value: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      phase: FetchPhase::Idle,
      value: Some(value),
      error: None,
      last_updated: Some(cached_at),
    }
  }

  pub fn is_loading(&self) -> bool {
    self.phase == FetchPhase::Loading
  }

  pub fn is_loaded(&self) -> bool {
    self.phase == FetchPhase::Loaded
  }

  pub fn is_failed(&self) -> bool {
    self.phase == FetchPhase::Failed
  }

  pub fn value(&self) -> Option<&T> {
    self.value.as_ref()
  }

  pub fn error(&self) -> Option<&FetchError> {
    self.error.as_ref()
  }
}

impl<T> Default for FetchState<T> {
  fn default() -> Self {
    Self::idle()
  }
}
