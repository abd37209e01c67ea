//! The generic cache-and-refresh unit for one remote resource.
//!
//! One `Fetcher<T>` owns the retrieval lifecycle for one logical resource:
//! it de-duplicates concurrent callers, tracks staleness, discards results
//! from superseded requests via a generation counter, writes successful
//! loads through to the durable store, and publishes whole state snapshots
//! to observers.
//!
//! Per-resource behavior (what to fetch, where to persist, how long data
//! stays fresh) is injected through a [`Strategy`] rather than a subclass
//! hierarchy; the constructors in [`super::kinds`] build one strategy per
//! resource kind.

use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::state::{FetchPhase, FetchState};
use crate::error::FetchError;

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<Option<T>, FetchError>> + Send>>;
type FetchFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;
type PersistFn<T> = Box<dyn Fn(&T) -> Result<(), FetchError> + Send + Sync>;

/// Per-kind behavior injected into a [`Fetcher`].
pub struct Strategy<T> {
  fetch: FetchFn<T>,
  persist: Option<PersistFn<T>>,
  prime: Option<(T, DateTime<Utc>)>,
  stale_after: Duration,
}

impl<T> Strategy<T> {
  /// A strategy with the given staleness threshold and fetch operation.
  ///
  /// The fetch returns `Ok(None)` for a resource the remote reports absent;
  /// that is published as loaded-and-empty, not as a failure.
  pub fn new<F, Fut>(stale_after: Duration, fetch: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<T>, FetchError>> + Send + 'static,
  {
    Self {
      fetch: Box::new(move || Box::pin(fetch())),
      persist: None,
      prime: None,
      stale_after,
    }
  }

  /// Write-through persistence, applied to successful loads before the new
  /// state is published.
  pub fn persist<P>(mut self, persist: P) -> Self
  where
    P: Fn(&T) -> Result<(), FetchError> + Send + Sync + 'static,
  {
    self.persist = Some(Box::new(persist));
    self
  }

  /// Seed the initial state from a persisted copy, if one exists.
  pub fn prime(mut self, primed: Option<(T, DateTime<Utc>)>) -> Self {
    self.prime = primed;
    self
  }
}

struct Flight {
  generation: u64,
  in_flight: bool,
}

struct Inner<T> {
  name: String,
  tx: watch::Sender<FetchState<T>>,
  flight: Mutex<Flight>,
  fetch: FetchFn<T>,
  persist: Option<PersistFn<T>>,
  stale_after: Duration,
}

/// Stateful cache+retrieval unit for one resource.
///
/// Cheap to clone; clones share the same state, so a handle can be passed to
/// observers while the owner keeps driving refreshes.
pub struct Fetcher<T: Clone + Send + Sync + 'static> {
  inner: Arc<Inner<T>>,
}

impl<T: Clone + Send + Sync + 'static> Clone for Fetcher<T> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<T: Clone + Send + Sync + 'static> Fetcher<T> {
  pub fn with_strategy(name: impl Into<String>, strategy: Strategy<T>) -> Self {
    let initial = match strategy.prime {
      Some((value, cached_at)) => FetchState::primed(value, cached_at),
      None => FetchState::idle(),
    };
    let (tx, _rx) = watch::channel(initial);

    Self {
      inner: Arc::new(Inner {
        name: name.into(),
        tx,
        flight: Mutex::new(Flight {
          generation: 0,
          in_flight: false,
        }),
        fetch: strategy.fetch,
        persist: strategy.persist,
        stale_after: strategy.stale_after,
      }),
    }
  }

  /// Refresh the resource if it needs it.
  ///
  /// Returns immediately when a request is already in flight and the caller
  /// did not force a reload (at most one in-flight request per fetcher), and
  /// when the cached value is still fresh. A forced reload while a request
  /// is in flight supersedes it: the older request keeps running, but its
  /// result is discarded on completion via generation mismatch.
  pub async fn update_if_needed(&self, force_reload: bool) {
    let generation = {
      let mut flight = lock(&self.inner.flight);
      if flight.in_flight && !force_reload {
        return;
      }
      if !flight.in_flight && !force_reload && !self.is_stale() {
        return;
      }
      flight.generation += 1;
      flight.in_flight = true;
      flight.generation
    };

    self.inner.tx.send_modify(|state| {
      state.phase = FetchPhase::Loading;
    });
    debug!(fetcher = %self.inner.name, generation, "fetching");

    let result = (self.inner.fetch)().await;
    self.finish(generation, result);
  }

  fn finish(&self, generation: u64, result: Result<Option<T>, FetchError>) {
    {
      let mut flight = lock(&self.inner.flight);
      if flight.generation != generation {
        debug!(fetcher = %self.inner.name, generation, "discarding superseded result");
        return;
      }
      flight.in_flight = false;
    }

    match result {
      Ok(value) => {
        if let (Some(record), Some(persist)) = (value.as_ref(), self.inner.persist.as_ref()) {
          // The in-memory state is published regardless; a persistence
          // failure only costs the restart-time copy.
          if let Err(err) = persist(record) {
            warn!(fetcher = %self.inner.name, %err, "write-through to store failed");
          }
        }
        self.inner.tx.send_modify(|state| {
          state.phase = FetchPhase::Loaded;
          state.value = value;
          state.error = None;
          state.last_updated = Some(Utc::now());
        });
      }
      Err(error) => {
        debug!(fetcher = %self.inner.name, %error, "fetch failed");
        self.inner.tx.send_modify(|state| {
          state.phase = FetchPhase::Failed;
          state.error = Some(error);
          // The last good payload stays put.
        });
      }
    }
  }

  /// Synchronous read of whatever is cached. Never blocks, never fetches.
  pub fn current_value(&self) -> Option<T> {
    self.inner.tx.borrow().value.clone()
  }

  /// The full current snapshot.
  pub fn state(&self) -> FetchState<T> {
    self.inner.tx.borrow().clone()
  }

  pub fn phase(&self) -> FetchPhase {
    self.inner.tx.borrow().phase
  }

  pub fn last_updated(&self) -> Option<DateTime<Utc>> {
    self.inner.tx.borrow().last_updated
  }

  /// Observe state snapshots. Every transition is published whole.
  pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
    self.inner.tx.subscribe()
  }

  /// Stale when never loaded, or older than the kind's threshold.
  pub fn is_stale(&self) -> bool {
    match self.inner.tx.borrow().last_updated {
      None => true,
      Some(at) => Utc::now() - at > self.inner.stale_after,
    }
  }

  pub fn name(&self) -> &str {
    &self.inner.name
  }

  /// Replace the payload after a confirmed local or remote mutation:
  /// persists first, then publishes a Loaded snapshot.
  pub(crate) fn replace_value(&self, value: T) -> Result<(), FetchError> {
    if let Some(persist) = self.inner.persist.as_ref() {
      persist(&value)?;
    }
    self.inner.tx.send_modify(|state| {
      state.phase = FetchPhase::Loaded;
      state.value = Some(value);
      state.error = None;
      state.last_updated = Some(Utc::now());
    });
    Ok(())
  }

  /// Surface a mutation failure without touching the payload.
  pub(crate) fn mark_failed(&self, error: FetchError) {
    self.inner.tx.send_modify(|state| {
      state.phase = FetchPhase::Failed;
      state.error = Some(error);
    });
  }
}

impl<T: Clone + Send + Sync + std::fmt::Debug> std::fmt::Debug for Fetcher<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Fetcher")
      .field("name", &self.inner.name)
      .field("state", &*self.inner.tx.borrow())
      .finish_non_exhaustive()
  }
}

fn lock(mutex: &Mutex<Flight>) -> MutexGuard<'_, Flight> {
  mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
  use std::time::Duration as StdDuration;

  fn counting_fetcher(
    delay: StdDuration,
  ) -> (Fetcher<u32>, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let fetcher = Fetcher::with_strategy(
      "test",
      Strategy::new(Duration::minutes(5), move || {
        let counter = counter.clone();
        async move {
          tokio::time::sleep(delay).await;
          Ok(Some(counter.fetch_add(1, Ordering::SeqCst) + 1))
        }
      }),
    );
    (fetcher, calls)
  }

  #[tokio::test]
  async fn test_at_most_one_in_flight() {
    let (fetcher, calls) = counting_fetcher(StdDuration::from_millis(50));

    tokio::join!(
      fetcher.update_if_needed(false),
      fetcher.update_if_needed(false),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(fetcher.current_value(), Some(1));
  }

  #[tokio::test]
  async fn test_fresh_value_skips_fetch() {
    let (fetcher, calls) = counting_fetcher(StdDuration::ZERO);

    fetcher.update_if_needed(false).await;
    fetcher.update_if_needed(false).await;

    // Second call is within the staleness window.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_force_reload_refetches() {
    let (fetcher, calls) = counting_fetcher(StdDuration::ZERO);

    fetcher.update_if_needed(false).await;
    fetcher.update_if_needed(true).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(fetcher.current_value(), Some(2));
  }

  #[tokio::test]
  async fn test_superseded_result_is_discarded() {
    // First request is slow and returns "a"; second is fast and returns "b".
    // The slow request resolves last but must not win.
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let fetcher = Fetcher::with_strategy(
      "test",
      Strategy::new(Duration::minutes(5), move || {
        let counter = counter.clone();
        async move {
          let call = counter.fetch_add(1, Ordering::SeqCst);
          if call == 0 {
            tokio::time::sleep(StdDuration::from_millis(80)).await;
            Ok(Some("a"))
          } else {
            tokio::time::sleep(StdDuration::from_millis(10)).await;
            Ok(Some("b"))
          }
        }
      }),
    );

    let slow = fetcher.clone();
    let first = tokio::spawn(async move { slow.update_if_needed(true).await });
    tokio::time::sleep(StdDuration::from_millis(20)).await;

    fetcher.update_if_needed(true).await;
    assert_eq!(fetcher.current_value(), Some("b"));

    first.await.unwrap();
    assert_eq!(fetcher.current_value(), Some("b"));
    assert_eq!(fetcher.phase(), FetchPhase::Loaded);
  }

  #[tokio::test]
  async fn test_failed_reload_keeps_payload() {
    let fail = Arc::new(AtomicBool::new(false));
    let flag = fail.clone();
    let fetcher = Fetcher::with_strategy(
      "test",
      Strategy::new(Duration::minutes(5), move || {
        let flag = flag.clone();
        async move {
          if flag.load(Ordering::SeqCst) {
            Err(FetchError::Network("unreachable".into()))
          } else {
            Ok(Some(42))
          }
        }
      }),
    );

    fetcher.update_if_needed(true).await;
    assert_eq!(fetcher.current_value(), Some(42));

    fail.store(true, Ordering::SeqCst);
    fetcher.update_if_needed(true).await;

    let state = fetcher.state();
    assert_eq!(state.phase, FetchPhase::Failed);
    assert_eq!(state.value, Some(42));
    assert_eq!(state.error, Some(FetchError::Network("unreachable".into())));
  }

  #[tokio::test]
  async fn test_failed_fetcher_can_retry() {
    let fail = Arc::new(AtomicBool::new(true));
    let flag = fail.clone();
    let fetcher = Fetcher::with_strategy(
      "test",
      Strategy::new(Duration::minutes(5), move || {
        let flag = flag.clone();
        async move {
          if flag.load(Ordering::SeqCst) {
            Err(FetchError::Network("unreachable".into()))
          } else {
            Ok(Some("recovered"))
          }
        }
      }),
    );

    fetcher.update_if_needed(true).await;
    assert_eq!(fetcher.phase(), FetchPhase::Failed);

    fail.store(false, Ordering::SeqCst);
    fetcher.update_if_needed(true).await;
    assert_eq!(fetcher.phase(), FetchPhase::Loaded);
    assert_eq!(fetcher.current_value(), Some("recovered"));
  }

  #[tokio::test]
  async fn test_primed_value_is_served_before_first_fetch() {
    let fetcher: Fetcher<&str> = Fetcher::with_strategy(
      "test",
      Strategy::new(Duration::minutes(5), || async { Ok(Some("fresh")) })
        .prime(Some(("persisted", Utc::now() - Duration::hours(2)))),
    );

    assert_eq!(fetcher.phase(), FetchPhase::Idle);
    assert_eq!(fetcher.current_value(), Some("persisted"));
    // Two hours old is past every threshold here.
    assert!(fetcher.is_stale());

    fetcher.update_if_needed(false).await;
    assert_eq!(fetcher.current_value(), Some("fresh"));
  }

  #[tokio::test]
  async fn test_loading_visible_while_in_flight() {
    let (fetcher, calls) = counting_fetcher(StdDuration::from_millis(50));

    let handle = {
      let fetcher = fetcher.clone();
      tokio::spawn(async move { fetcher.update_if_needed(true).await })
    };
    tokio::time::sleep(StdDuration::from_millis(10)).await;

    assert_eq!(fetcher.phase(), FetchPhase::Loading);
    assert_eq!(fetcher.current_value(), None);

    handle.await.unwrap();
    assert_eq!(fetcher.phase(), FetchPhase::Loaded);
    assert_eq!(fetcher.current_value(), Some(1));

    // Within the staleness window: no second transport call.
    fetcher.update_if_needed(false).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_subscribers_observe_transitions() {
    let (fetcher, _calls) = counting_fetcher(StdDuration::from_millis(10));
    let mut rx = fetcher.subscribe();

    let handle = {
      let fetcher = fetcher.clone();
      tokio::spawn(async move { fetcher.update_if_needed(true).await })
    };

    rx.changed().await.unwrap();
    assert_eq!(rx.borrow().phase, FetchPhase::Loading);

    rx.changed().await.unwrap();
    let state = rx.borrow().clone();
    assert_eq!(state.phase, FetchPhase::Loaded);
    assert_eq!(state.value, Some(1));

    handle.await.unwrap();
  }

  #[tokio::test]
  async fn test_loaded_absent_clears_value() {
    let fetcher: Fetcher<&str> = Fetcher::with_strategy(
      "test",
      Strategy::new(Duration::minutes(5), || async { Ok(None) })
        .prime(Some(("old", Utc::now() - Duration::hours(2)))),
    );

    fetcher.update_if_needed(true).await;

    let state = fetcher.state();
    assert_eq!(state.phase, FetchPhase::Loaded);
    assert_eq!(state.value, None);
    assert!(state.error.is_none());
  }
}
