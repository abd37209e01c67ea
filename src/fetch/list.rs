//! Fetcher specialization for ordered record collections.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::fetcher::Fetcher;
use super::state::{FetchPhase, FetchState};
use crate::error::FetchError;
use crate::models::Cacheable;

type BoxFuture = Pin<Box<dyn Future<Output = Result<(), FetchError>> + Send>>;
type SaveFn<T> = Box<dyn Fn(Vec<T>) -> BoxFuture + Send + Sync>;

/// An ordered collection of records with insert/remove semantics.
///
/// Identifier uniqueness is an invariant: inserting an existing identifier
/// replaces it in place (stable position, no visual reordering on
/// metadata-only updates) and removing an absent identifier is a no-op.
///
/// Lists backed by a remote resource (block list, following) carry a save
/// strategy; mutations persist remotely first and only touch the local
/// collection on confirmed success. All mutations are serialized so
/// overlapping calls cannot lose updates.
pub struct ListFetcher<T: Cacheable> {
  core: Fetcher<Vec<T>>,
  mutation: Arc<Mutex<()>>,
  save: Option<Arc<SaveFn<T>>>,
}

impl<T: Cacheable> Clone for ListFetcher<T> {
  fn clone(&self) -> Self {
    Self {
      core: self.core.clone(),
      mutation: Arc::clone(&self.mutation),
      save: self.save.clone(),
    }
  }
}

impl<T: Cacheable> ListFetcher<T> {
  pub fn new(core: Fetcher<Vec<T>>) -> Self {
    Self {
      core,
      mutation: Arc::new(Mutex::new(())),
      save: None,
    }
  }

  /// Attach the remote persistence step performed before local mutation.
  pub fn with_remote_save<F, Fut>(mut self, save: F) -> Self
  where
    F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), FetchError>> + Send + 'static,
  {
    self.save = Some(Arc::new(Box::new(move |records| Box::pin(save(records)))));
    self
  }

  pub async fn update_if_needed(&self, force_reload: bool) {
    self.core.update_if_needed(force_reload).await;
  }

  /// The current collection; empty when nothing has loaded yet.
  pub fn items(&self) -> Vec<T> {
    self.core.current_value().unwrap_or_default()
  }

  pub fn state(&self) -> FetchState<Vec<T>> {
    self.core.state()
  }

  pub fn phase(&self) -> FetchPhase {
    self.core.phase()
  }

  pub fn is_stale(&self) -> bool {
    self.core.is_stale()
  }

  pub fn subscribe(&self) -> tokio::sync::watch::Receiver<FetchState<Vec<T>>> {
    self.core.subscribe()
  }

  /// Append, or replace in place when the identifier is already present.
  pub async fn insert(&self, record: T) -> Result<(), FetchError> {
    let _guard = self.mutation.lock().await;

    let mut items = self.items();
    let id = record.record_id();
    match items.iter().position(|r| r.record_id() == id) {
      Some(index) => items[index] = record,
      None => items.push(record),
    }

    self.commit(items).await
  }

  /// Remove the matching entry; absent identifiers are a no-op.
  pub async fn remove(&self, id: &str) -> Result<(), FetchError> {
    let _guard = self.mutation.lock().await;

    let mut items = self.items();
    let Some(index) = items.iter().position(|r| r.record_id() == id) else {
      return Ok(());
    };
    items.remove(index);

    self.commit(items).await
  }

  /// Remote save (when configured), then local apply. A remote failure
  /// leaves the local collection untouched and surfaces through both the
  /// returned error and the Failed state.
  async fn commit(&self, items: Vec<T>) -> Result<(), FetchError> {
    if let Some(save) = &self.save {
      if let Err(err) = (save)(items.clone()).await {
        self.core.mark_failed(err.clone());
        return Err(err);
      }
    }
    self.core.replace_value(items)
  }
}

impl<T: Cacheable + std::fmt::Debug> std::fmt::Debug for ListFetcher<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ListFetcher")
      .field("core", &self.core)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fetch::fetcher::Strategy;
  use crate::models::AddressModel;
  use chrono::Duration;
  use std::sync::atomic::{AtomicU32, Ordering};

  fn local_list() -> ListFetcher<AddressModel> {
    ListFetcher::new(Fetcher::with_strategy(
      "test-list",
      Strategy::new(Duration::minutes(5), || async { Ok(Some(Vec::new())) }),
    ))
  }

  #[tokio::test]
  async fn test_insert_is_idempotent() {
    let list = local_list();

    list.insert(AddressModel::new("somebody")).await.unwrap();
    list.insert(AddressModel::new("somebody")).await.unwrap();

    assert_eq!(list.items().len(), 1);
  }

  #[tokio::test]
  async fn test_insert_replaces_in_place() {
    let list = local_list();

    list.insert(AddressModel::new("first")).await.unwrap();
    list.insert(AddressModel::new("second")).await.unwrap();

    let mut updated = AddressModel::new("first");
    updated.registered = Some(chrono::Utc::now());
    list.insert(updated).await.unwrap();

    let items = list.items();
    assert_eq!(items.len(), 2);
    // Metadata update did not reorder the collection.
    assert_eq!(items[0].name, "first");
    assert!(items[0].registered.is_some());
    assert_eq!(items[1].name, "second");
  }

  #[tokio::test]
  async fn test_remove_absent_is_noop() {
    let list = local_list();

    list.insert(AddressModel::new("somebody")).await.unwrap();
    list.remove("nobody").await.unwrap();

    assert_eq!(list.items().len(), 1);
  }

  #[tokio::test]
  async fn test_remote_failure_leaves_collection_untouched() {
    let list = local_list().with_remote_save(|_records| async {
      Err(FetchError::Unauthorized)
    });

    let err = list.insert(AddressModel::new("somebody")).await.unwrap_err();
    assert_eq!(err, FetchError::Unauthorized);
    assert!(list.items().is_empty());
    assert_eq!(list.phase(), FetchPhase::Failed);
  }

  #[tokio::test]
  async fn test_remote_save_receives_full_collection() {
    let saves = Arc::new(AtomicU32::new(0));
    let counter = saves.clone();
    let list = local_list().with_remote_save(move |records: Vec<AddressModel>| {
      let counter = counter.clone();
      async move {
        counter.store(records.len() as u32, Ordering::SeqCst);
        Ok(())
      }
    });

    list.insert(AddressModel::new("one")).await.unwrap();
    list.insert(AddressModel::new("two")).await.unwrap();

    assert_eq!(saves.load(Ordering::SeqCst), 2);
    assert_eq!(list.items().len(), 2);
  }

  #[tokio::test]
  async fn test_concurrent_mutations_are_serialized() {
    let list = local_list().with_remote_save(|_records| async {
      tokio::time::sleep(std::time::Duration::from_millis(20)).await;
      Ok(())
    });

    let a = list.clone();
    let b = list.clone();
    tokio::join!(
      async move { a.insert(AddressModel::new("one")).await.unwrap() },
      async move { b.insert(AddressModel::new("two")).await.unwrap() },
    );

    // Neither insert was lost to the other's in-flight save.
    assert_eq!(list.items().len(), 2);
  }
}
