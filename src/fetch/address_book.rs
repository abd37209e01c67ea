//! Process-wide registry of per-address composites and session-scoped lists.

use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use super::kinds::{self, GLOBAL_BLOCK_ADDRESS};
use super::list::ListFetcher;
use super::summary::AddressSummary;
use crate::config::Session;
use crate::error::FetchError;
use crate::interface::{ApiCredential, DataInterface};
use crate::models::{normalize_address, AddressModel, AddressName};
use crate::store::RecordStore;

/// Root of cache invalidation for one signed-in (or anonymous) session.
///
/// Sign-out and identity switch replace the whole book with a fresh one
/// built from a new [`Session`]; a book is never re-credentialed in place,
/// so cached records can never leak a stale credential's view.
pub struct AddressBook<S: RecordStore> {
  interface: Arc<dyn DataInterface>,
  store: Arc<S>,
  api_key: ApiCredential,
  acting_address: AddressName,
  local_addresses: Vec<AddressName>,

  account_addresses: ListFetcher<AddressModel>,
  global_blocklist: ListFetcher<AddressModel>,
  local_blocklist: ListFetcher<AddressModel>,
  address_blocklist: ListFetcher<AddressModel>,
  following: ListFetcher<AddressModel>,
  pinned: ListFetcher<AddressModel>,

  summaries: Mutex<HashMap<AddressName, Arc<AddressSummary<S>>>>,
}

impl<S: RecordStore> AddressBook<S> {
  pub fn new(session: &Session, interface: Arc<dyn DataInterface>, store: Arc<S>) -> Self {
    let api_key = session.auth_key.clone();
    let acting_address = normalize_address(&session.acting_address);
    let credential = (!api_key.is_empty()).then_some(api_key.as_str());

    let book = Self {
      account_addresses: kinds::account_addresses_fetcher(&interface, &store, &api_key),
      global_blocklist: kinds::block_list_fetcher(&interface, &store, GLOBAL_BLOCK_ADDRESS, None),
      local_blocklist: kinds::local_list_fetcher(&store, "blocked", &session.local_blocked),
      address_blocklist: kinds::block_list_fetcher(&interface, &store, &acting_address, credential),
      following: kinds::following_fetcher(&interface, &store, &acting_address, credential),
      pinned: kinds::local_list_fetcher(&store, "pinned", &session.pinned),
      local_addresses: session
        .local_addresses
        .iter()
        .map(|a| normalize_address(a))
        .collect(),
      summaries: Mutex::new(HashMap::new()),
      interface,
      store,
      api_key,
      acting_address,
    };

    // The acting address always has a summary entry.
    if !book.acting_address.is_empty() {
      let acting = book.acting_address.clone();
      book.address_summary(&acting);
    }

    book
  }

  pub fn acting_address(&self) -> &str {
    &self.acting_address
  }

  pub fn signed_in(&self) -> bool {
    !self.api_key.is_empty()
  }

  /// The credential, but only for addresses the account owns.
  pub fn credential_for(&self, address: &str) -> Option<ApiCredential> {
    let address = normalize_address(address);
    if self.signed_in() && self.my_addresses().contains(&address) {
      Some(self.api_key.clone())
    } else {
      None
    }
  }

  /// The memoized composite for an address, created on first access.
  /// At most one composite exists per address for this book's lifetime;
  /// concurrent first callers receive the same instance.
  pub fn address_summary(&self, address: &str) -> Arc<AddressSummary<S>> {
    let address = normalize_address(address);
    let mut summaries = lock(&self.summaries);
    summaries
      .entry(address.clone())
      .or_insert_with(|| {
        let credential = if self.signed_in()
          && (address == self.acting_address || self.local_addresses.contains(&address))
        {
          Some(self.api_key.as_str())
        } else {
          None
        };
        Arc::new(AddressSummary::new(
          Arc::clone(&self.interface),
          Arc::clone(&self.store),
          &address,
          credential,
        ))
      })
      .clone()
  }

  /// Force-refresh the book's own top-level fetchers. Per-address summaries
  /// are pulled lazily on demand and deliberately not recursed into.
  pub async fn auto_fetch(&self) {
    let tasks: Vec<Pin<Box<dyn Future<Output = ()> + Send>>> = vec![
      refresh(&self.account_addresses),
      refresh(&self.global_blocklist),
      refresh(&self.local_blocklist),
      refresh(&self.address_blocklist),
      refresh(&self.following),
      refresh(&self.pinned),
    ];
    join_all(tasks).await;
  }

  // Derived views are pure functions over the current fetcher snapshots:
  // computed on read, never cached, so they cannot go stale independently
  // of their sources.

  pub fn my_addresses(&self) -> Vec<AddressName> {
    let fetched: Vec<AddressName> = self
      .account_addresses
      .items()
      .into_iter()
      .map(|a| a.name)
      .collect();
    if fetched.is_empty() {
      self.local_addresses.clone()
    } else {
      fetched
    }
  }

  pub fn my_other_addresses(&self) -> Vec<AddressName> {
    self
      .my_addresses()
      .into_iter()
      .filter(|a| *a != self.acting_address)
      .collect()
  }

  pub fn global_blocked(&self) -> Vec<AddressName> {
    names(&self.global_blocklist)
  }

  pub fn address_blocked(&self) -> Vec<AddressName> {
    names(&self.address_blocklist)
  }

  pub fn local_blocked(&self) -> Vec<AddressName> {
    names(&self.local_blocklist)
  }

  /// Blocks the user can see and lift: their own list plus the local one.
  pub fn visible_blocked(&self) -> Vec<AddressName> {
    dedup(self.address_blocked().into_iter().chain(self.local_blocked()))
  }

  /// Every block in effect, including the service-wide list.
  pub fn applied_blocked(&self) -> Vec<AddressName> {
    dedup(self.global_blocked().into_iter().chain(self.visible_blocked()))
  }

  pub fn following(&self) -> Vec<AddressName> {
    names(&self.following)
  }

  pub fn pinned_addresses(&self) -> Vec<AddressName> {
    names(&self.pinned)
  }

  pub fn is_pinned(&self, address: &str) -> bool {
    self.pinned_addresses().contains(&normalize_address(address))
  }

  pub fn is_blocked(&self, address: &str) -> bool {
    self.applied_blocked().contains(&normalize_address(address))
  }

  pub fn can_unblock(&self, address: &str) -> bool {
    self.visible_blocked().contains(&normalize_address(address))
  }

  pub fn is_following(&self, address: &str) -> bool {
    self.signed_in() && self.following().contains(&normalize_address(address))
  }

  pub fn can_follow(&self, address: &str) -> bool {
    self.signed_in() && !self.following().contains(&normalize_address(address))
  }

  pub fn can_un_follow(&self, address: &str) -> bool {
    self.is_following(address)
  }

  // Mutations. Pinning is purely local; blocking falls back to the local
  // list when no credential is available; following always needs one.

  pub async fn pin(&self, address: &str) -> Result<(), FetchError> {
    self.pinned.insert(AddressModel::new(address)).await
  }

  pub async fn remove_pin(&self, address: &str) -> Result<(), FetchError> {
    self.pinned.remove(&normalize_address(address)).await
  }

  pub async fn block(&self, address: &str) -> Result<(), FetchError> {
    if self.credential_for(&self.acting_address).is_some() {
      self
        .address_blocklist
        .insert(AddressModel::new(address))
        .await?;
    }
    self.local_blocklist.insert(AddressModel::new(address)).await
  }

  pub async fn unblock(&self, address: &str) -> Result<(), FetchError> {
    let address = normalize_address(address);
    if self.credential_for(&self.acting_address).is_some() {
      self.address_blocklist.remove(&address).await?;
    }
    self.local_blocklist.remove(&address).await
  }

  pub async fn follow(&self, address: &str) -> Result<(), FetchError> {
    if self.credential_for(&self.acting_address).is_none() {
      return Err(FetchError::Unauthorized);
    }
    self.following.insert(AddressModel::new(address)).await
  }

  pub async fn un_follow(&self, address: &str) -> Result<(), FetchError> {
    if self.credential_for(&self.acting_address).is_none() {
      return Err(FetchError::Unauthorized);
    }
    self.following.remove(&normalize_address(address)).await
  }

  pub fn account_addresses(&self) -> &ListFetcher<AddressModel> {
    &self.account_addresses
  }

  pub fn pinned(&self) -> &ListFetcher<AddressModel> {
    &self.pinned
  }

  /// A persistable snapshot for the explicit save points (startup, sign-in,
  /// sign-out).
  pub fn session(&self) -> Session {
    Session {
      auth_key: self.api_key.clone(),
      acting_address: self.acting_address.clone(),
      local_addresses: self.local_addresses.clone(),
      pinned: self.pinned_addresses(),
      local_blocked: self.local_blocked(),
    }
  }
}

fn refresh(
  list: &ListFetcher<AddressModel>,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
  let list = list.clone();
  Box::pin(async move { list.update_if_needed(true).await })
}

fn names(list: &ListFetcher<AddressModel>) -> Vec<AddressName> {
  list.items().into_iter().map(|a| a.name).collect()
}

/// Order-preserving dedup.
fn dedup(input: impl Iterator<Item = AddressName>) -> Vec<AddressName> {
  let mut seen = HashSet::new();
  input.filter(|name| seen.insert(name.clone())).collect()
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
