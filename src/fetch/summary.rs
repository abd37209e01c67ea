//! Composite fetcher aggregating every resource of one address.

use futures::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, RwLock};

use super::fetcher::Fetcher;
use super::kinds;
use super::list::ListFetcher;
use super::state::FetchPhase;
use crate::error::FetchError;
use crate::interface::{ApiCredential, DataInterface};
use crate::models::{
  normalize_address, AddressInfo, AddressModel, AddressName, BioModel, IconModel, NowModel,
  PasteModel, ProfileModel, PurlModel, StatusModel,
};
use crate::store::RecordStore;

struct Children {
  address: AddressName,
  credential: Option<ApiCredential>,
  info: Fetcher<AddressInfo>,
  icon: Fetcher<IconModel>,
  profile: Fetcher<ProfileModel>,
  now: Fetcher<NowModel>,
  bio: Fetcher<BioModel>,
  pastes: ListFetcher<PasteModel>,
  purls: ListFetcher<PurlModel>,
  statuses: ListFetcher<StatusModel>,
  following: ListFetcher<AddressModel>,
  /// Present only for the acting, authenticated identity.
  blocked: Option<ListFetcher<AddressModel>>,
}

impl Children {
  fn build<S: RecordStore>(
    interface: &Arc<dyn DataInterface>,
    store: &Arc<S>,
    address: &str,
    credential: Option<&str>,
  ) -> Self {
    let address = normalize_address(address);
    Self {
      info: kinds::info_fetcher(interface, store, &address),
      icon: kinds::icon_fetcher(interface, store, &address),
      profile: kinds::profile_fetcher(interface, store, &address),
      now: kinds::now_fetcher(interface, store, &address),
      bio: kinds::bio_fetcher(interface, store, &address),
      pastes: kinds::pastes_fetcher(interface, store, &address),
      purls: kinds::purls_fetcher(interface, store, &address),
      statuses: kinds::statuses_fetcher(interface, store, std::slice::from_ref(&address)),
      following: kinds::following_fetcher(interface, store, &address, credential),
      blocked: credential
        .map(|cred| kinds::block_list_fetcher(interface, store, &address, Some(cred))),
      credential: credential.map(String::from),
      address,
    }
  }
}

/// Owns and coordinates the child fetchers for one address.
///
/// Children are exclusively owned; accessors hand out per-call handles that
/// must not be retained across [`AddressSummary::configure`], which rebinds
/// every child to a new address and drops all in-memory state (the durable
/// store's persisted copies survive).
pub struct AddressSummary<S: RecordStore> {
  interface: Arc<dyn DataInterface>,
  store: Arc<S>,
  children: RwLock<Children>,
  status_details: Mutex<HashMap<String, Fetcher<StatusModel>>>,
  paste_details: Mutex<HashMap<String, Fetcher<PasteModel>>>,
  purl_details: Mutex<HashMap<String, Fetcher<PurlModel>>>,
}

impl<S: RecordStore> AddressSummary<S> {
  /// Pass a credential only when building the summary for the acting,
  /// authenticated identity; it unlocks the block-list child and makes the
  /// follow list mutable.
  pub fn new(
    interface: Arc<dyn DataInterface>,
    store: Arc<S>,
    address: &str,
    credential: Option<&str>,
  ) -> Self {
    let children = Children::build(&interface, &store, address, credential);
    Self {
      interface,
      store,
      children: RwLock::new(children),
      status_details: Mutex::new(HashMap::new()),
      paste_details: Mutex::new(HashMap::new()),
      purl_details: Mutex::new(HashMap::new()),
    }
  }

  pub fn address(&self) -> AddressName {
    self.read().address.clone()
  }

  /// Force-refresh every child concurrently. Children are independent
  /// resources: one failing never blocks or fails its siblings, and callers
  /// may read each child's state without waiting for the rest.
  pub async fn perform(&self) {
    let (info, icon, profile, now, bio, pastes, purls, statuses, following, blocked) = {
      let children = self.read();
      if children.address.is_empty() {
        return;
      }
      (
        children.info.clone(),
        children.icon.clone(),
        children.profile.clone(),
        children.now.clone(),
        children.bio.clone(),
        children.pastes.clone(),
        children.purls.clone(),
        children.statuses.clone(),
        children.following.clone(),
        children.blocked.clone(),
      )
    };

    let mut tasks: Vec<Pin<Box<dyn Future<Output = ()> + Send>>> = vec![
      Box::pin(async move { info.update_if_needed(true).await }),
      Box::pin(async move { icon.update_if_needed(true).await }),
      Box::pin(async move { profile.update_if_needed(true).await }),
      Box::pin(async move { now.update_if_needed(true).await }),
      Box::pin(async move { bio.update_if_needed(true).await }),
      Box::pin(async move { pastes.update_if_needed(true).await }),
      Box::pin(async move { purls.update_if_needed(true).await }),
      Box::pin(async move { statuses.update_if_needed(true).await }),
      Box::pin(async move { following.update_if_needed(true).await }),
    ];
    if let Some(blocked) = blocked {
      tasks.push(Box::pin(async move { blocked.update_if_needed(true).await }));
    }

    join_all(tasks).await;
  }

  /// Aggregate readiness: `Loaded` once every child is terminal (loaded or
  /// failed), `Loading` while any child is in flight, `Idle` otherwise.
  pub fn phase(&self) -> FetchPhase {
    let children = self.read();
    let mut phases = vec![
      children.info.phase(),
      children.icon.phase(),
      children.profile.phase(),
      children.now.phase(),
      children.bio.phase(),
      children.pastes.phase(),
      children.purls.phase(),
      children.statuses.phase(),
      children.following.phase(),
    ];
    if let Some(blocked) = &children.blocked {
      phases.push(blocked.phase());
    }

    if phases.iter().any(|p| *p == FetchPhase::Loading) {
      FetchPhase::Loading
    } else if phases.iter().all(|p| p.is_terminal()) {
      FetchPhase::Loaded
    } else {
      FetchPhase::Idle
    }
  }

  /// Rebind every child to a new address, discarding all in-memory state
  /// for this composite. Detail fetcher maps are cleared too.
  pub fn configure(&self, address: &str, credential: Option<&str>) {
    let rebuilt = Children::build(&self.interface, &self.store, address, credential);
    *self.write() = rebuilt;

    lock(&self.status_details).clear();
    lock(&self.paste_details).clear();
    lock(&self.purl_details).clear();
  }

  pub fn info(&self) -> Fetcher<AddressInfo> {
    self.read().info.clone()
  }

  pub fn icon(&self) -> Fetcher<IconModel> {
    self.read().icon.clone()
  }

  pub fn profile(&self) -> Fetcher<ProfileModel> {
    self.read().profile.clone()
  }

  pub fn now(&self) -> Fetcher<NowModel> {
    self.read().now.clone()
  }

  pub fn bio(&self) -> Fetcher<BioModel> {
    self.read().bio.clone()
  }

  pub fn pastes(&self) -> ListFetcher<PasteModel> {
    self.read().pastes.clone()
  }

  pub fn purls(&self) -> ListFetcher<PurlModel> {
    self.read().purls.clone()
  }

  pub fn statuses(&self) -> ListFetcher<StatusModel> {
    self.read().statuses.clone()
  }

  pub fn following(&self) -> ListFetcher<AddressModel> {
    self.read().following.clone()
  }

  /// The acting identity's block list; `None` for unauthenticated summaries.
  pub fn blocked(&self) -> Option<ListFetcher<AddressModel>> {
    self.read().blocked.clone()
  }

  /// Memoized detail fetcher for one status: the same id always returns the
  /// same instance for the lifetime of this composite.
  pub fn status_detail(&self, id: &str) -> Fetcher<StatusModel> {
    let address = self.address();
    lock(&self.status_details)
      .entry(id.to_string())
      .or_insert_with(|| kinds::status_fetcher(&self.interface, &self.store, &address, id))
      .clone()
  }

  /// Memoized detail fetcher for one paste.
  pub fn paste_detail(&self, title: &str) -> Fetcher<PasteModel> {
    let address = self.address();
    lock(&self.paste_details)
      .entry(title.to_string())
      .or_insert_with(|| kinds::paste_fetcher(&self.interface, &self.store, &address, title))
      .clone()
  }

  /// Memoized detail fetcher for one PURL.
  pub fn purl_detail(&self, name: &str) -> Fetcher<PurlModel> {
    let address = self.address();
    lock(&self.purl_details)
      .entry(name.to_string())
      .or_insert_with(|| kinds::purl_fetcher(&self.interface, &self.store, &address, name))
      .clone()
  }

  pub fn credential(&self) -> Option<ApiCredential> {
    self.read().credential.clone()
  }

  // Publishing operations. Each saves through the transport with this
  // summary's credential, then force-refreshes the affected child so the
  // published snapshot reflects the service's canonical copy.

  pub async fn save_profile(&self, content: &str) -> Result<(), FetchError> {
    let (address, credential) = self.authorized()?;
    self
      .interface
      .save_profile(&address, content, &credential)
      .await?;
    self.profile().update_if_needed(true).await;
    Ok(())
  }

  pub async fn save_now(&self, content: &str, listed: bool) -> Result<(), FetchError> {
    let (address, credential) = self.authorized()?;
    self
      .interface
      .save_now(&address, content, listed, &credential)
      .await?;
    self.now().update_if_needed(true).await;
    Ok(())
  }

  pub async fn save_paste(&self, paste: &PasteModel) -> Result<PasteModel, FetchError> {
    let (_, credential) = self.authorized()?;
    let saved = self.interface.save_paste(paste, &credential).await?;
    self.pastes().update_if_needed(true).await;
    Ok(saved)
  }

  pub async fn delete_paste(&self, title: &str) -> Result<(), FetchError> {
    let (address, credential) = self.authorized()?;
    self
      .interface
      .delete_paste(&address, title, &credential)
      .await?;
    self.pastes().update_if_needed(true).await;
    Ok(())
  }

  pub async fn save_purl(&self, purl: &PurlModel) -> Result<PurlModel, FetchError> {
    let (_, credential) = self.authorized()?;
    let saved = self.interface.save_purl(purl, &credential).await?;
    self.purls().update_if_needed(true).await;
    Ok(saved)
  }

  pub async fn delete_purl(&self, name: &str) -> Result<(), FetchError> {
    let (address, credential) = self.authorized()?;
    self
      .interface
      .delete_purl(&address, name, &credential)
      .await?;
    self.purls().update_if_needed(true).await;
    Ok(())
  }

  pub async fn post_status(&self, status: &StatusModel) -> Result<StatusModel, FetchError> {
    let (_, credential) = self.authorized()?;
    let posted = self.interface.save_status(status, &credential).await?;
    self.statuses().update_if_needed(true).await;
    Ok(posted)
  }

  pub async fn delete_status(&self, id: &str) -> Result<(), FetchError> {
    let (address, credential) = self.authorized()?;
    self
      .interface
      .delete_status(&address, id, &credential)
      .await?;
    self.statuses().update_if_needed(true).await;
    Ok(())
  }

  fn authorized(&self) -> Result<(AddressName, ApiCredential), FetchError> {
    let children = self.read();
    match &children.credential {
      Some(credential) => Ok((children.address.clone(), credential.clone())),
      None => Err(FetchError::Unauthorized),
    }
  }

  fn read(&self) -> std::sync::RwLockReadGuard<'_, Children> {
    self
      .children
      .read()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn write(&self) -> std::sync::RwLockWriteGuard<'_, Children> {
    self
      .children
      .write()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::SqliteStore;
  use crate::testing::MockInterface;

  fn summary(address: &str) -> AddressSummary<SqliteStore> {
    let interface: Arc<dyn DataInterface> = Arc::new(MockInterface::default());
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    AddressSummary::new(interface, store, address, None)
  }

  fn credentialed_summary(address: &str) -> AddressSummary<SqliteStore> {
    let interface: Arc<dyn DataInterface> = Arc::new(MockInterface::default());
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    AddressSummary::new(interface, store, address, Some("token"))
  }

  #[tokio::test]
  async fn test_perform_loads_all_children() {
    let summary = summary("somebody");
    assert_eq!(summary.phase(), FetchPhase::Idle);

    summary.perform().await;

    assert_eq!(summary.phase(), FetchPhase::Loaded);
    assert!(summary.profile().current_value().is_some());
    assert!(summary.icon().current_value().is_some());
    assert_eq!(summary.statuses().items().len(), 1);
  }

  #[tokio::test]
  async fn test_icon_refreshes_with_siblings() {
    let summary = summary("somebody");
    assert_eq!(summary.icon().phase(), FetchPhase::Idle);

    summary.perform().await;

    let icon = summary.icon().current_value().unwrap();
    assert_eq!(icon.address, "somebody");
    assert!(!icon.data.is_empty());
    assert_eq!(icon.content_type.as_deref(), Some("image/png"));
  }

  #[tokio::test]
  async fn test_partial_failure_does_not_fail_siblings() {
    let mock = MockInterface::default();
    mock.fail_profile();
    let interface: Arc<dyn DataInterface> = Arc::new(mock);
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let summary = AddressSummary::new(interface, store, "somebody", None);

    summary.perform().await;

    assert_eq!(summary.profile().phase(), FetchPhase::Failed);
    assert_eq!(summary.now().phase(), FetchPhase::Loaded);
    // Every child terminal, so the aggregate still reads Loaded.
    assert_eq!(summary.phase(), FetchPhase::Loaded);
  }

  #[tokio::test]
  async fn test_detail_fetchers_are_memoized() {
    let summary = summary("somebody");

    let a = summary.status_detail("abc");
    let b = summary.status_detail("abc");
    let c = summary.status_detail("def");

    assert_eq!(a.name(), b.name());
    assert_eq!(a.current_value(), b.current_value());
    // Same instance: loading one is visible through the other handle.
    a.update_if_needed(true).await;
    assert_eq!(b.phase(), FetchPhase::Loaded);
    assert_eq!(c.phase(), FetchPhase::Idle);
  }

  #[tokio::test]
  async fn test_configure_isolates_state() {
    let summary = summary("somebody");

    summary.perform().await;
    assert_eq!(summary.phase(), FetchPhase::Loaded);
    let detail = summary.status_detail("abc");
    detail.update_if_needed(true).await;

    summary.configure("other", None);

    assert_eq!(summary.address(), "other");
    assert_eq!(summary.phase(), FetchPhase::Idle);
    assert_eq!(summary.profile().phase(), FetchPhase::Idle);
    assert!(summary.profile().current_value().is_none());
    // Detail maps were cleared: a fresh instance for the new address.
    assert_eq!(summary.status_detail("abc").phase(), FetchPhase::Idle);
  }

  #[tokio::test]
  async fn test_publishing_requires_credential() {
    let summary = summary("somebody");

    let err = summary.save_profile("<h1>new</h1>").await.unwrap_err();
    assert_eq!(err, crate::error::FetchError::Unauthorized);

    let err = summary.delete_paste("notes").await.unwrap_err();
    assert_eq!(err, crate::error::FetchError::Unauthorized);
  }

  #[tokio::test]
  async fn test_save_profile_republishes_canonical_copy() {
    let summary = credentialed_summary("somebody");

    summary.save_profile("<h1>new</h1>").await.unwrap();

    let profile = summary.profile().current_value().unwrap();
    assert_eq!(profile.content, "<h1>new</h1>");
    assert_eq!(summary.profile().phase(), FetchPhase::Loaded);
  }

  #[tokio::test]
  async fn test_paste_save_and_delete_round_trip() {
    let summary = credentialed_summary("somebody");

    let draft = PasteModel {
      address: "somebody".into(),
      title: "recipes".into(),
      content: "soup".into(),
      listed: true,
      updated: None,
    };
    summary.save_paste(&draft).await.unwrap();

    let titles: Vec<_> = summary.pastes().items().iter().map(|p| p.title.clone()).collect();
    assert!(titles.contains(&"recipes".to_string()));

    summary.delete_paste("recipes").await.unwrap();
    let titles: Vec<_> = summary.pastes().items().iter().map(|p| p.title.clone()).collect();
    assert!(!titles.contains(&"recipes".to_string()));
  }

  #[tokio::test]
  async fn test_purl_save_and_delete_round_trip() {
    let summary = credentialed_summary("somebody");

    let draft = PurlModel {
      address: "somebody".into(),
      name: "blog".into(),
      url: "https://somebody.weblog.lol".into(),
      listed: true,
      counter: None,
    };
    let saved = summary.save_purl(&draft).await.unwrap();
    assert_eq!(saved.name, "blog");

    let names: Vec<_> = summary.purls().items().iter().map(|p| p.name.clone()).collect();
    assert!(names.contains(&"blog".to_string()));

    summary.delete_purl("blog").await.unwrap();
    let names: Vec<_> = summary.purls().items().iter().map(|p| p.name.clone()).collect();
    assert!(!names.contains(&"blog".to_string()));
  }

  #[tokio::test]
  async fn test_post_status_assigns_id_and_refreshes() {
    let summary = credentialed_summary("somebody");

    let draft = StatusModel {
      id: String::new(),
      address: "somebody".into(),
      content: "shipped it".into(),
      emoji: Some("🚀".into()),
      external_url: None,
      created: chrono::Utc::now(),
    };
    let posted = summary.post_status(&draft).await.unwrap();
    assert!(!posted.id.is_empty());

    let contents: Vec<_> = summary
      .statuses()
      .items()
      .iter()
      .map(|s| s.content.clone())
      .collect();
    assert!(contents.contains(&"shipped it".to_string()));

    summary.delete_status(&posted.id).await.unwrap();
    let ids: Vec<_> = summary.statuses().items().iter().map(|s| s.id.clone()).collect();
    assert!(!ids.contains(&posted.id));
  }

  #[tokio::test]
  async fn test_blocked_child_requires_credential() {
    let interface: Arc<dyn DataInterface> = Arc::new(MockInterface::default());
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());

    let anonymous = AddressSummary::new(interface.clone(), store.clone(), "somebody", None);
    assert!(anonymous.blocked().is_none());

    let mine = AddressSummary::new(interface, store, "somebody", Some("token"));
    assert!(mine.blocked().is_some());
  }
}
