//! In-memory [`DataInterface`] double used across the fetch-layer tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::FetchError;
use crate::interface::{DataInterface, Result};
use crate::models::{
  AddressInfo, AddressName, BioModel, IconModel, NowListing, NowModel, PasteModel, ProfileModel,
  PurlModel, StatusModel,
};

/// Canned-data transport. Every address exists and has a profile, a now
/// page, a bio, an icon, and exactly one status; the `app` address carries
/// a block list paste naming `app-blocked`. Saves and deletes are applied,
/// so a save-then-refetch round trip observes the written record.
#[derive(Default)]
pub struct MockInterface {
  fail_profile: AtomicBool,
  saved_pastes: Mutex<Vec<PasteModel>>,
  saved_purls: Mutex<Vec<PurlModel>>,
  saved_statuses: Mutex<Vec<StatusModel>>,
  saved_profiles: Mutex<HashMap<AddressName, String>>,
  saved_nows: Mutex<HashMap<AddressName, (String, bool)>>,
  /// `(kind, address, id)` tuples of deleted records.
  deleted: Mutex<HashSet<(String, String, String)>>,
}

impl MockInterface {
  /// Make subsequent profile fetches fail with a network error.
  pub fn fail_profile(&self) {
    self.fail_profile.store(true, Ordering::SeqCst);
  }

  /// The most recent paste saved under `(address, title)`, if any.
  pub fn saved_paste(&self, address: &str, title: &str) -> Option<PasteModel> {
    guard(&self.saved_pastes)
      .iter()
      .rev()
      .find(|p| p.address == address && p.title == title)
      .cloned()
  }

  fn is_deleted(&self, kind: &str, address: &str, id: &str) -> bool {
    guard(&self.deleted).contains(&(kind.to_string(), address.to_string(), id.to_string()))
  }

  fn mark_deleted(&self, kind: &str, address: &str, id: &str) {
    guard(&self.deleted).insert((kind.to_string(), address.to_string(), id.to_string()));
  }
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn status_for(address: &str) -> StatusModel {
  StatusModel {
    id: format!("{address}-status-1"),
    address: address.to_string(),
    content: "testing the waters".into(),
    emoji: Some("🌊".into()),
    external_url: None,
    created: Utc::now(),
  }
}

fn default_paste(address: &str) -> PasteModel {
  PasteModel {
    address: address.to_string(),
    title: "notes".into(),
    content: "some notes".into(),
    listed: true,
    updated: Some(Utc::now()),
  }
}

fn default_purl(address: &str) -> PurlModel {
  PurlModel {
    address: address.to_string(),
    name: "home".into(),
    url: "https://example.com".into(),
    listed: true,
    counter: Some(0),
  }
}

#[async_trait]
impl DataInterface for MockInterface {
  async fn fetch_address_directory(&self) -> Result<Vec<AddressName>> {
    Ok(vec!["somebody".into(), "other".into(), "app".into()])
  }

  async fn fetch_now_garden(&self) -> Result<Vec<NowListing>> {
    Ok(vec![NowListing {
      address: "somebody".into(),
      url: "https://somebody.omg.lol/now".into(),
      updated: Some(Utc::now()),
    }])
  }

  async fn fetch_address_info(&self, address: &str) -> Result<AddressInfo> {
    Ok(AddressInfo {
      address: address.to_string(),
      registered: Some(Utc::now()),
      url: Some(format!("https://{address}.omg.lol")),
    })
  }

  async fn fetch_address_bio(&self, address: &str) -> Result<Option<BioModel>> {
    Ok(Some(BioModel {
      address: address.to_string(),
      content: "a test bio".into(),
    }))
  }

  async fn fetch_address_profile(&self, address: &str) -> Result<Option<ProfileModel>> {
    if self.fail_profile.load(Ordering::SeqCst) {
      return Err(FetchError::Network("connection reset".into()));
    }
    let content = guard(&self.saved_profiles)
      .get(address)
      .cloned()
      .unwrap_or_else(|| "<main>hello</main>".into());
    Ok(Some(ProfileModel {
      address: address.to_string(),
      content,
    }))
  }

  async fn fetch_address_now(&self, address: &str) -> Result<Option<NowModel>> {
    let (content, listed) = guard(&self.saved_nows)
      .get(address)
      .cloned()
      .unwrap_or_else(|| ("doing things".into(), true));
    Ok(Some(NowModel {
      address: address.to_string(),
      content,
      updated: Some(Utc::now()),
      listed: Some(listed),
    }))
  }

  async fn fetch_address_icon(&self, address: &str) -> Result<Option<IconModel>> {
    Ok(Some(IconModel {
      address: address.to_string(),
      data: vec![0x89, 0x50, 0x4e, 0x47],
      content_type: Some("image/png".into()),
    }))
  }

  async fn fetch_address_pastes(&self, address: &str) -> Result<Vec<PasteModel>> {
    let mut pastes = vec![default_paste(address)];
    pastes.extend(
      guard(&self.saved_pastes)
        .iter()
        .filter(|p| p.address == address)
        .cloned(),
    );
    pastes.retain(|p| !self.is_deleted("paste", address, &p.title));
    Ok(pastes)
  }

  async fn fetch_paste(&self, address: &str, title: &str) -> Result<Option<PasteModel>> {
    if self.is_deleted("paste", address, title) {
      return Ok(None);
    }
    if let Some(saved) = self.saved_paste(address, title) {
      return Ok(Some(saved));
    }
    if address == "app" && title == "app.lol.blockList" {
      return Ok(Some(PasteModel {
        address: "app".into(),
        title: title.to_string(),
        content: "app-blocked".into(),
        listed: false,
        updated: None,
      }));
    }
    if title == "notes" {
      return Ok(Some(default_paste(address)));
    }
    Ok(None)
  }

  async fn fetch_address_purls(&self, address: &str) -> Result<Vec<PurlModel>> {
    let mut purls = vec![default_purl(address)];
    purls.extend(
      guard(&self.saved_purls)
        .iter()
        .filter(|p| p.address == address)
        .cloned(),
    );
    purls.retain(|p| !self.is_deleted("purl", address, &p.name));
    Ok(purls)
  }

  async fn fetch_purl(&self, address: &str, name: &str) -> Result<Option<PurlModel>> {
    if self.is_deleted("purl", address, name) {
      return Ok(None);
    }
    let saved = guard(&self.saved_purls)
      .iter()
      .rev()
      .find(|p| p.address == address && p.name == name)
      .cloned();
    match saved {
      Some(purl) => Ok(Some(purl)),
      None if name == "home" => Ok(Some(default_purl(address))),
      None => Ok(None),
    }
  }

  async fn fetch_status_log(&self) -> Result<Vec<StatusModel>> {
    Ok(vec![status_for("somebody"), status_for("other")])
  }

  async fn fetch_address_statuses(&self, addresses: &[AddressName]) -> Result<Vec<StatusModel>> {
    let saved = guard(&self.saved_statuses);
    let mut statuses = Vec::new();
    for address in addresses {
      statuses.push(status_for(address));
      statuses.extend(saved.iter().filter(|s| s.address == *address).cloned());
    }
    drop(saved);
    statuses.retain(|s| !self.is_deleted("status", &s.address, &s.id));
    Ok(statuses)
  }

  async fn fetch_status(&self, address: &str, id: &str) -> Result<Option<StatusModel>> {
    if self.is_deleted("status", address, id) {
      return Ok(None);
    }
    let saved = guard(&self.saved_statuses)
      .iter()
      .rev()
      .find(|s| s.address == address && s.id == id)
      .cloned();
    match saved {
      Some(status) => Ok(Some(status)),
      None => {
        let mut status = status_for(address);
        status.id = id.to_string();
        Ok(Some(status))
      }
    }
  }

  async fn fetch_account_addresses(&self, credential: &str) -> Result<Vec<AddressName>> {
    if credential.is_empty() {
      return Err(FetchError::Unauthorized);
    }
    Ok(vec!["somebody".into(), "other".into()])
  }

  async fn save_profile(&self, address: &str, content: &str, _credential: &str) -> Result<()> {
    guard(&self.saved_profiles).insert(address.to_string(), content.to_string());
    Ok(())
  }

  async fn save_now(
    &self,
    address: &str,
    content: &str,
    listed: bool,
    _credential: &str,
  ) -> Result<()> {
    guard(&self.saved_nows).insert(address.to_string(), (content.to_string(), listed));
    Ok(())
  }

  async fn save_paste(&self, paste: &PasteModel, _credential: &str) -> Result<PasteModel> {
    guard(&self.deleted).remove(&(
      "paste".to_string(),
      paste.address.clone(),
      paste.title.clone(),
    ));
    guard(&self.saved_pastes).push(paste.clone());
    Ok(paste.clone())
  }

  async fn delete_paste(&self, address: &str, title: &str, _credential: &str) -> Result<()> {
    self.mark_deleted("paste", address, title);
    Ok(())
  }

  async fn save_purl(&self, purl: &PurlModel, _credential: &str) -> Result<PurlModel> {
    guard(&self.deleted).remove(&("purl".to_string(), purl.address.clone(), purl.name.clone()));
    guard(&self.saved_purls).push(purl.clone());
    Ok(purl.clone())
  }

  async fn delete_purl(&self, address: &str, name: &str, _credential: &str) -> Result<()> {
    self.mark_deleted("purl", address, name);
    Ok(())
  }

  async fn save_status(&self, status: &StatusModel, _credential: &str) -> Result<StatusModel> {
    let mut posted = status.clone();
    if posted.id.is_empty() {
      posted.id = format!("posted-{}", guard(&self.saved_statuses).len() + 1);
    }
    guard(&self.saved_statuses).push(posted.clone());
    Ok(posted)
  }

  async fn delete_status(&self, address: &str, id: &str, _credential: &str) -> Result<()> {
    self.mark_deleted("status", address, id);
    Ok(())
  }
}
