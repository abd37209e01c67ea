//! Resource records for the omg.lol data model.
//!
//! Records are value types: fetchers swap whole values or collections and
//! never mutate a previously published record in place.

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A publishing identity. Always case-normalized before use as a cache key.
pub type AddressName = String;

/// Normalize an address handle: trimmed, lowercased, without a leading `@`.
pub fn normalize_address(name: &str) -> AddressName {
  name.trim().trim_start_matches('@').to_lowercase()
}

/// The public URL for an address.
pub fn address_url(address: &str) -> String {
  format!("https://{}.omg.lol", normalize_address(address))
}

/// Tag identifying a record's kind; part of every storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
  Address,
  Info,
  Profile,
  Now,
  NowListing,
  Paste,
  Purl,
  Status,
  Bio,
  Icon,
}

impl RecordKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      RecordKind::Address => "address",
      RecordKind::Info => "info",
      RecordKind::Profile => "profile",
      RecordKind::Now => "now",
      RecordKind::NowListing => "now_listing",
      RecordKind::Paste => "paste",
      RecordKind::Purl => "purl",
      RecordKind::Status => "status",
      RecordKind::Bio => "bio",
      RecordKind::Icon => "icon",
    }
  }

  /// How long a cached copy of this kind stays fresh.
  ///
  /// Directory-shaped data is long-lived; status logs churn constantly.
  pub fn stale_after(&self) -> Duration {
    match self {
      RecordKind::Address | RecordKind::NowListing | RecordKind::Icon => Duration::hours(24),
      RecordKind::Status => Duration::minutes(5),
      RecordKind::Info | RecordKind::Bio => Duration::hours(1),
      RecordKind::Profile | RecordKind::Now | RecordKind::Paste | RecordKind::Purl => {
        Duration::minutes(30)
      }
    }
  }
}

impl std::fmt::Display for RecordKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A record that can be written to and read back from the durable store.
///
/// Storage keys are derived from `(owner, kind, record_id)`; singleton
/// resources (profile, now page, bio) use an empty `record_id`.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Owning address.
  fn owner(&self) -> &str;

  /// Identifier within the owner's resources of this kind.
  fn record_id(&self) -> String;

  /// Kind tag for storage organization.
  fn kind() -> RecordKind;
}

/// A directory or list entry naming one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressModel {
  pub name: AddressName,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub registered: Option<DateTime<Utc>>,
}

impl AddressModel {
  pub fn new(name: &str) -> Self {
    Self {
      name: normalize_address(name),
      registered: None,
    }
  }
}

impl Cacheable for AddressModel {
  fn owner(&self) -> &str {
    &self.name
  }

  fn record_id(&self) -> String {
    self.name.clone()
  }

  fn kind() -> RecordKind {
    RecordKind::Address
  }
}

/// Registration metadata for one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
  pub address: AddressName,
  pub registered: Option<DateTime<Utc>>,
  pub url: Option<String>,
}

impl Cacheable for AddressInfo {
  fn owner(&self) -> &str {
    &self.address
  }

  fn record_id(&self) -> String {
    String::new()
  }

  fn kind() -> RecordKind {
    RecordKind::Info
  }
}

/// The HTML content of an address's public page. Singleton per address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileModel {
  pub address: AddressName,
  pub content: String,
}

impl Cacheable for ProfileModel {
  fn owner(&self) -> &str {
    &self.address
  }

  fn record_id(&self) -> String {
    String::new()
  }

  fn kind() -> RecordKind {
    RecordKind::Profile
  }
}

/// An address's /now page. Singleton per address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowModel {
  pub address: AddressName,
  pub content: String,
  pub updated: Option<DateTime<Utc>>,
  pub listed: Option<bool>,
}

impl Cacheable for NowModel {
  fn owner(&self) -> &str {
    &self.address
  }

  fn record_id(&self) -> String {
    String::new()
  }

  fn kind() -> RecordKind {
    RecordKind::Now
  }
}

/// One entry in the public now garden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowListing {
  pub address: AddressName,
  pub url: String,
  pub updated: Option<DateTime<Utc>>,
}

impl Cacheable for NowListing {
  fn owner(&self) -> &str {
    &self.address
  }

  fn record_id(&self) -> String {
    self.address.clone()
  }

  fn kind() -> RecordKind {
    RecordKind::NowListing
  }
}

/// A named text paste.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasteModel {
  pub address: AddressName,
  pub title: String,
  pub content: String,
  #[serde(default)]
  pub listed: bool,
  pub updated: Option<DateTime<Utc>>,
}

impl Cacheable for PasteModel {
  fn owner(&self) -> &str {
    &self.address
  }

  fn record_id(&self) -> String {
    self.title.clone()
  }

  fn kind() -> RecordKind {
    RecordKind::Paste
  }
}

/// A persistent short link (PURL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurlModel {
  pub address: AddressName,
  pub name: String,
  pub url: String,
  #[serde(default)]
  pub listed: bool,
  pub counter: Option<u64>,
}

impl Cacheable for PurlModel {
  fn owner(&self) -> &str {
    &self.address
  }

  fn record_id(&self) -> String {
    self.name.clone()
  }

  fn kind() -> RecordKind {
    RecordKind::Purl
  }
}

/// One status post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusModel {
  pub id: String,
  pub address: AddressName,
  pub content: String,
  pub emoji: Option<String>,
  pub external_url: Option<String>,
  pub created: DateTime<Utc>,
}

impl Cacheable for StatusModel {
  fn owner(&self) -> &str {
    &self.address
  }

  fn record_id(&self) -> String {
    self.id.clone()
  }

  fn kind() -> RecordKind {
    RecordKind::Status
  }
}

/// An address's avatar image. Singleton per address.
///
/// Served from the profile image cache rather than the API host; the raw
/// bytes are kept so a client can render offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconModel {
  pub address: AddressName,
  pub data: Vec<u8>,
  pub content_type: Option<String>,
}

impl IconModel {
  /// Where an address's avatar is served from.
  pub fn url(address: &str) -> String {
    format!(
      "https://profiles.cache.lol/{}/picture",
      normalize_address(address)
    )
  }
}

impl Cacheable for IconModel {
  fn owner(&self) -> &str {
    &self.address
  }

  fn record_id(&self) -> String {
    String::new()
  }

  fn kind() -> RecordKind {
    RecordKind::Icon
  }
}

/// An address's free-text bio. Singleton per address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BioModel {
  pub address: AddressName,
  pub content: String,
}

impl Cacheable for BioModel {
  fn owner(&self) -> &str {
    &self.address
  }

  fn record_id(&self) -> String {
    String::new()
  }

  fn kind() -> RecordKind {
    RecordKind::Bio
  }
}
