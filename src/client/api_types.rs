//! Serde-deserializable types matching omg.lol API responses.
//!
//! These types are separate from domain records to allow clean
//! deserialization while keeping the records focused on application needs.
//! Every service response wraps its payload in a `{request, response}`
//! envelope; only the `response` half carries data we use.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::models::{
  normalize_address, AddressInfo, AddressModel, BioModel, NowListing, NowModel, PasteModel,
  ProfileModel, PurlModel, StatusModel,
};

/// The `{request, response}` wrapper around every payload.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
  pub response: T,
}

/// Timestamps arrive as `{"unix_epoch_time": "1700000000"}`, with the
/// epoch seconds sometimes a string and sometimes a number.
#[derive(Debug, Deserialize)]
pub struct ApiTimestamp {
  #[serde(default)]
  pub unix_epoch_time: Option<serde_json::Value>,
}

impl ApiTimestamp {
  pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
    let seconds = match self.unix_epoch_time.as_ref()? {
      serde_json::Value::String(s) => s.parse::<i64>().ok()?,
      serde_json::Value::Number(n) => n.as_i64()?,
      _ => return None,
    };
    Utc.timestamp_opt(seconds, 0).single()
  }
}

fn parse_epoch(value: &Option<serde_json::Value>) -> Option<DateTime<Utc>> {
  ApiTimestamp {
    unix_epoch_time: value.clone(),
  }
  .to_datetime()
}

// ============================================================================
// Directory and garden
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiDirectory {
  #[serde(default)]
  pub directory: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiGardenEntry {
  pub address: String,
  #[serde(default)]
  pub url: Option<String>,
  pub updated: Option<ApiTimestamp>,
}

#[derive(Debug, Deserialize)]
pub struct ApiGarden {
  #[serde(default)]
  pub garden: Vec<ApiGardenEntry>,
}

impl ApiGardenEntry {
  pub fn into_listing(self) -> NowListing {
    let address = normalize_address(&self.address);
    let url = self
      .url
      .unwrap_or_else(|| format!("https://{address}.omg.lol/now"));
    NowListing {
      updated: self.updated.as_ref().and_then(ApiTimestamp::to_datetime),
      address,
      url,
    }
  }
}

// ============================================================================
// Per-address singletons
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiAddressInfo {
  pub address: String,
  pub registration: Option<ApiTimestamp>,
  #[serde(default)]
  pub url: Option<String>,
}

impl ApiAddressInfo {
  pub fn into_info(self) -> AddressInfo {
    AddressInfo {
      address: normalize_address(&self.address),
      registered: self.registration.as_ref().and_then(ApiTimestamp::to_datetime),
      url: self.url,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiBio {
  #[serde(default)]
  pub bio: String,
}

impl ApiBio {
  pub fn into_bio(self, address: &str) -> BioModel {
    BioModel {
      address: normalize_address(address),
      content: self.bio,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiProfile {
  #[serde(default)]
  pub content: String,
}

impl ApiProfile {
  pub fn into_profile(self, address: &str) -> ProfileModel {
    ProfileModel {
      address: normalize_address(address),
      content: self.content,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiNowPage {
  #[serde(default)]
  pub content: String,
  pub updated: Option<serde_json::Value>,
  #[serde(default)]
  pub listed: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ApiNow {
  pub now: Option<ApiNowPage>,
}

impl ApiNowPage {
  pub fn into_now(self, address: &str) -> NowModel {
    // `listed` arrives as 0/1, "0"/"1", or a bool depending on endpoint
    // vintage.
    let listed = self.listed.as_ref().map(|v| match v {
      serde_json::Value::Bool(b) => *b,
      serde_json::Value::Number(n) => n.as_i64() == Some(1),
      serde_json::Value::String(s) => s == "1",
      _ => false,
    });
    NowModel {
      address: normalize_address(address),
      content: self.content,
      updated: parse_epoch(&self.updated),
      listed,
    }
  }
}

// ============================================================================
// Pastes, PURLs, statuses
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiPaste {
  pub title: String,
  #[serde(default)]
  pub content: String,
  #[serde(default)]
  pub modified_on: Option<serde_json::Value>,
  #[serde(default)]
  pub listed: Option<serde_json::Value>,
}

impl ApiPaste {
  pub fn into_paste(self, address: &str) -> PasteModel {
    PasteModel {
      address: normalize_address(address),
      title: self.title,
      content: self.content,
      // Absence of the `listed` field means unlisted.
      listed: self.listed.is_some(),
      updated: parse_epoch(&self.modified_on),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiPastebin {
  #[serde(default)]
  pub pastebin: Vec<ApiPaste>,
}

#[derive(Debug, Deserialize)]
pub struct ApiPasteEnvelope {
  pub paste: ApiPaste,
}

#[derive(Debug, Deserialize)]
pub struct ApiPurl {
  pub name: String,
  #[serde(default)]
  pub url: String,
  #[serde(default)]
  pub counter: Option<u64>,
  #[serde(default)]
  pub listed: Option<serde_json::Value>,
}

impl ApiPurl {
  pub fn into_purl(self, address: &str) -> PurlModel {
    PurlModel {
      address: normalize_address(address),
      name: self.name,
      url: self.url,
      listed: self.listed.is_some(),
      counter: self.counter,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiPurls {
  #[serde(default)]
  pub purls: Vec<ApiPurl>,
}

#[derive(Debug, Deserialize)]
pub struct ApiPurlEnvelope {
  pub purl: ApiPurl,
}

#[derive(Debug, Deserialize)]
pub struct ApiStatus {
  pub id: String,
  pub address: String,
  #[serde(default)]
  pub content: String,
  #[serde(default)]
  pub emoji: Option<String>,
  #[serde(default)]
  pub external_url: Option<String>,
  #[serde(default)]
  pub created: Option<serde_json::Value>,
}

impl ApiStatus {
  pub fn into_status(self) -> StatusModel {
    StatusModel {
      id: self.id,
      address: normalize_address(&self.address),
      content: self.content,
      emoji: self.emoji.filter(|e| !e.is_empty()),
      external_url: self.external_url.filter(|u| !u.is_empty()),
      created: parse_epoch(&self.created).unwrap_or_else(Utc::now),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiStatuses {
  #[serde(default)]
  pub statuses: Vec<ApiStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ApiStatusEnvelope {
  pub status: ApiStatus,
}

// ============================================================================
// Account
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiAccountAddress {
  pub address: String,
  pub registration: Option<ApiTimestamp>,
}

impl ApiAccountAddress {
  pub fn into_address(self) -> AddressModel {
    AddressModel {
      name: normalize_address(&self.address),
      registered: self.registration.as_ref().and_then(ApiTimestamp::to_datetime),
    }
  }
}
