//! The remote transport capability consumed by the fetch layer.
//!
//! Fetchers only ever talk to the service through this trait, so tests (and
//! alternative transports) can inject their own implementation. The reqwest
//! implementation lives in [`crate::client`].

use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::{
  AddressInfo, AddressName, BioModel, IconModel, NowListing, NowModel, PasteModel, ProfileModel,
  PurlModel, StatusModel,
};

/// An account API token. Empty string means signed out.
pub type ApiCredential = String;

pub type Result<T> = std::result::Result<T, FetchError>;

/// Named remote operations against the publishing service.
///
/// Singleton resources return `Ok(None)` when the remote reports the
/// resource absent; that is a valid loaded-empty state, not a failure.
#[async_trait]
pub trait DataInterface: Send + Sync + 'static {
  async fn fetch_address_directory(&self) -> Result<Vec<AddressName>>;
  async fn fetch_now_garden(&self) -> Result<Vec<NowListing>>;
  async fn fetch_address_info(&self, address: &str) -> Result<AddressInfo>;
  async fn fetch_address_bio(&self, address: &str) -> Result<Option<BioModel>>;
  async fn fetch_address_profile(&self, address: &str) -> Result<Option<ProfileModel>>;
  async fn fetch_address_now(&self, address: &str) -> Result<Option<NowModel>>;
  async fn fetch_address_icon(&self, address: &str) -> Result<Option<IconModel>>;

  async fn fetch_address_pastes(&self, address: &str) -> Result<Vec<PasteModel>>;
  async fn fetch_paste(&self, address: &str, title: &str) -> Result<Option<PasteModel>>;
  async fn fetch_address_purls(&self, address: &str) -> Result<Vec<PurlModel>>;
  async fn fetch_purl(&self, address: &str, name: &str) -> Result<Option<PurlModel>>;

  /// The global public status log.
  async fn fetch_status_log(&self) -> Result<Vec<StatusModel>>;
  /// Statuses for a set of addresses, newest first.
  async fn fetch_address_statuses(&self, addresses: &[AddressName]) -> Result<Vec<StatusModel>>;
  async fn fetch_status(&self, address: &str, id: &str) -> Result<Option<StatusModel>>;

  /// Addresses owned by the account behind `credential`.
  async fn fetch_account_addresses(&self, credential: &str) -> Result<Vec<AddressName>>;

  async fn save_profile(&self, address: &str, content: &str, credential: &str) -> Result<()>;
  async fn save_now(
    &self,
    address: &str,
    content: &str,
    listed: bool,
    credential: &str,
  ) -> Result<()>;

  async fn save_paste(&self, paste: &PasteModel, credential: &str) -> Result<PasteModel>;
  async fn delete_paste(&self, address: &str, title: &str, credential: &str) -> Result<()>;

  async fn save_purl(&self, purl: &PurlModel, credential: &str) -> Result<PurlModel>;
  async fn delete_purl(&self, address: &str, name: &str, credential: &str) -> Result<()>;

  async fn save_status(&self, status: &StatusModel, credential: &str) -> Result<StatusModel>;
  async fn delete_status(&self, address: &str, id: &str, credential: &str) -> Result<()>;
}
