//! reqwest transport for the omg.lol JSON API.
//!
//! Implements [`DataInterface`] against the public service. HTTP status
//! codes are folded into [`FetchError`] here so the fetch layer never sees
//! transport detail; for singleton resources a 404 is surfaced as
//! `Ok(None)` per the trait contract.

mod api_types;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::FetchError;
use crate::interface::{DataInterface, Result};
use crate::models::{
  normalize_address, AddressInfo, AddressName, BioModel, IconModel, NowListing, NowModel,
  PasteModel, ProfileModel, PurlModel, StatusModel,
};

use api_types::{
  ApiAccountAddress, ApiBio, ApiDirectory, ApiGarden, ApiNow, ApiPasteEnvelope, ApiPastebin,
  ApiProfile, ApiPurlEnvelope, ApiPurls, ApiStatusEnvelope, ApiStatuses, Envelope,
};

pub const DEFAULT_BASE: &str = "https://api.omg.lol";

/// Async HTTP client for the omg.lol REST API.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct Client {
  http: reqwest::Client,
  base: Url,
}

impl Client {
  pub fn new() -> std::result::Result<Self, url::ParseError> {
    Self::with_base(DEFAULT_BASE)
  }

  pub fn with_base(base: &str) -> std::result::Result<Self, url::ParseError> {
    Ok(Self {
      http: reqwest::Client::new(),
      base: Url::parse(base)?,
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base.as_str().trim_end_matches('/'), path)
  }

  fn authed(request: RequestBuilder, credential: &str) -> RequestBuilder {
    if credential.is_empty() {
      request
    } else {
      request.bearer_auth(credential)
    }
  }

  async fn read_body<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if let Some(err) = error_for_status(status) {
      return Err(err);
    }
    let envelope: Envelope<T> = response.json().await?;
    Ok(envelope.response)
  }

  /// GET that treats 404 as an absent resource.
  async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
    debug!(path, "GET");
    let response = self.http.get(self.url(path)).send().await?;
    if response.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    Self::read_body(response).await.map(Some)
  }

  async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
    debug!(path, "GET");
    let response = self.http.get(self.url(path)).send().await?;
    Self::read_body(response).await
  }

  async fn get_authed<T: DeserializeOwned>(&self, path: &str, credential: &str) -> Result<T> {
    debug!(path, "GET (authed)");
    let request = Self::authed(self.http.get(self.url(path)), credential);
    Self::read_body(request.send().await?).await
  }

  async fn post<T: DeserializeOwned>(
    &self,
    path: &str,
    body: serde_json::Value,
    credential: &str,
  ) -> Result<T> {
    debug!(path, "POST");
    let request = Self::authed(self.http.post(self.url(path)), credential).json(&body);
    Self::read_body(request.send().await?).await
  }

  async fn delete(&self, path: &str, credential: &str) -> Result<()> {
    debug!(path, "DELETE");
    let response = Self::authed(self.http.delete(self.url(path)), credential)
      .send()
      .await?;
    match error_for_status(response.status()) {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }
}

/// Merge per-address status results, newest first. One unreachable address
/// must not hide its siblings, so failed addresses are dropped; the fetch as
/// a whole fails only when every address failed.
fn merge_status_results(
  results: Vec<Result<Vec<StatusModel>>>,
) -> Result<Vec<StatusModel>> {
  let mut statuses = Vec::new();
  let mut first_error = None;
  let mut any_loaded = false;

  for result in results {
    match result {
      Ok(batch) => {
        any_loaded = true;
        statuses.extend(batch);
      }
      Err(err) => {
        first_error.get_or_insert(err);
      }
    }
  }

  match first_error {
    Some(err) if !any_loaded => Err(err),
    _ => {
      statuses.sort_by(|a, b| b.created.cmp(&a.created));
      Ok(statuses)
    }
  }
}

fn error_for_status(status: StatusCode) -> Option<FetchError> {
  if status.is_success() {
    return None;
  }
  Some(match status {
    StatusCode::NOT_FOUND => FetchError::NotFound,
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Unauthorized,
    StatusCode::CONFLICT => FetchError::Conflict(status.to_string()),
    _ => FetchError::Network(format!("unexpected status {status}")),
  })
}

#[async_trait]
impl DataInterface for Client {
  async fn fetch_address_directory(&self) -> Result<Vec<AddressName>> {
    let body: ApiDirectory = self.get("/directory").await?;
    Ok(body.directory.iter().map(|a| normalize_address(a)).collect())
  }

  async fn fetch_now_garden(&self) -> Result<Vec<NowListing>> {
    let body: ApiGarden = self.get("/now/garden").await?;
    Ok(body.garden.into_iter().map(|e| e.into_listing()).collect())
  }

  async fn fetch_address_info(&self, address: &str) -> Result<AddressInfo> {
    let address = normalize_address(address);
    let body: api_types::ApiAddressInfo = self.get(&format!("/address/{address}/info")).await?;
    Ok(body.into_info())
  }

  async fn fetch_address_bio(&self, address: &str) -> Result<Option<BioModel>> {
    let address = normalize_address(address);
    let body: Option<ApiBio> = self.get_optional(&format!("/address/{address}/bio")).await?;
    Ok(body.map(|b| b.into_bio(&address)))
  }

  async fn fetch_address_profile(&self, address: &str) -> Result<Option<ProfileModel>> {
    let address = normalize_address(address);
    let body: Option<ApiProfile> = self.get_optional(&format!("/address/{address}/web")).await?;
    Ok(body.map(|p| p.into_profile(&address)))
  }

  async fn fetch_address_now(&self, address: &str) -> Result<Option<NowModel>> {
    let address = normalize_address(address);
    let body: Option<ApiNow> = self.get_optional(&format!("/address/{address}/now")).await?;
    Ok(body.and_then(|n| n.now).map(|page| page.into_now(&address)))
  }

  async fn fetch_address_icon(&self, address: &str) -> Result<Option<IconModel>> {
    let address = normalize_address(address);
    let url = IconModel::url(&address);
    debug!(%url, "GET");
    let response = self.http.get(&url).send().await?;
    if response.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    if let Some(err) = error_for_status(response.status()) {
      return Err(err);
    }

    let content_type = response
      .headers()
      .get(reqwest::header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(String::from);
    let data = response.bytes().await?.to_vec();
    Ok(Some(IconModel {
      address,
      data,
      content_type,
    }))
  }

  async fn fetch_address_pastes(&self, address: &str) -> Result<Vec<PasteModel>> {
    let address = normalize_address(address);
    let body: ApiPastebin = self.get(&format!("/address/{address}/pastebin")).await?;
    Ok(
      body
        .pastebin
        .into_iter()
        .map(|p| p.into_paste(&address))
        .collect(),
    )
  }

  async fn fetch_paste(&self, address: &str, title: &str) -> Result<Option<PasteModel>> {
    let address = normalize_address(address);
    let body: Option<ApiPasteEnvelope> = self
      .get_optional(&format!("/address/{address}/pastebin/{title}"))
      .await?;
    Ok(body.map(|p| p.paste.into_paste(&address)))
  }

  async fn fetch_address_purls(&self, address: &str) -> Result<Vec<PurlModel>> {
    let address = normalize_address(address);
    let body: ApiPurls = self.get(&format!("/address/{address}/purls")).await?;
    Ok(
      body
        .purls
        .into_iter()
        .map(|p| p.into_purl(&address))
        .collect(),
    )
  }

  async fn fetch_purl(&self, address: &str, name: &str) -> Result<Option<PurlModel>> {
    let address = normalize_address(address);
    let body: Option<ApiPurlEnvelope> = self
      .get_optional(&format!("/address/{address}/purl/{name}"))
      .await?;
    Ok(body.map(|p| p.purl.into_purl(&address)))
  }

  async fn fetch_status_log(&self) -> Result<Vec<StatusModel>> {
    let body: ApiStatuses = self.get("/statuslog/latest").await?;
    Ok(body.statuses.into_iter().map(|s| s.into_status()).collect())
  }

  async fn fetch_address_statuses(&self, addresses: &[AddressName]) -> Result<Vec<StatusModel>> {
    let tasks = addresses.iter().map(|address| {
      let address = normalize_address(address);
      async move {
        let body: ApiStatuses = self
          .get(&format!("/address/{address}/statuses"))
          .await
          .map_err(|err| {
            debug!(%address, %err, "skipping address in status fan-out");
            err
          })?;
        Ok::<_, FetchError>(
          body
            .statuses
            .into_iter()
            .map(|s| s.into_status())
            .collect::<Vec<_>>(),
        )
      }
    });

    merge_status_results(join_all(tasks).await)
  }

  async fn fetch_status(&self, address: &str, id: &str) -> Result<Option<StatusModel>> {
    let address = normalize_address(address);
    let body: Option<ApiStatusEnvelope> = self
      .get_optional(&format!("/address/{address}/statuses/{id}"))
      .await?;
    Ok(body.map(|s| s.status.into_status()))
  }

  async fn fetch_account_addresses(&self, credential: &str) -> Result<Vec<AddressName>> {
    if credential.is_empty() {
      return Err(FetchError::Unauthorized);
    }
    let body: Vec<ApiAccountAddress> = self
      .get_authed("/account/application/addresses", credential)
      .await?;
    Ok(body.into_iter().map(|a| a.into_address().name).collect())
  }

  async fn save_profile(&self, address: &str, content: &str, credential: &str) -> Result<()> {
    let address = normalize_address(address);
    let _: serde_json::Value = self
      .post(
        &format!("/address/{address}/web"),
        json!({ "content": content }),
        credential,
      )
      .await?;
    Ok(())
  }

  async fn save_now(
    &self,
    address: &str,
    content: &str,
    listed: bool,
    credential: &str,
  ) -> Result<()> {
    let address = normalize_address(address);
    let _: serde_json::Value = self
      .post(
        &format!("/address/{address}/now"),
        json!({ "content": content, "listed": if listed { 1 } else { 0 } }),
        credential,
      )
      .await?;
    Ok(())
  }

  async fn save_paste(&self, paste: &PasteModel, credential: &str) -> Result<PasteModel> {
    let address = normalize_address(&paste.address);
    let mut body = json!({ "title": paste.title, "content": paste.content });
    if paste.listed {
      body["listed"] = json!(1);
    }
    let saved: ApiPasteEnvelope = self
      .post(&format!("/address/{address}/pastebin"), body, credential)
      .await?;
    Ok(saved.paste.into_paste(&address))
  }

  async fn delete_paste(&self, address: &str, title: &str, credential: &str) -> Result<()> {
    let address = normalize_address(address);
    self
      .delete(&format!("/address/{address}/pastebin/{title}"), credential)
      .await
  }

  async fn save_purl(&self, purl: &PurlModel, credential: &str) -> Result<PurlModel> {
    let address = normalize_address(&purl.address);
    let _: serde_json::Value = self
      .post(
        &format!("/address/{address}/purl"),
        json!({ "name": purl.name, "url": purl.url, "listed": purl.listed }),
        credential,
      )
      .await?;
    // The create endpoint echoes only a message; re-read for the canonical
    // record (counter starts server-side).
    match self.fetch_purl(&address, &purl.name).await? {
      Some(saved) => Ok(saved),
      None => Ok(purl.clone()),
    }
  }

  async fn delete_purl(&self, address: &str, name: &str, credential: &str) -> Result<()> {
    let address = normalize_address(address);
    self
      .delete(&format!("/address/{address}/purl/{name}"), credential)
      .await
  }

  async fn save_status(&self, status: &StatusModel, credential: &str) -> Result<StatusModel> {
    let address = normalize_address(&status.address);
    let mut body = json!({ "content": status.content });
    if let Some(emoji) = &status.emoji {
      body["emoji"] = json!(emoji);
    }
    if let Some(url) = &status.external_url {
      body["external_url"] = json!(url);
    }
    if !status.id.is_empty() {
      body["id"] = json!(status.id);
    }
    let saved: ApiStatusEnvelope = self
      .post(&format!("/address/{address}/statuses"), body, credential)
      .await?;
    Ok(saved.status.into_status())
  }

  async fn delete_status(&self, address: &str, id: &str, credential: &str) -> Result<()> {
    let address = normalize_address(address);
    self
      .delete(&format!("/address/{address}/statuses/{id}"), credential)
      .await
  }
}
