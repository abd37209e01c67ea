//! Per-kind fetcher constructors.
//!
//! Every resource kind gets its own fetcher, built here as a [`Strategy`]
//! wired into the one generic [`Fetcher`]: a fetch operation, a
//! write-through persistence step, a primed copy from the durable store,
//! and the kind's staleness threshold.

use std::sync::Arc;

use super::fetcher::{Fetcher, Strategy};
use super::list::ListFetcher;
use crate::error::FetchError;
use crate::interface::DataInterface;
use crate::models::{
  normalize_address, AddressInfo, AddressModel, AddressName, BioModel, Cacheable, IconModel,
  NowListing, NowModel, PasteModel, ProfileModel, PurlModel, RecordKind, StatusModel,
};
use crate::store::{list_key, RecordStore};

/// Reserved paste name holding an address's block list as a newline blob.
pub const BLOCK_LIST_PASTE: &str = "app.lol.blockList";
/// Reserved paste name holding an address's follow list as a newline blob.
pub const FOLLOWING_PASTE: &str = "app.lol.following";

/// The address whose block list applies globally.
pub const GLOBAL_BLOCK_ADDRESS: &str = "app";

/// Parse the newline-delimited address-list blob convention.
pub fn parse_address_list(blob: &str) -> Vec<AddressModel> {
  blob
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .map(AddressModel::new)
    .collect()
}

/// Serialize a collection back into the newline-delimited blob convention.
pub fn join_address_list(items: &[AddressModel]) -> String {
  items
    .iter()
    .map(|item| item.name.as_str())
    .collect::<Vec<_>>()
    .join("\n")
}

fn prime_record<T: Cacheable, S: RecordStore>(
  store: &Arc<S>,
  owner: &str,
  id: &str,
) -> Option<(T, chrono::DateTime<chrono::Utc>)> {
  store
    .read::<T>(owner, id)
    .ok()
    .flatten()
    .map(|stored| (stored.record, stored.cached_at))
}

fn prime_list<T: Cacheable, S: RecordStore>(
  store: &Arc<S>,
  key: &str,
) -> Option<(Vec<T>, chrono::DateTime<chrono::Utc>)> {
  store
    .read_list::<T>(key)
    .ok()
    .flatten()
    .map(|stored| (stored.records, stored.cached_at))
}

/// Lists treat a missing remote resource as empty, not as a failure.
fn absent_as_empty<T>(result: Result<Vec<T>, FetchError>) -> Result<Option<Vec<T>>, FetchError> {
  match result {
    Ok(records) => Ok(Some(records)),
    Err(FetchError::NotFound) => Ok(Some(Vec::new())),
    Err(err) => Err(err),
  }
}

fn persist_list<T: Cacheable, S: RecordStore>(
  store: Arc<S>,
  key: String,
) -> impl Fn(&Vec<T>) -> Result<(), FetchError> + Send + Sync + 'static {
  move |records: &Vec<T>| store.write_list(&key, records).map_err(FetchError::from)
}

pub fn info_fetcher<S: RecordStore>(
  interface: &Arc<dyn DataInterface>,
  store: &Arc<S>,
  address: &str,
) -> Fetcher<AddressInfo> {
  let address = normalize_address(address);
  let iface = Arc::clone(interface);
  let addr = address.clone();
  let strategy = Strategy::new(RecordKind::Info.stale_after(), move || {
    let iface = Arc::clone(&iface);
    let addr = addr.clone();
    async move { iface.fetch_address_info(&addr).await.map(Some) }
  })
  .persist({
    let store = Arc::clone(store);
    move |info: &AddressInfo| store.write(info).map_err(FetchError::from)
  })
  .prime(prime_record(store, &address, ""));

  Fetcher::with_strategy(format!("info:{address}"), strategy)
}

pub fn profile_fetcher<S: RecordStore>(
  interface: &Arc<dyn DataInterface>,
  store: &Arc<S>,
  address: &str,
) -> Fetcher<ProfileModel> {
  let address = normalize_address(address);
  let iface = Arc::clone(interface);
  let addr = address.clone();
  let strategy = Strategy::new(RecordKind::Profile.stale_after(), move || {
    let iface = Arc::clone(&iface);
    let addr = addr.clone();
    async move { iface.fetch_address_profile(&addr).await }
  })
  .persist({
    let store = Arc::clone(store);
    move |profile: &ProfileModel| store.write(profile).map_err(FetchError::from)
  })
  .prime(prime_record(store, &address, ""));

  Fetcher::with_strategy(format!("profile:{address}"), strategy)
}

pub fn now_fetcher<S: RecordStore>(
  interface: &Arc<dyn DataInterface>,
  store: &Arc<S>,
  address: &str,
) -> Fetcher<NowModel> {
  let address = normalize_address(address);
  let iface = Arc::clone(interface);
  let addr = address.clone();
  let strategy = Strategy::new(RecordKind::Now.stale_after(), move || {
    let iface = Arc::clone(&iface);
    let addr = addr.clone();
    async move { iface.fetch_address_now(&addr).await }
  })
  .persist({
    let store = Arc::clone(store);
    move |now: &NowModel| store.write(now).map_err(FetchError::from)
  })
  .prime(prime_record(store, &address, ""));

  Fetcher::with_strategy(format!("now:{address}"), strategy)
}

pub fn bio_fetcher<S: RecordStore>(
  interface: &Arc<dyn DataInterface>,
  store: &Arc<S>,
  address: &str,
) -> Fetcher<BioModel> {
  let address = normalize_address(address);
  let iface = Arc::clone(interface);
  let addr = address.clone();
  let strategy = Strategy::new(RecordKind::Bio.stale_after(), move || {
    let iface = Arc::clone(&iface);
    let addr = addr.clone();
    async move { iface.fetch_address_bio(&addr).await }
  })
  .persist({
    let store = Arc::clone(store);
    move |bio: &BioModel| store.write(bio).map_err(FetchError::from)
  })
  .prime(prime_record(store, &address, ""));

  Fetcher::with_strategy(format!("bio:{address}"), strategy)
}

pub fn icon_fetcher<S: RecordStore>(
  interface: &Arc<dyn DataInterface>,
  store: &Arc<S>,
  address: &str,
) -> Fetcher<IconModel> {
  let address = normalize_address(address);
  let iface = Arc::clone(interface);
  let addr = address.clone();
  let strategy = Strategy::new(RecordKind::Icon.stale_after(), move || {
    let iface = Arc::clone(&iface);
    let addr = addr.clone();
    async move { iface.fetch_address_icon(&addr).await }
  })
  .persist({
    let store = Arc::clone(store);
    move |icon: &IconModel| store.write(icon).map_err(FetchError::from)
  })
  .prime(prime_record(store, &address, ""));

  Fetcher::with_strategy(format!("icon:{address}"), strategy)
}

pub fn pastes_fetcher<S: RecordStore>(
  interface: &Arc<dyn DataInterface>,
  store: &Arc<S>,
  address: &str,
) -> ListFetcher<PasteModel> {
  let address = normalize_address(address);
  let key = list_key(&format!("pastes:{address}"));
  let iface = Arc::clone(interface);
  let addr = address.clone();
  let strategy = Strategy::new(RecordKind::Paste.stale_after(), move || {
    let iface = Arc::clone(&iface);
    let addr = addr.clone();
    async move { absent_as_empty(iface.fetch_address_pastes(&addr).await) }
  })
  .persist(persist_list(Arc::clone(store), key.clone()))
  .prime(prime_list(store, &key));

  ListFetcher::new(Fetcher::with_strategy(format!("pastes:{address}"), strategy))
}

pub fn purls_fetcher<S: RecordStore>(
  interface: &Arc<dyn DataInterface>,
  store: &Arc<S>,
  address: &str,
) -> ListFetcher<PurlModel> {
  let address = normalize_address(address);
  let key = list_key(&format!("purls:{address}"));
  let iface = Arc::clone(interface);
  let addr = address.clone();
  let strategy = Strategy::new(RecordKind::Purl.stale_after(), move || {
    let iface = Arc::clone(&iface);
    let addr = addr.clone();
    async move { absent_as_empty(iface.fetch_address_purls(&addr).await) }
  })
  .persist(persist_list(Arc::clone(store), key.clone()))
  .prime(prime_list(store, &key));

  ListFetcher::new(Fetcher::with_strategy(format!("purls:{address}"), strategy))
}

/// Statuses for one or more addresses; an empty slice means the global log.
pub fn statuses_fetcher<S: RecordStore>(
  interface: &Arc<dyn DataInterface>,
  store: &Arc<S>,
  addresses: &[AddressName],
) -> ListFetcher<StatusModel> {
  let addresses: Vec<AddressName> = addresses.iter().map(|a| normalize_address(a)).collect();
  let descriptor = if addresses.is_empty() {
    "statuslog".to_string()
  } else {
    format!("statuses:{}", addresses.join(","))
  };
  let key = list_key(&descriptor);
  let iface = Arc::clone(interface);
  let addrs = addresses.clone();
  let strategy = Strategy::new(RecordKind::Status.stale_after(), move || {
    let iface = Arc::clone(&iface);
    let addrs = addrs.clone();
    async move {
      let result = if addrs.is_empty() {
        iface.fetch_status_log().await
      } else {
        iface.fetch_address_statuses(&addrs).await
      };
      absent_as_empty(result)
    }
  })
  .persist(persist_list(Arc::clone(store), key.clone()))
  .prime(prime_list(store, &key));

  ListFetcher::new(Fetcher::with_strategy(descriptor, strategy))
}

pub fn directory_fetcher<S: RecordStore>(
  interface: &Arc<dyn DataInterface>,
  store: &Arc<S>,
) -> ListFetcher<AddressModel> {
  let key = list_key("directory");
  let iface = Arc::clone(interface);
  let strategy = Strategy::new(RecordKind::Address.stale_after(), move || {
    let iface = Arc::clone(&iface);
    async move {
      let names = iface.fetch_address_directory().await?;
      Ok(Some(
        names.iter().map(|name| AddressModel::new(name)).collect(),
      ))
    }
  })
  .persist(persist_list(Arc::clone(store), key.clone()))
  .prime(prime_list(store, &key));

  ListFetcher::new(Fetcher::with_strategy("directory", strategy))
}

pub fn garden_fetcher<S: RecordStore>(
  interface: &Arc<dyn DataInterface>,
  store: &Arc<S>,
) -> ListFetcher<NowListing> {
  let key = list_key("garden");
  let iface = Arc::clone(interface);
  let strategy = Strategy::new(RecordKind::NowListing.stale_after(), move || {
    let iface = Arc::clone(&iface);
    async move { absent_as_empty(iface.fetch_now_garden().await) }
  })
  .persist(persist_list(Arc::clone(store), key.clone()))
  .prime(prime_list(store, &key));

  ListFetcher::new(Fetcher::with_strategy("garden", strategy))
}

/// Addresses owned by the signed-in account. An empty credential loads an
/// empty collection without touching the network.
pub fn account_addresses_fetcher<S: RecordStore>(
  interface: &Arc<dyn DataInterface>,
  store: &Arc<S>,
  credential: &str,
) -> ListFetcher<AddressModel> {
  let key = list_key(&format!("account:{credential}"));
  let iface = Arc::clone(interface);
  let credential = credential.to_string();
  let cred = credential.clone();
  let strategy = Strategy::new(RecordKind::Address.stale_after(), move || {
    let iface = Arc::clone(&iface);
    let cred = cred.clone();
    async move {
      if cred.is_empty() {
        return Ok(Some(Vec::new()));
      }
      let names = iface.fetch_account_addresses(&cred).await?;
      Ok(Some(
        names.iter().map(|name| AddressModel::new(name)).collect(),
      ))
    }
  })
  .persist(persist_list(Arc::clone(store), key.clone()))
  .prime(prime_list(store, &key));

  ListFetcher::new(Fetcher::with_strategy("account-addresses", strategy))
}

/// An address's follow list, stored remotely as the reserved
/// `app.lol.following` paste. Mutable when a credential is supplied.
pub fn following_fetcher<S: RecordStore>(
  interface: &Arc<dyn DataInterface>,
  store: &Arc<S>,
  address: &str,
  credential: Option<&str>,
) -> ListFetcher<AddressModel> {
  address_list_paste_fetcher(interface, store, address, FOLLOWING_PASTE, credential)
}

/// An address's block list, stored remotely as the reserved
/// `app.lol.blockList` paste. Mutable when a credential is supplied.
pub fn block_list_fetcher<S: RecordStore>(
  interface: &Arc<dyn DataInterface>,
  store: &Arc<S>,
  address: &str,
  credential: Option<&str>,
) -> ListFetcher<AddressModel> {
  address_list_paste_fetcher(interface, store, address, BLOCK_LIST_PASTE, credential)
}

fn address_list_paste_fetcher<S: RecordStore>(
  interface: &Arc<dyn DataInterface>,
  store: &Arc<S>,
  address: &str,
  paste_name: &'static str,
  credential: Option<&str>,
) -> ListFetcher<AddressModel> {
  let address = normalize_address(address);
  let key = list_key(&format!("{paste_name}:{address}"));
  let iface = Arc::clone(interface);
  let addr = address.clone();
  let strategy = Strategy::new(RecordKind::Address.stale_after(), move || {
    let iface = Arc::clone(&iface);
    let addr = addr.clone();
    async move {
      let paste = iface.fetch_paste(&addr, paste_name).await?;
      let items = paste
        .map(|p| parse_address_list(&p.content))
        .unwrap_or_default();
      Ok(Some(items))
    }
  })
  .persist(persist_list(Arc::clone(store), key.clone()))
  .prime(prime_list(store, &key));

  let list = ListFetcher::new(Fetcher::with_strategy(
    format!("{paste_name}:{address}"),
    strategy,
  ));

  match credential {
    Some(credential) if !credential.is_empty() => {
      let iface = Arc::clone(interface);
      let credential = credential.to_string();
      list.with_remote_save(move |items: Vec<AddressModel>| {
        let iface = Arc::clone(&iface);
        let credential = credential.clone();
        let address = address.clone();
        async move {
          let paste = PasteModel {
            address,
            title: paste_name.to_string(),
            content: join_address_list(&items),
            listed: false,
            updated: None,
          };
          iface.save_paste(&paste, &credential).await.map(|_| ())
        }
      })
    }
    _ => list,
  }
}

/// A purely local list (pinned addresses, local block list): loads from and
/// persists to the durable store only, seeded from the session on first use.
pub fn local_list_fetcher<S: RecordStore>(
  store: &Arc<S>,
  name: &str,
  initial: &[AddressName],
) -> ListFetcher<AddressModel> {
  let key = list_key(&format!("local:{name}"));
  let seeded: Vec<AddressModel> = initial
    .iter()
    .map(|name| AddressModel::new(name))
    .collect();
  let primed = prime_list(store, &key).or_else(|| {
    if seeded.is_empty() {
      None
    } else {
      Some((seeded.clone(), chrono::Utc::now()))
    }
  });

  let read_store = Arc::clone(store);
  let read_key = key.clone();
  let fallback = seeded.clone();
  let strategy = Strategy::new(RecordKind::Address.stale_after(), move || {
    let store = Arc::clone(&read_store);
    let key = read_key.clone();
    let fallback = fallback.clone();
    async move {
      let stored = store
        .read_list::<AddressModel>(&key)
        .map_err(FetchError::from)?;
      Ok(Some(
        stored.map(|list| list.records).unwrap_or(fallback),
      ))
    }
  })
  .persist(persist_list(Arc::clone(store), key))
  .prime(primed);

  ListFetcher::new(Fetcher::with_strategy(format!("local:{name}"), strategy))
}

/// Detail fetcher for one paste.
pub fn paste_fetcher<S: RecordStore>(
  interface: &Arc<dyn DataInterface>,
  store: &Arc<S>,
  address: &str,
  title: &str,
) -> Fetcher<PasteModel> {
  let address = normalize_address(address);
  let title = title.to_string();
  let iface = Arc::clone(interface);
  let addr = address.clone();
  let fetch_title = title.clone();
  let strategy = Strategy::new(RecordKind::Paste.stale_after(), move || {
    let iface = Arc::clone(&iface);
    let addr = addr.clone();
    let title = fetch_title.clone();
    async move { iface.fetch_paste(&addr, &title).await }
  })
  .persist({
    let store = Arc::clone(store);
    move |paste: &PasteModel| store.write(paste).map_err(FetchError::from)
  })
  .prime(prime_record(store, &address, &title));

  Fetcher::with_strategy(format!("paste:{address}/{title}"), strategy)
}

/// Detail fetcher for one PURL.
pub fn purl_fetcher<S: RecordStore>(
  interface: &Arc<dyn DataInterface>,
  store: &Arc<S>,
  address: &str,
  name: &str,
) -> Fetcher<PurlModel> {
  let address = normalize_address(address);
  let name = name.to_string();
  let iface = Arc::clone(interface);
  let addr = address.clone();
  let fetch_name = name.clone();
  let strategy = Strategy::new(RecordKind::Purl.stale_after(), move || {
    let iface = Arc::clone(&iface);
    let addr = addr.clone();
    let name = fetch_name.clone();
    async move { iface.fetch_purl(&addr, &name).await }
  })
  .persist({
    let store = Arc::clone(store);
    move |purl: &PurlModel| store.write(purl).map_err(FetchError::from)
  })
  .prime(prime_record(store, &address, &name));

  Fetcher::with_strategy(format!("purl:{address}/{name}"), strategy)
}

/// Detail fetcher for one status.
pub fn status_fetcher<S: RecordStore>(
  interface: &Arc<dyn DataInterface>,
  store: &Arc<S>,
  address: &str,
  id: &str,
) -> Fetcher<StatusModel> {
  let address = normalize_address(address);
  let id = id.to_string();
  let iface = Arc::clone(interface);
  let addr = address.clone();
  let fetch_id = id.clone();
  let strategy = Strategy::new(RecordKind::Status.stale_after(), move || {
    let iface = Arc::clone(&iface);
    let addr = addr.clone();
    let id = fetch_id.clone();
    async move { iface.fetch_status(&addr, &id).await }
  })
  .persist({
    let store = Arc::clone(store);
    move |status: &StatusModel| store.write(status).map_err(FetchError::from)
  })
  .prime(prime_record(store, &address, &id));

  Fetcher::with_strategy(format!("status:{address}/{id}"), strategy)
}
