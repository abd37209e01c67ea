//! Data-fetching and caching core for omg.lol clients.
//!
//! The crate is organized around three layers:
//!
//! - [`client`] speaks HTTP to the service and folds transport detail into
//!   the [`interface::DataInterface`] capability.
//! - [`store`] is the durable record cache (SQLite) that lets a client
//!   start offline with aged content.
//! - [`fetch`] owns orchestration: per-resource fetchers with request
//!   de-duplication and staleness, per-address composites, and the
//!   session-wide [`fetch::AddressBook`].
//!
//! Consumers construct a [`fetch::AddressBook`] from a [`config::Session`],
//! a transport, and a store, then read state snapshots or subscribe to
//! fetcher updates.

pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod interface;
pub mod models;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use client::Client;
pub use config::Session;
pub use error::FetchError;
pub use fetch::{AddressBook, AddressSummary, FetchPhase, FetchState, Fetcher, ListFetcher};
pub use interface::DataInterface;
pub use models::{normalize_address, AddressName};
pub use store::{RecordStore, SqliteStore};
