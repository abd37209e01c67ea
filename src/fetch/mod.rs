//! Fetch orchestration: single-record and list fetchers with request
//! de-duplication, per-address composites, and the session-wide address
//! book that owns them.
//!
//! Every piece of remote state is owned by exactly one [`Fetcher`] (or
//! [`ListFetcher`]). Consumers observe state through cheap snapshot reads
//! or a [`tokio::sync::watch`] subscription and trigger refreshes with
//! `update_if_needed`; they never mutate fetcher state directly.

mod address_book;
mod fetcher;
pub mod kinds;
mod list;
mod state;
mod summary;

pub use address_book::AddressBook;
pub use fetcher::{Fetcher, Strategy};
pub use list::ListFetcher;
pub use state::{FetchPhase, FetchState};
pub use summary::AddressSummary;
