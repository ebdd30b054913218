//! Request sync core.
//!
//! Requests are fetched per category, bucketed by status and kept in a
//! single store. Fetches are throttled and cancellable per category,
//! refreshed in the background by a polling scheduler, and selectively
//! refetched after mutations.

mod cancel;
mod categorizer;
mod category;
mod controller;
mod invalidation;
mod notify;
mod orchestrator;
mod polling;
mod store;
mod throttle;

#[cfg(test)]
pub mod testing;

pub use category::Category;
pub use controller::{SyncController, SyncSnapshot};
pub use notify::{Notice, Notifier};
pub use polling::Visibility;
