//! Provider contract and provider bookkeeping.
//!
//! A provider is an external data source (tracker, indexer, debrid API) queried
//! once per request partition. The core only sees it through the [`Provider`]
//! trait, keyed by a normalized [`ProviderId`].

mod class;
mod identity;
mod jackett;
mod registry;
mod types;

pub use class::{ProviderClass, ProviderClassTable, TimeoutBounds};
pub use identity::ProviderId;
pub use jackett::{jackett_providers, JackettProvider};
pub use registry::{ProviderNotFound, ProviderRegistry, ProviderStatus};
pub use types::*;
