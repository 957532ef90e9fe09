//! Hangar - reference-data synchronization and reconciliation engine.
//!
//! Pulls manufacturer, vehicle, item, paint and storefront data from several independent
//! upstreams and merges it into one relational reference store.
//!
//! # Features
//!
//! - `sqlite` / `postgres` - database backends.
//! - `migrate` - Enables database migration support. When enabled, you can use
//!   [`connect_and_migrate`] to automatically run migrations on connection.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use hangar::fetch::{ApiRateLimiter, FetchClient, RateLimitConfig};
//! use hangar::source::{WikiConfig, WikiSource};
//! use hangar::sync::{SyncEngine, SyncScope};
//!
//! let db = hangar::connect_and_migrate("sqlite://hangar.db?mode=rwc").await?;
//! let client = FetchClient::new(transport, ApiRateLimiter::new(RateLimitConfig::default()));
//!
//! let engine = SyncEngine::builder()
//!     .database(db)
//!     .source(Arc::new(WikiSource::new(client.clone(), WikiConfig::default())))
//!     .build()?;
//!
//! let report = engine.run(SyncScope::All, &cancel).await?;
//! ```

pub mod db;
pub mod dialect;
pub mod entity;
pub mod fetch;
pub mod http;
pub mod resolve;
pub mod retry;
pub mod source;
pub mod store;
pub mod sync;

#[cfg(feature = "migrate")]
pub mod migration;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use fetch::{ApiRateLimiter, FetchClient, FetchError, RateLimitConfig};
pub use source::{SourceAdapter, SourceError};
pub use store::StoreError;
pub use sync::{Category, SyncEngine, SyncError, SyncScope};
