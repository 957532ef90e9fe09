//! Source adapters.
//!
//! One adapter per upstream. Each fetches through the shared [`FetchClient`](crate::fetch::FetchClient)
//! and turns upstream payloads into the intermediate records in [`types`].

mod error;
pub mod git_corpus;
pub mod graphql;
pub mod images;
pub mod ports;
pub mod rest;
pub mod types;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::sync::Category;

pub use error::{Result, SourceError};
pub use git_corpus::{CorpusConfig, CorpusSource};
pub use graphql::{StoreConfig, StorefrontSource, image_variants};
pub use images::{LegacyConfig, LegacyImageSource};
pub use ports::{MAX_PORT_DEPTH, PortArena, PortNode};
pub use rest::{WikiConfig, WikiSource};
pub use types::{
    CategoryRecords, FetchedCategory, GameVersionRecord, GameVersionRef, ImageRecord, ImageSet,
    ItemRecord, LoanerRecord, ManufacturerRecord, ManufacturerRef, PaintRecord,
    StoreListingRecord, VehicleRecord,
};

/// An upstream that can produce records for one or more categories.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Short name recorded in the audit trail.
    fn name(&self) -> &'static str;

    /// Categories this adapter serves.
    fn categories(&self) -> &'static [Category];

    /// Fetch every record of `category`.
    ///
    /// Malformed records are skipped and counted in [`FetchedCategory::skipped`]; a failed
    /// request fails the whole category.
    async fn fetch_category(
        &self,
        category: Category,
        cancel: &CancellationToken,
    ) -> Result<FetchedCategory>;
}
