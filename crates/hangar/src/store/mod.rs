//! Reference store writes and audit queries.
//!
//! Records arrive from source adapters and are written one category at a time by
//! [`StoreWriter`]. Lookups, batching and the audit trail live in their own modules.

mod errors;
pub mod history;
mod items;
mod lookup;
mod replace;
mod writer;

pub use errors::{Result, StoreError};
pub use items::{ITEM_TABLES, ItemRouter, ItemWrite, write_items};
pub use lookup::{GameVersionIndex, ManufacturerIndex, PaintIndex, VehicleIndex};
pub use replace::{insert_batches, replace_children, scoped_replace, upsert_batches};
pub use writer::StoreWriter;
