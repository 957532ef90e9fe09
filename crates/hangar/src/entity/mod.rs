//! SeaORM entity definitions for the reference store.
//!
//! Item subtype tables (`vehicle_components`, `fps_weapons`, ...) share one column layout
//! and are addressed by name through [`crate::store::ItemRouter`] instead of entities.

pub mod game_version;
pub mod manufacturer;
pub mod paint;
pub mod paint_vehicle;
pub mod port;
pub mod prelude;
pub mod sync_history;
pub mod sync_status;
pub mod vehicle;
pub mod vehicle_loaner;
