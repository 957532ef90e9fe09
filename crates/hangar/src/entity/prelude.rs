//! Common re-exports for convenient entity usage.

pub use super::game_version::{
    ActiveModel as GameVersionActiveModel, Column as GameVersionColumn, Entity as GameVersion,
    Model as GameVersionModel,
};
pub use super::manufacturer::{
    ActiveModel as ManufacturerActiveModel, Column as ManufacturerColumn, Entity as Manufacturer,
    Model as ManufacturerModel,
};
pub use super::paint::{
    ActiveModel as PaintActiveModel, Column as PaintColumn, Entity as Paint, Model as PaintModel,
};
pub use super::paint_vehicle::{
    ActiveModel as PaintVehicleActiveModel, Column as PaintVehicleColumn, Entity as PaintVehicle,
    Model as PaintVehicleModel,
};
pub use super::port::{
    ActiveModel as PortActiveModel, Column as PortColumn, Entity as Port, Model as PortModel,
};
pub use super::sync_history::{
    ActiveModel as SyncHistoryActiveModel, Column as SyncHistoryColumn, Entity as SyncHistory,
    Model as SyncHistoryModel,
};
pub use super::sync_status::SyncStatus;
pub use super::vehicle::{
    ActiveModel as VehicleActiveModel, Column as VehicleColumn, Entity as Vehicle,
    Model as VehicleModel,
};
pub use super::vehicle_loaner::{
    ActiveModel as VehicleLoanerActiveModel, Column as VehicleLoanerColumn,
    Entity as VehicleLoaner, Model as VehicleLoanerModel,
};
