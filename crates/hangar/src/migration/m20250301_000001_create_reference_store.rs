//! Initial migration: reference tables, item subtype tables and the sync audit trail.

use sea_orm_migration::prelude::*;

/// Item subtype tables. They share one column layout.
const ITEM_TABLES: [&str; 5] = [
    "vehicle_components",
    "fps_weapons",
    "fps_armour",
    "fps_attachments",
    "fps_utilities",
];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_manufacturers(manager).await?;
        self.create_game_versions(manager).await?;
        self.create_vehicles(manager).await?;
        self.create_ports(manager).await?;
        for table in ITEM_TABLES {
            self.create_item_table(manager, table).await?;
        }
        self.create_paints(manager).await?;
        self.create_vehicle_loaners(manager).await?;
        self.create_sync_history(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VehicleLoaners::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PaintVehicles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Paints::Table).to_owned())
            .await?;
        for table in ITEM_TABLES.iter().rev() {
            manager
                .drop_table(Table::drop().table(Alias::new(*table)).to_owned())
                .await?;
        }
        manager
            .drop_table(Table::drop().table(Ports::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Vehicles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GameVersions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Manufacturers::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_manufacturers(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Manufacturers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Manufacturers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Manufacturers::Uuid).string().null().unique_key())
                    .col(
                        ColumnDef::new(Manufacturers::Slug)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Manufacturers::Name).string().not_null())
                    .col(ColumnDef::new(Manufacturers::Code).string().null())
                    .to_owned(),
            )
            .await
    }

    async fn create_game_versions(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GameVersions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GameVersions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GameVersions::Uuid).string().null().unique_key())
                    .col(
                        ColumnDef::new(GameVersions::Code)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(GameVersions::Channel).string().null())
                    .col(
                        ColumnDef::new(GameVersions::IsDefault)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_vehicles(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Vehicles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Vehicles::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Vehicles::Uuid).string().null())
                    .col(ColumnDef::new(Vehicles::Slug).string().not_null().unique_key())
                    .col(ColumnDef::new(Vehicles::Name).string().not_null())
                    .col(ColumnDef::new(Vehicles::ClassName).string().null())
                    // Classification
                    .col(ColumnDef::new(Vehicles::Size).string().null())
                    .col(ColumnDef::new(Vehicles::Role).string().null())
                    // Dimensions & performance
                    .col(ColumnDef::new(Vehicles::Length).double().null())
                    .col(ColumnDef::new(Vehicles::Beam).double().null())
                    .col(ColumnDef::new(Vehicles::Height).double().null())
                    .col(ColumnDef::new(Vehicles::Mass).double().null())
                    .col(ColumnDef::new(Vehicles::CargoCapacity).double().null())
                    .col(ColumnDef::new(Vehicles::CrewMin).integer().null())
                    .col(ColumnDef::new(Vehicles::CrewMax).integer().null())
                    .col(ColumnDef::new(Vehicles::ScmSpeed).double().null())
                    .col(ColumnDef::new(Vehicles::MaxSpeed).double().null())
                    // Foreign keys
                    .col(ColumnDef::new(Vehicles::ManufacturerId).uuid().null())
                    .col(ColumnDef::new(Vehicles::GameVersionId).uuid().null())
                    // Images & store
                    .col(ColumnDef::new(Vehicles::ImageUrl).text().null())
                    .col(ColumnDef::new(Vehicles::ImageSmall).text().null())
                    .col(ColumnDef::new(Vehicles::ImageMedium).text().null())
                    .col(ColumnDef::new(Vehicles::ImageLarge).text().null())
                    .col(ColumnDef::new(Vehicles::StoreUrl).text().null())
                    .col(ColumnDef::new(Vehicles::PledgePrice).double().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vehicles_manufacturer")
                            .from(Vehicles::Table, Vehicles::ManufacturerId)
                            .to(Manufacturers::Table, Manufacturers::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vehicles_game_version")
                            .from(Vehicles::Table, Vehicles::GameVersionId)
                            .to(GameVersions::Table, GameVersions::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_vehicles_manufacturer")
                    .table(Vehicles::Table)
                    .col(Vehicles::ManufacturerId)
                    .to_owned(),
            )
            .await
    }

    async fn create_ports(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Ports::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Ports::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Ports::VehicleId).uuid().not_null())
                    .col(ColumnDef::new(Ports::ParentPortId).uuid().null())
                    .col(ColumnDef::new(Ports::Path).string().not_null())
                    .col(ColumnDef::new(Ports::Name).string().not_null())
                    .col(ColumnDef::new(Ports::Category).string().null())
                    .col(ColumnDef::new(Ports::SizeMin).integer().null())
                    .col(ColumnDef::new(Ports::SizeMax).integer().null())
                    .col(ColumnDef::new(Ports::EquippedItemUuid).string().null())
                    .col(ColumnDef::new(Ports::Depth).integer().not_null().default(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ports_vehicle")
                            .from(Ports::Table, Ports::VehicleId)
                            .to(Vehicles::Table, Vehicles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ports_vehicle")
                    .table(Ports::Table)
                    .col(Ports::VehicleId)
                    .to_owned(),
            )
            .await
    }

    async fn create_item_table(
        &self,
        manager: &SchemaManager<'_>,
        table: &str,
    ) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new(table))
                    .if_not_exists()
                    .col(ColumnDef::new(Items::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Items::Uuid).string().not_null().unique_key())
                    .col(ColumnDef::new(Items::Name).string().not_null())
                    .col(ColumnDef::new(Items::ClassName).string().null())
                    .col(ColumnDef::new(Items::ItemType).string().not_null())
                    .col(ColumnDef::new(Items::SubType).string().null())
                    .col(ColumnDef::new(Items::Size).integer().null())
                    .col(ColumnDef::new(Items::Grade).string().null())
                    .col(ColumnDef::new(Items::ManufacturerId).uuid().null())
                    .col(
                        ColumnDef::new(Items::Data)
                            .json()
                            .not_null()
                            .default(Expr::cust("'{}'")),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_paints(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Paints::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Paints::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Paints::ClassName)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Paints::Name).string().not_null())
                    .col(ColumnDef::new(Paints::Slug).string().not_null())
                    .col(ColumnDef::new(Paints::Description).text().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PaintVehicles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PaintVehicles::PaintId).uuid().not_null())
                    .col(ColumnDef::new(PaintVehicles::VehicleId).uuid().not_null())
                    .primary_key(
                        Index::create()
                            .col(PaintVehicles::PaintId)
                            .col(PaintVehicles::VehicleId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_paint_vehicles_paint")
                            .from(PaintVehicles::Table, PaintVehicles::PaintId)
                            .to(Paints::Table, Paints::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_paint_vehicles_vehicle")
                            .from(PaintVehicles::Table, PaintVehicles::VehicleId)
                            .to(Vehicles::Table, Vehicles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_vehicle_loaners(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VehicleLoaners::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(VehicleLoaners::VehicleId).uuid().not_null())
                    .col(ColumnDef::new(VehicleLoaners::LoanerId).uuid().not_null())
                    .primary_key(
                        Index::create()
                            .col(VehicleLoaners::VehicleId)
                            .col(VehicleLoaners::LoanerId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vehicle_loaners_vehicle")
                            .from(VehicleLoaners::Table, VehicleLoaners::VehicleId)
                            .to(Vehicles::Table, Vehicles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vehicle_loaners_loaner")
                            .from(VehicleLoaners::Table, VehicleLoaners::LoanerId)
                            .to(Vehicles::Table, Vehicles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_sync_history(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncHistory::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncHistory::RunId).uuid().not_null())
                    .col(ColumnDef::new(SyncHistory::Source).string().not_null())
                    .col(ColumnDef::new(SyncHistory::Category).string().not_null())
                    .col(
                        ColumnDef::new(SyncHistory::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(SyncHistory::RecordCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncHistory::UnmatchedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncHistory::SkippedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SyncHistory::ErrorMessage).text().null())
                    .col(
                        ColumnDef::new(SyncHistory::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyncHistory::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Latest row per category
        manager
            .create_index(
                Index::create()
                    .name("idx_sync_history_category_started")
                    .table(SyncHistory::Table)
                    .col(SyncHistory::Category)
                    .col(SyncHistory::StartedAt)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Manufacturers {
    Table,
    Id,
    Uuid,
    Slug,
    Name,
    Code,
}

#[derive(DeriveIden)]
enum GameVersions {
    Table,
    Id,
    Uuid,
    Code,
    Channel,
    IsDefault,
}

#[derive(DeriveIden)]
enum Vehicles {
    Table,
    Id,
    Uuid,
    Slug,
    Name,
    ClassName,
    Size,
    Role,
    Length,
    Beam,
    Height,
    Mass,
    CargoCapacity,
    CrewMin,
    CrewMax,
    ScmSpeed,
    MaxSpeed,
    ManufacturerId,
    GameVersionId,
    ImageUrl,
    ImageSmall,
    ImageMedium,
    ImageLarge,
    StoreUrl,
    PledgePrice,
}

#[derive(DeriveIden)]
enum Ports {
    Table,
    Id,
    VehicleId,
    ParentPortId,
    Path,
    Name,
    Category,
    SizeMin,
    SizeMax,
    EquippedItemUuid,
    Depth,
}

/// Columns shared by every item subtype table.
#[derive(DeriveIden)]
enum Items {
    Id,
    Uuid,
    Name,
    ClassName,
    ItemType,
    SubType,
    Size,
    Grade,
    ManufacturerId,
    Data,
}

#[derive(DeriveIden)]
enum Paints {
    Table,
    Id,
    ClassName,
    Name,
    Slug,
    Description,
}

#[derive(DeriveIden)]
enum PaintVehicles {
    Table,
    PaintId,
    VehicleId,
}

#[derive(DeriveIden)]
enum VehicleLoaners {
    Table,
    VehicleId,
    LoanerId,
}

#[derive(DeriveIden)]
enum SyncHistory {
    Table,
    Id,
    RunId,
    Source,
    Category,
    Status,
    RecordCount,
    UnmatchedCount,
    SkippedCount,
    ErrorMessage,
    StartedAt,
    CompletedAt,
}
