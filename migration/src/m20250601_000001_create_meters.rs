//! Migration to create the meters table for picked and installed meters

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Meters::Table)
                    .if_not_exists()
                    .col(pk_uuid(Meters::Id))
                    .col(string_null(Meters::Ca))
                    .col(string(Meters::PeaNoNew).not_null())
                    .col(string_null(Meters::PeaNoOld))
                    .col(string(Meters::PickerName).not_null())
                    .col(timestamp_with_time_zone(Meters::PickerDate).not_null())
                    .col(string_null(Meters::InstallationName))
                    .col(timestamp_with_time_zone_null(Meters::InstallationDate))
                    .col(string_null(Meters::InstallationLocation))
                    .col(decimal_len_null(Meters::UnitOld, 14, 2))
                    .col(decimal_len_null(Meters::UnitNew, 14, 2))
                    .col(string_null(Meters::NewMeterImageId))
                    .col(string_null(Meters::NewMeterImageUrl))
                    .col(string_null(Meters::OldMeterImageId))
                    .col(string_null(Meters::OldMeterImageUrl))
                    .col(timestamp_with_time_zone(Meters::CreatedAt).default(Expr::current_timestamp()))
                    .col(timestamp_with_time_zone(Meters::UpdatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        // List views always sort by picker date
        manager
            .create_index(
                Index::create()
                    .name("idx_meters_picker_date")
                    .table(Meters::Table)
                    .col(Meters::PickerDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_meters_installation_date")
                    .table(Meters::Table)
                    .col(Meters::InstallationDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Meters::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Meters {
    Table,
    Id,
    Ca,
    PeaNoNew,
    PeaNoOld,
    PickerName,
    PickerDate,
    InstallationName,
    InstallationDate,
    InstallationLocation,
    UnitOld,
    UnitNew,
    NewMeterImageId,
    NewMeterImageUrl,
    OldMeterImageId,
    OldMeterImageUrl,
    CreatedAt,
    UpdatedAt,
}
