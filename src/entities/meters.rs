//! `SeaORM` Entity for meters table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "meters")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub ca: Option<String>,
    pub pea_no_new: String,
    pub pea_no_old: Option<String>,
    pub picker_name: String,
    pub picker_date: DateTimeWithTimeZone,
    pub installation_name: Option<String>,
    pub installation_date: Option<DateTimeWithTimeZone>,
    pub installation_location: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((14, 2)))", nullable)]
    pub unit_old: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((14, 2)))", nullable)]
    pub unit_new: Option<Decimal>,
    pub new_meter_image_id: Option<String>,
    pub new_meter_image_url: Option<String>,
    pub old_meter_image_id: Option<String>,
    pub old_meter_image_url: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
