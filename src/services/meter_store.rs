//! Meter record persistence
//!
//! [`MeterStore`] is the query interface the service layer talks to: it
//! accepts a [`MeterPredicate`] and returns a page of records plus the
//! total count for the same predicate.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, SqlErr,
};
use uuid::Uuid;

use crate::entities::meters::{self, Entity as Meters};
use crate::services::meter_filter::MeterPredicate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Database(String),
    Conflict(String),
    NotFound,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(msg) => write!(f, "Database error: {}", msg),
            StoreError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            StoreError::NotFound => write!(f, "Record not found"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg)) => StoreError::Conflict(msg),
            _ => match err {
                DbErr::RecordNotFound(_) | DbErr::RecordNotUpdated => StoreError::NotFound,
                other => StoreError::Database(other.to_string()),
            },
        }
    }
}

#[async_trait]
pub trait MeterStore: Send + Sync {
    /// One page of matching records, ordered by `picker_date`
    async fn find_page(
        &self,
        predicate: &MeterPredicate,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<meters::Model>, StoreError>;

    async fn count(&self, predicate: &MeterPredicate) -> Result<u64, StoreError>;

    /// Every matching record, ordered by `picker_date` (CSV export)
    async fn find_all(&self, predicate: &MeterPredicate) -> Result<Vec<meters::Model>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<meters::Model>, StoreError>;

    async fn insert(&self, meter: meters::Model) -> Result<meters::Model, StoreError>;

    /// Overwrite every column of an existing record
    async fn update(&self, meter: meters::Model) -> Result<meters::Model, StoreError>;
}

#[derive(Clone)]
pub struct SeaOrmMeterStore {
    db: DatabaseConnection,
}

impl SeaOrmMeterStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MeterStore for SeaOrmMeterStore {
    async fn find_page(
        &self,
        predicate: &MeterPredicate,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<meters::Model>, StoreError> {
        let rows = Meters::find()
            .filter(predicate.to_condition())
            .order_by(meters::Column::PickerDate, predicate.order())
            .order_by(meters::Column::Id, predicate.order())
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn count(&self, predicate: &MeterPredicate) -> Result<u64, StoreError> {
        let total = Meters::find()
            .filter(predicate.to_condition())
            .count(&self.db)
            .await?;
        Ok(total)
    }

    async fn find_all(&self, predicate: &MeterPredicate) -> Result<Vec<meters::Model>, StoreError> {
        let rows = Meters::find()
            .filter(predicate.to_condition())
            .order_by(meters::Column::PickerDate, predicate.order())
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<meters::Model>, StoreError> {
        Ok(Meters::find_by_id(id).one(&self.db).await?)
    }

    async fn insert(&self, meter: meters::Model) -> Result<meters::Model, StoreError> {
        let active: meters::ActiveModel = meter.into();
        Ok(active.reset_all().insert(&self.db).await?)
    }

    async fn update(&self, meter: meters::Model) -> Result<meters::Model, StoreError> {
        let active: meters::ActiveModel = meter.into();
        Ok(active.reset_all().update(&self.db).await?)
    }
}
