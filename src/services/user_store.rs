//! User account persistence

use async_trait::async_trait;
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait,
    Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

use crate::entities::users::{self, Entity as Users};
use crate::models::meter::SortOrder;
use crate::models::user::{UserRole, UserSortBy};
use crate::services::meter_filter::escape_like;
use crate::services::meter_store::StoreError;

/// Search criteria for the user list
#[derive(Debug, Clone, Default)]
pub struct UserSearch {
    pub username: Option<String>,
    pub role: Option<UserRole>,
    pub sort_by: UserSortBy,
    pub sort_order: SortOrder,
    pub offset: u64,
    pub limit: u64,
}

impl UserSearch {
    fn needle(&self) -> Option<String> {
        self.username
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    fn condition(&self) -> Condition {
        let mut condition = Condition::all();
        if let Some(needle) = self.needle() {
            condition = condition.add(
                Expr::expr(Func::lower(Expr::col(users::Column::Username)))
                    .like(LikeExpr::new(format!("%{}%", escape_like(&needle))).escape('\\')),
            );
        }
        if let Some(role) = self.role {
            condition = condition.add(users::Column::Role.eq(role.to_string()));
        }
        condition
    }

    /// In-memory evaluation of the same criteria
    pub fn matches(&self, user: &users::Model) -> bool {
        let name_ok = self
            .needle()
            .map(|needle| user.username.to_lowercase().contains(&needle))
            .unwrap_or(true);
        let role_ok = self.role.map(|role| user.role == role.to_string()).unwrap_or(true);
        name_ok && role_ok
    }

    pub fn order(&self) -> Order {
        match self.sort_order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// One page of matching users and the total match count
    async fn search(&self, search: &UserSearch) -> Result<(Vec<users::Model>, u64), StoreError>;

    async fn count_all(&self) -> Result<u64, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<users::Model>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<users::Model>, StoreError>;

    async fn insert(&self, user: users::Model) -> Result<users::Model, StoreError>;

    async fn update(&self, user: users::Model) -> Result<users::Model, StoreError>;

    /// Delete by id, returning the removed row
    async fn delete(&self, id: Uuid) -> Result<Option<users::Model>, StoreError>;
}

#[derive(Clone)]
pub struct SeaOrmUserStore {
    db: DatabaseConnection,
}

impl SeaOrmUserStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for SeaOrmUserStore {
    async fn search(&self, search: &UserSearch) -> Result<(Vec<users::Model>, u64), StoreError> {
        let sort_column = match search.sort_by {
            UserSortBy::Username => users::Column::Username,
            UserSortBy::CreatedAt => users::Column::CreatedAt,
        };

        let total = Users::find()
            .filter(search.condition())
            .count(&self.db)
            .await?;

        let rows = Users::find()
            .filter(search.condition())
            .order_by(sort_column, search.order())
            .offset(search.offset)
            .limit(search.limit)
            .all(&self.db)
            .await?;

        Ok((rows, total))
    }

    async fn count_all(&self) -> Result<u64, StoreError> {
        Ok(Users::find().count(&self.db).await?)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<users::Model>, StoreError> {
        Ok(Users::find_by_id(id).one(&self.db).await?)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<users::Model>, StoreError> {
        Ok(Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.db)
            .await?)
    }

    async fn insert(&self, user: users::Model) -> Result<users::Model, StoreError> {
        let active: users::ActiveModel = user.into();
        Ok(active.reset_all().insert(&self.db).await?)
    }

    async fn update(&self, user: users::Model) -> Result<users::Model, StoreError> {
        let active: users::ActiveModel = user.into();
        Ok(active.reset_all().update(&self.db).await?)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<users::Model>, StoreError> {
        let Some(user) = Users::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };
        user.clone().delete(&self.db).await?;
        Ok(Some(user))
    }
}
