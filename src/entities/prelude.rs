//! `SeaORM` Entity prelude

pub use super::meters::Entity as Meters;
pub use super::users::Entity as Users;
