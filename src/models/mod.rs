pub mod error;
pub mod gis;
pub mod meter;
pub mod pdf;
pub mod user;
