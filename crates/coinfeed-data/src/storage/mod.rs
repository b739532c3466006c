//! 데이터베이스 저장소.

pub mod database;
pub mod prices;
pub mod schema;
