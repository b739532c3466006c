//! 데이터 수집 모듈.

pub mod export;
pub mod schedule;
pub mod scrape;
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;

pub use export::{export_ohlcv, EXPORT_HEADER};
pub use schedule::{run_schedules, scrape_scheduler};
pub use scrape::{scrape, scrape_historical, tomorrow};
pub use stream::run_listener;
