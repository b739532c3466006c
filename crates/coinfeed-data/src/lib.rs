//! 가격 데이터 저장.
//!
//! 이 crate는 다음을 제공합니다:
//! - 연결 풀 래퍼 (`Database`)와 스키마 조회
//! - 세 가지 대량 적재 전략 (multi-row INSERT, COPY, 외부 병렬 COPY)
//! - 적재 대상 추상화 (`RowSink`)
//! - 가격 테이블 조회 (`PriceRepository`)

pub mod bulk;
pub mod error;
pub mod storage;

pub use error::{DataError, Result};

pub use bulk::encode::{encode_rows, write_csv_file};
pub use bulk::loader::{
    BatchInsertLoader, BulkLoader, CopyLoader, LoadStrategy, Notification, ParallelCopyLoader,
};
pub use bulk::sink::{BulkWriter, ConnectionWriter, RowSink};
pub use storage::database::Database;
pub use storage::prices::{PriceRepository, WatermarkSource};
pub use storage::schema::{get_columns, TableRef};
