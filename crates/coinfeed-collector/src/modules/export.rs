//! 저장된 OHLCV 내보내기.

use crate::Result;
use coinfeed_core::Row;
use std::io::Write;

/// 내보내기 CSV 헤더.
pub const EXPORT_HEADER: [&str; 6] = ["datetime", "open", "high", "low", "close", "volume"];

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// 행을 `datetime,open,high,low,close,volume` CSV로 씁니다. 쓴 행 수를 반환합니다.
pub fn export_ohlcv<W: Write>(rows: &[Row], writer: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(EXPORT_HEADER)?;

    for row in rows {
        wtr.write_record([
            row.timestamp.format(DATETIME_FORMAT).to_string(),
            row.open.to_string(),
            row.high.to_string(),
            row.low.to_string(),
            row.close.to_string(),
            row.volume.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(rows.len())
}
