//! COPY용 CSV 인코딩.
//!
//! COPY 프로토콜은 위치 기반이므로 행을 대상 테이블의 컬럼 순서에 맞춰 직렬화합니다.
//! 테이블에 없는 `Row` 필드는 버리고, `Row`에 없는 테이블 컬럼이 있으면 실패합니다.

use crate::error::{DataError, Result};
use coinfeed_core::{Cell, Row};
use std::path::Path;

fn project(row: &Row, columns: &[String]) -> Result<Vec<Cell>> {
    columns
        .iter()
        .map(|column| {
            row.cell(column)
                .ok_or_else(|| DataError::InvalidData(format!("행에 없는 컬럼: {}", column)))
        })
        .collect()
}

/// 헤더 행을 포함한 CSV 버퍼를 만듭니다.
pub fn encode_rows(rows: &[Row], columns: &[String]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::with_capacity(rows.len() * 128));
    writer.write_record(columns)?;

    for row in rows {
        let cells = project(row, columns)?;
        writer.write_record(cells.iter().map(|c| c.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| DataError::SerializationError(e.to_string()))
}

/// CSV를 파일로 씁니다.
pub async fn write_csv_file(path: &Path, rows: &[Row], columns: &[String]) -> Result<()> {
    let buffer = encode_rows(rows, columns)?;
    tokio::fs::write(path, buffer).await?;
    Ok(())
}
