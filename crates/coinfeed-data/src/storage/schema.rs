//! 테이블 참조와 스키마 조회.

use crate::error::{DataError, Result};
use sqlx::PgConnection;
use std::fmt;
use tracing::{debug, instrument};

/// 검증된 `schema.table` 참조.
///
/// 식별자는 SQL에 직접 들어가므로 `[A-Za-z_][A-Za-z0-9_]*`만 허용합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    schema: String,
    table: String,
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Result<Self> {
        let schema = schema.into();
        let table = table.into();

        for name in [&schema, &table] {
            if !is_identifier(name) {
                return Err(DataError::InvalidData(format!("잘못된 식별자: {:?}", name)));
            }
        }

        Ok(Self { schema, table })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// SQL용 따옴표 포함 이름: `"prices"."coins"`.
    pub fn quoted(&self) -> String {
        format!("\"{}\".\"{}\"", self.schema, self.table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// 테이블 컬럼 이름을 정의 순서(ordinal position)대로 조회합니다.
///
/// 스키마나 테이블이 없으면 `DataError::NotFound`.
#[instrument(skip(conn, table), fields(table = %table))]
pub async fn get_columns(conn: &mut PgConnection, table: &TableRef) -> Result<Vec<String>> {
    let columns: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT column_name::text
        FROM information_schema.columns
        WHERE table_schema = $1 AND table_name = $2
        ORDER BY ordinal_position
        "#,
    )
    .bind(table.schema())
    .bind(table.table())
    .fetch_all(&mut *conn)
    .await?;

    if columns.is_empty() {
        return Err(DataError::NotFound(format!("테이블 없음: {}", table)));
    }

    debug!(count = columns.len(), "Introspected columns");
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_ref_validation() {
        let table = TableRef::new("prices", "coins").unwrap();
        assert_eq!(table.quoted(), "\"prices\".\"coins\"");
        assert_eq!(table.to_string(), "prices.coins");

        assert!(TableRef::new("prices", "coins; DROP TABLE x").is_err());
        assert!(TableRef::new("1prices", "coins").is_err());
        assert!(TableRef::new("", "coins").is_err());
        assert!(TableRef::new("_tmp", "coins_2021").is_ok());
    }
}
