//! 가격 수집 도메인 모델: 행, 파서, 샘플링 규칙.

mod parser;
mod row;
mod sampling;

pub use parser::*;
pub use row::*;
pub use sampling::*;
