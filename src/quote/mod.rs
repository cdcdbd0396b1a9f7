/**
* filename : mod
* author : HAMA
* date: 2025. 6. 2.
* description: 외부 시세 서버 연동
**/

pub mod http_source;
pub mod simulated;

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use http_source::HttpQuoteSource;
pub use simulated::SimulatedQuoteSource;

/// 시세 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// 종목 심볼
    pub symbol: String,
    /// 시세
    pub price: Decimal,
    /// 시세 서버가 부여한 타임스탬프
    pub timestamp: i64,
    /// 시세 출처를 증명하는 암호 키
    pub cryptokey: String,
}

/// 시세 조회 에러
#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    #[error("시세 서버 연결 불가: {0}")]
    Unavailable(String),
    #[error("시세 조회 시간 초과 ({0:?})")]
    Timeout(Duration),
    #[error("잘못된 시세: {symbol} = {price}")]
    InvalidPrice { symbol: String, price: Decimal },
    #[error("시세 서버 HTTP 오류: {0}")]
    Http(#[from] reqwest::Error),
}

/// 시세 공급원 트레이트
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// 심볼의 현재 시세 조회 (사용자 ID는 시세 서버 감사용)
    async fn fetch(&self, symbol: &str, user_id: &str) -> Result<Quote, QuoteError>;

    /// 공급원 이름
    fn name(&self) -> &str;
}
