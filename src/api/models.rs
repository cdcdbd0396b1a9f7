use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::trading::ServiceHealth;

/// 입금 요청
#[derive(Debug, Deserialize, Serialize)]
pub struct AddFundsRequest {
    pub id: String,
    pub amount: Decimal,
}

/// 매수/매도 예약 요청
#[derive(Debug, Deserialize, Serialize)]
pub struct TradeRequest {
    pub id: String,
    pub stock: String,
    pub amount: Decimal,
}

/// 예약 확정 요청
#[derive(Debug, Deserialize, Serialize)]
pub struct CommitRequest {
    pub id: String,
}

/// 지정가 금액 설정 요청
#[derive(Debug, Deserialize, Serialize)]
pub struct LimitAmountRequest {
    #[serde(rename = "ID", alias = "id")]
    pub id: String,
    pub stock: String,
    pub amount: Decimal,
}

/// 지정가 트리거 설정 요청
#[derive(Debug, Deserialize, Serialize)]
pub struct LimitTriggerRequest {
    #[serde(rename = "ID", alias = "id")]
    pub id: String,
    pub stock: String,
    pub price: Decimal,
}

/// 감사 로그 덤프 요청 (id가 없으면 전체)
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DumpLogRequest {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

/// 헬스 체크 응답
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(flatten)]
    pub service: ServiceHealth,
}

/// API 오류 응답
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
