use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 보유 종목 DB 모델
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HoldingRecord {
    pub symbol: String,
    pub quantity: i64,
}

/// 감사 로그 DB 모델
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogRecord {
    pub sequence: i64,
    pub transaction_num: i64,
    pub timestamp: i64,
    pub server: String,
    pub username: Option<String>,
    pub log_type: String,
    /// 항목 종류별 내용 (JSON)
    pub details: String,
}
