use rust_decimal::Decimal;

use super::model::Side;
use crate::audit::AuditError;
use crate::ledger::LedgerError;
use crate::quote::QuoteError;

/// 거래 명령 에러
#[derive(Debug, thiserror::Error)]
pub enum TradeError {
    #[error("잘못된 요청: {0}")]
    Validation(String),
    #[error("잔고 부족: 필요 {required}, 보유 {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },
    #[error("보유 수량 부족: {symbol} 필요 {required}주, 보유 {owned}주")]
    InsufficientHoldings { symbol: String, required: i64, owned: i64 },
    #[error("대기 중인 {0} 주문이 없음")]
    NoPendingOrder(Side),
    #[error("{side} 지정가 주문이 없음: {symbol}")]
    NoLimitOrder { side: Side, symbol: String },
    #[error("시세 조회 불가: {0}")]
    QuoteUnavailable(#[from] QuoteError),
    #[error("원장 처리 실패: {0}")]
    LedgerFailure(#[from] LedgerError),
    #[error("감사 로그 조회 실패: {0}")]
    AuditFailure(#[from] AuditError),
    #[error("지정가 스케줄러가 중지됨")]
    SchedulerStopped,
}

impl TradeError {
    /// 같은 요청을 다시 시도하면 성공할 수 있는 인프라 장애인지 여부
    pub fn is_retryable(&self) -> bool {
        match self {
            TradeError::QuoteUnavailable(_) => true,
            TradeError::LedgerFailure(e) => !e.is_rejection() && !e.is_outcome_unknown(),
            _ => false,
        }
    }

    /// 응답용 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            TradeError::Validation(_) => "VALIDATION_ERROR",
            TradeError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            TradeError::InsufficientHoldings { .. } => "INSUFFICIENT_HOLDINGS",
            TradeError::NoPendingOrder(_) => "NO_PENDING_ORDER",
            TradeError::NoLimitOrder { .. } => "NO_LIMIT_ORDER",
            TradeError::QuoteUnavailable(_) => "QUOTE_UNAVAILABLE",
            TradeError::LedgerFailure(e) if e.is_rejection() => "LEDGER_REJECTED",
            TradeError::LedgerFailure(e) if e.is_outcome_unknown() => "LEDGER_OUTCOME_UNKNOWN",
            TradeError::LedgerFailure(_) => "LEDGER_FAILURE",
            TradeError::AuditFailure(_) => "AUDIT_FAILURE",
            TradeError::SchedulerStopped => "SCHEDULER_STOPPED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_only_infrastructure_failures_are_retryable() {
        assert!(TradeError::QuoteUnavailable(QuoteError::Timeout(Duration::from_secs(1))).is_retryable());
        assert!(TradeError::LedgerFailure(LedgerError::Unavailable("down".into())).is_retryable());
        assert!(!TradeError::LedgerFailure(LedgerError::InsufficientCash).is_retryable());
        // 시간 초과는 이미 반영되었을 수 있으므로 재시도 대상이 아님
        assert!(!TradeError::LedgerFailure(LedgerError::Timeout(Duration::from_secs(1))).is_retryable());
        assert!(!TradeError::NoPendingOrder(Side::Buy).is_retryable());
        assert!(!TradeError::Validation("bad".into()).is_retryable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(TradeError::NoPendingOrder(Side::Sell).code(), "NO_PENDING_ORDER");
        assert_eq!(
            TradeError::LedgerFailure(LedgerError::InsufficientCash).code(),
            "LEDGER_REJECTED"
        );
        assert_eq!(
            TradeError::LedgerFailure(LedgerError::Timeout(Duration::from_secs(1))).code(),
            "LEDGER_OUTCOME_UNKNOWN"
        );
    }
}
