/**
* filename : mod
* author : HAMA
* date: 2025. 6. 2.
* description: 계좌 원장 게이트웨이
**/

pub mod memory;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::trading::model::Side;

pub use memory::MemoryLedger;

/// 원장 변경분 (현금 증감 + 종목별 수량 증감)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerDelta {
    pub cash: Decimal,
    pub holdings: BTreeMap<String, i64>,
}

impl LedgerDelta {
    /// 현금만 변경
    pub fn cash(amount: Decimal) -> Self {
        Self {
            cash: amount,
            holdings: BTreeMap::new(),
        }
    }

    /// 매수: 현금 -total, 수량 +quantity / 매도: 현금 +total, 수량 -quantity
    pub fn trade(side: Side, symbol: &str, quantity: i64, total: Decimal) -> Self {
        let (cash, shares) = match side {
            Side::Buy => (-total, quantity),
            Side::Sell => (total, -quantity),
        };
        let mut holdings = BTreeMap::new();
        holdings.insert(symbol.to_string(), shares);
        Self { cash, holdings }
    }
}

/// 계좌 스냅샷
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub user_id: String,
    pub cash_balance: Decimal,
    /// 보유 수량이 0인 종목은 포함하지 않음
    pub holdings: BTreeMap<String, i64>,
}

/// 원장 에러
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("현금 잔고 부족")]
    InsufficientCash,
    #[error("보유 수량 부족: {0}")]
    InsufficientShares(String),
    #[error("처리할 수 없는 금액: {0}")]
    InvalidAmount(Decimal),
    #[error("원장 사용 불가: {0}")]
    Unavailable(String),
    #[error("원장 응답 시간 초과 ({0:?})")]
    Timeout(Duration),
    #[error("데이터베이스 오류: {0}")]
    Database(#[from] sqlx::Error),
}

impl LedgerError {
    /// 조건부 갱신이 거절된 경우 (인프라 장애가 아님)
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::InsufficientCash
                | LedgerError::InsufficientShares(_)
                | LedgerError::InvalidAmount(_)
        )
    }

    /// 응답 시간 초과로 반영 여부를 알 수 없는 경우 (자동 재시도 금지)
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(self, LedgerError::Timeout(_))
    }
}

/// 계좌 원장 트레이트
///
/// 계좌는 처음 참조될 때 생성됩니다. `apply_delta`는 현금과 모든 종목 변경을
/// 하나의 원자적 조건부 갱신으로 처리하며, 결과가 음수가 되면 아무것도 바꾸지 않습니다.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn get_balance(&self, user_id: &str) -> Result<Decimal, LedgerError>;

    async fn get_holding(&self, user_id: &str, symbol: &str) -> Result<i64, LedgerError>;

    async fn apply_delta(&self, user_id: &str, delta: &LedgerDelta) -> Result<(), LedgerError>;

    async fn snapshot(&self, user_id: &str) -> Result<AccountSnapshot, LedgerError>;

    /// 저장소 연결 확인 (헬스 체크용)
    async fn ping(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_delta_signs() {
        let buy = LedgerDelta::trade(Side::Buy, "ABC", 6, Decimal::from(300));
        assert_eq!(buy.cash, Decimal::from(-300));
        assert_eq!(buy.holdings.get("ABC"), Some(&6));

        let sell = LedgerDelta::trade(Side::Sell, "ABC", 2, Decimal::from(100));
        assert_eq!(sell.cash, Decimal::from(100));
        assert_eq!(sell.holdings.get("ABC"), Some(&-2));
    }

    #[test]
    fn test_rejection_classification() {
        assert!(LedgerError::InsufficientCash.is_rejection());
        assert!(LedgerError::InsufficientShares("X".into()).is_rejection());
        assert!(!LedgerError::Unavailable("down".into()).is_rejection());
        assert!(!LedgerError::Timeout(Duration::from_secs(1)).is_rejection());
        assert!(LedgerError::Timeout(Duration::from_secs(1)).is_outcome_unknown());
        assert!(!LedgerError::Unavailable("down".into()).is_outcome_unknown());
    }
}
