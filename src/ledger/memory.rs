use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use log::debug;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::{AccountSnapshot, LedgerDelta, LedgerError, LedgerGateway};

#[derive(Debug, Default, Clone)]
struct AccountState {
    cash: Decimal,
    holdings: BTreeMap<String, i64>,
}

/// 메모리 원장
///
/// 하나의 뮤텍스 아래에서 검증과 반영을 함께 수행하므로 `apply_delta`는 원자적입니다.
#[derive(Default)]
pub struct MemoryLedger {
    accounts: Mutex<HashMap<String, AccountState>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerGateway for MemoryLedger {
    async fn get_balance(&self, user_id: &str) -> Result<Decimal, LedgerError> {
        let mut accounts = self.accounts.lock().await;
        Ok(accounts.entry(user_id.to_string()).or_default().cash)
    }

    async fn get_holding(&self, user_id: &str, symbol: &str) -> Result<i64, LedgerError> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts.entry(user_id.to_string()).or_default();
        Ok(account.holdings.get(symbol).copied().unwrap_or(0))
    }

    async fn apply_delta(&self, user_id: &str, delta: &LedgerDelta) -> Result<(), LedgerError> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts.entry(user_id.to_string()).or_default();

        let cash = account.cash + delta.cash;
        if cash < Decimal::ZERO {
            return Err(LedgerError::InsufficientCash);
        }

        let mut updated = Vec::with_capacity(delta.holdings.len());
        for (symbol, change) in &delta.holdings {
            let current = account.holdings.get(symbol).copied().unwrap_or(0);
            let next = current
                .checked_add(*change)
                .filter(|q| *q >= 0)
                .ok_or_else(|| LedgerError::InsufficientShares(symbol.clone()))?;
            updated.push((symbol.clone(), next));
        }

        account.cash = cash;
        for (symbol, quantity) in updated {
            account.holdings.insert(symbol, quantity);
        }
        debug!("메모리 원장 반영: {} (현금 {:+})", user_id, delta.cash);
        Ok(())
    }

    async fn snapshot(&self, user_id: &str) -> Result<AccountSnapshot, LedgerError> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts.entry(user_id.to_string()).or_default();
        Ok(AccountSnapshot {
            user_id: user_id.to_string(),
            cash_balance: account.cash,
            holdings: account
                .holdings
                .iter()
                .filter(|(_, q)| **q != 0)
                .map(|(s, q)| (s.clone(), *q))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::model::Side;

    #[tokio::test]
    async fn test_accounts_are_created_lazily() {
        let ledger = MemoryLedger::new();
        assert_eq!(ledger.get_balance("new_user").await.unwrap(), Decimal::ZERO);
        assert_eq!(ledger.get_holding("new_user", "ABC").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_negative_cash_is_rejected_without_side_effects() {
        let ledger = MemoryLedger::new();
        ledger.apply_delta("u1", &LedgerDelta::cash(Decimal::from(100))).await.unwrap();

        let err = ledger
            .apply_delta("u1", &LedgerDelta::trade(Side::Buy, "ABC", 3, Decimal::from(150)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientCash));
        assert_eq!(ledger.get_balance("u1").await.unwrap(), Decimal::from(100));
        assert_eq!(ledger.get_holding("u1", "ABC").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_negative_holding_is_rejected_without_side_effects() {
        let ledger = MemoryLedger::new();
        ledger
            .apply_delta("u1", &LedgerDelta::trade(Side::Sell, "ABC", 1, Decimal::from(10)))
            .await
            .unwrap_err();
        assert_eq!(ledger.get_balance("u1").await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_snapshot_skips_empty_positions() {
        let ledger = MemoryLedger::new();
        ledger.apply_delta("u1", &LedgerDelta::cash(Decimal::from(1000))).await.unwrap();
        ledger
            .apply_delta("u1", &LedgerDelta::trade(Side::Buy, "ABC", 2, Decimal::from(100)))
            .await
            .unwrap();
        ledger
            .apply_delta("u1", &LedgerDelta::trade(Side::Sell, "ABC", 2, Decimal::from(120)))
            .await
            .unwrap();

        let snapshot = ledger.snapshot("u1").await.unwrap();
        assert_eq!(snapshot.cash_balance, Decimal::from(1020));
        assert!(snapshot.holdings.is_empty());
    }
}
