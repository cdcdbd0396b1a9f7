//! 주문 예약/확정/취소 엔진
//!
//! 매수·매도 의도를 원장과 시세로 검증해 예약(대기) 주문으로 보관하고,
//! 확정 시 원장에 원자적으로 반영합니다. (사용자, 방향)마다 대기 주문은 하나이며
//! 새 예약은 기존 예약을 대체합니다.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tokio::time::timeout;

use super::error::TradeError;
use super::model::{is_money, PendingOrder, Side, MONEY_SCALE};
use crate::audit::{AccountAction, AuditTrail, CommandKind};
use crate::cache::QuoteCache;
use crate::ledger::{LedgerDelta, LedgerError, LedgerGateway};
use crate::quote::Quote;

/// 심볼 검증
pub fn validate_symbol(symbol: &str) -> Result<(), TradeError> {
    if symbol.trim().is_empty() {
        return Err(TradeError::Validation("종목 심볼이 비어 있음".to_string()));
    }
    Ok(())
}

/// 금액 검증 (0보다 크고 센트 단위까지만 허용)
pub fn validate_amount(amount: Decimal) -> Result<(), TradeError> {
    if amount <= Decimal::ZERO {
        return Err(TradeError::Validation(format!("금액은 0보다 커야 함: {}", amount)));
    }
    if !is_money(amount) {
        return Err(TradeError::Validation(format!(
            "금액은 소수 {}자리까지만 허용: {}",
            MONEY_SCALE, amount
        )));
    }
    Ok(())
}

/// 원장에 반영할 현금 이동 방향과 부호 있는 수량
fn settlement(order: &PendingOrder) -> (AccountAction, i64) {
    match order.side {
        Side::Buy => (AccountAction::Remove, order.quantity),
        Side::Sell => (AccountAction::Add, -order.quantity),
    }
}

/// 주문 예약 엔진
pub struct OrderStagingEngine {
    ledger: Arc<dyn LedgerGateway>,
    quotes: Arc<QuoteCache>,
    audit: Arc<AuditTrail>,
    /// (사용자, 방향)별 대기 주문
    pending: Mutex<HashMap<(String, Side), PendingOrder>>,
    ledger_timeout: Duration,
}

impl OrderStagingEngine {
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        quotes: Arc<QuoteCache>,
        audit: Arc<AuditTrail>,
        ledger_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            quotes,
            audit,
            pending: Mutex::new(HashMap::new()),
            ledger_timeout,
        }
    }

    /// 원장 호출에 시간 제한 적용
    pub async fn ledger_call<T, F>(&self, call: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        match timeout(self.ledger_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout(self.ledger_timeout)),
        }
    }

    /// 인프라 장애를 에러 이벤트로 남기고 그대로 반환
    async fn record_failure(
        &self,
        transaction_num: u64,
        user_id: &str,
        command: CommandKind,
        symbol: Option<&str>,
        funds: Option<Decimal>,
        err: TradeError,
    ) -> TradeError {
        warn!("{} 처리 실패 ({}): {}", command, user_id, err);
        self.audit
            .error_event(transaction_num, user_id, command, symbol, funds, &err.to_string())
            .await;
        err
    }

    /// 매수/매도 예약
    ///
    /// 잔고(또는 보유 수량)를 읽고 시세를 받아 수량을 계산합니다.
    /// 매수는 체결 금액이 0이거나 잔고가 체결 금액 이하이면, 매도는 수량이 0이거나
    /// 보유 수량이 부족하면 거절되며 대기 주문은 바뀌지 않습니다.
    pub async fn reserve(
        &self,
        user_id: &str,
        symbol: &str,
        amount: Decimal,
        side: Side,
    ) -> Result<PendingOrder, TradeError> {
        let txn = self.audit.next_transaction();
        let command = CommandKind::reserve(side);
        self.audit
            .user_command(txn, user_id, command, Some(symbol), Some(amount))
            .await;

        validate_symbol(symbol)?;
        validate_amount(amount)?;

        // 매수는 현금, 매도는 해당 종목 보유 수량만 확인
        let position = match side {
            Side::Buy => self
                .ledger_call(self.ledger.get_balance(user_id))
                .await
                .map(|cash| (cash, 0)),
            Side::Sell => self
                .ledger_call(self.ledger.get_holding(user_id, symbol))
                .await
                .map(|owned| (Decimal::ZERO, owned)),
        };
        let (cash, owned) = match position {
            Ok(position) => position,
            Err(e) => {
                return Err(self
                    .record_failure(txn, user_id, command, Some(symbol), Some(amount), e.into())
                    .await)
            }
        };

        let quote = match self.quotes.get_or_fetch(symbol, user_id, txn).await {
            Ok(quote) => quote,
            Err(e) => {
                return Err(self
                    .record_failure(txn, user_id, command, Some(symbol), Some(amount), e.into())
                    .await)
            }
        };

        let order = PendingOrder::new(user_id, symbol, side, amount, quote.price);
        match side {
            Side::Buy => {
                if order.total.is_zero() || cash <= order.total {
                    debug!("매수 예약 거절 ({}): 필요 {}, 잔고 {}", user_id, order.total, cash);
                    return Err(TradeError::InsufficientFunds {
                        required: order.total,
                        available: cash,
                    });
                }
            }
            Side::Sell => {
                if order.quantity == 0 || owned == 0 || owned < order.quantity {
                    debug!("매도 예약 거절 ({}): {} 필요 {}주, 보유 {}주", user_id, symbol, order.quantity, owned);
                    return Err(TradeError::InsufficientHoldings {
                        symbol: symbol.to_string(),
                        required: order.quantity,
                        owned,
                    });
                }
            }
        }

        let previous = self
            .pending
            .lock()
            .await
            .insert((user_id.to_string(), side), order.clone());
        if let Some(previous) = previous {
            debug!("기존 {} 예약 대체 ({}): {} {}주", side, user_id, previous.symbol, previous.quantity);
        }

        info!(
            "{} 예약: {} {} {}주 @ {} (합계 {})",
            side, user_id, symbol, order.quantity, order.price, order.total
        );
        Ok(order)
    }

    /// 대기 주문 확정
    ///
    /// 원장 반영이 실패하면 대기 주문을 되돌려 놓아 재시도나 취소가 가능하게 합니다.
    /// 시간 초과는 반영 여부를 알 수 없으므로 대기 주문을 되돌리지 않습니다.
    pub async fn commit(&self, user_id: &str, side: Side) -> Result<PendingOrder, TradeError> {
        let txn = self.audit.next_transaction();
        let command = CommandKind::commit(side);
        let key = (user_id.to_string(), side);

        let taken = self.pending.lock().await.remove(&key);
        let Some(order) = taken else {
            self.audit.user_command(txn, user_id, command, None, None).await;
            let err = TradeError::NoPendingOrder(side);
            self.audit
                .error_event(txn, user_id, command, None, None, &err.to_string())
                .await;
            return Err(err);
        };

        self.audit
            .user_command(txn, user_id, command, Some(&order.symbol), Some(order.total))
            .await;

        let delta = LedgerDelta::trade(side, &order.symbol, order.quantity, order.total);
        if let Err(e) = self.ledger_call(self.ledger.apply_delta(user_id, &delta)).await {
            let symbol = order.symbol.clone();
            let total = order.total;
            if e.is_outcome_unknown() {
                // 이미 반영되었을 수 있으므로 되돌려 놓지 않음 (이중 반영 방지)
                error!(
                    "{} 확정 결과 불명 ({}): {} {}주, 대기 주문 제거",
                    side, user_id, order.symbol, order.quantity
                );
            } else {
                self.pending.lock().await.entry(key).or_insert(order);
            }
            return Err(self
                .record_failure(txn, user_id, command, Some(&symbol), Some(total), e.into())
                .await);
        }

        let (action, shares) = settlement(&order);
        self.audit
            .account_transaction(txn, user_id, action, order.total, Some(&order.symbol), Some(shares))
            .await;

        info!(
            "{} 확정: {} {} {}주 (합계 {})",
            side, user_id, order.symbol, order.quantity, order.total
        );
        Ok(order)
    }

    /// 대기 주문 취소 (원장 변화 없음)
    pub async fn cancel(&self, user_id: &str, side: Side) -> Result<PendingOrder, TradeError> {
        let txn = self.audit.next_transaction();
        let command = CommandKind::cancel(side);

        let taken = self.pending.lock().await.remove(&(user_id.to_string(), side));
        match taken {
            Some(order) => {
                self.audit
                    .user_command(txn, user_id, command, Some(&order.symbol), Some(order.requested_amount))
                    .await;
                info!("{} 예약 취소: {} {}", side, user_id, order.symbol);
                Ok(order)
            }
            None => {
                self.audit.user_command(txn, user_id, command, None, None).await;
                let err = TradeError::NoPendingOrder(side);
                self.audit
                    .error_event(txn, user_id, command, None, None, &err.to_string())
                    .await;
                Err(err)
            }
        }
    }

    /// 주어진 시세로 즉시 체결 (지정가 발동용, 대기 주문 테이블을 거치지 않음)
    ///
    /// 실패 시 에러 이벤트는 호출자가 남깁니다.
    pub async fn execute_at(
        &self,
        user_id: &str,
        symbol: &str,
        side: Side,
        amount: Decimal,
        quote: &Quote,
        transaction_num: u64,
    ) -> Result<PendingOrder, TradeError> {
        let order = PendingOrder::new(user_id, symbol, side, amount, quote.price);
        if order.quantity == 0 {
            return Err(TradeError::Validation(format!(
                "금액 {}으로는 {} @ {}를 1주도 체결할 수 없음",
                amount, symbol, quote.price
            )));
        }

        let delta = LedgerDelta::trade(side, symbol, order.quantity, order.total);
        self.ledger_call(self.ledger.apply_delta(user_id, &delta)).await?;

        self.audit
            .system_event(transaction_num, user_id, CommandKind::commit(side), symbol, order.total)
            .await;
        let (action, shares) = settlement(&order);
        self.audit
            .account_transaction(transaction_num, user_id, action, order.total, Some(symbol), Some(shares))
            .await;

        Ok(order)
    }

    /// 사용자의 대기 주문 목록
    pub async fn pending_for(&self, user_id: &str) -> Vec<PendingOrder> {
        let pending = self.pending.lock().await;
        let mut orders: Vec<PendingOrder> = pending
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.side.as_str());
        orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{EntryKind, MemoryEventLog};
    use crate::cache::CacheTtl;
    use crate::ledger::MemoryLedger;
    use crate::quote::simulated::{FakeMarketData, SimulatedQuoteSource};

    async fn engine_with_price(price: i64) -> (OrderStagingEngine, Arc<MemoryLedger>, Arc<AuditTrail>) {
        let ledger = Arc::new(MemoryLedger::new());
        let audit = Arc::new(AuditTrail::new(Arc::new(MemoryEventLog::new()), "test"));
        let source = SimulatedQuoteSource::new(1, 0.0).with_market(FakeMarketData {
            symbol: "ABC".to_string(),
            base_price: Decimal::from(price),
        });
        let quotes = Arc::new(QuoteCache::new(
            Arc::new(source),
            audit.clone(),
            CacheTtl::default(),
            Duration::from_secs(1),
        ));
        let engine = OrderStagingEngine::new(ledger.clone(), quotes, audit.clone(), Duration::from_secs(1));
        (engine, ledger, audit)
    }

    #[tokio::test]
    async fn test_reserve_and_commit_buy() {
        let (engine, ledger, _) = engine_with_price(50).await;
        ledger.apply_delta("alice", &LedgerDelta::cash(Decimal::from(1000))).await.unwrap();

        let order = engine.reserve("alice", "ABC", Decimal::from(300), Side::Buy).await.unwrap();
        assert_eq!(order.quantity, 6);
        assert_eq!(order.total, Decimal::from(300));

        engine.commit("alice", Side::Buy).await.unwrap();
        assert_eq!(ledger.get_balance("alice").await.unwrap(), Decimal::from(700));
        assert_eq!(ledger.get_holding("alice", "ABC").await.unwrap(), 6);

        assert!(matches!(
            engine.commit("alice", Side::Buy).await,
            Err(TradeError::NoPendingOrder(Side::Buy))
        ));
    }

    #[tokio::test]
    async fn test_buy_rejected_when_balance_equals_total() {
        let (engine, ledger, _) = engine_with_price(50).await;
        ledger.apply_delta("alice", &LedgerDelta::cash(Decimal::from(300))).await.unwrap();

        let err = engine.reserve("alice", "ABC", Decimal::from(300), Side::Buy).await.unwrap_err();
        assert!(matches!(err, TradeError::InsufficientFunds { .. }));
        assert!(engine.pending_for("alice").await.is_empty());
    }

    #[tokio::test]
    async fn test_zero_quantity_buy_is_rejected() {
        let (engine, ledger, _) = engine_with_price(50).await;
        ledger.apply_delta("alice", &LedgerDelta::cash(Decimal::from(1000))).await.unwrap();

        let err = engine.reserve("alice", "ABC", Decimal::from(49), Side::Buy).await.unwrap_err();
        assert!(matches!(err, TradeError::InsufficientFunds { required, .. } if required.is_zero()));
    }

    #[tokio::test]
    async fn test_sell_without_holdings_is_rejected() {
        let (engine, _, _) = engine_with_price(50).await;
        let err = engine.reserve("alice", "ABC", Decimal::from(100), Side::Sell).await.unwrap_err();
        assert!(matches!(err, TradeError::InsufficientHoldings { owned: 0, .. }));
        assert!(engine.pending_for("alice").await.is_empty());
    }

    #[tokio::test]
    async fn test_new_reservation_supersedes_previous() {
        let (engine, ledger, _) = engine_with_price(50).await;
        ledger.apply_delta("alice", &LedgerDelta::cash(Decimal::from(1000))).await.unwrap();

        engine.reserve("alice", "ABC", Decimal::from(100), Side::Buy).await.unwrap();
        engine.reserve("alice", "ABC", Decimal::from(200), Side::Buy).await.unwrap();

        let pending = engine.pending_for("alice").await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].quantity, 4);
    }

    #[tokio::test]
    async fn test_cancel_then_commit_reports_no_pending_order() {
        let (engine, ledger, audit) = engine_with_price(50).await;
        ledger.apply_delta("alice", &LedgerDelta::cash(Decimal::from(1000))).await.unwrap();

        engine.reserve("alice", "ABC", Decimal::from(100), Side::Buy).await.unwrap();
        engine.cancel("alice", Side::Buy).await.unwrap();
        assert!(matches!(
            engine.commit("alice", Side::Buy).await,
            Err(TradeError::NoPendingOrder(Side::Buy))
        ));
        assert_eq!(ledger.get_balance("alice").await.unwrap(), Decimal::from(1000));

        let entries = audit.query(Some("alice")).await.unwrap();
        assert!(matches!(
            entries.last().map(|e| &e.record.kind),
            Some(EntryKind::ErrorEvent { command: CommandKind::CommitBuy, .. })
        ));
    }

    #[tokio::test]
    async fn test_validation_happens_before_state_change() {
        let (engine, _, audit) = engine_with_price(50).await;
        let err = engine.reserve("alice", " ", Decimal::from(100), Side::Buy).await.unwrap_err();
        assert!(matches!(err, TradeError::Validation(_)));
        let err = engine.reserve("alice", "ABC", Decimal::from(-5), Side::Buy).await.unwrap_err();
        assert!(matches!(err, TradeError::Validation(_)));
        let err = engine.reserve("alice", "ABC", Decimal::new(10004, 3), Side::Buy).await.unwrap_err();
        assert!(matches!(err, TradeError::Validation(_)));

        // 명령 기록만 남고 시세 조회는 없음
        let entries = audit.query(Some("alice")).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries
            .iter()
            .all(|e| matches!(e.record.kind, EntryKind::UserCommand { .. })));
    }
}
