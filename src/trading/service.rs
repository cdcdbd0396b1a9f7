//! 거래 명령 서비스
//!
//! 명령 게이트웨이가 호출하는 단일 진입점입니다. 사용자별 락 아래에서 명령을 처리하고
//! 예약 엔진, 지정가 주문 테이블, 트리거 스케줄러를 조합합니다.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use rust_decimal::Decimal;
use serde::Serialize;

use super::error::TradeError;
use super::limits::LimitOrderBook;
use super::locks::UserLocks;
use super::model::{ArmedOrder, FailedExecution, LimitOrder, PendingOrder, Side};
use super::staging::{validate_amount, validate_symbol, OrderStagingEngine};
use crate::audit::{AccountAction, AuditEntry, AuditTrail, CommandKind};
use crate::cache::{CacheStats, QuoteCache};
use crate::ledger::{AccountSnapshot, LedgerDelta, LedgerGateway};
use crate::quote::Quote;
use crate::scheduler::{SchedulerConfig, TriggerScheduler};

/// 계정 요약 (DISPLAY_SUMMARY)
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub account: AccountSnapshot,
    pub transactions: Vec<AuditEntry>,
    pub pending_orders: Vec<PendingOrder>,
    pub limit_orders: Vec<LimitOrder>,
    pub armed_orders: Vec<ArmedOrder>,
    pub failed_executions: Vec<FailedExecution>,
}

/// 서비스 상태 (헬스 체크용)
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub ledger_available: bool,
    pub audit_failures: u64,
    pub scheduler_running: bool,
    pub active_limit_orders: usize,
    pub failed_executions: usize,
    pub quote_cache: CacheStats,
}

/// 거래 명령 서비스
pub struct TradingService {
    ledger: Arc<dyn LedgerGateway>,
    quotes: Arc<QuoteCache>,
    audit: Arc<AuditTrail>,
    staging: Arc<OrderStagingEngine>,
    limits: LimitOrderBook,
    scheduler: TriggerScheduler,
    locks: UserLocks,
}

impl TradingService {
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        quotes: Arc<QuoteCache>,
        audit: Arc<AuditTrail>,
        ledger_timeout: Duration,
        scheduler_config: SchedulerConfig,
    ) -> Self {
        let staging = Arc::new(OrderStagingEngine::new(
            ledger.clone(),
            quotes.clone(),
            audit.clone(),
            ledger_timeout,
        ));
        let scheduler = TriggerScheduler::new(staging.clone(), quotes.clone(), audit.clone(), scheduler_config);

        Self {
            ledger,
            quotes,
            audit,
            staging,
            limits: LimitOrderBook::new(),
            scheduler,
            locks: UserLocks::new(),
        }
    }

    pub fn audit(&self) -> &Arc<AuditTrail> {
        &self.audit
    }

    pub fn scheduler(&self) -> &TriggerScheduler {
        &self.scheduler
    }

    /// 현금 입금 (ADD)
    pub async fn add_funds(&self, user_id: &str, amount: Decimal) -> Result<AccountSnapshot, TradeError> {
        let _guard = self.locks.acquire(user_id).await;
        let txn = self.audit.next_transaction();
        self.audit
            .user_command(txn, user_id, CommandKind::Add, None, Some(amount))
            .await;
        validate_amount(amount)?;

        if let Err(e) = self
            .staging
            .ledger_call(self.ledger.apply_delta(user_id, &LedgerDelta::cash(amount)))
            .await
        {
            warn!("입금 실패 ({}): {}", user_id, e);
            self.audit
                .error_event(txn, user_id, CommandKind::Add, None, Some(amount), &e.to_string())
                .await;
            return Err(e.into());
        }
        self.audit
            .account_transaction(txn, user_id, AccountAction::Add, amount, None, None)
            .await;

        info!("입금: {} {}", user_id, amount);
        Ok(self.staging.ledger_call(self.ledger.snapshot(user_id)).await?)
    }

    /// 시세 조회 (QUOTE)
    pub async fn quote(&self, user_id: &str, symbol: &str) -> Result<Quote, TradeError> {
        let _guard = self.locks.acquire(user_id).await;
        let txn = self.audit.next_transaction();
        self.audit
            .user_command(txn, user_id, CommandKind::Quote, Some(symbol), None)
            .await;
        validate_symbol(symbol)?;

        match self.quotes.get_or_fetch(symbol, user_id, txn).await {
            Ok(quote) => Ok(quote),
            Err(e) => {
                self.audit
                    .error_event(txn, user_id, CommandKind::Quote, Some(symbol), None, &e.to_string())
                    .await;
                Err(e.into())
            }
        }
    }

    pub async fn buy(&self, user_id: &str, symbol: &str, amount: Decimal) -> Result<PendingOrder, TradeError> {
        let _guard = self.locks.acquire(user_id).await;
        self.staging.reserve(user_id, symbol, amount, Side::Buy).await
    }

    pub async fn commit_buy(&self, user_id: &str) -> Result<PendingOrder, TradeError> {
        let _guard = self.locks.acquire(user_id).await;
        self.staging.commit(user_id, Side::Buy).await
    }

    pub async fn cancel_buy(&self, user_id: &str) -> Result<PendingOrder, TradeError> {
        let _guard = self.locks.acquire(user_id).await;
        self.staging.cancel(user_id, Side::Buy).await
    }

    pub async fn sell(&self, user_id: &str, symbol: &str, amount: Decimal) -> Result<PendingOrder, TradeError> {
        let _guard = self.locks.acquire(user_id).await;
        self.staging.reserve(user_id, symbol, amount, Side::Sell).await
    }

    pub async fn commit_sell(&self, user_id: &str) -> Result<PendingOrder, TradeError> {
        let _guard = self.locks.acquire(user_id).await;
        self.staging.commit(user_id, Side::Sell).await
    }

    pub async fn cancel_sell(&self, user_id: &str) -> Result<PendingOrder, TradeError> {
        let _guard = self.locks.acquire(user_id).await;
        self.staging.cancel(user_id, Side::Sell).await
    }

    /// 지정가 주문 금액 설정 (SET_BUY_AMOUNT / SET_SELL_AMOUNT)
    pub async fn set_limit_amount(
        &self,
        user_id: &str,
        side: Side,
        symbol: &str,
        amount: Decimal,
    ) -> Result<LimitOrder, TradeError> {
        let _guard = self.locks.acquire(user_id).await;
        let txn = self.audit.next_transaction();
        self.audit
            .user_command(txn, user_id, CommandKind::set_amount(side), Some(symbol), Some(amount))
            .await;
        validate_symbol(symbol)?;
        validate_amount(amount)?;

        let order = LimitOrder::unarmed(user_id, symbol, side, amount);
        if let Some(previous) = self.limits.set(order.clone()).await {
            info!("{} 지정가 금액 대체 ({}): {} {}", side, user_id, previous.symbol, previous.amount);
        }
        Ok(order)
    }

    /// 트리거 가격 설정 후 스케줄러 등록 (SET_BUY_TRIGGER / SET_SELL_TRIGGER)
    pub async fn arm_limit_trigger(
        &self,
        user_id: &str,
        side: Side,
        symbol: &str,
        trigger_price: Decimal,
    ) -> Result<ArmedOrder, TradeError> {
        let _guard = self.locks.acquire(user_id).await;
        let txn = self.audit.next_transaction();
        let command = CommandKind::set_trigger(side);
        self.audit
            .user_command(txn, user_id, command, Some(symbol), Some(trigger_price))
            .await;
        validate_symbol(symbol)?;
        if trigger_price <= Decimal::ZERO {
            return Err(TradeError::Validation(format!(
                "트리거 가격은 0보다 커야 함: {}",
                trigger_price
            )));
        }

        let Some(order) = self.limits.take(user_id, side, symbol).await else {
            let err = TradeError::NoLimitOrder {
                side,
                symbol: symbol.to_string(),
            };
            self.audit
                .error_event(txn, user_id, command, Some(symbol), Some(trigger_price), &err.to_string())
                .await;
            return Err(err);
        };

        let armed = order.clone().arm(trigger_price);
        if let Err(e) = self.scheduler.register(armed.clone()).await {
            self.limits.restore(order).await;
            self.audit
                .error_event(txn, user_id, command, Some(symbol), Some(trigger_price), &e.to_string())
                .await;
            return Err(e);
        }
        Ok(armed)
    }

    /// 트리거 설정 전 지정가 주문 취소 (CANCEL_SET_BUY / CANCEL_SET_SELL)
    pub async fn cancel_unarmed_limit(
        &self,
        user_id: &str,
        side: Side,
        symbol: &str,
    ) -> Result<LimitOrder, TradeError> {
        let _guard = self.locks.acquire(user_id).await;
        let txn = self.audit.next_transaction();
        let command = CommandKind::cancel_set(side);
        self.audit
            .user_command(txn, user_id, command, Some(symbol), None)
            .await;

        match self.limits.take(user_id, side, symbol).await {
            Some(order) => {
                info!("{} 지정가 주문 취소: {} {}", side, user_id, symbol);
                Ok(order)
            }
            None => {
                let err = TradeError::NoLimitOrder {
                    side,
                    symbol: symbol.to_string(),
                };
                self.audit
                    .error_event(txn, user_id, command, Some(symbol), None, &err.to_string())
                    .await;
                Err(err)
            }
        }
    }

    /// 계정 조회 (없으면 생성)
    pub async fn account(&self, user_id: &str) -> Result<AccountSnapshot, TradeError> {
        Ok(self.staging.ledger_call(self.ledger.snapshot(user_id)).await?)
    }

    /// 계정 요약 (DISPLAY_SUMMARY)
    pub async fn account_summary(&self, user_id: &str) -> Result<AccountSummary, TradeError> {
        let _guard = self.locks.acquire(user_id).await;
        let txn = self.audit.next_transaction();
        self.audit
            .user_command(txn, user_id, CommandKind::DisplaySummary, None, None)
            .await;

        let account = self.staging.ledger_call(self.ledger.snapshot(user_id)).await?;
        let transactions = self.audit.query(Some(user_id)).await?;

        Ok(AccountSummary {
            account,
            transactions,
            pending_orders: self.staging.pending_for(user_id).await,
            limit_orders: self.limits.for_user(user_id).await,
            armed_orders: self.scheduler.active_for(user_id).await,
            failed_executions: self.scheduler.failed_for(user_id).await,
        })
    }

    /// 감사 로그 덤프 (DUMPLOG). 파일 기록은 호출자 몫
    pub async fn dump_log(
        &self,
        user_id: Option<&str>,
        filename: Option<&str>,
    ) -> Result<Vec<AuditEntry>, TradeError> {
        let txn = self.audit.next_transaction();
        self.audit.dump_command(txn, user_id, filename).await;
        Ok(self.audit.query(user_id).await?)
    }

    pub async fn health(&self) -> ServiceHealth {
        let ledger_available = match self.staging.ledger_call(self.ledger.ping()).await {
            Ok(()) => true,
            Err(e) => {
                warn!("원장 연결 확인 실패: {}", e);
                false
            }
        };

        ServiceHealth {
            ledger_available,
            audit_failures: self.audit.failed_appends(),
            scheduler_running: self.scheduler.is_running().await,
            active_limit_orders: self.scheduler.active_orders().await.len(),
            failed_executions: self.scheduler.failed_executions().await.len(),
            quote_cache: self.quotes.stats(),
        }
    }

    /// 스케줄러 정지
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}
