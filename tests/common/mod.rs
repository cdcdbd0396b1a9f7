//! 통합 테스트 공용 도우미
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tokio::time::sleep;

use day_trader::audit::{AuditTrail, EventSink, MemoryEventLog};
use day_trader::cache::{CacheTtl, QuoteCache};
use day_trader::ledger::{AccountSnapshot, LedgerDelta, LedgerError, LedgerGateway, MemoryLedger};
use day_trader::quote::{Quote, QuoteError, QuoteSource};
use day_trader::scheduler::SchedulerConfig;
use day_trader::trading::TradingService;

/// 정해진 순서대로 시세를 돌려주는 공급원 (마지막 값은 계속 반복)
pub struct ScriptedQuoteSource {
    prices: Mutex<VecDeque<Decimal>>,
    last: Mutex<Decimal>,
    calls: AtomicU64,
    down: AtomicBool,
}

impl ScriptedQuoteSource {
    pub fn new(prices: &[i64]) -> Self {
        Self::with_prices(prices.iter().map(|p| Decimal::from(*p)).collect())
    }

    pub fn with_prices(prices: Vec<Decimal>) -> Self {
        let last = prices.last().copied().unwrap_or(Decimal::ONE);
        Self {
            prices: Mutex::new(prices.into()),
            last: Mutex::new(last),
            calls: AtomicU64::new(0),
            down: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// 장애 상태에서는 가격을 소비하지 않고 Unavailable 반환
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl QuoteSource for ScriptedQuoteSource {
    async fn fetch(&self, symbol: &str, _user_id: &str) -> Result<Quote, QuoteError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(QuoteError::Unavailable("quote server offline".to_string()));
        }
        let next = self.prices.lock().await.pop_front();
        let price = match next {
            Some(price) => {
                *self.last.lock().await = price;
                price
            }
            None => *self.last.lock().await,
        };
        Ok(Quote {
            symbol: symbol.to_string(),
            price,
            timestamp: call as i64,
            cryptokey: format!("key-{}", call),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// 지정한 횟수만큼 apply_delta가 인프라 장애로 실패하는 원장
#[derive(Default)]
pub struct FlakyLedger {
    inner: MemoryLedger,
    failures_left: AtomicU32,
}

impl FlakyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerGateway for FlakyLedger {
    async fn get_balance(&self, user_id: &str) -> Result<Decimal, LedgerError> {
        self.inner.get_balance(user_id).await
    }

    async fn get_holding(&self, user_id: &str, symbol: &str) -> Result<i64, LedgerError> {
        self.inner.get_holding(user_id, symbol).await
    }

    async fn apply_delta(&self, user_id: &str, delta: &LedgerDelta) -> Result<(), LedgerError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(LedgerError::Unavailable("ledger offline".to_string()));
        }
        self.inner.apply_delta(user_id, delta).await
    }

    async fn snapshot(&self, user_id: &str) -> Result<AccountSnapshot, LedgerError> {
        self.inner.snapshot(user_id).await
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            return Err(LedgerError::Unavailable("ledger offline".to_string()));
        }
        Ok(())
    }
}

/// 반영은 끝냈지만 응답이 늦는 원장 (결과 불명 상황 재현용)
#[derive(Default)]
pub struct StallingLedger {
    inner: MemoryLedger,
    stall: AtomicBool,
}

impl StallingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stall(&self, stall: bool) {
        self.stall.store(stall, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerGateway for StallingLedger {
    async fn get_balance(&self, user_id: &str) -> Result<Decimal, LedgerError> {
        self.inner.get_balance(user_id).await
    }

    async fn get_holding(&self, user_id: &str, symbol: &str) -> Result<i64, LedgerError> {
        self.inner.get_holding(user_id, symbol).await
    }

    async fn apply_delta(&self, user_id: &str, delta: &LedgerDelta) -> Result<(), LedgerError> {
        self.inner.apply_delta(user_id, delta).await?;
        if self.stall.load(Ordering::SeqCst) {
            sleep(Duration::from_secs(2)).await;
        }
        Ok(())
    }

    async fn snapshot(&self, user_id: &str) -> Result<AccountSnapshot, LedgerError> {
        self.inner.snapshot(user_id).await
    }
}

pub fn fast_scheduler(max_fire_attempts: u32) -> SchedulerConfig {
    SchedulerConfig {
        poll_interval: Duration::from_millis(10),
        max_fire_attempts,
    }
}

/// 메모리 감사 로그를 쓰는 서비스 조립
pub fn build_service(
    source: Arc<dyn QuoteSource>,
    ledger: Arc<dyn LedgerGateway>,
    scheduler: SchedulerConfig,
) -> Arc<TradingService> {
    build_service_with(source, ledger, Arc::new(MemoryEventLog::new()), CacheTtl::default(), scheduler)
}

/// 감사 로그 저장소와 캐시 유효 기간을 지정하는 서비스 조립
pub fn build_service_with(
    source: Arc<dyn QuoteSource>,
    ledger: Arc<dyn LedgerGateway>,
    sink: Arc<dyn EventSink>,
    ttl: CacheTtl,
    scheduler: SchedulerConfig,
) -> Arc<TradingService> {
    let audit = Arc::new(AuditTrail::new(sink, "test-server"));
    let quotes = Arc::new(QuoteCache::new(
        source,
        audit.clone(),
        ttl,
        Duration::from_millis(500),
    ));
    Arc::new(TradingService::new(
        ledger,
        quotes,
        audit,
        Duration::from_millis(500),
        scheduler,
    ))
}

/// 활성 지정가 주문이 모두 빠질 때까지 대기
pub async fn wait_for_no_active_orders(service: &TradingService) {
    for _ in 0..500 {
        if service.scheduler().active_orders().await.is_empty() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("활성 지정가 주문이 시간 내에 처리되지 않음");
}

/// 실패 목록이 지정 개수가 될 때까지 대기
pub async fn wait_for_failed_executions(service: &TradingService, count: usize) {
    for _ in 0..500 {
        if service.scheduler().failed_executions().await.len() >= count {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("실패한 지정가 주문이 시간 내에 기록되지 않음");
}

/// 스케줄러가 멈출 때까지 대기
pub async fn wait_for_scheduler_idle(service: &TradingService) {
    for _ in 0..500 {
        if !service.scheduler().is_running().await {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("스케줄러가 시간 내에 멈추지 않음");
}
