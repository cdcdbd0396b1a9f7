//! 지정가 주문 트리거 스케줄러
//!
//! 활성 지정가 주문을 순서대로 돌며 시세를 새로 받아 발동 조건을 확인합니다.
//! 활성 주문이 없으면 멈추고, 멈춘 상태에서 주문이 등록되면 다시 시작합니다.
//! 활성 집합, 실패 목록, 실행 여부는 하나의 뮤텍스로 보호됩니다.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::audit::{AuditTrail, CommandKind};
use crate::cache::QuoteCache;
use crate::trading::error::TradeError;
use crate::trading::model::{ArmedOrder, FailedExecution};
use crate::trading::staging::OrderStagingEngine;

/// 스케줄러 설정
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// 한 바퀴 순회 후 대기 시간
    pub poll_interval: Duration,
    /// 인프라 장애 시 최대 체결 시도 횟수
    pub max_fire_attempts: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_fire_attempts: 5,
        }
    }
}

#[derive(Default)]
struct SchedulerState {
    active: Vec<ArmedOrder>,
    failed: Vec<FailedExecution>,
    running: bool,
    stopped: bool,
    worker: Option<JoinHandle<()>>,
}

struct Inner {
    staging: Arc<OrderStagingEngine>,
    quotes: Arc<QuoteCache>,
    audit: Arc<AuditTrail>,
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    shutdown: watch::Sender<bool>,
}

/// 트리거 스케줄러 (복제해도 같은 스케줄러를 가리킴)
#[derive(Clone)]
pub struct TriggerScheduler {
    inner: Arc<Inner>,
}

impl TriggerScheduler {
    pub fn new(
        staging: Arc<OrderStagingEngine>,
        quotes: Arc<QuoteCache>,
        audit: Arc<AuditTrail>,
        config: SchedulerConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                staging,
                quotes,
                audit,
                config,
                state: Mutex::new(SchedulerState::default()),
                shutdown,
            }),
        }
    }

    /// 발동 대기 주문 등록
    ///
    /// 멈춰 있으면 작업 태스크를 시작하고, 이미 실행 중이면 활성 집합에만 추가합니다.
    pub async fn register(&self, order: ArmedOrder) -> Result<(), TradeError> {
        let mut state = self.inner.state.lock().await;
        if state.stopped {
            return Err(TradeError::SchedulerStopped);
        }

        info!(
            "지정가 주문 등록: {} {} {} {} @ {}",
            order.id, order.user_id, order.side, order.symbol, order.trigger_price
        );
        state.active.push(order);

        if !state.running {
            state.running = true;
            let inner = self.inner.clone();
            state.worker = Some(tokio::spawn(run_loop(inner)));
            info!("트리거 스케줄러 시작");
        }
        Ok(())
    }

    /// 중지 요청 후 진행 중인 발동이 끝날 때까지 대기
    pub async fn shutdown(&self) {
        let worker = {
            let mut state = self.inner.state.lock().await;
            state.stopped = true;
            state.worker.take()
        };
        self.inner.shutdown.send_replace(true);

        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!("트리거 스케줄러 종료 대기 실패: {}", e);
            }
        }
        info!("트리거 스케줄러 종료");
    }

    pub async fn is_running(&self) -> bool {
        self.inner.state.lock().await.running
    }

    pub async fn active_orders(&self) -> Vec<ArmedOrder> {
        self.inner.state.lock().await.active.clone()
    }

    pub async fn active_for(&self, user_id: &str) -> Vec<ArmedOrder> {
        let state = self.inner.state.lock().await;
        state.active.iter().filter(|o| o.user_id == user_id).cloned().collect()
    }

    pub async fn failed_executions(&self) -> Vec<FailedExecution> {
        self.inner.state.lock().await.failed.clone()
    }

    pub async fn failed_for(&self, user_id: &str) -> Vec<FailedExecution> {
        let state = self.inner.state.lock().await;
        state
            .failed
            .iter()
            .filter(|f| f.order.user_id == user_id)
            .cloned()
            .collect()
    }
}

/// 작업 루프
async fn run_loop(inner: Arc<Inner>) {
    let mut shutdown = inner.shutdown.subscribe();

    loop {
        let batch = {
            let mut state = inner.state.lock().await;
            if state.active.is_empty() || state.stopped {
                state.running = false;
                if !state.stopped {
                    state.worker = None;
                }
                debug!("트리거 스케줄러 대기 상태로 전환");
                return;
            }
            state.active.clone()
        };

        for order in batch {
            let stop = *shutdown.borrow();
            if stop {
                break;
            }
            inner.poll_order(order).await;
        }

        tokio::select! {
            _ = tokio::time::sleep(inner.config.poll_interval) => {}
            _ = shutdown.changed() => {}
        }
    }
}

impl Inner {
    /// 주문 하나의 시세 확인 및 발동
    async fn poll_order(&self, order: ArmedOrder) {
        let txn = self.audit.next_transaction();
        let quote = match self.quotes.refresh(&order.symbol, &order.user_id, txn).await {
            Ok(quote) => quote,
            Err(e) => {
                warn!("지정가 주문 {} 시세 조회 실패, 다음 순회에 재시도: {}", order.id, e);
                return;
            }
        };

        if !order.should_fire(quote.price) {
            debug!(
                "지정가 주문 {} 대기: {} 시세 {} / 트리거 {}",
                order.id, order.symbol, quote.price, order.trigger_price
            );
            return;
        }

        info!(
            "지정가 주문 발동: {} {} {} {} (시세 {}, 트리거 {})",
            order.id, order.user_id, order.side, order.symbol, quote.price, order.trigger_price
        );

        match self
            .staging
            .execute_at(&order.user_id, &order.symbol, order.side, order.amount, &quote, txn)
            .await
        {
            Ok(trade) => {
                self.state.lock().await.active.retain(|o| o.id != order.id);
                info!(
                    "지정가 주문 체결: {} {}주 @ {} (합계 {})",
                    order.id, trade.quantity, trade.price, trade.total
                );
            }
            Err(e) => self.record_failure(order.id, txn, e).await,
        }
    }

    /// 체결 실패 처리: 재시도 가능하면 시도 횟수만 늘리고, 아니면 실패 목록으로 이동
    ///
    /// 원장 시간 초과는 이미 반영되었을 수 있으므로 바로 실패 목록으로 옮깁니다.
    async fn record_failure(&self, order_id: Uuid, transaction_num: u64, err: TradeError) {
        let outcome_unknown = matches!(&err, TradeError::LedgerFailure(e) if e.is_outcome_unknown());
        let reason = if outcome_unknown {
            format!("체결 결과 불명, 재시도하지 않음: {}", err)
        } else {
            err.to_string()
        };
        let retryable = err.is_retryable();

        let (order, moved) = {
            let mut state = self.state.lock().await;
            let Some(pos) = state.active.iter().position(|o| o.id == order_id) else {
                return;
            };
            state.active[pos].attempts += 1;
            let attempts = state.active[pos].attempts;

            if !retryable || attempts >= self.config.max_fire_attempts {
                let order = state.active.remove(pos);
                state.failed.push(FailedExecution {
                    order: order.clone(),
                    reason: reason.clone(),
                    failed_at: Utc::now(),
                });
                (order, true)
            } else {
                (state.active[pos].clone(), false)
            }
        };

        self.audit
            .error_event(
                transaction_num,
                &order.user_id,
                CommandKind::set_trigger(order.side),
                Some(&order.symbol),
                Some(order.amount),
                &reason,
            )
            .await;

        if moved {
            error!(
                "지정가 주문 {} 체결 실패로 제외 (시도 {}회): {}",
                order.id, order.attempts, reason
            );
        } else {
            warn!(
                "지정가 주문 {} 체결 실패, 재시도 예정 ({}/{}): {}",
                order.id, order.attempts, self.config.max_fire_attempts, reason
            );
        }
    }
}
