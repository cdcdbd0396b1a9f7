use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::timeout;

use crate::audit::AuditTrail;
use crate::quote::{Quote, QuoteError, QuoteSource};

/// 시세 캐시 유효 기간
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    /// 저장 후 지정 시간이 지나면 만료
    Expiring(Duration),
    /// 명시적으로 덮어쓰거나 무효화하기 전까지 유지
    Never,
}

impl CacheTtl {
    /// 0초는 만료 없음
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            CacheTtl::Never
        } else {
            CacheTtl::Expiring(Duration::from_secs(secs))
        }
    }
}

impl Default for CacheTtl {
    fn default() -> Self {
        CacheTtl::Expiring(Duration::from_secs(60))
    }
}

/// 캐시 엔트리
#[derive(Debug, Clone)]
pub struct CachedQuote {
    pub quote: Quote,
    pub stored_at: Instant,
}

impl CachedQuote {
    pub fn is_expired(&self, ttl: CacheTtl) -> bool {
        match ttl {
            CacheTtl::Expiring(ttl) => self.stored_at.elapsed() >= ttl,
            CacheTtl::Never => false,
        }
    }
}

/// 캐시 성능 메트릭
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    fetch_failures: AtomicU64,
}

/// 메트릭 스냅샷
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub fetches: u64,
    pub fetch_failures: u64,
}

impl CacheMetrics {
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
        }
    }
}

/// 읽기 관통(read-through) 시세 캐시
///
/// 만료되지 않은 값이 있으면 시세 서버를 호출하지 않고, 없으면 시세 서버를 호출하여
/// 결과를 저장하고 시세 조회 감사 항목을 남깁니다. 시세 서버 호출 중에는 락을 잡지 않습니다.
pub struct QuoteCache {
    entries: RwLock<HashMap<String, CachedQuote>>,
    source: Arc<dyn QuoteSource>,
    audit: Arc<AuditTrail>,
    ttl: CacheTtl,
    fetch_timeout: Duration,
    metrics: CacheMetrics,
}

impl QuoteCache {
    pub fn new(
        source: Arc<dyn QuoteSource>,
        audit: Arc<AuditTrail>,
        ttl: CacheTtl,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            source,
            audit,
            ttl,
            fetch_timeout,
            metrics: CacheMetrics::default(),
        }
    }

    pub fn ttl(&self) -> CacheTtl {
        self.ttl
    }

    /// 캐시된 시세 반환, 없거나 만료되었으면 시세 서버 조회
    pub async fn get_or_fetch(
        &self,
        symbol: &str,
        user_id: &str,
        transaction_num: u64,
    ) -> Result<Quote, QuoteError> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(symbol) {
                if !entry.is_expired(self.ttl) {
                    self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                    debug!("시세 캐시 적중: {} = {}", symbol, entry.quote.price);
                    return Ok(entry.quote.clone());
                }
            }
        }

        self.metrics.misses.fetch_add(1, Ordering::Relaxed);
        self.fetch(symbol, user_id, transaction_num).await
    }

    /// 캐시를 무시하고 항상 시세 서버를 조회하여 덮어씀
    pub async fn refresh(
        &self,
        symbol: &str,
        user_id: &str,
        transaction_num: u64,
    ) -> Result<Quote, QuoteError> {
        self.fetch(symbol, user_id, transaction_num).await
    }

    /// 캐시 무효화
    pub async fn invalidate(&self, symbol: &str) -> bool {
        self.entries.write().await.remove(symbol).is_some()
    }

    /// 시세 직접 저장
    pub async fn put(&self, quote: Quote) {
        let entry = CachedQuote {
            quote,
            stored_at: Instant::now(),
        };
        self.entries.write().await.insert(entry.quote.symbol.clone(), entry);
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot()
    }

    async fn fetch(&self, symbol: &str, user_id: &str, transaction_num: u64) -> Result<Quote, QuoteError> {
        self.metrics.fetches.fetch_add(1, Ordering::Relaxed);

        let result = match timeout(self.fetch_timeout, self.source.fetch(symbol, user_id)).await {
            Ok(Ok(quote)) if quote.price <= Decimal::ZERO => Err(QuoteError::InvalidPrice {
                symbol: symbol.to_string(),
                price: quote.price,
            }),
            Ok(result) => result,
            Err(_) => Err(QuoteError::Timeout(self.fetch_timeout)),
        };

        let quote = match result {
            Ok(quote) => quote,
            Err(e) => {
                self.metrics.fetch_failures.fetch_add(1, Ordering::Relaxed);
                warn!("시세 조회 실패 ({} via {}): {}", symbol, self.source.name(), e);
                return Err(e);
            }
        };

        self.store_if_newer(&quote).await;
        self.audit.quote_hit(transaction_num, user_id, &quote).await;
        Ok(quote)
    }

    /// 동시에 조회된 응답 중 늦게 도착한 오래된 시세가 최신 값을 덮어쓰지 않도록 함
    async fn store_if_newer(&self, quote: &Quote) {
        let mut entries = self.entries.write().await;
        if let Some(current) = entries.get(&quote.symbol) {
            if current.quote.timestamp > quote.timestamp {
                debug!(
                    "오래된 시세 무시: {} ({} < {})",
                    quote.symbol, quote.timestamp, current.quote.timestamp
                );
                return;
            }
        }
        entries.insert(
            quote.symbol.clone(),
            CachedQuote {
                quote: quote.clone(),
                stored_at: Instant::now(),
            },
        );
    }
}
