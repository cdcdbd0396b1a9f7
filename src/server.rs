use std::sync::Arc;

use axum::Router;
use log::{error, info};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::create_api_router;
use crate::audit::{AuditTrail, EventSink, MemoryEventLog};
use crate::cache::QuoteCache;
use crate::config::AppConfig;
use crate::db::{init_database, AccountRepository, AuditLogRepository};
use crate::ledger::{LedgerGateway, MemoryLedger};
use crate::quote::{HttpQuoteSource, QuoteError, QuoteSource, SimulatedQuoteSource};
use crate::trading::TradingService;

/// 서버 시작 에러
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("데이터베이스 초기화 실패: {0}")]
    Database(#[from] sqlx::Error),
    #[error("시세 공급원 생성 실패: {0}")]
    Quote(#[from] QuoteError),
    #[error("네트워크 오류: {0}")]
    Io(#[from] std::io::Error),
}

/// 서버 상태
#[derive(Clone)]
pub struct ServerState {
    pub service: Arc<TradingService>,
}

/// 설정에 따라 원장, 감사 로그, 시세 공급원을 조립
pub async fn build_service(config: &AppConfig) -> Result<Arc<TradingService>, ServerError> {
    let (ledger, sink): (Arc<dyn LedgerGateway>, Arc<dyn EventSink>) = match &config.database_url {
        Some(url) => {
            let pool = init_database(url, 5).await?;
            let ledger: Arc<dyn LedgerGateway> = Arc::new(AccountRepository::new(pool.clone()));
            let sink: Arc<dyn EventSink> = Arc::new(AuditLogRepository::new(pool));
            (ledger, sink)
        }
        None => {
            info!("DATABASE_URL 없음: 메모리 원장과 메모리 감사 로그 사용");
            let ledger: Arc<dyn LedgerGateway> = Arc::new(MemoryLedger::new());
            let sink: Arc<dyn EventSink> = Arc::new(MemoryEventLog::new());
            (ledger, sink)
        }
    };

    let source: Arc<dyn QuoteSource> = match &config.quote_service_url {
        Some(url) => Arc::new(HttpQuoteSource::new(url.as_str(), config.quote_timeout)?),
        None => {
            info!("QUOTE_SERVICE_URL 없음: 시뮬레이션 시세 사용");
            Arc::new(SimulatedQuoteSource::default())
        }
    };

    let audit = Arc::new(AuditTrail::new(sink, config.server_name.clone()));
    let quotes = Arc::new(QuoteCache::new(
        source,
        audit.clone(),
        config.quote_ttl,
        config.quote_timeout,
    ));

    Ok(Arc::new(TradingService::new(
        ledger,
        quotes,
        audit,
        config.ledger_timeout,
        config.scheduler.clone(),
    )))
}

/// 라우터 생성
pub fn create_app(state: ServerState) -> Router {
    create_api_router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 서버 시작
pub async fn start_server(config: AppConfig) -> Result<(), ServerError> {
    info!("dayTrader 서버 시작 중...");

    let service = build_service(&config).await?;
    let app = create_app(ServerState {
        service: service.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("서버가 성공적으로 시작되었습니다! REST API: http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 진행 중인 지정가 발동이 끝날 때까지 대기
    service.shutdown().await;
    info!("서버 종료");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("종료 신호 대기 실패: {}", e);
    }
    info!("종료 신호 수신");
}
