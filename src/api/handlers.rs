use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use log::debug;

use crate::api::models::*;
use crate::audit::AuditEntry;
use crate::ledger::AccountSnapshot;
use crate::quote::Quote;
use crate::server::ServerState;
use crate::trading::{AccountSummary, ArmedOrder, LimitOrder, PendingOrder, Side, TradeError};

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// 거래 에러를 HTTP 응답으로 변환
pub fn trade_error_response(err: TradeError) -> ApiError {
    let status = match &err {
        TradeError::Validation(_) => StatusCode::BAD_REQUEST,
        TradeError::InsufficientFunds { .. } | TradeError::InsufficientHoldings { .. } => {
            StatusCode::FORBIDDEN
        }
        TradeError::NoPendingOrder(_) | TradeError::NoLimitOrder { .. } => StatusCode::NOT_FOUND,
        TradeError::LedgerFailure(e) if e.is_rejection() => StatusCode::CONFLICT,
        TradeError::QuoteUnavailable(_)
        | TradeError::LedgerFailure(_)
        | TradeError::AuditFailure(_)
        | TradeError::SchedulerStopped => StatusCode::SERVICE_UNAVAILABLE,
    };
    debug!("요청 거절 ({}): {}", status, err);

    (
        status,
        Json(ErrorResponse {
            error: err.code().to_string(),
            message: err.to_string(),
        }),
    )
}

fn parse_side(raw: &str) -> Result<Side, ApiError> {
    raw.parse::<Side>().map_err(|message| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "INVALID_TYPE".to_string(),
                message,
            }),
        )
    })
}

/// 입금 핸들러
pub async fn add_balance(
    State(state): State<ServerState>,
    Json(payload): Json<AddFundsRequest>,
) -> ApiResult<AccountSnapshot> {
    state
        .service
        .add_funds(&payload.id, payload.amount)
        .await
        .map(Json)
        .map_err(trade_error_response)
}

/// 계정 조회 핸들러 (없으면 생성)
pub async fn get_user(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> ApiResult<AccountSnapshot> {
    state.service.account(&id).await.map(Json).map_err(trade_error_response)
}

/// 시세 조회 핸들러
pub async fn get_quote(
    State(state): State<ServerState>,
    Path((id, stock)): Path<(String, String)>,
) -> ApiResult<Quote> {
    state
        .service
        .quote(&id, &stock)
        .await
        .map(Json)
        .map_err(trade_error_response)
}

/// 매수 예약 핸들러
pub async fn buy(
    State(state): State<ServerState>,
    Json(payload): Json<TradeRequest>,
) -> ApiResult<PendingOrder> {
    state
        .service
        .buy(&payload.id, &payload.stock, payload.amount)
        .await
        .map(Json)
        .map_err(trade_error_response)
}

/// 매수 확정 핸들러
pub async fn commit_buy(
    State(state): State<ServerState>,
    Json(payload): Json<CommitRequest>,
) -> ApiResult<PendingOrder> {
    state
        .service
        .commit_buy(&payload.id)
        .await
        .map(Json)
        .map_err(trade_error_response)
}

/// 매수 취소 핸들러
pub async fn cancel_buy(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> ApiResult<PendingOrder> {
    state.service.cancel_buy(&id).await.map(Json).map_err(trade_error_response)
}

/// 매도 예약 핸들러
pub async fn sell(
    State(state): State<ServerState>,
    Json(payload): Json<TradeRequest>,
) -> ApiResult<PendingOrder> {
    state
        .service
        .sell(&payload.id, &payload.stock, payload.amount)
        .await
        .map(Json)
        .map_err(trade_error_response)
}

/// 매도 확정 핸들러
pub async fn commit_sell(
    State(state): State<ServerState>,
    Json(payload): Json<CommitRequest>,
) -> ApiResult<PendingOrder> {
    state
        .service
        .commit_sell(&payload.id)
        .await
        .map(Json)
        .map_err(trade_error_response)
}

/// 매도 취소 핸들러
pub async fn cancel_sell(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> ApiResult<PendingOrder> {
    state.service.cancel_sell(&id).await.map(Json).map_err(trade_error_response)
}

/// 지정가 금액 설정 핸들러
pub async fn set_amount(
    State(state): State<ServerState>,
    Path(side): Path<String>,
    Json(payload): Json<LimitAmountRequest>,
) -> ApiResult<LimitOrder> {
    let side = parse_side(&side)?;
    state
        .service
        .set_limit_amount(&payload.id, side, &payload.stock, payload.amount)
        .await
        .map(Json)
        .map_err(trade_error_response)
}

/// 지정가 트리거 설정 핸들러
pub async fn set_trigger(
    State(state): State<ServerState>,
    Path(side): Path<String>,
    Json(payload): Json<LimitTriggerRequest>,
) -> ApiResult<ArmedOrder> {
    let side = parse_side(&side)?;
    state
        .service
        .arm_limit_trigger(&payload.id, side, &payload.stock, payload.price)
        .await
        .map(Json)
        .map_err(trade_error_response)
}

/// 지정가 주문 취소 핸들러
pub async fn cancel_set(
    State(state): State<ServerState>,
    Path((id, side, stock)): Path<(String, String, String)>,
) -> ApiResult<LimitOrder> {
    let side = parse_side(&side)?;
    state
        .service
        .cancel_unarmed_limit(&id, side, &stock)
        .await
        .map(Json)
        .map_err(trade_error_response)
}

/// 감사 로그 덤프 핸들러
pub async fn dumplog(
    State(state): State<ServerState>,
    Json(payload): Json<DumpLogRequest>,
) -> ApiResult<Vec<AuditEntry>> {
    let id = payload.id.as_deref().filter(|id| !id.is_empty());
    state
        .service
        .dump_log(id, payload.filename.as_deref())
        .await
        .map(Json)
        .map_err(trade_error_response)
}

/// 계정 요약 핸들러
pub async fn display_summary(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> ApiResult<AccountSummary> {
    state
        .service
        .account_summary(&id)
        .await
        .map(Json)
        .map_err(trade_error_response)
}

/// 헬스 체크 핸들러 (원장에 닿지 않으면 503)
pub async fn health(State(state): State<ServerState>) -> (StatusCode, Json<HealthResponse>) {
    let service = state.service.health().await;
    let (code, status) = if !service.ledger_available {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    } else if service.audit_failures > 0 {
        (StatusCode::OK, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };
    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            service,
        }),
    )
}
