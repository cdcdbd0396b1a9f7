use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::api::handlers::*;
use crate::server::ServerState;

/// API 라우터 생성
pub fn create_api_router() -> Router<ServerState> {
    Router::new()
        // 계정 API
        .route("/users/addBal", put(add_balance))
        .route("/users/:id", get(get_user))
        .route("/users/:id/quote/:stock", get(get_quote))

        // 매수/매도 예약 API
        .route("/users/buy", post(buy))
        .route("/users/buy/commit", post(commit_buy))
        .route("/users/:id/buy/cancel", delete(cancel_buy))
        .route("/users/sell", post(sell))
        .route("/users/sell/commit", post(commit_sell))
        .route("/users/:id/sell/cancel", delete(cancel_sell))

        // 지정가 주문 API
        .route("/users/set/:type", post(set_amount))
        .route("/users/set/:type/trigger", post(set_trigger))
        .route("/users/:id/set/:type/:stock/cancel", delete(cancel_set))

        // 감사 로그 API
        .route("/dumplog", post(dumplog))
        .route("/displaysummary/:id", get(display_summary))

        .route("/health", get(health))
}
