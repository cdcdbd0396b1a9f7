/**
* filename : mod
* author : HAMA
* date: 2025. 6. 2.
* description: 주문 예약/확정 및 지정가 주문 처리
**/

pub mod error;
pub mod limits;
pub mod locks;
pub mod model;
pub mod service;
pub mod staging;

pub use error::TradeError;
pub use model::{ArmedOrder, FailedExecution, LimitOrder, LimitStatus, PendingOrder, Side};
pub use service::{AccountSummary, ServiceHealth, TradingService};
pub use staging::OrderStagingEngine;
