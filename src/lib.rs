//! dayTrader: 주문 예약/확정, 지정가 트리거 스케줄러, 시세 캐시, 감사 로그를 갖춘
//! 데이 트레이딩 서버

pub mod api;
pub mod audit;
pub mod cache;
pub mod config;
pub mod db;
pub mod ledger;
pub mod quote;
pub mod scheduler;
pub mod server;
pub mod trading;
