/**
* filename : mod
* author : HAMA
* date: 2025. 6. 2.
* description: 지정가 주문 트리거 스케줄러
**/

pub mod trigger;

pub use trigger::{SchedulerConfig, TriggerScheduler};
