/**
* filename : mod
* author : HAMA
* date: 2025. 6. 2.
* description: 추가 전용 감사 로그
**/

pub mod model;
pub mod replay;
pub mod sink;
pub mod trail;

pub use model::{AccountAction, AuditEntry, AuditRecord, CommandKind, EntryKind};
pub use replay::replay;
pub use sink::{EventSink, MemoryEventLog};
pub use trail::AuditTrail;

/// 감사 로그 에러
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("감사 로그 저장소 오류: {0}")]
    Database(#[from] sqlx::Error),
    #[error("감사 로그 직렬화 오류: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("감사 로그 사용 불가: {0}")]
    Unavailable(String),
}
