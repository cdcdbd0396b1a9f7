use async_trait::async_trait;
use tokio::sync::RwLock;

use super::model::{AuditEntry, AuditRecord};
use super::AuditError;

/// 감사 로그 싱크
///
/// `append`는 순번을 부여하고 반환하며, `query`는 순번 오름차순으로 돌려줍니다.
/// 추가된 항목은 수정되거나 삭제되지 않습니다.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn append(&self, record: AuditRecord) -> Result<u64, AuditError>;

    async fn query(&self, username: Option<&str>) -> Result<Vec<AuditEntry>, AuditError>;
}

/// 메모리 감사 로그
#[derive(Default)]
pub struct MemoryEventLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl EventSink for MemoryEventLog {
    async fn append(&self, record: AuditRecord) -> Result<u64, AuditError> {
        let mut entries = self.entries.write().await;
        let sequence = entries.len() as u64 + 1;
        entries.push(AuditEntry { sequence, record });
        Ok(sequence)
    }

    async fn query(&self, username: Option<&str>) -> Result<Vec<AuditEntry>, AuditError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| username.map_or(true, |u| e.belongs_to(u)))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::model::{CommandKind, EntryKind};

    fn command(user: &str, txn: u64) -> AuditRecord {
        AuditRecord {
            transaction_num: txn,
            timestamp: 0,
            server: "test".to_string(),
            username: Some(user.to_string()),
            kind: EntryKind::UserCommand {
                command: CommandKind::Quote,
                stock_symbol: Some("ABC".to_string()),
                funds: None,
                filename: None,
            },
        }
    }

    #[tokio::test]
    async fn test_sequence_is_strictly_increasing() {
        let log = MemoryEventLog::new();
        let first = log.append(command("alice", 1)).await.unwrap();
        let second = log.append(command("bob", 1)).await.unwrap();
        let third = log.append(command("alice", 2)).await.unwrap();
        assert!(first < second && second < third);
        assert_eq!(log.len().await, 3);
    }

    #[tokio::test]
    async fn test_query_filters_by_user_in_order() {
        let log = MemoryEventLog::new();
        log.append(command("alice", 1)).await.unwrap();
        log.append(command("bob", 2)).await.unwrap();
        log.append(command("alice", 3)).await.unwrap();

        let alice = log.query(Some("alice")).await.unwrap();
        assert_eq!(alice.len(), 2);
        assert!(alice[0].sequence < alice[1].sequence);
        assert_eq!(log.query(None).await.unwrap().len(), 3);
    }
}
