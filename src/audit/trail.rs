use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error};
use rust_decimal::Decimal;

use super::model::{AccountAction, AuditEntry, AuditRecord, CommandKind, EntryKind};
use super::sink::EventSink;
use super::AuditError;
use crate::quote::Quote;

/// 감사 로그 기록기
///
/// 명령마다 `next_transaction`으로 트랜잭션 번호를 받아 그 명령의 모든 항목에 붙입니다.
/// 추가 실패는 업무 처리를 막지 않고, 에러 로그와 함께 `failed_appends`로 집계됩니다.
pub struct AuditTrail {
    sink: Arc<dyn EventSink>,
    server: String,
    transactions: AtomicU64,
    failed_appends: AtomicU64,
}

impl AuditTrail {
    pub fn new(sink: Arc<dyn EventSink>, server: impl Into<String>) -> Self {
        Self {
            sink,
            server: server.into(),
            transactions: AtomicU64::new(0),
            failed_appends: AtomicU64::new(0),
        }
    }

    /// 프로세스 내에서 엄격히 증가하는 트랜잭션 번호 발급
    pub fn next_transaction(&self) -> u64 {
        self.transactions.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// 추가 실패 누적 횟수
    pub fn failed_appends(&self) -> u64 {
        self.failed_appends.load(Ordering::Relaxed)
    }

    async fn append(&self, transaction_num: u64, username: Option<&str>, kind: EntryKind) -> Option<u64> {
        let log_type = kind.log_type();
        let record = AuditRecord {
            transaction_num,
            timestamp: Utc::now().timestamp_millis(),
            server: self.server.clone(),
            username: username.map(str::to_string),
            kind,
        };

        match self.sink.append(record).await {
            Ok(sequence) => {
                debug!("감사 로그 추가: #{} {} (txn {})", sequence, log_type, transaction_num);
                Some(sequence)
            }
            Err(e) => {
                self.failed_appends.fetch_add(1, Ordering::Relaxed);
                error!("감사 로그 추가 실패 ({} txn {}): {}", log_type, transaction_num, e);
                None
            }
        }
    }

    pub async fn user_command(
        &self,
        transaction_num: u64,
        user_id: &str,
        command: CommandKind,
        symbol: Option<&str>,
        funds: Option<Decimal>,
    ) -> Option<u64> {
        let kind = EntryKind::UserCommand {
            command,
            stock_symbol: symbol.map(str::to_string),
            funds,
            filename: None,
        };
        self.append(transaction_num, Some(user_id), kind).await
    }

    /// DUMPLOG는 사용자 없이도 호출될 수 있음
    pub async fn dump_command(
        &self,
        transaction_num: u64,
        user_id: Option<&str>,
        filename: Option<&str>,
    ) -> Option<u64> {
        let kind = EntryKind::UserCommand {
            command: CommandKind::Dumplog,
            stock_symbol: None,
            funds: None,
            filename: filename.map(str::to_string),
        };
        self.append(transaction_num, user_id, kind).await
    }

    pub async fn quote_hit(&self, transaction_num: u64, user_id: &str, quote: &Quote) -> Option<u64> {
        let kind = EntryKind::QuoteServer {
            stock_symbol: quote.symbol.clone(),
            price: quote.price,
            quote_server_time: quote.timestamp,
            cryptokey: quote.cryptokey.clone(),
        };
        self.append(transaction_num, Some(user_id), kind).await
    }

    pub async fn account_transaction(
        &self,
        transaction_num: u64,
        user_id: &str,
        action: AccountAction,
        funds: Decimal,
        symbol: Option<&str>,
        shares: Option<i64>,
    ) -> Option<u64> {
        let kind = EntryKind::AccountTransaction {
            action,
            funds,
            stock_symbol: symbol.map(str::to_string),
            shares,
        };
        self.append(transaction_num, Some(user_id), kind).await
    }

    pub async fn system_event(
        &self,
        transaction_num: u64,
        user_id: &str,
        command: CommandKind,
        symbol: &str,
        funds: Decimal,
    ) -> Option<u64> {
        let kind = EntryKind::SystemEvent {
            command,
            stock_symbol: Some(symbol.to_string()),
            funds: Some(funds),
        };
        self.append(transaction_num, Some(user_id), kind).await
    }

    pub async fn error_event(
        &self,
        transaction_num: u64,
        user_id: &str,
        command: CommandKind,
        symbol: Option<&str>,
        funds: Option<Decimal>,
        message: &str,
    ) -> Option<u64> {
        let kind = EntryKind::ErrorEvent {
            command,
            stock_symbol: symbol.map(str::to_string),
            funds,
            error_message: message.to_string(),
        };
        self.append(transaction_num, Some(user_id), kind).await
    }

    pub async fn query(&self, user_id: Option<&str>) -> Result<Vec<AuditEntry>, AuditError> {
        self.sink.query(user_id).await
    }
}
