use async_trait::async_trait;
use log::debug;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::sqlite::SqlitePool;

use super::models::{AuditLogRecord, HoldingRecord};
use crate::audit::{AuditEntry, AuditError, AuditRecord, EntryKind, EventSink};
use crate::ledger::{AccountSnapshot, LedgerDelta, LedgerError, LedgerGateway};

/// 센트 정수로 변환 (센트 미만 금액은 반올림하지 않고 거절)
fn to_cents(amount: Decimal) -> Result<i64, LedgerError> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .filter(|cents| cents.fract().is_zero())
        .and_then(|cents| cents.to_i64())
        .ok_or(LedgerError::InvalidAmount(amount))
}

fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// 계좌 저장소 (SQLite 원장)
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 계좌가 없으면 생성
    async fn ensure_account(&self, user_id: &str) -> Result<(), LedgerError> {
        sqlx::query("INSERT OR IGNORE INTO accounts (user_id, cash_cents) VALUES (?, 0)")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl LedgerGateway for AccountRepository {
    async fn get_balance(&self, user_id: &str) -> Result<Decimal, LedgerError> {
        self.ensure_account(user_id).await?;
        let cents = sqlx::query_scalar::<_, i64>("SELECT cash_cents FROM accounts WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(from_cents(cents))
    }

    async fn get_holding(&self, user_id: &str, symbol: &str) -> Result<i64, LedgerError> {
        self.ensure_account(user_id).await?;
        let quantity = sqlx::query_scalar::<_, i64>(
            "SELECT quantity FROM holdings WHERE user_id = ? AND symbol = ?"
        )
        .bind(user_id)
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        Ok(quantity.unwrap_or(0))
    }

    /// 현금과 종목 변경을 하나의 트랜잭션에서 조건부로 반영
    async fn apply_delta(&self, user_id: &str, delta: &LedgerDelta) -> Result<(), LedgerError> {
        let cash_cents = to_cents(delta.cash)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO accounts (user_id, cash_cents) VALUES (?, 0)")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let updated = sqlx::query(
            "UPDATE accounts
             SET cash_cents = cash_cents + ?, updated_at = CURRENT_TIMESTAMP
             WHERE user_id = ? AND cash_cents + ? >= 0"
        )
        .bind(cash_cents)
        .bind(user_id)
        .bind(cash_cents)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(LedgerError::InsufficientCash);
        }

        for (symbol, change) in &delta.holdings {
            if *change >= 0 {
                sqlx::query(
                    "INSERT INTO holdings (user_id, symbol, quantity)
                     VALUES (?, ?, ?)
                     ON CONFLICT(user_id, symbol) DO UPDATE SET
                        quantity = quantity + excluded.quantity,
                        updated_at = CURRENT_TIMESTAMP"
                )
                .bind(user_id)
                .bind(symbol)
                .bind(*change)
                .execute(&mut *tx)
                .await?;
            } else {
                let updated = sqlx::query(
                    "UPDATE holdings
                     SET quantity = quantity + ?, updated_at = CURRENT_TIMESTAMP
                     WHERE user_id = ? AND symbol = ? AND quantity + ? >= 0"
                )
                .bind(*change)
                .bind(user_id)
                .bind(symbol)
                .bind(*change)
                .execute(&mut *tx)
                .await?;

                if updated.rows_affected() == 0 {
                    tx.rollback().await?;
                    return Err(LedgerError::InsufficientShares(symbol.clone()));
                }
            }
        }

        tx.commit().await?;
        debug!("원장 반영: {} (현금 {:+} cents)", user_id, cash_cents);

        Ok(())
    }

    async fn snapshot(&self, user_id: &str) -> Result<AccountSnapshot, LedgerError> {
        let cash_balance = self.get_balance(user_id).await?;
        let holdings = sqlx::query_as::<_, HoldingRecord>(
            "SELECT symbol, quantity
             FROM holdings
             WHERE user_id = ? AND quantity != 0
             ORDER BY symbol"
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(AccountSnapshot {
            user_id: user_id.to_string(),
            cash_balance,
            holdings: holdings.into_iter().map(|h| (h.symbol, h.quantity)).collect(),
        })
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// 감사 로그 저장소
pub struct AuditLogRepository {
    pool: SqlitePool,
}

impl AuditLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventSink for AuditLogRepository {
    /// 로그 기록 (순번은 AUTOINCREMENT로 부여)
    async fn append(&self, record: AuditRecord) -> Result<u64, AuditError> {
        let details = serde_json::to_string(&record.kind)?;
        let result = sqlx::query(
            "INSERT INTO audit_logs (transaction_num, timestamp, server, username, log_type, details)
             VALUES (?, ?, ?, ?, ?, ?)"
        )
        .bind(record.transaction_num as i64)
        .bind(record.timestamp)
        .bind(&record.server)
        .bind(record.username.as_deref())
        .bind(record.kind.log_type())
        .bind(details)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid() as u64)
    }

    /// 사용자별 로그 조회 (순번 오름차순)
    async fn query(&self, username: Option<&str>) -> Result<Vec<AuditEntry>, AuditError> {
        let rows = sqlx::query_as::<_, AuditLogRecord>(
            "SELECT sequence, transaction_num, timestamp, server, username, log_type, details
             FROM audit_logs
             WHERE (? IS NULL OR username = ?)
             ORDER BY sequence ASC"
        )
        .bind(username)
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<AuditEntry, AuditError> {
                let kind: EntryKind = serde_json::from_str(&row.details)?;
                Ok(AuditEntry {
                    sequence: row.sequence as u64,
                    record: AuditRecord {
                        transaction_num: row.transaction_num as u64,
                        timestamp: row.timestamp,
                        server: row.server,
                        username: row.username,
                        kind,
                    },
                })
            })
            .collect()
    }
}
