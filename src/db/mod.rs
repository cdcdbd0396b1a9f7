pub mod models;
pub mod repository;

use std::str::FromStr;

use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Error as SqlxError;

pub use repository::{AccountRepository, AuditLogRepository};

/// SQLite 데이터베이스 초기화 및 연결
pub async fn init_database(database_url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    info!("🗄️  SQLite 데이터베이스 초기화 중... ({})", database_url);

    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    // 메모리 DB는 연결마다 별도 DB가 되므로 단일 연결을 계속 유지
    let in_memory = database_url.contains(":memory:");
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(max_connections.max(1))
    };

    let pool = pool_options.connect_with(options).await?;

    // 테이블 생성
    create_tables(&pool).await?;

    info!("✅ 데이터베이스 초기화 완료");

    Ok(pool)
}

/// 필요한 테이블 생성
async fn create_tables(pool: &SqlitePool) -> Result<(), SqlxError> {
    // 계좌 테이블 (현금은 센트 단위 정수)
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS accounts (
            user_id TEXT PRIMARY KEY,
            cash_cents INTEGER NOT NULL DEFAULT 0 CHECK (cash_cents >= 0),
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )"
    )
    .execute(pool)
    .await?;

    // 보유 종목 테이블
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS holdings (
            user_id TEXT NOT NULL,
            symbol TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (user_id, symbol)
        )"
    )
    .execute(pool)
    .await?;

    // 감사 로그 테이블
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS audit_logs (
            sequence INTEGER PRIMARY KEY AUTOINCREMENT,
            transaction_num INTEGER NOT NULL,
            timestamp INTEGER NOT NULL,
            server TEXT NOT NULL,
            username TEXT,
            log_type TEXT NOT NULL,
            details TEXT NOT NULL
        )"
    )
    .execute(pool)
    .await?;

    // 인덱스 생성
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_logs_username ON audit_logs(username)")
        .execute(pool)
        .await?;

    info!("📋 테이블 생성 완료");

    Ok(())
}
