use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::trading::model::Side;

/// 사용자 명령 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    Add,
    Quote,
    Buy,
    CommitBuy,
    CancelBuy,
    Sell,
    CommitSell,
    CancelSell,
    SetBuyAmount,
    CancelSetBuy,
    SetBuyTrigger,
    SetSellAmount,
    CancelSetSell,
    SetSellTrigger,
    Dumplog,
    DisplaySummary,
}

impl CommandKind {
    pub fn reserve(side: Side) -> Self {
        match side {
            Side::Buy => CommandKind::Buy,
            Side::Sell => CommandKind::Sell,
        }
    }

    pub fn commit(side: Side) -> Self {
        match side {
            Side::Buy => CommandKind::CommitBuy,
            Side::Sell => CommandKind::CommitSell,
        }
    }

    pub fn cancel(side: Side) -> Self {
        match side {
            Side::Buy => CommandKind::CancelBuy,
            Side::Sell => CommandKind::CancelSell,
        }
    }

    pub fn set_amount(side: Side) -> Self {
        match side {
            Side::Buy => CommandKind::SetBuyAmount,
            Side::Sell => CommandKind::SetSellAmount,
        }
    }

    pub fn cancel_set(side: Side) -> Self {
        match side {
            Side::Buy => CommandKind::CancelSetBuy,
            Side::Sell => CommandKind::CancelSetSell,
        }
    }

    pub fn set_trigger(side: Side) -> Self {
        match side {
            Side::Buy => CommandKind::SetBuyTrigger,
            Side::Sell => CommandKind::SetSellTrigger,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Add => "ADD",
            CommandKind::Quote => "QUOTE",
            CommandKind::Buy => "BUY",
            CommandKind::CommitBuy => "COMMIT_BUY",
            CommandKind::CancelBuy => "CANCEL_BUY",
            CommandKind::Sell => "SELL",
            CommandKind::CommitSell => "COMMIT_SELL",
            CommandKind::CancelSell => "CANCEL_SELL",
            CommandKind::SetBuyAmount => "SET_BUY_AMOUNT",
            CommandKind::CancelSetBuy => "CANCEL_SET_BUY",
            CommandKind::SetBuyTrigger => "SET_BUY_TRIGGER",
            CommandKind::SetSellAmount => "SET_SELL_AMOUNT",
            CommandKind::CancelSetSell => "CANCEL_SET_SELL",
            CommandKind::SetSellTrigger => "SET_SELL_TRIGGER",
            CommandKind::Dumplog => "DUMPLOG",
            CommandKind::DisplaySummary => "DISPLAY_SUMMARY",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 계좌 현금 이동 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountAction {
    Add,
    Remove,
}

/// 감사 로그 항목 종류별 내용
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "log_type", rename_all = "snake_case")]
pub enum EntryKind {
    /// 사용자 명령 수신
    UserCommand {
        command: CommandKind,
        stock_symbol: Option<String>,
        funds: Option<Decimal>,
        filename: Option<String>,
    },
    /// 시세 서버 조회
    QuoteServer {
        stock_symbol: String,
        price: Decimal,
        quote_server_time: i64,
        cryptokey: String,
    },
    /// 원장 반영 (shares는 부호 있는 수량 변화)
    AccountTransaction {
        action: AccountAction,
        funds: Decimal,
        stock_symbol: Option<String>,
        shares: Option<i64>,
    },
    /// 스케줄러가 수행한 자동 체결
    SystemEvent {
        command: CommandKind,
        stock_symbol: Option<String>,
        funds: Option<Decimal>,
    },
    /// 거절되었거나 대상이 없던 명령
    ErrorEvent {
        command: CommandKind,
        stock_symbol: Option<String>,
        funds: Option<Decimal>,
        error_message: String,
    },
}

impl EntryKind {
    pub fn log_type(&self) -> &'static str {
        match self {
            EntryKind::UserCommand { .. } => "user_command",
            EntryKind::QuoteServer { .. } => "quote_server",
            EntryKind::AccountTransaction { .. } => "account_transaction",
            EntryKind::SystemEvent { .. } => "system_event",
            EntryKind::ErrorEvent { .. } => "error_event",
        }
    }
}

/// 싱크에 추가되기 전의 감사 기록
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// 명령 단위 트랜잭션 번호 (같은 명령의 항목끼리 공유)
    pub transaction_num: u64,
    /// 기록 시각 (epoch millis)
    pub timestamp: i64,
    pub server: String,
    pub username: Option<String>,
    #[serde(flatten)]
    pub kind: EntryKind,
}

/// 싱크가 순번을 부여한 감사 로그 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub sequence: u64,
    #[serde(flatten)]
    pub record: AuditRecord,
}

impl AuditEntry {
    pub fn belongs_to(&self, user_id: &str) -> bool {
        self.record.username.as_deref() == Some(user_id)
    }
}
