use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::model::{AccountAction, AuditEntry, EntryKind};
use crate::ledger::AccountSnapshot;

/// 감사 로그를 순번 순서로 재생하여 계좌 상태 재구성
///
/// 원장 반영 항목만 사용하며, 다른 경로로 바뀐 계좌는 재현되지 않습니다.
pub fn replay(entries: &[AuditEntry]) -> BTreeMap<String, AccountSnapshot> {
    let mut ordered: Vec<&AuditEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.sequence);

    let mut accounts: BTreeMap<String, AccountSnapshot> = BTreeMap::new();
    for entry in ordered {
        let (action, funds, symbol, shares) = match &entry.record.kind {
            EntryKind::AccountTransaction {
                action,
                funds,
                stock_symbol,
                shares,
            } => (action, funds, stock_symbol, shares),
            _ => continue,
        };
        let Some(user_id) = entry.record.username.as_deref() else {
            continue;
        };

        let account = accounts
            .entry(user_id.to_string())
            .or_insert_with(|| AccountSnapshot {
                user_id: user_id.to_string(),
                cash_balance: Decimal::ZERO,
                holdings: BTreeMap::new(),
            });

        match action {
            AccountAction::Add => account.cash_balance += *funds,
            AccountAction::Remove => account.cash_balance -= *funds,
        }
        if let (Some(symbol), Some(shares)) = (symbol, shares) {
            *account.holdings.entry(symbol.clone()).or_insert(0) += *shares;
        }
    }

    for account in accounts.values_mut() {
        account.holdings.retain(|_, q| *q != 0);
    }
    accounts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::model::{AuditRecord, CommandKind};

    fn entry(sequence: u64, user: &str, kind: EntryKind) -> AuditEntry {
        AuditEntry {
            sequence,
            record: AuditRecord {
                transaction_num: sequence,
                timestamp: 0,
                server: "test".to_string(),
                username: Some(user.to_string()),
                kind,
            },
        }
    }

    #[test]
    fn test_replay_rebuilds_cash_and_holdings() {
        let entries = vec![
            // 순서가 섞여 있어도 순번대로 적용
            entry(
                3,
                "alice",
                EntryKind::AccountTransaction {
                    action: AccountAction::Add,
                    funds: Decimal::from(120),
                    stock_symbol: Some("ABC".to_string()),
                    shares: Some(-2),
                },
            ),
            entry(
                1,
                "alice",
                EntryKind::AccountTransaction {
                    action: AccountAction::Add,
                    funds: Decimal::from(1000),
                    stock_symbol: None,
                    shares: None,
                },
            ),
            entry(
                2,
                "alice",
                EntryKind::AccountTransaction {
                    action: AccountAction::Remove,
                    funds: Decimal::from(300),
                    stock_symbol: Some("ABC".to_string()),
                    shares: Some(6),
                },
            ),
            entry(
                4,
                "alice",
                EntryKind::UserCommand {
                    command: CommandKind::Quote,
                    stock_symbol: Some("ABC".to_string()),
                    funds: None,
                    filename: None,
                },
            ),
        ];

        let accounts = replay(&entries);
        let alice = &accounts["alice"];
        assert_eq!(alice.cash_balance, Decimal::from(820));
        assert_eq!(alice.holdings.get("ABC"), Some(&4));
    }

    #[test]
    fn test_replay_drops_closed_positions() {
        let entries = vec![
            entry(
                1,
                "bob",
                EntryKind::AccountTransaction {
                    action: AccountAction::Remove,
                    funds: Decimal::ZERO,
                    stock_symbol: Some("XYZ".to_string()),
                    shares: Some(3),
                },
            ),
            entry(
                2,
                "bob",
                EntryKind::AccountTransaction {
                    action: AccountAction::Add,
                    funds: Decimal::ZERO,
                    stock_symbol: Some("XYZ".to_string()),
                    shares: Some(-3),
                },
            ),
        ];
        assert!(replay(&entries)["bob"].holdings.is_empty());
    }
}
