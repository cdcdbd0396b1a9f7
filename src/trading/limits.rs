use std::collections::HashMap;

use tokio::sync::Mutex;

use super::model::{LimitOrder, Side};

/// 트리거 가격이 없는 지정가 주문 테이블 ((사용자, 방향)당 하나)
#[derive(Default)]
pub struct LimitOrderBook {
    orders: Mutex<HashMap<(String, Side), LimitOrder>>,
}

impl LimitOrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// 등록 (기존 주문은 대체되어 반환됨)
    pub async fn set(&self, order: LimitOrder) -> Option<LimitOrder> {
        let key = (order.user_id.clone(), order.side);
        self.orders.lock().await.insert(key, order)
    }

    /// 심볼이 일치할 때만 꺼냄 (발동 등록 또는 취소)
    pub async fn take(&self, user_id: &str, side: Side, symbol: &str) -> Option<LimitOrder> {
        let mut orders = self.orders.lock().await;
        let key = (user_id.to_string(), side);
        let matches = orders.get(&key).map_or(false, |o| o.symbol == symbol);
        if matches {
            orders.remove(&key)
        } else {
            None
        }
    }

    /// 되돌려 놓기 (비어 있을 때만)
    pub async fn restore(&self, order: LimitOrder) {
        let key = (order.user_id.clone(), order.side);
        self.orders.lock().await.entry(key).or_insert(order);
    }

    pub async fn for_user(&self, user_id: &str) -> Vec<LimitOrder> {
        let orders = self.orders.lock().await;
        let mut found: Vec<LimitOrder> = orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by_key(|o| o.side.as_str());
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_set_supersedes_and_take_requires_symbol() {
        let book = LimitOrderBook::new();
        assert!(book.set(LimitOrder::unarmed("alice", "ABC", Side::Buy, Decimal::from(100))).await.is_none());
        let previous = book
            .set(LimitOrder::unarmed("alice", "XYZ", Side::Buy, Decimal::from(200)))
            .await
            .unwrap();
        assert_eq!(previous.symbol, "ABC");

        assert!(book.take("alice", Side::Buy, "ABC").await.is_none());
        assert!(book.take("alice", Side::Sell, "XYZ").await.is_none());
        let taken = book.take("alice", Side::Buy, "XYZ").await.unwrap();
        assert_eq!(taken.amount, Decimal::from(200));
        assert!(book.for_user("alice").await.is_empty());
    }
}
