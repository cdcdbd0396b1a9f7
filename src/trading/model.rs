//! 주문 예약/지정가 주문의 기본 모델
//!
//! 매수/매도 방향, 예약(대기) 주문, 지정가 주문과 수량 계산 규칙을 정의합니다.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 매수/매도 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(format!("알 수 없는 주문 방향: {}", other)),
        }
    }
}

/// 원장이 다루는 금액 소수 자릿수 (센트 단위)
pub const MONEY_SCALE: u32 = 2;

/// 센트 단위로 표현 가능한 금액인지 여부
pub fn is_money(amount: Decimal) -> bool {
    amount.round_dp(MONEY_SCALE) == amount
}

/// 금액과 가격으로 정수 주식 수량 계산: floor(amount / price)
///
/// 가격이 0 이하이거나 계산이 범위를 벗어나면 0을 돌려줍니다.
pub fn quantity_for(amount: Decimal, price: Decimal) -> i64 {
    if price <= Decimal::ZERO || amount <= Decimal::ZERO {
        return 0;
    }
    amount
        .checked_div(price)
        .and_then(|shares| shares.floor().to_i64())
        .unwrap_or(0)
}

/// 체결 금액: price * quantity를 센트 단위로 반올림
///
/// 시세가 센트보다 세밀해도 원장, 대기 주문, 감사 로그가 같은 금액을 갖습니다.
pub fn total_for(price: Decimal, quantity: i64) -> Decimal {
    price
        .checked_mul(Decimal::from(quantity))
        .map(|total| total.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero))
        .unwrap_or(Decimal::ZERO)
}

/// 예약(대기) 주문
///
/// 검증과 가격 고정이 끝났지만 아직 원장에 반영되지 않은 거래 의도입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    /// 사용자 ID
    pub user_id: String,
    /// 종목 심볼
    pub symbol: String,
    /// 매수/매도 방향
    pub side: Side,
    /// 요청 금액
    pub requested_amount: Decimal,
    /// 고정된 시세
    pub price: Decimal,
    /// 정수 수량
    pub quantity: i64,
    /// 실제 차감(매수) 또는 입금(매도) 금액
    pub total: Decimal,
    /// 예약 시각
    pub created_at: DateTime<Utc>,
}

impl PendingOrder {
    pub fn new(user_id: &str, symbol: &str, side: Side, requested_amount: Decimal, price: Decimal) -> Self {
        let quantity = quantity_for(requested_amount, price);
        Self {
            user_id: user_id.to_string(),
            symbol: symbol.to_string(),
            side,
            requested_amount,
            price,
            quantity,
            total: total_for(price, quantity),
            created_at: Utc::now(),
        }
    }
}

/// 지정가 주문 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitStatus {
    /// 금액만 설정됨
    Unarmed,
    /// 트리거 가격이 설정되어 스케줄러에 등록됨
    Armed,
}

/// 트리거 가격이 아직 없는 지정가 주문
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitOrder {
    pub user_id: String,
    pub symbol: String,
    pub side: Side,
    pub amount: Decimal,
    pub status: LimitStatus,
    pub created_at: DateTime<Utc>,
}

impl LimitOrder {
    pub fn unarmed(user_id: &str, symbol: &str, side: Side, amount: Decimal) -> Self {
        Self {
            user_id: user_id.to_string(),
            symbol: symbol.to_string(),
            side,
            amount,
            status: LimitStatus::Unarmed,
            created_at: Utc::now(),
        }
    }

    /// 트리거 가격을 붙여 스케줄러용 주문으로 전환
    pub fn arm(self, trigger_price: Decimal) -> ArmedOrder {
        ArmedOrder {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            symbol: self.symbol,
            side: self.side,
            amount: self.amount,
            trigger_price,
            status: LimitStatus::Armed,
            armed_at: Utc::now(),
            attempts: 0,
        }
    }
}

/// 스케줄러가 소유하는 활성 지정가 주문
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmedOrder {
    pub id: Uuid,
    pub user_id: String,
    pub symbol: String,
    pub side: Side,
    pub amount: Decimal,
    pub trigger_price: Decimal,
    pub status: LimitStatus,
    pub armed_at: DateTime<Utc>,
    /// 실패한 체결 시도 횟수
    pub attempts: u32,
}

impl ArmedOrder {
    /// 매도는 시세가 트리거보다 높을 때, 매수는 낮을 때 발동
    pub fn should_fire(&self, price: Decimal) -> bool {
        match self.side {
            Side::Sell => price > self.trigger_price,
            Side::Buy => price < self.trigger_price,
        }
    }
}

/// 체결에 실패해 운영자 확인이 필요한 지정가 주문
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedExecution {
    pub order: ArmedOrder,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_floors_amount_over_price() {
        assert_eq!(quantity_for(Decimal::from(300), Decimal::from(50)), 6);
        assert_eq!(quantity_for(Decimal::from(320), Decimal::from(50)), 6);
        assert_eq!(quantity_for(Decimal::from(49), Decimal::from(50)), 0);
        assert_eq!(quantity_for(Decimal::new(10050, 2), Decimal::new(3350, 2)), 3);
    }

    #[test]
    fn test_quantity_with_invalid_price_is_zero() {
        assert_eq!(quantity_for(Decimal::from(300), Decimal::ZERO), 0);
        assert_eq!(quantity_for(Decimal::from(300), Decimal::from(-5)), 0);
        assert_eq!(quantity_for(Decimal::from(-300), Decimal::from(5)), 0);
    }

    #[test]
    fn test_pending_order_total_is_price_times_quantity() {
        let order = PendingOrder::new("alice", "ABC", Side::Buy, Decimal::from(320), Decimal::from(50));
        assert_eq!(order.quantity, 6);
        assert_eq!(order.total, Decimal::from(300));
    }

    #[test]
    fn test_total_is_rounded_to_cents() {
        // 33.333 * 3 = 99.999
        let order = PendingOrder::new("alice", "ABC", Side::Buy, Decimal::from(100), Decimal::new(33333, 3));
        assert_eq!(order.quantity, 3);
        assert_eq!(order.total, Decimal::from(100));
        assert_eq!(total_for(Decimal::new(33335, 3), 1), Decimal::new(3334, 2));
        assert!(is_money(order.total));
        assert!(!is_money(Decimal::new(4, 3)));
    }

    #[test]
    fn test_side_parsing() {
        assert_eq!("buy".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!("SELL".parse::<Side>().unwrap(), Side::Sell);
        assert!("hold".parse::<Side>().is_err());
    }

    #[test]
    fn test_trigger_conditions() {
        let sell = LimitOrder::unarmed("bob", "Y", Side::Sell, Decimal::from(100)).arm(Decimal::from(40));
        assert!(!sell.should_fire(Decimal::from(35)));
        assert!(!sell.should_fire(Decimal::from(40)));
        assert!(sell.should_fire(Decimal::from(42)));

        let buy = LimitOrder::unarmed("bob", "Y", Side::Buy, Decimal::from(100)).arm(Decimal::from(40));
        assert!(buy.should_fire(Decimal::from(39)));
        assert!(!buy.should_fire(Decimal::from(40)));
        assert_eq!(buy.status, LimitStatus::Armed);
    }
}
