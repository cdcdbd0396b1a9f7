use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::{Quote, QuoteError, QuoteSource};

/// 가짜 시장 데이터 (심볼별 기준 가격)
#[derive(Debug, Clone)]
pub struct FakeMarketData {
    pub symbol: String,
    pub base_price: Decimal,
}

struct SimState {
    rng: StdRng,
    prices: HashMap<String, Decimal>,
}

/// 시뮬레이션 시세 공급원
///
/// 외부 시세 서버 없이 서버를 띄울 때 사용합니다.
/// 심볼마다 랜덤 워크로 가격을 움직이며, 처음 보는 심볼은 10~500 사이에서 시작합니다.
pub struct SimulatedQuoteSource {
    state: Mutex<SimState>,
    /// 1회 조회당 최대 변동률 (0.02 = 2%)
    volatility: f64,
}

impl SimulatedQuoteSource {
    pub fn new(seed: u64, volatility: f64) -> Self {
        Self {
            state: Mutex::new(SimState {
                rng: StdRng::seed_from_u64(seed),
                prices: HashMap::new(),
            }),
            volatility: volatility.abs(),
        }
    }

    /// 기준 가격 등록
    pub fn with_market(self, data: FakeMarketData) -> Self {
        if let Ok(mut state) = self.state.try_lock() {
            state.prices.insert(data.symbol, data.base_price);
        }
        self
    }
}

impl Default for SimulatedQuoteSource {
    fn default() -> Self {
        Self::new(468, 0.02)
    }
}

#[async_trait]
impl QuoteSource for SimulatedQuoteSource {
    async fn fetch(&self, symbol: &str, user_id: &str) -> Result<Quote, QuoteError> {
        let mut state = self.state.lock().await;
        let SimState { rng, prices } = &mut *state;

        let next = match prices.get(symbol) {
            Some(current) => {
                let change = if self.volatility > 0.0 {
                    rng.gen_range(-self.volatility..=self.volatility)
                } else {
                    0.0
                };
                let factor = Decimal::try_from(1.0 + change).unwrap_or(Decimal::ONE);
                (*current * factor).round_dp(2).max(Decimal::new(1, 2))
            }
            None => Decimal::new(rng.gen_range(1_000..=50_000), 2),
        };
        prices.insert(symbol.to_string(), next);

        let cryptokey: String = rng
            .sample_iter(&Alphanumeric)
            .take(44)
            .map(char::from)
            .collect();

        debug!("시뮬레이션 시세: {} = {} ({})", symbol, next, user_id);

        Ok(Quote {
            symbol: symbol.to_string(),
            price: next,
            timestamp: Utc::now().timestamp_millis(),
            cryptokey,
        })
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
