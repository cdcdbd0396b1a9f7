use std::time::Duration;

use log::{error, info, warn};
use rand::{thread_rng, Rng};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tokio::time;

/// 가상 사용자의 거래 성향
#[derive(Debug, Clone)]
struct TraderProfile {
    user_id: String,
    symbols: Vec<&'static str>,
    deposit: u64,
    amount_range: (u64, u64),
    frequency_ms: u64,
    /// 예약 후 확정할 확률 (나머지는 취소)
    commit_ratio: f64,
}

impl TraderProfile {
    fn new(user_id: &str, symbols: Vec<&'static str>, deposit: u64, amount_range: (u64, u64), frequency_ms: u64, commit_ratio: f64) -> Self {
        Self {
            user_id: user_id.to_string(),
            symbols,
            deposit,
            amount_range,
            frequency_ms,
            commit_ratio,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    // 로깅 초기화
    env_logger::init();

    println!("dayTrader 시뮬레이션 프로그램 시작");

    let client = Client::new();
    let api_base_url = std::env::var("DAYTRADER_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

    let profiles = vec![
        // 소액 단타
        TraderProfile::new("sim_scalper", vec!["ABC", "XYZ"], 5_000, (50, 300), 1000, 0.9),
        // 중간 규모, 자주 취소
        TraderProfile::new("sim_swing", vec!["ABC", "QQQ"], 20_000, (500, 2_000), 3000, 0.5),
        // 대량 거래 + 지정가 주문
        TraderProfile::new("sim_fund", vec!["XYZ", "QQQ", "ABC"], 100_000, (2_000, 10_000), 8000, 0.8),
    ];

    let mut handles = Vec::new();
    for profile in profiles {
        let client = client.clone();
        let base = api_base_url.clone();
        handles.push(tokio::spawn(async move {
            simulate_trader(client, &base, profile).await;
        }));
    }

    for handle in handles {
        handle.await.map_err(|e| e.to_string())?;
    }

    Ok(())
}

async fn simulate_trader(client: Client, base: &str, profile: TraderProfile) {
    println!("시뮬레이션 시작: {} ({}ms 간격)", profile.user_id, profile.frequency_ms);

    if let Err(e) = call(&client, Method::PUT, &format!("{}/users/addBal", base), Some(json!({
        "id": profile.user_id,
        "amount": profile.deposit,
    }))).await {
        error!("초기 입금 실패: {} - {}", profile.user_id, e);
        return;
    }

    let mut interval = time::interval(Duration::from_millis(profile.frequency_ms));
    let mut round: u64 = 0;

    loop {
        interval.tick().await;
        round += 1;

        let (symbol, side, amount, commit) = {
            let mut rng = thread_rng();
            let symbol = profile.symbols[rng.gen_range(0..profile.symbols.len())];
            let side = if rng.gen_bool(0.6) { "buy" } else { "sell" };
            let amount = rng.gen_range(profile.amount_range.0..=profile.amount_range.1);
            (symbol, side, amount, rng.gen_bool(profile.commit_ratio))
        };

        match run_round(&client, base, &profile, symbol, side, amount, commit).await {
            Ok(summary) => info!("✅ {} {} {} {} -> {}", profile.user_id, side, symbol, amount, summary),
            Err(e) => {
                warn!("❌ {} {} {} 실패: {}", profile.user_id, side, symbol, e);
                if e.starts_with("연결") {
                    // 서버가 다운된 경우 잠시 대기
                    time::sleep(Duration::from_secs(5)).await;
                }
            }
        }

        // 열 번에 한 번은 지정가 주문
        if round % 10 == 0 {
            if let Err(e) = place_limit_order(&client, base, &profile, symbol).await {
                warn!("지정가 주문 실패: {} - {}", profile.user_id, e);
            }
        }
    }
}

/// 예약 후 확정 또는 취소
async fn run_round(
    client: &Client,
    base: &str,
    profile: &TraderProfile,
    symbol: &str,
    side: &str,
    amount: u64,
    commit: bool,
) -> Result<String, String> {
    call(client, Method::GET, &format!("{}/users/{}/quote/{}", base, profile.user_id, symbol), None).await?;

    let reserved = call(client, Method::POST, &format!("{}/users/{}", base, side), Some(json!({
        "id": profile.user_id,
        "stock": symbol,
        "amount": amount,
    }))).await?;

    if commit {
        call(client, Method::POST, &format!("{}/users/{}/commit", base, side), Some(json!({
            "id": profile.user_id,
        }))).await?;
        Ok(format!("확정 {}주", reserved["quantity"]))
    } else {
        call(client, Method::DELETE, &format!("{}/users/{}/{}/cancel", base, profile.user_id, side), None).await?;
        Ok("취소".to_string())
    }
}

/// 현재가보다 5% 낮은 매수 트리거 설정
async fn place_limit_order(client: &Client, base: &str, profile: &TraderProfile, symbol: &str) -> Result<(), String> {
    let quote = call(client, Method::GET, &format!("{}/users/{}/quote/{}", base, profile.user_id, symbol), None).await?;
    let price = quote["price"].as_f64().ok_or_else(|| "시세 응답에 가격 없음".to_string())?;
    let trigger = (price * 0.95 * 100.0).round() / 100.0;

    call(client, Method::POST, &format!("{}/users/set/buy", base), Some(json!({
        "ID": profile.user_id,
        "stock": symbol,
        "amount": profile.amount_range.0,
    }))).await?;
    call(client, Method::POST, &format!("{}/users/set/buy/trigger", base), Some(json!({
        "ID": profile.user_id,
        "stock": symbol,
        "price": trigger,
    }))).await?;

    info!("지정가 매수 등록: {} {} @ {}", profile.user_id, symbol, trigger);
    Ok(())
}

async fn call(client: &Client, method: Method, url: &str, body: Option<Value>) -> Result<Value, String> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await.map_err(|e| format!("연결 실패: {}", e))?;

    let status = response.status();
    let text = response.text().await.map_err(|e| e.to_string())?;
    if status.is_success() {
        serde_json::from_str(&text).map_err(|e| e.to_string())
    } else {
        Err(format!("HTTP {}: {}", status, text))
    }
}
