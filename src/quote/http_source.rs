//! HTTP 시세 서비스 클라이언트
//!
//! 폴링 서비스의 `/quote` 엔드포인트에 `{Sym, Username}`을 보내고
//! `{Price, Timestamp, Cryptokey}` 응답을 받습니다.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Quote, QuoteError, QuoteSource};

#[derive(Debug, Serialize)]
struct QuoteRequest<'a> {
    #[serde(rename = "Sym")]
    sym: &'a str,
    #[serde(rename = "Username")]
    username: &'a str,
}

#[derive(Debug, Deserialize)]
struct QuoteReply {
    #[serde(rename = "Price")]
    price: Decimal,
    #[serde(rename = "Timestamp")]
    timestamp: i64,
    #[serde(rename = "Cryptokey", default)]
    cryptokey: String,
}

/// HTTP 시세 공급원
pub struct HttpQuoteSource {
    client: Client,
    base_url: String,
}

impl HttpQuoteSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, QuoteError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    async fn fetch(&self, symbol: &str, user_id: &str) -> Result<Quote, QuoteError> {
        let url = format!("{}/quote", self.base_url);
        debug!("시세 요청: {} ({}) -> {}", symbol, user_id, url);

        let reply = self
            .client
            .post(&url)
            .json(&QuoteRequest { sym: symbol, username: user_id })
            .send()
            .await
            .map_err(|e| QuoteError::Unavailable(e.to_string()))?
            .error_for_status()?
            .json::<QuoteReply>()
            .await?;

        Ok(Quote {
            symbol: symbol.to_string(),
            price: reply.price,
            timestamp: reply.timestamp,
            cryptokey: reply.cryptokey,
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}
