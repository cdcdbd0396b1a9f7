//! 환경 변수 기반 서버 설정

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheTtl;
use crate::scheduler::SchedulerConfig;

/// 설정 로드 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("환경 변수 {key} 값이 잘못됨: {value}")]
    Invalid { key: &'static str, value: String },
}

/// 서버 설정
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// 없으면 메모리 원장과 메모리 감사 로그 사용
    pub database_url: Option<String>,
    /// 없으면 시뮬레이션 시세 사용
    pub quote_service_url: Option<String>,
    pub quote_ttl: CacheTtl,
    pub quote_timeout: Duration,
    pub ledger_timeout: Duration,
    pub scheduler: SchedulerConfig,
    pub server_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            quote_service_url: None,
            quote_ttl: CacheTtl::default(),
            quote_timeout: Duration::from_millis(2000),
            ledger_timeout: Duration::from_millis(2000),
            scheduler: SchedulerConfig::default(),
            server_name: "own-server".to_string(),
        }
    }
}

impl AppConfig {
    /// 환경 변수에서 설정 로드 (없는 값은 기본값)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let quote_ttl = match parse::<u64>(&lookup, "QUOTE_TTL_SECS")? {
            Some(secs) => CacheTtl::from_secs(secs),
            None => defaults.quote_ttl,
        };
        let millis = |key: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            Ok(parse::<u64>(&lookup, key)?.map(Duration::from_millis).unwrap_or(default))
        };

        Ok(Self {
            bind_addr: text("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: text("DATABASE_URL"),
            quote_service_url: text("QUOTE_SERVICE_URL"),
            quote_ttl,
            quote_timeout: millis("QUOTE_TIMEOUT_MS", defaults.quote_timeout)?,
            ledger_timeout: millis("LEDGER_TIMEOUT_MS", defaults.ledger_timeout)?,
            scheduler: SchedulerConfig {
                poll_interval: millis("TRIGGER_POLL_INTERVAL_MS", defaults.scheduler.poll_interval)?,
                max_fire_attempts: parse::<u32>(&lookup, "TRIGGER_MAX_ATTEMPTS")?
                    .unwrap_or(defaults.scheduler.max_fire_attempts)
                    .max(1),
            },
            server_name: text("SERVER_NAME").unwrap_or(defaults.server_name),
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
