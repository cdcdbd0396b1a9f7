use anyhow::Context;

use day_trader::config::AppConfig;
use day_trader::server::start_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().context("설정 로드 실패")?;
    start_server(config).await.context("서버 실행 실패")?;

    Ok(())
}
