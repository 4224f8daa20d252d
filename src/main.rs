//! relaycast 网关进程入口
//!
//! 初始化日志、读取环境配置，然后把控制权交给服务器。

use relaycast::config::AppConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("relaycast=info")),
        )
        .init();

    let config = AppConfig::from_env();
    relaycast::server::run(config).await
}
