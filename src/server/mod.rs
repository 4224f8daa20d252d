//! HTTP 服务器模块
//!
//! 基于 Axum 的网关入口：组装共享状态、注册路由、启动监听。
//! 所有请求处理逻辑在 `handlers` 子模块。

pub mod handlers;

use crate::config::AppConfig;
use crate::credential::{CredentialSource, EnvCredentialSource};
use crate::providers::{self, ProviderType};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

/// 全局共享状态
///
/// HTTP 客户端在启动时创建一次，连接池跨请求复用。
pub struct AppState {
    pub http: reqwest::Client,
    pub credentials: Arc<dyn CredentialSource>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig, credentials: Arc<dyn CredentialSource>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            credentials,
            config,
        }
    }

    /// 指定 Provider 的上游端点：配置覆写优先，否则用注册表默认值
    pub fn base_url(&self, provider: ProviderType) -> &str {
        self.config
            .endpoint_overrides
            .get(&provider)
            .map(String::as_str)
            .unwrap_or(providers::resolve(provider).base_url)
    }
}

/// 构建路由表
pub fn build_router(state: Arc<AppState>) -> Router {
    let max_body = state.config.max_body_bytes;

    Router::new()
        .route("/chat", post(handlers::handle_chat))
        .route("/stream", post(handlers::handle_stream))
        .route("/models", get(handlers::handle_models))
        .route("/healthz", get(handlers::handle_healthz))
        .layer(RequestBodyLimitLayer::new(max_body))
        .with_state(state)
}

/// 启动网关服务器，阻塞直到进程退出
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let credentials: Arc<dyn CredentialSource> = Arc::new(EnvCredentialSource);
    let state = Arc::new(AppState::new(config, credentials));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("[SERVER] 网关已启动: http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
