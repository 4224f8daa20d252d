//! 配置管理模块
//!
//! 服务和流式传输的行为参数，全部可通过环境变量覆盖，
//! 未设置时使用默认值。

use crate::providers::{ProviderType, REGISTRY};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 请求体大小上限（字节）
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// 流式传输配置
    #[serde(default)]
    pub stream: StreamConfig,

    /// 按 Provider 覆写上游端点（测试 / 私有部署 / 镜像）
    ///
    /// 未覆写的 Provider 使用注册表里的默认地址。
    #[serde(default)]
    pub endpoint_overrides: HashMap<ProviderType, String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024 // 2MB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            stream: StreamConfig::default(),
            endpoint_overrides: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// 从环境变量构建配置
    ///
    /// 解析失败的变量按未设置处理。
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(host) = env_var("RELAYCAST_HOST") {
            config.host = host;
        }
        if let Some(port) = env_parse("RELAYCAST_PORT") {
            config.port = port;
        }
        if let Some(bytes) = env_parse("RELAYCAST_MAX_BODY_BYTES") {
            config.max_body_bytes = bytes;
        }
        if let Some(ms) = env_parse("RELAYCAST_WORD_DELAY_MS") {
            config.stream.word_delay_ms = ms;
        }
        if let Some(ms) = env_parse("RELAYCAST_REQUEST_TIMEOUT_MS") {
            config.stream.request_timeout_ms = ms;
        }
        if let Some(ms) = env_parse("RELAYCAST_FIRST_BYTE_TIMEOUT_MS") {
            config.stream.first_byte_timeout_ms = ms;
        }
        for provider_config in REGISTRY {
            let key = format!(
                "RELAYCAST_{}_BASE_URL",
                provider_config.id.as_str().to_uppercase()
            );
            if let Some(url) = env_var(&key) {
                config
                    .endpoint_overrides
                    .insert(provider_config.id, url.trim_end_matches('/').to_string());
            }
        }
        config
    }

    /// 监听地址字符串
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 流式配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// 非流式 Provider 切词输出的逐词延迟（毫秒）
    ///
    /// 仅用于模拟增量体验，不是正确性要求，取值是可调项。
    #[serde(default = "default_word_delay_ms")]
    pub word_delay_ms: u64,

    /// 非流式上游调用的整体超时（毫秒）
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// 流式上游调用等待首字节的超时（毫秒）
    #[serde(default = "default_first_byte_timeout_ms")]
    pub first_byte_timeout_ms: u64,
}

fn default_word_delay_ms() -> u64 {
    15
}

fn default_request_timeout_ms() -> u64 {
    120_000 // 2 分钟
}

fn default_first_byte_timeout_ms() -> u64 {
    30_000 // 30 秒
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            word_delay_ms: default_word_delay_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            first_byte_timeout_ms: default_first_byte_timeout_ms(),
        }
    }
}

impl StreamConfig {
    pub fn word_delay(&self) -> Duration {
        Duration::from_millis(self.word_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn first_byte_timeout(&self) -> Duration {
        Duration::from_millis(self.first_byte_timeout_ms)
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_var(key).and_then(|v| v.parse().ok())
}
