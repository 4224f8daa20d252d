//! relaycast — 多 Provider 流式聊天网关
//!
//! 将内部统一的消息格式多路复用到多个 LLM Provider（Anthropic、
//! OpenAI 兼容、Google），解析各家不同的流式编码并向客户端重新
//! 发出归一化的事件流。
//!
//! # 主要模块
//!
//! - `providers`: Provider 注册表和统一错误类型
//! - `credential`: 注入式凭证源（环境变量 / 静态注入）
//! - `router`: 模型选择器（显式指定 / auto 复杂度启发式）
//! - `converter`: 请求翻译器（内部格式 → 各 Provider 请求体）
//! - `streaming`: 流归一化器（SSE 行缓冲 / 单次 JSON 切词）
//! - `server`: HTTP 服务和响应中继（/chat /stream /models）

pub mod config;
pub mod converter;
pub mod credential;
pub mod providers;
pub mod router;
pub mod server;
pub mod streaming;

pub use config::{AppConfig, StreamConfig};
pub use converter::{translate, ChatMessage, ProviderRequest, Role};
pub use credential::{CredentialSource, EnvCredentialSource, StaticCredentialSource};
pub use providers::{ProviderConfig, ProviderError, ProviderType, REGISTRY};
pub use router::{classify_complexity, select, Selection, TaskComplexity};
pub use streaming::{
    normalize_sse, word_split_stream, EventStream, SseLineBuffer, StreamError, StreamEvent,
    StreamFormat,
};
