//! Provider 注册表
//!
//! 进程启动时定义的静态表：每个 Provider 的端点、凭证环境变量和
//! 已知模型列表。初始化后只读，注册表本身不做任何网络调用。

pub mod error;

pub use error::ProviderError;

use crate::credential::CredentialSource;
use crate::streaming::StreamFormat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider 标识（封闭集合）
///
/// 新增 Provider 意味着新增一个变体并在注册表和翻译器中补一个
/// match 分支，流归一化器的控制流不需要改动。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Anthropic,
    OpenAi,
    Groq,
    Google,
}

impl ProviderType {
    /// 线上标识符（小写，与客户端请求中的前缀一致）
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Anthropic => "anthropic",
            ProviderType::OpenAi => "openai",
            ProviderType::Groq => "groq",
            ProviderType::Google => "google",
        }
    }

    /// 从线上标识符解析
    pub fn parse(id: &str) -> Option<Self> {
        match id {
            "anthropic" => Some(ProviderType::Anthropic),
            "openai" => Some(ProviderType::OpenAi),
            "groq" => Some(ProviderType::Groq),
            "google" => Some(ProviderType::Google),
            _ => None,
        }
    }

    /// 该 Provider 的原生流式格式
    ///
    /// OpenAI 和 Groq 共享同一套 OpenAI 兼容 SSE 协议；
    /// Google 在协议层不支持增量流式，由归一化器补偿。
    pub fn stream_format(&self) -> StreamFormat {
        match self {
            ProviderType::Anthropic => StreamFormat::AnthropicSse,
            ProviderType::OpenAi | ProviderType::Groq => StreamFormat::OpenAiSse,
            ProviderType::Google => StreamFormat::GeminiJson,
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个 Provider 的静态配置
#[derive(Debug, Clone, Copy)]
pub struct ProviderConfig {
    pub id: ProviderType,
    /// 端点根 URL（不带 /v1 等路径段，由翻译器拼接）
    pub base_url: &'static str,
    /// 凭证所在的环境变量名（仅作为默认凭证源的查找键，
    /// 实际读取始终走注入的 CredentialSource）
    pub env_key: &'static str,
    /// 已知的模型标识列表
    pub models: &'static [&'static str],
}

/// 全部 Provider 的静态注册表
pub static REGISTRY: &[ProviderConfig] = &[
    ProviderConfig {
        id: ProviderType::Anthropic,
        base_url: "https://api.anthropic.com",
        env_key: "ANTHROPIC_API_KEY",
        models: &[
            "claude-sonnet-4-20250514",
            "claude-3-7-sonnet-20250219",
            "claude-3-5-haiku-20241022",
        ],
    },
    ProviderConfig {
        id: ProviderType::OpenAi,
        base_url: "https://api.openai.com",
        env_key: "OPENAI_API_KEY",
        models: &["gpt-4o", "gpt-4o-mini", "o3-mini"],
    },
    ProviderConfig {
        id: ProviderType::Groq,
        base_url: "https://api.groq.com/openai",
        env_key: "GROQ_API_KEY",
        models: &[
            "llama-3.3-70b-versatile",
            "llama-3.1-8b-instant",
            "mixtral-8x7b-32768",
        ],
    },
    ProviderConfig {
        id: ProviderType::Google,
        base_url: "https://generativelanguage.googleapis.com",
        env_key: "GEMINI_API_KEY",
        models: &["gemini-2.5-pro", "gemini-2.5-flash", "gemini-2.0-flash"],
    },
];

/// 按标识解析 Provider 配置
pub fn resolve(id: ProviderType) -> &'static ProviderConfig {
    // REGISTRY 覆盖了 ProviderType 的全部变体
    REGISTRY
        .iter()
        .find(|c| c.id == id)
        .expect("registry covers all provider variants")
}

/// 按线上标识符解析 Provider 配置
pub fn resolve_str(id: &str) -> Result<&'static ProviderConfig, ProviderError> {
    ProviderType::parse(id)
        .map(resolve)
        .ok_or_else(|| ProviderError::unknown_provider(id))
}

/// 检查指定 Provider 是否配置了凭证
pub fn has_credential(id: ProviderType, credentials: &dyn CredentialSource) -> bool {
    credentials.get(id).is_some()
}

/// 在注册表中查找包含指定模型名的 Provider
///
/// 用于客户端只给出裸模型名的场景，按注册表顺序返回第一个匹配。
pub fn find_by_model(model: &str) -> Option<&'static ProviderConfig> {
    REGISTRY.iter().find(|c| c.models.contains(&model))
}
