//! 请求翻译器
//!
//! 把内部统一的消息列表（加可选系统提示词）翻译为各 Provider 期望的
//! 请求形状。输入消息不会被修改，翻译总是产出新的请求体。
//!
//! 三个协议族：
//! - Anthropic: 系统提示词是顶层 `system` 字段，历史里的 system
//!   消息折叠进该字段，消息角色只剩 user/assistant
//! - OpenAI 兼容（OpenAI / Groq 共用同一 schema）: 系统提示词作为
//!   首条 `system` 角色消息注入，历史原样透传
//! - Google: `assistant` 改名 `model`，消息包装为 `{role, parts:[{text}]}`，
//!   系统提示词走独立的 `systemInstruction` 字段，API Key 放在 URL
//!   查询参数而不是请求头

use crate::providers::ProviderType;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Anthropic Messages API 要求显式给出 max_tokens
const ANTHROPIC_MAX_TOKENS: u32 = 4096;

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    fn as_openai_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Google 的角色命名：assistant 对应 model
    fn as_google_str(&self) -> &'static str {
        match self {
            Role::Assistant => "model",
            _ => "user",
        }
    }
}

/// 内部统一的消息格式
///
/// 有序序列构成对话上下文，插入顺序即轮次顺序，翻译全程保持。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// 翻译产物：一个可直接发出的 Provider 请求
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
    /// 该请求是否以流式方式发出（Google 始终为 false）
    pub stream: bool,
}

/// 翻译入口
///
/// `api_key` 按协议族放进请求头或 URL 查询参数。`base_url` 由调用方
/// 提供（注册表默认值或按 Provider 覆写的端点）。
pub fn translate(
    provider: ProviderType,
    model: &str,
    system_prompt: Option<&str>,
    messages: &[ChatMessage],
    stream: bool,
    api_key: &str,
    base_url: &str,
) -> ProviderRequest {
    match provider {
        ProviderType::Anthropic => {
            translate_anthropic(model, system_prompt, messages, stream, api_key, base_url)
        }
        ProviderType::OpenAi | ProviderType::Groq => {
            translate_openai(model, system_prompt, messages, stream, api_key, base_url)
        }
        ProviderType::Google => translate_google(model, system_prompt, messages, api_key, base_url),
    }
}

/// 收集系统提示词：顶层提示词 + 历史中的 system 消息，按出现顺序拼接
fn collect_system(system_prompt: Option<&str>, messages: &[ChatMessage]) -> Option<String> {
    let parts: Vec<&str> = system_prompt
        .into_iter()
        .chain(
            messages
                .iter()
                .filter(|m| m.role == Role::System)
                .map(|m| m.content.as_str()),
        )
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

fn translate_anthropic(
    model: &str,
    system_prompt: Option<&str>,
    messages: &[ChatMessage],
    stream: bool,
    api_key: &str,
    base_url: &str,
) -> ProviderRequest {
    let history: Vec<Value> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| {
            json!({
                "role": m.role.as_openai_str(),
                "content": m.content,
            })
        })
        .collect();

    let mut body = json!({
        "model": model,
        "max_tokens": ANTHROPIC_MAX_TOKENS,
        "messages": history,
        "stream": stream,
    });
    if let Some(system) = collect_system(system_prompt, messages) {
        body["system"] = json!(system);
    }

    ProviderRequest {
        url: format!("{}/v1/messages", base_url),
        headers: vec![
            ("x-api-key", api_key.to_string()),
            ("anthropic-version", "2023-06-01".to_string()),
        ],
        body,
        stream,
    }
}

fn translate_openai(
    model: &str,
    system_prompt: Option<&str>,
    messages: &[ChatMessage],
    stream: bool,
    api_key: &str,
    base_url: &str,
) -> ProviderRequest {
    let mut wire_messages = Vec::with_capacity(messages.len() + 1);
    if let Some(system) = system_prompt {
        wire_messages.push(json!({"role": "system", "content": system}));
    }
    for m in messages {
        wire_messages.push(json!({
            "role": m.role.as_openai_str(),
            "content": m.content,
        }));
    }

    ProviderRequest {
        url: format!("{}/v1/chat/completions", base_url),
        headers: vec![("Authorization", format!("Bearer {}", api_key))],
        body: json!({
            "model": model,
            "messages": wire_messages,
            "stream": stream,
        }),
        stream,
    }
}

fn translate_google(
    model: &str,
    system_prompt: Option<&str>,
    messages: &[ChatMessage],
    api_key: &str,
    base_url: &str,
) -> ProviderRequest {
    let contents: Vec<Value> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| {
            json!({
                "role": m.role.as_google_str(),
                "parts": [{"text": m.content}],
            })
        })
        .collect();

    let mut body = json!({ "contents": contents });
    if let Some(system) = collect_system(system_prompt, messages) {
        body["systemInstruction"] = json!({"parts": [{"text": system}]});
    }

    ProviderRequest {
        // Key 走查询参数；模型名是路径段，协议层不支持增量流式
        url: format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            base_url, model, api_key
        ),
        headers: Vec::new(),
        body,
        stream: false,
    }
}
