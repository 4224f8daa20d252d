//! 模型选择器
//!
//! 把客户端请求的模型字符串（显式、"auto" 或 "provider/model"）
//! 和任务文本解析为具体的 (Provider, 模型) 对。选择过程是纯函数：
//! 相同输入总是产生相同结果。

use crate::credential::CredentialSource;
use crate::providers::{self, ProviderError, ProviderType};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// "auto" 哨兵值：走复杂度启发式
const AUTO_SENTINEL: &str = "auto";

/// 高复杂度关键词
const HIGH_KEYWORDS: &[&str] = &[
    "build",
    "architect",
    "full app",
    "database schema",
    "refactor entire",
];

/// 低复杂度关键词
const LOW_KEYWORDS: &[&str] = &["fix typo", "rename", "simple"];

/// 无关键词命中时的长度阈值
const HIGH_LENGTH_THRESHOLD: usize = 500;
const LOW_LENGTH_THRESHOLD: usize = 100;

/// 任务复杂度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskComplexity {
    Low,
    Medium,
    High,
}

/// 选择结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub provider: ProviderType,
    pub model: String,
}

impl Selection {
    pub fn new(provider: ProviderType, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

/// 按复杂度排序的候选列表
///
/// 高复杂度先选质量最高的，低复杂度先选最便宜的。
/// 每个列表覆盖全部四个 Provider，确保只要有任意一个凭证就能选出结果。
static HIGH_PRIORITY: &[(ProviderType, &str)] = &[
    (ProviderType::Anthropic, "claude-sonnet-4-20250514"),
    (ProviderType::OpenAi, "gpt-4o"),
    (ProviderType::Google, "gemini-2.5-pro"),
    (ProviderType::Groq, "llama-3.3-70b-versatile"),
];

static MEDIUM_PRIORITY: &[(ProviderType, &str)] = &[
    (ProviderType::OpenAi, "gpt-4o-mini"),
    (ProviderType::Anthropic, "claude-3-5-haiku-20241022"),
    (ProviderType::Groq, "llama-3.3-70b-versatile"),
    (ProviderType::Google, "gemini-2.5-flash"),
];

static LOW_PRIORITY: &[(ProviderType, &str)] = &[
    (ProviderType::Groq, "llama-3.1-8b-instant"),
    (ProviderType::Google, "gemini-2.5-flash"),
    (ProviderType::OpenAi, "gpt-4o-mini"),
    (ProviderType::Anthropic, "claude-3-5-haiku-20241022"),
];

/// 任务复杂度分类（确定性：关键词 + 长度）
///
/// 关键词匹配不区分大小写，高复杂度关键词优先于低复杂度关键词；
/// 长度按字符数计算，500 字符整为 medium，501 起为 high，
/// 100 字符整为 medium，99 及以下为 low。
pub fn classify_complexity(task_text: &str) -> TaskComplexity {
    let lower = task_text.to_lowercase();

    if HIGH_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return TaskComplexity::High;
    }
    if LOW_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return TaskComplexity::Low;
    }

    let len = task_text.chars().count();
    if len > HIGH_LENGTH_THRESHOLD {
        TaskComplexity::High
    } else if len < LOW_LENGTH_THRESHOLD {
        TaskComplexity::Low
    } else {
        TaskComplexity::Medium
    }
}

/// 复杂度对应的候选列表
fn priority_list(complexity: TaskComplexity) -> &'static [(ProviderType, &'static str)] {
    match complexity {
        TaskComplexity::High => HIGH_PRIORITY,
        TaskComplexity::Medium => MEDIUM_PRIORITY,
        TaskComplexity::Low => LOW_PRIORITY,
    }
}

/// 解析显式模型字符串
///
/// "provider/model" 前缀在 Provider 存在且有凭证时原样通过
/// （模型名不校验，无效模型交给上游拒绝）；裸模型名在注册表中
/// 搜索，取第一个同时有凭证的匹配。两种解析都失败时返回 None，
/// 由调用方回落到启发式。
fn resolve_explicit(requested: &str, credentials: &dyn CredentialSource) -> Option<Selection> {
    if let Some((prefix, model)) = requested.split_once('/') {
        let provider = ProviderType::parse(prefix)?;
        if !model.is_empty() && credentials.has(provider) {
            return Some(Selection::new(provider, model));
        }
        return None;
    }

    let config = providers::find_by_model(requested)?;
    if credentials.has(config.id) {
        return Some(Selection::new(config.id, requested));
    }
    None
}

/// 选择 (Provider, 模型)
///
/// 显式请求优先；缺省、"auto" 或显式解析失败时走复杂度启发式，
/// 沿候选列表取第一个有凭证的条目。所有候选都没有凭证时返回
/// `NoProviderAvailable`。
pub fn select(
    requested_model: Option<&str>,
    task_text: &str,
    credentials: &dyn CredentialSource,
) -> Result<Selection, ProviderError> {
    if let Some(requested) = requested_model {
        let requested = requested.trim();
        if !requested.is_empty() && requested != AUTO_SENTINEL {
            if let Some(selection) = resolve_explicit(requested, credentials) {
                debug!(
                    "[ROUTER] 显式选择: provider={} model={}",
                    selection.provider, selection.model
                );
                return Ok(selection);
            }
            debug!("[ROUTER] 显式模型 {:?} 解析失败，回落到启发式", requested);
        }
    }

    let complexity = classify_complexity(task_text);
    for (provider, model) in priority_list(complexity) {
        if credentials.has(*provider) {
            debug!(
                "[ROUTER] 启发式选择: complexity={:?} provider={} model={}",
                complexity, provider, model
            );
            return Ok(Selection::new(*provider, *model));
        }
    }

    Err(ProviderError::NoProviderAvailable)
}
