//! 凭证源
//!
//! 凭证始终来自注入的外部凭证源，代码里不出现任何字面量密钥。
//! 默认实现从环境变量读取；测试和嵌入场景使用静态注入实现。

use crate::providers::{self, ProviderType};
use std::collections::HashMap;

/// 注入式凭证源
///
/// 网关视角下只读；所有并发请求管线共享同一个实例。
pub trait CredentialSource: Send + Sync {
    /// 获取指定 Provider 的 API Key，未配置或为空时返回 None
    fn get(&self, provider: ProviderType) -> Option<String>;

    fn has(&self, provider: ProviderType) -> bool {
        self.get(provider).is_some()
    }
}

/// 环境变量凭证源
///
/// 按注册表中声明的环境变量名读取，空字符串视为未配置。
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentialSource;

impl CredentialSource for EnvCredentialSource {
    fn get(&self, provider: ProviderType) -> Option<String> {
        let key = providers::resolve(provider).env_key;
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

/// 静态凭证源（测试 / 嵌入用）
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialSource {
    keys: HashMap<ProviderType, String>,
}

impl StaticCredentialSource {
    pub fn new(pairs: impl IntoIterator<Item = (ProviderType, String)>) -> Self {
        Self {
            keys: pairs.into_iter().collect(),
        }
    }

    /// 没有任何凭证的空凭证源
    pub fn empty() -> Self {
        Self::default()
    }
}

impl CredentialSource for StaticCredentialSource {
    fn get(&self, provider: ProviderType) -> Option<String> {
        self.keys.get(&provider).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_source() {
        let source = StaticCredentialSource::new([
            (ProviderType::Anthropic, "sk-ant-test".to_string()),
            (ProviderType::Google, "AIza-test".to_string()),
        ]);
        assert_eq!(
            source.get(ProviderType::Anthropic).as_deref(),
            Some("sk-ant-test")
        );
        assert!(source.has(ProviderType::Google));
        assert!(!source.has(ProviderType::OpenAi));
    }

    #[test]
    fn test_empty_source_has_nothing() {
        let source = StaticCredentialSource::empty();
        assert!(!source.has(ProviderType::Anthropic));
        assert!(!source.has(ProviderType::OpenAi));
        assert!(!source.has(ProviderType::Groq));
        assert!(!source.has(ProviderType::Google));
    }
}
