//! 统一的 Provider 错误类型
//!
//! 网关内所有对客户端可见的错误都收敛到这里，按照
//! 「选择失败 / 上游失败 / 超时」分类，并提供 HTTP 状态码映射。

use std::error::Error;
use std::fmt;

/// 上游错误消息转发给客户端前的最大长度
const UPSTREAM_MESSAGE_LIMIT: usize = 200;

/// Provider 统一错误类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// 客户端指定了注册表中不存在的 Provider
    UnknownProvider(String),

    /// 所有候选 Provider 都没有配置凭证
    ///
    /// 这是一个合法的降级状态，必须作为错误载荷返回给客户端，
    /// 而不是让连接崩溃。
    NoProviderAvailable,

    /// 上游返回了非成功状态码或错误信封
    Upstream { status: u16, message: String },

    /// 上游调用超时（按上游失败处理，消息中带有区分标识）
    Timeout(String),

    /// 网络错误（连接失败、DNS 解析失败等）
    Network(String),

    /// 上游完整响应无法解析
    Parse(String),
}

impl ProviderError {
    pub fn unknown_provider(id: impl Into<String>) -> Self {
        ProviderError::UnknownProvider(id.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        ProviderError::Timeout(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        ProviderError::Parse(msg.into())
    }

    /// 从 HTTP 状态码创建上游错误
    ///
    /// 响应体截断后转发，避免把超长的上游错误原样送到客户端。
    pub fn from_http_status(status: u16, body: &str) -> Self {
        ProviderError::Upstream {
            status,
            message: truncate_message(body, UPSTREAM_MESSAGE_LIMIT),
        }
    }

    /// 从 reqwest 错误创建
    pub fn from_reqwest_error(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout("上游请求超时".to_string())
        } else if err.is_connect() {
            ProviderError::Network("无法连接到上游服务器".to_string())
        } else if err.is_decode() {
            ProviderError::Parse("上游响应解码失败".to_string())
        } else if let Some(status) = err.status() {
            ProviderError::from_http_status(status.as_u16(), &err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }

    /// 映射为客户端可见的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            ProviderError::UnknownProvider(_) => 400,
            ProviderError::NoProviderAvailable => 503,
            ProviderError::Upstream { status, .. } => *status,
            ProviderError::Timeout(_) => 504,
            ProviderError::Network(_) => 502,
            ProviderError::Parse(_) => 502,
        }
    }

    /// 获取错误类型名称（用于日志和错误载荷）
    pub fn error_type(&self) -> &'static str {
        match self {
            ProviderError::UnknownProvider(_) => "UnknownProvider",
            ProviderError::NoProviderAvailable => "NoProviderAvailable",
            ProviderError::Upstream { .. } => "UpstreamError",
            ProviderError::Timeout(_) => "Timeout",
            ProviderError::Network(_) => "NetworkError",
            ProviderError::Parse(_) => "ParseError",
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::UnknownProvider(id) => write!(f, "未知的 Provider: {}", id),
            ProviderError::NoProviderAvailable => {
                write!(f, "没有可用的 Provider: 未配置任何候选 Provider 的凭证")
            }
            ProviderError::Upstream { status, message } => {
                write!(f, "上游错误 (HTTP {}): {}", status, message)
            }
            ProviderError::Timeout(msg) => write!(f, "上游超时: {}", msg),
            ProviderError::Network(msg) => write!(f, "网络错误: {}", msg),
            ProviderError::Parse(msg) => write!(f, "响应解析失败: {}", msg),
        }
    }
}

impl Error for ProviderError {}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::from_reqwest_error(&err)
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Parse(err.to_string())
    }
}

/// 截断消息到指定长度（按字符边界）
fn truncate_message(msg: &str, max_len: usize) -> String {
    if msg.chars().count() <= max_len {
        msg.to_string()
    } else {
        let head: String = msg.chars().take(max_len).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(ProviderError::unknown_provider("foo").status_code(), 400);
        assert_eq!(ProviderError::NoProviderAvailable.status_code(), 503);
        assert_eq!(
            ProviderError::from_http_status(429, "slow down").status_code(),
            429
        );
        assert_eq!(ProviderError::timeout("deadline").status_code(), 504);
        assert_eq!(ProviderError::Network("refused".into()).status_code(), 502);
    }

    #[test]
    fn test_from_http_status_truncates_body() {
        let long_body = "x".repeat(500);
        let err = ProviderError::from_http_status(500, &long_body);
        match err {
            ProviderError::Upstream { status, message } => {
                assert_eq!(status, 500);
                assert!(message.len() <= UPSTREAM_MESSAGE_LIMIT + 3);
                assert!(message.ends_with("..."));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_error_type() {
        assert_eq!(
            ProviderError::NoProviderAvailable.error_type(),
            "NoProviderAvailable"
        );
        assert_eq!(
            ProviderError::from_http_status(500, "boom").error_type(),
            "UpstreamError"
        );
        assert_eq!(ProviderError::timeout("t").error_type(), "Timeout");
    }

    #[test]
    fn test_display_contains_detail() {
        let err = ProviderError::from_http_status(503, "overloaded");
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("overloaded"));
    }

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("short", 10), "short");
        assert_eq!(
            truncate_message("this is a long message", 10),
            "this is a ..."
        );
    }
}
