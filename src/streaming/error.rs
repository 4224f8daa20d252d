//! 流式传输错误类型

use std::fmt;

/// 流式传输过程中的错误
///
/// 只覆盖字节流层面的失败；单帧解析失败不是错误，归一化器会就地
/// 丢弃坏帧继续处理。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// 网络错误（连接中断、读取失败）
    Network(String),

    /// 流式响应超时
    Timeout,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Network(msg) => write!(f, "网络错误: {}", msg),
            StreamError::Timeout => write!(f, "流式响应超时"),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StreamError::Timeout
        } else {
            StreamError::Network(err.to_string())
        }
    }
}
