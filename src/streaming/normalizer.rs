//! 流归一化器
//!
//! 消费 Provider 的原始字节流（或单次 JSON 响应），产出统一的
//! 事件序列。Provider 特有的帧格式在这里终结：下游（响应中继）
//! 只认识 `StreamEvent` 这一套词汇。
//!
//! 状态机：AwaitingFirstByte → Streaming → Terminated(Done | Error)。
//! 一旦产出 Done 或 Error，同一条流上不会再有任何事件。

use crate::providers::ProviderError;
use crate::streaming::error::StreamError;
use crate::streaming::line_buffer::SseLineBuffer;
use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

/// SSE 数据行前缀
const DATA_PREFIX: &str = "data: ";

/// OpenAI 兼容流的终止哨兵
const DONE_SENTINEL: &str = "[DONE]";

/// Provider 原始字节流
pub type StreamResponse = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

/// 归一化事件流
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// 归一化后的流事件（响应中继唯一认识的词汇）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// 一段增量文本
    TextDelta { text: String },
    /// 正常结束
    Done,
    /// 错误结束
    Error { message: String },
}

/// 流式帧格式（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// Anthropic SSE（`content_block_delta` 事件）
    AnthropicSse,
    /// OpenAI 兼容 SSE（OpenAI / Groq 共用）
    OpenAiSse,
    /// Google 单次 JSON 响应（无增量流式，切词模拟）
    GeminiJson,
}

impl StreamFormat {
    pub fn display_name(&self) -> &'static str {
        match self {
            StreamFormat::AnthropicSse => "Anthropic SSE",
            StreamFormat::OpenAiSse => "OpenAI SSE",
            StreamFormat::GeminiJson => "Gemini JSON",
        }
    }
}

/// 单帧解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// 提取到一段增量文本
    Delta(String),
    /// 流正常终止
    Done,
    /// 上游在流中发出错误信封
    Error(String),
    /// 非载荷帧（注释、keep-alive、坏帧），静默丢弃
    Skip,
}

/// 解析一行 SSE
///
/// 非 `data: ` 行和无法解析为 JSON 的载荷都静默丢弃——Provider 会
/// 在流中夹杂注释帧和 keep-alive 帧，单个坏帧绝不能中断整条流。
pub fn parse_sse_line(line: &str, format: StreamFormat) -> FrameOutcome {
    let payload = match line.strip_prefix(DATA_PREFIX) {
        Some(p) => p,
        None => return FrameOutcome::Skip,
    };

    if payload == DONE_SENTINEL {
        return FrameOutcome::Done;
    }

    let value: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(_) => return FrameOutcome::Skip,
    };

    match format {
        StreamFormat::AnthropicSse => parse_anthropic_frame(&value),
        StreamFormat::OpenAiSse => parse_openai_frame(&value),
        // Gemini 没有 SSE 帧，不会走到这里
        StreamFormat::GeminiJson => FrameOutcome::Skip,
    }
}

fn parse_anthropic_frame(value: &Value) -> FrameOutcome {
    match value.get("type").and_then(|t| t.as_str()) {
        Some("content_block_delta") => {
            match value["delta"].get("text").and_then(|t| t.as_str()) {
                Some(text) if !text.is_empty() => FrameOutcome::Delta(text.to_string()),
                _ => FrameOutcome::Skip,
            }
        }
        Some("message_stop") => FrameOutcome::Done,
        Some("error") => {
            let message = value["error"]
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("上游返回了错误信封")
                .to_string();
            FrameOutcome::Error(message)
        }
        _ => FrameOutcome::Skip,
    }
}

fn parse_openai_frame(value: &Value) -> FrameOutcome {
    if let Some(err) = value.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("上游返回了错误信封")
            .to_string();
        return FrameOutcome::Error(message);
    }

    match value["choices"][0]["delta"].get("content").and_then(|c| c.as_str()) {
        Some(text) if !text.is_empty() => FrameOutcome::Delta(text.to_string()),
        _ => FrameOutcome::Skip,
    }
}

/// 将 reqwest 响应转换为统一的字节流类型
pub fn reqwest_stream_to_stream_response(response: reqwest::Response) -> StreamResponse {
    Box::pin(response.bytes_stream().map(|result| result.map_err(StreamError::from)))
}

/// 归一化一条 SSE 字节流
///
/// 逐 chunk 追加到行缓冲，对每个完整行做帧解析并立即发出增量，
/// 不做任何批处理或重排。网络关闭且没有显式错误时以 Done 收尾。
pub fn normalize_sse(source: StreamResponse, format: StreamFormat) -> EventStream {
    Box::pin(stream! {
        let mut source = source;
        let mut buffer = SseLineBuffer::new();
        let mut saw_first_delta = false;

        while let Some(chunk) = source.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    yield StreamEvent::Error { message: e.to_string() };
                    return;
                }
            };

            for line in buffer.push(&bytes) {
                match parse_sse_line(&line, format) {
                    FrameOutcome::Delta(text) => {
                        if !saw_first_delta {
                            debug!("[STREAM] 首个增量到达: format={}", format.display_name());
                            saw_first_delta = true;
                        }
                        yield StreamEvent::TextDelta { text };
                    }
                    FrameOutcome::Done => {
                        yield StreamEvent::Done;
                        return;
                    }
                    FrameOutcome::Error(message) => {
                        yield StreamEvent::Error { message };
                        return;
                    }
                    FrameOutcome::Skip => {}
                }
            }
        }

        // 网络关闭：缓冲区可能残留没有换行结尾的最后一行
        if let Some(line) = buffer.take_remainder() {
            match parse_sse_line(&line, format) {
                FrameOutcome::Delta(text) => yield StreamEvent::TextDelta { text },
                FrameOutcome::Error(message) => {
                    yield StreamEvent::Error { message };
                    return;
                }
                FrameOutcome::Done | FrameOutcome::Skip => {}
            }
        }
        yield StreamEvent::Done;
    })
}

/// 切词流：把完整文本按空白切开，逐词发出增量
///
/// 用于协议层不支持增量流式的 Provider，给客户端一致的渐进体验。
/// 每个词带一个尾随空格，词间插入可配置的人工延迟。
pub fn word_split_stream(text: String, delay: Duration) -> EventStream {
    Box::pin(stream! {
        let mut first = true;
        for word in text.split_whitespace() {
            // 延迟只插在词与词之间，末词之后立即收尾
            if !first && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            first = false;
            yield StreamEvent::TextDelta { text: format!("{} ", word) };
        }
        yield StreamEvent::Done;
    })
}

/// 从完整（非流式）响应中提取全文
pub fn extract_full_text(format: StreamFormat, value: &Value) -> Result<String, ProviderError> {
    if let Some(err) = value.get("error") {
        // 上游的 code 不保证是合法 HTTP 状态码，范围外回退 502
        let status = match err.get("code").and_then(|c| c.as_u64()) {
            Some(code @ 100..=599) => code as u16,
            _ => 502,
        };
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("上游返回了错误信封")
            .to_string();
        return Err(ProviderError::Upstream { status, message });
    }

    let text = match format {
        StreamFormat::AnthropicSse => value["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|t| !t.is_empty()),
        StreamFormat::OpenAiSse => value["choices"][0]["message"]
            .get("content")
            .and_then(|c| c.as_str())
            .map(|s| s.to_string()),
        StreamFormat::GeminiJson => value["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|t| !t.is_empty()),
    };

    text.ok_or_else(|| {
        ProviderError::parse(format!(
            "响应中没有找到文本内容: format={}",
            format.display_name()
        ))
    })
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use futures::StreamExt;
    use proptest::prelude::*;

    /// 生成一段 OpenAI SSE 载荷和一个切分大小
    fn arb_sse_payload() -> impl Strategy<Value = (String, usize)> {
        let deltas = prop::collection::vec("[a-zA-Z0-9 .,!?]{1,20}", 1..8);
        (deltas, 1usize..24).prop_map(|(deltas, chunk_size)| {
            let mut payload = String::new();
            for d in &deltas {
                payload.push_str(&format!(
                    "data: {}\n\n",
                    serde_json::json!({"choices": [{"delta": {"content": d}}]})
                ));
            }
            payload.push_str("data: [DONE]\n\n");
            (payload, chunk_size)
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// 任意 chunk 切分方式都产生与整块输入相同的事件序列
        #[test]
        fn prop_chunk_boundary_invariant((payload, chunk_size) in arb_sse_payload()) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();

            let (expected, actual) = rt.block_on(async {
                let whole: StreamResponse = Box::pin(futures::stream::iter(vec![Ok(
                    bytes::Bytes::from(payload.clone()),
                )]));
                let chunked: StreamResponse = Box::pin(futures::stream::iter(
                    payload
                        .as_bytes()
                        .chunks(chunk_size)
                        .map(|c| Ok(bytes::Bytes::from(c.to_vec())))
                        .collect::<Vec<_>>(),
                ));

                let expected: Vec<StreamEvent> =
                    normalize_sse(whole, StreamFormat::OpenAiSse).collect().await;
                let actual: Vec<StreamEvent> =
                    normalize_sse(chunked, StreamFormat::OpenAiSse).collect().await;
                (expected, actual)
            });

            prop_assert_eq!(expected, actual);
        }
    }
}
