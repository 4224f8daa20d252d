//! 流式处理模块
//!
//! 把各 Provider 的原始流式编码归一化为统一的事件流：
//! - `line_buffer` — 跨 chunk 边界的 SSE 行重组
//! - `normalizer` — 帧解析、事件状态机、切词模拟
//! - `error` — 流式传输层错误

pub mod error;
pub mod line_buffer;
pub mod normalizer;

pub use error::StreamError;
pub use line_buffer::SseLineBuffer;
pub use normalizer::{
    extract_full_text, normalize_sse, parse_sse_line, reqwest_stream_to_stream_response,
    word_split_stream, EventStream, FrameOutcome, StreamEvent, StreamFormat, StreamResponse,
};
