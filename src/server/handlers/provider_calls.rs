//! Provider 上游调用
//!
//! 请求管线的出站侧：按选择结果翻译请求、发给上游、把响应
//! 交给流归一化器。非流式和流式两条入口，凭证在这里注入。

use crate::converter::{self, ChatMessage};
use crate::providers::ProviderError;
use crate::router::Selection;
use crate::server::AppState;
use crate::streaming::{
    extract_full_text, normalize_sse, reqwest_stream_to_stream_response, word_split_stream,
    EventStream, StreamFormat,
};
use serde_json::Value;
use tracing::{info, warn};

/// 非流式调用：发出请求并提取完整回复文本
pub async fn execute_chat(
    state: &AppState,
    selection: &Selection,
    system: Option<&str>,
    messages: &[ChatMessage],
    request_id: &str,
) -> Result<String, ProviderError> {
    let api_key = state
        .credentials
        .get(selection.provider)
        .ok_or(ProviderError::NoProviderAvailable)?;

    let request = converter::translate(
        selection.provider,
        &selection.model,
        system,
        messages,
        false,
        &api_key,
        state.base_url(selection.provider),
    );

    info!(
        "[CALL] {} 非流式上游请求: provider={} model={}",
        request_id, selection.provider, selection.model
    );

    // 请求级超时覆盖到响应体读完为止，上游只回头部然后拖死
    // 响应体的情况也会按时失败
    let mut builder = state
        .http
        .post(&request.url)
        .timeout(state.config.stream.request_timeout())
        .json(&request.body);
    for (name, value) in &request.headers {
        builder = builder.header(*name, value);
    }

    let response = builder
        .send()
        .await
        .map_err(|e| ProviderError::from_reqwest_error(&e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(
            "[CALL] {} 上游返回错误状态: provider={} status={}",
            request_id, selection.provider, status
        );
        return Err(ProviderError::from_http_status(status.as_u16(), &body));
    }

    let value: Value = response.json().await?;
    extract_full_text(format_of(selection), &value)
}

/// 流式调用：打开上游流并返回归一化事件流
///
/// 返回 Err 表示流尚未建立（调用方可以换一个 Provider 重试）；
/// 返回 Ok 之后的任何失败只会以 Error 事件的形式出现在流里。
pub async fn open_stream(
    state: &AppState,
    selection: &Selection,
    system: Option<&str>,
    messages: &[ChatMessage],
    request_id: &str,
) -> Result<EventStream, ProviderError> {
    let format = format_of(selection);

    // Gemini 协议不支持增量流式：完整拿到回复后切词模拟
    if format == StreamFormat::GeminiJson {
        let text = execute_chat(state, selection, system, messages, request_id).await?;
        return Ok(word_split_stream(text, state.config.stream.word_delay()));
    }

    let api_key = state
        .credentials
        .get(selection.provider)
        .ok_or(ProviderError::NoProviderAvailable)?;

    let request = converter::translate(
        selection.provider,
        &selection.model,
        system,
        messages,
        true,
        &api_key,
        state.base_url(selection.provider),
    );

    info!(
        "[STREAM] {} 流式上游请求: provider={} model={}",
        request_id, selection.provider, selection.model
    );

    let mut builder = state
        .http
        .post(&request.url)
        .header("Accept", "text/event-stream")
        .json(&request.body);
    for (name, value) in &request.headers {
        builder = builder.header(*name, value);
    }

    let response = tokio::time::timeout(state.config.stream.first_byte_timeout(), builder.send())
        .await
        .map_err(|_| ProviderError::timeout(format!("{} 流式请求首字节超时", selection.provider)))?
        .map_err(|e| ProviderError::from_reqwest_error(&e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(
            "[STREAM] {} 上游拒绝流式请求: provider={} status={}",
            request_id, selection.provider, status
        );
        return Err(ProviderError::from_http_status(status.as_u16(), &body));
    }

    Ok(normalize_sse(
        reqwest_stream_to_stream_response(response),
        format,
    ))
}

/// 选择结果对应的流式帧格式
fn format_of(selection: &Selection) -> StreamFormat {
    selection.provider.stream_format()
}
