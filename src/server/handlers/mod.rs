//! 请求处理器
//!
//! 网关对外接口的入站侧：
//! - `POST /chat` — 非流式对话，一次性返回完整回复
//! - `POST /stream` — 流式对话，SSE 推送归一化事件
//! - `GET /models` — 列出当前凭证下可用的 (provider, model) 组合
//! - `GET /healthz` — 存活探针
//!
//! 流一旦建立，后续错误只以 SSE 事件传递，HTTP 状态保持 200。

pub mod provider_calls;

use crate::converter::{ChatMessage, Role};
use crate::credential::CredentialSource;
use crate::providers::{self, ProviderError, ProviderType};
use crate::router::{self, Selection};
use crate::server::AppState;
use crate::streaming::{EventStream, StreamEvent};
use async_stream::stream;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// 回退目标：主 Provider 建流失败时换用的固定默认组合
const FALLBACK_PROVIDER: ProviderType = ProviderType::OpenAi;
const FALLBACK_MODEL: &str = "gpt-4o-mini";

/// 对话请求体（/chat 与 /stream 共用）
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,

    /// 显式模型、"provider/model" 前缀或 "auto"；缺省等同 "auto"
    #[serde(default)]
    pub model: Option<String>,

    /// 顶层系统提示词
    #[serde(default)]
    pub system: Option<String>,
}

impl ChatRequest {
    /// 复杂度启发式的输入文本：最后一条用户消息
    fn task_text(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

fn new_request_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}

// ============================================================================
// POST /chat
// ============================================================================

pub async fn handle_chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Response {
    let request_id = new_request_id();
    info!(
        "[API] {} /chat: messages={} model={:?}",
        request_id,
        payload.messages.len(),
        payload.model
    );

    let selection = match router::select(
        payload.model.as_deref(),
        payload.task_text(),
        state.credentials.as_ref(),
    ) {
        Ok(selection) => selection,
        Err(e) => return error_response(&request_id, e),
    };

    match provider_calls::execute_chat(
        &state,
        &selection,
        payload.system.as_deref(),
        &payload.messages,
        &request_id,
    )
    .await
    {
        Ok(text) => Json(json!({
            "response": text,
            "provider": selection.provider.as_str(),
            "model": selection.model,
        }))
        .into_response(),
        Err(e) => error_response(&request_id, e),
    }
}

// ============================================================================
// POST /stream
// ============================================================================

pub async fn handle_stream(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Response {
    let request_id = new_request_id();
    info!(
        "[API] {} /stream: messages={} model={:?}",
        request_id,
        payload.messages.len(),
        payload.model
    );

    let selection = match router::select(
        payload.model.as_deref(),
        payload.task_text(),
        state.credentials.as_ref(),
    ) {
        Ok(selection) => selection,
        Err(e) => return error_response(&request_id, e),
    };

    let system = payload.system.as_deref();
    let events = match provider_calls::open_stream(
        &state,
        &selection,
        system,
        &payload.messages,
        &request_id,
    )
    .await
    {
        Ok(events) => events,
        // 流尚未建立，客户端还没收到任何字节：允许回退一次
        Err(primary_err) => {
            let Some(fallback) = fallback_selection(&selection, state.credentials.as_ref()) else {
                return error_response(&request_id, primary_err);
            };
            warn!(
                "[RELAY] {} 主 Provider 建流失败，回退: {} -> {}/{} ({})",
                request_id, selection.provider, fallback.provider, fallback.model, primary_err
            );
            match provider_calls::open_stream(
                &state,
                &fallback,
                system,
                &payload.messages,
                &request_id,
            )
            .await
            {
                Ok(events) => events,
                // 回退也失败时报告主错误
                Err(_) => return error_response(&request_id, primary_err),
            }
        }
    };

    sse_response(events)
}

/// 计算回退目标
///
/// 主选择已经是回退目标、或回退目标没有凭证时不回退。
fn fallback_selection(primary: &Selection, credentials: &dyn CredentialSource) -> Option<Selection> {
    if primary.provider == FALLBACK_PROVIDER && primary.model == FALLBACK_MODEL {
        return None;
    }
    if !providers::has_credential(FALLBACK_PROVIDER, credentials) {
        return None;
    }
    Some(Selection::new(FALLBACK_PROVIDER, FALLBACK_MODEL))
}

/// 把归一化事件流编码为 SSE 帧
///
/// 终止语义：Done 或 Error 后不再有载荷帧，末尾恰好一个 `[DONE]`
/// 标记，任何路径都不会让客户端悬挂等待。
fn relay_frames(events: EventStream) -> impl Stream<Item = Bytes> + Send {
    stream! {
        let mut events = events;
        while let Some(event) = events.next().await {
            match event {
                StreamEvent::TextDelta { text } => {
                    yield Bytes::from(format!("data: {}\n\n", json!({ "text": text })));
                }
                StreamEvent::Done => {
                    yield Bytes::from(format!("data: {}\n\n", json!({ "done": true })));
                    break;
                }
                StreamEvent::Error { message } => {
                    yield Bytes::from(format!("data: {}\n\n", json!({ "error": message })));
                    break;
                }
            }
        }
        yield Bytes::from_static(b"data: [DONE]\n\n");
    }
}

fn sse_response(events: EventStream) -> Response {
    let body = Body::from_stream(relay_frames(events).map(Ok::<_, Infallible>));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(body)
        .unwrap_or_else(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": {"message": "Failed to build stream response"}})),
            )
                .into_response()
        })
}

// ============================================================================
// GET /models
// ============================================================================

/// 列出当前凭证下可用的模型，按注册表顺序
pub async fn handle_models(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let models: Vec<serde_json::Value> = providers::REGISTRY
        .iter()
        .filter(|config| providers::has_credential(config.id, state.credentials.as_ref()))
        .flat_map(|config| {
            config
                .models
                .iter()
                .map(|model| json!({ "provider": config.id.as_str(), "model": model }))
        })
        .collect();

    Json(json!({ "models": models }))
}

// ============================================================================
// GET /healthz
// ============================================================================

pub async fn handle_healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

// ============================================================================
// 错误响应
// ============================================================================

/// 按错误分类映射 HTTP 状态码，响应体携带统一错误信封
fn error_response(request_id: &str, err: ProviderError) -> Response {
    warn!("[API] {} 请求失败: {}", request_id, err);

    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = Json(json!({
        "error": {
            "type": err.error_type(),
            "message": err.to_string(),
        }
    }));

    (status, body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::StaticCredentialSource;
    use std::time::Duration;

    async fn collect_frames(events: EventStream) -> Vec<String> {
        relay_frames(events)
            .map(|b| String::from_utf8_lossy(&b).to_string())
            .collect()
            .await
    }

    fn events(items: Vec<StreamEvent>) -> EventStream {
        Box::pin(futures::stream::iter(items))
    }

    #[tokio::test]
    async fn test_relay_frames_normal_termination() {
        let frames = collect_frames(events(vec![
            StreamEvent::TextDelta {
                text: "hi".to_string(),
            },
            StreamEvent::Done,
        ]))
        .await;

        assert_eq!(frames[0], "data: {\"text\":\"hi\"}\n\n");
        assert_eq!(frames[1], "data: {\"done\":true}\n\n");
        assert_eq!(frames.last().unwrap(), "data: [DONE]\n\n");
        assert_eq!(frames.len(), 3);
    }

    #[tokio::test]
    async fn test_relay_frames_error_termination() {
        let frames = collect_frames(events(vec![
            StreamEvent::TextDelta {
                text: "partial".to_string(),
            },
            StreamEvent::Error {
                message: "upstream died".to_string(),
            },
        ]))
        .await;

        assert!(frames[1].contains("upstream died"));
        assert_eq!(frames.last().unwrap(), "data: [DONE]\n\n");
        assert_eq!(frames.len(), 3);
    }

    #[tokio::test]
    async fn test_relay_frames_terminal_marker_on_empty_stream() {
        // 事件流意外枯竭也要给客户端终止标记
        let frames = collect_frames(events(vec![])).await;
        assert_eq!(frames, ["data: [DONE]\n\n"]);
    }

    #[tokio::test]
    async fn test_relay_frames_word_split_order() {
        let source =
            crate::streaming::word_split_stream("Hello world foo".to_string(), Duration::ZERO);
        let frames = collect_frames(source).await;
        assert_eq!(frames[0], "data: {\"text\":\"Hello \"}\n\n");
        assert_eq!(frames[1], "data: {\"text\":\"world \"}\n\n");
        assert_eq!(frames[2], "data: {\"text\":\"foo \"}\n\n");
        assert_eq!(frames[3], "data: {\"done\":true}\n\n");
    }

    #[test]
    fn test_fallback_selection_skips_same_target() {
        let credentials =
            StaticCredentialSource::new([(ProviderType::OpenAi, "sk-test".to_string())]);

        let primary = Selection::new(ProviderType::Anthropic, "claude-sonnet-4-20250514");
        let fallback = fallback_selection(&primary, &credentials).unwrap();
        assert_eq!(fallback.provider, ProviderType::OpenAi);
        assert_eq!(fallback.model, FALLBACK_MODEL);

        // 主选择就是回退目标时不再回退
        let primary = Selection::new(ProviderType::OpenAi, FALLBACK_MODEL);
        assert!(fallback_selection(&primary, &credentials).is_none());
    }

    #[test]
    fn test_fallback_selection_requires_credential() {
        let credentials = StaticCredentialSource::empty();
        let primary = Selection::new(ProviderType::Anthropic, "claude-sonnet-4-20250514");
        assert!(fallback_selection(&primary, &credentials).is_none());
    }

    #[test]
    fn test_task_text_uses_last_user_message() {
        let request = ChatRequest {
            messages: vec![
                ChatMessage::new(Role::User, "first"),
                ChatMessage::new(Role::Assistant, "reply"),
                ChatMessage::new(Role::User, "second"),
            ],
            model: None,
            system: None,
        };
        assert_eq!(request.task_text(), "second");

        let empty = ChatRequest {
            messages: vec![],
            model: None,
            system: None,
        };
        assert_eq!(empty.task_text(), "");
    }
}
