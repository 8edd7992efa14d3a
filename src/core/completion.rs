//! Streaming access to a hosted chat-completions endpoint.
//!
//! [`CompletionClient::stream_complete`] sends one prompt and yields the reply
//! as a lazy, non-restartable stream of text fragments. A failure is always
//! the last item of the stream; there is no retry.

use std::collections::VecDeque;
use std::error::Error;
use std::fmt;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use memchr::memchr;
use tracing::{debug, warn};

use crate::api::{ChatRequest, ChatResponse};
use crate::core::secrets::Credential;

/// Appends the completions path to a base URL, tolerating trailing slashes.
fn chat_completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

pub type CompletionStream = BoxStream<'static, Result<String, CompletionError>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// No API key was resolved at startup.
    Unconfigured,
    /// The request could not be sent or the body could not be read.
    Transport(String),
    /// The endpoint answered with a non-success status.
    Status { status: u16, body: String },
    /// The endpoint reported an error inside the event stream.
    Api(String),
    /// A data line could not be decoded.
    Malformed(String),
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionError::Unconfigured => write!(f, "no API key configured"),
            CompletionError::Transport(message) => write!(f, "request failed: {message}"),
            CompletionError::Status { status, body } => write!(f, "HTTP {status}: {body}"),
            CompletionError::Api(message) => write!(f, "{message}"),
            CompletionError::Malformed(message) => {
                write!(f, "malformed stream data: {message}")
            }
        }
    }
}

impl Error for CompletionError {}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn stream_complete(&self, prompt: &str) -> Result<CompletionStream, CompletionError>;
}

/// [`CompletionClient`] for OpenAI-compatible endpoints, including Gemini's
/// `v1beta/openai` surface.
pub struct HostedCompletionClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    credential: Credential,
}

impl HostedCompletionClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            credential,
        }
    }
}

#[async_trait]
impl CompletionClient for HostedCompletionClient {
    async fn stream_complete(&self, prompt: &str) -> Result<CompletionStream, CompletionError> {
        let api_key = match &self.credential {
            Credential::Configured(key) => key.expose(),
            Credential::Unconfigured => return Err(CompletionError::Unconfigured),
        };

        let chat_url = chat_completions_url(&self.base_url);
        let request = ChatRequest::single_prompt(&self.model, prompt);
        debug!(url = %chat_url, model = %self.model, prompt_bytes = prompt.len(), "sending completion request");

        let response = self
            .client
            .post(chat_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&request)
            .send()
            .await
            .map_err(|err| CompletionError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(CompletionError::Status {
                status,
                body: format_api_error(&error_text),
            });
        }

        Ok(decode_sse_body(response.bytes_stream()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Chunk(String),
    Done,
    Error(CompletionError),
}

/// Incremental decoder for the `data:` lines of a chat-completions stream.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw body bytes and returns the events completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            match std::str::from_utf8(&self.buffer[..newline_pos]) {
                Ok(line) => {
                    if let Some(event) = process_sse_line(line.trim()) {
                        events.push(event);
                    }
                }
                Err(err) => warn!("invalid UTF-8 in completion stream: {err}"),
            }
            self.buffer.drain(..=newline_pos);
        }

        events
    }

    /// Flushes a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        let rest = std::mem::take(&mut self.buffer);
        match std::str::from_utf8(&rest) {
            Ok(line) => process_sse_line(line.trim()).into_iter().collect(),
            Err(err) => {
                warn!("invalid UTF-8 in completion stream: {err}");
                Vec::new()
            }
        }
    }
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn handle_data_payload(payload: &str) -> Option<SseEvent> {
    if payload == "[DONE]" {
        return Some(SseEvent::Done);
    }
    if payload.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map(SseEvent::Chunk),
        Err(_) => {
            let formatted_error = format_api_error(payload);
            let is_error_payload = serde_json::from_str::<serde_json::Value>(payload)
                .map(|value| value.get("error").is_some())
                .unwrap_or(false);
            if is_error_payload {
                Some(SseEvent::Error(CompletionError::Api(formatted_error)))
            } else {
                Some(SseEvent::Error(CompletionError::Malformed(formatted_error)))
            }
        }
    }
}

fn process_sse_line(line: &str) -> Option<SseEvent> {
    extract_data_payload(line).and_then(handle_data_payload)
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Renders an error body for logs: a one-line summary when the body is JSON
/// with a recognizable message, followed by the body itself.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error: <empty>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let compact = json_value.to_string();
        if let Some(summary) = extract_error_summary(&json_value) {
            if !summary.is_empty() {
                return format!("API Error: {summary} ({compact})");
            }
        }
        return format!("API Error: {compact}");
    }

    format!("API Error: {trimmed}")
}

struct DecodeState<B, E> {
    body: BoxStream<'static, Result<B, E>>,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
    body_done: bool,
    finished: bool,
}

/// Turns a raw response body into a fragment stream. The stream ends after
/// `[DONE]`, at end of body, or right after yielding an error.
pub fn decode_sse_body<S, B, E>(body: S) -> CompletionStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = DecodeState {
        body: body.boxed(),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        body_done: false,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            if let Some(event) = state.pending.pop_front() {
                match event {
                    SseEvent::Chunk(text) => return Some((Ok(text), state)),
                    SseEvent::Done => {
                        state.finished = true;
                        return None;
                    }
                    SseEvent::Error(err) => {
                        state.finished = true;
                        return Some((Err(err), state));
                    }
                }
            }

            if state.body_done {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let events = state.decoder.push(bytes.as_ref());
                    state.pending.extend(events);
                }
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(CompletionError::Transport(err.to_string())), state));
                }
                None => {
                    state.body_done = true;
                    let events = state.decoder.finish();
                    state.pending.extend(events);
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::secrets::ApiKey;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::Router;

    fn body_of(chunks: &[&str]) -> Vec<Result<Vec<u8>, std::io::Error>> {
        chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect()
    }

    async fn collect(stream: CompletionStream) -> Vec<Result<String, CompletionError>> {
        stream.collect().await
    }

    #[test]
    fn completions_url_joins_gemini_base() {
        let expected =
            "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";
        assert_eq!(
            chat_completions_url("https://generativelanguage.googleapis.com/v1beta/openai"),
            expected
        );
        assert_eq!(
            chat_completions_url("https://generativelanguage.googleapis.com/v1beta/openai//"),
            expected
        );
    }

    #[test]
    fn decoder_handles_spacing_variants() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(
            concat!(
                "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n",
                "data:{\"choices\":[{\"delta\":{\"content\":\"World\"}}]}\n",
                "data:[DONE]\n",
            )
            .as_bytes(),
        );
        assert_eq!(
            events,
            vec![
                SseEvent::Chunk("Hello".into()),
                SseEvent::Chunk("World".into()),
                SseEvent::Done,
            ]
        );
    }

    #[test]
    fn decoder_ignores_comments_blank_lines_and_empty_deltas() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(
            concat!(
                ": keep-alive\n",
                "\n",
                "event: message\n",
                "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n",
            )
            .as_bytes(),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn decoder_joins_lines_split_across_pushes() {
        let mut decoder = SseDecoder::new();
        assert!(decoder
            .push(b"data: {\"choices\":[{\"delta\":{\"con")
            .is_empty());
        let events = decoder.push(b"tent\":\"Hi\"}}]}\r\n");
        assert_eq!(events, vec![SseEvent::Chunk("Hi".into())]);
    }

    #[test]
    fn decoder_routes_stream_errors() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"error\":{\"message\":\"internal server error\"}}\n");
        assert_eq!(
            events,
            vec![SseEvent::Error(CompletionError::Api(
                r#"API Error: internal server error ({"error":{"message":"internal server error"}})"#
                    .into()
            ))]
        );
    }

    #[test]
    fn decoder_flags_undecodable_payloads() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: not json\n");
        assert_eq!(
            events,
            vec![SseEvent::Error(CompletionError::Malformed(
                "API Error: not json".into()
            ))]
        );
    }

    #[test]
    fn decoder_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish(), vec![SseEvent::Done]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn format_api_error_summarizes_json() {
        let raw = r#"{"error":{"message":"model   overloaded","type":"invalid_request_error"}}"#;
        assert_eq!(
            format_api_error(raw),
            r#"API Error: model overloaded ({"error":{"message":"model   overloaded","type":"invalid_request_error"}})"#
        );
    }

    #[test]
    fn format_api_error_handles_json_without_summary_and_plaintext() {
        assert_eq!(
            format_api_error(r#"{"status":"failed"}"#),
            r#"API Error: {"status":"failed"}"#
        );
        assert_eq!(format_api_error("  api failure \n"), "API Error: api failure");
        assert_eq!(format_api_error(""), "API Error: <empty>");
    }

    #[tokio::test]
    async fn body_stream_yields_fragments_until_done() {
        let body = body_of(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"Ent\"}}]}\n\ndata: {\"cho",
            "ices\":[{\"delta\":{\"content\":\"ropy\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n",
        ]);
        let items = collect(decode_sse_body(futures_util::stream::iter(body))).await;
        assert_eq!(items, vec![Ok("Ent".to_string()), Ok("ropy".to_string())]);
    }

    #[tokio::test]
    async fn body_stream_ends_cleanly_without_done_marker() {
        let body = body_of(&["data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}"]);
        let items = collect(decode_sse_body(futures_util::stream::iter(body))).await;
        assert_eq!(items, vec![Ok("tail".to_string())]);
    }

    #[tokio::test]
    async fn transport_error_terminates_stream() {
        let body: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n".to_vec()),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )),
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"never\"}}]}\n".to_vec()),
        ];
        let items = collect(decode_sse_body(futures_util::stream::iter(body))).await;
        assert_eq!(
            items,
            vec![
                Ok("partial".to_string()),
                Err(CompletionError::Transport("connection reset".into())),
            ]
        );
    }

    #[tokio::test]
    async fn unconfigured_client_fails_before_any_request() {
        let client = HostedCompletionClient::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            "gemini-2.0-flash",
            Credential::Unconfigured,
        );
        let result = client.stream_complete("hello").await;
        assert!(matches!(result, Err(CompletionError::Unconfigured)));
    }

    async fn fake_upstream(headers: HeaderMap, body: String) -> axum::response::Response {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer test-key") {
            return (
                StatusCode::UNAUTHORIZED,
                r#"{"error":{"message":"API key not valid"}}"#,
            )
                .into_response();
        }
        let request: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(request["stream"], true);
        assert_eq!(request["messages"].as_array().unwrap().len(), 1);
        let prompt = request["messages"][0]["content"].as_str().unwrap().to_string();
        let sse = format!(
            "data: {}\n\ndata: {}\n\ndata: [DONE]\n\n",
            serde_json::json!({"choices":[{"delta":{"content":"echo: "}}]}),
            serde_json::json!({"choices":[{"delta":{"content":prompt}}]}),
        );
        ([("content-type", "text/event-stream")], sse).into_response()
    }

    async fn spawn_fake_upstream() -> String {
        let router = Router::new().route("/v1/chat/completions", post(fake_upstream));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}/v1/")
    }

    #[tokio::test]
    async fn hosted_client_streams_from_compatible_endpoint() {
        let base_url = spawn_fake_upstream().await;
        let client = HostedCompletionClient::new(
            reqwest::Client::new(),
            base_url,
            "gemini-2.0-flash",
            Credential::Configured(ApiKey::new("test-key")),
        );

        let stream = client.stream_complete("What is entropy?").await.unwrap();
        let text: Vec<String> = collect(stream)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(text.concat(), "echo: What is entropy?");
    }

    #[tokio::test]
    async fn hosted_client_reports_http_status_failures() {
        let base_url = spawn_fake_upstream().await;
        let client = HostedCompletionClient::new(
            reqwest::Client::new(),
            base_url,
            "gemini-2.0-flash",
            Credential::Configured(ApiKey::new("wrong-key")),
        );

        match client.stream_complete("hello").await {
            Err(CompletionError::Status { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.starts_with("API Error: API key not valid"));
            }
            Err(other) => panic!("expected status error, got {other:?}"),
            Ok(_) => panic!("expected status error, got a stream"),
        }
    }
}
