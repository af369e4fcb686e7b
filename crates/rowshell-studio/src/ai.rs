//! AI Proposal Engine transports.
//!
//! ```text
//!  AiRequest ──POST──► endpoint          ──► {"reply": "..."}            (buffered)
//!            ──POST──► stream_endpoint   ──► data: {...}\n data: [DONE]  (streamed)
//!                                             │
//!                          LineBuffer ────────┘ partial lines kept across reads
//!                              │
//!                        parse_sse_line ──► StreamAccumulator ──► progress (accumulated text)
//! ```
//!
//! Both transports return the complete reply text; proposal extraction
//! happens in the workspace.

use crate::prompts::AiMode;
use crate::transcript::ChatTurn;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

pub const DEFAULT_AI_ENDPOINT: &str = "http://localhost:8787/ai";
pub const DEFAULT_AI_STREAM_ENDPOINT: &str = "http://localhost:8787/ai-stream";

const STREAM_DONE: &str = "[DONE]";
const OUTPUT_TEXT_DELTA: &str = "response.output_text.delta";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub endpoint: String,
    pub stream_endpoint: String,
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_AI_ENDPOINT.to_string(),
            stream_endpoint: DEFAULT_AI_STREAM_ENDPOINT.to_string(),
            timeout_secs: 120,
        }
    }
}

impl AiConfig {
    /// Defaults overridden by `ROWSHELL_AI_ENDPOINT`,
    /// `ROWSHELL_AI_STREAM_ENDPOINT` and `ROWSHELL_AI_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, AiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AiError> {
        let mut config = Self::default();
        if let Some(endpoint) = lookup("ROWSHELL_AI_ENDPOINT").filter(|v| !v.is_empty()) {
            config.endpoint = endpoint;
        }
        if let Some(endpoint) = lookup("ROWSHELL_AI_STREAM_ENDPOINT").filter(|v| !v.is_empty()) {
            config.stream_endpoint = endpoint;
        }
        if let Some(raw) = lookup("ROWSHELL_AI_TIMEOUT_SECS") {
            config.timeout_secs = raw.trim().parse().map_err(|_| {
                AiError::Config(format!("ROWSHELL_AI_TIMEOUT_SECS is not a number: `{raw}`"))
            })?;
        }
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("invalid AI configuration: {0}")]
    Config(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// Request
// ============================================================================

/// The component under edit, as the endpoint sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentContext {
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: String,
    pub code: String,
    #[serde(rename = "templateId")]
    pub template_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiRequest {
    pub mode: AiMode,
    pub component: ComponentContext,
    /// Prior transcript followed by the new user turn.
    pub messages: Vec<ChatTurn>,
}

impl AiRequest {
    pub fn new(mode: AiMode, component: ComponentContext, history: &[ChatTurn], prompt: &str) -> Self {
        let mut messages = history.to_vec();
        messages.push(ChatTurn::user(prompt));
        Self {
            mode,
            component,
            messages,
        }
    }
}

/// Where replies come from.
#[async_trait]
pub trait AiTransport: Send + Sync {
    /// One request, one complete reply.
    async fn ask(&self, request: &AiRequest) -> Result<String, AiError>;

    /// Stream the reply. Every message sent on `progress` is the whole text
    /// accumulated so far. Returns the complete reply.
    async fn ask_stream(
        &self,
        request: &AiRequest,
        progress: mpsc::UnboundedSender<String>,
    ) -> Result<String, AiError>;
}

// ============================================================================
// Stream decoding
// ============================================================================

/// Splits a byte stream into lines, keeping the partial tail between reads.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete lines found so far, without their `\n` / `\r\n`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode_line(&line[..line.len() - 1]));
        }
        lines
    }

    /// The unterminated last line, if any.
    pub fn finish(self) -> Option<String> {
        (!self.pending.is_empty()).then(|| decode_line(&self.pending))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text to append.
    Delta(String),
    /// The full output so far; replaces what was accumulated.
    Output(String),
    /// End-of-stream sentinel.
    Done,
}

/// Decode one `data:` line. Anything else, malformed JSON included, is `None`.
pub fn parse_sse_line(line: &str) -> Option<StreamEvent> {
    let payload = line.trim().strip_prefix("data:")?.trim();
    if payload.is_empty() {
        return None;
    }
    if payload == STREAM_DONE {
        return Some(StreamEvent::Done);
    }
    let event: Value = match serde_json::from_str(payload) {
        Ok(event) => event,
        Err(err) => {
            tracing::debug!(error = %err, "skipping malformed stream record");
            return None;
        }
    };

    if event.get("type").and_then(Value::as_str) == Some(OUTPUT_TEXT_DELTA) {
        return event
            .get("delta")
            .and_then(Value::as_str)
            .map(|delta| StreamEvent::Delta(delta.to_string()));
    }

    let items = event.get("output")?.as_array()?;
    let text: String = items
        .iter()
        .filter_map(|item| item.get("content")?.as_array())
        .flatten()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|part| part.get("text")?.as_str())
        .collect();
    (!text.is_empty()).then_some(StreamEvent::Output(text))
}

/// Reply text built from stream events.
#[derive(Debug, Default, Clone)]
pub struct StreamAccumulator {
    text: String,
    done: bool,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `event`; true when the text changed.
    pub fn feed(&mut self, event: StreamEvent) -> bool {
        match event {
            StreamEvent::Delta(delta) => {
                self.text.push_str(&delta);
                !delta.is_empty()
            }
            StreamEvent::Output(text) => {
                let changed = text != self.text;
                self.text = text;
                changed
            }
            StreamEvent::Done => {
                self.done = true;
                false
            }
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

// ============================================================================
// HTTP client
// ============================================================================

/// HTTP transport. `timeout_secs` bounds a whole buffered exchange; a
/// streamed reply may run longer as long as no single read stalls past it.
pub struct AiClient {
    client: Client,
    config: AiConfig,
}

impl AiClient {
    pub fn new(config: AiConfig) -> Result<Self, AiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AiError::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    fn limit(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn within<T>(
        &self,
        what: &str,
        fut: impl std::future::Future<Output = Result<T, AiError>>,
    ) -> Result<T, AiError> {
        tokio::time::timeout(self.limit(), fut).await.map_err(|_| {
            AiError::Network(format!("{what} timed out after {}s", self.config.timeout_secs))
        })?
    }

    async fn post(&self, url: &str, request: &AiRequest) -> Result<reqwest::Response, AiError> {
        tracing::debug!(url = %url, mode = request.mode.as_str(), "ai request");
        let response = self
            .within("request", async {
                self.client
                    .post(url)
                    .json(request)
                    .send()
                    .await
                    .map_err(|e| AiError::Network(e.to_string()))
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status { status, body });
        }
        Ok(response)
    }
}

#[async_trait]
impl AiTransport for AiClient {
    async fn ask(&self, request: &AiRequest) -> Result<String, AiError> {
        let body: Value = self
            .within("request", async {
                let response = self.post(&self.config.endpoint, request).await?;
                response
                    .json()
                    .await
                    .map_err(|e| AiError::InvalidResponse(e.to_string()))
            })
            .await?;
        Ok(body
            .get("reply")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn ask_stream(
        &self,
        request: &AiRequest,
        progress: mpsc::UnboundedSender<String>,
    ) -> Result<String, AiError> {
        let mut response = self.post(&self.config.stream_endpoint, request).await?;
        let mut lines = LineBuffer::new();
        let mut reply = StreamAccumulator::new();

        let consume = |line: &str, reply: &mut StreamAccumulator| {
            if let Some(event) = parse_sse_line(line) {
                if reply.feed(event) {
                    // A dropped receiver only means nobody is watching.
                    let _ = progress.send(reply.text().to_string());
                }
            }
        };

        while !reply.is_done() {
            let chunk = self
                .within("stream read", async {
                    response
                        .chunk()
                        .await
                        .map_err(|e| AiError::Network(e.to_string()))
                })
                .await?;
            let Some(chunk) = chunk else { break };
            for line in lines.push(&chunk) {
                consume(&line, &mut reply);
                if reply.is_done() {
                    break;
                }
            }
        }
        if !reply.is_done() {
            if let Some(tail) = lines.finish() {
                consume(&tail, &mut reply);
            }
        }
        Ok(reply.into_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_buffer_keeps_partial_lines() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push(b"data: {\"a\""), Vec::<String>::new());
        assert_eq!(buffer.push(b":1}\r\ndata: x\nda"), ["data: {\"a\":1}", "data: x"]);
        assert_eq!(buffer.finish().as_deref(), Some("da"));
    }

    #[test]
    fn line_buffer_joins_split_utf8() {
        let bytes = "data: é\n".as_bytes();
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(&bytes[..7]).is_empty());
        assert_eq!(buffer.push(&bytes[7..]), ["data: é"]);
    }

    #[test]
    fn parses_delta_output_and_sentinel() {
        assert_eq!(
            parse_sse_line(r#"data: {"type":"response.output_text.delta","delta":"Bon"}"#),
            Some(StreamEvent::Delta("Bon".to_string()))
        );
        assert_eq!(
            parse_sse_line(
                r#"data: {"output":[{"content":[{"type":"output_text","text":"A"},{"type":"refusal","text":"x"}]},{"content":[{"type":"output_text","text":"B"}]}]}"#
            ),
            Some(StreamEvent::Output("AB".to_string()))
        );
        assert_eq!(parse_sse_line("data: [DONE]"), Some(StreamEvent::Done));
    }

    #[test]
    fn skips_everything_else() {
        assert_eq!(parse_sse_line("event: message"), None);
        assert_eq!(parse_sse_line("data: {not json"), None);
        assert_eq!(parse_sse_line("data: {\"type\":\"response.created\"}"), None);
        assert_eq!(parse_sse_line(""), None);
    }

    #[test]
    fn accumulator_appends_deltas_and_replaces_outputs() {
        let mut reply = StreamAccumulator::new();
        assert!(reply.feed(StreamEvent::Delta("Bon".to_string())));
        assert!(reply.feed(StreamEvent::Delta("jour".to_string())));
        assert_eq!(reply.text(), "Bonjour");
        assert!(reply.feed(StreamEvent::Output("Salut".to_string())));
        assert!(!reply.feed(StreamEvent::Done));
        assert!(reply.is_done());
        assert_eq!(reply.into_text(), "Salut");
    }

    #[test]
    fn request_body_matches_the_endpoint_contract() {
        let request = AiRequest::new(
            AiMode::Explain,
            ComponentContext {
                name: "Accueil".to_string(),
                source_type: "react".to_string(),
                code: "const Component = () => null;".to_string(),
                template_id: "home".to_string(),
            },
            &[ChatTurn::user("avant"), ChatTurn::assistant("réponse")],
            "Explique",
        );
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["mode"], "explain");
        assert_eq!(body["component"]["type"], "react");
        assert_eq!(body["component"]["templateId"], "home");
        assert_eq!(body["messages"].as_array().unwrap().len(), 3);
        assert_eq!(body["messages"][2], serde_json::json!({"role": "user", "content": "Explique"}));
    }

    #[test]
    fn config_from_lookup() {
        let config = AiConfig::from_lookup(|key| match key {
            "ROWSHELL_AI_ENDPOINT" => Some("http://ai.local/ask".to_string()),
            "ROWSHELL_AI_TIMEOUT_SECS" => Some("15".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.endpoint, "http://ai.local/ask");
        assert_eq!(config.stream_endpoint, DEFAULT_AI_STREAM_ENDPOINT);
        assert_eq!(config.timeout_secs, 15);

        let err = AiConfig::from_lookup(|key| {
            (key == "ROWSHELL_AI_TIMEOUT_SECS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, AiError::Config(_)));
    }
}
