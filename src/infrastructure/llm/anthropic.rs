use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::decode::{fragment_stream, sse_data, Frame, FrameDecoder, LineBuffer};
use super::http_client::HttpClientTrait;
use crate::domain::{Backend, Credentials, DomainError, FragmentStream, PromptRequest, ProviderAdapter};

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API adapter (server-sent events)
#[derive(Debug)]
pub struct AnthropicAdapter<C: HttpClientTrait> {
    client: C,
    base_url: String,
    default_model: String,
}

impl<C: HttpClientTrait> AnthropicAdapter<C> {
    pub fn new(client: C) -> Self {
        Self::with_base_url(client, DEFAULT_ANTHROPIC_BASE_URL)
    }

    pub fn with_base_url(client: C, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            base_url,
            default_model: DEFAULT_ANTHROPIC_MODEL.to_string(),
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn build_request(&self, request: &PromptRequest) -> serde_json::Value {
        let params = &request.params;

        let mut body = serde_json::json!({
            "model": params.model,
            "max_tokens": params.max_tokens,
            "messages": [{"role": "user", "content": request.user_prompt}],
            "stream": true,
        });

        if !request.system_prompt.trim().is_empty() {
            body["system"] = serde_json::json!(request.system_prompt);
        }

        if let Some(temperature) = params.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        if params.use_web_search {
            body["tools"] = serde_json::json!([{
                "type": "web_search_20250305",
                "name": "web_search",
            }]);
        }

        body
    }
}

#[async_trait]
impl<C: HttpClientTrait> ProviderAdapter for AnthropicAdapter<C> {
    async fn execute(
        &self,
        credentials: &Credentials,
        request: PromptRequest,
    ) -> Result<FragmentStream, DomainError> {
        let api_key = credentials.api_key(Backend::Claude)?;
        let body = self.build_request(&request);

        debug!(model = %request.params.model, "Sending Anthropic streaming request");

        let headers = vec![
            ("x-api-key", api_key),
            ("anthropic-version", ANTHROPIC_VERSION),
            ("Content-Type", "application/json"),
        ];

        let byte_stream = self
            .client
            .post_json_stream(&self.messages_url(), headers, &body)
            .await?;

        Ok(fragment_stream(
            "anthropic",
            byte_stream,
            AnthropicDecoder::default(),
            request.cancellation,
        ))
    }

    fn backend(&self) -> Backend {
        Backend::Claude
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

/// Decodes `data:` lines carrying Anthropic stream events
#[derive(Debug, Default)]
struct AnthropicDecoder {
    lines: LineBuffer,
    skipped: usize,
}

impl AnthropicDecoder {
    fn frame(&mut self, line: &str) -> Option<Frame> {
        let data = sse_data(line)?;

        if data.is_empty() || data == "[DONE]" {
            return None;
        }

        let event: AnthropicStreamEvent = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(_) => {
                self.skipped += 1;
                return None;
            }
        };

        match event.event_type.as_str() {
            "content_block_delta" => event
                .delta
                .filter(|d| d.delta_type == "text_delta")
                .and_then(|d| d.text)
                .map(Frame::Text),
            "error" => {
                let message = event
                    .error
                    .map(|e| format!("{}: {}", e.error_type, e.message))
                    .unwrap_or_else(|| "unknown stream error".to_string());
                Some(Frame::Failed(DomainError::provider("anthropic", message)))
            }
            _ => None,
        }
    }
}

impl FrameDecoder for AnthropicDecoder {
    fn decode(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.lines
            .push(chunk)
            .iter()
            .filter_map(|line| self.frame(line))
            .collect()
    }

    fn finish(&mut self) -> Vec<Frame> {
        match self.lines.take_rest() {
            Some(line) => self.frame(&line).into_iter().collect(),
            None => Vec::new(),
        }
    }

    fn skipped(&self) -> usize {
        self.skipped
    }
}

// Anthropic API types

#[derive(Debug, Deserialize)]
struct AnthropicStreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    delta: Option<StreamDelta>,
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(rename = "type", default)]
    delta_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    message: String,
}
