use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::decode::{fragment_stream, sse_data, Frame, FrameDecoder, LineBuffer};
use super::http_client::HttpClientTrait;
use crate::domain::{
    single_fragment, Backend, Credentials, DomainError, FragmentStream, PromptRequest,
    ProviderAdapter,
};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Reasoning models spend completion tokens before answering
const REASONING_MIN_COMPLETION_TOKENS: u32 = 16384;

/// Models that take neither a system role nor `stream: true`
fn is_single_shot_model(model: &str) -> bool {
    model.starts_with("o1")
}

/// OpenAI Chat Completions adapter
///
/// Streams server-sent events for regular models. Single-shot models are
/// called without streaming and their reply is surfaced as one fragment.
#[derive(Debug)]
pub struct OpenAiAdapter<C: HttpClientTrait> {
    client: C,
    base_url: String,
    default_model: String,
}

impl<C: HttpClientTrait> OpenAiAdapter<C> {
    pub fn new(client: C) -> Self {
        Self::with_base_url(client, DEFAULT_OPENAI_BASE_URL)
    }

    pub fn with_base_url(client: C, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            base_url,
            default_model: DEFAULT_OPENAI_MODEL.to_string(),
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_request(&self, request: &PromptRequest) -> serde_json::Value {
        let params = &request.params;

        if is_single_shot_model(&params.model) {
            return serde_json::json!({
                "model": params.model,
                "messages": [{"role": "user", "content": request.merged_prompt()}],
                "stream": false,
                "max_completion_tokens": params.max_tokens.max(REASONING_MIN_COMPLETION_TOKENS),
            });
        }

        let mut messages = Vec::new();
        if !request.system_prompt.trim().is_empty() {
            messages.push(serde_json::json!({"role": "system", "content": request.system_prompt}));
        }
        messages.push(serde_json::json!({"role": "user", "content": request.user_prompt}));

        let mut body = serde_json::json!({
            "model": params.model,
            "messages": messages,
            "stream": true,
            "max_tokens": params.max_tokens,
        });

        if let Some(temperature) = params.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        if params.use_web_search {
            body["web_search_options"] = serde_json::json!({});
        }

        body
    }
}

/// Rewrite status failures into messages a user can act on
fn describe_http_error(err: DomainError, model: &str) -> DomainError {
    let (status, body) = match err {
        DomainError::Http { status, body } => (status, body),
        other => return other,
    };

    let backend_message = serde_json::from_str::<OpenAiErrorBody>(&body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message);

    let message = match status {
        401 => "Invalid API key. Please check your OpenAI API key.".to_string(),
        403 => format!(
            "Access denied for {}. Your API key may not have access to this model.",
            model
        ),
        404 => format!(
            "Model {} not found. This model may not be available for your account.",
            model
        ),
        429 => "Rate limit exceeded. Please wait a moment and try again.".to_string(),
        400 => format!(
            "Bad request: {}",
            backend_message.unwrap_or_else(|| "Invalid request parameters".to_string())
        ),
        _ => format!("HTTP {}: {}", status, backend_message.unwrap_or(body)),
    };

    DomainError::provider("openai", message)
}

#[async_trait]
impl<C: HttpClientTrait> ProviderAdapter for OpenAiAdapter<C> {
    async fn execute(
        &self,
        credentials: &Credentials,
        request: PromptRequest,
    ) -> Result<FragmentStream, DomainError> {
        let api_key = credentials.api_key(Backend::ChatGpt)?;
        let auth_header = format!("Bearer {}", api_key);
        let model = request.params.model.clone();
        let body = self.build_request(&request);
        let url = self.chat_completions_url();

        let headers = vec![
            ("Authorization", auth_header.as_str()),
            ("Content-Type", "application/json"),
        ];

        if is_single_shot_model(&model) {
            debug!(model = %model, "Sending OpenAI single-shot request");

            let response = self
                .client
                .post_json(&url, headers, &body)
                .await
                .map_err(|e| describe_http_error(e, &model))?;

            let response: OpenAiResponse = serde_json::from_value(response).map_err(|e| {
                DomainError::provider("openai", format!("Failed to parse response: {}", e))
            })?;

            let content = response
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default();

            return Ok(single_fragment(content));
        }

        debug!(model = %model, "Sending OpenAI streaming request");

        let byte_stream = self
            .client
            .post_json_stream(&url, headers, &body)
            .await
            .map_err(|e| describe_http_error(e, &model))?;

        Ok(fragment_stream(
            "openai",
            byte_stream,
            OpenAiDecoder::default(),
            request.cancellation,
        ))
    }

    fn backend(&self) -> Backend {
        Backend::ChatGpt
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

/// Decodes chat completion chunks until the `[DONE]` sentinel
#[derive(Debug, Default)]
struct OpenAiDecoder {
    lines: LineBuffer,
    skipped: usize,
}

impl OpenAiDecoder {
    fn frame(&mut self, line: &str) -> Option<Frame> {
        let data = sse_data(line)?;

        if data.is_empty() {
            return None;
        }

        if data.eq_ignore_ascii_case("[DONE]") {
            return Some(Frame::Done);
        }

        match serde_json::from_str::<OpenAiStreamChunk>(data) {
            Ok(OpenAiStreamChunk {
                error: Some(error), ..
            }) => {
                let message = error
                    .message
                    .unwrap_or_else(|| "unknown stream error".to_string());
                Some(Frame::Failed(DomainError::provider("openai", message)))
            }
            Ok(chunk) => chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta.content)
                .map(Frame::Text),
            Err(_) => {
                self.skipped += 1;
                None
            }
        }
    }
}

impl FrameDecoder for OpenAiDecoder {
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

// OpenAI API types

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<OpenAiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    error: Option<OpenAiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GenerationParams;
    use crate::infrastructure::llm::http_client::mock::MockHttpClient;
    use futures::StreamExt;

    const TEST_URL: &str = "https://api.openai.com/v1/chat/completions";

    const EVENTS: &str = concat!(
        "data: {\"id\":\"c1\",\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"id\":\"c1\",\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
        "data: {\"id\":\"c1\",\"choices\":[{\"delta\":{\"content\":\" th\u{e9}re\"}}]}\n\n",
        "data: {\"id\":\"c1\",\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );

    fn credentials() -> Credentials {
        Credentials::new().with_key(Backend::ChatGpt, "sk-test")
    }

    fn request(model: &str) -> PromptRequest {
        PromptRequest::new("Be brief", "Say hi", GenerationParams::new(model))
    }

    async fn collect(client: MockHttpClient, model: &str) -> Result<Vec<String>, DomainError> {
        let adapter = OpenAiAdapter::new(client);
        let stream = adapter.execute(&credentials(), request(model)).await?;
        stream.collect::<Vec<_>>().await.into_iter().collect()
    }

    #[tokio::test]
    async fn test_streams_delta_content() {
        let client = MockHttpClient::new().with_stream_chunks(TEST_URL, &[EVENTS]);

        let fragments = collect(client, "gpt-4o-mini").await.unwrap();

        assert_eq!(fragments, vec!["Hi", " th\u{e9}re"]);
    }

    #[tokio::test]
    async fn test_chunk_split_equivalence() {
        for size in [1, 2, 5, 33] {
            let chunks = EVENTS
                .as_bytes()
                .chunks(size)
                .map(bytes::Bytes::copy_from_slice)
                .collect();
            let client = MockHttpClient::new().with_stream_response(TEST_URL, chunks);

            let text: String = collect(client, "gpt-4o").await.unwrap().concat();
            assert_eq!(text, "Hi th\u{e9}re", "chunk size {}", size);
        }
    }

    #[tokio::test]
    async fn test_done_sentinel_is_case_insensitive_and_final() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
            "data:  [done] \n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n",
        );
        let client = MockHttpClient::new().with_stream_chunks(TEST_URL, &[body]);

        assert_eq!(collect(client, "gpt-4o").await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let body = concat!(
            ": keep-alive\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
            "data: {\"choices\":[{\"delta\":\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n",
        );
        let client = MockHttpClient::new().with_stream_chunks(TEST_URL, &[body]);

        assert_eq!(collect(client, "gpt-4o").await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_error_object_fails_stream() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
            "data: {\"error\":{\"message\":\"The server had an error\",\"type\":\"server_error\"}}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n",
        );
        let client = MockHttpClient::new().with_stream_chunks(TEST_URL, &[body]);

        let err = collect(client, "gpt-4o").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Provider error: openai - The server had an error"
        );
    }

    #[tokio::test]
    async fn test_single_shot_model() {
        let client = MockHttpClient::new().with_response(
            TEST_URL,
            serde_json::json!({
                "id": "c2",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "Reasoned answer"}}]
            }),
        );
        let adapter = OpenAiAdapter::new(client);

        let fragments: Vec<String> = adapter
            .execute(&credentials(), request("o1-mini"))
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(fragments, vec!["Reasoned answer"]);

        let sent = adapter.client.last_request().unwrap();
        assert_eq!(sent.body["stream"], false);
        assert_eq!(sent.body["max_completion_tokens"], 16384);
        assert!(sent.body.get("max_tokens").is_none());

        let messages = sent.body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "Be brief\n\n---\n\nSay hi");
    }

    #[tokio::test]
    async fn test_streaming_request_shape() {
        let client = MockHttpClient::new().with_stream_chunks(TEST_URL, &[EVENTS]);
        let adapter = OpenAiAdapter::new(client);

        let _ = adapter.execute(&credentials(), request("gpt-4o")).await.unwrap();

        let sent = adapter.client.last_request().unwrap();
        assert_eq!(sent.header("Authorization"), Some("Bearer sk-test"));
        assert_eq!(sent.body["stream"], true);
        assert_eq!(sent.body["max_tokens"], 4096);
        assert_eq!(sent.body["messages"][0]["role"], "system");
        assert_eq!(sent.body["messages"][1]["content"], "Say hi");
    }

    #[tokio::test]
    async fn test_status_messages() {
        let cases = [
            (401, "{}", "Invalid API key. Please check your OpenAI API key."),
            (429, "{}", "Rate limit exceeded. Please wait a moment and try again."),
            (
                400,
                r#"{"error":{"message":"max_tokens is too large"}}"#,
                "Bad request: max_tokens is too large",
            ),
            (
                404,
                "{}",
                "Model gpt-4o not found. This model may not be available for your account.",
            ),
            (500, "upstream exploded", "HTTP 500: upstream exploded"),
        ];

        for (status, body, expected) in cases {
            let client = MockHttpClient::new().with_status(TEST_URL, status, body);

            let err = collect(client, "gpt-4o").await.unwrap_err();
            assert_eq!(err.to_string(), format!("Provider error: openai - {}", expected));
        }
    }
}
