use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::decode::{fragment_stream, Frame, FrameDecoder};
use super::http_client::HttpClientTrait;
use crate::domain::{Backend, Credentials, DomainError, FragmentStream, PromptRequest, ProviderAdapter};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Models that reject a separate system instruction
fn lacks_system_instruction(model: &str) -> bool {
    model.starts_with("gemma-")
}

/// Google Gemini adapter
///
/// `streamGenerateContent` without `alt=sse` answers with a JSON array whose
/// elements arrive incrementally; each complete element is one event.
#[derive(Debug)]
pub struct GeminiAdapter<C: HttpClientTrait> {
    client: C,
    base_url: String,
    default_model: String,
}

impl<C: HttpClientTrait> GeminiAdapter<C> {
    pub fn new(client: C) -> Self {
        Self::with_base_url(client, DEFAULT_GEMINI_BASE_URL)
    }

    pub fn with_base_url(client: C, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            base_url,
            default_model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent",
            self.base_url, model
        )
    }

    fn build_request(&self, request: &PromptRequest) -> serde_json::Value {
        let params = &request.params;
        let fold_system = lacks_system_instruction(&params.model);

        let user_text = if fold_system {
            request.merged_prompt()
        } else {
            request.user_prompt.clone()
        };

        let mut generation_config = serde_json::json!({
            "maxOutputTokens": params.max_tokens,
        });

        if let Some(temperature) = params.temperature {
            generation_config["temperature"] = serde_json::json!(temperature);
        }

        let mut body = serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": user_text}]}],
            "generationConfig": generation_config,
        });

        if !fold_system && !request.system_prompt.trim().is_empty() {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{"text": request.system_prompt}],
            });
        }

        if params.use_web_search {
            body["tools"] = serde_json::json!([{"google_search": {}}]);
        }

        body
    }
}

#[async_trait]
impl<C: HttpClientTrait> ProviderAdapter for GeminiAdapter<C> {
    async fn execute(
        &self,
        credentials: &Credentials,
        request: PromptRequest,
    ) -> Result<FragmentStream, DomainError> {
        let api_key = credentials.api_key(Backend::Gemini)?;
        let body = self.build_request(&request);

        debug!(model = %request.params.model, "Sending Gemini streaming request");

        let headers = vec![
            ("x-goog-api-key", api_key),
            ("Content-Type", "application/json"),
        ];

        let byte_stream = self
            .client
            .post_json_stream(&self.stream_url(&request.params.model), headers, &body)
            .await?;

        Ok(fragment_stream(
            "gemini",
            byte_stream,
            GeminiDecoder::default(),
            request.cancellation,
        ))
    }

    fn backend(&self) -> Backend {
        Backend::Gemini
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

/// Extracts complete top-level JSON objects from a streamed JSON array.
///
/// Tracks brace depth outside of string literals; array punctuation and
/// whitespace between objects are ignored.
#[derive(Debug, Default)]
struct JsonObjectScanner {
    current: Vec<u8>,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl JsonObjectScanner {
    fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut objects = Vec::new();

        for &byte in chunk {
            if self.depth == 0 {
                if byte == b'{' {
                    self.depth = 1;
                    self.current.push(byte);
                }
                continue;
            }

            self.current.push(byte);

            if self.in_string {
                match byte {
                    _ if self.escaped => self.escaped = false,
                    b'\\' => self.escaped = true,
                    b'"' => self.in_string = false,
                    _ => {}
                }
                continue;
            }

            match byte {
                b'"' => self.in_string = true,
                b'{' => self.depth += 1,
                b'}' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        objects.push(std::mem::take(&mut self.current));
                    }
                }
                _ => {}
            }
        }

        objects
    }

    fn has_partial(&self) -> bool {
        !self.current.is_empty()
    }
}

#[derive(Debug, Default)]
struct GeminiDecoder {
    scanner: JsonObjectScanner,
    skipped: usize,
}

impl GeminiDecoder {
    fn frame(&mut self, object: &[u8]) -> Option<Frame> {
        let event: GenerateContentResponse = match serde_json::from_slice(object) {
            Ok(event) => event,
            Err(_) => {
                self.skipped += 1;
                return None;
            }
        };

        if let Some(error) = event.error {
            return Some(Frame::Failed(DomainError::provider(
                "gemini",
                error.message.unwrap_or_else(|| "unknown stream error".to_string()),
            )));
        }

        let text: String = event
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect()
            })
            .unwrap_or_default();

        Some(Frame::Text(text))
    }
}

impl FrameDecoder for GeminiDecoder {
    fn decode(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.scanner
            .push(chunk)
            .iter()
            .filter_map(|object| self.frame(object))
            .collect()
    }

    fn finish(&mut self) -> Vec<Frame> {
        if self.scanner.has_partial() {
            self.skipped += 1;
        }
        Vec::new()
    }

    fn skipped(&self) -> usize {
        self.skipped
    }
}

// Gemini API types

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: Option<String>,
}
