//! Provider adapter implementations

mod anthropic;
mod decode;
mod factory;
mod gemini;
mod http_client;
mod openai;

pub use anthropic::{AnthropicAdapter, DEFAULT_ANTHROPIC_BASE_URL, DEFAULT_ANTHROPIC_MODEL};
pub use factory::AdapterRegistry;
pub use gemini::{GeminiAdapter, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
pub use http_client::{ByteStream, HttpClient, HttpClientTrait};
pub use openai::{OpenAiAdapter, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};
