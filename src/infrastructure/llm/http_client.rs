use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;

use crate::domain::DomainError;

/// Stream type for HTTP responses
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, DomainError>> + Send>>;

/// Trait for HTTP client operations (for mocking)
///
/// Non-success statuses are reported as `DomainError::Http` carrying the
/// response body, before any byte of a stream is handed out.
#[async_trait]
pub trait HttpClientTrait: Send + Sync + std::fmt::Debug {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError>;

    async fn post_json_stream(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<ByteStream, DomainError>;
}

/// Real HTTP client using reqwest
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                DomainError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    async fn send(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, DomainError> {
        let mut request = self.client.post(url);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request
            .json(body)
            .send()
            .await
            .map_err(|e| DomainError::provider("http", format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_body = response.text().await.unwrap_or_default();
            return Err(DomainError::http(status, error_body));
        }

        Ok(response)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError> {
        self.send(url, headers, body)
            .await?
            .json()
            .await
            .map_err(|e| DomainError::provider("http", format!("Failed to parse response: {}", e)))
    }

    async fn post_json_stream(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<ByteStream, DomainError> {
        use futures::StreamExt;

        let response = self.send(url, headers, body).await?;
        let stream = response.bytes_stream().map(|result| {
            result.map_err(|e| DomainError::provider("http", format!("Stream error: {}", e)))
        });

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use futures::stream;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// A request seen by the mock, headers included
    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub url: String,
        pub headers: Vec<(String, String)>,
        pub body: serde_json::Value,
    }

    impl RecordedRequest {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    /// Canned reply for one URL
    #[derive(Debug, Clone)]
    enum Route {
        Json(serde_json::Value),
        Chunks(Vec<Bytes>),
        Status(u16, String),
    }

    /// Replays canned replies keyed by URL and records every request
    #[derive(Debug, Default)]
    pub struct MockHttpClient {
        routes: Mutex<HashMap<String, Route>>,
        seen: Mutex<Vec<RecordedRequest>>,
    }

    impl MockHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        fn route(self, url: impl Into<String>, route: Route) -> Self {
            self.routes.lock().unwrap().insert(url.into(), route);
            self
        }

        pub fn with_response(self, url: impl Into<String>, response: serde_json::Value) -> Self {
            self.route(url, Route::Json(response))
        }

        pub fn with_stream_response(self, url: impl Into<String>, chunks: Vec<Bytes>) -> Self {
            self.route(url, Route::Chunks(chunks))
        }

        pub fn with_stream_chunks(self, url: impl Into<String>, chunks: &[&str]) -> Self {
            let chunks = chunks
                .iter()
                .map(|c| Bytes::copy_from_slice(c.as_bytes()))
                .collect();
            self.with_stream_response(url, chunks)
        }

        /// Non-success HTTP status with the given body
        pub fn with_status(self, url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
            self.route(url, Route::Status(status, body.into()))
        }

        pub fn last_request(&self) -> Option<RecordedRequest> {
            self.seen.lock().unwrap().last().cloned()
        }

        fn answer(
            &self,
            url: &str,
            headers: &[(&str, &str)],
            body: &serde_json::Value,
        ) -> Result<Option<Route>, DomainError> {
            self.seen.lock().unwrap().push(RecordedRequest {
                url: url.to_string(),
                headers: headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                body: body.clone(),
            });

            match self.routes.lock().unwrap().get(url).cloned() {
                Some(Route::Status(status, body)) => Err(DomainError::http(status, body)),
                other => Ok(other),
            }
        }
    }

    #[async_trait]
    impl HttpClientTrait for MockHttpClient {
        async fn post_json(
            &self,
            url: &str,
            headers: Vec<(&str, &str)>,
            body: &serde_json::Value,
        ) -> Result<serde_json::Value, DomainError> {
            match self.answer(url, &headers, body)? {
                Some(Route::Json(value)) => Ok(value),
                _ => Err(DomainError::provider(
                    "mock",
                    format!("no JSON reply registered for {}", url),
                )),
            }
        }

        async fn post_json_stream(
            &self,
            url: &str,
            headers: Vec<(&str, &str)>,
            body: &serde_json::Value,
        ) -> Result<ByteStream, DomainError> {
            let chunks = match self.answer(url, &headers, body)? {
                Some(Route::Chunks(chunks)) => chunks,
                _ => Vec::new(),
            };

            Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_status_error_carries_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429).set_body_string(r#"{"error":"slow down"}"#))
            .mount(&server)
            .await;

        let client = HttpClient::new();
        let result = client
            .post_json_stream(
                &format!("{}/v1/messages", server.uri()),
                vec![],
                &json!({"stream": true}),
            )
            .await;

        match result {
            Err(DomainError::Http { status, body }) => {
                assert_eq!(status, 429);
                assert!(body.contains("slow down"));
            }
            other => panic!("expected HTTP error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_stream_yields_body_bytes() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/stream"))
            .and(header("x-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: hello\n\n"))
            .mount(&server)
            .await;

        let client = HttpClient::with_timeout(Duration::from_secs(5)).unwrap();
        let mut stream = client
            .post_json_stream(
                &format!("{}/stream", server.uri()),
                vec![("x-api-key", "secret")],
                &json!({}),
            )
            .await
            .unwrap();

        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk.unwrap());
        }

        assert_eq!(body, b"data: hello\n\n");
    }

    #[tokio::test]
    async fn test_post_json_parses_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let value = HttpClient::new()
            .post_json(&format!("{}/json", server.uri()), vec![], &json!({}))
            .await
            .unwrap();

        assert_eq!(value["ok"], true);
    }
}
