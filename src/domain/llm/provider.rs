use async_trait::async_trait;
use futures::Stream;
use std::fmt::Debug;
use std::pin::Pin;

use super::{Credentials, PromptRequest};
use crate::domain::skill::Backend;
use crate::domain::DomainError;

/// Incremental text produced by a provider adapter, in arrival order
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, DomainError>> + Send>>;

/// Backend-specific adapter translating a prompt into a wire request and its
/// streamed response into uniform text fragments
#[async_trait]
pub trait ProviderAdapter: Send + Sync + Debug {
    /// Send the request and return the fragment stream.
    ///
    /// Request-level failures (missing key, non-success HTTP status) are
    /// returned here, before any fragment is produced.
    async fn execute(
        &self,
        credentials: &Credentials,
        request: PromptRequest,
    ) -> Result<FragmentStream, DomainError>;

    /// Backend family served by this adapter
    fn backend(&self) -> Backend;

    /// Model used when a skill does not pin one
    fn default_model(&self) -> &str;
}

/// Wrap a complete response as a one-fragment stream
pub fn single_fragment(text: String) -> FragmentStream {
    let items = if text.is_empty() { vec![] } else { vec![Ok(text)] };
    Box::pin(futures::stream::iter(items))
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use futures::stream;

    /// Scripted reply for one `execute` call
    #[derive(Debug, Clone)]
    pub enum MockReply {
        Fragments(Vec<String>),
        /// Fails before streaming begins
        Error(String),
        /// Yields the fragments, then a mid-stream error
        BrokenStream(Vec<String>, String),
    }

    /// Adapter replaying scripted replies in call order
    #[derive(Debug)]
    pub struct MockProviderAdapter {
        backend: Backend,
        replies: Mutex<VecDeque<MockReply>>,
        requests: Mutex<Vec<PromptRequest>>,
    }

    impl MockProviderAdapter {
        pub fn new(backend: Backend) -> Self {
            Self {
                backend,
                replies: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn with_reply(self, fragments: &[&str]) -> Self {
            self.push(MockReply::Fragments(
                fragments.iter().map(|f| f.to_string()).collect(),
            ));
            self
        }

        pub fn with_error(self, message: impl Into<String>) -> Self {
            self.push(MockReply::Error(message.into()));
            self
        }

        pub fn with_broken_stream(self, fragments: &[&str], message: impl Into<String>) -> Self {
            self.push(MockReply::BrokenStream(
                fragments.iter().map(|f| f.to_string()).collect(),
                message.into(),
            ));
            self
        }

        fn push(&self, reply: MockReply) {
            self.replies.lock().unwrap().push_back(reply);
        }

        pub fn requests(&self) -> Vec<PromptRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ProviderAdapter for MockProviderAdapter {
        async fn execute(
            &self,
            credentials: &Credentials,
            request: PromptRequest,
        ) -> Result<FragmentStream, DomainError> {
            credentials.api_key(self.backend)?;
            self.requests.lock().unwrap().push(request);

            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(MockReply::Fragments(vec![]));

            match reply {
                MockReply::Fragments(fragments) => {
                    Ok(Box::pin(stream::iter(fragments.into_iter().map(Ok))))
                }
                MockReply::Error(message) => Err(DomainError::provider("mock", message)),
                MockReply::BrokenStream(fragments, message) => {
                    let items = fragments
                        .into_iter()
                        .map(Ok)
                        .chain(std::iter::once(Err(DomainError::provider("mock", message))));
                    Ok(Box::pin(stream::iter(items.collect::<Vec<_>>())))
                }
            }
        }

        fn backend(&self) -> Backend {
            self.backend
        }

        fn default_model(&self) -> &str {
            "mock-model"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_single_fragment() {
        let fragments: Vec<String> = single_fragment("whole answer".to_string())
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(fragments, vec!["whole answer"]);
    }

    #[test]
    fn test_single_fragment_empty() {
        let count = tokio_test::block_on(single_fragment(String::new()).count());
        assert_eq!(count, 0);
    }
}
