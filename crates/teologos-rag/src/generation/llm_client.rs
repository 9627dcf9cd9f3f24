//! Chat completion with a request deadline and bounded retry

use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, ProviderError, Result};
use crate::providers::{ChatMessage, ChatProvider, RetryPolicy};

/// Status reported alongside a timed-out completion
pub const TIMEOUT_STATUS: u16 = 408;

/// A successful completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub answer: String,
    pub status_code: u16,
}

/// Wraps a `ChatProvider` with one deadline covering every attempt.
///
/// Retryable failures (transport errors, 429, 5xx, blank completions) are
/// retried with exponential backoff; other 4xx statuses fail at once. When the
/// deadline passes, the in-flight call is dropped.
pub struct LlmClient {
    provider: Arc<dyn ChatProvider>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn ChatProvider>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            provider,
            retry,
            timeout,
        }
    }

    pub fn from_config(provider: Arc<dyn ChatProvider>, config: &LlmConfig) -> Self {
        Self::new(provider, RetryPolicy::from_config(config), config.request_timeout())
    }

    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion> {
        let provider = &self.provider;
        let attempts = self.retry.run(move |attempt| async move {
            tracing::debug!("LLM attempt {}", attempt);
            let answer = provider.chat(messages).await?;
            let answer = answer.trim();
            if answer.is_empty() {
                return Err(ProviderError::EmptyCompletion);
            }
            Ok::<_, ProviderError>(answer.to_string())
        });

        match tokio::time::timeout(self.timeout, attempts).await {
            Ok(Ok(answer)) => Ok(Completion {
                answer,
                status_code: 200,
            }),
            Ok(Err(ProviderError::Timeout)) | Err(_) => {
                tracing::error!("LLM request timed out after {:?}", self.timeout);
                Err(Error::llm_unavailable(
                    "LLM request timed out",
                    Some(TIMEOUT_STATUS),
                ))
            }
            Ok(Err(err)) => {
                tracing::error!("LLM request failed: {}", err);
                Err(Error::llm_unavailable("LLM request failed", err.status_code()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::llm::MockChatProvider;
    use async_trait::async_trait;
    use mockall::Sequence;

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage::system("Sê breve."), ChatMessage::user("O que é graça?")]
    }

    fn client(provider: impl ChatProvider + 'static) -> LlmClient {
        LlmClient::new(
            Arc::new(provider),
            RetryPolicy::default(),
            Duration::from_secs(30),
        )
    }

    fn status_of(err: Error) -> (String, Option<u16>) {
        match err {
            Error::LlmUnavailable {
                message,
                status_code,
            } => (message, status_code),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_server_errors_then_succeeds() {
        let mut mock = MockChatProvider::new();
        let mut seq = Sequence::new();
        mock.expect_chat()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(ProviderError::status(500, "upstream")));
        mock.expect_chat()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("  A graça é dom gratuito.  ".to_string()));

        let completion = client(mock).complete(&messages()).await.unwrap();
        assert_eq!(completion.answer, "A graça é dom gratuito.");
        assert_eq!(completion.status_code, 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_not_retried() {
        let mut mock = MockChatProvider::new();
        mock.expect_chat()
            .times(1)
            .returning(|_| Err(ProviderError::status(400, "bad request")));

        let err = client(mock).complete(&messages()).await.unwrap_err();
        assert_eq!(status_of(err), ("LLM request failed".to_string(), Some(400)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhausts_attempts() {
        let mut mock = MockChatProvider::new();
        mock.expect_chat()
            .times(3)
            .returning(|_| Err(ProviderError::status(429, "slow down")));

        let err = client(mock).complete(&messages()).await.unwrap_err();
        assert_eq!(status_of(err), ("LLM request failed".to_string(), Some(429)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_completion_is_retried() {
        let mut mock = MockChatProvider::new();
        let mut seq = Sequence::new();
        mock.expect_chat()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("   ".to_string()));
        mock.expect_chat()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("Sim.".to_string()));

        let completion = client(mock).complete(&messages()).await.unwrap();
        assert_eq!(completion.answer, "Sim.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_completions_exhausted_without_status() {
        let mut mock = MockChatProvider::new();
        mock.expect_chat().times(3).returning(|_| Ok(String::new()));

        let err = client(mock).complete(&messages()).await.unwrap_err();
        assert_eq!(status_of(err), ("LLM request failed".to_string(), None));
    }

    struct HangingChat;

    #[async_trait]
    impl ChatProvider for HangingChat {
        async fn chat(&self, _messages: &[ChatMessage]) -> std::result::Result<String, ProviderError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_hanging_call() {
        let started = tokio::time::Instant::now();
        let err = client(HangingChat).complete(&messages()).await.unwrap_err();

        assert_eq!(status_of(err), ("LLM request timed out".to_string(), Some(408)));
        assert!(started.elapsed() >= Duration::from_secs(30));
    }
}
