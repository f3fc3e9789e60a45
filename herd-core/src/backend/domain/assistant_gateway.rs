//! Gateway for calls to the external generative assistant.
//!
//! Every outbound call passes the shared [`RateLimiter`] first. In
//! [`AdmissionMode::Reject`] an exhausted quota fails immediately with the
//! limiter's error; in [`AdmissionMode::Wait`] the call suspends until a slot
//! frees up. Provider failures are returned as-is and never retried.

use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;
use thiserror::Error;

use crate::backend::domain::rate_limiter::{RateLimitError, RateLimiter};

/// The external text-generation API
#[async_trait]
pub trait AssistantProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdmissionMode {
    #[default]
    Reject,
    Wait,
}

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error(transparent)]
    RateLimited(#[from] RateLimitError),
    #[error(transparent)]
    Provider(anyhow::Error),
}

pub struct AssistantGateway<P: AssistantProvider> {
    provider: Arc<P>,
    limiter: RateLimiter,
    mode: AdmissionMode,
}

impl<P: AssistantProvider> Clone for AssistantGateway<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            limiter: self.limiter.clone(),
            mode: self.mode,
        }
    }
}

impl<P: AssistantProvider> AssistantGateway<P> {
    pub fn new(provider: P, limiter: RateLimiter, mode: AdmissionMode) -> Self {
        Self {
            provider: Arc::new(provider),
            limiter,
            mode,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn mode(&self) -> AdmissionMode {
        self.mode
    }

    /// Send one prompt to the provider once the limiter admits it
    pub async fn ask(&self, prompt: &str) -> Result<String, AssistantError> {
        match self.mode {
            AdmissionMode::Reject => self.limiter.acquire()?,
            AdmissionMode::Wait => {
                debug!("Waiting for assistant quota");
                self.limiter.wait_and_acquire().await;
            }
        }

        info!("Sending assistant prompt ({} chars)", prompt.chars().count());
        self.provider.generate(prompt).await.map_err(|e| {
            warn!("Assistant provider error: {}", e);
            AssistantError::Provider(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct MockProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl AssistantProvider for MockProvider {
        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("quota backend unavailable");
            }
            Ok(format!("echo: {}", prompt))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reject_mode_surfaces_rate_limit() {
        let gateway = AssistantGateway::new(MockProvider::default(), RateLimiter::new(2, 1000), AdmissionMode::Reject);

        assert_eq!(gateway.ask("one").await.unwrap(), "echo: one");
        assert_eq!(gateway.ask("two").await.unwrap(), "echo: two");

        match gateway.ask("three").await {
            Err(AssistantError::RateLimited(RateLimitError::Exceeded { reset_in_ms })) => {
                assert!(reset_in_ms > 0 && reset_in_ms <= 1000);
            }
            other => panic!("expected rate limit error, got {:?}", other),
        }
        assert_eq!(gateway.provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_mode_delays_instead_of_failing() {
        let gateway = AssistantGateway::new(MockProvider::default(), RateLimiter::new(1, 1000), AdmissionMode::Wait);

        let started = tokio::time::Instant::now();
        gateway.ask("first").await.unwrap();
        gateway.ask("second").await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert_eq!(gateway.provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_failure_is_not_retried() {
        let provider = MockProvider {
            fail: true,
            ..Default::default()
        };
        let gateway = AssistantGateway::new(provider, RateLimiter::new(5, 1000), AdmissionMode::Reject);

        let result = gateway.ask("hello").await;
        assert!(matches!(result, Err(AssistantError::Provider(_))));
        assert_eq!(gateway.provider.calls.load(Ordering::SeqCst), 1);
        // The failed call still consumed quota
        assert_eq!(gateway.limiter().get_stats().used, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_limiter() {
        let gateway = AssistantGateway::new(MockProvider::default(), RateLimiter::new(1, 1000), AdmissionMode::Reject);
        let clone = gateway.clone();

        gateway.ask("a").await.unwrap();
        assert!(clone.ask("b").await.is_err());
    }
}
