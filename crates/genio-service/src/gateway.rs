//! Provider gateway: per-media routing with timeout, retry and fallback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use genio_core::MediaType;

use crate::providers::{Provider, ProviderError, ProviderOutput, ProviderRequest};

/// Retry policy shared by every route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts against the primary target.
    pub max_attempts: u32,
    /// Delay unit; the wait after attempt `n` is `n * base_delay`.
    pub base_delay: Duration,
    /// Attempts against the fallback target.
    pub fallback_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            fallback_attempts: 1,
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// A provider and the model to run on it.
#[derive(Clone)]
pub struct Target {
    /// Provider client.
    pub provider: Arc<dyn Provider>,
    /// Model id.
    pub model: String,
}

impl Target {
    /// Create a target.
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

/// Where one media type goes.
#[derive(Clone)]
pub struct Route {
    /// Tried first, up to `max_attempts` times.
    pub primary: Target,
    /// Tried after the primary is exhausted by retryable failures.
    pub fallback: Option<Target>,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

/// Routes generation calls to providers.
#[derive(Clone, Default)]
pub struct ProviderGateway {
    routes: HashMap<MediaType, Route>,
    policy: RetryPolicy,
}

impl ProviderGateway {
    /// Create a gateway with no routes.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            routes: HashMap::new(),
            policy,
        }
    }

    /// Add or replace the route for `media`.
    #[must_use]
    pub fn with_route(mut self, media: MediaType, route: Route) -> Self {
        self.routes.insert(media, route);
        self
    }

    /// Whether `media` can be served.
    #[must_use]
    pub fn has_route(&self, media: MediaType) -> bool {
        self.routes.contains_key(&media)
    }

    /// Media types with a route.
    #[must_use]
    pub fn routed_media(&self) -> Vec<MediaType> {
        MediaType::ALL
            .iter()
            .copied()
            .filter(|m| self.has_route(*m))
            .collect()
    }

    /// Run `request` on the route for `media`.
    ///
    /// `model` overrides the primary target's model, for requests that pick
    /// their own model.
    ///
    /// # Errors
    ///
    /// Returns the last provider error once the primary and any fallback are
    /// exhausted, or the first non-retryable error.
    pub async fn invoke(
        &self,
        media: MediaType,
        request: &ProviderRequest,
        model: Option<&str>,
    ) -> Result<ProviderOutput, ProviderError> {
        let route = self.routes.get(&media).ok_or_else(|| {
            ProviderError::model_unavailable(None, format!("no provider configured for {media}"))
        })?;

        let mut primary = route.primary.clone();
        if let Some(model) = model {
            model.clone_into(&mut primary.model);
        }

        let err = match self
            .try_target(&primary, self.policy.max_attempts, route.timeout, request)
            .await
        {
            Ok(output) => return Ok(output),
            Err(err) => err,
        };

        match &route.fallback {
            Some(fallback) if err.is_retryable() && self.policy.fallback_attempts > 0 => {
                tracing::warn!(
                    %media,
                    primary = %primary.model,
                    fallback = %fallback.model,
                    error = %err,
                    "Primary model exhausted, trying fallback"
                );
                self.try_target(fallback, self.policy.fallback_attempts, route.timeout, request)
                    .await
            }
            _ => Err(err),
        }
    }

    async fn try_target(
        &self,
        target: &Target,
        attempts: u32,
        timeout: Duration,
        request: &ProviderRequest,
    ) -> Result<ProviderOutput, ProviderError> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            let result =
                match tokio::time::timeout(timeout, target.provider.invoke(&target.model, request))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::timeout(timeout)),
                };

            let err = match result {
                Ok(output) => {
                    tracing::debug!(
                        provider = target.provider.name(),
                        model = %target.model,
                        attempt,
                        "Provider call succeeded"
                    );
                    return Ok(output);
                }
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= attempts {
                tracing::warn!(
                    provider = target.provider.name(),
                    model = %target.model,
                    attempt,
                    kind = %err.kind,
                    error = %err.message,
                    "Provider call failed"
                );
                return Err(err);
            }

            let delay = self.policy.delay_after(attempt);
            tracing::info!(
                provider = target.provider.name(),
                model = %target.model,
                attempt,
                kind = %err.kind,
                delay_secs = delay.as_secs(),
                "Provider call failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::providers::ProviderErrorKind;

    /// Provider that replays a script of outcomes and records the models it saw.
    pub(crate) struct ScriptedProvider {
        script: Mutex<VecDeque<Result<ProviderOutput, ProviderError>>>,
        calls: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl ScriptedProvider {
        pub(crate) fn new(
            script: impl IntoIterator<Item = Result<ProviderOutput, ProviderError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into_iter().collect()),
                calls: Mutex::new(Vec::new()),
                delay: None,
            })
        }

        /// Answers every call with a short text.
        pub(crate) fn always_ok() -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
                delay: None,
            })
        }

        pub(crate) fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
                delay: Some(delay),
            })
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn invoke(
            &self,
            model: &str,
            _request: &ProviderRequest,
        ) -> Result<ProviderOutput, ProviderError> {
            self.calls.lock().unwrap().push(model.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(ProviderOutput::Text("default output".into())))
        }
    }

    fn text() -> ProviderRequest {
        ProviderRequest::Text {
            prompt: "p".into(),
            max_new_tokens: 10,
        }
    }

    fn ok(s: &str) -> Result<ProviderOutput, ProviderError> {
        Ok(ProviderOutput::Text(s.into()))
    }

    fn gateway(primary: Arc<ScriptedProvider>, fallback: Option<Arc<ScriptedProvider>>) -> ProviderGateway {
        ProviderGateway::new(RetryPolicy::default()).with_route(
            MediaType::Text,
            Route {
                primary: Target::new(primary, "primary-model"),
                fallback: fallback.map(|f| Target::new(f as Arc<dyn Provider>, "fallback-model")),
                timeout: Duration::from_secs(30),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn loading_twice_then_success_takes_three_attempts() {
        let provider = ScriptedProvider::new([
            Err(ProviderError::model_loading(None, "loading")),
            Err(ProviderError::model_loading(None, "loading")),
            ok("done"),
        ]);
        let gw = gateway(provider.clone(), None);

        let start = Instant::now();
        let output = gw.invoke(MediaType::Text, &text(), None).await.unwrap();

        assert_eq!(output, ProviderOutput::Text("done".into()));
        assert_eq!(provider.calls().len(), 3);
        // 5s after the first failure, 10s after the second.
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_is_not_retried_and_skips_fallback() {
        let primary = ScriptedProvider::new([Err(ProviderError::authentication("bad key"))]);
        let fallback = ScriptedProvider::new([ok("fallback")]);
        let gw = gateway(primary.clone(), Some(fallback.clone()));

        let err = gw.invoke(MediaType::Text, &text(), None).await.unwrap_err();

        assert_eq!(err.kind, ProviderErrorKind::AuthenticationFailure);
        assert_eq!(primary.calls().len(), 1);
        assert!(fallback.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_primary_falls_back_once() {
        let primary = ScriptedProvider::new((0..3).map(|_| Err(ProviderError::unknown("502"))));
        let fallback = ScriptedProvider::new([ok("from fallback")]);
        let gw = gateway(primary.clone(), Some(fallback.clone()));

        let output = gw.invoke(MediaType::Text, &text(), None).await.unwrap();

        assert_eq!(output, ProviderOutput::Text("from fallback".into()));
        assert_eq!(primary.calls().len(), 3);
        assert_eq!(fallback.calls(), vec!["fallback-model".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempts_time_out_and_are_retried() {
        let provider = ScriptedProvider::slow(Duration::from_secs(45));
        let gw = gateway(provider.clone(), None);

        let err = gw.invoke(MediaType::Text, &text(), None).await.unwrap_err();

        assert_eq!(err.kind, ProviderErrorKind::Unknown);
        assert_eq!(provider.calls().len(), 3);
    }

    #[tokio::test]
    async fn model_override_replaces_primary_model() {
        let provider = ScriptedProvider::new([ok("x")]);
        let gw = gateway(provider.clone(), None);

        gw.invoke(MediaType::Text, &text(), Some("custom-model"))
            .await
            .unwrap();
        assert_eq!(provider.calls(), vec!["custom-model".to_string()]);
    }

    #[tokio::test]
    async fn missing_route_is_unavailable() {
        let gw = ProviderGateway::new(RetryPolicy::default());
        assert!(!gw.has_route(MediaType::Video));
        let err = gw.invoke(MediaType::Video, &text(), None).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::ModelUnavailable);
    }

    #[test]
    fn delay_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(5));
        assert_eq!(policy.delay_after(2), Duration::from_secs(10));
    }
}
