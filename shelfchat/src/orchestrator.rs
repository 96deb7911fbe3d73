//! Ordered fallback across provider adapters.
//!
//! Providers are tried strictly in priority order. Each attempt gets a fresh
//! buffer; when an attempt soft-fails its buffer and typing session are
//! thrown away before the next provider is opened, so no text from a failed
//! provider ever reaches the final message.

use crate::error::{ChatError, ChatResult};
use futures::StreamExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shelfchat_core::{ChatPayload, MessageId};
use shelfchat_providers::{
    ByteStream, ProviderAdapter, ProviderError, ProviderOutput, ProviderResult,
};
use shelfchat_render::TypingRenderer;
use shelfchat_streaming::{
    default_segmenter, DeltaBuffer, FrameStream, SharedBuffer, TextSegmenter, TokenReconciler,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Default idle timeout between two reads of a provider stream.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for opening a provider.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(60);

/// Where the orchestrator is in the current exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OrchestratorState {
    /// No exchange has run yet.
    Idle,
    /// Waiting on the provider at `index`.
    Trying {
        /// Provider identifier.
        provider: String,
        /// Zero-based position in the priority list.
        index: usize,
    },
    /// A provider produced the reply.
    Success {
        /// Provider identifier.
        provider: String,
    },
    /// Every provider failed.
    AllFailed,
}

impl OrchestratorState {
    /// Whether the exchange has ended.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::AllFailed)
    }
}

/// Result of one provider attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Still running.
    Pending,
    /// Produced the reply.
    Success,
    /// Failed; the next provider was tried.
    SoftFailure {
        /// Failure description.
        reason: String,
    },
}

/// One entry of the attempt history of an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    /// Provider identifier.
    pub provider_id: String,
    /// Outcome.
    pub outcome: AttemptOutcome,
}

impl ProviderAttempt {
    fn pending(provider_id: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            outcome: AttemptOutcome::Pending,
        }
    }

    /// Whether this attempt produced the reply.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }
}

/// The reply of a successful exchange.
#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    /// Final aggregate text.
    pub text: String,
    /// Provider that produced it.
    pub provider_id: String,
    /// Attempt history in priority order.
    pub attempts: Vec<ProviderAttempt>,
    /// Closed buffer holding `text`, shared with the renderer.
    pub buffer: SharedBuffer,
}

/// Tries providers in order until one yields visible text.
pub struct FallbackOrchestrator {
    providers: Vec<Arc<dyn ProviderAdapter>>,
    renderer: TypingRenderer,
    segmenter: Arc<dyn TextSegmenter>,
    read_timeout: Duration,
    open_timeout: Duration,
    state: Mutex<OrchestratorState>,
}

impl std::fmt::Debug for FallbackOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackOrchestrator")
            .field("providers", &self.provider_ids())
            .field("read_timeout", &self.read_timeout)
            .field("open_timeout", &self.open_timeout)
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl FallbackOrchestrator {
    /// Create an orchestrator over `providers` in priority order.
    pub fn new(providers: Vec<Arc<dyn ProviderAdapter>>, renderer: TypingRenderer) -> Self {
        Self {
            providers,
            renderer,
            segmenter: default_segmenter(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            state: Mutex::new(OrchestratorState::Idle),
        }
    }

    /// Set the idle timeout between stream reads.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the timeout for opening a provider.
    #[must_use]
    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Use a different text segmenter for new buffers.
    #[must_use]
    pub fn with_segmenter(mut self, segmenter: Arc<dyn TextSegmenter>) -> Self {
        self.segmenter = segmenter;
        self
    }

    /// Provider identifiers in priority order.
    #[must_use]
    pub fn provider_ids(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    /// The renderer driven by this orchestrator.
    #[must_use]
    pub fn renderer(&self) -> &TypingRenderer {
        &self.renderer
    }

    /// State of the most recent exchange.
    #[must_use]
    pub fn state(&self) -> OrchestratorState {
        self.state.lock().clone()
    }

    fn transition(&self, next: OrchestratorState) {
        let mut state = self.state.lock();
        debug!(from = ?*state, to = ?next, "Orchestrator transition");
        *state = next;
    }

    /// Run one exchange, typing the reply into message `target`.
    ///
    /// Returns [`ChatError::AllProvidersExhausted`] when no provider succeeds;
    /// individual provider failures are logged and never returned.
    pub async fn run(&self, target: MessageId, payload: &ChatPayload) -> ChatResult<ExchangeOutcome> {
        let total = self.providers.len();
        if total == 0 {
            return Err(ChatError::configuration("no providers configured"));
        }

        let mut attempts: Vec<ProviderAttempt> = Vec::with_capacity(total);

        for (index, provider) in self.providers.iter().enumerate() {
            let provider_id = provider.id().to_string();
            self.transition(OrchestratorState::Trying {
                provider: provider_id.clone(),
                index,
            });
            attempts.push(ProviderAttempt::pending(&provider_id));
            debug!(
                provider = %provider_id,
                attempt = index + 1,
                total,
                "Trying provider"
            );

            match self.attempt(provider.as_ref(), target, payload).await {
                Ok((text, buffer)) => {
                    if let Some(last) = attempts.last_mut() {
                        last.outcome = AttemptOutcome::Success;
                    }
                    self.transition(OrchestratorState::Success {
                        provider: provider_id.clone(),
                    });
                    debug!(provider = %provider_id, chars = text.chars().count(), "Provider succeeded");
                    return Ok(ExchangeOutcome {
                        text,
                        provider_id,
                        attempts,
                        buffer,
                    });
                }
                Err(e) => {
                    self.renderer.retract(target);
                    warn!(
                        provider = %provider_id,
                        attempt = index + 1,
                        total,
                        error = %e,
                        "Provider failed, trying next"
                    );
                    if let Some(last) = attempts.last_mut() {
                        last.outcome = AttemptOutcome::SoftFailure {
                            reason: e.to_string(),
                        };
                    }
                }
            }
        }

        self.transition(OrchestratorState::AllFailed);
        error!(attempts = attempts.len(), "All providers exhausted");
        Err(ChatError::AllProvidersExhausted { attempts })
    }

    async fn attempt(
        &self,
        provider: &dyn ProviderAdapter,
        target: MessageId,
        payload: &ChatPayload,
    ) -> ProviderResult<(String, SharedBuffer)> {
        let output = timeout(self.open_timeout, provider.open(payload))
            .await
            .map_err(|_| ProviderError::Timeout(self.open_timeout))??;

        match output {
            ProviderOutput::Stream(stream) => self.consume(stream, target).await,
            ProviderOutput::Completed(text) => {
                let buffer =
                    SharedBuffer::new(DeltaBuffer::completed(text.clone(), self.segmenter.clone()));
                self.renderer.start(target, buffer.clone());
                Ok((text, buffer))
            }
        }
    }

    /// Drain a frame stream into a fresh buffer.
    ///
    /// Typing starts with the first non-blank text. The stream is read to
    /// its end even if the user skips ahead.
    async fn consume(
        &self,
        stream: ByteStream,
        target: MessageId,
    ) -> ProviderResult<(String, SharedBuffer)> {
        let buffer = SharedBuffer::new(DeltaBuffer::with_segmenter(self.segmenter.clone()));
        let mut frames = FrameStream::new(stream);
        let mut reconciler = TokenReconciler::new();
        let mut typing = false;

        loop {
            let next = timeout(self.read_timeout, frames.next())
                .await
                .map_err(|_| ProviderError::Timeout(self.read_timeout))?;
            let Some(frame) = next else {
                break;
            };

            let delta = reconciler.reconcile(&frame?);
            if delta.is_empty() {
                continue;
            }
            buffer.append(&delta)?;

            if typing {
                self.renderer.notify();
            } else if !buffer.read().is_blank() {
                self.renderer.start(target, buffer.clone());
                typing = true;
            }
        }

        buffer.close();
        debug!(
            frames = frames.normalizer().frame_count(),
            dropped = frames.normalizer().dropped_count(),
            "Stream ended"
        );

        if buffer.read().is_blank() {
            return Err(ProviderError::EmptyResponse);
        }
        self.renderer.notify();
        Ok((reconciler.aggregate().to_string(), buffer))
    }
}
