//! Async tick driver for typing sessions.

use crate::config::TypingConfig;
use crate::session::{TypingPhase, TypingSession, TypingView};
use parking_lot::Mutex;
use shelfchat_core::MessageId;
use shelfchat_streaming::SharedBuffer;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Views buffered per subscriber before it starts lagging.
pub const VIEW_CAPACITY: usize = 1024;

struct ActiveSession {
    generation: u64,
    session: TypingSession,
    tick: CancellationToken,
}

impl ActiveSession {
    fn stop(&self) {
        self.tick.cancel();
    }
}

#[derive(Default)]
struct State {
    active: Option<ActiveSession>,
    generation: u64,
}

struct Shared {
    config: TypingConfig,
    state: Mutex<State>,
    latest: watch::Sender<Option<TypingView>>,
    events: broadcast::Sender<TypingView>,
}

/// Drives at most one [`TypingSession`] at a time on a fixed tick.
///
/// Cloning yields another handle to the same renderer, so a UI can call
/// [`skip`](Self::skip) while an exchange is running. Every view change is
/// published in order through [`subscribe`](Self::subscribe); the latest view
/// alone is available through [`watch`](Self::watch).
#[derive(Clone)]
pub struct TypingRenderer {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for TypingRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypingRenderer")
            .field("config", &self.shared.config)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Default for TypingRenderer {
    fn default() -> Self {
        Self::new(TypingConfig::default())
    }
}

impl TypingRenderer {
    /// Create a renderer.
    #[must_use]
    pub fn new(config: TypingConfig) -> Self {
        let (latest, _) = watch::channel(None);
        let (events, _) = broadcast::channel(VIEW_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(State::default()),
                latest,
                events,
            }),
        }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &TypingConfig {
        &self.shared.config
    }

    /// Receive every view published from now on, in order.
    ///
    /// The final view of a session committed by [`start`](Self::start) is
    /// delivered before the first view of the new session. A receiver more
    /// than [`VIEW_CAPACITY`] views behind gets `RecvError::Lagged`.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TypingView> {
        self.shared.events.subscribe()
    }

    /// Observe only the latest view. `None` after [`cancel`](Self::cancel).
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Option<TypingView>> {
        self.shared.latest.subscribe()
    }

    /// The most recently published view.
    #[must_use]
    pub fn current(&self) -> Option<TypingView> {
        self.shared.latest.borrow().clone()
    }

    /// Whether a session is live.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared.state.lock().active.is_some()
    }

    /// Start revealing `buffer` into message `target`.
    ///
    /// A session that is still live is skipped to its end first, so at most
    /// one session exists and no tick outlives its session. Must be called
    /// inside a Tokio runtime.
    pub fn start(&self, target: MessageId, buffer: SharedBuffer) {
        let session = TypingSession::new(target, buffer, self.shared.config.cursor.clone());
        let tick = CancellationToken::new();

        let generation = {
            let mut state = self.shared.state.lock();
            if let Some(mut previous) = state.active.take() {
                previous.stop();
                let view = previous.session.skip();
                debug!(message_id = %view.message_id, "Committed previous typing session");
                self.publish(view);
            }
            state.generation += 1;
            let generation = state.generation;
            let view = session.view();
            state.active = Some(ActiveSession {
                generation,
                session,
                tick: tick.clone(),
            });
            self.publish(view);
            generation
        };

        debug!(message_id = %target, generation, "Typing session started");
        self.spawn_ticker(generation, tick);
    }

    /// Reveal everything now and stop the tick. Idempotent.
    ///
    /// If the stream is still open the session stays live and later growth
    /// is committed through [`notify`](Self::notify).
    pub fn skip(&self) -> Option<TypingView> {
        let mut state = self.shared.state.lock();
        let active = state.active.as_mut()?;
        if active.session.is_skipped() {
            return Some(active.session.view());
        }

        active.stop();
        let view = active.session.skip();
        debug!(message_id = %view.message_id, finished = view.is_terminal(), "Typing skipped");
        if view.is_terminal() {
            state.active = None;
        }
        self.publish(view.clone());
        Some(view)
    }

    /// Tell the renderer the buffer changed. Only needed after a skip, since
    /// the tick reads the buffer on its own otherwise.
    pub fn notify(&self) {
        let mut state = self.shared.state.lock();
        let Some(active) = state.active.as_mut() else {
            return;
        };
        if !active.session.is_skipped() {
            return;
        }
        let view = active.session.tick();
        if view.is_terminal() {
            state.active = None;
        }
        self.publish(view);
    }

    /// Withdraw the session for `target`, discarding its text.
    ///
    /// Returns `false` when no session for `target` is live.
    pub fn retract(&self, target: MessageId) -> bool {
        let mut state = self.shared.state.lock();
        match state.active.as_ref() {
            Some(active) if active.session.target() == target => {}
            _ => return false,
        }
        if let Some(active) = state.active.take() {
            active.stop();
        }
        debug!(message_id = %target, "Typing session retracted");
        self.publish(TypingView {
            message_id: target,
            content: String::new(),
            phase: TypingPhase::Retracted,
            revealed: 0,
            total: 0,
        });
        true
    }

    /// Drop any live session without committing it and clear the view.
    pub fn cancel(&self) {
        let mut state = self.shared.state.lock();
        if let Some(active) = state.active.take() {
            active.stop();
            debug!(message_id = %active.session.target(), "Typing session cancelled");
        }
        self.shared.latest.send_replace(None);
    }

    /// Wait until no session is live and return the last view.
    pub async fn finished(&self) -> Option<TypingView> {
        let mut views = self.watch();
        loop {
            if !self.is_active() {
                return self.current();
            }
            if views.changed().await.is_err() {
                return self.current();
            }
        }
    }

    fn publish(&self, view: TypingView) {
        let _ = self.shared.events.send(view.clone());
        self.shared.latest.send_replace(Some(view));
    }

    fn spawn_ticker(&self, generation: u64, token: CancellationToken) {
        let renderer = self.clone();
        let period = self.shared.config.tick();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if !renderer.advance(generation) {
                            break;
                        }
                    }
                }
            }
            trace!(generation, "Typing ticker stopped");
        });
    }

    /// One tick for session `generation`. Returns whether to keep ticking.
    fn advance(&self, generation: u64) -> bool {
        let mut state = self.shared.state.lock();
        let Some(active) = state.active.as_mut() else {
            return false;
        };
        if active.generation != generation {
            return false;
        }

        let view = active.session.tick();
        let finished = view.is_terminal();
        if finished {
            debug!(message_id = %view.message_id, total = view.total, "Typing session finalized");
            state.active = None;
        }
        self.publish(view);
        !finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    fn closed_buffer(text: &str) -> SharedBuffer {
        let buffer = SharedBuffer::default();
        buffer.append(text).unwrap();
        buffer.close();
        buffer
    }

    #[tokio::test(start_paused = true)]
    async fn test_renders_to_final_text() {
        let renderer = TypingRenderer::default();
        let started = Instant::now();

        renderer.start(MessageId(1), closed_buffer("Hello"));
        let view = renderer.finished().await.unwrap();

        assert_eq!(view.content, "Hello");
        assert_eq!(view.phase, TypingPhase::Final);
        assert!(started.elapsed() >= Duration::from_millis(250));
        assert!(!renderer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_streaming_growth_is_followed() {
        let renderer = TypingRenderer::default();
        let buffer = SharedBuffer::default();
        buffer.append("Hel").unwrap();
        renderer.start(MessageId(3), buffer.clone());

        sleep(Duration::from_millis(400)).await;
        let view = renderer.current().unwrap();
        assert_eq!(view.content, "Hel |");
        assert!(renderer.is_active());

        buffer.append("lo").unwrap();
        buffer.close();
        let view = renderer.finished().await.unwrap();
        assert_eq!(view.content, "Hello");
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_commits_immediately_and_is_idempotent() {
        let renderer = TypingRenderer::default();
        renderer.start(MessageId(1), closed_buffer("A long answer"));
        sleep(Duration::from_millis(60)).await;

        let first = renderer.skip().unwrap();
        assert_eq!(first.content, "A long answer");
        assert_eq!(first.phase, TypingPhase::Final);
        assert!(!renderer.is_active());

        assert_eq!(renderer.skip(), None);
        assert_eq!(renderer.current(), Some(first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_during_stream_then_notify() {
        let renderer = TypingRenderer::default();
        let buffer = SharedBuffer::default();
        buffer.append("Hel").unwrap();
        renderer.start(MessageId(1), buffer.clone());

        let view = renderer.skip().unwrap();
        assert_eq!(view.content, "Hel");
        assert!(renderer.is_active());

        buffer.append("lo").unwrap();
        renderer.notify();
        assert_eq!(renderer.current().unwrap().content, "Hello");

        buffer.close();
        renderer.notify();
        assert_eq!(renderer.current().unwrap().phase, TypingPhase::Final);
        assert!(!renderer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_start_commits_previous_session() {
        let renderer = TypingRenderer::default();
        let first = SharedBuffer::default();
        first.append("first answer").unwrap();

        renderer.start(MessageId(1), first.clone());
        sleep(Duration::from_millis(60)).await;
        renderer.start(MessageId(2), closed_buffer("second"));

        let view = renderer.current().unwrap();
        assert_eq!(view.message_id, MessageId(2));
        assert_eq!(view.content, " |");

        let view = renderer.finished().await.unwrap();
        assert_eq!(view.message_id, MessageId(2));
        assert_eq!(view.content, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscriber_sees_committed_view_before_next_session() {
        let renderer = TypingRenderer::default();
        let mut views = renderer.subscribe();

        renderer.start(MessageId(2), closed_buffer("a fairly long first answer"));
        sleep(Duration::from_millis(60)).await;
        renderer.start(MessageId(4), closed_buffer("second"));
        renderer.finished().await.unwrap();

        let mut seen = Vec::new();
        while let Ok(view) = views.try_recv() {
            seen.push((view.message_id, view.phase, view.content));
        }

        let committed = seen
            .iter()
            .position(|(id, phase, _)| *id == MessageId(2) && *phase == TypingPhase::Final)
            .unwrap();
        let next = seen.iter().position(|(id, _, _)| *id == MessageId(4)).unwrap();
        assert!(committed < next);
        assert_eq!(seen[committed].2, "a fairly long first answer");
        assert_eq!(
            seen.last().unwrap(),
            &(MessageId(4), TypingPhase::Final, "second".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retract_discards_text() {
        let renderer = TypingRenderer::default();
        let buffer = SharedBuffer::default();
        buffer.append("partial").unwrap();
        renderer.start(MessageId(5), buffer);
        sleep(Duration::from_millis(120)).await;

        assert!(!renderer.retract(MessageId(6)));
        assert!(renderer.retract(MessageId(5)));

        let view = renderer.current().unwrap();
        assert_eq!(view.phase, TypingPhase::Retracted);
        assert_eq!(view.content, "");
        assert!(!renderer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_clears_view() {
        let renderer = TypingRenderer::default();
        renderer.start(MessageId(1), closed_buffer("bye"));
        renderer.cancel();

        assert!(!renderer.is_active());
        assert_eq!(renderer.current(), None);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(renderer.current(), None);
    }
}
