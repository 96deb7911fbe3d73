//! The typing session state machine.

use crate::config::step_for;
use serde::{Deserialize, Serialize};
use shelfchat_core::MessageId;
use shelfchat_streaming::SharedBuffer;

/// Lifecycle of a rendered assistant message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypingPhase {
    /// Text is still being revealed or streamed.
    Typing,
    /// Final content; the session is over.
    Final,
    /// The attempt failed and its text was withdrawn.
    Retracted,
}

/// What the UI should display for the message being typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingView {
    /// Target message.
    pub message_id: MessageId,
    /// Display content, including the cursor while typing.
    pub content: String,
    /// Lifecycle phase.
    pub phase: TypingPhase,
    /// Clusters revealed.
    pub revealed: usize,
    /// Clusters available.
    pub total: usize,
}

impl TypingView {
    /// Whether the session that produced this view is over.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.phase != TypingPhase::Typing
    }
}

/// Progressive reveal of one assistant message.
///
/// Reads the live buffer on every tick, so text streamed in after the session
/// started is picked up without restarting it. `revealed` never decreases.
#[derive(Debug)]
pub struct TypingSession {
    target: MessageId,
    buffer: SharedBuffer,
    cursor: String,
    revealed: usize,
    skipped: bool,
    finished: bool,
}

impl TypingSession {
    /// Start a session for `target` reading from `buffer`.
    pub fn new(target: MessageId, buffer: SharedBuffer, cursor: impl Into<String>) -> Self {
        Self {
            target,
            buffer,
            cursor: cursor.into(),
            revealed: 0,
            skipped: false,
            finished: false,
        }
    }

    /// Target message.
    #[must_use]
    pub fn target(&self) -> MessageId {
        self.target
    }

    /// Buffer being revealed.
    #[must_use]
    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }

    /// Clusters revealed so far.
    #[must_use]
    pub fn revealed(&self) -> usize {
        self.revealed
    }

    /// Whether `skip` has been called.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    /// Whether the session has finalized.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Advance one reveal step and return the resulting view.
    pub fn tick(&mut self) -> TypingView {
        if !self.finished {
            let total = self.buffer.grapheme_count();
            if self.skipped {
                self.revealed = total;
            } else if self.revealed < total {
                let remaining = total - self.revealed;
                self.revealed += step_for(remaining).min(remaining);
            }
        }
        self.settle()
    }

    /// Reveal everything available immediately. Repeated calls are no-ops.
    pub fn skip(&mut self) -> TypingView {
        if !self.skipped && !self.finished {
            self.skipped = true;
            self.revealed = self.revealed.max(self.buffer.grapheme_count());
        }
        self.settle()
    }

    /// Current view without advancing.
    #[must_use]
    pub fn view(&self) -> TypingView {
        let buffer = self.buffer.read();
        let total = buffer.grapheme_count();

        let (content, phase) = if self.finished {
            (buffer.text().to_string(), TypingPhase::Final)
        } else if self.skipped {
            (buffer.text().to_string(), TypingPhase::Typing)
        } else {
            let mut content = buffer.prefix(self.revealed).to_string();
            content.push_str(&self.cursor);
            (content, TypingPhase::Typing)
        };

        TypingView {
            message_id: self.target,
            content,
            phase,
            revealed: self.revealed.min(total),
            total,
        }
    }

    fn settle(&mut self) -> TypingView {
        if !self.finished {
            let buffer = self.buffer.read();
            if buffer.is_closed() && self.revealed >= buffer.grapheme_count() {
                self.finished = true;
            }
        }
        self.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shelfchat_streaming::DeltaBuffer;

    fn session(text: &str, closed: bool) -> (TypingSession, SharedBuffer) {
        let buffer = SharedBuffer::default();
        buffer.append(text).unwrap();
        if closed {
            buffer.close();
        }
        (TypingSession::new(MessageId(2), buffer.clone(), " |"), buffer)
    }

    #[test]
    fn test_reveals_with_cursor_then_finalizes() {
        let (mut session, _) = session("Hello", true);

        let view = session.tick();
        assert_eq!(view.content, "H |");
        assert_eq!(view.phase, TypingPhase::Typing);

        for _ in 0..3 {
            session.tick();
        }
        let view = session.tick();
        assert_eq!(view.content, "Hello");
        assert_eq!(view.phase, TypingPhase::Final);
        assert!(session.is_finished());
    }

    #[test]
    fn test_picks_up_growth_from_live_buffer() {
        let (mut session, buffer) = session("Hel", false);

        for _ in 0..3 {
            session.tick();
        }
        let view = session.tick();
        assert_eq!(view.content, "Hel |");
        assert_eq!(view.phase, TypingPhase::Typing);

        buffer.append("lo").unwrap();
        buffer.close();

        assert_eq!(session.tick().content, "Hell |");
        let view = session.tick();
        assert_eq!(view.content, "Hello");
        assert_eq!(view.phase, TypingPhase::Final);
    }

    #[test]
    fn test_adaptive_step_on_long_backlog() {
        let (mut session, _) = session(&"a".repeat(500), true);
        assert_eq!(session.tick().revealed, 4);
        assert_eq!(session.tick().revealed, 8);
    }

    #[test]
    fn test_revealed_is_non_decreasing() {
        let (mut session, buffer) = session("ab", false);
        let mut last = 0;
        for i in 0..20 {
            if i % 3 == 0 {
                buffer.append("xyz").unwrap();
            }
            let view = session.tick();
            assert!(view.revealed >= last);
            assert!(view.revealed <= view.total);
            last = view.revealed;
        }
    }

    #[test]
    fn test_never_splits_graphemes() {
        let (mut session, _) = session("e\u{301}👍🏽", true);
        assert_eq!(session.tick().content, "e\u{301} |");
        assert_eq!(session.tick().content, "e\u{301}👍🏽");
    }

    #[test]
    fn test_skip_is_idempotent() {
        let (mut session, _) = session("Hello there", true);
        session.tick();

        let first = session.skip();
        let second = session.skip();

        assert_eq!(first, second);
        assert_eq!(first.content, "Hello there");
        assert_eq!(first.phase, TypingPhase::Final);
    }

    #[test]
    fn test_skip_while_streaming_commits_growth() {
        let (mut session, buffer) = session("Hel", false);

        let view = session.skip();
        assert_eq!(view.content, "Hel");
        assert_eq!(view.phase, TypingPhase::Typing);

        buffer.append("lo").unwrap();
        assert_eq!(session.tick().content, "Hello");

        buffer.close();
        assert_eq!(session.tick().phase, TypingPhase::Final);
    }

    #[test]
    fn test_empty_closed_buffer_finalizes_immediately() {
        let buffer = SharedBuffer::new(DeltaBuffer::completed("", shelfchat_streaming::default_segmenter()));
        let mut session = TypingSession::new(MessageId(1), buffer, " |");
        let view = session.tick();
        assert_eq!(view.phase, TypingPhase::Final);
        assert_eq!(view.content, "");
    }
}
