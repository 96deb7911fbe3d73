//! Token reconciliation.
//!
//! Providers mix two kinds of payloads: incremental tokens and cumulative
//! snapshots of the whole answer so far. [`extract`] classifies a parsed frame
//! by trying known shapes in a fixed order, and [`TokenReconciler`] turns the
//! classified text into deltas that never repeat text already emitted.

use serde_json::Value;
use tracing::debug;

/// Classification of a frame's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// A token to append.
    Incremental,
    /// The complete answer so far.
    Full,
}

/// Text extracted from a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// The text.
    pub text: String,
    /// How to treat it.
    pub kind: PayloadKind,
}

impl Extracted {
    fn incremental(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: PayloadKind::Incremental,
        }
    }

    fn full(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: PayloadKind::Full,
        }
    }
}

type Extractor = fn(&Value) -> Option<Extracted>;

/// Known payload shapes, in precedence order. Token shapes come first.
const EXTRACTORS: &[Extractor] = &[
    |v| str_at(v, "/choices/0/delta/content").map(Extracted::incremental),
    |v| str_at(v, "/text").map(Extracted::incremental),
    |v| str_at(v, "/token").map(Extracted::incremental),
    |v| str_at(v, "/delta").map(Extracted::incremental),
    |v| str_at(v, "/delta/text").map(Extracted::incremental),
    |v| joined_parts(v.pointer("/delta/content")).map(Extracted::incremental),
    |v| str_at(v, "/response/text").map(Extracted::full),
    |v| joined_parts(v.pointer("/message/content")).map(Extracted::full),
    |v| str_at(v, "/choices/0/message/content").map(Extracted::full),
    |v| joined_parts(v.get("content")).map(Extracted::full),
];

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

fn joined_parts(parts: Option<&Value>) -> Option<String> {
    let parts = parts?.as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    (!text.is_empty()).then_some(text)
}

/// Extract text from a parsed frame.
///
/// Returns `None` for frames without a recognised text shape (usage reports,
/// role announcements and the like).
#[must_use]
pub fn extract(frame: &Value) -> Option<Extracted> {
    if !frame.is_object() {
        return None;
    }
    EXTRACTORS.iter().find_map(|extractor| extractor(frame))
}

/// Length in bytes of the longest common prefix of `a` and `b`, always on a
/// `char` boundary of both.
#[must_use]
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .map(|(c, _)| c.len_utf8())
        .sum()
}

/// Per-attempt reconciliation state.
///
/// The aggregate is always the concatenation of every delta returned so far.
#[derive(Debug, Default, Clone)]
pub struct TokenReconciler {
    aggregate: String,
    incremental_seen: bool,
}

impl TokenReconciler {
    /// Create a reconciler for a new attempt.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Text emitted so far.
    #[must_use]
    pub fn aggregate(&self) -> &str {
        &self.aggregate
    }

    /// Whether any incremental token has been seen.
    #[must_use]
    pub fn incremental_seen(&self) -> bool {
        self.incremental_seen
    }

    /// Reconcile one frame and return the delta to append (possibly empty).
    pub fn reconcile(&mut self, frame: &Value) -> String {
        match extract(frame) {
            Some(extracted) => self.apply(extracted),
            None => String::new(),
        }
    }

    /// Reconcile already extracted text.
    pub fn apply(&mut self, extracted: Extracted) -> String {
        let Extracted { text, kind } = extracted;
        if text.is_empty() {
            return String::new();
        }

        let delta = match kind {
            PayloadKind::Incremental => {
                self.incremental_seen = true;
                text
            }
            PayloadKind::Full if self.aggregate.is_empty() => text,
            PayloadKind::Full => {
                let shared = common_prefix_len(&self.aggregate, &text);
                if shared < self.aggregate.len() {
                    debug!(
                        emitted = self.aggregate.len(),
                        shared, "Snapshot diverges from emitted text"
                    );
                }
                text[shared..].to_string()
            }
        };

        self.aggregate.push_str(&delta);
        delta
    }
}
