//! Typing configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default reveal tick in milliseconds.
pub const DEFAULT_TICK_MS: u64 = 50;

/// Default cursor marker appended while typing.
pub const DEFAULT_CURSOR: &str = " |";

/// Pacing and appearance of the typing effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingConfig {
    /// Interval between reveal ticks, in milliseconds.
    pub tick_ms: u64,
    /// Marker shown after the revealed prefix.
    pub cursor: String,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            cursor: DEFAULT_CURSOR.to_string(),
        }
    }
}

impl TypingConfig {
    /// Create the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tick interval.
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick_ms = (tick.as_millis() as u64).max(1);
        self
    }

    /// Set the cursor marker.
    #[must_use]
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = cursor.into();
        self
    }

    /// Tick interval.
    #[must_use]
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

/// Clusters revealed per tick for the given remaining count.
///
/// Longer backlogs reveal faster so long answers finish in bounded time.
#[must_use]
pub fn step_for(remaining: usize) -> usize {
    match remaining {
        r if r > 400 => 4,
        r if r > 200 => 3,
        r if r > 80 => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1000, 4)]
    #[case(401, 4)]
    #[case(400, 3)]
    #[case(201, 3)]
    #[case(200, 2)]
    #[case(81, 2)]
    #[case(80, 1)]
    #[case(1, 1)]
    #[case(0, 1)]
    fn test_step_for(#[case] remaining: usize, #[case] step: usize) {
        assert_eq!(step_for(remaining), step);
    }

    #[test]
    fn test_config_builder() {
        let config = TypingConfig::new()
            .with_tick(Duration::from_millis(20))
            .with_cursor("▌");
        assert_eq!(config.tick(), Duration::from_millis(20));
        assert_eq!(config.cursor, "▌");
        assert_eq!(TypingConfig::default().tick(), Duration::from_millis(50));
    }
}
