//! Position tracking for externally-supplied transcripts.
//!
//! When the caller runs its own recognition, transcripts arrive as revised
//! full strings rather than re-recognized snapshots, so stability is
//! tracked by character offset instead of word diffing. Interim text may
//! rewrite capitalization or punctuation before the committed offset; only
//! content past the offset is ever released.

use crate::defaults;
use crate::text::{filler::is_filler, has_clause_punctuation};
use std::time::{Duration, Instant};

/// Trait for time operations, allowing mock time in tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Real system clock using `std::time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Configuration for external-transcript release triggers.
#[derive(Debug, Clone, Copy)]
pub struct TextPositionConfig {
    /// Word count that releases interim content on its own.
    pub min_words: usize,
    /// Elapsed time after which interim content is released anyway.
    pub release_timeout: Duration,
    /// Minimum word count for the timeout-based release.
    pub timeout_min_words: usize,
}

impl Default for TextPositionConfig {
    fn default() -> Self {
        Self {
            min_words: defaults::STABLE_MIN_WORDS,
            release_timeout: Duration::from_secs(defaults::TEXT_RELEASE_TIMEOUT_SECS),
            timeout_min_words: defaults::TEXT_RELEASE_TIMEOUT_MIN_WORDS,
        }
    }
}

/// Tracks the committed character offset of an external transcript.
pub struct TextPositionTracker<C: Clock = SystemClock> {
    config: TextPositionConfig,
    committed: usize,
    last_release: Instant,
    clock: C,
}

impl TextPositionTracker<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(TextPositionConfig::default(), SystemClock)
    }
}

impl Default for TextPositionTracker<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> TextPositionTracker<C> {
    pub fn with_clock(config: TextPositionConfig, clock: C) -> Self {
        let now = clock.now();
        Self {
            config,
            committed: 0,
            last_release: now,
            clock,
        }
    }

    /// Committed character offset.
    pub fn committed(&self) -> usize {
        self.committed
    }

    /// Feeds the latest transcript text; returns content to release for
    /// translation, if any.
    ///
    /// Final text always releases. Interim text releases on clause
    /// punctuation, on reaching the word threshold, or via the timeout
    /// backstop so slow speech still streams.
    pub fn update(&mut self, text: &str, is_final: bool) -> Option<String> {
        let text = text.trim();
        if text.is_empty() || is_filler(text) {
            return None;
        }

        // Shorter text than the committed offset means the source restarted
        // recognition; start over from the beginning.
        if text.len() < self.committed {
            self.committed = 0;
        }

        let new_content = match text.get(self.committed..) {
            Some(tail) => tail.trim(),
            // Offset landed inside a multi-byte character after a revision;
            // treat like a restart.
            None => {
                self.committed = 0;
                text
            }
        };
        if new_content.is_empty() || is_filler(new_content) {
            return None;
        }

        let now = self.clock.now();
        let released = if is_final {
            true
        } else {
            let word_count = new_content.split_whitespace().count();
            let timed_out = now.duration_since(self.last_release) >= self.config.release_timeout
                && word_count >= self.config.timeout_min_words;
            has_clause_punctuation(new_content)
                || word_count >= self.config.min_words
                || timed_out
        };

        if released {
            self.committed = text.len();
            self.last_release = now;
            Some(new_content.to_string())
        } else {
            None
        }
    }

    /// Clears the committed offset.
    pub fn reset(&mut self) {
        self.committed = 0;
        self.last_release = self.clock.now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Clock advanced manually by tests.
    #[derive(Clone)]
    struct ManualClock {
        now: Arc<Mutex<Instant>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Arc::new(Mutex::new(Instant::now())),
            }
        }

        fn advance(&self, duration: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += duration;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    fn tracker(clock: ManualClock) -> TextPositionTracker<ManualClock> {
        TextPositionTracker::with_clock(TextPositionConfig::default(), clock)
    }

    #[test]
    fn test_final_text_always_releases() {
        let mut tracker = tracker(ManualClock::new());
        let released = tracker.update("hi", true).unwrap();
        assert_eq!(released, "hi");
        assert_eq!(tracker.committed(), 2);
    }

    #[test]
    fn test_interim_below_thresholds_is_held() {
        let mut tracker = tracker(ManualClock::new());
        assert!(tracker.update("hello there", false).is_none());
        assert_eq!(tracker.committed(), 0);
    }

    #[test]
    fn test_interim_releases_on_punctuation() {
        let mut tracker = tracker(ManualClock::new());
        let released = tracker.update("hello there, friend", false).unwrap();
        assert_eq!(released, "hello there, friend");
    }

    #[test]
    fn test_interim_releases_on_word_count() {
        let mut tracker = tracker(ManualClock::new());
        let released = tracker.update("one two three four five", false).unwrap();
        assert_eq!(released, "one two three four five");
    }

    #[test]
    fn test_timeout_backstop_releases_slow_speech() {
        let clock = ManualClock::new();
        let mut tracker = tracker(clock.clone());

        assert!(tracker.update("hello there", false).is_none());
        clock.advance(Duration::from_secs(3));
        let released = tracker.update("hello there", false).unwrap();
        assert_eq!(released, "hello there");
    }

    #[test]
    fn test_timeout_needs_minimum_words() {
        let clock = ManualClock::new();
        let mut tracker = tracker(clock.clone());

        clock.advance(Duration::from_secs(3));
        assert!(tracker.update("hello", false).is_none());
    }

    #[test]
    fn test_only_new_content_released() {
        let mut tracker = tracker(ManualClock::new());
        tracker.update("hello there, friend", true).unwrap();

        let released = tracker
            .update("hello there, friend how are you today", true)
            .unwrap();
        assert_eq!(released, "how are you today");
    }

    #[test]
    fn test_shorter_text_resets_offset() {
        let mut tracker = tracker(ManualClock::new());
        tracker.update("a long first utterance here.", true).unwrap();
        assert!(tracker.committed() > 0);

        // The source restarted recognition with fresh, shorter text
        let released = tracker.update("new words now.", true).unwrap();
        assert_eq!(released, "new words now.");
        assert_eq!(tracker.committed(), "new words now.".len());
    }

    #[test]
    fn test_filler_text_ignored() {
        let mut tracker = tracker(ManualClock::new());
        assert!(tracker.update("um uh", true).is_none());
        assert_eq!(tracker.committed(), 0);
    }

    #[test]
    fn test_filler_tail_ignored() {
        let mut tracker = tracker(ManualClock::new());
        tracker.update("something meaningful.", true).unwrap();
        assert!(tracker.update("something meaningful. um", true).is_none());
    }

    #[test]
    fn test_reset() {
        let mut tracker = tracker(ManualClock::new());
        tracker.update("hello there, friend", true).unwrap();
        tracker.reset();
        assert_eq!(tracker.committed(), 0);
    }
}
