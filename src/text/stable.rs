//! Stable-prefix tracking for local recognition.
//!
//! Consecutive recognition passes over a growing buffer agree on a leading
//! run of words well before the tail settles. Words in that agreed prefix
//! beyond the already-committed boundary are released for translation; the
//! boundary only moves forward within an utterance.

use crate::defaults;
use crate::text::{filler::is_filler, has_clause_punctuation};

/// A newly stabilized span of transcript words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StableSpan {
    /// The released words, space joined.
    pub text: String,
    /// Number of words in the span.
    pub word_count: usize,
}

/// Tracks the committed boundary across consecutive transcript snapshots.
#[derive(Debug)]
pub struct StablePrefixTracker {
    previous: Vec<String>,
    committed: usize,
    min_words: usize,
}

impl StablePrefixTracker {
    pub fn new() -> Self {
        Self::with_min_words(defaults::STABLE_MIN_WORDS)
    }

    pub fn with_min_words(min_words: usize) -> Self {
        Self {
            previous: Vec::new(),
            committed: 0,
            min_words,
        }
    }

    /// Word index up to which the transcript has been released.
    pub fn committed(&self) -> usize {
        self.committed
    }

    /// Words of the latest snapshot beyond the committed boundary.
    pub fn uncommitted_tail<'a>(&self, words: &'a [&'a str]) -> &'a [&'a str] {
        if self.committed >= words.len() {
            &[]
        } else {
            &words[self.committed..]
        }
    }

    /// Feeds the next transcript snapshot; returns a span when newly stable
    /// words are worth releasing.
    ///
    /// A span is released once it holds at least `min_words` new words or
    /// contains clause punctuation. Filler-only spans are suppressed without
    /// advancing the boundary.
    pub fn update(&mut self, current: &[&str]) -> Option<StableSpan> {
        if current.is_empty() {
            self.previous.clear();
            return None;
        }

        // A snapshot shorter than the committed boundary means recognition
        // restarted; the old boundary no longer maps into this transcript.
        if current.len() < self.committed {
            self.committed = 0;
        }

        let stable_len = self.common_prefix_len(current);
        self.previous = current.iter().map(|w| w.to_string()).collect();

        if stable_len <= self.committed {
            return None;
        }

        let span_words = &current[self.committed..stable_len];
        let text = span_words.join(" ");
        if is_filler(&text) {
            return None;
        }

        let word_count = span_words.len();
        if word_count >= self.min_words || has_clause_punctuation(&text) {
            self.committed = stable_len;
            Some(StableSpan { text, word_count })
        } else {
            None
        }
    }

    /// Clears the snapshot and boundary, starting a fresh utterance.
    pub fn reset(&mut self) {
        self.previous.clear();
        self.committed = 0;
    }

    fn common_prefix_len(&self, current: &[&str]) -> usize {
        self.previous
            .iter()
            .zip(current.iter())
            .take_while(|(prev, curr)| prev.eq_ignore_ascii_case(curr))
            .count()
    }
}

impl Default for StablePrefixTracker {
    fn default() -> Self {
        Self::new()
    }
}
