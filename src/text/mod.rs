//! Transcript stabilization.
//!
//! Recognition output changes from one pass to the next; these trackers
//! decide which part of a transcript is safe to hand to translation:
//! - [`StablePrefixTracker`] diffs consecutive local recognition snapshots
//! - [`TextPositionTracker`] tracks externally-supplied transcripts by
//!   character offset
//! - [`filler`] suppresses spans made only of hesitations

pub mod filler;
pub mod position;
pub mod stable;

pub use filler::is_filler;
pub use position::{Clock, SystemClock, TextPositionTracker};
pub use stable::{StablePrefixTracker, StableSpan};

/// True when the text contains sentence or clause punctuation.
pub(crate) fn has_clause_punctuation(text: &str) -> bool {
    text.chars()
        .any(|c| matches!(c, '.' | '!' | '?' | ',' | ';' | ':'))
}

/// True when the text ends a sentence.
pub(crate) fn has_terminal_punctuation(text: &str) -> bool {
    text.trim_end()
        .chars()
        .next_back()
        .is_some_and(|c| matches!(c, '.' | '!' | '?'))
}
