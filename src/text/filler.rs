//! Hesitation filtering.
//!
//! Spans made only of filler words carry no translatable content and would
//! waste a draft job on text likely to be revised away.

/// Hesitations plus the bare articles.
const FILLER_WORDS: &[&str] = &[
    "the", "okay", "um", "uh", "ah", "oh", "hmm", "hm", "a", "an",
];

/// True when the text contains no meaningful words.
pub fn is_filler(text: &str) -> bool {
    let cleaned = text.trim().trim_end_matches('.');
    cleaned
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .all(|w| FILLER_WORDS.contains(&w.as_str()))
}
