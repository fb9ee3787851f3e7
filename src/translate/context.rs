//! Bounded translation context.
//!
//! Refine passes carry recent (source, translation) turns as conversational
//! history. Only completed refines append here; drafts never touch it.

use crate::defaults;

/// One completed (source, translation) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextTurn {
    pub source: String,
    pub translation: String,
}

/// FIFO window over the most recent context turns.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    turns: Vec<ContextTurn>,
    max_turns: usize,
}

impl ContextWindow {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns,
        }
    }

    /// Appends a turn, evicting the oldest beyond the retention limit.
    pub fn push(&mut self, source: String, translation: String) {
        self.turns.push(ContextTurn {
            source,
            translation,
        });
        while self.turns.len() > self.max_turns {
            self.turns.remove(0);
        }
    }

    /// Retained turns, oldest first.
    pub fn turns(&self) -> &[ContextTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drops all retained turns.
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self::new(defaults::MAX_CONTEXT_TURNS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_starts_empty() {
        let window = ContextWindow::new(3);
        assert!(window.is_empty());
        assert_eq!(window.len(), 0);
    }

    #[test]
    fn test_push_retains_order() {
        let mut window = ContextWindow::new(3);
        window.push("one".into(), "un".into());
        window.push("two".into(), "deux".into());

        assert_eq!(window.turns()[0].source, "one");
        assert_eq!(window.turns()[1].translation, "deux");
    }

    #[test]
    fn test_eviction_drops_oldest_first() {
        let mut window = ContextWindow::new(2);
        window.push("one".into(), "un".into());
        window.push("two".into(), "deux".into());
        window.push("three".into(), "trois".into());

        assert_eq!(window.len(), 2);
        assert_eq!(window.turns()[0].source, "two");
        assert_eq!(window.turns()[1].source, "three");
    }

    #[test]
    fn test_never_exceeds_limit() {
        let mut window = ContextWindow::new(3);
        for i in 0..20 {
            window.push(format!("s{}", i), format!("t{}", i));
            assert!(window.len() <= 3);
        }
        assert_eq!(window.turns()[0].source, "s17");
    }

    #[test]
    fn test_clear() {
        let mut window = ContextWindow::new(3);
        window.push("one".into(), "un".into());
        window.clear();
        assert!(window.is_empty());
    }
}
