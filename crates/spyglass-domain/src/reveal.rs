/// Result of one reveal tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevealProgress {
    /// The visible text grew this tick.
    pub changed: bool,
    /// The reveal reached the full source text this tick. Fires exactly once
    /// per source text.
    pub just_completed: bool,
}

/// Word-chunked progressive reveal of one displayed field.
///
/// The caller invokes [`advance`](Self::advance) once per tick at whatever
/// interval it likes; this type holds no timer. The revealed text is always a
/// word-aligned prefix of the source with the original spacing preserved.
/// Whenever the source text changes, the reveal restarts from empty; there is
/// no diffing between old and new text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevealState {
    source: String,
    revealed: String,
    cursor: usize,
    streaming: bool,
    completed: bool,
}

impl RevealState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently visible prefix.
    #[must_use]
    pub fn revealed(&self) -> &str {
        &self.revealed
    }

    /// True while the visible text still lags the source.
    #[must_use]
    pub fn is_revealing(&self) -> bool {
        !self.completed && self.revealed != self.source
    }

    /// The streaming flag from the most recent tick.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Advance one tick toward `source`.
    ///
    /// With `streaming` false the whole source is revealed immediately;
    /// otherwise the cursor moves one character unit and the visible prefix
    /// grows in whole-word steps.
    pub fn advance(&mut self, source: &str, streaming: bool) -> RevealProgress {
        if self.source != source {
            self.source = source.to_string();
            self.revealed.clear();
            self.cursor = 0;
            self.completed = false;
        }
        self.streaming = streaming;

        if self.completed {
            return RevealProgress::default();
        }

        if source.is_empty() || !streaming {
            let changed = self.revealed != self.source;
            self.revealed = self.source.clone();
            self.cursor = self.source.chars().count();
            self.completed = true;
            return RevealProgress {
                changed,
                just_completed: true,
            };
        }

        let char_count = self.source.chars().count();
        let word_count = self.source.split_whitespace().count();
        if word_count == 0 {
            // Whitespace-only source; nothing word-aligned to animate.
            self.revealed = self.source.clone();
            self.completed = true;
            return RevealProgress {
                changed: true,
                just_completed: true,
            };
        }

        self.cursor = (self.cursor + 1).min(char_count);
        let visible_words = (self.cursor * word_count / char_count) + 1;
        if visible_words >= word_count {
            let changed = self.revealed != self.source;
            self.revealed = self.source.clone();
            self.completed = true;
            return RevealProgress {
                changed,
                just_completed: true,
            };
        }

        let prefix = word_prefix(&self.source, visible_words);
        let changed = self.revealed != prefix;
        if changed {
            self.revealed = prefix.to_string();
        }
        RevealProgress {
            changed,
            just_completed: false,
        }
    }
}

/// Prefix of `source` ending after its `words`-th word, spacing intact.
fn word_prefix(source: &str, words: usize) -> &str {
    if words == 0 {
        return "";
    }
    let mut seen = 0usize;
    let mut in_word = false;
    for (index, ch) in source.char_indices() {
        if ch.is_whitespace() {
            if in_word && seen == words {
                return &source[..index];
            }
            in_word = false;
        } else if !in_word {
            in_word = true;
            seen += 1;
        }
    }
    source
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to_completion(reveal: &mut RevealState, source: &str, max_ticks: usize) -> usize {
        for tick in 1..=max_ticks {
            if reveal.advance(source, true).just_completed {
                return tick;
            }
        }
        panic!("reveal did not complete within {max_ticks} ticks");
    }

    #[test]
    fn word_prefix_preserves_original_spacing() {
        assert_eq!(word_prefix("hello  world foo", 1), "hello");
        assert_eq!(word_prefix("hello  world foo", 2), "hello  world");
        assert_eq!(word_prefix("hello  world foo", 3), "hello  world foo");
        assert_eq!(word_prefix("hello world", 5), "hello world");
        assert_eq!(word_prefix("hello", 0), "");
        assert_eq!(word_prefix("  padded start", 1), "  padded");
    }

    #[test]
    fn streaming_reveal_grows_word_by_word_and_completes_once() {
        let source = "hello world foo";
        let mut reveal = RevealState::new();
        let mut previous_words = 0usize;
        let mut completions = 0usize;

        for _ in 0..source.len() + 5 {
            let progress = reveal.advance(source, true);
            let words = reveal.revealed().split_whitespace().count();
            assert!(words >= previous_words, "reveal went backwards");
            assert!(
                source.starts_with(reveal.revealed()),
                "revealed text is not a prefix: {:?}",
                reveal.revealed()
            );
            previous_words = words;
            if progress.just_completed {
                completions += 1;
            }
        }

        assert_eq!(reveal.revealed(), source);
        assert_eq!(completions, 1, "completion must fire exactly once");
        assert!(!reveal.is_revealing());
    }

    #[test]
    fn non_streaming_reveals_fully_on_next_tick() {
        let source = "hello world foo";
        let mut reveal = RevealState::new();
        let progress = reveal.advance(source, false);
        assert_eq!(reveal.revealed(), source);
        assert!(progress.just_completed);
        assert!(progress.changed);
        assert!(!reveal.is_streaming());

        // Re-advancing the same settled text is a no-op.
        let progress = reveal.advance(source, false);
        assert_eq!(progress, RevealProgress::default());
    }

    #[test]
    fn source_change_mid_reveal_restarts_from_empty() {
        let mut reveal = RevealState::new();
        let old = "the quick brown fox jumps over the lazy dog";
        for _ in 0..10 {
            reveal.advance(old, true);
        }
        assert!(!reveal.revealed().is_empty());
        assert!(reveal.is_revealing());

        let new = "completely different text";
        let progress = reveal.advance(new, true);
        assert!(
            new.starts_with(reveal.revealed()),
            "mixed prefix after source change: {:?}",
            reveal.revealed()
        );
        assert!(!old.starts_with(reveal.revealed()) || reveal.revealed().is_empty());
        assert!(!progress.just_completed);

        run_to_completion(&mut reveal, new, new.len() + 5);
        assert_eq!(reveal.revealed(), new);
    }

    #[test]
    fn empty_source_completes_immediately() {
        let mut reveal = RevealState::new();
        let progress = reveal.advance("", true);
        assert!(progress.just_completed);
        assert_eq!(reveal.revealed(), "");
        assert!(!reveal.is_revealing());

        let progress = reveal.advance("", true);
        assert!(!progress.just_completed);
    }

    #[test]
    fn single_word_completes_on_first_tick() {
        let mut reveal = RevealState::new();
        let progress = reveal.advance("hello", true);
        assert!(progress.just_completed);
        assert_eq!(reveal.revealed(), "hello");
    }

    #[test]
    fn multiline_source_reveals_across_line_breaks() {
        let source = "first thought\nsecond thought\nthird";
        let mut reveal = RevealState::new();
        let ticks = run_to_completion(&mut reveal, source, source.len() + 5);
        assert!(ticks > 1, "multi-word source should animate over ticks");
        assert_eq!(reveal.revealed(), source);
    }

    #[test]
    fn independent_instances_share_no_state() {
        let mut action = RevealState::new();
        let mut progress = RevealState::new();
        action.advance("clicking the button now", true);
        let settled = progress.advance("done", false);
        assert!(settled.just_completed);
        assert!(action.is_revealing());
    }
}
