//! Splitting reply text into sentence fragments
//!
//! The generator returns one short reply; the pipeline publishes it to the
//! stream channel sentence by sentence so synthesis and delivery can start
//! before the whole reply is spoken for.

/// Split `text` into sentence fragments in order
///
/// Splits after runs of sentence-ending punctuation (`.`, `!`, `?`)
/// followed by whitespace, keeping the punctuation with its sentence.
/// Newlines also end a fragment. Empty fragments are never produced.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            push_fragment(&mut fragments, &mut current);
            continue;
        }

        current.push(c);

        if matches!(c, '.' | '!' | '?') {
            // Consume the rest of a punctuation run ("...", "?!")
            while let Some(&next) = chars.peek() {
                if matches!(next, '.' | '!' | '?') {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            // Sentence ends only when followed by whitespace or end of text
            match chars.peek() {
                None => push_fragment(&mut fragments, &mut current),
                Some(next) if next.is_whitespace() => {
                    push_fragment(&mut fragments, &mut current);
                }
                Some(_) => {}
            }
        }
    }

    push_fragment(&mut fragments, &mut current);
    fragments
}

fn push_fragment(fragments: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        fragments.push(trimmed.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_sentences() {
        assert_eq!(split_sentences("A. B. C."), vec!["A.", "B.", "C."]);
    }

    #[test]
    fn keeps_punctuation_runs_together() {
        assert_eq!(
            split_sentences("Hmm... that tickles! Really?"),
            vec!["Hmm...", "that tickles!", "Really?"]
        );
    }

    #[test]
    fn decimal_points_do_not_split() {
        assert_eq!(
            split_sentences("Moisture is at 42.5 percent today."),
            vec!["Moisture is at 42.5 percent today."]
        );
    }

    #[test]
    fn trailing_text_without_punctuation_is_kept() {
        assert_eq!(
            split_sentences("I am basil. ask me anything"),
            vec!["I am basil.", "ask me anything"]
        );
    }

    #[test]
    fn newlines_split_and_empties_are_dropped() {
        assert_eq!(
            split_sentences("First line\n\nSecond line.\n"),
            vec!["First line", "Second line."]
        );
        assert!(split_sentences("   \n ").is_empty());
    }
}
