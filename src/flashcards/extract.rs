//! Card extraction from raw model output.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Closing delimiter of a card, and the tail of every start marker.
const DELIMITER: &str = "===";

fn start_marker() -> &'static Regex {
    static START: OnceLock<Regex> = OnceLock::new();
    START.get_or_init(|| Regex::new(r"=== CARD ([0-9]+) ===").expect("valid start marker regex"))
}

/// One delimited card, markers included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    text: String,
    /// Byte range of the body inside `text`.
    body_start: usize,
    body_end: usize,
}

impl Card {
    /// Full span from `=== CARD n ===` through the closing `===`.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Content between the start marker and the closing delimiter, trimmed.
    pub fn body(&self) -> &str {
        self.text[self.body_start..self.body_end].trim()
    }

    /// Number written in the start marker. Not validated against position.
    pub fn number(&self) -> Option<u32> {
        start_marker()
            .captures(&self.text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Extract every card from `text`, left to right.
///
/// Outside a card the scanner looks for the next `=== CARD <n> ===` marker;
/// inside, for the next `===`. Cards do not overlap. A card with no closing
/// delimiter ends the scan and is dropped. Never fails.
pub fn extract_cards(text: &str) -> Vec<Card> {
    let mut cards = Vec::new();
    let mut pos = 0;

    while let Some(start) = start_marker().find_at(text, pos) {
        let body_from = start.end();
        let Some(offset) = text[body_from..].find(DELIMITER) else {
            break;
        };
        let close = body_from + offset;
        let end = close + DELIMITER.len();

        cards.push(Card {
            text: text[start.start()..end].to_string(),
            body_start: body_from - start.start(),
            body_end: close - start.start(),
        });
        pos = end;
    }

    cards
}

/// Text after the last `===` in `text`, trimmed. Empty when there is none.
pub fn extract_trailing_message(text: &str) -> String {
    match text.rfind(DELIMITER) {
        Some(idx) => text[idx + DELIMITER.len()..].trim().to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_markers() {
        assert!(extract_cards("no markers here").is_empty());
        assert!(extract_cards("").is_empty());
    }

    #[test]
    fn test_two_inline_cards() {
        let text = "=== CARD 1 === A ===\n=== CARD 2 === B ===";
        let cards = extract_cards(text);

        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].as_str(), "=== CARD 1 === A ===");
        assert_eq!(cards[0].body(), "A");
        assert_eq!(cards[0].number(), Some(1));
        assert_eq!(cards[1].as_str(), "=== CARD 2 === B ===");
        assert_eq!(cards[1].body(), "B");
        assert_eq!(extract_trailing_message(text), "");
    }

    #[test]
    fn test_multiline_card() {
        let text = "Intro text\n=== CARD 1 ===\nQUESTION: What is a Large Language Model (LLM)?\nANSWER: A model.\nREFERENCE: \"LLMs predict tokens\"\n===\n";
        let cards = extract_cards(text);

        assert_eq!(cards.len(), 1);
        assert!(cards[0].body().starts_with("QUESTION:"));
        assert!(cards[0].body().ends_with("\"LLMs predict tokens\""));
    }

    #[test]
    fn test_trailing_message() {
        let text = "=== CARD 1 === A ===\n⚠️ Only generated 1 card(s) because: reason";
        assert_eq!(
            extract_trailing_message(text),
            "⚠️ Only generated 1 card(s) because: reason"
        );
        assert_eq!(extract_cards(text).len(), 1);
        assert_eq!(extract_trailing_message("nothing to see"), "");
    }

    #[test]
    fn test_unterminated_card_is_dropped() {
        let text = "=== CARD 1 === A ===\n=== CARD 2 === never closed";
        let cards = extract_cards(text);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].body(), "A");
    }

    #[test]
    fn test_malformed_markers_are_ignored() {
        assert!(extract_cards("=== CARD one === A ===").is_empty());
        assert!(extract_cards("== CARD 1 == A ==").is_empty());
        assert!(extract_cards("=== card 1 === A ===").is_empty());
    }

    #[test]
    fn test_missing_close_swallows_next_start() {
        // The nearest `===` closes the card, even if it opens the next one.
        let text = "=== CARD 1 === A\n=== CARD 2 === B ===";
        let cards = extract_cards(text);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].as_str(), "=== CARD 1 === A\n===");
    }

    #[test]
    fn test_extraction_is_idempotent_over_concatenation() {
        let text = "Here you go:\n=== CARD 1 ===\nQ: x\n===\nfiller\n=== CARD 2 === y ===\n=== CARD 3 ===\nz\n===\nbye";
        let first = extract_cards(text);
        assert_eq!(first.len(), 3);

        let joined = first
            .iter()
            .map(Card::as_str)
            .collect::<Vec<_>>()
            .join("\n\n");
        assert_eq!(extract_cards(&joined), first);
    }

    #[test]
    fn test_card_numbers_are_not_validated() {
        let cards = extract_cards("=== CARD 7 === a ===\n=== CARD 7 === b ===");
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[1].number(), Some(7));
    }
}
