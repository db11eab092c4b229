//! Prompt templates for card generation and repair.
//!
//! The delimiter rules requested here are what [`super::extract_cards`]
//! parses; change them together.

use super::CardCount;

/// Prompt for the first generation pass.
pub fn build_generation_prompt(notes: &str, count: CardCount) -> String {
    format!(
        r#"
Generate SQR flashcards using ONLY the notes inside <NOTES>...</NOTES>.

HARD REQUIREMENTS:
- If the notes contain enough information: generate EXACTLY {count} cards.
- Otherwise: generate as many valid cards as the notes support, then print:
  "⚠️ Only generated X card(s) because:" followed by bullet-point reasons.
- Do not invent facts. Use only what appears in the notes.
- Every card MUST include a REFERENCE that is an EXACT quote from the notes.
- Each QUESTION must expand acronyms (e.g., Large Language Model (LLM)).
- Output ONLY flashcards (plus the optional insufficiency message at the end).
- Each card MUST start with "=== CARD N ===" and end with "===".
- Number cards sequentially.

<NOTES>
{notes}
</NOTES>

Now output the flashcards."#
    )
}

/// Prompt for the repair pass, embedding the output that fell short.
pub fn build_repair_prompt(notes: &str, count: CardCount, prior_output: &str) -> String {
    format!(
        r#"
You must ONLY output correctly formatted SQR flashcards.

Task:
- Rewrite the content below into valid SQR flashcards.
- Output EXACTLY {count} cards if the notes support it; otherwise output as many as they support, then:
  "⚠️ Only generated X card(s) because:" followed by bullet-point reasons.
- Use ONLY information from <NOTES>.
- Every card MUST include a REFERENCE that is an EXACT quote copied from <NOTES>.
- Number cards sequentially starting at 1.
- Each card MUST start with "=== CARD N ===" and end with "===".
- Output ONLY cards (plus the optional insufficiency message at the end). No other text.

<NOTES>
{notes}
</NOTES>

The previous model output below needs reformatting. Do NOT treat it as true unless the notes support it.
<PREVIOUS_OUTPUT>
{prior_output}
</PREVIOUS_OUTPUT>

Now output the corrected flashcards."#
    )
}
