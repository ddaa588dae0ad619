//! Defensive reformatting of generated replies — the persona writes like a
//! chat user, not like a model. Pure string transform, no side effects.
//!
//! Rules, in order:
//! - code blocks pass through untouched
//! - sentence-initial letters after `.`/`!`/`?`/`:` (and after quotes or
//!   newlines) are lowercased, unless the model emphasized the next word
//!   with a capital
//! - a lone trailing period on a single-sentence message is stripped
//! - a leaked `{persona}:` prefix is removed
//! - leading punctuation/whitespace and wrapping quotes are stripped
//! - with small fixed probability, or when the reply opens with an apology,
//!   the whole message is upper-cased
//! - runs of spaces collapse
//! - empty/degenerate results fall back to the upper-cased original or one
//!   of two fixed filler phrases

use rand::Rng;

use crate::utils::text::collapse_spaces;

const FILLERS: [&str; 2] = ["i'm speechless", "nothing to say"];
const SHOUT_PROBABILITY: f64 = 0.02;
const APOLOGY_MARKERS: [&str; 2] = ["sorry", "desculp"];
const LEADING_STRIP: [char; 6] = ['.', ',', '?', '!', '\n', ' '];

pub fn adjust_casing(original: &str, persona: &str) -> String {
    adjust_casing_with(original, persona, &mut rand::thread_rng())
}

pub fn adjust_casing_with<R: Rng>(original: &str, persona: &str, rng: &mut R) -> String {
    if original.contains("```") {
        return original.to_string();
    }

    let trimmed = original.trim();
    let chars: Vec<char> = trimmed.chars().collect();
    if chars.is_empty() {
        return pick_filler(rng).to_string();
    }
    if chars.len() == 1 {
        return trimmed.to_uppercase();
    }

    // Lowercase sentence starts, keeping deliberate capitals (next char
    // already upper means the model meant it).
    let mut message = String::with_capacity(trimmed.len());
    let mut idx_to_lower = 0usize;
    for (i, &c) in chars.iter().enumerate() {
        let mut c = c;
        if idx_to_lower == i {
            let next = i + 1;
            if next < chars.len() && !chars[next].is_uppercase() {
                c = c.to_lowercase().next().unwrap_or(c);
            }
        }
        message.push(c);
        match chars[i] {
            '.' | '!' | '?' | ':' => idx_to_lower = i + 2,
            '"' | '\n' => idx_to_lower = i + 1,
            _ => {}
        }
    }

    // A single-sentence message loses its trailing period.
    if message.matches('.').count() == 1 && message.ends_with('.') {
        message.pop();
    }

    // Leaked speaker prefix.
    let prefix = format!("{}:", persona.to_lowercase());
    if message.to_lowercase().starts_with(&prefix) {
        message = message[prefix.len()..].trim_start().to_string();
    }

    while message.starts_with(LEADING_STRIP.as_slice()) {
        message.remove(0);
    }

    if message.len() >= 2 && message.starts_with('"') && message.ends_with('"') {
        message = message.replace('"', "");
    }

    if !message.is_empty() {
        let first_word = message.split(' ').next().unwrap_or_default().to_lowercase();
        let apologizing = APOLOGY_MARKERS.iter().any(|m| first_word.contains(m));
        if apologizing || rng.gen::<f64>() < SHOUT_PROBABILITY {
            message = message.to_uppercase();
        }
    }

    if let Some(rest) = message.strip_prefix("ah, ") {
        message = rest.to_string();
    }

    // Second pass on the first letter: only when the rest of the word is
    // lowercase (don't undo a shout or an acronym).
    let msg_chars: Vec<char> = message.chars().collect();
    if msg_chars.len() > 1 && msg_chars[1].is_lowercase() {
        let first_lower: String = msg_chars[0].to_lowercase().collect();
        message = format!("{}{}", first_lower, msg_chars[1..].iter().collect::<String>());
    }

    let message = collapse_spaces(&message);

    if message.is_empty() {
        return trimmed.to_uppercase();
    }
    message
}

fn pick_filler<R: Rng>(rng: &mut R) -> &'static str {
    if rng.gen_bool(0.5) {
        FILLERS[0]
    } else {
        FILLERS[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    /// RNG whose `gen::<f64>()` stays near 1.0 — the shout branch never
    /// fires.
    fn quiet_rng() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    fn adjust(text: &str) -> String {
        adjust_casing_with(text, "Pedro", &mut quiet_rng())
    }

    #[test]
    fn sentence_starts_lowercased() {
        assert_eq!(adjust("Tudo certo! Pode falar"), "tudo certo! pode falar");
    }

    #[test]
    fn deliberate_capitals_survive() {
        assert_eq!(adjust("olha, NASA did that"), "olha, NASA did that");
    }

    #[test]
    fn lone_trailing_period_stripped() {
        assert_eq!(adjust("tudo certo."), "tudo certo");
        // Two sentences keep their periods.
        assert_eq!(adjust("ok. done."), "ok. done.");
    }

    #[test]
    fn leaked_prefix_removed() {
        assert_eq!(adjust("Pedro: tudo certo"), "tudo certo");
    }

    #[test]
    fn wrapping_quotes_removed() {
        assert_eq!(adjust("\"tudo certo\""), "tudo certo");
    }

    #[test]
    fn leading_punctuation_stripped() {
        assert_eq!(adjust("... ok then"), "ok then");
    }

    #[test]
    fn apology_shouts() {
        assert_eq!(adjust("sorry about yesterday"), "SORRY ABOUT YESTERDAY");
    }

    #[test]
    fn leading_ah_dropped() {
        assert_eq!(adjust("ah, tudo certo"), "tudo certo");
    }

    #[test]
    fn spaces_collapse() {
        assert_eq!(adjust("um  momento   ok"), "um momento ok");
    }

    #[test]
    fn code_blocks_untouched() {
        let code = "```rust\nfn main() {}\n```";
        assert_eq!(adjust(code), code);
    }

    #[test]
    fn empty_input_yields_filler() {
        let out = adjust("");
        assert!(FILLERS.contains(&out.as_str()));
        assert!(!out.is_empty());

        let out = adjust("   ");
        assert!(FILLERS.contains(&out.as_str()));
    }

    #[test]
    fn degenerate_input_never_empty() {
        assert_eq!(adjust("k"), "K");
        assert_eq!(adjust("..."), "...");
    }

    #[test]
    fn idempotent_on_normalized_text() {
        let once = adjust("Vou chegar mais tarde hoje");
        let twice = adjust(&once);
        assert_eq!(once, twice);
    }
}
