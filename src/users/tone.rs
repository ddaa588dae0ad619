//! Message-tone policy: the label set, per-tone affinity deltas, emoji
//! reaction pools, and the classification prompt. Classification itself runs
//! through the generation backend; everything here is the fixed policy around
//! it.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Apology,
    Affectionate,
    Friendly,
    Neutral,
    Rude,
}

impl Tone {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Tone::Apology,
            1 => Tone::Affectionate,
            2 => Tone::Friendly,
            4 => Tone::Rude,
            _ => Tone::Neutral,
        }
    }

    /// Affinity delta applied when a message classifies as this tone. An
    /// apology is a strong forgiveness reset.
    pub fn affinity_delta(self) -> f64 {
        match self {
            Tone::Apology => -50.0,
            Tone::Affectionate => -1.5,
            Tone::Friendly => -1.0,
            Tone::Neutral => 0.0,
            Tone::Rude => 1.0,
        }
    }

    /// Emoji pool the reaction is drawn from. Empty = no reaction.
    pub fn reactions(self) -> &'static [&'static str] {
        match self {
            Tone::Apology => &["🤔", "🥴", "🤨", "🙏", "🤷"],
            Tone::Affectionate => &["❤", "💘", "😘"],
            Tone::Friendly => &["🆒", "🗿"],
            Tone::Neutral => &[],
            Tone::Rude => &["🤬", "😡", "🖕"],
        }
    }
}

/// Probability of generating an opinion from a neutral message. Non-neutral
/// tones always generate one, so the log doesn't grow only on conflict.
pub const NEUTRAL_OPINION_PROBABILITY: f64 = 0.3;

pub fn classification_prompt(text: &str) -> String {
    format!(
        "Given the message below:\n{}\n\
         Answer with exactly one of the 5 options that best fits the content of the message:\n\
         0 - The message is an apology\n\
         1 - Affectionate message\n\
         2 - Friendly message\n\
         3 - Neutral message\n\
         4 - Rude or offensive message\n\
         Do not add any commentary, answer only with a number from 0 to 4.",
        text
    )
}

/// Parse the classifier's reply defensively: first digit wins, anything else
/// is neutral.
pub fn parse_tone_reply(raw: &str) -> Tone {
    raw.chars()
        .find_map(|c| c.to_digit(10))
        .map(Tone::from_code)
        .unwrap_or(Tone::Neutral)
}

/// Markers of a non-answer from the opinion generator — those are dropped
/// instead of stored.
pub const OPINION_REJECT_MARKERS: &[&str] =
    &["###none###", "none", "i don't have", "sorry,", "please,", "understood,"];

pub fn opinion_prompt(text: &str, handle: &str) -> String {
    format!(
        "Given the message '{}' sent by {}, summarize briefly, in at most 8 words, \
         your opinion or what you identified about them. If you cannot form an opinion \
         or observation from the message provided, do not ask for more information, \
         just return '###NONE###'.",
        text, handle
    )
}

pub fn is_rejected_opinion(opinion: &str) -> bool {
    let lower = opinion.to_lowercase();
    OPINION_REJECT_MARKERS.iter().any(|m| lower.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_replies_parse() {
        assert_eq!(parse_tone_reply("4"), Tone::Rude);
        assert_eq!(parse_tone_reply("0"), Tone::Apology);
        assert_eq!(parse_tone_reply("The answer is 2."), Tone::Friendly);
    }

    #[test]
    fn garbage_is_neutral() {
        assert_eq!(parse_tone_reply(""), Tone::Neutral);
        assert_eq!(parse_tone_reply("no idea"), Tone::Neutral);
        assert_eq!(parse_tone_reply("7"), Tone::Neutral);
    }

    #[test]
    fn deltas_match_policy() {
        assert_eq!(Tone::Rude.affinity_delta(), 1.0);
        assert_eq!(Tone::Apology.affinity_delta(), -50.0);
        assert_eq!(Tone::Neutral.affinity_delta(), 0.0);
    }

    #[test]
    fn neutral_has_no_reaction() {
        assert!(Tone::Neutral.reactions().is_empty());
        assert!(!Tone::Rude.reactions().is_empty());
    }

    #[test]
    fn refusal_opinions_rejected() {
        assert!(is_rejected_opinion("###NONE###"));
        assert!(is_rejected_opinion("Sorry, I can't say"));
        assert!(!is_rejected_opinion("Talks a lot about football."));
    }
}
