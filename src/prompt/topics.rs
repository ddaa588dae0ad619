//! Sensitive-topic guard for prompt assembly.
//!
//! When the rendered chat window touches one of the watchlist topics, a fixed
//! block of counter-balancing statements is prepended so the persona doesn't
//! amplify whatever one-sided framing dominates the recent conversation.

const WATCHLIST: &[&str] = &[
    "capitalism",
    "communism",
    "socialism",
    "fascism",
    "election",
    "president",
    "congress",
    "immigration",
    "abortion",
    "vaccine",
    "climate change",
    "gun control",
];

pub const COUNTERWEIGHT: &str = "\
Background notes, keep them in mind without quoting them:\n\
- Every political and economic system has documented successes and failures.\n\
- Strong historical claims deserve sources; repeat none as settled fact.\n\
- People in this chat hold opposing views; do not pile onto one side.\n\
- It is fine to joke, it is not fine to campaign.\n";

/// The counterweight block when the rendered history trips the watchlist.
pub fn guard_block(rendered_history: &str) -> Option<&'static str> {
    let lower = rendered_history.to_lowercase();
    WATCHLIST
        .iter()
        .any(|topic| lower.contains(topic))
        .then_some(COUNTERWEIGHT)
}
