//! Keyword routing for inbound text messages.
//!
//! Deliberately substring containment, not a command parser: the bot reacts
//! to its trigger keyword anywhere in the message.

use eggbird_core::prompt::{TEST_PHRASE, TRIGGER_KEYWORD};

/// What to do with an inbound text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Keyword with nothing else: fixed greeting, no completion call.
    Greeting,
    /// Remainder asks for a test run of today's meal advice.
    DailyAdvice,
    /// Remainder is a free-form prompt for the completion API.
    FreeForm(String),
}

/// Route a message. `None` means the keyword is absent: no action, no reply.
pub fn route_text(text: &str) -> Option<Action> {
    let text = text.trim();
    if !text.contains(TRIGGER_KEYWORD) {
        return None;
    }

    let remainder = text.replace(TRIGGER_KEYWORD, "");
    let remainder = remainder.trim();

    if remainder.is_empty() {
        Some(Action::Greeting)
    } else if remainder.contains(TEST_PHRASE) {
        Some(Action::DailyAdvice)
    } else {
        Some(Action::FreeForm(remainder.to_string()))
    }
}
