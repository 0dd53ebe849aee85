//! Streamed chat transcript.
//!
//! Holds the visible conversation for a chat client. The assistant reply is
//! built up fragment by fragment; the raw text is kept and the stored
//! content is re-cleaned on each fragment, so emphasis markers split across
//! fragments still disappear once their closing half arrives.

use serde::Serialize;

use crate::services::chat::HistoryTurn;

/// Opening message shown before the first exchange.
pub const WELCOME: &str = "🙏 Swamiye Saranam Ayyappa!\n\nI'm here to help you with:\n• Sabarimala Yatra information\n• Annadanam booking\n• Pooja booking\n• About Sabari Sastha Seva Samithi\n\nHow may I assist you today?";

/// Replaces the assistant reply when an exchange fails.
pub const APOLOGY: &str = "Sorry, I'm having trouble connecting right now. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    fn wire_role(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: u64,
    pub sender: Sender,
    pub content: String,
}

/// What to send for a newly begun exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub message: String,
    pub history: Vec<HistoryTurn>,
}

#[derive(Debug)]
struct InFlight {
    id: u64,
    raw: String,
}

#[derive(Debug)]
pub struct Transcript {
    messages: Vec<Message>,
    in_flight: Option<InFlight>,
    next_id: u64,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: vec![Message { id: 1, sender: Sender::Assistant, content: WELCOME.to_string() }],
            in_flight: None,
            next_id: 2,
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    fn push(&mut self, sender: Sender, content: String) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(Message { id, sender, content });
        id
    }

    /// Append the user's message and an empty assistant placeholder.
    ///
    /// Returns `None` for blank input or while a reply is still streaming.
    /// The history covers every message after the welcome, up to but not
    /// including the new one.
    pub fn begin_exchange(&mut self, input: &str) -> Option<Exchange> {
        let message = input.trim();
        if message.is_empty() || self.is_busy() {
            return None;
        }
        let history = self.messages[1..]
            .iter()
            .map(|m| HistoryTurn { role: m.sender.wire_role().to_string(), content: m.content.clone() })
            .collect();

        self.push(Sender::User, message.to_string());
        let id = self.push(Sender::Assistant, String::new());
        self.in_flight = Some(InFlight { id, raw: String::new() });
        Some(Exchange { message: message.to_string(), history })
    }

    fn reply_mut(&mut self, id: u64) -> Option<&mut Message> {
        self.messages.iter_mut().rev().find(|m| m.id == id)
    }

    /// Accumulate a streamed fragment into the in-flight reply.
    pub fn push_fragment(&mut self, fragment: &str) {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return;
        };
        in_flight.raw.push_str(fragment);
        let (id, clean) = (in_flight.id, clean_markdown(&in_flight.raw));
        if let Some(reply) = self.reply_mut(id) {
            reply.content = clean;
        }
    }

    /// Finish the exchange and return the reply as displayed.
    pub fn complete_exchange(&mut self) -> Option<String> {
        let in_flight = self.in_flight.take()?;
        self.reply_mut(in_flight.id).map(|m| m.content.clone())
    }

    /// Replace the in-flight reply with [`APOLOGY`] and finish the exchange.
    pub fn fail_exchange(&mut self) {
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };
        if let Some(reply) = self.reply_mut(in_flight.id) {
            reply.content = APOLOGY.to_string();
        }
    }
}

// =============================================================================
// MARKDOWN CLEANUP
// =============================================================================

/// Drop `**bold**` then `*italic*` markers, pairing the nearest delimiters on
/// the same line. An unpaired marker is left as is.
#[must_use]
pub fn clean_markdown(text: &str) -> String {
    strip_pairs(&strip_pairs(text, "**"), "*")
}

fn strip_pairs(text: &str, marker: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find(marker) {
        let after = &rest[open + marker.len()..];
        let line_end = after.find('\n').unwrap_or(after.len());
        match after[..line_end].find(marker) {
            Some(close) => {
                out.push_str(&rest[..open]);
                out.push_str(&after[..close]);
                rest = &after[close + marker.len()..];
            }
            None => {
                out.push_str(&rest[..open + marker.len()]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_welcome_only() {
        let t = Transcript::new();
        assert_eq!(t.messages().len(), 1);
        assert_eq!(t.messages()[0].sender, Sender::Assistant);
        assert!(!t.is_busy());
    }

    #[test]
    fn first_exchange_sends_empty_history() {
        let mut t = Transcript::new();
        let exchange = t.begin_exchange("  When is Annadanam?  ").unwrap();
        assert_eq!(exchange.message, "When is Annadanam?");
        assert!(exchange.history.is_empty());
        assert_eq!(t.messages().len(), 3);
        assert_eq!(t.messages()[2].content, "");
        assert!(t.is_busy());
    }

    #[test]
    fn blank_or_busy_input_is_ignored() {
        let mut t = Transcript::new();
        assert!(t.begin_exchange("   ").is_none());
        t.begin_exchange("one").unwrap();
        assert!(t.begin_exchange("two").is_none());
        assert_eq!(t.messages().len(), 3);
    }

    #[test]
    fn fragments_accumulate_and_are_cleaned() {
        let mut t = Transcript::new();
        t.begin_exchange("hi").unwrap();
        t.push_fragment("Swamiye **Sara");
        assert_eq!(t.messages()[2].content, "Swamiye Sara");
        t.push_fragment("nam** *Ayyappa*");
        assert_eq!(t.messages()[2].content, "Swamiye Saranam Ayyappa");
        assert_eq!(t.complete_exchange().as_deref(), Some("Swamiye Saranam Ayyappa"));
        assert!(!t.is_busy());
    }

    #[test]
    fn second_exchange_carries_prior_turns_with_model_role() {
        let mut t = Transcript::new();
        t.begin_exchange("q1").unwrap();
        t.push_fragment("a1");
        t.complete_exchange();
        let exchange = t.begin_exchange("q2").unwrap();
        let roles: Vec<_> = exchange.history.iter().map(|h| h.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "model"]);
        assert_eq!(exchange.history[1].content, "a1");
    }

    #[test]
    fn failure_replaces_partial_reply_with_apology() {
        let mut t = Transcript::new();
        t.begin_exchange("hi").unwrap();
        t.push_fragment("partial");
        t.fail_exchange();
        assert_eq!(t.messages()[2].content, APOLOGY);
        assert!(!t.is_busy());
        assert!(t.complete_exchange().is_none());
    }

    #[test]
    fn fragments_outside_exchange_are_dropped() {
        let mut t = Transcript::new();
        t.push_fragment("stray");
        assert_eq!(t.messages().len(), 1);
    }

    #[test]
    fn markdown_cleanup_matches_non_greedy_pairs() {
        assert_eq!(clean_markdown("**a** and **b**"), "a and b");
        assert_eq!(clean_markdown("*a* **b**"), "a b");
        assert_eq!(clean_markdown("5 * 3"), "5 * 3");
        assert_eq!(clean_markdown("**open\nclose**"), "open\nclose");
        assert_eq!(clean_markdown("*open\nclose"), "*open\nclose");
        assert_eq!(clean_markdown("****"), "");
        assert_eq!(clean_markdown("• *Irumudi*: sacred bundle"), "• Irumudi: sacred bundle");
    }
}
