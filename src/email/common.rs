/// Common structures shared by the mailbox transport and the day engines
use chrono::{DateTime, Utc};

/// Stable reference to a message inside the selected mailbox (IMAP UID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageRef(pub u32);

impl std::fmt::Display for MessageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One body part of a decoded message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyPart {
    /// Inline text part (text/plain or text/html that is not an attachment)
    Inline(String),
    /// Anything else: attachments, binary parts, nested messages
    Other,
}

/// Message reduced to what the day aggregation needs
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    pub timestamp: Option<DateTime<Utc>>,
    pub parts: Vec<BodyPart>,
}
