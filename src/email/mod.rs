pub mod common;
pub mod decoder;
pub mod mailbox;

// Re-export commonly used items
pub use common::{BodyPart, DecodedMessage, MessageRef};
pub use mailbox::{CleanupAction, MailboxSource};
