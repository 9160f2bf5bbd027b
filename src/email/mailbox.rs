use async_trait::async_trait;

use crate::error::MailboxError;
use super::common::MessageRef;

/// What to do with a message once it is considered redundant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupAction {
    MoveTo(String),
    Delete,
}

/// A selected mailbox holding location pings.
///
/// Implementations own an open session; `logout` must be called once the scan is over,
/// whatever its outcome.
#[async_trait]
pub trait MailboxSource: Send {
    /// Every message currently in the mailbox, oldest first
    async fn search_all(&mut self) -> Result<Vec<MessageRef>, MailboxError>;

    /// Raw message, or `None` when the server returned no body section for it
    async fn fetch(&mut self, message: MessageRef) -> Result<Option<Vec<u8>>, MailboxError>;

    async fn discard(&mut self, message: MessageRef, action: &CleanupAction) -> Result<(), MailboxError>;

    async fn logout(&mut self) -> Result<(), MailboxError>;
}
