use async_trait::async_trait;
use log::{info, warn};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::{ImapConfig, ScanConfig};
use crate::email::{CleanupAction, MailboxSource};
use crate::error::{MailboxError, ScanError};
use crate::imap_client::ImapMailbox;
use super::aggregator::aggregate;
use super::model::ScanSummary;

/// Entry point for mailbox scans.
///
/// Holds the scan lock: the sync loop and the HTTP `count` handler share one `Scanner`,
/// so scans queue behind each other instead of racing on the same mailbox.
pub struct Scanner {
    imap: ImapConfig,
    scan: ScanConfig,
    lock: Mutex<()>,
}

impl Scanner {
    pub fn new(imap: ImapConfig, scan: ScanConfig) -> Self {
        Scanner {
            imap,
            scan,
            lock: Mutex::new(()),
        }
    }

    /// Connects, scans the whole mailbox and logs out
    pub async fn scan(&self, cancel: &CancellationToken) -> Result<ScanSummary, ScanError> {
        let _guard = self.lock.lock().await;

        let mut mailbox = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ScanError::Cancelled),
            mailbox = ImapMailbox::connect(&self.imap) => mailbox?,
        };
        let cleanup = mailbox.cleanup_action(&self.imap, self.scan.cleanup).await;

        run_scan(&mut mailbox, &self.scan, cleanup.as_ref(), cancel).await
    }

    /// Opens and closes a session, nothing else
    pub async fn check_health(&self) -> Result<(), MailboxError> {
        let mut mailbox = ImapMailbox::connect(&self.imap).await?;
        mailbox.logout().await
    }
}

/// Anything able to produce a full scan summary on demand
#[async_trait]
pub trait ScanSource: Send + Sync {
    async fn scan(&self, cancel: &CancellationToken) -> Result<ScanSummary, ScanError>;
}

#[async_trait]
impl ScanSource for Scanner {
    async fn scan(&self, cancel: &CancellationToken) -> Result<ScanSummary, ScanError> {
        Scanner::scan(self, cancel).await
    }
}

/// Aggregates an already open mailbox, then logs out whatever the outcome.
pub async fn run_scan<M>(
    mailbox: &mut M,
    config: &ScanConfig,
    cleanup: Option<&CleanupAction>,
    cancel: &CancellationToken,
) -> Result<ScanSummary, ScanError>
where
    M: MailboxSource + ?Sized,
{
    let result = aggregate(mailbox, config, cleanup, cancel).await;

    if let Err(e) = mailbox.logout().await {
        warn!("IMAP logout failed: {}", e);
    }

    if let Ok(summary) = &result {
        info!(
            "Scan completed: {} day record(s), {} warning(s), {} email(s) cleaned up",
            summary.records.len(),
            summary.warnings.len(),
            summary.cleaned_up
        );
    }

    result
}
