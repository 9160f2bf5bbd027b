use async_imap::Session;
use async_native_tls::{TlsConnector, TlsStream};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use log::{info, debug, warn};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

use crate::config::{CleanupPolicy, ImapConfig};
use crate::email::{CleanupAction, MailboxSource, MessageRef};
use crate::error::MailboxError;

/// Used when the server does not flag any mailbox as `\Trash`
pub const DEFAULT_TRASH_MAILBOX: &str = "[Gmail]/Trash";

type ImapSession = Session<TlsStream<Compat<TcpStream>>>;

/// IMAP session with the location mailbox selected
pub struct ImapMailbox {
    session: ImapSession,
    mailbox: String,
}

impl ImapMailbox {
    /// Connects over TLS, logs in and selects the configured mailbox.
    pub async fn connect(config: &ImapConfig) -> Result<Self, MailboxError> {
        info!("Connecting to IMAP server {}:{}", config.host, config.port);

        let connect_err = |reason: String| MailboxError::Connect {
            server: format!("{}:{}", config.host, config.port),
            reason,
        };

        let tcp_stream = TcpStream::connect((config.host.as_str(), config.port))
            .await
            .map_err(|e| connect_err(e.to_string()))?;

        let tls_stream = TlsConnector::new()
            .connect(&config.host, tcp_stream.compat())
            .await
            .map_err(|e| connect_err(format!("TLS handshake failed: {}", e)))?;

        let client = async_imap::Client::new(tls_stream);
        debug!("Connected to server");

        let mut session = client
            .login(&config.username, &config.password)
            .await
            .map_err(|(e, _)| MailboxError::Login {
                user: config.username.clone(),
                reason: e.to_string(),
            })?;
        debug!("Logged in successfully");

        if let Err(e) = session.select(&config.mailbox).await {
            let _ = session.logout().await;
            return Err(MailboxError::Select {
                mailbox: config.mailbox.clone(),
                reason: e.to_string(),
            });
        }

        info!("✅ IMAP session ready on mailbox '{}'", config.mailbox);

        Ok(ImapMailbox {
            session,
            mailbox: config.mailbox.clone(),
        })
    }

    /// Looks for the mailbox carrying the `\Trash` special-use attribute
    pub async fn find_trash_mailbox(&mut self) -> Result<Option<String>, MailboxError> {
        let names: Vec<_> = self.session
            .list(Some(""), Some("*"))
            .await
            .map_err(|e| MailboxError::List(e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| MailboxError::List(e.to_string()))?;

        for name in &names {
            debug!("Mailbox: {}  Attrs: {:?}", name.name(), name.attributes());

            // Special-use flags surface either as a dedicated variant or as an extension
            // attribute depending on the server, so compare on the rendered form.
            let is_trash = name.attributes()
                .iter()
                .any(|attr| format!("{:?}", attr).to_ascii_lowercase().contains("trash"));
            if is_trash {
                return Ok(Some(name.name().to_string()));
            }
        }

        Ok(None)
    }

    /// Resolves the cleanup policy into a concrete action for this server
    pub async fn cleanup_action(&mut self, config: &ImapConfig, policy: CleanupPolicy) -> Option<CleanupAction> {
        match policy {
            CleanupPolicy::None => None,
            CleanupPolicy::Delete => Some(CleanupAction::Delete),
            CleanupPolicy::Trash => {
                let trash = match &config.trash_mailbox {
                    Some(trash) => trash.clone(),
                    None => match self.find_trash_mailbox().await {
                        Ok(Some(trash)) => trash,
                        Ok(None) => DEFAULT_TRASH_MAILBOX.to_string(),
                        Err(e) => {
                            warn!("Unable to discover trash mailbox, using {}: {}", DEFAULT_TRASH_MAILBOX, e);
                            DEFAULT_TRASH_MAILBOX.to_string()
                        }
                    },
                };
                info!("Trash mailbox: {}", trash);
                Some(CleanupAction::MoveTo(trash))
            }
        }
    }
}

#[async_trait]
impl MailboxSource for ImapMailbox {
    async fn search_all(&mut self) -> Result<Vec<MessageRef>, MailboxError> {
        let uids = self.session
            .uid_search("ALL")
            .await
            .map_err(|e| MailboxError::Search(e.to_string()))?;

        let mut refs: Vec<MessageRef> = uids.into_iter().map(MessageRef).collect();
        refs.sort();
        info!("Found {} email(s) in '{}'", refs.len(), self.mailbox);

        Ok(refs)
    }

    async fn fetch(&mut self, message: MessageRef) -> Result<Option<Vec<u8>>, MailboxError> {
        let fetch_err = |e: async_imap::error::Error| MailboxError::Fetch {
            uid: message.0,
            reason: e.to_string(),
        };

        let messages: Vec<_> = self.session
            .uid_fetch(message.to_string(), "BODY.PEEK[]")
            .await
            .map_err(fetch_err)?
            .try_collect()
            .await
            .map_err(fetch_err)?;

        Ok(messages
            .iter()
            .find_map(|m| m.body())
            .map(|body| body.to_vec()))
    }

    async fn discard(&mut self, message: MessageRef, action: &CleanupAction) -> Result<(), MailboxError> {
        let cleanup_err = |e: async_imap::error::Error| MailboxError::Cleanup {
            uid: message.0,
            reason: e.to_string(),
        };

        match action {
            CleanupAction::MoveTo(target) => {
                self.session
                    .uid_mv(message.to_string(), target)
                    .await
                    .map_err(cleanup_err)?;
                debug!("Moved email {} to {}", message, target);
            }
            CleanupAction::Delete => {
                let _: Vec<_> = self.session
                    .uid_store(message.to_string(), "+FLAGS (\\Deleted)")
                    .await
                    .map_err(cleanup_err)?
                    .try_collect()
                    .await
                    .map_err(cleanup_err)?;

                // UID EXPUNGE leaves messages flagged by other clients in place
                let _: Vec<_> = self.session
                    .uid_expunge(message.to_string())
                    .await
                    .map_err(cleanup_err)?
                    .try_collect()
                    .await
                    .map_err(cleanup_err)?;
                debug!("Deleted email {}", message);
            }
        }

        Ok(())
    }

    async fn logout(&mut self) -> Result<(), MailboxError> {
        info!("Logging out from IMAP server");
        self.session
            .logout()
            .await
            .map_err(|e| MailboxError::Logout(e.to_string()))
    }
}
