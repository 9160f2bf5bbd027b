use thiserror::Error;

/// Invalid or incomplete configuration. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variables: {}", .0.join(", "))]
    MissingVars(Vec<&'static str>),

    #[error("unknown time zone {0:?}")]
    InvalidTimezone(String),

    #[error("invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },

    #[error("at least one country must be tracked")]
    NoCountries,

    #[error("country {0:?} is listed more than once")]
    DuplicateCountry(String),
}

/// Mailbox transport failures.
#[derive(Debug, Error)]
pub enum MailboxError {
    #[error("connecting to {server}: {reason}")]
    Connect { server: String, reason: String },

    #[error("logging in as {user}: {reason}")]
    Login { user: String, reason: String },

    #[error("selecting mailbox {mailbox}: {reason}")]
    Select { mailbox: String, reason: String },

    #[error("listing mailboxes: {0}")]
    List(String),

    #[error("searching messages: {0}")]
    Search(String),

    #[error("fetching message {uid}: {reason}")]
    Fetch { uid: u32, reason: String },

    #[error("cleaning up message {uid}: {reason}")]
    Cleanup { uid: u32, reason: String },

    #[error("logging out: {0}")]
    Logout(String),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("message is not valid MIME")]
    Unparseable,
}

/// Hard failure of a whole scan. Per-message problems never end up here.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Mailbox(#[from] MailboxError),

    #[error("scan cancelled")]
    Cancelled,
}

/// Failure talking to the days API for a single day.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("building request: {0}")]
    Request(String),

    #[error("sending request: {0}")]
    Transport(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("unexpected status code {status} (body {body})")]
    Status { status: u16, body: String },

    #[error("decoding response body: {0}")]
    Decode(String),

    #[error("encoding request body: {0}")]
    Encode(String),
}
