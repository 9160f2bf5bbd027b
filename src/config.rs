use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

use crate::error::ConfigError;

pub const DEFAULT_IMAP_SERVER: &str = "imap.gmail.com:993";
pub const DEFAULT_MAILBOX: &str = "MyLocation";
pub const DEFAULT_COUNTRIES: &str = "Andorra,Spain";
pub const DEFAULT_DEDUP_THRESHOLD: usize = 5;
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    pub imap: ImapConfig,
    pub scan: ScanConfig,
    pub days_api: Option<DaysApiConfig>,
    pub sync: SyncConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub mailbox: String,
    /// Destination of redundant pings when the policy is `trash`. Discovered when unset.
    pub trash_mailbox: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub countries: Vec<String>,
    pub timezone: Tz,
    pub dedup_threshold: usize,
    pub cleanup: CleanupPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupPolicy {
    /// Move redundant messages to the trash mailbox.
    Trash,
    /// Flag as deleted and expunge.
    Delete,
    /// Leave redundant messages alone.
    None,
}

impl FromStr for CleanupPolicy {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "trash" => Ok(CleanupPolicy::Trash),
            "delete" => Ok(CleanupPolicy::Delete),
            "none" => Ok(CleanupPolicy::None),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DaysApiConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub port: u16,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let missing: Vec<&'static str> = ["GMAIL_ACCOUNT", "GMAIL_APP_PASS"]
            .into_iter()
            .filter(|name| var(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }

        let server = var("GMAIL_IMAP").unwrap_or_else(|| DEFAULT_IMAP_SERVER.to_string());
        let (host, port) = parse_server(&server)?;

        let timezone_name = var("TIMEZONE").unwrap_or_else(|| "UTC".to_string());
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(timezone_name.clone()))?;

        let countries = parse_countries(&var("COUNTRIES").unwrap_or_else(|| DEFAULT_COUNTRIES.to_string()))?;

        let cleanup = match var("CLEANUP_POLICY") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidValue { name: "CLEANUP_POLICY", value })?,
            None => CleanupPolicy::Trash,
        };

        let sync_interval_secs = parse_number(&var, "SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL_SECS)?;
        if sync_interval_secs == 0 {
            return Err(ConfigError::InvalidValue { name: "SYNC_INTERVAL_SECS", value: "0".to_string() });
        }

        let days_api = match (var("DAYS_API"), var("DAYS_API_USER"), var("DAYS_API_PASS")) {
            (Some(url), Some(username), Some(password)) => Some(DaysApiConfig {
                url: url.trim_end_matches('/').to_string(),
                username,
                password,
            }),
            _ => {
                log::warn!("DAYS_API, DAYS_API_USER or DAYS_API_PASS not set - days API sync unavailable");
                None
            }
        };

        Ok(Config {
            imap: ImapConfig {
                host,
                port,
                username: var("GMAIL_ACCOUNT").unwrap_or_default(),
                password: var("GMAIL_APP_PASS").unwrap_or_default(),
                mailbox: var("GMAIL_MAILBOX").unwrap_or_else(|| DEFAULT_MAILBOX.to_string()),
                trash_mailbox: var("TRASH_MAILBOX"),
            },
            scan: ScanConfig {
                countries,
                timezone,
                dedup_threshold: parse_number(&var, "DEDUP_THRESHOLD", DEFAULT_DEDUP_THRESHOLD)?,
                cleanup,
            },
            days_api,
            sync: SyncConfig {
                interval: Duration::from_secs(sync_interval_secs),
            },
            http: HttpConfig {
                port: parse_number(&var, "PORT", 8080)?,
            },
        })
    }
}

fn parse_server(server: &str) -> Result<(String, u16), ConfigError> {
    let invalid = || ConfigError::InvalidValue { name: "GMAIL_IMAP", value: server.to_string() };
    match server.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => Ok((host.to_string(), port.parse().map_err(|_| invalid())?)),
        Some(_) => Err(invalid()),
        None => Ok((server.to_string(), 993)),
    }
}

fn parse_countries(list: &str) -> Result<Vec<String>, ConfigError> {
    let mut countries: Vec<String> = Vec::new();
    for country in list.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        if countries.iter().any(|c| c == country) {
            return Err(ConfigError::DuplicateCountry(country.to_string()));
        }
        countries.push(country.to_string());
    }
    if countries.is_empty() {
        return Err(ConfigError::NoCountries);
    }
    Ok(countries)
}

fn parse_number<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}
