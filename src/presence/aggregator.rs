use std::collections::HashMap;

use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::ScanConfig;
use crate::email::{decoder, BodyPart, CleanupAction, DecodedMessage, MailboxSource, MessageRef};
use crate::error::ScanError;
use super::model::{DayKey, PresenceRecord, ScanSummary};

/// Marks HTML alternatives, which repeat the plain text and are never matched
const HTML_MARKER: &str = "<html";

/// Folds decoded messages into per-day presence facts.
///
/// Matching is done per inline body part: a message repeating a country in two parts
/// counts twice in `email_match_count`. Day counts are keyed on (country, day) only.
pub struct DayAggregator<'a> {
    config: &'a ScanConfig,
    matches: HashMap<(usize, DayKey), usize>,
    summary: ScanSummary,
}

impl<'a> DayAggregator<'a> {
    pub fn new(config: &'a ScanConfig) -> Self {
        DayAggregator {
            config,
            matches: HashMap::new(),
            summary: ScanSummary::new(&config.countries),
        }
    }

    /// Records a non-fatal problem with a message
    pub fn warn(&mut self, warning: String) {
        warn!("{}", warning);
        self.summary.warnings.push(warning);
    }

    /// Processes one message. Returns `true` when the message is redundant, i.e. one of its
    /// matches pushed a (country, day) pair over the dedup threshold.
    pub fn observe(&mut self, message: MessageRef, decoded: &DecodedMessage) -> bool {
        let Some(timestamp) = decoded.timestamp else {
            self.warn(format!("No date header for message {}", message));
            return false;
        };

        let day = DayKey::from_timestamp(timestamp, &self.config.timezone);
        let mut redundant = false;

        for part in &decoded.parts {
            let BodyPart::Inline(text) = part else {
                continue;
            };

            let body = normalize_body(text);
            if body.to_ascii_lowercase().contains(HTML_MARKER) {
                continue;
            }

            for (index, country) in self.config.countries.iter().enumerate() {
                if !body.contains(country.as_str()) {
                    continue;
                }

                *self.summary.email_match_count.entry(country.clone()).or_insert(0) += 1;

                let count = self.matches.entry((index, day)).or_insert(0);
                *count += 1;
                let count = *count;

                if count == 1 {
                    let days = self.summary.day_match_count.entry(country.clone()).or_insert(0);
                    *days += 1;

                    let countries = &self.config.countries;
                    self.summary
                        .records
                        .entry(day)
                        .or_insert_with(|| PresenceRecord::new(day, countries))
                        .countries
                        .insert(country.clone(), true);

                    debug!("Email {} ({}) body: {}", message, timestamp.with_timezone(&self.config.timezone), body);
                    debug!("{} day: {} [{}]", country, day, days);
                }

                if count > self.config.dedup_threshold {
                    redundant = true;
                }
            }
        }

        redundant
    }

    pub fn record_cleanup(&mut self) {
        self.summary.cleaned_up += 1;
    }

    pub fn finish(self) -> ScanSummary {
        self.summary
    }
}

/// Trims the part and folds line breaks so multi-line bodies match on one line
pub fn normalize_body(text: &str) -> String {
    text.trim().replace("\r\n", " | ").replace('\n', " | ")
}

/// Runs a full scan of an open mailbox.
///
/// Only a failing search or fetch (or cancellation) aborts the scan. Undecodable
/// messages become warnings, and cleanup failures are only logged.
pub async fn aggregate<M>(
    mailbox: &mut M,
    config: &ScanConfig,
    cleanup: Option<&CleanupAction>,
    cancel: &CancellationToken,
) -> Result<ScanSummary, ScanError>
where
    M: MailboxSource + ?Sized,
{
    let refs = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ScanError::Cancelled),
        refs = mailbox.search_all() => refs?,
    };

    let mut aggregator = DayAggregator::new(config);

    for message in refs {
        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ScanError::Cancelled),
            raw = mailbox.fetch(message) => raw?,
        };

        let Some(raw) = raw else {
            aggregator.warn(format!("No body for message {}", message));
            continue;
        };

        let decoded = match decoder::decode(&raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                aggregator.warn(format!("Unable to decode message {}: {}", message, e));
                continue;
            }
        };

        if !aggregator.observe(message, &decoded) {
            continue;
        }

        let Some(action) = cleanup else {
            continue;
        };

        match mailbox.discard(message, action).await {
            Ok(()) => aggregator.record_cleanup(),
            Err(e) => error!("Cleanup of redundant email {} failed: {}", message, e),
        }
    }

    let summary = aggregator.finish();
    for (country, count) in &summary.email_match_count {
        debug!("Total Emails Count: {}: {}", country, count);
    }
    for (country, count) in &summary.day_match_count {
        info!("Final Day Count: {}: {}", country, count);
    }

    Ok(summary)
}
