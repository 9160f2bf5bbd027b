use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Calendar day in the configured time zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayKey(pub NaiveDate);

impl DayKey {
    pub fn from_timestamp(timestamp: DateTime<Utc>, zone: &Tz) -> Self {
        DayKey(timestamp.with_timezone(zone).date_naive())
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Presence flags for one day, one entry per tracked country
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceRecord {
    pub day: DayKey,
    pub countries: BTreeMap<String, bool>,
}

impl PresenceRecord {
    pub fn new(day: DayKey, countries: &[String]) -> Self {
        PresenceRecord {
            day,
            countries: countries.iter().map(|c| (c.clone(), false)).collect(),
        }
    }

    pub fn is_present(&self, country: &str) -> bool {
        self.countries.get(country).copied().unwrap_or(false)
    }
}

/// Result of one mailbox scan
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub email_match_count: BTreeMap<String, usize>,
    pub day_match_count: BTreeMap<String, usize>,
    pub records: BTreeMap<DayKey, PresenceRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub cleaned_up: usize,
}

impl ScanSummary {
    pub fn new(countries: &[String]) -> Self {
        ScanSummary {
            email_match_count: countries.iter().map(|c| (c.clone(), 0)).collect(),
            day_match_count: countries.iter().map(|c| (c.clone(), 0)).collect(),
            ..Default::default()
        }
    }
}
