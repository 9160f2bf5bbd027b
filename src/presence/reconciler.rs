use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::days_api::{DayStore, RemoteDay};
use crate::error::StoreError;
use super::model::{DayKey, PresenceRecord, ScanSummary};

/// Note written on every record created or changed from the mailbox
pub const AUTO_UPDATE_NOTE: &str = "[auto-updated from email]";

#[derive(Debug, Clone, PartialEq)]
pub enum DayAction {
    /// No remote record yet
    Create(RemoteDay),
    /// Remote record missing at least one locally observed presence
    Merge(RemoteDay),
    Unchanged,
}

/// Decides how a local record lands on the remote one.
///
/// Merging only ever raises flags: a country missing locally may have been set by hand
/// on the remote side, so it is left as is.
pub fn plan(local: &PresenceRecord, remote: Option<RemoteDay>) -> DayAction {
    let Some(mut remote) = remote else {
        let mut created = RemoteDay::new(local.day);
        for (country, present) in &local.countries {
            created.set_flag(country, *present);
        }
        created.note = AUTO_UPDATE_NOTE.to_string();
        return DayAction::Create(created);
    };

    let missing: Vec<&String> = local.countries
        .iter()
        .filter(|(country, present)| **present && !remote.flag(country))
        .map(|(country, _)| country)
        .collect();

    if missing.is_empty() {
        return DayAction::Unchanged;
    }

    for country in missing {
        remote.set_flag(country, true);
    }
    remote.note = if remote.note.is_empty() {
        AUTO_UPDATE_NOTE.to_string()
    } else {
        format!("{} {}", AUTO_UPDATE_NOTE, remote.note)
    };

    DayAction::Merge(remote)
}

#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub created: usize,
    pub merged: usize,
    pub unchanged: usize,
    pub failures: Vec<(DayKey, StoreError)>,
}

impl ReconcileReport {
    /// Number of upserts that went through
    pub fn applied(&self) -> usize {
        self.created + self.merged
    }
}

/// Pushes every day of a scan to the store. A failing day is recorded and skipped;
/// cancellation stops before the next day and returns what was done so far.
pub async fn reconcile<S>(summary: &ScanSummary, store: &S, cancel: &CancellationToken) -> ReconcileReport
where
    S: DayStore + ?Sized,
{
    let mut report = ReconcileReport::default();

    for (day, local) in &summary.records {
        if cancel.is_cancelled() {
            info!("Reconciliation cancelled after {} update(s)", report.applied());
            break;
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = reconcile_day(local, store) => outcome,
        };

        match outcome {
            Ok(DayAction::Create(_)) => {
                report.created += 1;
                info!("Created day {}: {:?}", day, local.countries);
            }
            Ok(DayAction::Merge(_)) => {
                report.merged += 1;
                info!("Updated day {}: {:?}", day, local.countries);
            }
            Ok(DayAction::Unchanged) => {
                report.unchanged += 1;
                debug!("No updates needed for day {}", day);
            }
            Err(e) => {
                warn!("Reconciling day {} failed: {}", day, e);
                report.failures.push((*day, e));
            }
        }
    }

    report
}

async fn reconcile_day<S>(local: &PresenceRecord, store: &S) -> Result<DayAction, StoreError>
where
    S: DayStore + ?Sized,
{
    let remote = store.get_day(local.day).await?;
    let action = plan(local, remote);

    if let DayAction::Create(day) | DayAction::Merge(day) = &action {
        store.upsert_day(day).await?;
    }

    Ok(action)
}
