//! Day presence: aggregation of location pings and reconciliation with the days API

pub mod aggregator;
pub mod model;
pub mod reconciler;
pub mod scanner;

pub use aggregator::{aggregate, DayAggregator};
pub use model::{DayKey, PresenceRecord, ScanSummary};
pub use reconciler::{plan, reconcile, DayAction, ReconcileReport, AUTO_UPDATE_NOTE};
pub use scanner::{run_scan, ScanSource, Scanner};
