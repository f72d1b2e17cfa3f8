use attend_core::config::KioskConfig;
use attend_core::reconcile::{ReconcileReport, SyncReport};
use attend_core::SyncError;
use serde::Serialize;

use crate::commands::common::{build_services, open_ledger};
use crate::error::CliError;

/// One-shot sync: correct the clock, then reconcile every category whether
/// or not the clock could be corrected.
pub async fn run_sync(config: &KioskConfig, as_json: bool) -> Result<(), CliError> {
    let ledger = open_ledger(config).await?;
    let mut services = build_services(config, ledger)?;

    services.clock.seed_from_system();
    let synced_time = services.clock.sync_with_ntp(&services.resolver).await;
    let report = services.reconciler.reconcile_all().await;
    let summary = SyncSummary::new(synced_time.map(|time| time.to_rfc3339()), &report);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for line in format_sync_lines(&summary) {
            println!("{line}");
        }
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryOutcome {
    pub category: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ReconcileReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CategoryOutcome {
    fn new(category: &'static str, outcome: &Result<ReconcileReport, SyncError>) -> Self {
        match outcome {
            Ok(report) => Self {
                category,
                report: Some(*report),
                error: None,
            },
            Err(error) => Self {
                category,
                report: None,
                error: Some(error.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Kiosk time after an NTP correction; `None` when the clock stayed on the host time.
    pub time_synced: Option<String>,
    pub data_synced: bool,
    pub categories: Vec<CategoryOutcome>,
}

impl SyncSummary {
    pub fn new(time_synced: Option<String>, report: &SyncReport) -> Self {
        Self {
            time_synced,
            data_synced: report.succeeded(),
            categories: vec![
                CategoryOutcome::new("staff", &report.staff),
                CategoryOutcome::new("weekly schedule", &report.weekly_schedule),
                CategoryOutcome::new("date overrides", &report.date_overrides),
            ],
        }
    }
}

pub fn format_sync_lines(summary: &SyncSummary) -> Vec<String> {
    let mut lines = Vec::with_capacity(summary.categories.len() + 1);
    lines.push(summary.time_synced.as_ref().map_or_else(
        || "Time: NTP unavailable, using host clock".to_string(),
        |time| format!("Time: synced to {time}"),
    ));
    for outcome in &summary.categories {
        let line = match (&outcome.report, &outcome.error) {
            (Some(report), _) => format!(
                "{}: {} inserted, {} updated, {} deleted, {} unchanged",
                outcome.category, report.inserted, report.updated, report.deleted, report.unchanged
            ),
            (None, Some(error)) => format!("{}: failed ({error})", outcome.category),
            (None, None) => format!("{}: skipped", outcome.category),
        };
        lines.push(line);
    }
    lines
}
