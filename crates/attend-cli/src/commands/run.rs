use attend_core::config::KioskConfig;
use attend_core::orchestrator::{self, KioskEvent};
use tokio::sync::broadcast::error::RecvError;

use crate::commands::common::{build_services, open_ledger};
use crate::error::CliError;

/// Run the kiosk loop headless until Ctrl-C, printing what a display would show.
pub async fn run_kiosk(config: &KioskConfig) -> Result<(), CliError> {
    let ledger = open_ledger(config).await?;
    let services = build_services(config, ledger)?;
    let (handle, task) = orchestrator::spawn(services, config.sync_settings()).await;
    let mut events = handle.subscribe();

    if let Some(now) = handle.current_time() {
        println!("Kiosk started at {}", now.format("%Y-%m-%d %H:%M:%S %Z"));
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(line) = describe_event(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Kiosk event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.shutdown().await;
    if let Err(error) = task.await {
        tracing::error!("Kiosk loop ended abnormally: {error}");
    }
    Ok(())
}

/// Operator-facing line for an event; per-second ticks stay quiet.
pub fn describe_event(event: &KioskEvent) -> Option<String> {
    match event {
        KioskEvent::TimeTicked(_) => None,
        KioskEvent::TimeChanged(time) => {
            Some(format!("Clock set to {}", time.format("%Y-%m-%d %H:%M:%S %Z")))
        }
        KioskEvent::SyncCompleted(true) => Some("Sync completed".to_string()),
        KioskEvent::SyncCompleted(false) => Some("Sync incomplete".to_string()),
        KioskEvent::DateRolledOver(date) => Some(format!("New day: {date}")),
        KioskEvent::ConnectivityChanged(true) => Some("Network is back".to_string()),
        KioskEvent::ConnectivityChanged(false) => Some("Network lost".to_string()),
    }
}
