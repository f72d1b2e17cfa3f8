use attend_core::config::KioskConfig;
use attend_core::models::AttendanceEvent;
use attend_core::services::Ledger;
use attend_core::util::display_time_of_day;
use attend_core::StaffId;
use chrono::DateTime;
use chrono_tz::Tz;

use crate::commands::common::{open_ledger, parse_staff_id, resolve_now};
use crate::error::CliError;

pub async fn run_clock_in(config: &KioskConfig, raw_staff_id: &str) -> Result<(), CliError> {
    let staff_id = parse_staff_id(raw_staff_id)?;
    let ledger = open_ledger(config).await?;
    let now = resolve_now(config).await?;

    let event = clock_in_at(&ledger, staff_id, now).await?;
    if let Some(work_in) = event.work_in {
        println!("Staff {staff_id} clocked in at {}", display_time_of_day(work_in));
    }
    Ok(())
}

pub async fn run_clock_off(config: &KioskConfig, raw_staff_id: &str) -> Result<(), CliError> {
    let staff_id = parse_staff_id(raw_staff_id)?;
    let ledger = open_ledger(config).await?;
    let now = resolve_now(config).await?;

    let event = clock_off_at(&ledger, staff_id, now).await?;
    if let (Some(work_off), Some(hours)) = (event.work_off, event.hours_worked) {
        println!(
            "Staff {staff_id} clocked off at {} ({hours:.2} hours)",
            display_time_of_day(work_off)
        );
    }
    Ok(())
}

pub async fn clock_in_at(
    ledger: &Ledger,
    staff_id: StaffId,
    now: DateTime<Tz>,
) -> Result<AttendanceEvent, CliError> {
    Ok(ledger.clock_in(staff_id, now.naive_local()).await?)
}

/// Close the open shift the way the kiosk table does: with the clock-in
/// shown on today's row, or yesterday's for a night shift.
pub async fn clock_off_at(
    ledger: &Ledger,
    staff_id: StaffId,
    now: DateTime<Tz>,
) -> Result<AttendanceEvent, CliError> {
    let today = now.date_naive();
    let mut work_in = ledger
        .attendance_for(staff_id, today)
        .await?
        .and_then(|event| event.work_in);
    if work_in.is_none() {
        if let Some(yesterday) = today.pred_opt() {
            work_in = ledger
                .attendance_for(staff_id, yesterday)
                .await?
                .filter(AttendanceEvent::is_open)
                .and_then(|event| event.work_in);
        }
    }

    Ok(ledger
        .clock_off(staff_id, work_in, now.naive_local())
        .await?)
}
