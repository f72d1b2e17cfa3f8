use attend_core::config::KioskConfig;
use attend_core::services::Ledger;
use chrono::{NaiveDate, Utc};

use crate::commands::common::{format_roster_lines, open_ledger, parse_date, roster_row, RosterRow};
use crate::error::CliError;

pub async fn run_roster(
    config: &KioskConfig,
    date: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let date = match date {
        Some(raw) => parse_date(raw)?,
        None => Utc::now().with_timezone(&config.tz()?).date_naive(),
    };
    let ledger = open_ledger(config).await?;
    let rows = roster_rows(&ledger, date).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if rows.is_empty() {
        println!("No staff synced yet. Run `attend sync` first.");
    } else {
        println!("Roster for {date}");
        for line in format_roster_lines(&rows) {
            println!("{line}");
        }
    }

    Ok(())
}

pub async fn roster_rows(ledger: &Ledger, date: NaiveDate) -> Result<Vec<RosterRow>, CliError> {
    let entries = ledger.roster_for(date).await?;
    Ok(entries.iter().map(roster_row).collect())
}
