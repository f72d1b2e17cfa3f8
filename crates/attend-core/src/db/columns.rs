//! Column conversions shared by the repositories.
//!
//! Dates and times of day are stored as text so the file stays readable by
//! other tools.

use chrono::{NaiveDate, NaiveTime};
use rusqlite::types::Type;
use rusqlite::Row;

use crate::util::{format_time_of_day, parse_time_of_day, DATE_FORMAT};

pub fn date_to_sql(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn time_to_sql(time: Option<NaiveTime>) -> Option<String> {
    time.map(format_time_of_day)
}

pub fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

pub fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveTime>> {
    let raw: Option<String> = row.get(idx)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_time_of_day(value).map(Some).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                Type::Text,
                format!("invalid time of day '{value}'").into(),
            )
        }),
    }
}

pub fn flag_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<bool> {
    Ok(row.get::<_, i64>(idx)? != 0)
}
