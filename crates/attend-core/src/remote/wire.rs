//! Wire format of the remote API.

use chrono::{NaiveDate, NaiveTime};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use super::{RemoteError, RemoteResult};
use crate::models::{DateOverrideEntry, StaffId, StaffRecord, WeeklyScheduleEntry};
use crate::util::{compact_text, normalize_text_option, parse_time_of_day, DATE_FORMAT};

const SUCCESS: &str = "success";

#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub status: String,
    pub data: Option<Vec<T>>,
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    /// Records of a successful response; anything else is an API error.
    pub fn into_records(self) -> RemoteResult<Vec<T>> {
        if !self.status.trim().eq_ignore_ascii_case(SUCCESS) {
            let message = normalize_text_option(self.message)
                .unwrap_or_else(|| "no message provided".to_string());
            return Err(RemoteError::Api(format!(
                "status '{}': {}",
                compact_text(&self.status),
                compact_text(&message)
            )));
        }

        self.data
            .ok_or_else(|| RemoteError::InvalidPayload("response did not include data".to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct RemoteStaff {
    #[serde(deserialize_with = "flexible_int")]
    pub staff_id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemoteWeeklySchedule {
    #[serde(deserialize_with = "flexible_int")]
    pub staff_id: i64,
    #[serde(deserialize_with = "flexible_int")]
    pub work_day: i64,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default, deserialize_with = "flexible_flag")]
    pub day_off: bool,
    #[serde(default, deserialize_with = "flexible_flag")]
    pub open_schedule: bool,
}

#[derive(Debug, Deserialize)]
pub struct RemoteDateOverride {
    #[serde(deserialize_with = "flexible_int")]
    pub staff_id: i64,
    pub date: String,
    #[serde(default)]
    pub scheduled_in: Option<String>,
    #[serde(default)]
    pub scheduled_out: Option<String>,
    #[serde(default, deserialize_with = "flexible_flag")]
    pub day_off: bool,
    #[serde(default, deserialize_with = "flexible_optional_int")]
    pub reason_id: Option<i64>,
    #[serde(default, deserialize_with = "flexible_flag")]
    pub open_schedule: bool,
}

impl TryFrom<RemoteStaff> for StaffRecord {
    type Error = RemoteError;

    fn try_from(value: RemoteStaff) -> RemoteResult<Self> {
        let first_name = normalize_text_option(Some(value.first_name)).ok_or_else(|| {
            RemoteError::InvalidPayload(format!("staff {} has no first name", value.staff_id))
        })?;
        Ok(Self::new(
            value.staff_id,
            first_name,
            normalize_text_option(value.last_name).unwrap_or_default(),
        ))
    }
}

impl TryFrom<RemoteWeeklySchedule> for WeeklyScheduleEntry {
    type Error = RemoteError;

    fn try_from(value: RemoteWeeklySchedule) -> RemoteResult<Self> {
        let day_of_week = u8::try_from(value.work_day)
            .ok()
            .filter(|day| *day <= 6)
            .ok_or_else(|| {
                RemoteError::InvalidPayload(format!(
                    "staff {} has invalid work day {}",
                    value.staff_id, value.work_day
                ))
            })?;

        // Hours are ignored, not validated, when the constructor will drop them.
        let has_hours = !value.day_off && !value.open_schedule;
        let (scheduled_in, scheduled_out) = if has_hours {
            (
                time_field(value.start_time, "start_time")?,
                time_field(value.end_time, "end_time")?,
            )
        } else {
            (None, None)
        };

        Ok(Self::new(
            StaffId::new(value.staff_id),
            day_of_week,
            scheduled_in,
            scheduled_out,
            value.day_off,
            value.open_schedule,
        ))
    }
}

impl TryFrom<RemoteDateOverride> for DateOverrideEntry {
    type Error = RemoteError;

    fn try_from(value: RemoteDateOverride) -> RemoteResult<Self> {
        let date = NaiveDate::parse_from_str(value.date.trim(), DATE_FORMAT).map_err(|_| {
            RemoteError::InvalidPayload(format!(
                "staff {} has invalid override date '{}'",
                value.staff_id,
                compact_text(&value.date)
            ))
        })?;

        let has_hours = !value.day_off && !value.open_schedule;
        let (scheduled_in, scheduled_out) = if has_hours {
            (
                time_field(value.scheduled_in, "scheduled_in")?,
                time_field(value.scheduled_out, "scheduled_out")?,
            )
        } else {
            (None, None)
        };

        Ok(Self::new(
            StaffId::new(value.staff_id),
            date,
            scheduled_in,
            scheduled_out,
            value.day_off,
            value.open_schedule,
            value.reason_id,
        ))
    }
}

/// Convert a whole collection, failing on the first bad record.
pub fn convert_all<R, M>(records: Vec<R>) -> RemoteResult<Vec<M>>
where
    M: TryFrom<R, Error = RemoteError>,
{
    records.into_iter().map(M::try_from).collect()
}

fn time_field(value: Option<String>, field: &str) -> RemoteResult<Option<NaiveTime>> {
    match normalize_text_option(value) {
        None => Ok(None),
        Some(text) => parse_time_of_day(&text).map(Some).ok_or_else(|| {
            RemoteError::InvalidPayload(format!("invalid {field} '{}'", compact_text(&text)))
        }),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Loose {
    fn as_int(&self) -> Option<i64> {
        match self {
            Self::Bool(value) => Some(i64::from(*value)),
            Self::Int(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }
}

fn flexible_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Loose::deserialize(deserializer)?;
    value
        .as_int()
        .ok_or_else(|| D::Error::custom("expected an integer or numeric string"))
}

fn flexible_optional_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Loose>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Loose::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(value) => value
            .as_int()
            .map(Some)
            .ok_or_else(|| D::Error::custom("expected an integer or numeric string")),
    }
}

fn flexible_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Loose>::deserialize(deserializer)? {
        None => Ok(false),
        Some(Loose::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "false" => Ok(false),
            "1" | "true" => Ok(true),
            other => Err(D::Error::custom(format!("invalid flag '{other}'"))),
        },
        Some(value) => value
            .as_int()
            .map(|flag| flag != 0)
            .ok_or_else(|| D::Error::custom("invalid flag")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Envelope<T> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn staff_ids_may_arrive_as_strings() {
        let envelope: Envelope<RemoteStaff> = parse(json!({
            "status": "success",
            "data": [
                {"staff_id": "7", "first_name": " Rana ", "last_name": "Haddad"},
                {"staff_id": 8, "first_name": "Omar", "last_name": null}
            ]
        }));

        let staff: Vec<StaffRecord> = convert_all(envelope.into_records().unwrap()).unwrap();
        assert_eq!(
            staff,
            vec![
                StaffRecord::new(7, "Rana", "Haddad"),
                StaffRecord::new(8, "Omar", ""),
            ]
        );
    }

    #[test]
    fn non_success_status_is_an_api_error() {
        let envelope: Envelope<RemoteStaff> = parse(json!({
            "status": "error",
            "message": "database offline"
        }));
        match envelope.into_records() {
            Err(RemoteError::Api(message)) => assert!(message.contains("database offline")),
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[test]
    fn success_without_data_is_invalid() {
        let envelope: Envelope<RemoteStaff> = parse(json!({"status": "success"}));
        assert!(matches!(
            envelope.into_records(),
            Err(RemoteError::InvalidPayload(_))
        ));
    }

    #[test]
    fn failure_without_message_or_data_still_parses() {
        let envelope: Envelope<RemoteWeeklySchedule> = parse(json!({"status": "fail"}));
        match envelope.into_records() {
            Err(RemoteError::Api(message)) => {
                assert_eq!(message, "status 'fail': no message provided");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[test]
    fn weekly_day_off_drops_hours_and_flags_parse_loosely() {
        let envelope: Envelope<RemoteWeeklySchedule> = parse(json!({
            "status": "success",
            "data": [
                {"staff_id": 1, "work_day": "0", "start_time": "09:00:00",
                 "end_time": "17:00:00", "day_off": "0", "open_schedule": 0},
                {"staff_id": 1, "work_day": 6, "start_time": "09:00:00",
                 "end_time": "garbage", "day_off": 1, "open_schedule": "0"}
            ]
        }));
        let entries: Vec<WeeklyScheduleEntry> =
            convert_all(envelope.into_records().unwrap()).unwrap();

        assert_eq!(entries[0].scheduled_in, NaiveTime::from_hms_opt(9, 0, 0));
        assert!(!entries[0].day_off);
        assert!(entries[1].day_off);
        assert_eq!(entries[1].scheduled_in, None);
        assert_eq!(entries[1].scheduled_out, None);
    }

    #[test]
    fn weekly_rejects_out_of_range_day() {
        let envelope: Envelope<RemoteWeeklySchedule> = parse(json!({
            "status": "success",
            "data": [{"staff_id": 1, "work_day": 7, "day_off": 1, "open_schedule": 0}]
        }));
        let result: RemoteResult<Vec<WeeklyScheduleEntry>> =
            convert_all(envelope.into_records().unwrap());
        assert!(matches!(result, Err(RemoteError::InvalidPayload(_))));
    }

    #[test]
    fn override_parses_optional_reason_and_rejects_bad_times() {
        let envelope: Envelope<RemoteDateOverride> = parse(json!({
            "status": "success",
            "data": [
                {"staff_id": 2, "date": "2024-05-06", "scheduled_in": "10:00",
                 "scheduled_out": null, "day_off": 0, "open_schedule": 0, "reason_id": "3"},
                {"staff_id": 3, "date": "2024-05-06", "day_off": "0", "open_schedule": "1",
                 "reason_id": ""}
            ]
        }));
        let entries: Vec<DateOverrideEntry> =
            convert_all(envelope.into_records().unwrap()).unwrap();
        assert_eq!(entries[0].scheduled_in, NaiveTime::from_hms_opt(10, 0, 0));
        assert_eq!(entries[0].reason_id, Some(3));
        assert!(entries[1].open_schedule);
        assert_eq!(entries[1].reason_id, None);

        let bad: Envelope<RemoteDateOverride> = parse(json!({
            "status": "success",
            "data": [{"staff_id": 2, "date": "2024-05-06", "scheduled_in": "9am",
                      "day_off": 0, "open_schedule": 0}]
        }));
        let result: RemoteResult<Vec<DateOverrideEntry>> = convert_all(bad.into_records().unwrap());
        assert!(matches!(result, Err(RemoteError::InvalidPayload(_))));
    }

    #[test]
    fn flags_reject_unknown_text() {
        let result = serde_json::from_value::<RemoteWeeklySchedule>(json!({
            "staff_id": 1, "work_day": 0, "day_off": "maybe", "open_schedule": 0
        }));
        assert!(result.is_err());
    }
}
