//! HTTP implementation of [`RemoteDirectory`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::wire::{convert_all, Envelope, RemoteDateOverride, RemoteStaff, RemoteWeeklySchedule};
use super::{RemoteDirectory, RemoteError, RemoteResult};
use crate::models::{DateOverrideEntry, StaffRecord, WeeklyScheduleEntry};
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// URLs of the three collection endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoints {
    pub staff_url: String,
    pub weekly_schedule_url: String,
    pub date_overrides_url: String,
}

#[derive(Clone)]
pub struct HttpDirectory {
    endpoints: RemoteEndpoints,
    client: reqwest::Client,
}

impl HttpDirectory {
    /// Build a directory whose requests give up after `timeout`.
    pub fn new(endpoints: RemoteEndpoints, timeout: Duration) -> RemoteResult<Self> {
        let endpoints = RemoteEndpoints {
            staff_url: normalize_endpoint(endpoints.staff_url)?,
            weekly_schedule_url: normalize_endpoint(endpoints.weekly_schedule_url)?,
            date_overrides_url: normalize_endpoint(endpoints.date_overrides_url)?,
        };
        Ok(Self {
            endpoints,
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    pub const fn endpoints(&self) -> &RemoteEndpoints {
        &self.endpoints
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &str) -> RemoteResult<Vec<T>> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Api(parse_api_error(status, &body)));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|err| RemoteError::InvalidPayload(err.to_string()))?;
        envelope.into_records()
    }
}

#[async_trait]
impl RemoteDirectory for HttpDirectory {
    async fn fetch_staff(&self) -> RemoteResult<Vec<StaffRecord>> {
        let records = self
            .fetch::<RemoteStaff>(&self.endpoints.staff_url)
            .await?;
        convert_all(records)
    }

    async fn fetch_weekly_schedule(&self) -> RemoteResult<Vec<WeeklyScheduleEntry>> {
        let records = self
            .fetch::<RemoteWeeklySchedule>(&self.endpoints.weekly_schedule_url)
            .await?;
        convert_all(records)
    }

    async fn fetch_date_overrides(&self) -> RemoteResult<Vec<DateOverrideEntry>> {
        let records = self
            .fetch::<RemoteDateOverride>(&self.endpoints.date_overrides_url)
            .await?;
        convert_all(records)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", compact_text(&message), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_endpoint(raw: String) -> RemoteResult<String> {
    let endpoint = normalize_text_option(Some(raw)).ok_or_else(|| {
        RemoteError::InvalidConfiguration("endpoint must not be empty".to_string())
    })?;
    if is_http_url(&endpoint) {
        Ok(endpoint)
    } else {
        Err(RemoteError::InvalidConfiguration(format!(
            "endpoint must include http:// or https://: {endpoint}"
        )))
    }
}
