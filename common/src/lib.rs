// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A person who can log in, clock in/out and file work reports.
///
/// The credential secret is read from the database for the login check but is
/// never written back out in a response.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub secret: String,
    pub full_name: String,
    pub role: String,
}

/// A customer that owns projects. Names are not unique.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Client {
    pub id: i64,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub client_id: Option<i64>,
}

/// Direction of an attendance event.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
pub enum AttendanceKind {
    /// Start of a shift.
    #[serde(rename = "ENTRATA")]
    #[sqlx(rename = "ENTRATA")]
    ClockIn,
    /// End of a shift.
    #[serde(rename = "USCITA")]
    #[sqlx(rename = "USCITA")]
    ClockOut,
}

/// Where an attendance event came from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
pub enum LogOrigin {
    /// Submitted by the user through the clock endpoints.
    #[serde(rename = "Manuale")]
    #[sqlx(rename = "Manuale")]
    Manual,
    /// Imported or generated (e.g. by seeding).
    #[serde(rename = "Automatica")]
    #[sqlx(rename = "Automatica")]
    Automatic,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
pub enum LogStatus {
    #[serde(rename = "Autorizzata")]
    #[sqlx(rename = "Autorizzata")]
    Authorized,
}

/// One clock event. Rows are append-only.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct AttendanceLog {
    pub id: i64,
    pub user_id: i64,
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "type")]
    #[sqlx(rename = "log_type")]
    pub kind: AttendanceKind,

    pub origin: LogOrigin,
    pub status: LogStatus,
}

/// Hours a user spent on a project on a given day.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct WorkReport {
    pub id: i64,
    pub user_id: i64,
    pub project_id: i64,

    // Only the day matters, so no timezone.
    #[sqlx(rename = "report_date")]
    #[serde(deserialize_with = "deserialize_report_date")]
    pub date: NaiveDate,

    pub hours: f64,
    pub description: String,
}

/// Body of `POST /reports`. The owning user comes from the query string.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateReportPayload {
    pub project_id: i64,
    #[serde(deserialize_with = "deserialize_report_date")]
    pub date: NaiveDate,
    pub hours: f64,
    pub description: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

/// Returned on a successful login. The token is the user id rendered as a string.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoginResponse {
    pub token: String,
    pub user_name: String,
    pub user_id: i64,
}

/// Result of a clock-in or clock-out.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClockResponse {
    pub success: bool,
    pub record: Option<AttendanceLog>,
    pub message: String,
}

/// The `?user_id=` query parameter identifying the caller. Falls back to
/// user 1 when absent.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct UserQuery {
    #[serde(default = "default_user_id")]
    pub user_id: i64,
}

fn default_user_id() -> i64 {
    1
}

/// Reads a report date from either a plain date (`2024-01-01`) or a date and
/// time (`2024-01-01T09:00:00`, with or without an offset). The time is
/// dropped.
pub fn parse_report_date(raw: &str) -> Option<NaiveDate> {
    raw.parse::<NaiveDate>()
        .ok()
        .or_else(|| raw.parse::<NaiveDateTime>().ok().map(|dt| dt.date()))
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

fn deserialize_report_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_report_date(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("invalid report date `{}`", raw))
    })
}
