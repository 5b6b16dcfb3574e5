// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Clock-in / clock-out rules.
//!
//! A user is either off duty or on duty. The state is never stored: it is
//! derived from the most recent attendance log every time it is needed.
use crate::database;
use crate::error::DomainError;

use anyhow::Context;
use chrono::{DateTime, NaiveTime, Utc};
use common::{AttendanceKind, AttendanceLog, LogOrigin};
use parking_lot::Mutex;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Maximum number of clock events per user per UTC calendar day.
pub const DAILY_EVENT_LIMIT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DutyState {
    OffDuty,
    OnDuty,
}

impl DutyState {
    /// State implied by the kind of the latest log, if any.
    pub fn from_last_kind(last: Option<AttendanceKind>) -> Self {
        match last {
            Some(AttendanceKind::ClockIn) => DutyState::OnDuty,
            Some(AttendanceKind::ClockOut) | None => DutyState::OffDuty,
        }
    }

    /// State implied by a log history in any order. The latest log is the one
    /// with the greatest timestamp; equal timestamps fall back to the id.
    pub fn from_history(logs: &[AttendanceLog]) -> Self {
        let last = logs
            .iter()
            .max_by_key(|log| (log.timestamp, log.id))
            .map(|log| log.kind);
        Self::from_last_kind(last)
    }
}

/// Decides whether `requested` is allowed. The daily cap is checked before
/// the state.
pub fn check_transition(
    requested: AttendanceKind,
    events_today: usize,
    current: DutyState,
) -> Result<(), DomainError> {
    if events_today >= DAILY_EVENT_LIMIT {
        return Err(DomainError::CapacityExceeded {
            limit: DAILY_EVENT_LIMIT,
        });
    }

    match (requested, current) {
        (AttendanceKind::ClockIn, DutyState::OffDuty) => Ok(()),
        (AttendanceKind::ClockOut, DutyState::OnDuty) => Ok(()),
        (_, current) => Err(DomainError::StateConflict(current)),
    }
}

/// Midnight UTC of the day containing `now`.
pub fn start_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// One async lock per user, so that the read-check-insert sequence of two
/// requests for the same user never interleaves. Entries only live while a
/// request for that user is in flight.
#[derive(Default)]
pub struct ClockLocks {
    users: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl ClockLocks {
    fn slot(&self, user_id: i64) -> ClockSlot<'_> {
        let lock = self.users.lock().entry(user_id).or_default().clone();
        ClockSlot {
            locks: self,
            user_id,
            lock,
        }
    }

    /// Number of users with a clock request in flight.
    pub fn tracked_users(&self) -> usize {
        self.users.lock().len()
    }
}

/// A claim on one user's lock. Dropping the last claim removes the entry.
struct ClockSlot<'a> {
    locks: &'a ClockLocks,
    user_id: i64,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl ClockSlot<'_> {
    async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for ClockSlot<'_> {
    fn drop(&mut self) {
        // Slots are only cloned out of the registry under its lock, so two
        // strong references here means the registry and this slot.
        let mut users = self.locks.users.lock();
        if Arc::strong_count(&self.lock) == 2 {
            users.remove(&self.user_id);
        }
    }
}

/// Appends a manual clock event for `user_id` at `now`, if the rules allow it.
pub async fn record_clock_event(
    pool: &SqlitePool,
    locks: &ClockLocks,
    user_id: i64,
    requested: AttendanceKind,
    now: DateTime<Utc>,
) -> Result<AttendanceLog, DomainError> {
    let slot = locks.slot(user_id);
    let _turn = slot.lock().await;

    let mut tx = database::begin_write(pool).await?;

    let events_today =
        database::count_logs_since(&mut *tx, user_id, start_of_utc_day(now)).await?;
    let last = database::last_log_kind(&mut *tx, user_id).await?;
    let current = DutyState::from_last_kind(last);
    debug!(
        "User {} requests {:?}: state={:?}, events today={}",
        user_id, requested, current, events_today
    );

    if let Err(rejection) = check_transition(requested, events_today, current) {
        error!("Rejected {:?} for user {}: {}", requested, user_id, rejection);
        return Err(rejection);
    }

    let record =
        database::insert_attendance_log(&mut *tx, user_id, requested, LogOrigin::Manual, now)
            .await?;

    tx.commit()
        .await
        .context("Failed to commit attendance log")?;

    info!(
        "Recorded {:?} for user {} (log {})",
        requested, user_id, record.id
    );
    Ok(record)
}

pub async fn clock_in(
    pool: &SqlitePool,
    locks: &ClockLocks,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<AttendanceLog, DomainError> {
    record_clock_event(pool, locks, user_id, AttendanceKind::ClockIn, now).await
}

pub async fn clock_out(
    pool: &SqlitePool,
    locks: &ClockLocks,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<AttendanceLog, DomainError> {
    record_clock_event(pool, locks, user_id, AttendanceKind::ClockOut, now).await
}

/// The user's logs since midnight UTC, oldest first.
pub async fn list_today(
    pool: &SqlitePool,
    user_id: i64,
    now: DateTime<Utc>,
) -> anyhow::Result<Vec<AttendanceLog>> {
    database::get_logs_since_from_db(pool, user_id, start_of_utc_day(now)).await
}
