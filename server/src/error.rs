// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::attendance::DutyState;

/// Business-rule rejections raised by the attendance, report and login
/// operations, plus a passthrough for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Invalid credentials")]
    Unauthorized,

    /// The requested clock action does not fit the user's derived state.
    #[error("{}", conflict_message(.0))]
    StateConflict(DutyState),

    #[error("Daily limit of {limit} clock events reached")]
    CapacityExceeded { limit: usize },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Not authorized")]
    Forbidden,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

fn conflict_message(current: &DutyState) -> &'static str {
    match current {
        DutyState::OnDuty => "User already in service",
        DutyState::OffDuty => "User not in service",
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.into())
    }
}
