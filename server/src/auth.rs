// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::database;
use crate::error::DomainError;

use common::LoginResponse;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Checks an email/secret pair. The returned token is simply the user id.
pub async fn authenticate(
    pool: &SqlitePool,
    email: &str,
    password: &str,
) -> Result<LoginResponse, DomainError> {
    debug!("Login attempt for {}", email);

    match database::find_user_by_email(pool, email).await? {
        Some(user) if user.secret == password => {
            info!("User {} logged in.", user.id);
            Ok(LoginResponse {
                token: user.id.to_string(),
                user_name: user.full_name,
                user_id: user.id,
            })
        }
        _ => Err(DomainError::Unauthorized),
    }
}
