// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Demo data for local runs.
use crate::database;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate, NaiveTime};
use common::{AttendanceKind, Client, LogOrigin, Project, User};
use sqlx::SqlitePool;
use tracing::info;

pub const DEMO_EMAIL: &str = "demo@punchclock.local";
pub const DEMO_SECRET: &str = "Demo2026!";
const DEMO_NAME: &str = "Demo Admin";

const CLIENTS: [&str; 3] = ["Northwind Health", "City of Riverton", "Apex Motors"];

/// Project name and index into `CLIENTS`.
const PROJECTS: [(&str, usize); 4] = [
    ("Dashboard Development", 0),
    ("Cloud Migration", 0),
    ("On-Site Support", 1),
    ("Security Consulting", 2),
];

/// Days of attendance history generated by the full seed, today included.
const HISTORY_DAYS: u64 = 5;

/// Creates the demo user, clients, projects and a week of attendance, unless
/// the database already has users. Returns whether anything was written.
pub async fn seed_full(pool: &SqlitePool, today: NaiveDate) -> Result<bool> {
    if database::count_users(pool).await? > 0 {
        info!("Data already seeded.");
        return Ok(false);
    }

    info!("Seeding data...");
    let user =
        database::create_user_in_db(pool, DEMO_EMAIL, DEMO_SECRET, DEMO_NAME, "admin").await?;

    let mut clients = Vec::with_capacity(CLIENTS.len());
    for name in CLIENTS {
        clients.push(database::create_client_in_db(pool, name).await?);
    }
    for (name, client) in PROJECTS {
        database::create_project_in_db(pool, name, Some(clients[client].id)).await?;
    }

    let clock_in = NaiveTime::from_hms_opt(8, 30, 0).context("Invalid shift start")?;
    let clock_out = NaiveTime::from_hms_opt(17, 0, 0).context("Invalid shift end")?;
    for back in 0..HISTORY_DAYS {
        let day = today
            .checked_sub_days(Days::new(back))
            .context("Seed history runs before the calendar start")?;
        for (time, kind) in [
            (clock_in, AttendanceKind::ClockIn),
            (clock_out, AttendanceKind::ClockOut),
        ] {
            let timestamp = day.and_time(time).and_utc();
            database::insert_attendance_log(pool, user.id, kind, LogOrigin::Automatic, timestamp)
                .await?;
        }
    }

    info!("Seeding complete.");
    Ok(true)
}

/// Ensures the demo user, clients and projects exist, matching by name.
/// Attendance is left untouched. Safe to run repeatedly.
pub async fn seed_minimal(pool: &SqlitePool) -> Result<()> {
    info!("Seeding minimal data...");
    ensure_demo_user(pool).await?;

    let mut clients = Vec::with_capacity(CLIENTS.len());
    for name in CLIENTS {
        clients.push(ensure_client(pool, name).await?);
    }
    for (name, client) in PROJECTS {
        ensure_project(pool, name, &clients[client]).await?;
    }

    info!("Minimal seeding complete.");
    Ok(())
}

async fn ensure_demo_user(pool: &SqlitePool) -> Result<User> {
    match database::find_user_by_email(pool, DEMO_EMAIL).await? {
        Some(user) => Ok(user),
        None => {
            database::create_user_in_db(pool, DEMO_EMAIL, DEMO_SECRET, DEMO_NAME, "admin").await
        }
    }
}

async fn ensure_client(pool: &SqlitePool, name: &str) -> Result<Client> {
    match database::find_client_by_name(pool, name).await? {
        Some(client) => Ok(client),
        None => database::create_client_in_db(pool, name).await,
    }
}

async fn ensure_project(pool: &SqlitePool, name: &str, client: &Client) -> Result<Project> {
    match database::find_project_by_name(pool, name).await? {
        Some(project) => Ok(project),
        None => database::create_project_in_db(pool, name, Some(client.id)).await,
    }
}
