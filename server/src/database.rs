// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::error::DomainError;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::{
    AttendanceKind, AttendanceLog, Client, CreateReportPayload, LogOrigin, LogStatus, Project,
    User, WorkReport,
};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{migrate::MigrateDatabase, Executor, Sqlite, SqlitePool, Transaction};
use std::path::Path;
use tracing::{debug, info};

/// Table definitions, in foreign-key dependency order.
const SCHEMA: [&str; 6] = [
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        secret TEXT NOT NULL,
        full_name TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'user'
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS clients (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        client_id INTEGER NULL REFERENCES clients(id)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attendance_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id),
        timestamp TIMESTAMP NOT NULL,
        log_type TEXT NOT NULL CHECK (log_type IN ('ENTRATA', 'USCITA')),
        origin TEXT NOT NULL DEFAULT 'Manuale',
        status TEXT NOT NULL DEFAULT 'Autorizzata'
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_attendance_logs_user_time
        ON attendance_logs (user_id, timestamp);
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS work_reports (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id),
        project_id INTEGER NOT NULL REFERENCES projects(id),
        report_date DATE NOT NULL,
        hours REAL NOT NULL,
        description TEXT NOT NULL
    );
    "#,
];

/// Establishes the database connection pool.
/// If the database (or its directory) does not exist, it creates it.
/// It also ensures every table has the correct schema.
pub async fn establish_connection_pool(database_url: &str) -> Result<SqlitePool> {
    if let Some(dir) = database_dir(database_url) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
    }

    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        info!("Creating database {}", database_url);
        Sqlite::create_database(database_url)
            .await
            .context("Failed to create database")?;
    } else {
        info!("Database already exists.");
    }

    let pool = SqlitePool::connect(database_url)
        .await
        .context("Failed to connect to database")?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Directory holding the database file of a `sqlite:` URL, if it has one.
fn database_dir(database_url: &str) -> Option<&Path> {
    let location = database_url
        .trim_start_matches("sqlite:")
        .trim_start_matches("//");
    let file = location.split('?').next().unwrap_or_default();
    if file.is_empty() || file.starts_with(":memory:") {
        return None;
    }
    Path::new(file)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
}

/// Opens a private in-memory database with the full schema.
///
/// The pool holds a single connection: every connection to `sqlite::memory:`
/// gets its own empty database.
pub async fn in_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .context("Failed to open in-memory database")?;

    create_schema(&pool).await?;

    Ok(pool)
}

pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Failed to create schema")?;
    }

    info!("Database schema is ready.");
    Ok(())
}

// --- Users ---

pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to look up user by email")?;

    Ok(user)
}

pub async fn count_users(pool: &SqlitePool) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")
}

pub async fn create_user_in_db(
    pool: &SqlitePool,
    email: &str,
    secret: &str,
    full_name: &str,
    role: &str,
) -> Result<User> {
    debug!("Inserting user email={}, role={}", email, role);

    let id = sqlx::query("INSERT INTO users (email, secret, full_name, role) VALUES (?, ?, ?, ?)")
        .bind(email)
        .bind(secret)
        .bind(full_name)
        .bind(role)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to insert user {}", email))?
        .last_insert_rowid();

    Ok(User {
        id,
        email: email.to_string(),
        secret: secret.to_string(),
        full_name: full_name.to_string(),
        role: role.to_string(),
    })
}

// --- Clients & projects ---

pub async fn list_clients_from_db(pool: &SqlitePool) -> Result<Vec<Client>> {
    sqlx::query_as::<_, Client>("SELECT * FROM clients ORDER BY id ASC")
        .fetch_all(pool)
        .await
        .context("Failed to retrieve clients from DB")
}

pub async fn find_client_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Client>> {
    sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE name = ? ORDER BY id ASC LIMIT 1")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to look up client by name")
}

pub async fn create_client_in_db(pool: &SqlitePool, name: &str) -> Result<Client> {
    let id = sqlx::query("INSERT INTO clients (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await
        .context("Failed to insert client into DB")?
        .last_insert_rowid();

    Ok(Client {
        id,
        name: name.to_string(),
    })
}

pub async fn list_projects_from_db(pool: &SqlitePool) -> Result<Vec<Project>> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects ORDER BY id ASC")
        .fetch_all(pool)
        .await
        .context("Failed to retrieve projects from DB")
}

pub async fn find_project_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Project>> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE name = ? ORDER BY id ASC LIMIT 1")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to look up project by name")
}

pub async fn create_project_in_db(
    pool: &SqlitePool,
    name: &str,
    client_id: Option<i64>,
) -> Result<Project> {
    let id = sqlx::query("INSERT INTO projects (name, client_id) VALUES (?, ?)")
        .bind(name)
        .bind(client_id)
        .execute(pool)
        .await
        .context("Failed to insert project into DB")?
        .last_insert_rowid();

    Ok(Project {
        id,
        name: name.to_string(),
        client_id,
    })
}

// --- Attendance ---
//
// The attendance helpers take any executor so the clock operation can run them
// inside one transaction.

/// Opens a transaction that takes the write lock up front. A deferred
/// transaction that reads first and writes later fails with SQLITE_BUSY
/// instead of waiting when another connection commits in between.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>> {
    pool.begin_with("BEGIN IMMEDIATE")
        .await
        .context("Failed to open write transaction")
}

/// Counts a user's logs at or after `since`.
pub async fn count_logs_since<'e, E>(
    executor: E,
    user_id: i64,
    since: DateTime<Utc>,
) -> Result<usize>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM attendance_logs WHERE user_id = ? AND timestamp >= ?",
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(executor)
    .await
    .context("Failed to count attendance logs")?;

    Ok(count as usize)
}

/// Kind of the user's most recent log, ordered by timestamp then insertion.
pub async fn last_log_kind<'e, E>(executor: E, user_id: i64) -> Result<Option<AttendanceKind>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar(
        "SELECT log_type FROM attendance_logs WHERE user_id = ? \
         ORDER BY timestamp DESC, id DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .context("Failed to read last attendance log")
}

pub async fn insert_attendance_log<'e, E>(
    executor: E,
    user_id: i64,
    kind: AttendanceKind,
    origin: LogOrigin,
    timestamp: DateTime<Utc>,
) -> Result<AttendanceLog>
where
    E: Executor<'e, Database = Sqlite>,
{
    let status = LogStatus::Authorized;

    debug!(
        "Insert values: user_id={}, kind={:?}, origin={:?}, timestamp={}",
        user_id, kind, origin, timestamp
    );

    let id = sqlx::query(
        "INSERT INTO attendance_logs (user_id, timestamp, log_type, origin, status) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(timestamp)
    .bind(kind)
    .bind(origin)
    .bind(status)
    .execute(executor)
    .await
    .context("Failed to insert attendance log into DB")?
    .last_insert_rowid();

    Ok(AttendanceLog {
        id,
        user_id,
        timestamp,
        kind,
        origin,
        status,
    })
}

/// A user's logs at or after `since`, oldest first.
pub async fn get_logs_since_from_db(
    pool: &SqlitePool,
    user_id: i64,
    since: DateTime<Utc>,
) -> Result<Vec<AttendanceLog>> {
    sqlx::query_as::<_, AttendanceLog>(
        "SELECT * FROM attendance_logs WHERE user_id = ? AND timestamp >= ? \
         ORDER BY timestamp ASC, id ASC",
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve attendance logs from DB")
}

/// A user's whole log history, oldest first.
pub async fn get_all_logs_from_db(pool: &SqlitePool, user_id: i64) -> Result<Vec<AttendanceLog>> {
    sqlx::query_as::<_, AttendanceLog>(
        "SELECT * FROM attendance_logs WHERE user_id = ? ORDER BY timestamp ASC, id ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve attendance history from DB")
}

// --- Work reports ---

/// Retrieves a user's reports, newest date first.
pub async fn list_reports_from_db(pool: &SqlitePool, user_id: i64) -> Result<Vec<WorkReport>> {
    sqlx::query_as::<_, WorkReport>(
        "SELECT * FROM work_reports WHERE user_id = ? ORDER BY report_date DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve work reports from DB")
}

/// Inserts a new report. Hours and date are stored as given.
pub async fn create_report_in_db(
    pool: &SqlitePool,
    user_id: i64,
    payload: CreateReportPayload,
) -> Result<WorkReport> {
    debug!(
        "Insert values: user_id={}, project_id={}, date={}, hours={}, description={}",
        user_id, payload.project_id, payload.date, payload.hours, payload.description
    );

    let id = sqlx::query(
        "INSERT INTO work_reports (user_id, project_id, report_date, hours, description) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(payload.project_id)
    .bind(payload.date)
    .bind(payload.hours)
    .bind(&payload.description)
    .execute(pool)
    .await
    .context("Failed to insert work report into DB")?
    .last_insert_rowid();

    Ok(WorkReport {
        id,
        user_id,
        project_id: payload.project_id,
        date: payload.date,
        hours: payload.hours,
        description: payload.description,
    })
}

/// Deletes a report owned by `user_id`.
pub async fn delete_report_in_db(
    pool: &SqlitePool,
    report_id: i64,
    user_id: i64,
) -> Result<(), DomainError> {
    debug!(
        "Attempting to delete report {} on behalf of user {}",
        report_id, user_id
    );

    let mut tx = begin_write(pool).await?;

    let owner: Option<i64> = sqlx::query_scalar("SELECT user_id FROM work_reports WHERE id = ?")
        .bind(report_id)
        .fetch_optional(&mut *tx)
        .await
        .with_context(|| format!("Failed to look up report with ID: {}", report_id))?;

    match owner {
        None => return Err(DomainError::NotFound("Report")),
        Some(owner) if owner != user_id => return Err(DomainError::Forbidden),
        Some(_) => {}
    }

    sqlx::query("DELETE FROM work_reports WHERE id = ?")
        .bind(report_id)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to delete report with ID: {}", report_id))?;

    tx.commit()
        .await
        .context("Failed to commit report deletion")?;

    info!("Deleted report {} of user {}", report_id, user_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};

    async fn setup_test_db() -> (SqlitePool, User, Project) {
        let pool = in_memory_pool().await.unwrap();
        let user = create_user_in_db(&pool, "a@x.com", "p1", "Alice Example", "user")
            .await
            .unwrap();
        let client = create_client_in_db(&pool, "Client A").await.unwrap();
        let project = create_project_in_db(&pool, "Project A", Some(client.id))
            .await
            .unwrap();
        (pool, user, project)
    }

    fn report_on(project_id: i64, date: NaiveDate, description: &str) -> CreateReportPayload {
        CreateReportPayload {
            project_id,
            date,
            hours: 4.5,
            description: description.to_string(),
        }
    }

    #[tokio::test]
    async fn test_establish_connection_pool_creates_file_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("punchclock.db");
        let url = format!("sqlite://{}", db_path.display());

        let pool = establish_connection_pool(&url).await.unwrap();
        assert!(db_path.exists());

        // Schema creation is idempotent.
        create_schema(&pool).await.unwrap();
        assert_eq!(count_users(&pool).await.unwrap(), 0);
    }

    #[test]
    fn test_database_dir() {
        assert_eq!(
            database_dir("sqlite://database/punchclock.db"),
            Some(Path::new("database"))
        );
        assert_eq!(
            database_dir("sqlite:///var/lib/punchclock/data.db?mode=rwc"),
            Some(Path::new("/var/lib/punchclock"))
        );
        assert_eq!(database_dir("sqlite://punchclock.db"), None);
        assert_eq!(database_dir("sqlite::memory:"), None);
    }

    #[tokio::test]
    async fn test_find_user_by_email() {
        let (pool, user, _) = setup_test_db().await;

        let found = find_user_by_email(&pool, "a@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.secret, "p1");
        assert_eq!(found.role, "user");

        assert!(find_user_by_email(&pool, "nobody@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_client_names_are_allowed() {
        let (pool, _, _) = setup_test_db().await;
        create_client_in_db(&pool, "Client A").await.unwrap();

        let clients = list_clients_from_db(&pool).await.unwrap();
        assert_eq!(clients.len(), 2);
        assert!(clients.iter().all(|c| c.name == "Client A"));
    }

    #[tokio::test]
    async fn test_reports_listed_newest_date_first() {
        let (pool, user, project) = setup_test_db().await;
        let jan_1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let jan_3 = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let jan_2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        for (date, description) in [(jan_1, "first"), (jan_3, "third"), (jan_2, "second")] {
            create_report_in_db(&pool, user.id, report_on(project.id, date, description))
                .await
                .unwrap();
        }

        let reports = list_reports_from_db(&pool, user.id).await.unwrap();
        let order: Vec<&str> = reports.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(order, vec!["third", "second", "first"]);
        assert_eq!(reports[0].hours, 4.5);
    }

    #[tokio::test]
    async fn test_reports_are_scoped_to_user() {
        let (pool, user, project) = setup_test_db().await;
        let other = create_user_in_db(&pool, "b@x.com", "p2", "Bob", "user")
            .await
            .unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        create_report_in_db(&pool, other.id, report_on(project.id, date, "not mine"))
            .await
            .unwrap();

        assert!(list_reports_from_db(&pool, user.id).await.unwrap().is_empty());
        assert_eq!(list_reports_from_db(&pool, other.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_report_with_unknown_project_violates_foreign_key() {
        let (pool, user, _) = setup_test_db().await;
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let err = create_report_in_db(&pool, user.id, report_on(999, date, "orphan"))
            .await
            .unwrap_err();

        let db_err = err
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .unwrap();
        assert!(db_err.is_foreign_key_violation());
    }

    #[tokio::test]
    async fn test_delete_report_outcomes() {
        let (pool, user, project) = setup_test_db().await;
        let other = create_user_in_db(&pool, "b@x.com", "p2", "Bob", "user")
            .await
            .unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let report = create_report_in_db(&pool, user.id, report_on(project.id, date, "work"))
            .await
            .unwrap();

        let missing = delete_report_in_db(&pool, 999, user.id).await;
        assert!(matches!(missing, Err(DomainError::NotFound("Report"))));

        let foreign = delete_report_in_db(&pool, report.id, other.id).await;
        assert!(matches!(foreign, Err(DomainError::Forbidden)));
        assert_eq!(list_reports_from_db(&pool, user.id).await.unwrap().len(), 1);

        delete_report_in_db(&pool, report.id, user.id).await.unwrap();
        assert!(list_reports_from_db(&pool, user.id).await.unwrap().is_empty());

        let again = delete_report_in_db(&pool, report.id, user.id).await;
        assert!(matches!(again, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_attendance_queries_order_by_time_then_insertion() {
        let (pool, user, _) = setup_test_db().await;
        let morning = Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap();
        let yesterday = morning - Duration::days(1);

        let (clock_in, clock_out) = (AttendanceKind::ClockIn, AttendanceKind::ClockOut);
        insert_attendance_log(&pool, user.id, clock_in, LogOrigin::Automatic, yesterday)
            .await
            .unwrap();
        let first = insert_attendance_log(&pool, user.id, clock_out, LogOrigin::Manual, morning)
            .await
            .unwrap();
        // Same instant: insertion order breaks the tie.
        let second = insert_attendance_log(&pool, user.id, clock_in, LogOrigin::Manual, morning)
            .await
            .unwrap();

        let midnight = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        assert_eq!(count_logs_since(&pool, user.id, midnight).await.unwrap(), 2);

        let today = get_logs_since_from_db(&pool, user.id, midnight).await.unwrap();
        assert_eq!(today.iter().map(|l| l.id).collect::<Vec<_>>(), vec![first.id, second.id]);
        assert_eq!(today[0].origin, LogOrigin::Manual);
        assert_eq!(today[0].status, LogStatus::Authorized);
        assert_eq!(today[1].timestamp, morning);

        assert_eq!(
            last_log_kind(&pool, user.id).await.unwrap(),
            Some(AttendanceKind::ClockIn)
        );
        assert_eq!(get_all_logs_from_db(&pool, user.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_last_log_kind_without_history() {
        let (pool, user, _) = setup_test_db().await;
        assert_eq!(last_log_kind(&pool, user.id).await.unwrap(), None);
    }
}
