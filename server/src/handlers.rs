// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::error::DomainError;
use crate::state::AppState;
use crate::{attendance, auth, database};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Json, Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use common::{
    AttendanceLog, Client, ClockResponse, CreateReportPayload, LoginPayload, LoginResponse,
    Project, UserQuery, WorkReport,
};
use tracing::{debug, error, info};

/// Handler for the service root.
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Punchclock API is running" }))
}

/// Handler for `POST /auth/login`.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginPayload>,
) -> Result<Json<LoginResponse>, AppError> {
    let session = auth::authenticate(&state.pool, &payload.email, &payload.password).await?;
    Ok(Json(session))
}

/// Handler for listing the caller's attendance logs of the current UTC day.
pub async fn today_attendance(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<Json<Vec<AttendanceLog>>, AppError> {
    let logs = attendance::list_today(&state.pool, query.user_id, Utc::now()).await?;
    info!(
        "Retrieved {} attendance logs for user {}.",
        logs.len(),
        query.user_id
    );
    Ok(Json(logs))
}

pub async fn clock_in(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<Json<ClockResponse>, AppError> {
    debug!("Received clock-in for user {}", query.user_id);
    let record =
        attendance::clock_in(&state.pool, &state.clock_locks, query.user_id, Utc::now()).await?;

    Ok(Json(ClockResponse {
        success: true,
        record: Some(record),
        message: "Clock-in recorded".to_string(),
    }))
}

pub async fn clock_out(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<Json<ClockResponse>, AppError> {
    debug!("Received clock-out for user {}", query.user_id);
    let record =
        attendance::clock_out(&state.pool, &state.clock_locks, query.user_id, Utc::now()).await?;

    Ok(Json(ClockResponse {
        success: true,
        record: Some(record),
        message: "Clock-out recorded".to_string(),
    }))
}

/// Handler for listing the caller's work reports, newest first.
pub async fn list_reports(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<Json<Vec<WorkReport>>, AppError> {
    let reports = database::list_reports_from_db(&state.pool, query.user_id).await?;
    info!(
        "Successfully retrieved {} reports for user {}.",
        reports.len(),
        query.user_id
    );
    Ok(Json(reports))
}

/// Handler for creating a work report. Fields are stored as received.
pub async fn create_report(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
    ApiJson(payload): ApiJson<CreateReportPayload>,
) -> Result<(StatusCode, Json<WorkReport>), AppError> {
    debug!(
        "Received request to create report for user {} on project {}",
        query.user_id, payload.project_id
    );

    let report = database::create_report_in_db(&state.pool, query.user_id, payload).await?;

    info!("Report created successfully with ID: {}", report.id);
    Ok((StatusCode::CREATED, Json(report)))
}

/// Handler for deleting one of the caller's reports.
pub async fn delete_report(
    State(state): State<AppState>,
    ApiPath(report_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    database::delete_report_in_db(&state.pool, report_id, query.user_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn list_clients(State(state): State<AppState>) -> Result<Json<Vec<Client>>, AppError> {
    let clients = database::list_clients_from_db(&state.pool).await?;
    Ok(Json(clients))
}

pub async fn list_projects(
    State(state): State<AppState>,
) -> Result<Json<Vec<Project>>, AppError> {
    let projects = database::list_projects_from_db(&state.pool).await?;
    Ok(Json(projects))
}

// --- Extractors ---
//
// axum's own extractors answer a malformed request with a plain-text body.
// These wrappers route the rejection through `AppError` instead.

#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

// --- Custom Error Handling ---

/// Our custom error type for the application.
#[derive(Debug)]
pub struct AppError {
    code: StatusCode,
    message: String,
}

impl AppError {
    fn new(code: StatusCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }
}

/// Storage failures. A broken foreign key means the caller named a user or
/// project that does not exist; anything else is internal.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let foreign_key_violation = err
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .is_some_and(|e| e.is_foreign_key_violation());

        if foreign_key_violation {
            error!("Rejected write with a dangling reference: {:?}", err);
            return Self::new(
                StatusCode::BAD_REQUEST,
                "Referenced user or project does not exist",
            );
        }

        // Log the internal error for debugging.
        error!("Internal server error: {:?}", err);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "An internal error occurred.",
        )
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), &rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(rejection.status(), &rejection.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), &rejection.body_text())
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        let code = match err {
            DomainError::Storage(inner) => return inner.into(),
            DomainError::Unauthorized => StatusCode::UNAUTHORIZED,
            DomainError::StateConflict(_) | DomainError::CapacityExceeded { .. } => {
                StatusCode::BAD_REQUEST
            }
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Forbidden => StatusCode::FORBIDDEN,
        };
        Self::new(code, &err.to_string())
    }
}

/// Allows Axum to convert our `AppError` into an HTTP `Response`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(
            "Responding with error: status_code={}, message={}",
            self.code.as_u16(),
            self.message
        );
        (
            self.code,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::DutyState;
    use chrono::NaiveDate;

    async fn setup_state() -> (AppState, i64) {
        let pool = database::in_memory_pool().await.unwrap();
        let user = database::create_user_in_db(&pool, "a@x.com", "p1", "Alice", "user")
            .await
            .unwrap();
        (AppState::new(pool), user.id)
    }

    #[test]
    fn test_domain_errors_map_to_status_codes() {
        let cases = [
            (DomainError::Unauthorized, StatusCode::UNAUTHORIZED),
            (
                DomainError::StateConflict(DutyState::OnDuty),
                StatusCode::BAD_REQUEST,
            ),
            (
                DomainError::CapacityExceeded { limit: 4 },
                StatusCode::BAD_REQUEST,
            ),
            (DomainError::NotFound("Report"), StatusCode::NOT_FOUND),
            (DomainError::Forbidden, StatusCode::FORBIDDEN),
            (
                DomainError::Storage(anyhow::anyhow!("disk on fire")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).code, expected);
        }
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let err = AppError::from(anyhow::anyhow!("secret connection string"));
        assert_eq!(err.message, "An internal error occurred.");
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let (state, _) = setup_state().await;
        let payload = ApiJson(LoginPayload {
            email: "a@x.com".to_string(),
            password: "wrong".to_string(),
        });

        let err = login(State(state), payload).await.unwrap_err();
        assert_eq!(err.code, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "Invalid credentials");
    }

    #[tokio::test]
    async fn test_create_report_for_unknown_project() {
        let (state, user_id) = setup_state().await;
        let payload = ApiJson(CreateReportPayload {
            project_id: 42,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            hours: 8.0,
            description: "work".to_string(),
        });

        let err = create_report(State(state), ApiQuery(UserQuery { user_id }), payload)
            .await
            .unwrap_err();
        assert_eq!(err.code, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Referenced user or project does not exist");
    }

    #[tokio::test]
    async fn test_delete_missing_report() {
        let (state, user_id) = setup_state().await;

        let err = delete_report(State(state), ApiPath(999), ApiQuery(UserQuery { user_id }))
            .await
            .unwrap_err();
        assert_eq!(err.code, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "Report not found");
    }

    #[tokio::test]
    async fn test_clock_out_before_clock_in() {
        let (state, user_id) = setup_state().await;

        let err = clock_out(State(state), ApiQuery(UserQuery { user_id }))
            .await
            .unwrap_err();
        assert_eq!(err.code, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "User not in service");
    }
}
