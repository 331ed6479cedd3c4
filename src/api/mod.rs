//! REST endpoints for emails, daily summaries and categories.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::info;
use uuid::Uuid;

use crate::error::{DatabaseError, Error, IntakeError};
use crate::intake;
use crate::model::{
    Category, CategoryUpdate, DailySummary, Email, NewCategory, NewEmail,
};
use crate::pipeline::EmailPipeline;
use crate::store::Database;
use crate::summary::SummaryGenerator;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub pipeline: Arc<EmailPipeline>,
    pub generator: SummaryGenerator,
    /// Allowlist applied to the raw intake surface only.
    pub allowed_senders: Vec<String>,
}

/// Build the Axum router with all REST routes.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/emails/receive", post(receive_email))
        .route("/api/v1/emails/receive/raw", post(receive_raw_email))
        .route("/api/v1/emails", get(list_emails))
        .route("/api/v1/emails/{id}", get(get_email))
        .route("/api/v1/emails/{id}/analyze", post(analyze_email))
        .route("/api/v1/summaries/daily", get(get_daily_summary))
        .route("/api/v1/summaries/generate", post(generate_summary))
        .route(
            "/api/v1/categories",
            get(list_categories).post(create_category),
        )
        .route(
            "/api/v1/categories/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Error mapping ───────────────────────────────────────────────────────

/// Handler-level error with an HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        let status = match &e {
            DatabaseError::NotFound { .. } => StatusCode::NOT_FOUND,
            DatabaseError::Constraint(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<IntakeError> for ApiError {
    fn from(e: IntakeError) -> Self {
        let status = match &e {
            IntakeError::MimeParse(_) => StatusCode::BAD_REQUEST,
            IntakeError::SenderNotAllowed(_) => StatusCode::FORBIDDEN,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::Database(db) => db.into(),
            Error::Intake(intake) => intake.into(),
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: other.to_string(),
            },
        }
    }
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "mail-digest"
    }))
}

// ── Emails ──────────────────────────────────────────────────────────────

/// POST /api/v1/emails/receive
///
/// Store a pre-parsed email and kick off background analysis. The response
/// carries the stored record with `processed: false`.
async fn receive_email(
    State(state): State<AppState>,
    Json(payload): Json<NewEmail>,
) -> Result<Json<Email>, ApiError> {
    let stored = state.pipeline.accept(&payload).await?;
    Ok(Json(stored))
}

/// POST /api/v1/emails/receive/raw
///
/// Accept a raw RFC 822 message body. The sender allowlist is enforced
/// here; the JSON intake endpoint trusts its caller.
async fn receive_raw_email(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Email>, ApiError> {
    let email = intake::parse_rfc822(&body)?;
    intake::check_sender(&state.allowed_senders, &email.sender_email)?;

    let stored = state.pipeline.accept(&email).await?;
    Ok(Json(stored))
}

#[derive(Debug, Deserialize)]
struct ListEmailsQuery {
    #[serde(default)]
    skip: u32,
    #[serde(default = "default_limit")]
    limit: u32,
    processed: Option<bool>,
}

fn default_limit() -> u32 {
    100
}

/// GET /api/v1/emails?skip=0&limit=100&processed=true
async fn list_emails(
    State(state): State<AppState>,
    Query(query): Query<ListEmailsQuery>,
) -> Result<Json<Vec<Email>>, ApiError> {
    let emails = state
        .db
        .list_emails(query.skip, query.limit, query.processed)
        .await?;
    Ok(Json(emails))
}

/// GET /api/v1/emails/{id}
async fn get_email(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Email>, ApiError> {
    let email = state
        .db
        .get_email(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Email not found"))?;
    Ok(Json(email))
}

/// POST /api/v1/emails/{id}/analyze
///
/// Re-trigger analysis for a stored email. Runs even if the email was
/// already processed; a second analyzed record is appended.
async fn analyze_email(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .db
        .get_email(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Email not found"))?;

    state.pipeline.spawn_analysis(id);
    info!(email_id = %id, "Analysis re-triggered");

    Ok(Json(serde_json::json!({
        "message": "Email analysis started",
        "email_id": id.to_string()
    })))
}

// ── Summaries ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
struct SummaryQuery {
    summary_date: Option<NaiveDate>,
}

/// GET /api/v1/summaries/daily?summary_date=2025-06-01
///
/// Returns the stored summary, generating one on a miss. Defaults to the
/// current UTC date.
async fn get_daily_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<DailySummary>, ApiError> {
    let date = query.summary_date.unwrap_or_else(|| Utc::now().date_naive());

    if let Some(existing) = state.db.get_daily_summary(date).await? {
        return Ok(Json(existing));
    }

    let generated = state.generator.generate(date, state.db.as_ref()).await?;
    Ok(Json(generated))
}

/// POST /api/v1/summaries/generate?summary_date=2025-06-01
///
/// Regenerate unconditionally, overwriting any stored summary for the date.
async fn generate_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let date = query.summary_date.unwrap_or_else(|| Utc::now().date_naive());
    let summary = state.generator.generate(date, state.db.as_ref()).await?;

    Ok(Json(serde_json::json!({
        "message": "Summary generated successfully",
        "date": date.to_string(),
        "summary_id": summary.id.to_string()
    })))
}

// ── Categories ──────────────────────────────────────────────────────────

/// GET /api/v1/categories
async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, ApiError> {
    let categories = state.db.list_categories().await?;
    Ok(Json(categories))
}

/// POST /api/v1/categories
async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<NewCategory>,
) -> Result<Json<Category>, ApiError> {
    let category = state.db.insert_category(&payload).await?;
    Ok(Json(category))
}

/// GET /api/v1/categories/{id}
async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, ApiError> {
    let category = state
        .db
        .get_category(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;
    Ok(Json(category))
}

/// PUT /api/v1/categories/{id}
async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryUpdate>,
) -> Result<Json<Category>, ApiError> {
    let category = state
        .db
        .update_category(id, &payload)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;
    Ok(Json(category))
}

/// DELETE /api/v1/categories/{id}
async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = state.db.delete_category(id).await?;
    if !deleted {
        return Err(ApiError::not_found("Category not found"));
    }
    Ok(Json(serde_json::json!({
        "message": "Category deleted successfully"
    })))
}
