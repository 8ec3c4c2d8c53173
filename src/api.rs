//! HTTP API.
//!
//! JSON in and out, camelCase field names. Every failure is rendered as
//! `{"error": <kind>, "message": <text>, "issues": [...]}` with `issues`
//! present only for validation failures.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::app::Desk;
use crate::error::{LifecycleError, StoreError, ValidationIssue};
use crate::escalation::SweepReport;
use crate::parcel::lifecycle::ParcelListing;
use crate::parcel::{IntakeDetails, Parcel, ParcelFilter, ParcelId, ParcelStatus};
use crate::slot::{SlotId, SlotView};
use crate::token::TokenClaims;

/// Largest request body accepted.
pub const MAX_BODY_SIZE: usize = 64 * 1024;

// ============================================================================
// Errors
// ============================================================================

/// Error returned by a handler.
#[derive(Debug)]
pub enum ApiError {
    /// Lifecycle rule or dependency failure.
    Lifecycle(LifecycleError),
    /// Store read failure outside the lifecycle manager.
    Store(StoreError),
    /// Malformed request (bad JSON, bad query value).
    BadRequest(String),
    /// A sweep is already running.
    SweepInProgress,
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        Self::Lifecycle(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Lifecycle(LifecycleError::Validation { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Lifecycle(
                LifecycleError::SlotConflict { .. } | LifecycleError::InvalidTransition { .. },
            )
            | Self::SweepInProgress => StatusCode::CONFLICT,
            Self::Lifecycle(LifecycleError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Lifecycle(LifecycleError::InvalidToken(_)) => StatusCode::UNAUTHORIZED,
            Self::Lifecycle(LifecycleError::DependencyUnavailable(_)) | Self::Store(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::Lifecycle(LifecycleError::Validation { .. }) => "validation",
            Self::Lifecycle(LifecycleError::SlotConflict { .. }) => "slotConflict",
            Self::Lifecycle(LifecycleError::InvalidTransition { .. }) => "invalidTransition",
            Self::Lifecycle(LifecycleError::NotFound(_)) => "notFound",
            Self::Lifecycle(LifecycleError::InvalidToken(_)) => "invalidToken",
            Self::Lifecycle(LifecycleError::DependencyUnavailable(_)) | Self::Store(_) => {
                "dependencyUnavailable"
            }
            Self::BadRequest(_) => "badRequest",
            Self::SweepInProgress => "sweepInProgress",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Lifecycle(e) => e.to_string(),
            Self::Store(e) => e.to_string(),
            Self::BadRequest(msg) => msg.clone(),
            Self::SweepInProgress => "an escalation sweep is already running".to_owned(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    issues: Option<Vec<ValidationIssue>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.message(), "request failed");
        } else {
            debug!(status = status.as_u16(), kind = self.kind(), "request rejected");
        }
        let body = ErrorBody {
            error: self.kind(),
            message: self.message(),
            issues: match self {
                Self::Lifecycle(LifecycleError::Validation { issues }) => Some(issues),
                _ => None,
            },
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Router
// ============================================================================

/// Builds the API router over `desk`.
pub fn router(desk: Arc<Desk>) -> Router {
    Router::new()
        .route("/parcels", post(intake).get(list_parcels))
        .route("/parcels/{id}", get(get_parcel))
        .route("/parcels/{id}/collect", post(collect))
        .route("/parcels/{id}/remove", post(remove))
        .route("/verify/{token}", get(verify))
        .route("/slots", get(list_slots))
        .route("/sweep", post(sweep))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(desk)
}

/// Serves the API on `listener` until `cancel` fires.
///
/// # Errors
///
/// Returns an I/O error if the listener fails.
pub async fn serve(
    desk: Arc<Desk>,
    listener: TcpListener,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "HTTP API listening");
    axum::serve(
        listener,
        router(desk).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { cancel.cancelled().await })
    .await?;
    debug!("HTTP API shut down");
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn intake(
    State(desk): State<Arc<Desk>>,
    payload: Result<Json<IntakeDetails>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Parcel>)> {
    let Json(details) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let parcel = desk.lifecycle().intake(&details).await?;
    Ok((StatusCode::CREATED, Json(parcel)))
}

/// Query string of `GET /parcels`.
#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    status: Option<String>,
    apartment: Option<String>,
    slot: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> ApiResult<ParcelFilter> {
        let status = self
            .status
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<ParcelStatus>())
            .transpose()
            .map_err(ApiError::BadRequest)?;
        let slot_id = self
            .slot
            .filter(|s| !s.trim().is_empty())
            .map(|s| SlotId::parse(&s))
            .transpose()
            .map_err(ApiError::BadRequest)?;
        Ok(ParcelFilter {
            status,
            apartment: self.apartment.filter(|a| !a.trim().is_empty()),
            slot_id,
        })
    }
}

async fn list_parcels(
    State(desk): State<Arc<Desk>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ParcelListing>>> {
    let filter = query.into_filter()?;
    Ok(Json(desk.lifecycle().list_with_escalation(&filter).await?))
}

async fn get_parcel(
    State(desk): State<Arc<Desk>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Parcel>> {
    Ok(Json(desk.lifecycle().get(&ParcelId::new(id)).await?))
}

/// Body of `POST /parcels/{id}/collect`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CollectRequest {
    collector: String,
    collected_at: Option<DateTime<Utc>>,
}

async fn collect(
    State(desk): State<Arc<Desk>>,
    Path(id): Path<String>,
    payload: Result<Json<CollectRequest>, JsonRejection>,
) -> ApiResult<Json<Parcel>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let parcel = desk
        .lifecycle()
        .mark_collected(&ParcelId::new(id), &request.collector, request.collected_at)
        .await?;
    Ok(Json(parcel))
}

async fn remove(
    State(desk): State<Arc<Desk>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Parcel>> {
    Ok(Json(desk.lifecycle().mark_removed(&ParcelId::new(id)).await?))
}

/// Response of `GET /verify/{token}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponse {
    #[serde(flatten)]
    claims: TokenClaims,
    /// Current status of the parcel, when it is still on record.
    #[serde(skip_serializing_if = "Option::is_none")]
    parcel_status: Option<ParcelStatus>,
}

async fn verify(
    State(desk): State<Arc<Desk>>,
    Path(token): Path<String>,
) -> ApiResult<Json<VerifyResponse>> {
    let claims = desk.lifecycle().verify(&token)?;
    let parcel_status = match desk.lifecycle().get(&claims.parcel_id).await {
        Ok(parcel) => Some(parcel.status),
        Err(e) => {
            warn!(parcel_id = %claims.parcel_id, error = %e, "verified token names no readable parcel");
            None
        }
    };
    Ok(Json(VerifyResponse {
        claims,
        parcel_status,
    }))
}

async fn list_slots(State(desk): State<Arc<Desk>>) -> ApiResult<Json<Vec<SlotView>>> {
    Ok(Json(desk.slots().list_slots().await?))
}

async fn sweep(State(desk): State<Arc<Desk>>) -> ApiResult<Json<SweepReport>> {
    desk.scheduler()
        .trigger()
        .await?
        .map(Json)
        .ok_or(ApiError::SweepInProgress)
}

#[allow(clippy::unused_async)]
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ============================================================================
// Tests
// ============================================================================
