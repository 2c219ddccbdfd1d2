use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::model::{Reservation, ReservationInput, RoomId};
use crate::observability;
use crate::service::{ReservationService, ServiceError};

type AppState = Arc<ReservationService>;

/// The versioned reservation API plus the health endpoint.
pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/reservation/make", post(make_reservation))
        .route(
            "/api/v1/reservation/room_availability/{reservation_id}",
            get(room_availability),
        )
        .route(
            "/api/v1/reservation/{reservation_id}",
            get(get_reservation).delete(delete_reservation),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Service errors mapped onto HTTP statuses, body `{"detail": ...}`.
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::Invalid { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Overbooking(_) => StatusCode::CONFLICT,
            ServiceError::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
struct AvailabilityResponse {
    available: BTreeMap<RoomId, u32>,
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK" }))
}

async fn make_reservation(
    State(service): State<AppState>,
    Json(input): Json<ReservationInput>,
) -> Result<(StatusCode, Json<Reservation>), ApiError> {
    let start = Instant::now();
    let result = service.make_reservation(input).await;
    observe("make_reservation", start, &result);
    Ok((StatusCode::CREATED, Json(result?)))
}

async fn get_reservation(
    State(service): State<AppState>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<Reservation>, ApiError> {
    let start = Instant::now();
    let result = service.get_reservation(reservation_id).await;
    observe("get_reservation", start, &result);
    Ok(Json(result?))
}

async fn room_availability(
    State(service): State<AppState>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let start = Instant::now();
    let result = service.get_availability(reservation_id).await;
    observe("room_availability", start, &result);
    Ok(Json(AvailabilityResponse { available: result? }))
}

async fn delete_reservation(
    State(service): State<AppState>,
    Path(reservation_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let start = Instant::now();
    let result = service.delete_reservation(reservation_id).await;
    observe("delete_reservation", start, &result);
    result?;
    Ok(StatusCode::NO_CONTENT)
}

fn observe<T>(op: &'static str, start: Instant, result: &Result<T, ServiceError>) {
    let status = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!(observability::REQUESTS_TOTAL, "op" => op, "status" => status).increment(1);
    metrics::histogram!(observability::REQUEST_DURATION_SECONDS, "op" => op)
        .record(start.elapsed().as_secs_f64());
}
