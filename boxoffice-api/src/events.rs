use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use boxoffice_shared::{Booking, Event, EventId, EventStatus};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    pub total_tickets: i64,
}

/// Body of both `book` and `cancel`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub event_id: i64,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub event: Event,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub booking: Booking,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub success: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/initialize", post(initialize))
        .route("/api/book", post(book))
        .route("/api/cancel", post(cancel))
        .route("/api/status/{event_id}", get(status))
        .route("/api/booking-status/{event_id}/{user_id}", get(booking_status))
}

async fn initialize(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<InitializeRequest>, AppError>,
) -> Result<(StatusCode, Json<EventResponse>), AppError> {
    let event = state
        .engine
        .initialize(req.total_tickets)
        .await
        .map_err(|e| state.reject(e))?;

    Ok((StatusCode::CREATED, Json(EventResponse { event })))
}

async fn book(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<BookingRequest>, AppError>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state
        .engine
        .book(EventId(req.event_id), &req.user_id)
        .await
        .map_err(|e| state.reject(e))?;

    state.metrics.record_booking(&booking);
    Ok(Json(BookingResponse { booking }))
}

async fn cancel(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<BookingRequest>, AppError>,
) -> Result<Json<CancelResponse>, AppError> {
    let cancellation = state
        .engine
        .cancel(EventId(req.event_id), &req.user_id)
        .await
        .map_err(|e| state.reject(e))?;

    state.metrics.record_cancellation(cancellation.outcome);
    Ok(Json(CancelResponse { success: true }))
}

async fn status(
    State(state): State<AppState>,
    WithRejection(Path(event_id), _): WithRejection<Path<i64>, AppError>,
) -> Result<Json<EventStatus>, AppError> {
    let status = state
        .engine
        .status(EventId(event_id))
        .await
        .map_err(|e| state.reject(e))?;

    Ok(Json(status))
}

async fn booking_status(
    State(state): State<AppState>,
    WithRejection(Path((event_id, user_id)), _): WithRejection<Path<(i64, String)>, AppError>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state
        .engine
        .booking_status(EventId(event_id), &user_id)
        .await
        .map_err(|e| state.reject(e))?;

    Ok(Json(BookingResponse { booking }))
}
