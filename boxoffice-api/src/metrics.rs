use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use boxoffice_core::{CancelOutcome, CoreError};
use boxoffice_shared::Booking;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::AppError;
use crate::state::AppState;

/// Allocation counters, exported in Prometheus text format at `/metrics`.
pub struct Metrics {
    registry: Registry,
    bookings: IntCounterVec,
    cancellations: IntCounterVec,
    rejections: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let bookings = IntCounterVec::new(
            Opts::new("boxoffice_bookings_total", "Bookings created, by resulting status"),
            &["outcome"],
        )?;
        let cancellations = IntCounterVec::new(
            Opts::new("boxoffice_cancellations_total", "Cancellations, by effect on the event"),
            &["outcome"],
        )?;
        let rejections = IntCounterVec::new(
            Opts::new("boxoffice_rejections_total", "Engine calls that failed, by error kind"),
            &["kind"],
        )?;

        registry.register(Box::new(bookings.clone()))?;
        registry.register(Box::new(cancellations.clone()))?;
        registry.register(Box::new(rejections.clone()))?;

        Ok(Self {
            registry,
            bookings,
            cancellations,
            rejections,
        })
    }

    pub fn record_booking(&self, booking: &Booking) {
        self.bookings
            .with_label_values(&[booking.status.as_str()])
            .inc();
    }

    pub fn record_cancellation(&self, outcome: CancelOutcome) {
        self.cancellations.with_label_values(&[outcome.label()]).inc();
    }

    pub fn record_rejection(&self, err: &CoreError) {
        self.rejections.with_label_values(&[err.kind()]).inc();
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(export))
}

async fn export(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}
