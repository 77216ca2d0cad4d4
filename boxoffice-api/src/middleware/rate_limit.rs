use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use boxoffice_store::redis_repo::rate_limit_key;
use std::net::SocketAddr;
use tracing::warn;

use crate::error::AppError;
use crate::state::AppState;

/// Fixed-window limit per client IP. Fails open when Redis is unreachable.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(redis) = state.redis.as_ref() else {
        return next.run(req).await;
    };

    // Absent when the router is driven without a socket, as in tests.
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let limit = state.rate_limit;
    match redis
        .check_rate_limit(&rate_limit_key(&client), limit.max_requests, limit.window_seconds)
        .await
    {
        Ok(true) => next.run(req).await,
        Ok(false) => AppError::TooManyRequests.into_response(),
        Err(e) => {
            warn!("Rate limiter unavailable, allowing request from {}: {}", client, e);
            next.run(req).await
        }
    }
}
