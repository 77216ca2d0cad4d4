use std::sync::Arc;

use boxoffice_core::{AllocationEngine, CoreError};
use boxoffice_store::app_config::RateLimitConfig;
use boxoffice_store::RedisClient;

use crate::error::AppError;
use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub engine: AllocationEngine,
    /// Rate limiting is off when no Redis is configured.
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit: RateLimitConfig,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Count a rejected engine call and turn it into a response error.
    pub fn reject(&self, err: CoreError) -> AppError {
        self.metrics.record_rejection(&err);
        err.into()
    }
}
