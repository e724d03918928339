//! Application state management with request backpressure

use std::sync::Arc;
use std::time::Instant;

use modelhub_core::GatewayEngine;
use tokio::sync::Semaphore;

/// Shared application state with backpressure
#[derive(Clone)]
pub struct AppState {
    /// Engine reference - using Arc for cheap clones
    pub engine: Arc<GatewayEngine>,
    /// Concurrency limiter to prevent resource exhaustion
    pub request_semaphore: Arc<Semaphore>,
    /// Request timeout configuration (seconds)
    pub request_timeout_secs: u64,
    /// Process start time, reported by the health endpoint.
    pub started_at: Instant,
}

impl AppState {
    pub fn new(engine: GatewayEngine) -> Self {
        // Default: 100 concurrent requests (tunable based on hardware)
        let max_concurrent = std::env::var("MAX_CONCURRENT_REQUESTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        let timeout = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(300); // 5 minutes default

        Self {
            engine: Arc::new(engine),
            request_semaphore: Arc::new(Semaphore::new(max_concurrent)),
            request_timeout_secs: timeout,
            started_at: Instant::now(),
        }
    }

    /// Acquire a permit for concurrent request processing
    pub async fn acquire_permit(&self) -> tokio::sync::SemaphorePermit<'_> {
        self.request_semaphore
            .acquire()
            .await
            .expect("Semaphore should never be closed")
    }
}
