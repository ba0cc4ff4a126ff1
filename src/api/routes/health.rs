//! Health check endpoint

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::broker::Broker;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub uptime_sec: u64,
    pub topics: usize,
    pub subscribers: usize,
}

/// `GET /api/v1/health` — broker-wide liveness snapshot.
pub async fn health(State(broker): State<Arc<Broker>>) -> impl IntoResponse {
    let health = broker.health();
    (
        StatusCode::OK,
        Json(HealthResponse {
            uptime_sec: health.uptime_sec,
            topics: health.topic_count,
            subscribers: health.total_subscribers,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::TopicConfig;

    #[tokio::test]
    async fn health_reports_ok_on_a_fresh_broker() {
        let broker = Arc::new(Broker::new(TopicConfig::default(), 100));
        let response = health(State(broker)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
