//! Topic management endpoints: create, delete, list, stats.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::api::extractors::TopicPath;
use crate::api::types::ApiError;
use crate::broker::Broker;

#[derive(Debug, Deserialize)]
pub struct CreateTopicRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateTopicResponse {
    pub status: &'static str,
    pub topic: String,
}

/// `POST /api/v1/topics`
pub async fn create_topic(
    State(broker): State<Arc<Broker>>,
    Json(body): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::bad_request("BAD_REQUEST", "name must not be empty"));
    }
    let topic = broker.create_topic(&body.name)?;
    Ok((
        StatusCode::CREATED,
        Json(CreateTopicResponse {
            status: "created",
            topic: topic.name.clone(),
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct DeleteTopicResponse {
    pub status: &'static str,
    pub topic: String,
}

/// `DELETE /api/v1/topics/{name}`
pub async fn delete_topic(
    State(broker): State<Arc<Broker>>,
    TopicPath { name }: TopicPath,
) -> Result<impl IntoResponse, ApiError> {
    broker.delete_topic(&name)?;
    Ok((
        StatusCode::OK,
        Json(DeleteTopicResponse {
            status: "deleted",
            topic: name,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct TopicSummary {
    pub subscribers: usize,
}

#[derive(Debug, Serialize)]
pub struct ListTopicsResponse {
    pub topics: BTreeMap<String, TopicSummary>,
}

/// `GET /api/v1/topics`
pub async fn list_topics(State(broker): State<Arc<Broker>>) -> impl IntoResponse {
    let topics = broker
        .list_topics()
        .into_iter()
        .filter_map(|name| broker.stats(&name).ok())
        .map(|stats| {
            (
                stats.name,
                TopicSummary {
                    subscribers: stats.subscriber_count,
                },
            )
        })
        .collect();
    (StatusCode::OK, Json(ListTopicsResponse { topics }))
}

#[derive(Debug, Serialize)]
pub struct TopicStatsEntry {
    pub messages: u64,
    pub subscribers: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub topics: BTreeMap<String, TopicStatsEntry>,
}

/// `GET /api/v1/stats`
pub async fn stats(State(broker): State<Arc<Broker>>) -> impl IntoResponse {
    let topics = broker
        .all_stats()
        .into_iter()
        .map(|s| {
            (
                s.name,
                TopicStatsEntry {
                    messages: s.history_len as u64,
                    subscribers: s.subscriber_count,
                },
            )
        })
        .collect();
    (StatusCode::OK, Json(StatsResponse { topics }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::TopicConfig;

    fn broker() -> Arc<Broker> {
        Arc::new(Broker::new(TopicConfig::default(), 100))
    }

    #[tokio::test]
    async fn create_topic_rejects_empty_name() {
        let broker = broker();
        let err = create_topic(
            State(broker),
            Json(CreateTopicRequest { name: "  ".into() }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn create_then_delete_round_trips() {
        let broker = broker();
        create_topic(
            State(broker.clone()),
            Json(CreateTopicRequest { name: "orders".into() }),
        )
        .await
        .unwrap();
        delete_topic(
            State(broker.clone()),
            TopicPath { name: "orders".into() },
        )
        .await
        .unwrap();
        assert!(broker.get_topic("orders").is_err());
    }

    #[tokio::test]
    async fn delete_missing_topic_is_not_found() {
        let broker = broker();
        let err = delete_topic(State(broker), TopicPath { name: "missing".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
    }
}
