pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::utils::app_config::AppConfig;
use handlers::{health, ingest, prices};

pub fn router(app_config: AppConfig) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/ingest", post(ingest::ingest_batch))
        .route("/aggregates/:asset_id", get(prices::get_aggregates))
        .route("/raw/:asset_id", get(prices::get_raw_events))
        .route("/window/:asset_id", get(prices::get_window))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregators::config::AggregatorsConfig;
    use crate::ingest::clock::FixedClock;
    use crate::ingest::pipeline::IngestPipeline;
    use crate::price_store::memory::{MemoryAggregateStore, MemoryRawEventStore};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const NOW: i64 = 1_700_000_000;

    fn app() -> Router {
        let pipeline = IngestPipeline::new(
            Arc::new(MemoryAggregateStore::new()),
            Arc::new(MemoryRawEventStore::new()),
            AggregatorsConfig::default(),
        )
        .unwrap()
        .with_clock(Arc::new(FixedClock(NOW)));
        router(AppConfig::new(Arc::new(pipeline)))
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn record(payload: Value) -> Value {
        json!({"kinesis": {"data": STANDARD.encode(payload.to_string())}})
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let (status, body) = call(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["store"], "memory");
    }

    #[tokio::test]
    async fn test_ingest_then_read_back() {
        let app = app();
        let batch = json!({
            "Records": [
                record(json!({"bitcoin": {"usd": 100, "observed_at": NOW - 300}})),
                {"kinesis": {"data": "not base64 at all!"}},
                record(json!({"bitcoin": {"usd": 110, "observed_at": NOW}})),
            ]
        });

        let (status, body) = call(&app, post_json("/ingest", batch)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["succeeded"], 2);
        assert_eq!(body["data"]["failed"], 1);
        assert_eq!(body["data"]["outcomes"][1]["outcome"], "failed");
        assert_eq!(body["data"]["outcomes"][1]["stage"], "decode");

        let (status, body) = call(
            &app,
            Request::get(format!("/aggregates/bitcoin?from={}&to={}", NOW - 1_800, NOW))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().map(Vec::len), Some(2));

        let (_, body) = call(&app, Request::get("/raw/bitcoin").body(Body::empty()).unwrap()).await;
        assert_eq!(body["data"].as_array().map(Vec::len), Some(2));

        let (status, body) = call(&app, Request::get("/window/bitcoin").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["signal"], "BULLISH");
        assert_eq!(body["data"]["now"], NOW);
    }

    #[tokio::test]
    async fn test_envelope_without_records_is_rejected() {
        let app = app();
        let (status, body) = call(&app, post_json("/ingest", json!({"bitcoin": {"usd": 1}}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_malformed_record_does_not_reject_batch() {
        let app = app();
        let batch = json!({
            "Records": [
                record(json!({"bitcoin": {"usd": 100, "observed_at": NOW}})),
                {"kinesis": {}},
                record(json!({"ethereum": {"usd": 2000, "observed_at": NOW}})),
            ]
        });

        let (status, body) = call(&app, post_json("/ingest", batch)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["succeeded"], 2);
        assert_eq!(body["data"]["failed"], 1);
        assert_eq!(body["data"]["outcomes"][1]["stage"], "decode");
    }

    #[tokio::test]
    async fn test_default_range_near_minimum_timestamp() {
        let app = app();
        let uri = format!("/aggregates/bitcoin?to={}", i64::MIN + 5);
        let (status, body) = call(&app, Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn test_inverted_range_is_rejected() {
        let app = app();
        let (status, _) = call(
            &app,
            Request::get("/raw/bitcoin?from=10&to=5").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
