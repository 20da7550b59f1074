use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;

use crate::api::response::ApiResponse;
use crate::utils::app_config::AppConfig;

/// GET /health
pub async fn health(
    State(app_config): State<AppConfig>,
) -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    let config = app_config.aggregators();
    let body = json!({
        "status": "ok",
        "store": if app_config.durable { "postgres" } else { "memory" },
        "bucket_size_seconds": config.bucket_size_seconds,
        "window_minutes": config.window_minutes,
        "window_source": config.window_source,
    });

    (StatusCode::OK, Json(ApiResponse::success(body)))
}
