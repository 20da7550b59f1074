use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::{
    action_router::{ActionRouterInput, ActionRouterOutput},
    api::{error::ApiError, response::ApiResponse},
    ingest::processor_enums::{
        GetWindowInputArgs, IngestProcessorInput, IngestProcessorOutput, RangeInputArgs,
    },
    utils::app_config::AppConfig,
};

/// Inclusive epoch-second range. Defaults to the trailing window ending now.
#[derive(Debug, Deserialize)]
pub struct RangeParams {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct WindowParams {
    pub now: Option<i64>,
}

fn range_args(app_config: &AppConfig, asset_id: String, params: RangeParams) -> Result<RangeInputArgs, ApiError> {
    if asset_id.trim().is_empty() {
        return Err(ApiError::bad_request("asset_id cannot be empty"));
    }

    let to = params.to.unwrap_or_else(|| app_config.pipeline.now());
    let from = params
        .from
        .unwrap_or_else(|| to.saturating_sub(app_config.aggregators().window_seconds()));

    if from > to {
        return Err(ApiError::bad_request("'from' must not be after 'to'"));
    }

    Ok(RangeInputArgs { asset_id, from, to })
}

async fn dispatch(
    app_config: AppConfig,
    input: IngestProcessorInput,
) -> Result<(StatusCode, Json<ApiResponse<serde_json::Value>>), ApiError> {
    let result = ActionRouterInput::Ingest(input).process(app_config).await?;

    let json = match result {
        ActionRouterOutput::Ingest(IngestProcessorOutput::GetAggregates(buckets)) => serde_json::to_value(&buckets),
        ActionRouterOutput::Ingest(IngestProcessorOutput::GetRawEvents(records)) => serde_json::to_value(&records),
        ActionRouterOutput::Ingest(IngestProcessorOutput::GetWindow(snapshot)) => serde_json::to_value(&snapshot),
        _ => return Err(ApiError::internal_error("Unexpected response type")),
    }
    .map_err(|e| ApiError::internal_error(format!("Failed to serialize: {}", e)))?;

    Ok((StatusCode::OK, Json(ApiResponse::success(json))))
}

/// GET /aggregates/{asset_id} - Bucket aggregates in range
pub async fn get_aggregates(
    State(app_config): State<AppConfig>,
    Path(asset_id): Path<String>,
    Query(params): Query<RangeParams>,
) -> Result<(StatusCode, Json<ApiResponse<serde_json::Value>>), ApiError> {
    let args = range_args(&app_config, asset_id, params)?;
    dispatch(app_config, IngestProcessorInput::GetAggregates(args)).await
}

/// GET /raw/{asset_id} - Raw events in range
pub async fn get_raw_events(
    State(app_config): State<AppConfig>,
    Path(asset_id): Path<String>,
    Query(params): Query<RangeParams>,
) -> Result<(StatusCode, Json<ApiResponse<serde_json::Value>>), ApiError> {
    let args = range_args(&app_config, asset_id, params)?;
    dispatch(app_config, IngestProcessorInput::GetRawEvents(args)).await
}

/// GET /window/{asset_id} - Current window statistic and signal
pub async fn get_window(
    State(app_config): State<AppConfig>,
    Path(asset_id): Path<String>,
    Query(params): Query<WindowParams>,
) -> Result<(StatusCode, Json<ApiResponse<serde_json::Value>>), ApiError> {
    let args = GetWindowInputArgs {
        asset_id,
        now: params.now,
    };
    dispatch(app_config, IngestProcessorInput::GetWindow(args)).await
}
