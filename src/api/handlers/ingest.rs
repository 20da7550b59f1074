use axum::{extract::State, http::StatusCode, Json};

use crate::{
    action_router::{ActionRouterInput, ActionRouterOutput},
    api::{error::ApiError, extractors::TriggerBody, response::ApiResponse},
    ingest::processor_enums::{IngestProcessorInput, IngestProcessorOutput},
    utils::app_config::AppConfig,
};

/// POST /ingest - Process one delivered stream batch.
///
/// Per-event failures are reported inside the batch report with a 200; only an
/// unreadable envelope fails the request.
pub async fn ingest_batch(
    State(app_config): State<AppConfig>,
    TriggerBody(body): TriggerBody,
) -> Result<(StatusCode, Json<ApiResponse<serde_json::Value>>), ApiError> {
    let action = ActionRouterInput::Ingest(IngestProcessorInput::ProcessBatch(body));

    let result = action.process(app_config).await?;

    match result {
        ActionRouterOutput::Ingest(IngestProcessorOutput::ProcessBatch(report)) => {
            let json = serde_json::to_value(&report)
                .map_err(|e| ApiError::internal_error(format!("Failed to serialize: {}", e)))?;
            Ok((StatusCode::OK, Json(ApiResponse::success(json))))
        }
        _ => Err(ApiError::internal_error("Unexpected response type")),
    }
}
