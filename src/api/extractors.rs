use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde_json::Value;

use crate::api::error::ApiError;

/// JSON body of a stream trigger. Only checks that it is an object; the
/// `Records` envelope itself is read by the pipeline.
pub struct TriggerBody(pub Value);

#[async_trait]
impl<S> FromRequest<S> for TriggerBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to parse JSON: {}", e)))?;

        if !value.is_object() {
            return Err(ApiError::bad_request("Request body must be a JSON object"));
        }

        Ok(TriggerBody(value))
    }
}
