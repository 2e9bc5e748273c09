use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;

use queue_cell::QueueState;

use crate::models::RegisterVisitRequest;
use crate::services::registration::RegistrationService;

fn registration_service(state: &QueueState) -> Result<RegistrationService, AppError> {
    RegistrationService::new(&state.config, state.notifier.clone()).map_err(AppError::from)
}

/// Register a patient into a chamber's queue.
pub async fn register_visit(
    State(state): State<QueueState>,
    Json(request): Json<RegisterVisitRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let chamber_id = Uuid::parse_str(&request.chamber)
        .map_err(|_| AppError::BadRequest("Invalid chamber id".to_string()))?;

    let service = registration_service(&state)?;
    let visit = service.register(chamber_id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "patient": visit,
            "message": "Patient registered successfully",
        })),
    ))
}

/// Queue position lookup for the patient dashboard.
pub async fn patient_status(
    State(state): State<QueueState>,
    Path(cid): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = registration_service(&state)?;
    let status = service.status_by_cid(&cid).await?;

    Ok(Json(json!(status)))
}
