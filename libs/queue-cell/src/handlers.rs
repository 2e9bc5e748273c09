use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_models::{auth::User, error::AppError};
use shared_utils::extractor::require_role;

use crate::models::{CallNextRequest, CompleteVisitRequest};
use crate::services::visits::VisitService;
use crate::QueueState;

#[derive(Debug, Deserialize)]
pub struct ChamberFilter {
    pub chamber: Option<String>,
}

fn parse_chamber(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest("Invalid chamber id".to_string()))
}

fn visit_service(state: &QueueState) -> Result<VisitService, AppError> {
    VisitService::new(&state.config, state.notifier.clone()).map_err(AppError::from)
}

/// Global queue snapshot, or a per-chamber snapshot when `?chamber=` is given.
pub async fn get_queue(
    State(state): State<QueueState>,
    Query(filter): Query<ChamberFilter>,
) -> Result<Json<Value>, AppError> {
    let service = visit_service(&state)?;

    match filter.chamber {
        Some(raw) => {
            let chamber_id = parse_chamber(&raw)?;
            let snapshot = service.chamber_queue(chamber_id).await?;
            Ok(Json(json!(snapshot)))
        }
        None => {
            let snapshot = service.global_queue().await?;
            Ok(Json(json!(snapshot)))
        }
    }
}

/// Current patient and waiting list for one chamber.
pub async fn get_chamber_queue(
    State(state): State<QueueState>,
    Query(filter): Query<ChamberFilter>,
) -> Result<Json<Value>, AppError> {
    let raw = filter
        .chamber
        .ok_or_else(|| AppError::BadRequest("chamber query parameter is required".to_string()))?;
    let chamber_id = parse_chamber(&raw)?;

    let service = visit_service(&state)?;
    let snapshot = service.chamber_queue(chamber_id).await?;

    Ok(Json(json!(snapshot)))
}

pub async fn get_queue_stats(
    State(state): State<QueueState>,
) -> Result<Json<Value>, AppError> {
    let service = visit_service(&state)?;
    let stats = service.stats().await?;

    Ok(Json(json!(stats)))
}

/// Call the next patient for the doctor's chamber.
pub async fn call_next(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Json(request): Json<CallNextRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "doctor")?;

    let chamber_id = parse_chamber(&request.chamber)?;
    let doctor_id = Uuid::parse_str(&user.id).ok();

    let service = visit_service(&state)?;
    let visit = service.call_next(chamber_id, doctor_id).await?;

    Ok(Json(json!({ "patient": visit })))
}

/// Complete the in-progress visit holding this token.
pub async fn complete_visit(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Path(token_number): Path<i64>,
    Json(request): Json<CompleteVisitRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "doctor")?;

    let note = request.note;

    let service = visit_service(&state)?;
    let visit = service.complete_by_token(token_number, note).await?;

    Ok(Json(json!({
        "success": true,
        "patient": visit,
        "message": "Token cleared successfully",
    })))
}

/// Remove an active visit from the queue.
pub async fn cancel_visit(
    State(state): State<QueueState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "doctor")?;

    let visit_id =
        Uuid::parse_str(&id).map_err(|_| AppError::BadRequest("Invalid visit id".to_string()))?;

    let service = visit_service(&state)?;
    let visit = service.cancel(visit_id).await?;

    Ok(Json(json!({
        "patient": visit,
        "message": "Patient removed from queue",
    })))
}

/// Long-lived push channel. Sends `connected` immediately, then one message
/// per queue change, until the client disconnects.
pub async fn queue_stream(
    State(state): State<QueueState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let (guard, receiver) = state.notifier.subscribe_guarded().await;
    info!("Queue stream client {} connected", guard.id());

    let connected =
        stream::once(async { Event::default().json_data(json!({ "type": "connected" })) });

    let events = stream::unfold((receiver, guard), |(mut receiver, guard)| async move {
        match receiver.recv().await {
            Some(event) => {
                let frame = Event::default().json_data(&event);
                Some((frame, (receiver, guard)))
            }
            None => None,
        }
    });

    Sse::new(connected.chain(events)).keep_alive(KeepAlive::default())
}
