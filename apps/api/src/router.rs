use axum::{routing::get, Router};

use patient_cell::router::create_patient_router;
use queue_cell::router::create_queue_router;
use queue_cell::QueueState;

pub fn create_router(state: QueueState) -> Router {
    Router::new()
        .route("/", get(|| async { "OPD Queue API is running!" }))
        .nest("/queue", create_queue_router(state.clone()))
        .nest("/patients", create_patient_router(state))
}
