use axum::{
    routing::{get, post},
    Router,
};

use queue_cell::QueueState;

use crate::handlers::{patient_status, register_visit};

pub fn create_patient_router(state: QueueState) -> Router {
    Router::new()
        .route("/register", post(register_visit))
        .route("/status/{cid}", get(patient_status))
        .with_state(state)
}
