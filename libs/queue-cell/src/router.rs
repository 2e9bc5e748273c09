use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{
    call_next, cancel_visit, complete_visit, get_chamber_queue, get_queue, get_queue_stats,
    queue_stream,
};
use crate::QueueState;

pub fn create_queue_router(state: QueueState) -> Router {
    let protected_routes = Router::new()
        .route("/call-next", post(call_next))
        .route("/complete/{token_number}", post(complete_visit))
        .route("/cancel/{id}", post(cancel_visit))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(get_queue))
        .route("/current", get(get_chamber_queue))
        .route("/stats", get(get_queue_stats))
        .route("/stream", get(queue_stream))
        .merge(protected_routes)
        .with_state(state)
}
