use std::sync::Arc;

use shared_config::AppConfig;

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::QueueError;
pub use models::*;
pub use router::create_queue_router;
pub use services::notifier::{QueueNotifier, SubscriptionGuard};
pub use services::ranking;
pub use services::visits::VisitService;

/// Shared state for the queue routes. The notifier is created once at process
/// start and torn down with it; handlers construct store-backed services per
/// request from the config.
#[derive(Clone)]
pub struct QueueState {
    pub config: Arc<AppConfig>,
    pub notifier: QueueNotifier,
}

impl QueueState {
    pub fn new(config: Arc<AppConfig>, notifier: QueueNotifier) -> Self {
        Self { config, notifier }
    }
}
