use serde::{Deserialize, Serialize};

use queue_cell::models::{QueueEntry, VisitPriority};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterVisitRequest {
    pub cid: String,
    pub name: String,
    pub age: i64,
    pub gender: String,
    pub chief_complaint: String,
    pub chamber: String,
    #[serde(default)]
    pub priority: Option<VisitPriority>,
}

/// Patient-facing queue position lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientStatusResponse {
    pub patient: QueueEntry,
    pub queue_position: u32,
    pub estimated_wait_minutes: u32,
    pub total_waiting: u32,
}
