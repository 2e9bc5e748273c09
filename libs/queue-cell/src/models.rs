use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitPriority {
    Normal,
    Urgent,
    Emergency,
}

impl VisitPriority {
    /// Ordering weight: emergency > urgent > normal.
    pub fn rank(&self) -> u8 {
        match self {
            VisitPriority::Emergency => 3,
            VisitPriority::Urgent => 2,
            VisitPriority::Normal => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VisitPriority::Normal => "normal",
            VisitPriority::Urgent => "urgent",
            VisitPriority::Emergency => "emergency",
        }
    }
}

impl Default for VisitPriority {
    fn default() -> Self {
        VisitPriority::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisitStatus {
    Waiting,
    InProgress,
    Completed,
    Cancelled,
}

impl VisitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Waiting => "waiting",
            VisitStatus::InProgress => "in-progress",
            VisitStatus::Completed => "completed",
            VisitStatus::Cancelled => "cancelled",
        }
    }

    /// Waiting and in-progress visits occupy a queue slot.
    pub fn is_active(&self) -> bool {
        matches!(self, VisitStatus::Waiting | VisitStatus::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VisitStatus::Completed | VisitStatus::Cancelled)
    }

    pub fn can_transition_to(&self, target: &VisitStatus) -> bool {
        use VisitStatus::*;
        match (self, target) {
            (Waiting, InProgress) => true,
            (InProgress, Completed) => true,
            (Waiting, Cancelled) | (InProgress, Cancelled) => true,
            _ => false,
        }
    }
}

/// Snapshot of a visit's terminal state, appended to `visit_history` exactly
/// once when the visit completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitHistoryEntry {
    pub visit_date: DateTime<Utc>,
    pub status: VisitStatus,
    pub chief_complaint: String,
    pub chamber_id: Uuid,
    pub token_number: i64,
    pub doctor: Option<Uuid>,
}

/// One patient's queue entry for one episode of care.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub cid: String,
    pub name: String,
    pub age: i64,
    pub gender: String,
    pub chief_complaint: String,
    pub chamber_id: Uuid,
    pub token_number: i64,
    pub queue_number: i64,
    #[serde(default)]
    pub priority: VisitPriority,
    pub status: VisitStatus,
    #[serde(default)]
    pub assigned_doctor: Option<Uuid>,
    #[serde(default)]
    pub prescription: Option<String>,
    #[serde(default)]
    pub called_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub visit_history: Vec<VisitHistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueEventKind {
    PatientRegistered,
    PatientCalled,
    PatientCompleted,
    PatientUpdated,
}

/// Change event pushed to every subscribed dashboard after a state
/// transition is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEvent {
    #[serde(rename = "type")]
    pub kind: QueueEventKind,
    pub visit: Visit,
    pub timestamp: DateTime<Utc>,
}

impl QueueEvent {
    pub fn new(kind: QueueEventKind, visit: Visit) -> Self {
        Self {
            kind,
            visit,
            timestamp: Utc::now(),
        }
    }
}

/// Visit mapped for dashboard consumption, with optional queue position and
/// wait estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub token_number: i64,
    pub queue_number: i64,
    pub entered_at: DateTime<Utc>,
    pub name: String,
    pub cid: String,
    pub age: i64,
    pub gender: String,
    pub chief_complaint: String,
    pub priority: VisitPriority,
    pub status: VisitStatus,
    pub chamber_id: Uuid,
    pub position_in_queue: Option<u32>,
    pub estimated_wait_minutes: Option<u32>,
    pub estimated_ready_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    pub fn from_visit(
        visit: &Visit,
        position_in_queue: Option<u32>,
        estimated_wait_minutes: Option<u32>,
        now: DateTime<Utc>,
    ) -> Self {
        let estimated_ready_at =
            estimated_wait_minutes.map(|minutes| now + Duration::minutes(minutes as i64));

        Self {
            id: visit.id,
            token_number: visit.token_number,
            queue_number: visit.queue_number,
            entered_at: visit.created_at,
            name: visit.name.clone(),
            cid: visit.cid.clone(),
            age: visit.age,
            gender: visit.gender.clone(),
            chief_complaint: visit.chief_complaint.clone(),
            priority: visit.priority,
            status: visit.status,
            chamber_id: visit.chamber_id,
            position_in_queue,
            estimated_wait_minutes,
            estimated_ready_at,
        }
    }
}

/// Per-chamber snapshot: the patient being (or about to be) served plus the
/// ranked waiting list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChamberQueueResponse {
    pub patient: Option<QueueEntry>,
    pub queue: Vec<QueueEntry>,
    pub chamber_id: Uuid,
    pub waiting_count: u32,
    pub expected_wait_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalQueueSummary {
    pub total_patients: u64,
    pub waiting: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub cancelled: u64,
}

/// System-wide snapshot across all chambers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalQueueResponse {
    pub summary: GlobalQueueSummary,
    pub patients: Vec<QueueEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityCount {
    pub priority: VisitPriority,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatsResponse {
    pub waiting: u64,
    pub in_progress: u64,
    pub completed_today: u64,
    pub avg_wait_minutes: u32,
    pub priority_breakdown: Vec<PriorityCount>,
    pub total_today: u64,
}

#[derive(Debug, Deserialize)]
pub struct CallNextRequest {
    pub chamber: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteVisitRequest {
    pub note: Option<String>,
}
