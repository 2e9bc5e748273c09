//! Queue ordering. The store returns candidate sets; ordering happens here
//! because the textual priority column does not sort by rank.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    ChamberQueueResponse, GlobalQueueResponse, GlobalQueueSummary, QueueEntry, Visit, VisitStatus,
};

/// Waiting-list ordering key: priority rank descending, then queue number
/// ascending (earliest registered wins ties).
pub fn waiting_order(a: &Visit, b: &Visit) -> Ordering {
    b.priority
        .rank()
        .cmp(&a.priority.rank())
        .then_with(|| a.queue_number.cmp(&b.queue_number))
}

/// Waiting visits sorted by `waiting_order`.
pub fn rank_waiting(visits: &[Visit]) -> Vec<&Visit> {
    let mut waiting: Vec<&Visit> = visits
        .iter()
        .filter(|v| v.status == VisitStatus::Waiting)
        .collect();
    waiting.sort_by(|a, b| waiting_order(a, b));
    waiting
}

/// The patient who should be served next: the in-progress visit if one
/// exists, otherwise the best-ranked waiting visit.
pub fn next_in_line(visits: &[Visit]) -> Option<&Visit> {
    visits
        .iter()
        .find(|v| v.status == VisitStatus::InProgress)
        .or_else(|| rank_waiting(visits).into_iter().next())
}

/// Per-chamber snapshot. The in-progress patient occupies position 0 with no
/// wait; the Nth waiting entry gets position N, shifted by one while a
/// patient is in progress. Wait estimates are position times the per-patient
/// consultation constant.
pub fn chamber_snapshot(
    chamber_id: Uuid,
    visits: &[Visit],
    avg_consult_minutes: u32,
    now: DateTime<Utc>,
) -> ChamberQueueResponse {
    let chamber_visits: Vec<&Visit> = visits
        .iter()
        .filter(|v| v.chamber_id == chamber_id)
        .collect();

    let in_progress = chamber_visits
        .iter()
        .find(|v| v.status == VisitStatus::InProgress)
        .copied();

    let mut waiting: Vec<&Visit> = chamber_visits
        .iter()
        .filter(|v| v.status == VisitStatus::Waiting)
        .copied()
        .collect();
    waiting.sort_by(|a, b| waiting_order(a, b));

    let offset = if in_progress.is_some() { 1 } else { 0 };

    let queue: Vec<QueueEntry> = waiting
        .iter()
        .enumerate()
        .map(|(idx, visit)| {
            let position = idx as u32 + 1 + offset;
            let wait = position * avg_consult_minutes;
            QueueEntry::from_visit(visit, Some(position), Some(wait), now)
        })
        .collect();

    // The patient field is whoever a doctor sees when they look up: the one
    // in progress (position 0, no wait left) or the best waiting candidate.
    let patient = match in_progress {
        Some(current) => Some(QueueEntry::from_visit(current, Some(0), Some(0), now)),
        None => waiting
            .first()
            .map(|candidate| QueueEntry::from_visit(candidate, None, None, now)),
    };

    let waiting_count = waiting.len() as u32;
    let expected_wait_minutes = if chamber_visits.is_empty() {
        None
    } else {
        Some(waiting_count * avg_consult_minutes)
    };

    ChamberQueueResponse {
        patient,
        queue,
        chamber_id,
        waiting_count,
        expected_wait_minutes,
    }
}

/// System-wide snapshot. Grouped in-progress first, then waiting, then the
/// terminal statuses. The global waiting order is queue number only;
/// per-chamber priority reordering does not apply at this level.
pub fn global_snapshot(
    visits: &[Visit],
    avg_consult_minutes: u32,
    now: DateTime<Utc>,
) -> GlobalQueueResponse {
    let mut in_progress: Vec<&Visit> = Vec::new();
    let mut waiting: Vec<&Visit> = Vec::new();
    let mut others: Vec<&Visit> = Vec::new();
    let mut completed = 0u64;
    let mut cancelled = 0u64;

    for visit in visits {
        match visit.status {
            VisitStatus::InProgress => in_progress.push(visit),
            VisitStatus::Waiting => waiting.push(visit),
            VisitStatus::Completed => {
                completed += 1;
                others.push(visit);
            }
            VisitStatus::Cancelled => {
                cancelled += 1;
                others.push(visit);
            }
        }
    }

    in_progress.sort_by_key(|v| v.queue_number);
    waiting.sort_by_key(|v| v.queue_number);
    others.sort_by_key(|v| v.queue_number);

    let in_progress_count = in_progress.len() as u32;
    let mut patients = Vec::with_capacity(visits.len());

    for visit in &in_progress {
        patients.push(QueueEntry::from_visit(visit, Some(0), Some(0), now));
    }

    for (idx, visit) in waiting.iter().enumerate() {
        let position = in_progress_count + idx as u32 + 1;
        let wait = position * avg_consult_minutes;
        patients.push(QueueEntry::from_visit(visit, Some(position), Some(wait), now));
    }

    for visit in &others {
        patients.push(QueueEntry::from_visit(visit, None, None, now));
    }

    let summary = GlobalQueueSummary {
        total_patients: visits.len() as u64,
        waiting: waiting.len() as u64,
        in_progress: in_progress.len() as u64,
        completed,
        cancelled,
    };

    GlobalQueueResponse { summary, patients }
}
