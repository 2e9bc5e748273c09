use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::StoreClient;

use crate::error::QueueError;
use crate::models::{
    ChamberQueueResponse, GlobalQueueResponse, PriorityCount, QueueEvent, QueueEventKind,
    QueueStatsResponse, Visit, VisitHistoryEntry, VisitStatus,
};
use crate::services::notifier::QueueNotifier;
use crate::services::ranking;

/// Mutation and read operations over the visit store. Every successful state
/// transition publishes exactly one change event after the write is
/// acknowledged.
pub struct VisitService {
    store: StoreClient,
    notifier: QueueNotifier,
    avg_consult_minutes: u32,
}

impl VisitService {
    pub fn new(config: &AppConfig, notifier: QueueNotifier) -> Result<Self, QueueError> {
        Ok(Self {
            store: StoreClient::new(config)?,
            notifier,
            avg_consult_minutes: config.avg_consult_minutes,
        })
    }

    /// Call the next patient for a chamber. Candidates are tried in ranking
    /// order with a conditional claim update; a candidate that was claimed by
    /// a concurrent caller yields an empty result and the next one is tried.
    pub async fn call_next(
        &self,
        chamber_id: Uuid,
        doctor_id: Option<Uuid>,
    ) -> Result<Visit, QueueError> {
        let path = format!(
            "/rest/v1/visits?chamber_id=eq.{}&status=eq.{}&order=queue_number.asc",
            chamber_id,
            VisitStatus::Waiting.as_str()
        );
        let waiting: Vec<Visit> = self.store.select(&path).await?;

        let ranked = ranking::rank_waiting(&waiting);
        if ranked.is_empty() {
            return Err(QueueError::EmptyQueue);
        }

        for candidate in ranked {
            let now = Utc::now();
            let mut patch = json!({
                "status": VisitStatus::InProgress,
                "called_at": now,
                "updated_at": now,
            });
            if let Some(doctor_id) = doctor_id {
                patch["assigned_doctor"] = json!(doctor_id);
            }

            let claim_path = format!(
                "/rest/v1/visits?id=eq.{}&status=eq.{}",
                candidate.id,
                VisitStatus::Waiting.as_str()
            );
            let claimed: Vec<Visit> = self.store.update(&claim_path, patch).await?;

            match claimed.into_iter().next() {
                Some(visit) => {
                    info!(
                        "Called patient token {} in chamber {}",
                        visit.token_number, visit.chamber_id
                    );
                    self.notifier
                        .publish(&QueueEvent::new(QueueEventKind::PatientCalled, visit.clone()))
                        .await;
                    return Ok(visit);
                }
                None => {
                    debug!(
                        "Visit {} already claimed, trying next candidate",
                        candidate.id
                    );
                }
            }
        }

        Err(QueueError::EmptyQueue)
    }

    /// Complete the in-progress visit holding `token_number`. Appends the
    /// terminal snapshot to the visit's history in the same write.
    pub async fn complete_by_token(
        &self,
        token_number: i64,
        note: Option<String>,
    ) -> Result<Visit, QueueError> {
        let lookup = format!(
            "/rest/v1/visits?token_number=eq.{}&status=eq.{}&limit=1",
            token_number,
            VisitStatus::InProgress.as_str()
        );
        let rows: Vec<Visit> = self.store.select(&lookup).await?;
        let current = rows.into_iter().next().ok_or(QueueError::NotInProgress)?;

        let now = Utc::now();
        let mut history = current.visit_history.clone();
        history.push(VisitHistoryEntry {
            visit_date: now,
            status: VisitStatus::Completed,
            chief_complaint: current.chief_complaint.clone(),
            chamber_id: current.chamber_id,
            token_number: current.token_number,
            doctor: current.assigned_doctor,
        });

        let mut patch = json!({
            "status": VisitStatus::Completed,
            "completed_at": now,
            "visit_history": history,
            "updated_at": now,
        });
        if let Some(note) = note {
            patch["prescription"] = json!(note);
        }

        // Conditional on still being in progress; losing that race means the
        // visit was completed or cancelled elsewhere in the meantime.
        let update_path = format!(
            "/rest/v1/visits?id=eq.{}&status=eq.{}",
            current.id,
            VisitStatus::InProgress.as_str()
        );
        let updated: Vec<Visit> = self.store.update(&update_path, patch).await?;
        let visit = updated.into_iter().next().ok_or(QueueError::NotInProgress)?;

        info!(
            "Completed visit token {} in chamber {}",
            visit.token_number, visit.chamber_id
        );
        self.notifier
            .publish(&QueueEvent::new(
                QueueEventKind::PatientCompleted,
                visit.clone(),
            ))
            .await;

        Ok(visit)
    }

    /// Cancel an active visit. No history entry is appended on cancellation.
    pub async fn cancel(&self, visit_id: Uuid) -> Result<Visit, QueueError> {
        let now = Utc::now();
        let update_path = format!(
            "/rest/v1/visits?id=eq.{}&status=in.(waiting,in-progress)",
            visit_id
        );
        let updated: Vec<Visit> = self
            .store
            .update(
                &update_path,
                json!({
                    "status": VisitStatus::Cancelled,
                    "updated_at": now,
                }),
            )
            .await?;

        match updated.into_iter().next() {
            Some(visit) => {
                info!("Cancelled visit {}", visit.id);
                self.notifier
                    .publish(&QueueEvent::new(
                        QueueEventKind::PatientUpdated,
                        visit.clone(),
                    ))
                    .await;
                Ok(visit)
            }
            None => {
                let exists_path = format!("/rest/v1/visits?id=eq.{}&limit=1", visit_id);
                let rows: Vec<Visit> = self.store.select(&exists_path).await?;
                if rows.is_empty() {
                    Err(QueueError::NotFound("Visit".to_string()))
                } else {
                    Err(QueueError::NotInProgress)
                }
            }
        }
    }

    /// Per-chamber snapshot for the doctor and receptionist dashboards.
    pub async fn chamber_queue(
        &self,
        chamber_id: Uuid,
    ) -> Result<ChamberQueueResponse, QueueError> {
        let path = format!(
            "/rest/v1/visits?chamber_id=eq.{}&status=in.(waiting,in-progress)&order=queue_number.asc",
            chamber_id
        );
        let visits: Vec<Visit> = self.store.select(&path).await?;

        Ok(ranking::chamber_snapshot(
            chamber_id,
            &visits,
            self.avg_consult_minutes,
            Utc::now(),
        ))
    }

    /// System-wide snapshot across all chambers.
    pub async fn global_queue(&self) -> Result<GlobalQueueResponse, QueueError> {
        let visits: Vec<Visit> = self
            .store
            .select("/rest/v1/visits?order=queue_number.asc")
            .await?;

        Ok(ranking::global_snapshot(
            &visits,
            self.avg_consult_minutes,
            Utc::now(),
        ))
    }

    /// Status counts and the priority breakdown of the waiting set.
    pub async fn stats(&self) -> Result<QueueStatsResponse, QueueError> {
        let waiting: Vec<Visit> = self
            .store
            .select("/rest/v1/visits?status=eq.waiting")
            .await?;
        let in_progress: Vec<Visit> = self
            .store
            .select("/rest/v1/visits?status=eq.in-progress")
            .await?;

        let today = Utc::now().date_naive();
        let completed_path = format!(
            "/rest/v1/visits?status=eq.completed&completed_at=gte.{}T00:00:00Z",
            today
        );
        let completed_today: Vec<Visit> = self.store.select(&completed_path).await?;

        let mut priority_breakdown: Vec<PriorityCount> = Vec::new();
        for visit in &waiting {
            match priority_breakdown
                .iter_mut()
                .find(|entry| entry.priority == visit.priority)
            {
                Some(entry) => entry.count += 1,
                None => priority_breakdown.push(PriorityCount {
                    priority: visit.priority,
                    count: 1,
                }),
            }
        }
        priority_breakdown.sort_by(|a, b| b.priority.rank().cmp(&a.priority.rank()));

        let avg_wait_minutes = if completed_today.is_empty() {
            0
        } else {
            self.avg_consult_minutes
        };

        Ok(QueueStatsResponse {
            waiting: waiting.len() as u64,
            in_progress: in_progress.len() as u64,
            completed_today: completed_today.len() as u64,
            avg_wait_minutes,
            priority_breakdown,
            total_today: (waiting.len() + in_progress.len() + completed_today.len()) as u64,
        })
    }
}
