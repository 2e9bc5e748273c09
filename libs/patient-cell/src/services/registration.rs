use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::StoreClient;

use queue_cell::error::QueueError;
use queue_cell::models::{
    QueueEntry, QueueEvent, QueueEventKind, Visit, VisitPriority, VisitStatus,
};
use queue_cell::services::notifier::QueueNotifier;
use queue_cell::services::ranking;

use crate::models::{PatientStatusResponse, RegisterVisitRequest};

#[derive(Debug, Deserialize)]
struct QueueNumberRow {
    queue_number: i64,
}

#[derive(Debug, Deserialize)]
struct TokenNumberRow {
    token_number: i64,
}

/// Registration and patient-facing lookups.
pub struct RegistrationService {
    store: StoreClient,
    notifier: QueueNotifier,
    avg_consult_minutes: u32,
}

impl RegistrationService {
    pub fn new(config: &AppConfig, notifier: QueueNotifier) -> Result<Self, QueueError> {
        Ok(Self {
            store: StoreClient::new(config)?,
            notifier,
            avg_consult_minutes: config.avg_consult_minutes,
        })
    }

    /// Register a new visit. The token number is sequential within the
    /// chamber, the queue number sequential across all chambers; both are
    /// assigned from the historical maximum so they are never reused.
    pub async fn register(
        &self,
        chamber_id: Uuid,
        request: RegisterVisitRequest,
    ) -> Result<Visit, QueueError> {
        let active_path = format!(
            "/rest/v1/visits?cid=eq.{}&status=in.(waiting,in-progress)&limit=1",
            request.cid
        );
        let active: Vec<Visit> = self.store.select(&active_path).await?;
        if !active.is_empty() {
            return Err(QueueError::DuplicateActiveVisit);
        }

        let queue_rows: Vec<QueueNumberRow> = self
            .store
            .select("/rest/v1/visits?select=queue_number&order=queue_number.desc&limit=1")
            .await?;
        let queue_number = queue_rows.first().map(|row| row.queue_number + 1).unwrap_or(1);

        let token_path = format!(
            "/rest/v1/visits?chamber_id=eq.{}&select=token_number&order=token_number.desc&limit=1",
            chamber_id
        );
        let token_rows: Vec<TokenNumberRow> = self.store.select(&token_path).await?;
        let token_number = token_rows.first().map(|row| row.token_number + 1).unwrap_or(1);

        debug!(
            "Registering cid {} in chamber {}: token {}, queue number {}",
            request.cid, chamber_id, token_number, queue_number
        );

        let now = Utc::now();
        let row = json!({
            "id": Uuid::new_v4(),
            "cid": request.cid,
            "name": request.name,
            "age": request.age,
            "gender": request.gender,
            "chief_complaint": request.chief_complaint,
            "chamber_id": chamber_id,
            "token_number": token_number,
            "queue_number": queue_number,
            "priority": request.priority.unwrap_or(VisitPriority::Normal),
            "status": VisitStatus::Waiting,
            "visit_history": [],
            "created_at": now,
            "updated_at": now,
        });

        let created: Vec<Visit> = self.store.insert("/rest/v1/visits", row).await?;
        let visit = created
            .into_iter()
            .next()
            .ok_or_else(|| QueueError::Store("Failed to create visit".to_string()))?;

        info!(
            "Registered patient {} with token {} in chamber {}",
            visit.cid, visit.token_number, visit.chamber_id
        );
        self.notifier
            .publish(&QueueEvent::new(
                QueueEventKind::PatientRegistered,
                visit.clone(),
            ))
            .await;

        Ok(visit)
    }

    /// Queue position and wait estimate for the patient's active visit.
    pub async fn status_by_cid(&self, cid: &str) -> Result<PatientStatusResponse, QueueError> {
        let lookup = format!(
            "/rest/v1/visits?cid=eq.{}&status=in.(waiting,in-progress)&limit=1",
            cid
        );
        let rows: Vec<Visit> = self.store.select(&lookup).await?;
        let visit = rows
            .into_iter()
            .next()
            .ok_or_else(|| QueueError::NotFound("Patient".to_string()))?;

        let chamber_path = format!(
            "/rest/v1/visits?chamber_id=eq.{}&status=in.(waiting,in-progress)&order=queue_number.asc",
            visit.chamber_id
        );
        let chamber_visits: Vec<Visit> = self.store.select(&chamber_path).await?;

        let ranked = ranking::rank_waiting(&chamber_visits);
        let total_waiting = ranked.len() as u32;

        let (queue_position, estimated_wait_minutes) = if visit.status == VisitStatus::InProgress {
            (0, 0)
        } else {
            let in_progress_present = chamber_visits
                .iter()
                .any(|v| v.status == VisitStatus::InProgress);
            let offset = if in_progress_present { 1 } else { 0 };

            let index = ranked
                .iter()
                .position(|v| v.id == visit.id)
                .unwrap_or(ranked.len());
            let position = index as u32 + 1 + offset;
            (position, position * self.avg_consult_minutes)
        };

        let now = Utc::now();
        Ok(PatientStatusResponse {
            patient: QueueEntry::from_visit(
                &visit,
                Some(queue_position),
                Some(estimated_wait_minutes),
                now,
            ),
            queue_position,
            estimated_wait_minutes,
            total_waiting,
        })
    }
}
