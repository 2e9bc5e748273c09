use assert_matches::assert_matches;
use chrono::Utc;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use queue_cell::error::QueueError;
use queue_cell::models::{Visit, VisitHistoryEntry, VisitPriority, VisitStatus};
use queue_cell::services::visits::VisitService;
use queue_cell::QueueNotifier;
use shared_config::AppConfig;
use shared_utils::test_utils::TestConfig;

fn make_visit(
    chamber_id: Uuid,
    token_number: i64,
    queue_number: i64,
    priority: VisitPriority,
    status: VisitStatus,
) -> Visit {
    let now = Utc::now();
    Visit {
        id: Uuid::new_v4(),
        cid: format!("CID-{}", queue_number),
        name: format!("Patient {}", queue_number),
        age: 52,
        gender: "male".to_string(),
        chief_complaint: "chest pain".to_string(),
        chamber_id,
        token_number,
        queue_number,
        priority,
        status,
        assigned_doctor: None,
        prescription: None,
        called_at: None,
        completed_at: None,
        visit_history: vec![],
        created_at: now,
        updated_at: now,
    }
}

fn store_config(mock_server: &MockServer) -> AppConfig {
    TestConfig::with_store_url(&mock_server.uri()).to_app_config()
}

async fn make_service(mock_server: &MockServer) -> (VisitService, QueueNotifier) {
    let config = store_config(mock_server);
    let notifier = QueueNotifier::new();
    let service =
        VisitService::new(&config, notifier.clone()).expect("service should initialize");
    (service, notifier)
}

#[tokio::test]
async fn call_next_selects_by_priority_and_emits_one_event() {
    let mock_server = MockServer::start().await;
    let (service, notifier) = make_service(&mock_server).await;

    let chamber = Uuid::new_v4();
    let normal = make_visit(chamber, 1, 1, VisitPriority::Normal, VisitStatus::Waiting);
    let emergency = make_visit(chamber, 2, 2, VisitPriority::Emergency, VisitStatus::Waiting);

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("chamber_id", format!("eq.{}", chamber)))
        .and(query_param("status", "eq.waiting"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(vec![normal.clone(), emergency.clone()]),
        )
        .mount(&mock_server)
        .await;

    let doctor = Uuid::new_v4();
    let mut called = emergency.clone();
    called.status = VisitStatus::InProgress;
    called.called_at = Some(Utc::now());
    called.assigned_doctor = Some(doctor);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visits"))
        .and(query_param("id", format!("eq.{}", emergency.id)))
        .and(query_param("status", "eq.waiting"))
        .and(body_partial_json(serde_json::json!({ "status": "in-progress" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![called.clone()]))
        .mount(&mock_server)
        .await;

    let (_subscriber, mut receiver) = notifier.subscribe().await;

    let visit = service
        .call_next(chamber, Some(doctor))
        .await
        .expect("call-next should succeed");

    assert_eq!(visit.token_number, 2, "emergency visit should be selected");
    assert_eq!(visit.status, VisitStatus::InProgress);
    assert_eq!(visit.assigned_doctor, Some(doctor));

    let event = receiver.try_recv().expect("exactly one event expected");
    assert_eq!(event.kind, queue_cell::QueueEventKind::PatientCalled);
    assert_eq!(event.visit.token_number, 2);
    assert_eq!(event.visit.chamber_id, chamber);
    assert!(receiver.try_recv().is_err(), "no second event expected");
}

#[tokio::test]
async fn call_next_falls_over_when_candidate_was_claimed() {
    let mock_server = MockServer::start().await;
    let (service, _notifier) = make_service(&mock_server).await;

    let chamber = Uuid::new_v4();
    let first = make_visit(chamber, 1, 1, VisitPriority::Normal, VisitStatus::Waiting);
    let second = make_visit(chamber, 2, 2, VisitPriority::Normal, VisitStatus::Waiting);

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("chamber_id", format!("eq.{}", chamber)))
        .and(query_param("status", "eq.waiting"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(vec![first.clone(), second.clone()]),
        )
        .mount(&mock_server)
        .await;

    // The best candidate was claimed by a concurrent caller: empty result.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visits"))
        .and(query_param("id", format!("eq.{}", first.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<Visit>::new()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut claimed = second.clone();
    claimed.status = VisitStatus::InProgress;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visits"))
        .and(query_param("id", format!("eq.{}", second.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![claimed]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let visit = service
        .call_next(chamber, None)
        .await
        .expect("fallover to the next candidate should succeed");
    assert_eq!(visit.id, second.id);
}

#[tokio::test]
async fn call_next_on_empty_chamber_returns_empty_queue() {
    let mock_server = MockServer::start().await;
    let (service, notifier) = make_service(&mock_server).await;

    let chamber = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("chamber_id", format!("eq.{}", chamber)))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<Visit>::new()))
        .mount(&mock_server)
        .await;

    // No mutation may happen on an empty queue
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<Visit>::new()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (_subscriber, mut receiver) = notifier.subscribe().await;

    let result = service.call_next(chamber, None).await;
    assert_matches!(result, Err(QueueError::EmptyQueue));
    assert!(receiver.try_recv().is_err(), "no event may be emitted");
}

#[tokio::test]
async fn complete_appends_exactly_one_history_entry() {
    let mock_server = MockServer::start().await;
    let (service, notifier) = make_service(&mock_server).await;

    let chamber = Uuid::new_v4();
    let doctor = Uuid::new_v4();
    let mut current = make_visit(chamber, 5, 9, VisitPriority::Normal, VisitStatus::InProgress);
    current.assigned_doctor = Some(doctor);

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("token_number", "eq.5"))
        .and(query_param("status", "eq.in-progress"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![current.clone()]))
        .mount(&mock_server)
        .await;

    let mut completed = current.clone();
    completed.status = VisitStatus::Completed;
    completed.completed_at = Some(Utc::now());
    completed.prescription = Some("rest and fluids".to_string());
    completed.visit_history = vec![VisitHistoryEntry {
        visit_date: Utc::now(),
        status: VisitStatus::Completed,
        chief_complaint: current.chief_complaint.clone(),
        chamber_id: chamber,
        token_number: 5,
        doctor: Some(doctor),
    }];

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visits"))
        .and(query_param("id", format!("eq.{}", current.id)))
        .and(query_param("status", "eq.in-progress"))
        .and(body_partial_json(serde_json::json!({
            "status": "completed",
            "prescription": "rest and fluids",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![completed]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (_subscriber, mut receiver) = notifier.subscribe().await;

    let visit = service
        .complete_by_token(5, Some("rest and fluids".to_string()))
        .await
        .expect("complete should succeed");

    assert_eq!(visit.status, VisitStatus::Completed);
    assert_eq!(visit.visit_history.len(), 1);
    assert_eq!(visit.visit_history[0].token_number, 5);
    assert_eq!(visit.visit_history[0].doctor, Some(doctor));

    let event = receiver.try_recv().expect("exactly one event expected");
    assert_eq!(event.kind, queue_cell::QueueEventKind::PatientCompleted);
    assert_eq!(event.visit.token_number, 5);
}

#[tokio::test]
async fn complete_on_a_waiting_visit_is_rejected() {
    let mock_server = MockServer::start().await;
    let (service, notifier) = make_service(&mock_server).await;

    // Token 9 was never called: no in-progress row matches.
    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("token_number", "eq.9"))
        .and(query_param("status", "eq.in-progress"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<Visit>::new()))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<Visit>::new()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (_subscriber, mut receiver) = notifier.subscribe().await;

    let result = service.complete_by_token(9, None).await;
    assert_matches!(result, Err(QueueError::NotInProgress));
    assert!(receiver.try_recv().is_err(), "no event may be emitted");
}

#[tokio::test]
async fn cancel_active_visit_emits_update_event() {
    let mock_server = MockServer::start().await;
    let (service, notifier) = make_service(&mock_server).await;

    let chamber = Uuid::new_v4();
    let mut cancelled = make_visit(chamber, 3, 3, VisitPriority::Normal, VisitStatus::Waiting);
    let visit_id = cancelled.id;
    cancelled.status = VisitStatus::Cancelled;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visits"))
        .and(query_param("id", format!("eq.{}", visit_id)))
        .and(query_param("status", "in.(waiting,in-progress)"))
        .and(body_partial_json(serde_json::json!({ "status": "cancelled" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![cancelled]))
        .mount(&mock_server)
        .await;

    let (_subscriber, mut receiver) = notifier.subscribe().await;

    let visit = service.cancel(visit_id).await.expect("cancel should succeed");
    assert_eq!(visit.status, VisitStatus::Cancelled);
    // Cancellation records no history entry
    assert!(visit.visit_history.is_empty());

    let event = receiver.try_recv().expect("exactly one event expected");
    assert_eq!(event.kind, queue_cell::QueueEventKind::PatientUpdated);
}

#[tokio::test]
async fn cancel_unknown_visit_returns_not_found() {
    let mock_server = MockServer::start().await;
    let (service, _notifier) = make_service(&mock_server).await;

    let visit_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<Visit>::new()))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("id", format!("eq.{}", visit_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<Visit>::new()))
        .mount(&mock_server)
        .await;

    let result = service.cancel(visit_id).await;
    assert_matches!(result, Err(QueueError::NotFound(_)));
}

#[tokio::test]
async fn stats_aggregate_counts_and_priority_breakdown() {
    let mock_server = MockServer::start().await;
    let (service, _notifier) = make_service(&mock_server).await;

    let chamber = Uuid::new_v4();
    let waiting = vec![
        make_visit(chamber, 1, 1, VisitPriority::Normal, VisitStatus::Waiting),
        make_visit(chamber, 2, 2, VisitPriority::Emergency, VisitStatus::Waiting),
        make_visit(chamber, 3, 3, VisitPriority::Normal, VisitStatus::Waiting),
    ];
    let in_progress = vec![make_visit(
        chamber,
        4,
        4,
        VisitPriority::Normal,
        VisitStatus::InProgress,
    )];
    let mut done = make_visit(chamber, 5, 5, VisitPriority::Normal, VisitStatus::Completed);
    done.completed_at = Some(Utc::now());

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("status", "eq.waiting"))
        .respond_with(ResponseTemplate::new(200).set_body_json(waiting))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("status", "eq.in-progress"))
        .respond_with(ResponseTemplate::new(200).set_body_json(in_progress))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("status", "eq.completed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![done]))
        .mount(&mock_server)
        .await;

    let stats = service.stats().await.expect("stats should succeed");

    assert_eq!(stats.waiting, 3);
    assert_eq!(stats.in_progress, 1);
    assert_eq!(stats.completed_today, 1);
    assert_eq!(stats.total_today, 5);
    assert_eq!(stats.avg_wait_minutes, 10);

    assert_eq!(stats.priority_breakdown.len(), 2);
    assert_eq!(stats.priority_breakdown[0].priority, VisitPriority::Emergency);
    assert_eq!(stats.priority_breakdown[0].count, 1);
    assert_eq!(stats.priority_breakdown[1].priority, VisitPriority::Normal);
    assert_eq!(stats.priority_breakdown[1].count, 2);
}

#[tokio::test]
async fn unreachable_store_surfaces_as_store_unavailable() {
    let (service, _notifier) = {
        // Point at a port nothing listens on
        let mut config = TestConfig::with_store_url("http://127.0.0.1:9").to_app_config();
        config.store_timeout_secs = 1;
        let notifier = QueueNotifier::new();
        (
            VisitService::new(&config, notifier.clone()).expect("service should initialize"),
            notifier,
        )
    };

    let result = service.call_next(Uuid::new_v4(), None).await;
    assert_matches!(result, Err(QueueError::StoreUnavailable(_)));
}
