use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

use super::common::*;
use crate::applications::autosave::{AutosaveCoordinator, SaveStatus, TransportError};
use crate::applications::domain::{ApplicationId, ApplicationStatus};
use crate::applications::draft::DraftReceipt;

fn at(seconds: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, seconds)
        .single()
        .expect("valid time")
}

fn ok_receipt(id: &str) -> Result<DraftReceipt, TransportError> {
    Ok(DraftReceipt {
        id: ApplicationId(id.to_string()),
        status: ApplicationStatus::Draft,
    })
}

#[test]
fn trigger_shows_saving_synchronously_and_settles_to_saved() {
    let transport = ScriptedTransport::default();
    transport.push(ok_receipt("app-000001"));

    let mut coordinator = AutosaveCoordinator::new(2);
    assert_eq!(coordinator.status(at(0)), SaveStatus::Idle);

    coordinator.trigger(snapshot(1, &[("first_name", json!("Alice"))]));
    assert_eq!(coordinator.status(at(0)), SaveStatus::Saving);

    let status = coordinator.save(&transport, at(1));
    assert_eq!(status, SaveStatus::Saved);
}

#[test]
fn saved_returns_to_idle_after_two_seconds() {
    let transport = ScriptedTransport::default();
    transport.push(ok_receipt("app-000001"));

    let mut coordinator = AutosaveCoordinator::new(0);
    coordinator.trigger(snapshot(1, &[]));
    coordinator.save(&transport, at(1));

    assert_eq!(coordinator.status(at(1) + Duration::milliseconds(1_999)), SaveStatus::Saved);
    assert_eq!(coordinator.status(at(3)), SaveStatus::Idle);
}

#[test]
fn error_returns_to_idle_after_three_seconds() {
    let transport = ScriptedTransport::default();
    transport.push(Err(TransportError::Unavailable("boom".to_string())));

    let mut coordinator = AutosaveCoordinator::new(0);
    coordinator.trigger(snapshot(1, &[]));
    let status = coordinator.save(&transport, at(1));

    assert_eq!(status, SaveStatus::Error);
    assert_eq!(coordinator.status(at(1) + Duration::milliseconds(2_999)), SaveStatus::Error);
    assert_eq!(coordinator.status(at(4)), SaveStatus::Idle);
}

#[test]
fn first_save_pins_the_assigned_id_for_later_saves() {
    let transport = ScriptedTransport::default();
    transport.push(ok_receipt("app-000007"));
    transport.push(ok_receipt("app-000007"));

    let mut coordinator = AutosaveCoordinator::new(0);
    coordinator.trigger(snapshot(1, &[("first_name", json!("Alice"))]));
    coordinator.save(&transport, at(1));
    coordinator.trigger(snapshot(2, &[("employer_name", json!("Prairie"))]));
    coordinator.save(&transport, at(2));

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(calls[0], TransportCall::Create(_)));
    match &calls[1] {
        TransportCall::Update(id, _) => assert_eq!(id.0, "app-000007"),
        other => panic!("expected pinned update, got {other:?}"),
    }
    assert_eq!(coordinator.application_id().map(|id| id.0.as_str()), Some("app-000007"));
}

#[test]
fn rapid_triggers_coalesce_into_one_save_of_the_latest_snapshot() {
    let transport = ScriptedTransport::default();
    transport.push(ok_receipt("app-000001"));

    let mut coordinator = AutosaveCoordinator::new(0);
    coordinator.trigger(snapshot(1, &[("phone", json!("515-555-0000"))]));
    coordinator.trigger(snapshot(1, &[("phone", json!("515-555-0142"))]));
    coordinator.save(&transport, at(1));

    let calls = transport.calls();
    assert_eq!(calls.len(), 1, "superseded snapshot never reaches the wire");
    match &calls[0] {
        TransportCall::Create(sent) => {
            assert_eq!(sent.fields["phone"], json!("515-555-0142"));
        }
        other => panic!("expected a create, got {other:?}"),
    }
}

#[test]
fn late_response_of_a_superseded_save_is_discarded() {
    let mut coordinator = AutosaveCoordinator::new(0);
    coordinator.trigger(snapshot(1, &[("phone", json!("old"))]));
    let in_flight = coordinator.begin_save().expect("snapshot pending");

    // A newer trigger supersedes the in-flight save before it settles.
    coordinator.trigger(snapshot(1, &[("phone", json!("new"))]));
    coordinator.complete(in_flight.generation, ok_receipt("app-000099"), at(1));

    // The stale response moved neither the signal nor the pinned id.
    assert_eq!(coordinator.status(at(1)), SaveStatus::Saving);
    assert!(coordinator.application_id().is_none());
}

#[test]
fn timeouts_retry_transparently_up_to_the_bound() {
    let transport = ScriptedTransport::default();
    transport.push(Err(TransportError::Timeout));
    transport.push(Err(TransportError::Timeout));
    transport.push(ok_receipt("app-000001"));

    let mut coordinator = AutosaveCoordinator::new(2);
    coordinator.trigger(snapshot(1, &[]));
    let status = coordinator.save(&transport, at(1));

    assert_eq!(status, SaveStatus::Saved);
    assert_eq!(transport.calls().len(), 3);
}

#[test]
fn timeout_past_the_bound_surfaces_error() {
    let transport = ScriptedTransport::default();
    transport.push(Err(TransportError::Timeout));
    transport.push(Err(TransportError::Timeout));

    let mut coordinator = AutosaveCoordinator::new(1);
    coordinator.trigger(snapshot(1, &[]));
    let status = coordinator.save(&transport, at(1));

    assert_eq!(status, SaveStatus::Error);
    assert_eq!(transport.calls().len(), 2);
}

#[test]
fn coordinator_against_the_live_service_rejects_saves_after_submission() {
    let (_, service) = service();
    let service = Arc::new(service);
    let transport = ServiceTransport {
        service: service.clone(),
    };

    let mut coordinator = AutosaveCoordinator::new(0);
    let mut complete = snapshot(4, &[]);
    complete.fields = complete_fields();
    coordinator.trigger(complete);
    assert_eq!(coordinator.save(&transport, at(1)), SaveStatus::Saved);

    let id = coordinator.application_id().expect("id pinned").clone();
    service
        .submit_application(&applicant(), &id)
        .expect("submission succeeds");

    coordinator.trigger(snapshot(1, &[("phone", json!("too late"))]));
    assert_eq!(coordinator.save(&transport, at(5)), SaveStatus::Error);
}
