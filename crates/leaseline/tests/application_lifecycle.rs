//! End-to-end scenarios for the application lifecycle, driven entirely
//! through the public service facade: resumable intake, explicit submission,
//! moderation to a terminal status, and the fee ledger along the way.

mod common {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::{Arc, Mutex};

    use serde_json::{json, Value};

    use leaseline::applications::{
        ApplicantId, Application, ApplicationFilter, ApplicationId, ApplicationRepository,
        ApplicationService, PropertyId, RepositoryError,
    };
    use leaseline::config::LifecyclePolicy;

    #[derive(Default)]
    pub struct MemoryRepository {
        records: Mutex<HashMap<ApplicationId, Application>>,
    }

    impl ApplicationRepository for MemoryRepository {
        fn insert(&self, mut record: Application) -> Result<Application, RepositoryError> {
            let mut guard = self.records.lock().expect("repository mutex poisoned");
            if guard.contains_key(&record.id) {
                return Err(RepositoryError::Duplicate);
            }
            record.version = 1;
            guard.insert(record.id.clone(), record.clone());
            Ok(record)
        }

        fn update(
            &self,
            mut record: Application,
            expected_version: u64,
        ) -> Result<Application, RepositoryError> {
            let mut guard = self.records.lock().expect("repository mutex poisoned");
            let stored = guard.get(&record.id).ok_or(RepositoryError::NotFound)?;
            if stored.version != expected_version {
                return Err(RepositoryError::VersionMismatch);
            }
            record.version = expected_version + 1;
            guard.insert(record.id.clone(), record.clone());
            Ok(record)
        }

        fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
            let guard = self.records.lock().expect("repository mutex poisoned");
            Ok(guard.get(id).cloned())
        }

        fn find_open(
            &self,
            applicant_id: &ApplicantId,
            property_id: &PropertyId,
        ) -> Result<Option<Application>, RepositoryError> {
            let guard = self.records.lock().expect("repository mutex poisoned");
            Ok(guard
                .values()
                .filter(|record| {
                    record.status.is_open()
                        && &record.applicant_id == applicant_id
                        && &record.property_id == property_id
                })
                .max_by_key(|record| record.updated_at)
                .cloned())
        }

        fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError> {
            let guard = self.records.lock().expect("repository mutex poisoned");
            Ok(guard
                .values()
                .filter(|record| filter.matches(record))
                .cloned()
                .collect())
        }
    }

    pub fn service() -> ApplicationService<MemoryRepository> {
        ApplicationService::new(
            Arc::new(MemoryRepository::default()),
            LifecyclePolicy::default(),
        )
    }

    pub fn applicant_id() -> ApplicantId {
        ApplicantId("alice".to_string())
    }

    pub fn property_id() -> PropertyId {
        PropertyId("prop-1".to_string())
    }

    pub fn fields(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    pub fn complete_fields() -> BTreeMap<String, Value> {
        fields(&[
            ("first_name", json!("Alice")),
            ("last_name", json!("Winters")),
            ("email", json!("alice@example.com")),
            ("phone", json!("515-555-0142")),
            ("current_address", json!("12 Maple St, Des Moines")),
            ("current_landlord_name", json!("Maple Street Mgmt")),
            ("employer_name", json!("Prairie Analytics")),
            ("monthly_income_cents", json!(420_000)),
            ("background_check_consent", json!(true)),
            ("signature", json!("Alice Winters")),
        ])
    }
}

use chrono::NaiveDate;
use serde_json::json;

use common::*;
use leaseline::applications::{
    Actor, ActorRole, ApplicationServiceError, ApplicationStatus, ConditionalRequirementSpec,
    PaymentMethod, PaymentOutcome, PaymentStatus, RequirementKind, TransitionRequest,
};

#[test]
fn stepwise_autosave_then_submission_preserves_the_merged_payload() {
    let service = service();
    let applicant = Actor::new("alice", ActorRole::Renter);

    // Step-by-step saves, including a backward navigation before submitting.
    let receipt = service
        .upsert_draft(
            &applicant_id(),
            &property_id(),
            1,
            fields(&[
                ("first_name", json!("Alice")),
                ("last_name", json!("Winters")),
                ("email", json!("alice@example.com")),
                ("phone", json!("515-555-0142")),
            ]),
        )
        .expect("step 1 saves");
    service
        .upsert_draft(
            &applicant_id(),
            &property_id(),
            2,
            fields(&[
                ("current_address", json!("12 Maple St, Des Moines")),
                ("current_landlord_name", json!("Maple Street Mgmt")),
            ]),
        )
        .expect("step 2 saves");
    service
        .upsert_draft(
            &applicant_id(),
            &property_id(),
            3,
            fields(&[
                ("employer_name", json!("Prairie Analytics")),
                ("monthly_income_cents", json!(420_000)),
            ]),
        )
        .expect("step 3 saves");
    service
        .upsert_draft(
            &applicant_id(),
            &property_id(),
            1,
            fields(&[("phone", json!("515-555-0199"))]),
        )
        .expect("backward correction saves");
    service
        .upsert_draft(
            &applicant_id(),
            &property_id(),
            4,
            fields(&[
                ("background_check_consent", json!(true)),
                ("signature", json!("Alice Winters")),
            ]),
        )
        .expect("step 4 saves");

    // Resume sees the union of all saves and the furthest step.
    let draft = service
        .get_draft(&applicant_id(), &property_id())
        .expect("lookup succeeds")
        .expect("draft present");
    assert_eq!(draft.furthest_step, 4);
    assert_eq!(draft.fields["first_name"], json!("Alice"));
    assert_eq!(draft.fields["phone"], json!("515-555-0199"));
    assert_eq!(draft.fields["employer_name"], json!("Prairie Analytics"));

    let record = service
        .submit_application(&applicant, &receipt.id)
        .expect("submission succeeds");
    assert_eq!(record.status, ApplicationStatus::Submitted);

    // Late-arriving autosaves bounce off the frozen payload.
    match service.autosave_by_id(
        &applicant_id(),
        &receipt.id,
        1,
        fields(&[("phone", json!("too late"))]),
    ) {
        Err(ApplicationServiceError::Conflict { .. }) => {}
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn moderation_walks_to_approved_with_fee_and_requirements() {
    let service = service();
    let applicant = Actor::new("alice", ActorRole::Renter);
    let landlord = Actor::new("lamar", ActorRole::Landlord);
    let admin = Actor::new("ada", ActorRole::Admin);

    let receipt = service
        .upsert_draft(&applicant_id(), &property_id(), 4, complete_fields())
        .expect("draft saves");
    let id = receipt.id;
    service
        .submit_application(&applicant, &id)
        .expect("submission succeeds");

    // Fee: one declined card, then a successful retry.
    service
        .record_payment_attempt(
            &id,
            PaymentMethod::Card,
            4500,
            PaymentOutcome::Failed,
            Some("card declined".to_string()),
        )
        .expect("failed attempt recorded");
    service
        .record_payment_attempt(&id, PaymentMethod::Card, 4500, PaymentOutcome::Success, None)
        .expect("retry succeeds");

    service
        .transition_status(
            &landlord,
            &id,
            &TransitionRequest::to(ApplicationStatus::UnderReview),
        )
        .expect("review starts");
    service
        .transition_status(
            &landlord,
            &id,
            &TransitionRequest::request_info("Most recent pay stub is older than 60 days"),
        )
        .expect("info requested");
    service
        .transition_status(
            &applicant,
            &id,
            &TransitionRequest::to(ApplicationStatus::UnderReview),
        )
        .expect("applicant supplies info");

    let due = NaiveDate::from_ymd_opt(2026, 10, 15).expect("valid date");
    service
        .transition_status(
            &landlord,
            &id,
            &TransitionRequest::conditional_approval(
                "Approved pending insurance",
                due,
                vec![ConditionalRequirementSpec {
                    kind: RequirementKind::Document,
                    description: "Provide proof of renter's insurance".to_string(),
                    required: true,
                }],
            ),
        )
        .expect("conditional approval granted");

    // Satisfaction informs but never auto-approves.
    let record = service
        .satisfy_requirement(&admin, &id, "req-1", Some("file-insurance-1".to_string()))
        .expect("requirement satisfied");
    assert_eq!(record.status, ApplicationStatus::ConditionalApproval);

    let record = service
        .transition_status(&admin, &id, &TransitionRequest::to(ApplicationStatus::Approved))
        .expect("explicit approval");
    assert_eq!(record.status, ApplicationStatus::Approved);
    assert_eq!(record.payment_status, PaymentStatus::Paid);
    assert_eq!(record.payment_attempts.len(), 2);
    assert_eq!(record.info_requested_reason, None);
}
