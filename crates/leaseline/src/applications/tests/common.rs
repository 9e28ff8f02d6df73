use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::applications::autosave::{DraftSnapshot, DraftTransport, TransportError};
use crate::applications::domain::{
    Actor, ActorRole, ApplicantId, Application, ApplicationId, ConditionalRequirementSpec,
    PropertyId, RequirementKind,
};
use crate::applications::draft::DraftReceipt;
use crate::applications::repository::{
    ApplicationFilter, ApplicationRepository, PropertyDirectory, PropertySnapshot, RepositoryError,
};
use crate::applications::service::ApplicationService;
use crate::config::LifecyclePolicy;

/// Versioned in-memory repository mirroring the production adapter.
#[derive(Default)]
pub(super) struct MemoryRepository {
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
        let mut records: Vec<Application> = guard
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(records)
    }
}

impl MemoryRepository {
    /// Overwrite a record unconditionally, simulating a concurrent writer.
    pub(super) fn force_put(&self, record: Application) {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(record.id.clone(), record);
    }
}

/// Read-only property catalog with a single listing.
#[derive(Default)]
pub(super) struct MemoryDirectory;

impl PropertyDirectory for MemoryDirectory {
    fn property(&self, id: &PropertyId) -> Option<PropertySnapshot> {
        (id.0 == "prop-1").then(|| PropertySnapshot {
            id: id.clone(),
            title: "Riverfront Lofts A-201".to_string(),
            address: "201 River St, Des Moines, IA".to_string(),
            fee_cents: 4500,
        })
    }
}

pub(super) fn service() -> (Arc<MemoryRepository>, ApplicationService<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    let service = ApplicationService::new(repository.clone(), LifecyclePolicy::default());
    (repository, service)
}

pub(super) fn applicant_id() -> ApplicantId {
    ApplicantId("alice".to_string())
}

pub(super) fn property_id() -> PropertyId {
    PropertyId("prop-1".to_string())
}

pub(super) fn applicant() -> Actor {
    Actor::new("alice", ActorRole::Renter)
}

pub(super) fn other_applicant() -> Actor {
    Actor::new("bob", ActorRole::Renter)
}

pub(super) fn landlord() -> Actor {
    Actor::new("lamar", ActorRole::Landlord)
}

pub(super) fn admin() -> Actor {
    Actor::new("ada", ActorRole::Admin)
}

pub(super) fn complete_fields() -> BTreeMap<String, Value> {
    [
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
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
}

pub(super) fn fields(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

pub(super) fn requirement_specs() -> Vec<ConditionalRequirementSpec> {
    vec![
        ConditionalRequirementSpec {
            kind: RequirementKind::Document,
            description: "Provide proof of renter's insurance".to_string(),
            required: true,
        },
        ConditionalRequirementSpec {
            kind: RequirementKind::Verification,
            description: "Complete employment verification call".to_string(),
            required: true,
        },
        ConditionalRequirementSpec {
            kind: RequirementKind::Information,
            description: "Preferred move-in window".to_string(),
            required: false,
        },
    ]
}

pub(super) fn due_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 15).expect("valid date")
}

/// Walk a fresh record to `submitted` through the public service surface.
pub(super) fn submitted_application(
    service: &ApplicationService<MemoryRepository>,
) -> ApplicationId {
    let receipt = service
        .upsert_draft(&applicant_id(), &property_id(), 4, complete_fields())
        .expect("draft saves");
    service
        .submit_application(&applicant(), &receipt.id)
        .expect("submission succeeds");
    receipt.id
}

/// Transport whose responses are scripted ahead of time, recording each call.
#[derive(Default)]
pub(super) struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<DraftReceipt, TransportError>>>,
    calls: Mutex<Vec<TransportCall>>,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum TransportCall {
    Create(DraftSnapshot),
    Update(ApplicationId, DraftSnapshot),
}

impl ScriptedTransport {
    pub(super) fn push(&self, response: Result<DraftReceipt, TransportError>) {
        self.responses
            .lock()
            .expect("transport mutex poisoned")
            .push_back(response);
    }

    pub(super) fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().expect("transport mutex poisoned").clone()
    }

    fn next(&self) -> Result<DraftReceipt, TransportError> {
        self.responses
            .lock()
            .expect("transport mutex poisoned")
            .pop_front()
            .expect("scripted transport exhausted")
    }
}

impl DraftTransport for ScriptedTransport {
    fn create(&self, snapshot: &DraftSnapshot) -> Result<DraftReceipt, TransportError> {
        self.calls
            .lock()
            .expect("transport mutex poisoned")
            .push(TransportCall::Create(snapshot.clone()));
        self.next()
    }

    fn update(
        &self,
        id: &ApplicationId,
        snapshot: &DraftSnapshot,
    ) -> Result<DraftReceipt, TransportError> {
        self.calls
            .lock()
            .expect("transport mutex poisoned")
            .push(TransportCall::Update(id.clone(), snapshot.clone()));
        self.next()
    }
}

/// Transport wired straight into the service, for end-to-end autosave tests.
pub(super) struct ServiceTransport {
    pub(super) service: Arc<ApplicationService<MemoryRepository>>,
}

impl DraftTransport for ServiceTransport {
    fn create(&self, snapshot: &DraftSnapshot) -> Result<DraftReceipt, TransportError> {
        self.service
            .upsert_draft(
                &snapshot.applicant_id,
                &snapshot.property_id,
                snapshot.step,
                snapshot.fields.clone(),
            )
            .map_err(|err| TransportError::Rejected(err.to_string()))
    }

    fn update(
        &self,
        id: &ApplicationId,
        snapshot: &DraftSnapshot,
    ) -> Result<DraftReceipt, TransportError> {
        self.service
            .autosave_by_id(&snapshot.applicant_id, id, snapshot.step, snapshot.fields.clone())
            .map_err(|err| TransportError::Rejected(err.to_string()))
    }
}

pub(super) fn snapshot(step: u16, pairs: &[(&str, Value)]) -> DraftSnapshot {
    DraftSnapshot {
        applicant_id: applicant_id(),
        property_id: property_id(),
        step,
        fields: fields(pairs),
    }
}
