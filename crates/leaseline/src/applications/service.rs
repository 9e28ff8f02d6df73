use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{info, warn};

use super::domain::{
    Actor, ActorRole, ApplicantId, Application, ApplicationId, ApplicationStatus, PaymentAttempt,
    PaymentMethod, PaymentOutcome, PropertyId,
};
use super::draft::{self, DraftReceipt};
use super::intake::IntakeBlueprint;
use super::lifecycle::{self, TransitionError, TransitionRequest};
use super::payments;
use super::repository::{ApplicationFilter, ApplicationRepository, RepositoryError};
use super::requirements;
use crate::config::LifecyclePolicy;

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("app-{id:06}"))
}

/// Facade over the draft store, lifecycle table, and trackers. All mutating
/// operations are fetch–mutate–conditional-write: the repository refuses the
/// write when another actor has moved the record in the interim, and the
/// caller sees that as a conflict to re-read and retry.
pub struct ApplicationService<R> {
    repository: Arc<R>,
    blueprint: IntakeBlueprint,
    policy: LifecyclePolicy,
}

impl<R> ApplicationService<R>
where
    R: ApplicationRepository + 'static,
{
    pub fn new(repository: Arc<R>, policy: LifecyclePolicy) -> Self {
        Self {
            repository,
            blueprint: IntakeBlueprint::standard(),
            policy,
        }
    }

    pub fn blueprint(&self) -> &IntakeBlueprint {
        &self.blueprint
    }

    pub fn policy(&self) -> LifecyclePolicy {
        self.policy
    }

    /// Draft-store upsert keyed by applicant and property: the first save
    /// creates the record and assigns its id, every later save merges into
    /// the same open record.
    pub fn upsert_draft(
        &self,
        applicant_id: &ApplicantId,
        property_id: &PropertyId,
        step: u16,
        fields: BTreeMap<String, Value>,
    ) -> Result<DraftReceipt, ApplicationServiceError> {
        let now = Utc::now();
        match self.repository.find_open(applicant_id, property_id)? {
            Some(mut record) => {
                let expected = record.version;
                draft::apply_autosave(&mut record, step, fields, &self.blueprint, now).map_err(
                    |frozen| ApplicationServiceError::Conflict {
                        reason: frozen.to_string(),
                    },
                )?;
                let stored = self.versioned_update(record, expected)?;
                Ok(DraftReceipt::from_record(&stored))
            }
            None => {
                let record = draft::start_draft(
                    next_application_id(),
                    applicant_id.clone(),
                    property_id.clone(),
                    step,
                    fields,
                    &self.blueprint,
                    now,
                );
                let stored = self.repository.insert(record)?;
                info!(id = %stored.id, "draft application created");
                Ok(DraftReceipt::from_record(&stored))
            }
        }
    }

    /// Autosave pinned to an id (the PATCH path). Fails hard when the id does
    /// not belong to the applicant; a silent merge here would let one tenant
    /// corrupt another's draft.
    pub fn autosave_by_id(
        &self,
        applicant_id: &ApplicantId,
        id: &ApplicationId,
        step: u16,
        fields: BTreeMap<String, Value>,
    ) -> Result<DraftReceipt, ApplicationServiceError> {
        let now = Utc::now();
        let mut record = self.fetch_record(id)?;
        if &record.applicant_id != applicant_id {
            warn!(id = %id, "autosave rejected: applicant does not own this record");
            return Err(ApplicationServiceError::NotFound);
        }

        let expected = record.version;
        draft::apply_autosave(&mut record, step, fields, &self.blueprint, now).map_err(
            |frozen| ApplicationServiceError::Conflict {
                reason: frozen.to_string(),
            },
        )?;
        let stored = self.versioned_update(record, expected)?;
        Ok(DraftReceipt::from_record(&stored))
    }

    /// Resume support: the most recently updated open record for the pair,
    /// with `furthest_step` telling the form where to reopen.
    pub fn get_draft(
        &self,
        applicant_id: &ApplicantId,
        property_id: &PropertyId,
    ) -> Result<Option<Application>, ApplicationServiceError> {
        Ok(self.repository.find_open(applicant_id, property_id)?)
    }

    /// Explicit submission. Validates the full required field set against the
    /// intake blueprint, then drives the draft→submitted edge; from here on
    /// the fields are the permanent application payload.
    pub fn submit_application(
        &self,
        actor: &Actor,
        id: &ApplicationId,
    ) -> Result<Application, ApplicationServiceError> {
        let now = Utc::now();
        let mut record = self.fetch_record(id)?;
        let expected = record.version;

        let missing = self.blueprint.missing_fields(&record.fields);
        if !missing.is_empty() {
            return Err(ApplicationServiceError::Validation {
                reason: format!("missing required fields: {}", missing.join(", ")),
            });
        }

        lifecycle::apply(
            &mut record,
            &TransitionRequest::to(ApplicationStatus::Submitted),
            actor,
            now,
        )
        .map_err(ApplicationServiceError::from_transition)?;

        let stored = self.versioned_update(record, expected)?;
        info!(id = %stored.id, "application submitted");
        Ok(stored)
    }

    /// Guarded status transition. Optimistic: the conditional write detects
    /// a racing actor and surfaces a conflict instead of silently
    /// overwriting their decision.
    pub fn transition_status(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        request: &TransitionRequest,
    ) -> Result<Application, ApplicationServiceError> {
        let now = Utc::now();
        let mut record = self.fetch_record(id)?;
        let expected = record.version;
        let from = record.status;

        lifecycle::apply(&mut record, request, actor, now)
            .map_err(ApplicationServiceError::from_transition)?;

        let stored = self.versioned_update(record, expected)?;
        info!(
            id = %stored.id,
            from = from.label(),
            to = stored.status.label(),
            role = actor.role.label(),
            "application status transition"
        );
        Ok(stored)
    }

    /// Idempotent requirement satisfaction. Informs, never approves: the
    /// conditional-approval→approved edge stays an explicit actor action.
    pub fn satisfy_requirement(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        requirement_id: &str,
        notes: Option<String>,
    ) -> Result<Application, ApplicationServiceError> {
        let now = Utc::now();
        let mut record = self.fetch_record(id)?;
        if !(actor.role.is_staff() || actor.owns(&record.applicant_id)) {
            return Err(ApplicationServiceError::Forbidden { role: actor.role });
        }

        let expected = record.version;
        match requirements::satisfy(&mut record, requirement_id, notes, now) {
            Ok(requirements::SatisfyOutcome::NewlySatisfied) => {
                let stored = self.versioned_update(record, expected)?;
                info!(id = %stored.id, requirement = requirement_id, "requirement satisfied");
                Ok(stored)
            }
            Ok(requirements::SatisfyOutcome::AlreadySatisfied) => Ok(record),
            Err(requirements::RequirementError::UnknownRequirement(_)) => {
                Err(ApplicationServiceError::NotFound)
            }
            Err(requirements::RequirementError::Frozen) => Err(ApplicationServiceError::Conflict {
                reason: "requirements are frozen once approved".to_string(),
            }),
        }
    }

    /// Append a fee attempt to the ledger. Failed attempts never block a
    /// retry; a success makes `paid` sticky and later calls are refused
    /// without growing the ledger.
    pub fn record_payment_attempt(
        &self,
        id: &ApplicationId,
        method: PaymentMethod,
        amount_cents: u32,
        outcome: PaymentOutcome,
        error_message: Option<String>,
    ) -> Result<PaymentAttempt, ApplicationServiceError> {
        let now = Utc::now();
        let mut record = self.fetch_record(id)?;
        let expected = record.version;

        let attempt =
            payments::record_attempt(&mut record, method, amount_cents, outcome, error_message, now)
                .map_err(|_| ApplicationServiceError::AlreadyPaid)?;

        self.versioned_update(record, expected)?;
        info!(id = %id, reference = attempt.reference_id.as_str(), outcome = ?attempt.outcome, "payment attempt recorded");
        Ok(attempt)
    }

    pub fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, ApplicationServiceError> {
        Ok(self.repository.list(filter)?)
    }

    pub fn get(&self, id: &ApplicationId) -> Result<Application, ApplicationServiceError> {
        self.fetch_record(id)
    }

    /// Time-based expiry sweep: pre-decision records with no staff action
    /// inside the policy window move to `expired`. A record that changes
    /// under the sweep is skipped; the next sweep sees its new state.
    pub fn expire_stale(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ApplicationId>, ApplicationServiceError> {
        let cutoff = now - Duration::days(i64::from(self.policy.review_expiry_days));
        let mut expired = Vec::new();

        for mut record in self.repository.list(&ApplicationFilter::default())? {
            if !record.status.awaits_staff_action() || record.updated_at > cutoff {
                continue;
            }

            let expected = record.version;
            if lifecycle::expire(&mut record, now).is_err() {
                continue;
            }
            match self.repository.update(record, expected) {
                Ok(stored) => {
                    info!(id = %stored.id, "application expired after staff inaction");
                    expired.push(stored.id);
                }
                Err(RepositoryError::VersionMismatch) => continue,
                Err(other) => return Err(other.into()),
            }
        }

        Ok(expired)
    }

    fn fetch_record(&self, id: &ApplicationId) -> Result<Application, ApplicationServiceError> {
        self.repository
            .fetch(id)?
            .ok_or(ApplicationServiceError::NotFound)
    }

    fn versioned_update(
        &self,
        record: Application,
        expected_version: u64,
    ) -> Result<Application, ApplicationServiceError> {
        self.repository
            .update(record, expected_version)
            .map_err(|err| match err {
                RepositoryError::VersionMismatch => ApplicationServiceError::Conflict {
                    reason: "record changed since it was read; re-read and retry".to_string(),
                },
                RepositoryError::NotFound => ApplicationServiceError::NotFound,
                other => other.into(),
            })
    }
}

/// Error taxonomy surfaced to callers: recoverable validation problems,
/// illegal edges, optimistic-lock conflicts, authorization-shaped misses,
/// and the sticky duplicate-payment refusal.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error("validation failed: {reason}")]
    Validation { reason: String },
    #[error("illegal status transition from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("role {role} is not permitted to perform this action")]
    Forbidden { role: ActorRole },
    #[error("conflicting update: {reason}")]
    Conflict { reason: String },
    #[error("application not found")]
    NotFound,
    #[error("application fee already paid")]
    AlreadyPaid,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ApplicationServiceError {
    fn from_transition(err: TransitionError) -> Self {
        match err {
            TransitionError::Invalid { from, to } => Self::InvalidTransition { from, to },
            TransitionError::Forbidden { role, .. } => Self::Forbidden { role },
            TransitionError::MissingPayload { .. } | TransitionError::RequirementsOutstanding { .. } => {
                Self::Validation {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// HTTP mapping used by the router and the top-level error type.
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidTransition { .. } | Self::Conflict { .. } | Self::AlreadyPaid => {
                StatusCode::CONFLICT
            }
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
