use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use super::domain::{
    Actor, ActorRole, Application, ApplicationStatus, ConditionalRequirement,
    ConditionalRequirementSpec,
};

/// A moderation request against the status field. Payload fields are only
/// consulted for the edges that need them; supplying extras is harmless,
/// omitting required ones is a validation failure rather than a default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransitionRequest {
    pub to: Option<ApplicationStatus>,
    #[serde(default)]
    pub info_requested_reason: Option<String>,
    #[serde(default)]
    pub conditional_approval_reason: Option<String>,
    #[serde(default)]
    pub conditional_approval_due_date: Option<NaiveDate>,
    #[serde(default)]
    pub requirements: Vec<ConditionalRequirementSpec>,
}

impl TransitionRequest {
    pub fn to(status: ApplicationStatus) -> Self {
        Self {
            to: Some(status),
            ..Self::default()
        }
    }

    pub fn request_info(reason: impl Into<String>) -> Self {
        Self {
            to: Some(ApplicationStatus::InfoRequested),
            info_requested_reason: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn conditional_approval(
        reason: impl Into<String>,
        due_date: NaiveDate,
        requirements: Vec<ConditionalRequirementSpec>,
    ) -> Self {
        Self {
            to: Some(ApplicationStatus::ConditionalApproval),
            conditional_approval_reason: Some(reason.into()),
            conditional_approval_due_date: Some(due_date),
            requirements,
            ..Self::default()
        }
    }
}

/// Failure modes of the transition table. The record is left untouched in
/// every case; checks run to completion before the first mutation.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("illegal status transition from {from} to {to}")]
    Invalid {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("role {role} may not move an application from {from} to {to}")]
    Forbidden {
        role: ActorRole,
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("transition to {to} requires {what}")]
    MissingPayload {
        to: ApplicationStatus,
        what: &'static str,
    },
    #[error("{outstanding} required condition(s) remain unsatisfied")]
    RequirementsOutstanding { outstanding: usize },
}

/// The single legal edge set. Expiry is reachable only through
/// [`expire`], never through an actor-requested transition.
fn edge_exists(from: ApplicationStatus, to: ApplicationStatus) -> bool {
    use ApplicationStatus::*;
    matches!(
        (from, to),
        (Draft, Submitted)
            | (Submitted, UnderReview)
            | (UnderReview, InfoRequested)
            | (InfoRequested, UnderReview)
            | (UnderReview, ConditionalApproval)
            | (ConditionalApproval, Approved)
            | (Submitted | UnderReview | ConditionalApproval, Rejected)
            | (Draft | Submitted | UnderReview, Withdrawn)
            | (Submitted | UnderReview | InfoRequested, Expired)
    )
}

/// Server-side actor check for a legal edge. The claimed role comes from the
/// identity collaborator; the table decides what it may do here.
fn actor_permitted(from: ApplicationStatus, to: ApplicationStatus, actor: &Actor, record: &Application) -> bool {
    use ApplicationStatus::*;
    match (from, to) {
        (Draft, Submitted) => actor.owns(&record.applicant_id),
        (Submitted, UnderReview) => actor.role.is_staff(),
        (UnderReview, InfoRequested) => actor.role.is_staff(),
        (InfoRequested, UnderReview) => actor.owns(&record.applicant_id) || actor.role.is_staff(),
        (UnderReview, ConditionalApproval) => actor.role.is_staff(),
        (ConditionalApproval, Approved) => actor.role.is_staff(),
        (_, Rejected) => actor.role.is_staff(),
        (_, Withdrawn) => actor.owns(&record.applicant_id),
        // Time-based; no actor may request it directly.
        (_, Expired) => false,
        _ => false,
    }
}

/// Apply an actor-requested transition. All table, role, and guard checks run
/// before any mutation so a failure leaves the record exactly as it was.
pub fn apply(
    record: &mut Application,
    request: &TransitionRequest,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<(), TransitionError> {
    let from = record.status;
    let to = request.to.ok_or(TransitionError::MissingPayload {
        to: from,
        what: "a target status",
    })?;

    if !edge_exists(from, to) {
        return Err(TransitionError::Invalid { from, to });
    }
    if !actor_permitted(from, to, actor, record) {
        return Err(TransitionError::Forbidden {
            role: actor.role,
            from,
            to,
        });
    }

    let mutation = prepare(record, request, to)?;
    commit(record, mutation, from, to, now);
    Ok(())
}

/// Time-based expiry, driven by the service sweep rather than an actor.
pub fn expire(record: &mut Application, now: DateTime<Utc>) -> Result<(), TransitionError> {
    let from = record.status;
    if !from.awaits_staff_action() {
        return Err(TransitionError::Invalid {
            from,
            to: ApplicationStatus::Expired,
        });
    }

    commit(record, Mutation::None, from, ApplicationStatus::Expired, now);
    Ok(())
}

enum Mutation {
    None,
    RequestInfo(String),
    EnterConditionalApproval {
        reason: String,
        due_date: NaiveDate,
        requirements: Vec<ConditionalRequirement>,
    },
}

/// Validate edge guards and stage the side-record writes without touching the
/// record yet.
fn prepare(
    record: &Application,
    request: &TransitionRequest,
    to: ApplicationStatus,
) -> Result<Mutation, TransitionError> {
    match to {
        ApplicationStatus::InfoRequested => {
            let reason = non_blank(request.info_requested_reason.as_deref()).ok_or(
                TransitionError::MissingPayload {
                    to,
                    what: "an info-requested reason",
                },
            )?;
            Ok(Mutation::RequestInfo(reason))
        }
        ApplicationStatus::ConditionalApproval => {
            let reason = non_blank(request.conditional_approval_reason.as_deref()).ok_or(
                TransitionError::MissingPayload {
                    to,
                    what: "a conditional-approval reason",
                },
            )?;
            let due_date =
                request
                    .conditional_approval_due_date
                    .ok_or(TransitionError::MissingPayload {
                        to,
                        what: "a conditional-approval due date",
                    })?;
            if request.requirements.is_empty() {
                return Err(TransitionError::MissingPayload {
                    to,
                    what: "a non-empty requirement checklist",
                });
            }

            let requirements = request
                .requirements
                .iter()
                .enumerate()
                .map(|(index, spec)| ConditionalRequirement {
                    id: format!("req-{}", index + 1),
                    kind: spec.kind,
                    description: spec.description.clone(),
                    required: spec.required,
                    satisfied: false,
                    satisfied_at: None,
                    notes: None,
                })
                .collect();

            Ok(Mutation::EnterConditionalApproval {
                reason,
                due_date,
                requirements,
            })
        }
        ApplicationStatus::Approved => {
            // Re-evaluated against the record as stored right now; client
            // caches of the checklist are not trusted.
            let outstanding = record.outstanding_requirements();
            if outstanding > 0 {
                return Err(TransitionError::RequirementsOutstanding { outstanding });
            }
            Ok(Mutation::None)
        }
        _ => Ok(Mutation::None),
    }
}

fn commit(
    record: &mut Application,
    mutation: Mutation,
    from: ApplicationStatus,
    to: ApplicationStatus,
    now: DateTime<Utc>,
) {
    match mutation {
        Mutation::None => {}
        Mutation::RequestInfo(reason) => {
            record.info_requested_reason = Some(reason);
        }
        Mutation::EnterConditionalApproval {
            reason,
            due_date,
            requirements,
        } => {
            record.conditional_approval_reason = Some(reason);
            record.conditional_approval_due_date = Some(due_date);
            record.conditional_requirements = requirements;
        }
    }

    if from == ApplicationStatus::InfoRequested && to != ApplicationStatus::InfoRequested {
        record.info_requested_reason = None;
    }

    record.status = to;
    record.touch(now);
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
