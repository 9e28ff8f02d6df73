use chrono::{DateTime, Utc};

use super::domain::{Application, ApplicationStatus};

#[derive(Debug, thiserror::Error)]
pub enum RequirementError {
    #[error("no requirement '{0}' on this application")]
    UnknownRequirement(String),
    #[error("requirements are frozen once the application is approved")]
    Frozen,
}

/// Outcome of a satisfy call; satisfying twice is a no-op, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatisfyOutcome {
    NewlySatisfied,
    AlreadySatisfied,
}

/// Mark a conditional requirement satisfied, optionally attaching notes
/// (typically document-storage file references from the verification side).
///
/// Never touches `status`: even with every requirement satisfied, approval
/// stays a distinct, explicit moderation action.
pub fn satisfy(
    record: &mut Application,
    requirement_id: &str,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<SatisfyOutcome, RequirementError> {
    if record.status == ApplicationStatus::Approved {
        return Err(RequirementError::Frozen);
    }

    let requirement = record
        .conditional_requirements
        .iter_mut()
        .find(|requirement| requirement.id == requirement_id)
        .ok_or_else(|| RequirementError::UnknownRequirement(requirement_id.to_string()))?;

    if requirement.satisfied {
        return Ok(SatisfyOutcome::AlreadySatisfied);
    }

    requirement.satisfied = true;
    requirement.satisfied_at = Some(now);
    if notes.is_some() {
        requirement.notes = notes;
    }
    record.touch(now);
    Ok(SatisfyOutcome::NewlySatisfied)
}
