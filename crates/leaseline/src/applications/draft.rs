use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::domain::{ApplicantId, Application, ApplicationId, ApplicationStatus, PropertyId};
use super::intake::IntakeBlueprint;

/// Returned to the autosave client after every draft write. The first write
/// hands out the freshly assigned id the client must pin for later saves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftReceipt {
    pub id: ApplicationId,
    pub status: ApplicationStatus,
}

impl DraftReceipt {
    pub fn from_record(record: &Application) -> Self {
        Self {
            id: record.id.clone(),
            status: record.status,
        }
    }
}

/// Raised when a late autosave arrives after the record left the draft phase.
#[derive(Debug, thiserror::Error)]
#[error("application is {status}; fields are frozen after submission")]
pub struct FieldsFrozen {
    pub status: ApplicationStatus,
}

/// Shallow, additive, last-write-wins merge. Keys omitted from `incoming`
/// are left untouched so a partial save never nulls out earlier fields.
pub fn merge_fields(target: &mut BTreeMap<String, Value>, incoming: BTreeMap<String, Value>) {
    for (key, value) in incoming {
        target.insert(key, value);
    }
}

/// Create the initial draft record from the first autosave.
pub fn start_draft(
    id: ApplicationId,
    applicant_id: ApplicantId,
    property_id: PropertyId,
    step: u16,
    fields: BTreeMap<String, Value>,
    blueprint: &IntakeBlueprint,
    now: DateTime<Utc>,
) -> Application {
    let step = blueprint.clamp_step(step);
    Application::new_draft(id, applicant_id, property_id, step, fields, now)
}

/// Apply an autosave delta to an existing open draft.
///
/// `current_step` follows the applicant (who may navigate backward), while
/// `furthest_step` is monotonic so resume always reopens at the furthest
/// progress ever recorded.
pub fn apply_autosave(
    record: &mut Application,
    step: u16,
    fields: BTreeMap<String, Value>,
    blueprint: &IntakeBlueprint,
    now: DateTime<Utc>,
) -> Result<(), FieldsFrozen> {
    if !record.status.accepts_field_edits() {
        return Err(FieldsFrozen {
            status: record.status,
        });
    }

    let step = blueprint.clamp_step(step);
    merge_fields(&mut record.fields, fields);
    record.current_step = step;
    record.furthest_step = record.furthest_step.max(step);
    record.touch(now);
    Ok(())
}
