use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicantId, Application, ApplicationId, ApplicationStatus, PaymentStatus, PropertyId,
};

/// Storage abstraction so the lifecycle can be exercised in isolation.
///
/// `update` is the one concurrency-bearing operation: the write only lands
/// when `expected_version` matches the stored record, and the stored version
/// is bumped atomically with the write. A mismatch means another actor got
/// there first and the caller must re-read and retry.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, record: Application) -> Result<Application, RepositoryError>;
    fn update(
        &self,
        record: Application,
        expected_version: u64,
    ) -> Result<Application, RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError>;
    /// Most recently updated non-terminal record for the applicant/property
    /// pair, if any. Backs draft resume and the single-open-record rule.
    fn find_open(
        &self,
        applicant_id: &ApplicantId,
        property_id: &PropertyId,
    ) -> Result<Option<Application>, RepositoryError>;
    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record version mismatch")]
    VersionMismatch,
    #[error("record already exists")]
    Duplicate,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Dashboard filter for listing applications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApplicationFilter {
    pub status: Option<ApplicationStatus>,
    pub property_id: Option<PropertyId>,
    pub applicant_id: Option<ApplicantId>,
}

impl ApplicationFilter {
    pub fn matches(&self, record: &Application) -> bool {
        self.status.map_or(true, |status| record.status == status)
            && self
                .property_id
                .as_ref()
                .map_or(true, |property| &record.property_id == property)
            && self
                .applicant_id
                .as_ref()
                .map_or(true, |applicant| &record.applicant_id == applicant)
    }
}

/// Read-only property catalog collaborator. The core attaches display
/// context from it and defaults the fee amount; it never mutates properties.
pub trait PropertyDirectory: Send + Sync {
    fn property(&self, id: &PropertyId) -> Option<PropertySnapshot>;
}

/// Display context for the property an application targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySnapshot {
    pub id: PropertyId,
    pub title: String,
    pub address: String,
    pub fee_cents: u32,
}

/// Sanitized representation of an application for API responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationStatusView {
    pub id: ApplicationId,
    pub status: &'static str,
    pub current_step: u16,
    pub furthest_step: u16,
    pub payment_status: PaymentStatus,
    pub outstanding_requirements: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditional_approval_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_requested_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<PropertySnapshot>,
}

impl ApplicationStatusView {
    pub fn from_record(record: &Application, property: Option<PropertySnapshot>) -> Self {
        Self {
            id: record.id.clone(),
            status: record.status.label(),
            current_step: record.current_step,
            furthest_step: record.furthest_step,
            payment_status: record.payment_status,
            outstanding_requirements: record.outstanding_requirements(),
            conditional_approval_reason: record.conditional_approval_reason.clone(),
            info_requested_reason: record.info_requested_reason.clone(),
            property,
        }
    }
}
