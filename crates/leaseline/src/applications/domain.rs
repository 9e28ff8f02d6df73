use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier wrapper for application records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Identifier for the applicant, supplied by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicantId(pub String);

/// Identifier for the advertised property the application targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical status of an application record. Every write goes through the
/// lifecycle transition table; no other code path assigns this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    UnderReview,
    InfoRequested,
    ConditionalApproval,
    Approved,
    Rejected,
    Withdrawn,
    Expired,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::InfoRequested => "info_requested",
            ApplicationStatus::ConditionalApproval => "conditional_approval",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
            ApplicationStatus::Expired => "expired",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "submitted" => Some(Self::Submitted),
            "under_review" => Some(Self::UnderReview),
            "info_requested" => Some(Self::InfoRequested),
            "conditional_approval" => Some(Self::ConditionalApproval),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "withdrawn" => Some(Self::Withdrawn),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Terminal statuses never transition again; records are kept, not deleted.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Approved
                | ApplicationStatus::Rejected
                | ApplicationStatus::Withdrawn
                | ApplicationStatus::Expired
        )
    }

    /// Open statuses block a second draft for the same applicant and property.
    pub const fn is_open(self) -> bool {
        !self.is_terminal()
    }

    /// Field autosaves are accepted only before moderation takes over.
    pub const fn accepts_field_edits(self) -> bool {
        matches!(self, ApplicationStatus::Draft)
    }

    /// Statuses eligible for the time-based expiry sweep.
    pub const fn awaits_staff_action(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Submitted
                | ApplicationStatus::UnderReview
                | ApplicationStatus::InfoRequested
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Role reported by the identity collaborator. The lifecycle re-checks the
/// role against the transition table server-side instead of trusting the
/// client's claim of what it may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Renter,
    Landlord,
    PropertyManager,
    Admin,
}

impl ActorRole {
    pub const fn is_staff(self) -> bool {
        matches!(
            self,
            ActorRole::Landlord | ActorRole::PropertyManager | ActorRole::Admin
        )
    }

    pub const fn label(self) -> &'static str {
        match self {
            ActorRole::Renter => "renter",
            ActorRole::Landlord => "landlord",
            ActorRole::PropertyManager => "property_manager",
            ActorRole::Admin => "admin",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Acting identity attached to every moderation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// Whether this actor is the applicant who owns the record.
    pub fn owns(&self, applicant: &ApplicantId) -> bool {
        self.role == ActorRole::Renter && self.id == applicant.0
    }
}

/// How the applicant paid (or attempted to pay) the application fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
}

/// Result of a single gateway attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Pending,
    Failed,
    Success,
}

/// Cached rollup of the attempt ledger, kept on the record for fast reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub const fn from_outcome(outcome: PaymentOutcome) -> Self {
        match outcome {
            PaymentOutcome::Pending => PaymentStatus::Pending,
            PaymentOutcome::Failed => PaymentStatus::Failed,
            PaymentOutcome::Success => PaymentStatus::Paid,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// One entry in the append-only fee ledger. Attempts are never edited or
/// removed once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub reference_id: String,
    pub recorded_at: DateTime<Utc>,
    pub method: PaymentMethod,
    pub outcome: PaymentOutcome,
    pub amount_cents: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Category of a conditional-approval requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    Document,
    Information,
    Verification,
}

/// Checklist item gating the conditional-approval to approved transition.
/// `notes` may carry document-storage file references; the core never stores
/// file bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalRequirement {
    pub id: String,
    pub kind: RequirementKind,
    pub description: String,
    pub required: bool,
    pub satisfied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub satisfied_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Moderator-supplied description of a requirement when entering
/// conditional approval; ids and satisfaction flags are assigned server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalRequirementSpec {
    pub kind: RequirementKind,
    pub description: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

const fn default_required() -> bool {
    true
}

/// The central multi-party record. Created implicitly by the first autosave,
/// submitted explicitly by the applicant, then owned by moderation until one
/// of the terminal statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub property_id: PropertyId,
    pub applicant_id: ApplicantId,
    pub status: ApplicationStatus,
    /// Step the applicant last saved, 1-based.
    pub current_step: u16,
    /// Highest step ever saved; resume opens here even after a backward save.
    pub furthest_step: u16,
    /// Union of all intake steps' fields; partially populated while drafting.
    pub fields: BTreeMap<String, Value>,
    pub payment_status: PaymentStatus,
    pub payment_attempts: Vec<PaymentAttempt>,
    pub conditional_requirements: Vec<ConditionalRequirement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditional_approval_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditional_approval_due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_requested_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency counter; bumped by the repository on every write.
    pub version: u64,
}

impl Application {
    pub fn new_draft(
        id: ApplicationId,
        applicant_id: ApplicantId,
        property_id: PropertyId,
        step: u16,
        fields: BTreeMap<String, Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            property_id,
            applicant_id,
            status: ApplicationStatus::Draft,
            current_step: step,
            furthest_step: step,
            fields,
            payment_status: PaymentStatus::Pending,
            payment_attempts: Vec::new(),
            conditional_requirements: Vec::new(),
            conditional_approval_reason: None,
            conditional_approval_due_date: None,
            info_requested_reason: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Requirements still blocking approval.
    pub fn outstanding_requirements(&self) -> usize {
        self.conditional_requirements
            .iter()
            .filter(|requirement| requirement.required && !requirement.satisfied)
            .count()
    }

    pub fn requirement(&self, requirement_id: &str) -> Option<&ConditionalRequirement> {
        self.conditional_requirements
            .iter()
            .find(|requirement| requirement.id == requirement_id)
    }
}
