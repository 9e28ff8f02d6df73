//! Rental application lifecycle: resumable draft intake with autosave, the
//! moderation status state machine, and the fee and requirement trackers.
//!
//! The modules are layered leaves-first. `domain` holds the record and its
//! closed status type; `draft`, `lifecycle`, `payments`, and `requirements`
//! are pure mutations over it; `service` serializes those mutations through
//! the versioned repository write; `router` exposes the HTTP surface; and
//! `autosave` is the client-observable save process the form UI drives.

pub mod autosave;
pub mod domain;
pub mod draft;
pub mod intake;
pub mod lifecycle;
pub mod payments;
pub mod repository;
pub mod requirements;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use autosave::{
    AutosaveCoordinator, DraftSnapshot, DraftTransport, SaveStatus, TransportError,
};
pub use domain::{
    Actor, ActorRole, ApplicantId, Application, ApplicationId, ApplicationStatus,
    ConditionalRequirement, ConditionalRequirementSpec, PaymentAttempt, PaymentMethod,
    PaymentOutcome, PaymentStatus, PropertyId, RequirementKind,
};
pub use draft::DraftReceipt;
pub use intake::{IntakeBlueprint, IntakeStep};
pub use lifecycle::{TransitionError, TransitionRequest};
pub use repository::{
    ApplicationFilter, ApplicationRepository, ApplicationStatusView, PropertyDirectory,
    PropertySnapshot, RepositoryError,
};
pub use router::{application_router, ApplicationGateway};
pub use service::{ApplicationService, ApplicationServiceError};
