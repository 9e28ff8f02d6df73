//! Rental application lifecycle core.
//!
//! The crate owns the long-lived, multi-party application record: resumable
//! draft intake with autosave, the moderation status state machine shared by
//! applicant, landlord, and admin actors, and the fee-payment and
//! conditional-requirement trackers hanging off the record. Presentation,
//! persistence engines, and notification delivery live outside this crate;
//! storage is reached through the [`applications::ApplicationRepository`]
//! trait so the core can be exercised in isolation.

pub mod applications;
pub mod config;
pub mod error;
pub mod telemetry;
