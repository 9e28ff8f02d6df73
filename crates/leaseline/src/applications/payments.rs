use chrono::{DateTime, Utc};

use super::domain::{
    Application, PaymentAttempt, PaymentMethod, PaymentOutcome, PaymentStatus,
};

/// Raised when a success is already on the ledger; `paid` is sticky and a
/// redundant attempt is refused before it can double-charge the bookkeeping.
#[derive(Debug, thiserror::Error)]
#[error("application fee already paid")]
pub struct AlreadyPaid;

/// Append a gateway attempt to the ledger and refresh the cached rollup.
///
/// Attempts are append-only: a failed attempt stays on the ledger forever and
/// the applicant may retry until one succeeds. The cached `payment_status`
/// always reflects the newest entry.
pub fn record_attempt(
    record: &mut Application,
    method: PaymentMethod,
    amount_cents: u32,
    outcome: PaymentOutcome,
    error_message: Option<String>,
    now: DateTime<Utc>,
) -> Result<PaymentAttempt, AlreadyPaid> {
    if record.payment_status == PaymentStatus::Paid {
        return Err(AlreadyPaid);
    }

    let attempt = PaymentAttempt {
        reference_id: format!("{}-pay-{:03}", record.id.0, record.payment_attempts.len() + 1),
        recorded_at: now,
        method,
        outcome,
        amount_cents,
        error_message,
    };

    record.payment_attempts.push(attempt.clone());
    record.payment_status = PaymentStatus::from_outcome(outcome);
    record.touch(now);
    Ok(attempt)
}

/// Recompute the rollup from the ledger; the last entry wins.
pub fn derived_status(record: &Application) -> PaymentStatus {
    record
        .payment_attempts
        .last()
        .map(|attempt| PaymentStatus::from_outcome(attempt.outcome))
        .unwrap_or(PaymentStatus::Pending)
}
