use crate::infra::{InMemoryApplicationRepository, InMemoryPropertyDirectory};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use leaseline::applications::{
    Actor, ActorRole, ApplicantId, Application, ApplicationService, ApplicationStatus,
    ConditionalRequirementSpec, PaymentMethod, PaymentOutcome, PropertyDirectory, PropertyId,
    RequirementKind, TransitionRequest,
};
use leaseline::config::LifecyclePolicy;
use leaseline::error::AppError;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Due date for the conditional approval requirements (YYYY-MM-DD).
    /// Defaults to 30 days from today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) due_date: Option<NaiveDate>,
    /// Print the full field payload after every autosave.
    #[arg(long)]
    pub(crate) show_fields: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let due_date = args
        .due_date
        .unwrap_or_else(|| Local::now().date_naive() + Duration::days(30));

    let repository = Arc::new(InMemoryApplicationRepository::default());
    let directory = InMemoryPropertyDirectory::default();
    let service = ApplicationService::new(repository, LifecyclePolicy::default());

    let applicant_id = ApplicantId("demo-applicant".to_string());
    let property_id = PropertyId("prop-1".to_string());
    let applicant = Actor::new("demo-applicant", ActorRole::Renter);
    let landlord = Actor::new("demo-landlord", ActorRole::Landlord);

    println!("Application lifecycle demo");
    if let Some(listing) = directory.property(&property_id) {
        println!("Listing: {} ({})", listing.title, listing.address);
        println!("Application fee: {} cents", listing.fee_cents);
    }

    println!("\nStage 1: resumable intake");
    let steps: [(u16, &str, BTreeMap<String, Value>); 4] = [
        (
            1,
            "personal details",
            fields(&[
                ("first_name", json!("Dana")),
                ("last_name", json!("Reyes")),
                ("email", json!("dana@example.com")),
                ("phone", json!("515-555-0188")),
            ]),
        ),
        (
            2,
            "residence history",
            fields(&[
                ("current_address", json!("45 Birch Ave, Des Moines")),
                ("current_landlord_name", json!("Birch Ave Holdings")),
            ]),
        ),
        (
            3,
            "employment and income",
            fields(&[
                ("employer_name", json!("Heartland Logistics")),
                ("monthly_income_cents", json!(380_000)),
            ]),
        ),
        (
            4,
            "review and consent",
            fields(&[
                ("background_check_consent", json!(true)),
                ("signature", json!("Dana Reyes")),
            ]),
        ),
    ];

    let mut id = None;
    for (step, label, payload) in steps {
        let receipt = service.upsert_draft(&applicant_id, &property_id, step, payload)?;
        println!("- autosaved step {step} ({label}) as {}", receipt.id.0);
        id = Some(receipt.id);
    }
    let id = match id {
        Some(id) => id,
        None => return Ok(()),
    };

    let draft = service.get_draft(&applicant_id, &property_id)?;
    if let Some(draft) = draft {
        println!(
            "- resume point: step {} of saved draft {}",
            draft.furthest_step, draft.id.0
        );
        if args.show_fields {
            print_fields(&draft);
        }
    }

    println!("\nStage 2: submission and fee");
    let record = service.submit_application(&applicant, &id)?;
    println!("- submitted, status now '{}'", record.status.label());

    let attempt = service.record_payment_attempt(
        &id,
        PaymentMethod::Card,
        4500,
        PaymentOutcome::Failed,
        Some("card declined".to_string()),
    )?;
    println!("- payment attempt {} failed (card declined)", attempt.reference_id);
    let attempt =
        service.record_payment_attempt(&id, PaymentMethod::Card, 4500, PaymentOutcome::Success, None)?;
    println!("- payment attempt {} succeeded", attempt.reference_id);

    println!("\nStage 3: moderation");
    let record = service.transition_status(
        &landlord,
        &id,
        &TransitionRequest::to(ApplicationStatus::UnderReview),
    )?;
    println!("- landlord starts review, status '{}'", record.status.label());

    let record = service.transition_status(
        &landlord,
        &id,
        &TransitionRequest::request_info("Need a second month of pay stubs"),
    )?;
    println!(
        "- landlord requests info: {}",
        record
            .info_requested_reason
            .as_deref()
            .unwrap_or("(no reason recorded)")
    );

    let record = service.transition_status(
        &applicant,
        &id,
        &TransitionRequest::to(ApplicationStatus::UnderReview),
    )?;
    println!("- applicant responds, status back to '{}'", record.status.label());

    let record = service.transition_status(
        &landlord,
        &id,
        &TransitionRequest::conditional_approval(
            "Approved pending proof of renter's insurance",
            due_date,
            vec![ConditionalRequirementSpec {
                kind: RequirementKind::Document,
                description: "Upload a current renter's insurance policy".to_string(),
                required: true,
            }],
        ),
    )?;
    println!(
        "- conditionally approved with {} requirement(s), due {due_date}",
        record.conditional_requirements.len()
    );

    println!("\nStage 4: requirements and decision");
    let record = service.satisfy_requirement(
        &landlord,
        &id,
        "req-1",
        Some("policy-document-2026".to_string()),
    )?;
    println!(
        "- requirement satisfied; {} outstanding, status still '{}'",
        record.outstanding_requirements(),
        record.status.label()
    );

    let record =
        service.transition_status(&landlord, &id, &TransitionRequest::to(ApplicationStatus::Approved))?;
    println!("- final decision: '{}'", record.status.label());
    println!(
        "- fee ledger: {} attempt(s), payment status '{}'",
        record.payment_attempts.len(),
        record.payment_status.label()
    );

    Ok(())
}

fn fields(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

fn print_fields(record: &Application) {
    for (key, value) in &record.fields {
        println!("    {key}: {value}");
    }
}
