use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::domain::{
    Actor, ApplicantId, Application, ApplicationId, ApplicationStatus, PaymentMethod,
    PaymentOutcome, PropertyId,
};
use super::lifecycle::TransitionRequest;
use super::repository::{
    ApplicationFilter, ApplicationRepository, ApplicationStatusView, PropertyDirectory,
};
use super::service::{ApplicationService, ApplicationServiceError};

/// Router state: the lifecycle service plus the read-only property catalog
/// used to decorate responses.
pub struct ApplicationGateway<R, P> {
    pub service: Arc<ApplicationService<R>>,
    pub directory: Arc<P>,
}

impl<R, P> Clone for ApplicationGateway<R, P> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            directory: Arc::clone(&self.directory),
        }
    }
}

/// Router builder exposing the application lifecycle endpoints.
pub fn application_router<R, P>(gateway: ApplicationGateway<R, P>) -> Router
where
    R: ApplicationRepository + 'static,
    P: PropertyDirectory + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            post(create_draft_handler::<R, P>).get(list_handler::<R, P>),
        )
        .route("/api/v1/applications/draft", get(resume_draft_handler::<R, P>))
        .route(
            "/api/v1/applications/:id",
            patch(autosave_handler::<R, P>).get(status_handler::<R, P>),
        )
        .route("/api/v1/applications/:id/submit", post(submit_handler::<R, P>))
        .route(
            "/api/v1/applications/:id/transition",
            post(transition_handler::<R, P>),
        )
        .route(
            "/api/v1/applications/:id/requirements/:requirement_id/satisfy",
            post(satisfy_handler::<R, P>),
        )
        .route(
            "/api/v1/applications/:id/payments",
            post(payment_handler::<R, P>),
        )
        .with_state(gateway)
}

#[derive(Debug, Deserialize)]
pub(crate) struct DraftUpsertRequest {
    pub applicant_id: ApplicantId,
    pub property_id: PropertyId,
    pub step: u16,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DraftPatchRequest {
    pub applicant_id: ApplicantId,
    pub step: u16,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DraftQuery {
    pub applicant_id: String,
    pub property_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitBody {
    pub actor: Actor,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransitionBody {
    pub actor: Actor,
    #[serde(flatten)]
    pub request: TransitionRequest,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SatisfyBody {
    pub actor: Actor,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PaymentBody {
    pub method: PaymentMethod,
    #[serde(default)]
    pub amount_cents: Option<u32>,
    pub outcome: PaymentOutcome,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub property_id: Option<String>,
    #[serde(default)]
    pub applicant_id: Option<String>,
}

/// What the form needs to resume: the saved fields and the furthest step.
#[derive(Debug, Serialize)]
pub(crate) struct DraftResumeView {
    pub id: ApplicationId,
    pub status: &'static str,
    pub fields: BTreeMap<String, Value>,
    pub resume_step: u16,
}

impl DraftResumeView {
    fn from_record(record: &Application) -> Self {
        Self {
            id: record.id.clone(),
            status: record.status.label(),
            fields: record.fields.clone(),
            resume_step: record.furthest_step,
        }
    }
}

pub(crate) async fn create_draft_handler<R, P>(
    State(gateway): State<ApplicationGateway<R, P>>,
    axum::Json(body): axum::Json<DraftUpsertRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PropertyDirectory + 'static,
{
    match gateway
        .service
        .upsert_draft(&body.applicant_id, &body.property_id, body.step, body.fields)
    {
        Ok(receipt) => (StatusCode::OK, axum::Json(receipt)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn autosave_handler<R, P>(
    State(gateway): State<ApplicationGateway<R, P>>,
    Path(id): Path<String>,
    axum::Json(body): axum::Json<DraftPatchRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PropertyDirectory + 'static,
{
    let id = ApplicationId(id);
    match gateway
        .service
        .autosave_by_id(&body.applicant_id, &id, body.step, body.fields)
    {
        Ok(receipt) => (StatusCode::OK, axum::Json(receipt)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn resume_draft_handler<R, P>(
    State(gateway): State<ApplicationGateway<R, P>>,
    Query(query): Query<DraftQuery>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PropertyDirectory + 'static,
{
    let applicant = ApplicantId(query.applicant_id);
    let property = PropertyId(query.property_id);
    match gateway.service.get_draft(&applicant, &property) {
        Ok(Some(record)) => {
            let view = DraftResumeView::from_record(&record);
            (StatusCode::OK, axum::Json(json!({ "draft": view }))).into_response()
        }
        Ok(None) => (StatusCode::OK, axum::Json(json!({ "draft": Value::Null }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<R, P>(
    State(gateway): State<ApplicationGateway<R, P>>,
    Path(id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PropertyDirectory + 'static,
{
    let id = ApplicationId(id);
    match gateway.service.get(&id) {
        Ok(record) => (StatusCode::OK, axum::Json(view_of(&gateway, &record))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn submit_handler<R, P>(
    State(gateway): State<ApplicationGateway<R, P>>,
    Path(id): Path<String>,
    axum::Json(body): axum::Json<SubmitBody>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PropertyDirectory + 'static,
{
    let id = ApplicationId(id);
    match gateway.service.submit_application(&body.actor, &id) {
        Ok(record) => (StatusCode::OK, axum::Json(view_of(&gateway, &record))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn transition_handler<R, P>(
    State(gateway): State<ApplicationGateway<R, P>>,
    Path(id): Path<String>,
    axum::Json(body): axum::Json<TransitionBody>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PropertyDirectory + 'static,
{
    let id = ApplicationId(id);
    match gateway
        .service
        .transition_status(&body.actor, &id, &body.request)
    {
        Ok(record) => (StatusCode::OK, axum::Json(view_of(&gateway, &record))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn satisfy_handler<R, P>(
    State(gateway): State<ApplicationGateway<R, P>>,
    Path((id, requirement_id)): Path<(String, String)>,
    axum::Json(body): axum::Json<SatisfyBody>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PropertyDirectory + 'static,
{
    let id = ApplicationId(id);
    match gateway
        .service
        .satisfy_requirement(&body.actor, &id, &requirement_id, body.notes)
    {
        Ok(record) => (StatusCode::OK, axum::Json(view_of(&gateway, &record))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn payment_handler<R, P>(
    State(gateway): State<ApplicationGateway<R, P>>,
    Path(id): Path<String>,
    axum::Json(body): axum::Json<PaymentBody>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PropertyDirectory + 'static,
{
    let id = ApplicationId(id);
    let amount = body.amount_cents.unwrap_or_else(|| fee_for(&gateway, &id));

    match gateway.service.record_payment_attempt(
        &id,
        body.method,
        amount,
        body.outcome,
        body.error_message,
    ) {
        Ok(attempt) => (StatusCode::CREATED, axum::Json(attempt)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_handler<R, P>(
    State(gateway): State<ApplicationGateway<R, P>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: ApplicationRepository + 'static,
    P: PropertyDirectory + 'static,
{
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => match ApplicationStatus::from_label(raw) {
            Some(status) => Some(status),
            None => {
                let payload = json!({ "error": format!("unknown status '{raw}'") });
                return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
            }
        },
    };

    let filter = ApplicationFilter {
        status,
        property_id: query.property_id.map(PropertyId),
        applicant_id: query.applicant_id.map(ApplicantId),
    };

    match gateway.service.list_applications(&filter) {
        Ok(records) => {
            let views: Vec<ApplicationStatusView> = records
                .iter()
                .map(|record| view_of(&gateway, record))
                .collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(err) => error_response(err),
    }
}

fn view_of<R, P>(gateway: &ApplicationGateway<R, P>, record: &Application) -> ApplicationStatusView
where
    R: ApplicationRepository + 'static,
    P: PropertyDirectory + 'static,
{
    let property = gateway.directory.property(&record.property_id);
    ApplicationStatusView::from_record(record, property)
}

fn fee_for<R, P>(gateway: &ApplicationGateway<R, P>, id: &ApplicationId) -> u32
where
    R: ApplicationRepository + 'static,
    P: PropertyDirectory + 'static,
{
    gateway
        .service
        .get(id)
        .ok()
        .and_then(|record| gateway.directory.property(&record.property_id))
        .map(|property| property.fee_cents)
        .unwrap_or_else(|| gateway.service.policy().intake_fee_cents)
}

fn error_response(err: ApplicationServiceError) -> Response {
    let payload = json!({ "error": err.to_string() });
    (err.status_code(), axum::Json(payload)).into_response()
}
