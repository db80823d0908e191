use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    Actor, ApplicantProfile, ApplicationForm, ApplicationId, ApplicationStatus, AuditResult,
    PaymentPhase, Role, TransactionId, UserId,
};
use super::gateway::{PaymentGateway, WebhookPayload};
use super::review::ReviewDecision;
use super::service::{CertificationService, WorkflowError};
use super::store::{NotificationSink, WorkflowStore};

/// Router builder exposing the certification workflow over HTTP.
///
/// Actor identity arrives through the trusted `x-actor-id`/`x-actor-role`
/// headers populated by the upstream identity layer.
pub fn certification_router<S, G, N>(
    service: Arc<CertificationService<S, G, N>>,
) -> Router
where
    S: WorkflowStore + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    Router::new()
        .route(
            "/api/v1/certification/applications",
            post(create_draft_handler::<S, G, N>).get(my_applications_handler::<S, G, N>),
        )
        .route(
            "/api/v1/certification/applications/:application_id",
            get(application_handler::<S, G, N>),
        )
        .route(
            "/api/v1/certification/applications/:application_id/confirm-review",
            post(confirm_review_handler::<S, G, N>),
        )
        .route(
            "/api/v1/certification/applications/:application_id/payments/:phase",
            post(initiate_payment_handler::<S, G, N>),
        )
        .route(
            "/api/v1/certification/applications/:application_id/review",
            post(review_handler::<S, G, N>),
        )
        .route(
            "/api/v1/certification/applications/:application_id/audit/assign",
            post(assign_auditor_handler::<S, G, N>),
        )
        .route(
            "/api/v1/certification/applications/:application_id/audit/result",
            post(audit_result_handler::<S, G, N>),
        )
        .route(
            "/api/v1/certification/applications/:application_id/status",
            patch(force_status_handler::<S, G, N>),
        )
        .route(
            "/api/v1/certification/payments/webhook",
            post(webhook_handler::<S, G, N>),
        )
        .route(
            "/api/v1/certification/payments/:transaction_id/status",
            get(payment_status_handler::<S, G, N>),
        )
        .route(
            "/api/v1/certification/reviews/pending",
            get(pending_reviews_handler::<S, G, N>),
        )
        .route(
            "/api/v1/certification/audits/assignments",
            get(assignments_handler::<S, G, N>),
        )
        .route(
            "/api/v1/certification/dashboard/stats",
            get(stats_handler::<S, G, N>),
        )
        .with_state(service)
}

/// Actor identity extracted from the trusted identity headers.
pub struct ActorIdentity(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for ActorIdentity
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("x-actor-id")
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.trim().is_empty());
        let role = parts
            .headers
            .get("x-actor-role")
            .and_then(|value| value.to_str().ok())
            .and_then(Role::parse);

        match (id, role) {
            (Some(id), Some(role)) => Ok(ActorIdentity(Actor::new(id, role))),
            _ => Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "missing or malformed actor identity headers" })),
            )
                .into_response()),
        }
    }
}

fn error_response(err: WorkflowError) -> Response {
    let status = err.status_code();
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateDraftRequest {
    pub applicant: ApplicantProfile,
    pub form: ApplicationForm,
}

pub(crate) async fn create_draft_handler<S, G, N>(
    State(service): State<Arc<CertificationService<S, G, N>>>,
    ActorIdentity(actor): ActorIdentity,
    Json(request): Json<CreateDraftRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    match service.create_draft(&actor, request.applicant, request.form) {
        Ok(record) => (StatusCode::CREATED, Json(record.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn application_handler<S, G, N>(
    State(service): State<Arc<CertificationService<S, G, N>>>,
    ActorIdentity(actor): ActorIdentity,
    Path(application_id): Path<String>,
) -> Response
where
    S: WorkflowStore + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    match service.application(&actor, &ApplicationId(application_id)) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn my_applications_handler<S, G, N>(
    State(service): State<Arc<CertificationService<S, G, N>>>,
    ActorIdentity(actor): ActorIdentity,
) -> Response
where
    S: WorkflowStore + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    match service.applications_for(&actor) {
        Ok(records) => {
            let views: Vec<_> = records.iter().map(|record| record.view()).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn confirm_review_handler<S, G, N>(
    State(service): State<Arc<CertificationService<S, G, N>>>,
    ActorIdentity(actor): ActorIdentity,
    Path(application_id): Path<String>,
) -> Response
where
    S: WorkflowStore + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    match service.confirm_review(&actor, &ApplicationId(application_id)) {
        Ok(record) => (StatusCode::OK, Json(record.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn initiate_payment_handler<S, G, N>(
    State(service): State<Arc<CertificationService<S, G, N>>>,
    ActorIdentity(actor): ActorIdentity,
    Path((application_id, phase)): Path<(String, u8)>,
) -> Response
where
    S: WorkflowStore + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    let Some(phase) = PaymentPhase::from_number(phase) else {
        return error_response(WorkflowError::Validation(format!(
            "unknown payment phase {phase}"
        )));
    };
    match service.initiate_payment(&actor, &ApplicationId(application_id), phase) {
        Ok(initiation) => (StatusCode::OK, Json(initiation)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn webhook_handler<S, G, N>(
    State(service): State<Arc<CertificationService<S, G, N>>>,
    Json(payload): Json<WebhookPayload>,
) -> Response
where
    S: WorkflowStore + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    match service.handle_webhook(payload) {
        Ok(ack) => (
            StatusCode::OK,
            Json(json!({
                "result": "SUCCESS",
                "transaction": ack.transaction,
                "outcome": ack.outcome,
            })),
        )
            .into_response(),
        Err(err) => {
            let status = err.status_code();
            (
                status,
                Json(json!({ "result": "FAIL", "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewRequest {
    pub decision: ReviewDecision,
    #[serde(default)]
    pub comment: Option<String>,
}

pub(crate) async fn review_handler<S, G, N>(
    State(service): State<Arc<CertificationService<S, G, N>>>,
    ActorIdentity(actor): ActorIdentity,
    Path(application_id): Path<String>,
    Json(request): Json<ReviewRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    match service.review_documents(
        &actor,
        &ApplicationId(application_id),
        request.decision,
        request.comment,
    ) {
        Ok(record) => (StatusCode::OK, Json(record.view())).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssignAuditorRequest {
    pub auditor_id: String,
    pub date: NaiveDate,
}

pub(crate) async fn assign_auditor_handler<S, G, N>(
    State(service): State<Arc<CertificationService<S, G, N>>>,
    ActorIdentity(actor): ActorIdentity,
    Path(application_id): Path<String>,
    Json(request): Json<AssignAuditorRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    match service.assign_auditor(
        &actor,
        &ApplicationId(application_id),
        &UserId(request.auditor_id),
        request.date,
    ) {
        Ok(record) => (StatusCode::OK, Json(record.view())).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuditResultRequest {
    pub result: AuditResult,
    #[serde(default)]
    pub notes: Option<String>,
}

pub(crate) async fn audit_result_handler<S, G, N>(
    State(service): State<Arc<CertificationService<S, G, N>>>,
    ActorIdentity(actor): ActorIdentity,
    Path(application_id): Path<String>,
    Json(request): Json<AuditResultRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    match service.submit_audit_result(
        &actor,
        &ApplicationId(application_id),
        request.result,
        request.notes,
    ) {
        Ok(record) => (StatusCode::OK, Json(record.view())).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ForceStatusRequest {
    pub status: String,
    #[serde(default)]
    pub note: Option<String>,
}

pub(crate) async fn force_status_handler<S, G, N>(
    State(service): State<Arc<CertificationService<S, G, N>>>,
    ActorIdentity(actor): ActorIdentity,
    Path(application_id): Path<String>,
    Json(request): Json<ForceStatusRequest>,
) -> Response
where
    S: WorkflowStore + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    let Some(status) = ApplicationStatus::parse(&request.status) else {
        let allowed: Vec<&str> = ApplicationStatus::ALL
            .iter()
            .map(|status| status.label())
            .collect();
        return error_response(WorkflowError::Validation(format!(
            "invalid status '{}'; must be one of {}",
            request.status,
            allowed.join(", ")
        )));
    };
    match service.force_status(&actor, &ApplicationId(application_id), status, request.note) {
        Ok(record) => (StatusCode::OK, Json(record.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn payment_status_handler<S, G, N>(
    State(service): State<Arc<CertificationService<S, G, N>>>,
    ActorIdentity(_actor): ActorIdentity,
    Path(transaction_id): Path<String>,
) -> Response
where
    S: WorkflowStore + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    match service.payment_status(&TransactionId(transaction_id)) {
        Ok(status) => (
            StatusCode::OK,
            Json(json!({ "status": status.label() })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn pending_reviews_handler<S, G, N>(
    State(service): State<Arc<CertificationService<S, G, N>>>,
    ActorIdentity(_actor): ActorIdentity,
) -> Response
where
    S: WorkflowStore + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    match service.pending_reviews() {
        Ok(records) => {
            let views: Vec<_> = records.iter().map(|record| record.view()).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn assignments_handler<S, G, N>(
    State(service): State<Arc<CertificationService<S, G, N>>>,
    ActorIdentity(actor): ActorIdentity,
) -> Response
where
    S: WorkflowStore + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    match service.auditor_assignments(&actor) {
        Ok(records) => {
            let views: Vec<_> = records.iter().map(|record| record.view()).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn stats_handler<S, G, N>(
    State(service): State<Arc<CertificationService<S, G, N>>>,
    ActorIdentity(_actor): ActorIdentity,
) -> Response
where
    S: WorkflowStore + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    match service.dashboard_stats() {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(err) => error_response(err),
    }
}
