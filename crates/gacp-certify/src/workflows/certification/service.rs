use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use tracing::warn;

use crate::config::WorkflowConfig;

use super::domain::{
    Actor, ApplicantProfile, ApplicationForm, ApplicationId, ApplicationRecord,
    ApplicationStatus, AuditAssignment, AuditResult, PaymentPhase, PaymentPhaseState,
    PaymentState, PaymentTransaction, PhasePaymentStatus, ProfileError, Role, TrailEntry,
    TransactionId, TransactionStatus, UserId,
};
use super::gateway::{self, GatewayError, OrderRequest, PaymentGateway, WebhookPayload};
use super::review::{ReviewDecision, StrikePolicy, StrikeVerdict};
use super::store::{Notification, NotificationSink, StoreError, WorkflowStore};
use super::transitions;

const PHASE1_INITIATION: [ApplicationStatus; 2] = [
    ApplicationStatus::Payment1Pending,
    ApplicationStatus::Payment1Retry,
];
const PHASE2_INITIATION: [ApplicationStatus; 1] = [ApplicationStatus::Payment2Pending];
const REVIEWABLE: [ApplicationStatus; 2] = [
    ApplicationStatus::Submitted,
    ApplicationStatus::RevisionReq,
];
const ASSIGNABLE: [ApplicationStatus; 2] = [
    ApplicationStatus::AuditPending,
    ApplicationStatus::AuditScheduled,
];

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static TRANSACTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_identity() -> (ApplicationId, String) {
    let seq = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let id = ApplicationId(format!("app-{seq:06}"));
    let number = format!("GACP-{}-{seq:06}", Utc::now().year());
    (id, number)
}

fn next_transaction_id() -> TransactionId {
    let seq = TRANSACTION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    TransactionId(format!("txn-{seq:06}"))
}

/// Certification workflow facade composing the three ports: data access,
/// payment gateway, and notification sink.
pub struct CertificationService<S, G, N> {
    store: Arc<S>,
    gateway: Arc<G>,
    notifications: Arc<N>,
    config: WorkflowConfig,
    policy: StrikePolicy,
}

impl<S, G, N> CertificationService<S, G, N>
where
    S: WorkflowStore + 'static,
    G: PaymentGateway + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(
        store: Arc<S>,
        gateway: Arc<G>,
        notifications: Arc<N>,
        config: WorkflowConfig,
    ) -> Self {
        let policy = StrikePolicy {
            limit: config.rejection_limit,
        };
        Self {
            store,
            gateway,
            notifications,
            config,
            policy,
        }
    }

    /// Create a new draft application for the calling applicant. The
    /// applicant profile variant is validated here, at the boundary.
    pub fn create_draft(
        &self,
        actor: &Actor,
        applicant: ApplicantProfile,
        form: ApplicationForm,
    ) -> Result<ApplicationRecord, WorkflowError> {
        require_role(actor, Role::Applicant, "create a draft")?;
        applicant.validate()?;

        let (id, number) = next_application_identity();
        let now = Utc::now();
        let record = ApplicationRecord {
            id,
            number,
            applicant_id: actor.id.clone(),
            applicant,
            form: form.normalized(),
            status: ApplicationStatus::Draft,
            reject_count: 0,
            payment: PaymentState {
                phase1: PaymentPhaseState::pending(self.config.phase1_fee),
                phase2: PaymentPhaseState::pending(self.config.phase2_fee),
            },
            audit: None,
            trail: vec![TrailEntry {
                action: "draft_created".to_string(),
                actor: actor.id.clone(),
                role: actor.role,
                status: ApplicationStatus::Draft,
                at: now,
                note: None,
            }],
            created_at: now,
            updated_at: now,
        };

        Ok(self.store.insert_application(record)?)
    }

    /// Applicant confirms the pre-submission review, unlocking phase-1
    /// payment.
    pub fn confirm_review(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, WorkflowError> {
        let record = self.require_application(application_id)?;
        self.ensure_owner(&record, actor, "confirm the review")?;

        transitions::attempt(
            self.store.as_ref(),
            application_id,
            &[ApplicationStatus::Draft],
            "review_confirmed",
            actor,
            None,
            |_| ApplicationStatus::Payment1Pending,
        )
    }

    /// Open a payment order for the given phase. On gateway failure the
    /// ledger entry is marked failed and the application is untouched, so
    /// the applicant can retry; each retry produces a fresh transaction.
    pub fn initiate_payment(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        phase: PaymentPhase,
    ) -> Result<PaymentInitiation, WorkflowError> {
        let record = self.require_application(application_id)?;
        self.ensure_owner(&record, actor, "initiate a payment")?;

        let (allowed, action): (&[ApplicationStatus], &'static str) = match phase {
            PaymentPhase::Phase1 => (&PHASE1_INITIATION, "initiate phase-1 payment"),
            PaymentPhase::Phase2 => (&PHASE2_INITIATION, "initiate phase-2 payment"),
        };
        if !allowed.contains(&record.status) {
            return Err(WorkflowError::InvalidState {
                current: record.status,
                action,
            });
        }

        let amount = match phase {
            PaymentPhase::Phase1 => self.config.phase1_fee,
            PaymentPhase::Phase2 => self.config.phase2_fee,
        };
        let now = Utc::now();
        let external_order_id = gateway::external_order_id(phase, &record.number, now);
        let order = OrderRequest {
            external_order_id: external_order_id.clone(),
            amount,
            redirect_url: format!("{}?order={external_order_id}", self.config.redirect_url),
            notify_url: self.config.notify_url.clone(),
        };

        let mut transaction = PaymentTransaction {
            transaction_id: next_transaction_id(),
            external_order_id,
            application: record.id.clone(),
            phase,
            amount,
            channel: None,
            status: TransactionStatus::Pending,
            request_payload: serde_json::to_value(&order).ok(),
            response_payload: None,
            paid_at: None,
            created_at: now,
        };
        self.store.insert_transaction(transaction.clone())?;

        let gateway_order = match self.gateway.create_order(&order) {
            Ok(gateway_order) => gateway_order,
            Err(err) => {
                transaction.status = TransactionStatus::Failed;
                transaction.response_payload =
                    Some(serde_json::json!({ "error": err.to_string() }));
                self.store.update_transaction(transaction)?;
                return Err(WorkflowError::Gateway(err));
            }
        };

        transaction.response_payload = serde_json::to_value(&gateway_order).ok();
        self.store.update_transaction(transaction.clone())?;

        // Status stays where it is; only the active transaction link moves.
        let transaction_id = transaction.transaction_id.clone();
        transitions::attempt(
            self.store.as_ref(),
            application_id,
            allowed,
            action,
            actor,
            Some(format!("order {}", transaction.external_order_id)),
            |record| {
                record.payment.phase_mut(phase).transaction = Some(transaction_id);
                record.status
            },
        )?;

        Ok(PaymentInitiation {
            transaction_id: transaction.transaction_id,
            payment_url: gateway_order.payment_url,
            qr_code: gateway_order.qr_code_url,
        })
    }

    /// Reconcile an asynchronous gateway callback. Fail closed on bad
    /// signatures, treat repeated deliveries of a settled order as
    /// duplicates, and keep the application retriable on declined payments.
    pub fn handle_webhook(&self, payload: WebhookPayload) -> Result<WebhookAck, WorkflowError> {
        if !self.gateway.verify_signature(&payload) {
            return Err(WorkflowError::Signature);
        }

        let mut transaction = self
            .store
            .find_transaction_by_order(&payload.merchant_order_no)?
            .ok_or_else(|| {
                WorkflowError::TransactionNotFound(payload.merchant_order_no.clone())
            })?;

        if transaction.status == TransactionStatus::Success {
            // At-least-once delivery: the order already settled, nothing to
            // re-apply and no second notification.
            return Ok(WebhookAck {
                transaction: transaction.transaction_id,
                outcome: PaymentOutcome::AlreadySettled,
            });
        }

        if !payload.is_success() {
            transaction.status = TransactionStatus::Failed;
            transaction.response_payload = serde_json::to_value(&payload).ok();
            let transaction_id = transaction.transaction_id.clone();
            self.store.update_transaction(transaction)?;
            return Ok(WebhookAck {
                transaction: transaction_id,
                outcome: PaymentOutcome::Declined,
            });
        }

        let now = Utc::now();
        transaction.status = TransactionStatus::Success;
        transaction.paid_at = Some(now);
        transaction.channel = payload.channel.clone();
        transaction.response_payload = serde_json::to_value(&payload).ok();
        self.store.update_transaction(transaction.clone())?;

        let phase = transaction.phase;
        let (allowed, next, action): (&[ApplicationStatus], ApplicationStatus, &'static str) =
            match phase {
                PaymentPhase::Phase1 => (
                    &PHASE1_INITIATION,
                    ApplicationStatus::Submitted,
                    "phase-1 payment confirmed",
                ),
                PaymentPhase::Phase2 => (
                    &PHASE2_INITIATION,
                    ApplicationStatus::AuditPending,
                    "phase-2 payment confirmed",
                ),
            };

        let updated = transitions::attempt(
            self.store.as_ref(),
            &transaction.application,
            allowed,
            action,
            &Actor::system(),
            payload.channel.clone().map(|channel| format!("via {channel}")),
            |record| {
                let state = record.payment.phase_mut(phase);
                state.status = PhasePaymentStatus::Paid;
                state.paid_at = Some(now);
                next
            },
        )?;

        self.notify(match phase {
            PaymentPhase::Phase1 => Notification {
                recipient: UserId("OFFICER".to_string()),
                role: Role::Officer,
                title: "New application submitted".to_string(),
                message: format!(
                    "Application {} paid the document review fee and awaits review",
                    updated.number
                ),
                application: updated.id.clone(),
            },
            PaymentPhase::Phase2 => Notification {
                recipient: UserId("SCHEDULER".to_string()),
                role: Role::Scheduler,
                title: "Audit fee received".to_string(),
                message: format!(
                    "Application {} is ready for auditor assignment",
                    updated.number
                ),
                application: updated.id.clone(),
            },
        });

        Ok(WebhookAck {
            transaction: transaction.transaction_id,
            outcome: PaymentOutcome::Confirmed,
        })
    }

    /// Officer decision on the submitted documents. Approval unlocks phase-2
    /// payment; a rejection adds a strike, and the third strike sends the
    /// applicant back through phase-1 payment.
    pub fn review_documents(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        decision: ReviewDecision,
        comment: Option<String>,
    ) -> Result<ApplicationRecord, WorkflowError> {
        require_role(actor, Role::Officer, "review documents")?;

        let policy = self.policy;
        let updated = match decision {
            ReviewDecision::Approved => transitions::attempt(
                self.store.as_ref(),
                application_id,
                &REVIEWABLE,
                "documents_approved",
                actor,
                comment.clone(),
                |_| ApplicationStatus::Payment2Pending,
            )?,
            ReviewDecision::Rejected => transitions::attempt(
                self.store.as_ref(),
                application_id,
                &REVIEWABLE,
                "documents_rejected",
                actor,
                comment.clone(),
                |record| {
                    record.reject_count += 1;
                    match policy.verdict(record.reject_count) {
                        StrikeVerdict::RetryPayment => {
                            // The penalty voids the earlier phase-1 payment;
                            // the settled transaction stays in the ledger.
                            record.payment.phase1.status = PhasePaymentStatus::Pending;
                            record.payment.phase1.paid_at = None;
                            record.payment.phase1.transaction = None;
                            ApplicationStatus::Payment1Retry
                        }
                        StrikeVerdict::Revise => ApplicationStatus::RevisionReq,
                    }
                },
            )?,
        };

        let (title, message) = match decision {
            ReviewDecision::Approved => (
                "Documents approved".to_string(),
                "Please proceed with the phase-2 audit fee".to_string(),
            ),
            ReviewDecision::Rejected if updated.status == ApplicationStatus::Payment1Retry => (
                "Documents rejected".to_string(),
                format!(
                    "Rejected {} times; a new document review fee is required. {}",
                    updated.reject_count,
                    comment.unwrap_or_default()
                ),
            ),
            ReviewDecision::Rejected => (
                "Revision requested".to_string(),
                comment.unwrap_or_else(|| "Documents need corrections".to_string()),
            ),
        };
        self.notify(Notification {
            recipient: updated.applicant_id.clone(),
            role: Role::Applicant,
            title,
            message,
            application: updated.id.clone(),
        });

        Ok(updated)
    }

    /// Bind an auditor and date to the application. Re-assignment while
    /// already scheduled is allowed.
    pub fn assign_auditor(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        auditor_id: &UserId,
        date: NaiveDate,
    ) -> Result<ApplicationRecord, WorkflowError> {
        if actor.role != Role::Scheduler && actor.role != Role::Admin {
            return Err(WorkflowError::Forbidden(
                "only a scheduler may assign auditors".to_string(),
            ));
        }

        let auditor = self
            .store
            .resolve_auditor(auditor_id)?
            .ok_or_else(|| WorkflowError::UnknownAuditor(auditor_id.clone()))?;

        let assigned = auditor.id.clone();
        let updated = transitions::attempt(
            self.store.as_ref(),
            application_id,
            &ASSIGNABLE,
            "auditor_assigned",
            actor,
            Some(format!("auditor {} on {date}", auditor.name)),
            |record| {
                record.audit = Some(AuditAssignment::scheduled(assigned, date));
                ApplicationStatus::AuditScheduled
            },
        )?;

        self.notify(Notification {
            recipient: auditor.id,
            role: Role::Auditor,
            title: "New audit assignment".to_string(),
            message: format!(
                "Please audit application {} on {date}",
                updated.number
            ),
            application: updated.id.clone(),
        });

        Ok(updated)
    }

    /// Record the audit outcome. `Pass` certifies the application; any
    /// other result rejects it. Both targets are terminal.
    pub fn submit_audit_result(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        result: AuditResult,
        notes: Option<String>,
    ) -> Result<ApplicationRecord, WorkflowError> {
        require_role(actor, Role::Auditor, "submit an audit result")?;

        let record = self.require_application(application_id)?;
        match &record.audit {
            None => {
                return Err(WorkflowError::Validation(
                    "no auditor has been assigned".to_string(),
                ))
            }
            Some(audit) if audit.auditor != actor.id => {
                return Err(WorkflowError::Forbidden(
                    "only the assigned auditor may submit the result".to_string(),
                ))
            }
            Some(_) => {}
        }

        let next = if result == AuditResult::Pass {
            ApplicationStatus::Certified
        } else {
            ApplicationStatus::Rejected
        };
        let recorded_notes = notes.clone();
        let updated = transitions::attempt(
            self.store.as_ref(),
            application_id,
            &[ApplicationStatus::AuditScheduled],
            "audit_completed",
            actor,
            notes,
            |record| {
                if let Some(audit) = record.audit.as_mut() {
                    audit.result = Some(result);
                    audit.notes = recorded_notes;
                    audit.completed_at = Some(Utc::now());
                }
                next
            },
        )?;

        let (title, message) = if updated.status == ApplicationStatus::Certified {
            (
                "Certification granted".to_string(),
                format!("Application {} passed the audit", updated.number),
            )
        } else {
            (
                "Certification refused".to_string(),
                format!(
                    "Application {} did not pass the audit ({:?})",
                    updated.number, result
                ),
            )
        };
        self.notify(Notification {
            recipient: updated.applicant_id.clone(),
            role: Role::Applicant,
            title,
            message,
            application: updated.id.clone(),
        });

        Ok(updated)
    }

    /// Administrative status override. Still refuses to leave a terminal
    /// state, and records a trail entry like any other transition.
    pub fn force_status(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        status: ApplicationStatus,
        note: Option<String>,
    ) -> Result<ApplicationRecord, WorkflowError> {
        require_role(actor, Role::Admin, "override the status")?;

        let non_terminal: Vec<ApplicationStatus> = ApplicationStatus::ALL
            .into_iter()
            .filter(|status| !status.is_terminal())
            .collect();

        transitions::attempt(
            self.store.as_ref(),
            application_id,
            &non_terminal,
            "status_forced",
            actor,
            note,
            |_| status,
        )
    }

    /// Fetch a single application. Applicants may only see their own.
    pub fn application(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, WorkflowError> {
        let record = self.require_application(application_id)?;
        if actor.role == Role::Applicant && !record.is_owned_by(actor) {
            return Err(WorkflowError::Forbidden(
                "application belongs to another applicant".to_string(),
            ));
        }
        Ok(record)
    }

    pub fn applications_for(&self, actor: &Actor) -> Result<Vec<ApplicationRecord>, WorkflowError> {
        Ok(self.store.applications_for(&actor.id)?)
    }

    /// Officer work queue: applications awaiting document review.
    pub fn pending_reviews(&self) -> Result<Vec<ApplicationRecord>, WorkflowError> {
        Ok(self
            .store
            .applications_with_status(&[ApplicationStatus::Submitted])?)
    }

    /// Applications scheduled for the calling auditor.
    pub fn auditor_assignments(
        &self,
        actor: &Actor,
    ) -> Result<Vec<ApplicationRecord>, WorkflowError> {
        require_role(actor, Role::Auditor, "list audit assignments")?;
        Ok(self.store.assignments_for(&actor.id)?)
    }

    /// Polling endpoint while the applicant waits for the webhook.
    pub fn payment_status(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<TransactionStatus, WorkflowError> {
        let transaction = self
            .store
            .fetch_transaction(transaction_id)?
            .ok_or_else(|| WorkflowError::TransactionNotFound(transaction_id.0.clone()))?;
        Ok(transaction.status)
    }

    /// Full ledger history for one application, retries included.
    pub fn payment_history(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<Vec<PaymentTransaction>, WorkflowError> {
        let record = self.require_application(application_id)?;
        if actor.role == Role::Applicant && !record.is_owned_by(actor) {
            return Err(WorkflowError::Forbidden(
                "application belongs to another applicant".to_string(),
            ));
        }
        Ok(self.store.transactions_for(application_id)?)
    }

    pub fn dashboard_stats(&self) -> Result<DashboardStats, WorkflowError> {
        let applications = self.store.all_applications()?;
        let mut stats = DashboardStats::default();
        stats.total = applications.len();
        for record in &applications {
            match record.status {
                ApplicationStatus::Certified => stats.certified += 1,
                ApplicationStatus::Submitted
                | ApplicationStatus::AuditPending
                | ApplicationStatus::Payment1Pending => stats.in_flight += 1,
                _ => {}
            }
            if record.payment.phase1.status == PhasePaymentStatus::Paid {
                stats.revenue += u64::from(record.payment.phase1.amount);
            }
            if record.payment.phase2.status == PhasePaymentStatus::Paid {
                stats.revenue += u64::from(record.payment.phase2.amount);
            }
        }
        Ok(stats)
    }

    fn require_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, WorkflowError> {
        self.store
            .fetch_application(application_id)?
            .ok_or_else(|| WorkflowError::ApplicationNotFound(application_id.clone()))
    }

    fn ensure_owner(
        &self,
        record: &ApplicationRecord,
        actor: &Actor,
        action: &str,
    ) -> Result<(), WorkflowError> {
        if actor.role != Role::Applicant {
            return Err(WorkflowError::Forbidden(format!(
                "only the applicant may {action}"
            )));
        }
        if !record.is_owned_by(actor) {
            return Err(WorkflowError::Forbidden(
                "application belongs to another applicant".to_string(),
            ));
        }
        Ok(())
    }

    fn notify(&self, notice: Notification) {
        if let Err(err) = self.notifications.deliver(notice) {
            warn!(error = %err, "notification delivery failed");
        }
    }
}

fn require_role(actor: &Actor, role: Role, action: &str) -> Result<(), WorkflowError> {
    if actor.role == role {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden(format!(
            "role {} may not {action}",
            actor.role.label()
        )))
    }
}

/// Material handed back to the applicant after a payment order opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentInitiation {
    pub transaction_id: TransactionId,
    pub payment_url: String,
    pub qr_code: String,
}

/// Webhook acknowledgement, separating delivery receipt from the business
/// outcome of the payment itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    pub transaction: TransactionId,
    pub outcome: PaymentOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    /// Payment settled and the application advanced.
    Confirmed,
    /// Gateway reported a business failure; the phase stays retriable.
    Declined,
    /// Duplicate delivery of an order that already settled.
    AlreadySettled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total: usize,
    pub in_flight: usize,
    pub certified: usize,
    pub revenue: u64,
}

/// Error raised by the certification workflow.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("application {0} not found")]
    ApplicationNotFound(ApplicationId),
    #[error("payment transaction {0} not found")]
    TransactionNotFound(String),
    #[error("auditor {0} not found or lacks the auditor role")]
    UnknownAuditor(UserId),
    #[error("cannot {action} while application is {current}")]
    InvalidState {
        current: ApplicationStatus,
        action: &'static str,
    },
    #[error("webhook signature rejected")]
    Signature,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

impl WorkflowError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WorkflowError::Validation(_)
            | WorkflowError::Profile(_)
            | WorkflowError::Signature
            | WorkflowError::InvalidState { .. } => StatusCode::BAD_REQUEST,
            WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
            WorkflowError::ApplicationNotFound(_)
            | WorkflowError::TransactionNotFound(_)
            | WorkflowError::UnknownAuditor(_) => StatusCode::NOT_FOUND,
            WorkflowError::Gateway(_) => StatusCode::BAD_GATEWAY,
            WorkflowError::Store(StoreError::StatusConflict { .. }) => StatusCode::CONFLICT,
            WorkflowError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
            WorkflowError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
