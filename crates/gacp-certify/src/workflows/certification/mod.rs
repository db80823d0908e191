//! GACP certification application workflow.
//!
//! The status machine, payment gate, rejection-strike counter, and audit
//! assignment all funnel through [`service::CertificationService`], which is
//! generic over three ports: a [`store::WorkflowStore`] for data access, a
//! [`gateway::PaymentGateway`] for the external payment provider, and a
//! [`store::NotificationSink`] for fire-and-forget stakeholder notices.
//! Every status mutation is a compare-and-set keyed on the status read at
//! mutation time, so racing webhook deliveries and officer actions cannot
//! silently lose updates.

pub mod domain;
pub mod gateway;
pub mod review;
pub mod router;
pub mod service;
pub mod store;
pub(crate) mod transitions;

#[cfg(test)]
mod tests;

pub use domain::{
    Actor, ApplicantProfile, ApplicationForm, ApplicationId, ApplicationRecord,
    ApplicationStatus, AuditAssignment, AuditResult, CertificationScope, Objective,
    PaymentPhase, PaymentPhaseState, PaymentState, PaymentTransaction, PhasePaymentStatus,
    ProfileError, Role, SiteInfo, TrailEntry, TransactionId, TransactionStatus, UserId,
};
pub use gateway::{GatewayError, GatewayOrder, OrderRequest, PaymentGateway, WebhookPayload};
pub use review::{ReviewDecision, StrikePolicy, StrikeVerdict};
pub use router::certification_router;
pub use service::{
    CertificationService, DashboardStats, PaymentInitiation, PaymentOutcome, WebhookAck,
    WorkflowError,
};
pub use store::{
    ApplicationView, AuditView, AuditorRef, Notification, NotificationError, NotificationSink,
    PhaseView, StoreError, WorkflowStore,
};
