use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, AuditResult, PaymentTransaction,
    Role, TransactionId, UserId,
};

/// Data-access port for the workflow engine.
///
/// `update_application` is a compare-and-set keyed on the status the caller
/// read before mutating; implementations must reject the write with
/// [`StoreError::StatusConflict`] when the persisted status no longer
/// matches. That conditional write is what keeps racing webhook deliveries
/// and officer actions from losing updates.
pub trait WorkflowStore: Send + Sync {
    fn insert_application(
        &self,
        record: ApplicationRecord,
    ) -> Result<ApplicationRecord, StoreError>;
    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError>;
    fn update_application(
        &self,
        record: ApplicationRecord,
        expected: ApplicationStatus,
    ) -> Result<ApplicationRecord, StoreError>;
    fn applications_for(&self, applicant: &UserId) -> Result<Vec<ApplicationRecord>, StoreError>;
    fn applications_with_status(
        &self,
        statuses: &[ApplicationStatus],
    ) -> Result<Vec<ApplicationRecord>, StoreError>;
    fn all_applications(&self) -> Result<Vec<ApplicationRecord>, StoreError>;

    fn insert_transaction(
        &self,
        transaction: PaymentTransaction,
    ) -> Result<PaymentTransaction, StoreError>;
    fn update_transaction(&self, transaction: PaymentTransaction) -> Result<(), StoreError>;
    fn fetch_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<PaymentTransaction>, StoreError>;
    fn find_transaction_by_order(
        &self,
        external_order_id: &str,
    ) -> Result<Option<PaymentTransaction>, StoreError>;
    /// Every attempt ever made for the application, newest last. History is
    /// retained even after a retry supersedes the active reference.
    fn transactions_for(
        &self,
        application: &ApplicationId,
    ) -> Result<Vec<PaymentTransaction>, StoreError>;

    /// Resolve a user id to an auditor, or `None` when the user is unknown
    /// or does not hold the auditor role.
    fn resolve_auditor(&self, id: &UserId) -> Result<Option<AuditorRef>, StoreError>;
    fn assignments_for(&self, auditor: &UserId) -> Result<Vec<ApplicationRecord>, StoreError>;
}

/// Minimal auditor descriptor resolved through the data-access port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditorRef {
    pub id: UserId,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("status changed concurrently: expected {expected}, found {found}")]
    StatusConflict {
        expected: ApplicationStatus,
        found: ApplicationStatus,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Stakeholder notice emitted after a transition. Delivery is fire-and-forget;
/// the engine logs failures and never lets them block the transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: UserId,
    pub role: Role,
    pub title: String,
    pub message: String,
    pub application: ApplicationId,
}

pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notice: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Sanitized representation of an application for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub number: String,
    pub status: &'static str,
    pub reject_count: u32,
    pub phase1: PhaseView,
    pub phase2: PhaseView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseView {
    pub amount: u32,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditView {
    pub auditor: UserId,
    pub scheduled_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AuditResult>,
    pub completed: bool,
}

impl ApplicationRecord {
    pub fn view(&self) -> ApplicationView {
        ApplicationView {
            application_id: self.id.clone(),
            number: self.number.clone(),
            status: self.status.label(),
            reject_count: self.reject_count,
            phase1: PhaseView {
                amount: self.payment.phase1.amount,
                status: self.payment.phase1.status.label(),
                paid_at: self.payment.phase1.paid_at,
            },
            phase2: PhaseView {
                amount: self.payment.phase2.amount,
                status: self.payment.phase2.status.label(),
                paid_at: self.payment.phase2.paid_at,
            },
            audit: self.audit.as_ref().map(|audit| AuditView {
                auditor: audit.auditor.clone(),
                scheduled_date: audit.scheduled_date,
                result: audit.result,
                completed: audit.completed_at.is_some(),
            }),
        }
    }
}
