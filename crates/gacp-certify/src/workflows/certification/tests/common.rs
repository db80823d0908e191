use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::config::WorkflowConfig;
use crate::workflows::certification::domain::{
    Actor, ApplicantProfile, ApplicationForm, ApplicationId, ApplicationRecord,
    ApplicationStatus, CertificationScope, PaymentPhase, PaymentTransaction, Role, SiteInfo,
    TransactionId, UserId,
};
use crate::workflows::certification::gateway::{
    payload_signature_valid, sign_payload, GatewayError, GatewayOrder, OrderRequest,
    PaymentGateway, WebhookPayload,
};
use crate::workflows::certification::service::{CertificationService, PaymentInitiation};
use crate::workflows::certification::store::{
    AuditorRef, Notification, NotificationError, NotificationSink, StoreError, WorkflowStore,
};

pub(super) const WEBHOOK_SECRET: &str = "test-webhook-secret";

pub(super) fn applicant() -> Actor {
    Actor::new("farmer-1", Role::Applicant)
}

pub(super) fn other_applicant() -> Actor {
    Actor::new("farmer-2", Role::Applicant)
}

pub(super) fn officer() -> Actor {
    Actor::new("officer-1", Role::Officer)
}

pub(super) fn scheduler() -> Actor {
    Actor::new("scheduler-1", Role::Scheduler)
}

pub(super) fn auditor() -> Actor {
    Actor::new("auditor-1", Role::Auditor)
}

pub(super) fn admin() -> Actor {
    Actor::new("admin-1", Role::Admin)
}

pub(super) fn individual_profile() -> ApplicantProfile {
    ApplicantProfile::Individual {
        id_card: "1100501234567".to_string(),
        first_name: "Somchai".to_string(),
        last_name: "Srisuk".to_string(),
        phone: "0812345678".to_string(),
    }
}

pub(super) fn juristic_profile() -> ApplicantProfile {
    ApplicantProfile::Juristic {
        registration_no: "0105561234567".to_string(),
        company_name: "Herbal Fields Co., Ltd.".to_string(),
        contact_person: "Kanya Boon".to_string(),
        phone: "022345678".to_string(),
    }
}

pub(super) fn form() -> ApplicationForm {
    ApplicationForm {
        site: SiteInfo {
            farm_name: "Baan Rai Herbs".to_string(),
            province: "Chiang Mai".to_string(),
            district: "Mae Rim".to_string(),
        },
        scope: vec![CertificationScope::Cultivation],
        objective: Vec::new(),
    }
}

pub(super) fn workflow_config() -> WorkflowConfig {
    WorkflowConfig {
        webhook_secret: WEBHOOK_SECRET.to_string(),
        ..WorkflowConfig::default()
    }
}

pub(super) fn schedule_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 15).expect("valid date")
}

pub(super) type TestService = CertificationService<MemoryStore, SecretGateway, RecordingSink>;

pub(super) fn build_service() -> (TestService, Arc<MemoryStore>, Arc<RecordingSink>) {
    let store = Arc::new(MemoryStore::with_auditors(vec![
        AuditorRef {
            id: UserId("auditor-1".to_string()),
            name: "Anong Leela".to_string(),
        },
        AuditorRef {
            id: UserId("auditor-2".to_string()),
            name: "Prasit Wong".to_string(),
        },
    ]));
    let gateway = Arc::new(SecretGateway::new(WEBHOOK_SECRET));
    let sink = Arc::new(RecordingSink::default());
    let service =
        CertificationService::new(store.clone(), gateway, sink.clone(), workflow_config());
    (service, store, sink)
}

pub(super) fn build_service_with_gateway<G>(
    gateway: Arc<G>,
) -> (
    CertificationService<MemoryStore, G, RecordingSink>,
    Arc<MemoryStore>,
    Arc<RecordingSink>,
)
where
    G: PaymentGateway + 'static,
{
    let store = Arc::new(MemoryStore::with_auditors(vec![AuditorRef {
        id: UserId("auditor-1".to_string()),
        name: "Anong Leela".to_string(),
    }]));
    let sink = Arc::new(RecordingSink::default());
    let service =
        CertificationService::new(store.clone(), gateway, sink.clone(), workflow_config());
    (service, store, sink)
}

/// Build a signed SUCCESS payload for the given external order id.
pub(super) fn paid_webhook(external_order_id: &str) -> WebhookPayload {
    signed_webhook(external_order_id, "SUCCESS", Some("promptpay"))
}

pub(super) fn signed_webhook(
    external_order_id: &str,
    result: &str,
    channel: Option<&str>,
) -> WebhookPayload {
    WebhookPayload {
        merchant_order_no: external_order_id.to_string(),
        result: result.to_string(),
        channel: channel.map(str::to_string),
        signature: sign_payload(WEBHOOK_SECRET, external_order_id, result, channel),
    }
}

/// Drive a fresh application to `Payment1Pending`.
pub(super) fn draft_ready_for_payment<G>(
    service: &CertificationService<MemoryStore, G, RecordingSink>,
) -> ApplicationRecord
where
    G: PaymentGateway + 'static,
{
    let record = service
        .create_draft(&applicant(), individual_profile(), form())
        .expect("draft created");
    service
        .confirm_review(&applicant(), &record.id)
        .expect("review confirmed")
}

/// Drive a fresh application to `Submitted` (phase-1 paid).
pub(super) fn submitted_application<G>(
    service: &CertificationService<MemoryStore, G, RecordingSink>,
    store: &MemoryStore,
) -> ApplicationRecord
where
    G: PaymentGateway + 'static,
{
    let record = draft_ready_for_payment(service);
    let initiation = service
        .initiate_payment(&applicant(), &record.id, PaymentPhase::Phase1)
        .expect("phase-1 payment initiated");
    let order = external_order_of(store, &initiation);
    service
        .handle_webhook(paid_webhook(&order))
        .expect("phase-1 webhook reconciled");
    store
        .fetch_application(&record.id)
        .expect("store fetch succeeds")
        .expect("record present")
}

/// Drive a fresh application to `AuditPending` (both phases paid, review
/// approved).
pub(super) fn audit_pending_application<G>(
    service: &CertificationService<MemoryStore, G, RecordingSink>,
    store: &MemoryStore,
) -> ApplicationRecord
where
    G: PaymentGateway + 'static,
{
    let record = submitted_application(service, store);
    service
        .review_documents(
            &officer(),
            &record.id,
            crate::workflows::certification::review::ReviewDecision::Approved,
            None,
        )
        .expect("documents approved");
    let initiation = service
        .initiate_payment(&applicant(), &record.id, PaymentPhase::Phase2)
        .expect("phase-2 payment initiated");
    let order = external_order_of(store, &initiation);
    service
        .handle_webhook(paid_webhook(&order))
        .expect("phase-2 webhook reconciled");
    store
        .fetch_application(&record.id)
        .expect("store fetch succeeds")
        .expect("record present")
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    crate::workflows::certification::router::certification_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json body")
}

pub(super) fn external_order_of(store: &MemoryStore, initiation: &PaymentInitiation) -> String {
    store
        .fetch_transaction(&initiation.transaction_id)
        .expect("store fetch succeeds")
        .expect("transaction present")
        .external_order_id
}

#[derive(Default)]
pub(super) struct MemoryStore {
    applications: Mutex<HashMap<ApplicationId, ApplicationRecord>>,
    transactions: Mutex<HashMap<TransactionId, PaymentTransaction>>,
    auditors: HashMap<UserId, AuditorRef>,
}

impl MemoryStore {
    pub(super) fn with_auditors(auditors: Vec<AuditorRef>) -> Self {
        Self {
            auditors: auditors
                .into_iter()
                .map(|auditor| (auditor.id.clone(), auditor))
                .collect(),
            ..Self::default()
        }
    }

    pub(super) fn transaction_count(&self) -> usize {
        self.transactions
            .lock()
            .expect("transaction mutex poisoned")
            .len()
    }

    /// Flip a stored status behind the service's back, simulating a
    /// concurrent writer that lands between fetch and persist.
    pub(super) fn set_status(&self, id: &ApplicationId, status: ApplicationStatus) {
        let mut guard = self.applications.lock().expect("application mutex poisoned");
        if let Some(record) = guard.get_mut(id) {
            record.status = status;
        }
    }
}

impl WorkflowStore for MemoryStore {
    fn insert_application(
        &self,
        record: ApplicationRecord,
    ) -> Result<ApplicationRecord, StoreError> {
        let mut guard = self.applications.lock().expect("application mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        let guard = self.applications.lock().expect("application mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update_application(
        &self,
        record: ApplicationRecord,
        expected: ApplicationStatus,
    ) -> Result<ApplicationRecord, StoreError> {
        let mut guard = self.applications.lock().expect("application mutex poisoned");
        let stored = guard.get(&record.id).ok_or(StoreError::NotFound)?;
        if stored.status != expected {
            return Err(StoreError::StatusConflict {
                expected,
                found: stored.status,
            });
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn applications_for(&self, applicant: &UserId) -> Result<Vec<ApplicationRecord>, StoreError> {
        let guard = self.applications.lock().expect("application mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| &record.applicant_id == applicant)
            .cloned()
            .collect())
    }

    fn applications_with_status(
        &self,
        statuses: &[ApplicationStatus],
    ) -> Result<Vec<ApplicationRecord>, StoreError> {
        let guard = self.applications.lock().expect("application mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| statuses.contains(&record.status))
            .cloned()
            .collect())
    }

    fn all_applications(&self) -> Result<Vec<ApplicationRecord>, StoreError> {
        let guard = self.applications.lock().expect("application mutex poisoned");
        Ok(guard.values().cloned().collect())
    }

    fn insert_transaction(
        &self,
        transaction: PaymentTransaction,
    ) -> Result<PaymentTransaction, StoreError> {
        let mut guard = self.transactions.lock().expect("transaction mutex poisoned");
        if guard.contains_key(&transaction.transaction_id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(transaction.transaction_id.clone(), transaction.clone());
        Ok(transaction)
    }

    fn update_transaction(&self, transaction: PaymentTransaction) -> Result<(), StoreError> {
        let mut guard = self.transactions.lock().expect("transaction mutex poisoned");
        if !guard.contains_key(&transaction.transaction_id) {
            return Err(StoreError::NotFound);
        }
        guard.insert(transaction.transaction_id.clone(), transaction);
        Ok(())
    }

    fn fetch_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<PaymentTransaction>, StoreError> {
        let guard = self.transactions.lock().expect("transaction mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_transaction_by_order(
        &self,
        external_order_id: &str,
    ) -> Result<Option<PaymentTransaction>, StoreError> {
        let guard = self.transactions.lock().expect("transaction mutex poisoned");
        Ok(guard
            .values()
            .find(|transaction| transaction.external_order_id == external_order_id)
            .cloned())
    }

    fn transactions_for(
        &self,
        application: &ApplicationId,
    ) -> Result<Vec<PaymentTransaction>, StoreError> {
        let guard = self.transactions.lock().expect("transaction mutex poisoned");
        let mut transactions: Vec<_> = guard
            .values()
            .filter(|transaction| &transaction.application == application)
            .cloned()
            .collect();
        transactions.sort_by_key(|transaction| transaction.created_at);
        Ok(transactions)
    }

    fn resolve_auditor(&self, id: &UserId) -> Result<Option<AuditorRef>, StoreError> {
        Ok(self.auditors.get(id).cloned())
    }

    fn assignments_for(&self, auditor: &UserId) -> Result<Vec<ApplicationRecord>, StoreError> {
        let guard = self.applications.lock().expect("application mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| {
                record
                    .audit
                    .as_ref()
                    .is_some_and(|audit| &audit.auditor == auditor)
            })
            .cloned()
            .collect())
    }
}

/// Gateway fake that signs/verifies with a shared secret and fabricates
/// deterministic order material.
pub(super) struct SecretGateway {
    secret: String,
}

impl SecretGateway {
    pub(super) fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
        }
    }
}

impl PaymentGateway for SecretGateway {
    fn create_order(&self, order: &OrderRequest) -> Result<GatewayOrder, GatewayError> {
        Ok(GatewayOrder {
            order_reference: format!("KSH-{}", order.external_order_id),
            payment_url: format!("https://pay.test/orders/{}", order.external_order_id),
            qr_code_url: format!("https://pay.test/qr/{}", order.external_order_id),
        })
    }

    fn verify_signature(&self, payload: &WebhookPayload) -> bool {
        payload_signature_valid(&self.secret, payload)
    }
}

/// Gateway fake whose order creation always fails.
pub(super) struct UnreachableGateway;

impl PaymentGateway for UnreachableGateway {
    fn create_order(&self, _order: &OrderRequest) -> Result<GatewayOrder, GatewayError> {
        Err(GatewayError::Unreachable("connection refused".to_string()))
    }

    fn verify_signature(&self, payload: &WebhookPayload) -> bool {
        payload_signature_valid(WEBHOOK_SECRET, payload)
    }
}

#[derive(Default)]
pub(super) struct RecordingSink {
    notices: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub(super) fn notices(&self) -> Vec<Notification> {
        self.notices.lock().expect("notice mutex poisoned").clone()
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, notice: Notification) -> Result<(), NotificationError> {
        self.notices
            .lock()
            .expect("notice mutex poisoned")
            .push(notice);
        Ok(())
    }
}

/// Sink whose transport always fails, for fire-and-forget checks.
pub(super) struct BrokenSink;

impl NotificationSink for BrokenSink {
    fn deliver(&self, _notice: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp offline".to_string()))
    }
}
