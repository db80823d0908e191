use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

use gacp_certify::workflows::certification::gateway::payload_signature_valid;
use gacp_certify::workflows::certification::{
    ApplicationId, ApplicationRecord, ApplicationStatus, AuditorRef, GatewayError, GatewayOrder,
    Notification, NotificationError, NotificationSink, OrderRequest, PaymentGateway,
    PaymentTransaction, StoreError, TransactionId, UserId, WebhookPayload, WorkflowStore,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Auditor roster for the in-memory deployment. A real deployment resolves
/// auditors from the identity provider instead.
pub(crate) fn default_auditors() -> Vec<AuditorRef> {
    vec![
        AuditorRef {
            id: UserId("AUD-001".to_string()),
            name: "Anong Leela".to_string(),
        },
        AuditorRef {
            id: UserId("AUD-002".to_string()),
            name: "Prasit Wongsa".to_string(),
        },
    ]
}

#[derive(Default)]
pub(crate) struct InMemoryWorkflowStore {
    applications: Mutex<HashMap<ApplicationId, ApplicationRecord>>,
    transactions: Mutex<HashMap<TransactionId, PaymentTransaction>>,
    auditors: HashMap<UserId, AuditorRef>,
}

impl InMemoryWorkflowStore {
    pub(crate) fn with_auditors(auditors: Vec<AuditorRef>) -> Self {
        Self {
            auditors: auditors
                .into_iter()
                .map(|auditor| (auditor.id.clone(), auditor))
                .collect(),
            ..Self::default()
        }
    }
}

impl WorkflowStore for InMemoryWorkflowStore {
    fn insert_application(
        &self,
        record: ApplicationRecord,
    ) -> Result<ApplicationRecord, StoreError> {
        let mut guard = self.applications.lock().expect("store mutex poisoned");
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
        let guard = self.applications.lock().expect("store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update_application(
        &self,
        record: ApplicationRecord,
        expected: ApplicationStatus,
    ) -> Result<ApplicationRecord, StoreError> {
        let mut guard = self.applications.lock().expect("store mutex poisoned");
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
        let guard = self.applications.lock().expect("store mutex poisoned");
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
        let guard = self.applications.lock().expect("store mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| statuses.contains(&record.status))
            .cloned()
            .collect())
    }

    fn all_applications(&self) -> Result<Vec<ApplicationRecord>, StoreError> {
        let guard = self.applications.lock().expect("store mutex poisoned");
        Ok(guard.values().cloned().collect())
    }

    fn insert_transaction(
        &self,
        transaction: PaymentTransaction,
    ) -> Result<PaymentTransaction, StoreError> {
        let mut guard = self.transactions.lock().expect("store mutex poisoned");
        if guard.contains_key(&transaction.transaction_id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(transaction.transaction_id.clone(), transaction.clone());
        Ok(transaction)
    }

    fn update_transaction(&self, transaction: PaymentTransaction) -> Result<(), StoreError> {
        let mut guard = self.transactions.lock().expect("store mutex poisoned");
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
        let guard = self.transactions.lock().expect("store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_transaction_by_order(
        &self,
        external_order_id: &str,
    ) -> Result<Option<PaymentTransaction>, StoreError> {
        let guard = self.transactions.lock().expect("store mutex poisoned");
        Ok(guard
            .values()
            .find(|transaction| transaction.external_order_id == external_order_id)
            .cloned())
    }

    fn transactions_for(
        &self,
        application: &ApplicationId,
    ) -> Result<Vec<PaymentTransaction>, StoreError> {
        let guard = self.transactions.lock().expect("store mutex poisoned");
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
        let guard = self.applications.lock().expect("store mutex poisoned");
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

/// Stand-in for the Ksher gateway: registers orders locally and checks
/// webhook signatures against the shared secret from configuration.
pub(crate) struct MockPaymentGateway {
    secret: String,
}

impl MockPaymentGateway {
    pub(crate) fn new(secret: String) -> Self {
        Self { secret }
    }
}

impl PaymentGateway for MockPaymentGateway {
    fn create_order(&self, order: &OrderRequest) -> Result<GatewayOrder, GatewayError> {
        Ok(GatewayOrder {
            order_reference: format!("KSH-{}", order.external_order_id),
            payment_url: format!(
                "https://gateway.ksher.example/pay/{}",
                order.external_order_id
            ),
            qr_code_url: format!(
                "https://gateway.ksher.example/qr/{}.png",
                order.external_order_id
            ),
        })
    }

    fn verify_signature(&self, payload: &WebhookPayload) -> bool {
        payload_signature_valid(&self.secret, payload)
    }
}

/// Notification sink that writes notices to the service log instead of a
/// mail or LINE transport.
#[derive(Default)]
pub(crate) struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn deliver(&self, notice: Notification) -> Result<(), NotificationError> {
        info!(
            recipient = %notice.recipient,
            role = notice.role.label(),
            application = %notice.application,
            title = %notice.title,
            "notification dispatched"
        );
        Ok(())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
