use crate::infra::{default_auditors, InMemoryWorkflowStore, MockPaymentGateway};
use chrono::{Local, NaiveDate};
use clap::Args;
use std::sync::Arc;

use gacp_certify::config::WorkflowConfig;
use gacp_certify::error::AppError;
use gacp_certify::workflows::certification::gateway::sign_payload;
use gacp_certify::workflows::certification::{
    Actor, ApplicantProfile, ApplicationForm, ApplicationId, AuditResult, CertificationScope,
    CertificationService, Notification, NotificationError, NotificationSink, PaymentPhase,
    ReviewDecision, Role, SiteInfo, TransactionId, UserId, WebhookPayload, WorkflowError,
    WorkflowStore,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// On-site audit date (YYYY-MM-DD). Defaults to 30 days from today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) audit_date: Option<NaiveDate>,
    /// Reject the documents three times first to show the payment penalty.
    #[arg(long)]
    pub(crate) with_rejections: bool,
}

/// Notification sink that prints to stdout so the demo reads as a script.
struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn deliver(&self, notice: Notification) -> Result<(), NotificationError> {
        println!(
            "  [notify {} -> {}] {}: {}",
            notice.role.label(),
            notice.recipient,
            notice.title,
            notice.message
        );
        Ok(())
    }
}

type DemoService = CertificationService<InMemoryWorkflowStore, MockPaymentGateway, ConsoleSink>;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let audit_date = args
        .audit_date
        .unwrap_or_else(|| Local::now().date_naive() + chrono::Duration::days(30));

    let config = WorkflowConfig::default();
    let secret = config.webhook_secret.clone();
    let store = Arc::new(InMemoryWorkflowStore::with_auditors(default_auditors()));
    let service = CertificationService::new(
        store.clone(),
        Arc::new(MockPaymentGateway::new(secret.clone())),
        Arc::new(ConsoleSink),
        config,
    );

    let applicant = Actor::new("FARMER-104", Role::Applicant);
    let officer = Actor::new("OFF-21", Role::Officer);
    let scheduler = Actor::new("SCH-07", Role::Scheduler);
    let auditor = Actor::new("AUD-001", Role::Auditor);

    println!("GACP certification workflow demo");

    let record = service.create_draft(
        &applicant,
        ApplicantProfile::Individual {
            id_card: "3500200456789".to_string(),
            first_name: "Somchai".to_string(),
            last_name: "Srisuk".to_string(),
            phone: "0812345678".to_string(),
        },
        ApplicationForm {
            site: SiteInfo {
                farm_name: "Baan Rai Herbs".to_string(),
                province: "Chiang Mai".to_string(),
                district: "Mae Rim".to_string(),
            },
            scope: vec![CertificationScope::Cultivation],
            objective: Vec::new(),
        },
    )?;
    println!("- Draft {} created for {}", record.number, record.applicant.display_name());

    let record_id = record.id.clone();
    let confirmed = service.confirm_review(&applicant, &record_id)?;
    println!("- Review confirmed -> {}", confirmed.status);

    pay_phase(&service, &store, &secret, &applicant, &record_id, PaymentPhase::Phase1)?;

    if args.with_rejections {
        println!("- Officer rejects the documents three times");
        for round in 1..=3u32 {
            let reviewed = service.review_documents(
                &officer,
                &record_id,
                ReviewDecision::Rejected,
                Some(format!("round {round}: water analysis missing")),
            )?;
            println!("  rejection {round} -> {} (strikes {})", reviewed.status, reviewed.reject_count);
        }
        println!("- The penalty voided the document fee; paying phase 1 again");
        pay_phase(&service, &store, &secret, &applicant, &record_id, PaymentPhase::Phase1)?;
    }

    let approved = service.review_documents(&officer, &record_id, ReviewDecision::Approved, None)?;
    println!("- Documents approved -> {}", approved.status);

    pay_phase(&service, &store, &secret, &applicant, &record_id, PaymentPhase::Phase2)?;

    let scheduled = service.assign_auditor(
        &scheduler,
        &record_id,
        &UserId("AUD-001".to_string()),
        audit_date,
    )?;
    println!("- Audit scheduled for {audit_date} -> {}", scheduled.status);

    let verdict = service.submit_audit_result(
        &auditor,
        &record_id,
        AuditResult::Pass,
        Some("plots and records conform".to_string()),
    )?;
    println!("- Audit result recorded -> {}", verdict.status);

    println!("\nAudit trail");
    for entry in &verdict.trail {
        let note = entry
            .note
            .as_deref()
            .map(|note| format!(" ({note})"))
            .unwrap_or_default();
        println!(
            "- {} by {} [{}] -> {}{}",
            entry.action,
            entry.actor,
            entry.role.label(),
            entry.status,
            note
        );
    }

    let stats = service.dashboard_stats().map_err(AppError::from)?;
    println!(
        "\nDashboard: {} applications, {} certified, {} THB collected",
        stats.total, stats.certified, stats.revenue
    );

    Ok(())
}

/// Open a payment order for the phase and immediately settle it with a
/// correctly signed synthetic webhook, the way the gateway would call back.
fn pay_phase(
    service: &DemoService,
    store: &InMemoryWorkflowStore,
    secret: &str,
    applicant: &Actor,
    application_id: &ApplicationId,
    phase: PaymentPhase,
) -> Result<(), AppError> {
    let initiation = service.initiate_payment(applicant, application_id, phase)?;
    println!("- {phase} order opened, pay at {}", initiation.payment_url);

    let order = external_order(store, &initiation.transaction_id)?;
    let payload = WebhookPayload {
        merchant_order_no: order.clone(),
        result: "SUCCESS".to_string(),
        channel: Some("promptpay".to_string()),
        signature: sign_payload(secret, &order, "SUCCESS", Some("promptpay")),
    };
    let ack = service.handle_webhook(payload)?;
    println!("- Webhook settled {order} ({:?})", ack.outcome);
    Ok(())
}

fn external_order(
    store: &InMemoryWorkflowStore,
    transaction_id: &TransactionId,
) -> Result<String, AppError> {
    let transaction = store
        .fetch_transaction(transaction_id)
        .map_err(WorkflowError::from)?
        .ok_or_else(|| WorkflowError::TransactionNotFound(transaction_id.0.clone()))
        .map_err(AppError::from)?;
    Ok(transaction.external_order_id)
}
