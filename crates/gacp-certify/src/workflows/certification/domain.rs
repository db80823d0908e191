use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for certification applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier supplied by the upstream identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Internal identifier for a single payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Roles recognized by the workflow. The core trusts the identity provider
/// to have authenticated the actor; it only checks that the role fits the
/// requested operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Applicant,
    Officer,
    Scheduler,
    Auditor,
    Admin,
    System,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Applicant => "APPLICANT",
            Role::Officer => "OFFICER",
            Role::Scheduler => "SCHEDULER",
            Role::Auditor => "AUDITOR",
            Role::Admin => "ADMIN",
            Role::System => "SYSTEM",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "APPLICANT" | "FARMER" => Some(Role::Applicant),
            "OFFICER" => Some(Role::Officer),
            "SCHEDULER" => Some(Role::Scheduler),
            "AUDITOR" => Some(Role::Auditor),
            "ADMIN" => Some(Role::Admin),
            "SYSTEM" => Some(Role::System),
            _ => None,
        }
    }
}

/// Authenticated actor identity attached to every workflow operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId(id.into()),
            role,
        }
    }

    /// Actor recorded for webhook-driven transitions.
    pub fn system() -> Self {
        Self::new("system", Role::System)
    }
}

/// The eleven workflow states an application can occupy.
///
/// `Certified` and `Rejected` are terminal: no transition, including the
/// administrative override, may leave them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    #[serde(rename = "DRAFT")]
    Draft,
    #[serde(rename = "REVIEW_PENDING")]
    ReviewPending,
    #[serde(rename = "PAYMENT_1_PENDING")]
    Payment1Pending,
    #[serde(rename = "SUBMITTED")]
    Submitted,
    #[serde(rename = "REVISION_REQ")]
    RevisionReq,
    #[serde(rename = "PAYMENT_1_RETRY")]
    Payment1Retry,
    #[serde(rename = "PAYMENT_2_PENDING")]
    Payment2Pending,
    #[serde(rename = "AUDIT_PENDING")]
    AuditPending,
    #[serde(rename = "AUDIT_SCHEDULED")]
    AuditScheduled,
    #[serde(rename = "CERTIFIED")]
    Certified,
    #[serde(rename = "REJECTED")]
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 11] = [
        ApplicationStatus::Draft,
        ApplicationStatus::ReviewPending,
        ApplicationStatus::Payment1Pending,
        ApplicationStatus::Submitted,
        ApplicationStatus::RevisionReq,
        ApplicationStatus::Payment1Retry,
        ApplicationStatus::Payment2Pending,
        ApplicationStatus::AuditPending,
        ApplicationStatus::AuditScheduled,
        ApplicationStatus::Certified,
        ApplicationStatus::Rejected,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "DRAFT",
            ApplicationStatus::ReviewPending => "REVIEW_PENDING",
            ApplicationStatus::Payment1Pending => "PAYMENT_1_PENDING",
            ApplicationStatus::Submitted => "SUBMITTED",
            ApplicationStatus::RevisionReq => "REVISION_REQ",
            ApplicationStatus::Payment1Retry => "PAYMENT_1_RETRY",
            ApplicationStatus::Payment2Pending => "PAYMENT_2_PENDING",
            ApplicationStatus::AuditPending => "AUDIT_PENDING",
            ApplicationStatus::AuditScheduled => "AUDIT_SCHEDULED",
            ApplicationStatus::Certified => "CERTIFIED",
            ApplicationStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let wanted = value.trim().to_ascii_uppercase();
        Self::ALL.iter().copied().find(|status| status.label() == wanted)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Certified | ApplicationStatus::Rejected)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Applicant identity as a tagged union. Each variant carries its own
/// required fields and is validated at the input boundary rather than
/// downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicantProfile {
    Individual {
        id_card: String,
        first_name: String,
        last_name: String,
        phone: String,
    },
    Juristic {
        registration_no: String,
        company_name: String,
        contact_person: String,
        phone: String,
    },
    CommunityEnterprise {
        enterprise_code: String,
        enterprise_name: String,
        representative: String,
        member_count: u32,
    },
}

impl ApplicantProfile {
    pub fn validate(&self) -> Result<(), ProfileError> {
        match self {
            ApplicantProfile::Individual {
                id_card,
                first_name,
                last_name,
                phone,
            } => {
                require("individual", "id_card", id_card)?;
                require("individual", "first_name", first_name)?;
                require("individual", "last_name", last_name)?;
                require("individual", "phone", phone)
            }
            ApplicantProfile::Juristic {
                registration_no,
                company_name,
                contact_person,
                phone,
            } => {
                require("juristic", "registration_no", registration_no)?;
                require("juristic", "company_name", company_name)?;
                require("juristic", "contact_person", contact_person)?;
                require("juristic", "phone", phone)
            }
            ApplicantProfile::CommunityEnterprise {
                enterprise_code,
                enterprise_name,
                representative,
                member_count,
            } => {
                require("community enterprise", "enterprise_code", enterprise_code)?;
                require("community enterprise", "enterprise_name", enterprise_name)?;
                require("community enterprise", "representative", representative)?;
                if *member_count == 0 {
                    return Err(ProfileError::EmptyEnterprise);
                }
                Ok(())
            }
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            ApplicantProfile::Individual {
                first_name,
                last_name,
                ..
            } => format!("{first_name} {last_name}"),
            ApplicantProfile::Juristic { company_name, .. } => company_name.clone(),
            ApplicantProfile::CommunityEnterprise {
                enterprise_name, ..
            } => enterprise_name.clone(),
        }
    }
}

fn require(
    variant: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), ProfileError> {
    if value.trim().is_empty() {
        Err(ProfileError::MissingField { variant, field })
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("{variant} applicant is missing required field '{field}'")]
    MissingField {
        variant: &'static str,
        field: &'static str,
    },
    #[error("community enterprise must declare at least one member")]
    EmptyEnterprise,
}

/// Certification targets a farm site can apply for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificationScope {
    Cultivation,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Objective {
    Research,
    CommercialDomestic,
    CommercialExport,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteInfo {
    pub farm_name: String,
    pub province: String,
    pub district: String,
}

/// Form data captured at draft time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationForm {
    pub site: SiteInfo,
    #[serde(default)]
    pub scope: Vec<CertificationScope>,
    #[serde(default)]
    pub objective: Vec<Objective>,
}

impl ApplicationForm {
    /// Fill the defaults the intake form applies when the applicant leaves
    /// scope or objective blank.
    pub fn normalized(mut self) -> Self {
        if self.scope.is_empty() {
            self.scope.push(CertificationScope::Cultivation);
        }
        if self.objective.is_empty() {
            self.objective.push(Objective::CommercialDomestic);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentPhase {
    #[serde(rename = "PHASE_1")]
    Phase1,
    #[serde(rename = "PHASE_2")]
    Phase2,
}

impl PaymentPhase {
    pub const fn number(self) -> u8 {
        match self {
            PaymentPhase::Phase1 => 1,
            PaymentPhase::Phase2 => 2,
        }
    }

    pub fn from_number(value: u8) -> Option<Self> {
        match value {
            1 => Some(PaymentPhase::Phase1),
            2 => Some(PaymentPhase::Phase2),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phase {}", self.number())
    }
}

/// Settlement state of one fee phase as seen on the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhasePaymentStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "PAID")]
    Paid,
}

impl PhasePaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PhasePaymentStatus::Pending => "PENDING",
            PhasePaymentStatus::Paid => "PAID",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPhaseState {
    pub amount: u32,
    pub status: PhasePaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    /// Active transaction for this phase; historical attempts stay in the
    /// store even after a retry replaces this reference.
    pub transaction: Option<TransactionId>,
}

impl PaymentPhaseState {
    pub fn pending(amount: u32) -> Self {
        Self {
            amount,
            status: PhasePaymentStatus::Pending,
            paid_at: None,
            transaction: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentState {
    pub phase1: PaymentPhaseState,
    pub phase2: PaymentPhaseState,
}

impl PaymentState {
    pub fn phase(&self, phase: PaymentPhase) -> &PaymentPhaseState {
        match phase {
            PaymentPhase::Phase1 => &self.phase1,
            PaymentPhase::Phase2 => &self.phase2,
        }
    }

    pub fn phase_mut(&mut self, phase: PaymentPhase) -> &mut PaymentPhaseState {
        match phase {
            PaymentPhase::Phase1 => &mut self.phase1,
            PaymentPhase::Phase2 => &mut self.phase2,
        }
    }
}

/// Outcome of the on-site evaluation. Anything other than `Pass` rejects
/// the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditResult {
    Pass,
    Minor,
    Major,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditAssignment {
    pub auditor: UserId,
    pub scheduled_date: NaiveDate,
    pub result: Option<AuditResult>,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AuditAssignment {
    pub fn scheduled(auditor: UserId, scheduled_date: NaiveDate) -> Self {
        Self {
            auditor,
            scheduled_date,
            result: None,
            notes: None,
            completed_at: None,
        }
    }
}

/// One append-only audit-trail entry; every transition records exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailEntry {
    pub action: String,
    pub actor: UserId,
    pub role: Role,
    pub status: ApplicationStatus,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

/// The application aggregate every workflow component reads and mutates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub number: String,
    pub applicant_id: UserId,
    pub applicant: ApplicantProfile,
    pub form: ApplicationForm,
    pub status: ApplicationStatus,
    pub reject_count: u32,
    pub payment: PaymentState,
    pub audit: Option<AuditAssignment>,
    pub trail: Vec<TrailEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationRecord {
    pub fn is_owned_by(&self, actor: &Actor) -> bool {
        self.applicant_id == actor.id
    }
}

/// Settlement state of a single payment attempt against the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "EXPIRED")]
    Expired,
}

impl TransactionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Expired => "EXPIRED",
        }
    }
}

/// Ledger record for one payment attempt. Created `Pending`; moves to
/// `Success`/`Failed` only via a gateway response or webhook. Once
/// `Success`, amount, channel, and `paid_at` are frozen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub transaction_id: TransactionId,
    pub external_order_id: String,
    pub application: ApplicationId,
    pub phase: PaymentPhase,
    pub amount: u32,
    pub channel: Option<String>,
    pub status: TransactionStatus,
    pub request_payload: Option<serde_json::Value>,
    pub response_payload: Option<serde_json::Value>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
