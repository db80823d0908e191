use super::common::*;

use crate::workflows::certification::domain::{ApplicationId, ApplicationStatus, Role};
use crate::workflows::certification::service::WorkflowError;
use crate::workflows::certification::store::{StoreError, WorkflowStore};
use crate::workflows::certification::transitions;

#[test]
fn disallowed_status_fails_without_mutation() {
    let (service, store, _) = build_service();
    let record = service
        .create_draft(&applicant(), individual_profile(), form())
        .expect("draft created");

    let err = transitions::attempt(
        store.as_ref(),
        &record.id,
        &[ApplicationStatus::Submitted],
        "documents_approved",
        &officer(),
        None,
        |_| ApplicationStatus::Payment2Pending,
    )
    .expect_err("draft is not reviewable");

    assert!(matches!(
        err,
        WorkflowError::InvalidState {
            current: ApplicationStatus::Draft,
            ..
        }
    ));

    let stored = store
        .fetch_application(&record.id)
        .expect("fetch succeeds")
        .expect("record present");
    assert_eq!(stored.status, ApplicationStatus::Draft);
    assert_eq!(stored.trail.len(), 1, "failed guard must not leave a trail");
}

#[test]
fn successful_transition_appends_one_trail_entry() {
    let (service, store, _) = build_service();
    let record = service
        .create_draft(&applicant(), individual_profile(), form())
        .expect("draft created");

    let updated = transitions::attempt(
        store.as_ref(),
        &record.id,
        &[ApplicationStatus::Draft],
        "review_confirmed",
        &applicant(),
        Some("double-checked the farm map".to_string()),
        |_| ApplicationStatus::Payment1Pending,
    )
    .expect("transition applies");

    assert_eq!(updated.status, ApplicationStatus::Payment1Pending);
    assert_eq!(updated.trail.len(), 2);
    let entry = updated.trail.last().expect("trail entry");
    assert_eq!(entry.action, "review_confirmed");
    assert_eq!(entry.actor, applicant().id);
    assert_eq!(entry.role, Role::Applicant);
    assert_eq!(entry.status, ApplicationStatus::Payment1Pending);
    assert_eq!(entry.note.as_deref(), Some("double-checked the farm map"));
    assert!(updated.updated_at >= record.updated_at);
}

#[test]
fn concurrent_writer_surfaces_status_conflict() {
    let (service, store, _) = build_service();
    let record = service
        .create_draft(&applicant(), individual_profile(), form())
        .expect("draft created");

    // The closure runs between fetch and persist, so flipping the stored
    // status here is exactly the race the conditional write must catch.
    let err = transitions::attempt(
        store.as_ref(),
        &record.id,
        &[ApplicationStatus::Draft],
        "review_confirmed",
        &applicant(),
        None,
        |_| {
            store.set_status(&record.id, ApplicationStatus::Submitted);
            ApplicationStatus::Payment1Pending
        },
    )
    .expect_err("stale write must be rejected");

    assert!(matches!(
        err,
        WorkflowError::Store(StoreError::StatusConflict {
            expected: ApplicationStatus::Draft,
            found: ApplicationStatus::Submitted,
        })
    ));

    let stored = store
        .fetch_application(&record.id)
        .expect("fetch succeeds")
        .expect("record present");
    assert_eq!(stored.status, ApplicationStatus::Submitted);
    assert_eq!(stored.trail.len(), 1, "losing writer leaves no trace");
}

#[test]
fn unknown_application_is_reported() {
    let (_, store, _) = build_service();

    let err = transitions::attempt(
        store.as_ref(),
        &ApplicationId("app-does-not-exist".to_string()),
        &[ApplicationStatus::Draft],
        "review_confirmed",
        &applicant(),
        None,
        |_| ApplicationStatus::Payment1Pending,
    )
    .expect_err("missing record");

    assert!(matches!(err, WorkflowError::ApplicationNotFound(_)));
}
