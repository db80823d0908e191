use chrono::Utc;

use super::domain::{Actor, ApplicationId, ApplicationRecord, ApplicationStatus, TrailEntry};
use super::service::WorkflowError;
use super::store::WorkflowStore;

/// The single chokepoint for status mutation.
///
/// Fetches the current record, fails with [`WorkflowError::InvalidState`]
/// when the status is not in `allowed`, otherwise lets `decide` mutate the
/// aggregate and name the target status, appends one trail entry, and
/// persists through the store's compare-and-set keyed on the status that was
/// just read. A concurrent writer that got there first surfaces as
/// [`StoreError::StatusConflict`](super::store::StoreError::StatusConflict);
/// the caller retries or gives up, nothing is partially applied.
///
/// `decide` runs against the freshly fetched record, so decisions that
/// depend on current counters (the rejection strikes) see the value that the
/// conditional write will protect.
pub(crate) fn attempt<S, F>(
    store: &S,
    application_id: &ApplicationId,
    allowed: &[ApplicationStatus],
    action: &'static str,
    actor: &Actor,
    note: Option<String>,
    decide: F,
) -> Result<ApplicationRecord, WorkflowError>
where
    S: WorkflowStore + ?Sized,
    F: FnOnce(&mut ApplicationRecord) -> ApplicationStatus,
{
    let mut record = store
        .fetch_application(application_id)?
        .ok_or_else(|| WorkflowError::ApplicationNotFound(application_id.clone()))?;

    let current = record.status;
    if !allowed.contains(&current) {
        return Err(WorkflowError::InvalidState { current, action });
    }

    let next = decide(&mut record);
    let now = Utc::now();
    record.status = next;
    record.trail.push(TrailEntry {
        action: action.to_string(),
        actor: actor.id.clone(),
        role: actor.role,
        status: next,
        at: now,
        note,
    });
    record.updated_at = now;

    Ok(store.update_application(record, current)?)
}
