//! Workflow engine for GACP agricultural product certification.
//!
//! The heart of the crate lives in [`workflows::certification`]: an eleven-state
//! application status machine, a two-phase payment gate reconciled through
//! asynchronous gateway webhooks, a rejection-strike penalty counter, and
//! auditor assignment with a final pass/fail certification decision. External
//! collaborators (data access, payment gateway, notification delivery) are
//! consumed through narrow traits so the engine can be exercised entirely
//! in memory.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
