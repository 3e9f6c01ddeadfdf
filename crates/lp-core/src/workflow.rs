//! Status workflow for requests and testing samples.
//!
//! Requests and samples move through small state machines. Sample changes
//! roll up into the parent request; rejecting or cancelling a request
//! cascades down to its open samples.
//!
//! ```text
//! request:  submitted -> in_progress -> completed
//!               |             |
//!               +-> rejected  +-> cancelled
//!               +-> cancelled
//!
//! sample:   submitted -> received -> in_progress -> completed
//!               |            |            |
//!               +-> rejected +-> cancelled+-> cancelled
//!               +-> cancelled
//! ```

use crate::models::{RequestStatus, SampleStatus, TestingSample};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by workflow checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Invalid request status transition from {from} to {to}")]
    InvalidRequestTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("Invalid sample status transition from {from} to {to}")]
    InvalidSampleTransition {
        from: SampleStatus,
        to: SampleStatus,
    },
}

/// Statuses a request may move to from `from`.
pub fn request_targets(from: RequestStatus) -> &'static [RequestStatus] {
    use RequestStatus::*;
    match from {
        Submitted => &[InProgress, Rejected, Cancelled],
        InProgress => &[Completed, Cancelled],
        Completed | Rejected | Cancelled => &[],
    }
}

/// Statuses a sample may move to from `from`.
pub fn sample_targets(from: SampleStatus) -> &'static [SampleStatus] {
    use SampleStatus::*;
    match from {
        Submitted => &[Received, Rejected, Cancelled],
        Received => &[InProgress, Cancelled],
        InProgress => &[Completed, Cancelled],
        Completed | Rejected | Cancelled => &[],
    }
}

/// Checks a request transition. Staying in the same status is always allowed.
pub fn check_request_transition(
    from: RequestStatus,
    to: RequestStatus,
) -> Result<(), WorkflowError> {
    if from == to || request_targets(from).contains(&to) {
        Ok(())
    } else {
        Err(WorkflowError::InvalidRequestTransition { from, to })
    }
}

/// Checks a sample transition. Staying in the same status is always allowed.
pub fn check_sample_transition(from: SampleStatus, to: SampleStatus) -> Result<(), WorkflowError> {
    if from == to || sample_targets(from).contains(&to) {
        Ok(())
    } else {
        Err(WorkflowError::InvalidSampleTransition { from, to })
    }
}

/// Status that open samples take when their request moves to `request_status`.
///
/// Only rejection and cancellation cascade.
pub fn cascade_sample_status(request_status: RequestStatus) -> Option<SampleStatus> {
    match request_status {
        RequestStatus::Rejected => Some(SampleStatus::Rejected),
        RequestStatus::Cancelled => Some(SampleStatus::Cancelled),
        _ => None,
    }
}

/// Derives a request's status from its samples after a sample change.
///
/// Terminal requests are never reopened. Once every sample is terminal the
/// request completes if any sample completed, is rejected if every sample was
/// rejected, and is cancelled otherwise. A submitted request with work under
/// way moves to `in_progress`.
pub fn rollup_request_status(current: RequestStatus, samples: &[SampleStatus]) -> RequestStatus {
    if current.is_terminal() || samples.is_empty() {
        return current;
    }

    if samples.iter().all(SampleStatus::is_terminal) {
        if samples.contains(&SampleStatus::Completed) {
            return RequestStatus::Completed;
        }
        if samples.iter().all(|s| *s == SampleStatus::Rejected) {
            return RequestStatus::Rejected;
        }
        return RequestStatus::Cancelled;
    }

    let work_started = samples.iter().any(|s| {
        matches!(
            s,
            SampleStatus::Received | SampleStatus::InProgress | SampleStatus::Completed
        )
    });

    if current == RequestStatus::Submitted && work_started {
        RequestStatus::InProgress
    } else {
        current
    }
}

/// Moves a sample to `to`, stamping `received_at` / `completed_at` on entry.
pub fn apply_sample_status(
    sample: &mut TestingSample,
    to: SampleStatus,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    check_sample_transition(sample.status, to)?;
    if sample.status == to {
        return Ok(());
    }

    match to {
        SampleStatus::Received => sample.received_at = Some(now),
        SampleStatus::Completed => sample.completed_at = Some(now),
        _ => {}
    }
    sample.status = to;
    sample.updated_at = now;
    Ok(())
}
