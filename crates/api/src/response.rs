//! Shared response envelope and payload types for API handlers.
//!
//! All successful responses use a `{ "data": ... }` envelope.

use chrono::SecondsFormat;
use serde::Serialize;

use flowtrack_core::job::{JobRecord, PhaseStatus};
use flowtrack_core::types::{JobId, Timestamp};

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: JobId,
}

/// One row of a job listing.
#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub id: JobId,
    pub start: String,
    /// `null` while the job is still tracked.
    pub end: Option<String>,
    pub status: String,
}

impl From<JobRecord> for JobSummary {
    fn from(job: JobRecord) -> Self {
        Self {
            start: rfc3339(job.start_time),
            end: job.end_time.map(rfc3339),
            id: job.id,
            status: job.status,
        }
    }
}

/// A single job with its recorded phases in workflow order.
#[derive(Debug, Serialize)]
pub struct JobDetail {
    pub id: JobId,
    pub cost: String,
    pub status: String,
    pub phase_list: Vec<PhaseStatus>,
}

impl From<JobRecord> for JobDetail {
    fn from(job: JobRecord) -> Self {
        let phase_list = job.observed_phases();
        Self {
            id: job.id,
            cost: job.cost,
            status: job.status,
            phase_list,
        }
    }
}

fn rfc3339(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
