//! Job snapshots and log lines laid out on a [`KvStore`].
//!
//! | Key                       | Kind | Content                                   |
//! |---------------------------|------|-------------------------------------------|
//! | `cicd:job-status:<id>`    | hash | `start_time`, `end_time`, `status`, `phase_names`, `cost` |
//! | `cicd:job-phase:<id>`     | hash | `<phase name>` → JSON `{name, pod_name, status}` |
//! | `cicd:logs:<unit id>`     | list | `"<RFC3339 timestamp> <text>"`            |
//!
//! Every write sets the key's time-to-live in the same backend call, so
//! no record is ever left behind without one.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use flowtrack_core::job::{JobRecord, PhaseStatus, DEFAULT_JOB_STATUS};
use flowtrack_core::types::Timestamp;

use crate::error::StoreError;
use crate::kv::KvStore;

pub const STATUS_PREFIX: &str = "cicd:job-status:";
pub const PHASE_PREFIX: &str = "cicd:job-phase:";
pub const LOG_PREFIX: &str = "cicd:logs:";

pub fn status_key(job_id: &str) -> String {
    format!("{STATUS_PREFIX}{job_id}")
}

pub fn phase_key(job_id: &str) -> String {
    format!("{PHASE_PREFIX}{job_id}")
}

pub fn log_key(unit_id: &str) -> String {
    format!("{LOG_PREFIX}{unit_id}")
}

fn format_time(t: Timestamp) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_time(raw: &str) -> Option<Timestamp> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Rebuild a [`JobRecord`] from the raw fields of a status hash.
///
/// A missing `status` falls back to [`DEFAULT_JOB_STATUS`]; a missing or
/// unparsable `end_time` leaves the job running, with its cost measured
/// against `now`. Phases are not part of the status hash and come back
/// empty.
pub fn decode_status(
    job_id: &str,
    fields: &HashMap<String, String>,
    now: Timestamp,
) -> Result<JobRecord, StoreError> {
    let raw_start = fields.get("start_time").ok_or_else(|| StoreError::Decode {
        key: status_key(job_id),
        reason: "missing start_time".into(),
    })?;
    let start_time = parse_time(raw_start).ok_or_else(|| StoreError::Decode {
        key: status_key(job_id),
        reason: format!("unparsable start_time '{raw_start}'"),
    })?;

    let status = fields
        .get("status")
        .filter(|s| !s.is_empty())
        .cloned()
        .unwrap_or_else(|| DEFAULT_JOB_STATUS.to_string());

    let phase_names = fields
        .get("phase_names")
        .map(|joined| {
            joined
                .split(',')
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut job = JobRecord {
        id: job_id.to_string(),
        start_time,
        end_time: fields.get("end_time").and_then(|raw| parse_time(raw)),
        cost: String::new(),
        status,
        phase_names,
        phases: BTreeMap::new(),
    };
    job.refresh_cost(now);
    Ok(job)
}

/// Persistence for job snapshots and per-unit log lines.
#[derive(Clone)]
pub struct JobRecordStore {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

impl JobRecordStore {
    pub fn new(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    pub fn kv(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Write the status snapshot of `job`, with its cost recomputed now.
    pub async fn save_status(&self, job: &JobRecord) -> Result<(), StoreError> {
        if job.id.is_empty() {
            return Err(StoreError::Validation("job id must not be empty".into()));
        }
        let key = status_key(&job.id);
        let fields = vec![
            ("start_time".to_string(), format_time(job.start_time)),
            (
                "end_time".to_string(),
                job.end_time.map(format_time).unwrap_or_default(),
            ),
            ("status".to_string(), job.status.clone()),
            ("phase_names".to_string(), job.phase_names.join(",")),
            (
                "cost".to_string(),
                flowtrack_core::job::format_cost(job.elapsed(Utc::now())),
            ),
        ];
        self.kv.hash_set(&key, &fields, Some(self.ttl)).await
    }

    /// Load the status snapshot of a job.
    ///
    /// Returns [`StoreError::NotFound`] when no status record exists.
    pub async fn load_status(&self, job_id: &str) -> Result<JobRecord, StoreError> {
        let key = status_key(job_id);
        let fields = self.kv.hash_get_all(&key).await?;
        if fields.is_empty() {
            return Err(StoreError::NotFound { key });
        }
        decode_status(job_id, &fields, Utc::now())
    }

    /// Write one JSON field per phase name.
    ///
    /// Names without an entry in `phases` are written as a pending phase
    /// carrying only the name. Entries outside `phase_names` are ignored.
    pub async fn save_phase(
        &self,
        job_id: &str,
        phase_names: &[String],
        phases: &BTreeMap<String, PhaseStatus>,
    ) -> Result<(), StoreError> {
        if phase_names.is_empty() {
            return Err(StoreError::Validation(format!(
                "job {job_id} has no phase names to key phases by"
            )));
        }

        let fields = phase_names
            .iter()
            .map(|name| {
                let encoded = match phases.get(name) {
                    Some(phase) => serde_json::to_string(phase)?,
                    None => serde_json::to_string(&PhaseStatus::pending(name.as_str()))?,
                };
                Ok((name.clone(), encoded))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let key = phase_key(job_id);
        self.kv.hash_set(&key, &fields, Some(self.ttl)).await
    }

    /// Phases in `phase_names` order. Missing and malformed entries are
    /// skipped.
    pub async fn load_phases(
        &self,
        job_id: &str,
        phase_names: &[String],
    ) -> Result<Vec<PhaseStatus>, StoreError> {
        if phase_names.is_empty() {
            return Ok(Vec::new());
        }
        let fields = self.kv.hash_get_all(&phase_key(job_id)).await?;

        Ok(phase_names
            .iter()
            .filter_map(|name| {
                let raw = fields.get(name)?;
                match serde_json::from_str::<PhaseStatus>(raw) {
                    Ok(phase) => Some(phase),
                    Err(e) => {
                        tracing::warn!(job_id, phase = %name, error = %e, "Skipping malformed phase entry");
                        None
                    }
                }
            })
            .collect())
    }

    pub async fn delete_status(&self, job_id: &str) -> Result<(), StoreError> {
        self.kv.delete(&status_key(job_id)).await.map(|_| ())
    }

    pub async fn delete_phase(&self, job_id: &str) -> Result<(), StoreError> {
        self.kv.delete(&phase_key(job_id)).await.map(|_| ())
    }

    /// Append one already-formatted line to a unit's log.
    pub async fn append_log(&self, unit_id: &str, line: &str) -> Result<(), StoreError> {
        let key = log_key(unit_id);
        self.kv.list_push(&key, line, Some(self.ttl)).await
    }

    /// The whole log of a unit, oldest first. Empty for unknown units.
    pub async fn read_log(&self, unit_id: &str) -> Result<Vec<String>, StoreError> {
        self.kv.list_range(&log_key(unit_id)).await
    }

    /// Job ids with a status record whose id matches `pattern` (a glob
    /// over the id only, `*` for all).
    pub async fn list_job_ids(&self, pattern: &str) -> Result<BTreeSet<String>, StoreError> {
        let keys = self.kv.scan_keys(&status_key(pattern)).await?;
        Ok(keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(STATUS_PREFIX).map(str::to_string))
            .filter(|id| !id.is_empty())
            .collect())
    }
}

/// Format a log line the way it is stored: receipt time, a space, the
/// text.
pub fn format_log_line(received_at: Timestamp, text: &str) -> String {
    format!(
        "{} {}",
        received_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        text
    )
}
