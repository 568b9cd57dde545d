//! Job snapshot model: overall status, timing and per-phase state.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::types::{JobId, Timestamp};

/// Status recorded for a job before the engine reports anything.
pub const DEFAULT_JOB_STATUS: &str = "Running";

/// Snapshot of one tracked job.
///
/// `phase_names` is fixed when the job is created; `phases` only ever
/// holds keys from that list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub start_time: Timestamp,
    /// `None` while the job is still being tracked.
    pub end_time: Option<Timestamp>,
    /// Elapsed duration, formatted by [`format_cost`].
    pub cost: String,
    pub status: String,
    pub phase_names: Vec<String>,
    pub phases: BTreeMap<String, PhaseStatus>,
}

/// Observed state of one phase (one workflow stage).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStatus {
    pub name: String,
    /// Execution unit scheduled for the phase; empty until one exists.
    #[serde(default)]
    pub pod_name: String,
    #[serde(default)]
    pub status: String,
}

impl PhaseStatus {
    /// A phase with no execution unit observed yet.
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl JobRecord {
    /// A freshly submitted job: started at `now`, default status.
    pub fn started(id: impl Into<JobId>, phase_names: Vec<String>, now: Timestamp) -> Self {
        let mut job = Self {
            id: id.into(),
            start_time: now,
            end_time: None,
            cost: String::new(),
            status: DEFAULT_JOB_STATUS.to_string(),
            phase_names,
            phases: BTreeMap::new(),
        };
        job.refresh_cost(now);
        job
    }

    /// Elapsed time between start and end, or between start and `now`
    /// while no (valid) end time is recorded.
    pub fn elapsed(&self, now: Timestamp) -> chrono::Duration {
        let end = match self.end_time {
            Some(end) if end >= self.start_time => end,
            _ => now,
        };
        (end - self.start_time).max(chrono::Duration::zero())
    }

    pub fn refresh_cost(&mut self, now: Timestamp) {
        self.cost = format_cost(self.elapsed(now));
    }

    /// Record the end of tracking at `now`.
    pub fn finish(&mut self, now: Timestamp) {
        self.end_time = Some(now);
        self.refresh_cost(now);
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// Replace the phase map, dropping any entry whose key is not one of
    /// the job's phase names.
    pub fn set_phases(&mut self, phases: BTreeMap<String, PhaseStatus>) {
        let names = &self.phase_names;
        self.phases = phases
            .into_iter()
            .filter(|(name, _)| names.contains(name))
            .collect();
    }

    /// Phases with a recorded state, in timeline order. Names with
    /// nothing recorded are left out.
    pub fn observed_phases(&self) -> Vec<PhaseStatus> {
        self.phase_names
            .iter()
            .filter_map(|name| self.phases.get(name).cloned())
            .collect()
    }
}

/// Format a duration the way the persisted `cost` field expects it:
/// `850ms`, `42.5s`, `3m0s`, `1h2m3.25s`.
pub fn format_cost(duration: chrono::Duration) -> String {
    let total_ms = duration.num_milliseconds().max(0);
    if total_ms == 0 {
        return "0s".to_string();
    }
    if total_ms < 1000 {
        return format!("{total_ms}ms");
    }

    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let seconds = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;

    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }
    if millis == 0 {
        let _ = write!(out, "{seconds}s");
    } else {
        let frac = format!("{millis:03}");
        let _ = write!(out, "{seconds}.{}s", frac.trim_end_matches('0'));
    }
    out
}
