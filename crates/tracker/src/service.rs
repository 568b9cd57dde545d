//! The job operations the HTTP layer exposes.

use std::collections::BTreeSet;
use std::sync::Arc;

use flowtrack_core::application::{validate_application_id, validate_definition, with_branch};
use flowtrack_core::error::CoreError;
use flowtrack_core::job::JobRecord;
use flowtrack_core::phase::{derive_phase_names, multi_step_stages, validate_workflow};
use flowtrack_core::types::JobId;
use flowtrack_core::validation::{validate_job_id, validate_unit_id};
use flowtrack_core::workflow::Workflow;
use flowtrack_engine::WorkflowEngine;
use flowtrack_store::{ApplicationStore, JobRecordStore, StoreError};

use crate::directory;
use crate::error::ServiceError;
use crate::tracker::JobTracker;

#[derive(Clone)]
pub struct JobService {
    engine: Arc<dyn WorkflowEngine>,
    records: JobRecordStore,
    applications: ApplicationStore,
    tracker: Arc<JobTracker>,
}

/// Report a missing record by what the caller asked for, not by its key.
fn not_found<'a>(entity: &'static str, id: &'a str) -> impl FnOnce(StoreError) -> ServiceError + 'a {
    move |e| match e {
        StoreError::NotFound { .. } => CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
        .into(),
        other => other.into(),
    }
}

impl JobService {
    /// Applications are kept on the same key-value store as job records.
    pub fn new(engine: Arc<dyn WorkflowEngine>, records: JobRecordStore, tracker: Arc<JobTracker>) -> Self {
        let applications = ApplicationStore::new(records.kv().clone());
        Self {
            engine,
            records,
            applications,
            tracker,
        }
    }

    pub fn tracker(&self) -> &Arc<JobTracker> {
        &self.tracker
    }

    /// Submit a workflow and start tracking it.
    ///
    /// The job's initial snapshot is stored before this returns; watching
    /// and log tailing continue in the background.
    pub async fn submit_job(&self, workflow: Workflow) -> Result<JobId, ServiceError> {
        validate_workflow(&workflow)?;
        for (stage, ignored) in multi_step_stages(&workflow) {
            tracing::warn!(
                stage,
                ignored = %ignored.join(","),
                "Only the first step of a parallel stage is tracked",
            );
        }
        let phase_names = derive_phase_names(&workflow);

        let job_id = self.engine.submit_workflow(&workflow).await?;
        self.tracker.launch(&job_id, phase_names).await?;

        tracing::info!(job_id = %job_id, "Job submitted");
        Ok(job_id)
    }

    /// One job's snapshot, phases included.
    pub async fn get_job(&self, job_id: &str) -> Result<JobRecord, ServiceError> {
        validate_job_id(job_id)?;
        let mut job = self
            .records
            .load_status(job_id)
            .await
            .map_err(not_found("Job", job_id))?;
        let phases = self.records.load_phases(job_id, &job.phase_names).await?;
        job.set_phases(phases.into_iter().map(|p| (p.name.clone(), p)).collect());
        Ok(job)
    }

    pub async fn list_jobs(&self, keyword: &str, limit: usize) -> Result<Vec<JobRecord>, ServiceError> {
        Ok(directory::list_jobs(&self.records, keyword, limit).await?)
    }

    /// Remove a job's status and phase records.
    ///
    /// With `cancel_on_delete` set, in-flight tracking is stopped first so
    /// no tracking write can land after the deletion.
    pub async fn delete_job(&self, job_id: &str) -> Result<(), ServiceError> {
        validate_job_id(job_id)?;

        if self.tracker.config().cancel_on_delete && self.tracker.cancel(job_id).await {
            tracing::info!(job_id, "Stopped tracking deleted job");
        }

        self.records.delete_status(job_id).await?;
        self.records.delete_phase(job_id).await?;
        tracing::info!(job_id, "Job deleted");
        Ok(())
    }

    /// Stored log lines of one execution unit, oldest first.
    pub async fn get_log(&self, unit_id: &str) -> Result<Vec<String>, ServiceError> {
        validate_unit_id(unit_id)?;
        Ok(self.records.read_log(unit_id).await?)
    }

    /// Register (or replace) an application definition.
    pub async fn save_application(&self, id: &str, workflow: Workflow) -> Result<(), ServiceError> {
        validate_definition(id, &workflow)?;
        self.applications.save(id, &workflow).await?;
        tracing::info!(application = id, "Application saved");
        Ok(())
    }

    pub async fn get_application(&self, id: &str) -> Result<Workflow, ServiceError> {
        validate_application_id(id)?;
        self.applications
            .load(id)
            .await
            .map_err(not_found("Application", id))
    }

    pub async fn list_applications(&self) -> Result<BTreeSet<String>, ServiceError> {
        Ok(self.applications.list_ids().await?)
    }

    /// Remove an application definition. Jobs started from it are kept.
    pub async fn delete_application(&self, id: &str) -> Result<(), ServiceError> {
        validate_application_id(id)?;
        if self.applications.delete(id).await? {
            tracing::info!(application = id, "Application deleted");
        }
        Ok(())
    }

    /// Submit a run of a registered application against `branch`.
    pub async fn submit_from_application(&self, id: &str, branch: &str) -> Result<JobId, ServiceError> {
        if branch.trim().is_empty() {
            return Err(CoreError::Validation("branch must not be empty".into()).into());
        }
        let definition = self.get_application(id).await?;
        let workflow = with_branch(&definition, branch)?;
        tracing::debug!(application = id, branch, "Starting job from application");
        self.submit_job(workflow).await
    }

    pub async fn store_healthy(&self) -> bool {
        self.records.kv().ping().await.is_ok()
    }
}
