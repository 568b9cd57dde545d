/// Jobs are identified by the workflow name the engine assigns at submission.
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
