//! Domain types shared by every flowtrack crate.
//!
//! Holds the job record model, the Argo workflow subset the tracker
//! observes, the phase model that turns a workflow into a linear
//! timeline, the registered application definitions jobs are started
//! from, and the validation rules applied before any store access.

pub mod application;
pub mod backoff;
pub mod error;
pub mod job;
pub mod phase;
pub mod types;
pub mod validation;
pub mod workflow;
