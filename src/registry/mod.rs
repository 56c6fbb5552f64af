pub mod job_registry;
pub mod models;

pub use job_registry::{JobCounts, JobRegistry};
pub use models::{Job, JobStatus};
