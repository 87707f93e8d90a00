mod poll;
mod submit;
mod types;

pub use poll::{JobPoller, PollProgress};
pub use submit::{ImageJobRequest, JobRequest, JobSubmitter, VideoJobRequest};
pub use types::{
    GenerationJob, JobKind, JobState, JobStatus, ResultField, ResultItem, ResultPayload,
};
