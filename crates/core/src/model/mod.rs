mod config;
mod feedback;
mod ids;
mod session;

pub use config::{InterviewConfig, InterviewConfigDraft, InterviewConfigError};
pub use feedback::Feedback;
pub use ids::{ArtifactId, ParseIdError, SessionId};
pub use session::{MAX_INTEGRITY_STRIKES, SessionRecord, SessionRecordError, Turn};
