use thiserror::Error;

use crate::model::{InterviewConfigError, SessionRecordError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] InterviewConfigError),
    #[error(transparent)]
    Record(#[from] SessionRecordError),
}
