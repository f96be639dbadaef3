/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewProgress {
    pub questions_asked: usize,
    pub answered: usize,
    pub recordings: usize,
    pub strikes: u8,
    pub is_complete: bool,
}
