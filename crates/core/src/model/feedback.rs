use serde::{Deserialize, Serialize};

/// Structured feedback written exactly once at session completion.
///
/// Serialized with camelCase keys to match the generated-feedback payload
/// (`{"strengths": [...], "improvements": [...], "overallScore": 0}`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<u8>,
}

const INTEGRITY_NOTE: &str =
    "Session was terminated early after repeated focus loss. Complete a full session to receive detailed feedback.";

impl Feedback {
    #[must_use]
    pub fn new(
        strengths: Vec<String>,
        improvements: Vec<String>,
        overall_score: Option<u8>,
    ) -> Self {
        Self {
            strengths,
            improvements,
            overall_score,
        }
    }

    /// Synthesized payload for a session force-terminated by the integrity
    /// monitor: no strengths, one fixed improvement note, score zero.
    #[must_use]
    pub fn integrity_violation() -> Self {
        Self {
            strengths: Vec::new(),
            improvements: vec![INTEGRITY_NOTE.to_string()],
            overall_score: Some(0),
        }
    }
}
