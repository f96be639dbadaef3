use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validated interview configuration captured at setup.
///
/// Immutable once a session enters the active phase; the record owns it and
/// exposes no mutators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewConfig {
    role: String,
    skill_level: String,
    job_description: String,
}

/// User-entered setup fields before validation.
#[derive(Clone, Debug, Default)]
pub struct InterviewConfigDraft {
    pub role: String,
    pub skill_level: String,
    pub job_description: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum InterviewConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

impl InterviewConfigDraft {
    #[must_use]
    pub fn new(
        role: impl Into<String>,
        skill_level: impl Into<String>,
        job_description: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            skill_level: skill_level.into(),
            job_description: job_description.into(),
        }
    }

    /// Validate and normalize the draft into an immutable configuration.
    ///
    /// Fields are trimmed; every field must be non-empty.
    ///
    /// # Errors
    ///
    /// Returns `InterviewConfigError::MissingField` naming the first empty field.
    pub fn validate(self) -> Result<InterviewConfig, InterviewConfigError> {
        let role = normalize(&self.role, "role")?;
        let skill_level = normalize(&self.skill_level, "skill_level")?;
        let job_description = normalize(&self.job_description, "job_description")?;

        Ok(InterviewConfig {
            role,
            skill_level,
            job_description,
        })
    }
}

impl InterviewConfig {
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    #[must_use]
    pub fn skill_level(&self) -> &str {
        &self.skill_level
    }

    #[must_use]
    pub fn job_description(&self) -> &str {
        &self.job_description
    }
}

fn normalize(value: &str, field: &'static str) -> Result<String, InterviewConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(InterviewConfigError::MissingField { field });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_trims_fields() {
        let config = InterviewConfigDraft::new("  Backend Engineer ", "Intermediate", "Rust APIs")
            .validate()
            .unwrap();

        assert_eq!(config.role(), "Backend Engineer");
        assert_eq!(config.skill_level(), "Intermediate");
        assert_eq!(config.job_description(), "Rust APIs");
    }

    #[test]
    fn empty_role_is_rejected() {
        let err = InterviewConfigDraft::new("   ", "Senior", "desc")
            .validate()
            .unwrap_err();
        assert_eq!(err, InterviewConfigError::MissingField { field: "role" });
    }

    #[test]
    fn empty_job_description_is_rejected() {
        let err = InterviewConfigDraft::new("Role", "Senior", "")
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            InterviewConfigError::MissingField {
                field: "job_description"
            }
        );
    }
}
