//! Prompt assembly for the generation gateway.
//!
//! Prompt construction lives with the controller; the gateway only ever sees
//! finished prompt strings.

use std::fmt::Write;

use interview_core::model::{Feedback, InterviewConfig, Turn};

/// Build the prompt for the next interview question.
///
/// Prior turns are numbered in transcript order so the model sees the full
/// conversation before asking the follow-up.
#[must_use]
pub fn question_prompt(config: &InterviewConfig, transcript: &[Turn]) -> String {
    let mut prompt = format!(
        "You are a professional interviewer running a mock interview for a {} position at {} level.\n\
         Job description:\n{}\n\n",
        config.role(),
        config.skill_level(),
        config.job_description()
    );

    if transcript.is_empty() {
        prompt.push_str("Ask the candidate the first interview question.");
    } else {
        prompt.push_str("Conversation so far:\n");
        for (index, turn) in transcript.iter().enumerate() {
            let answer = if turn.answer.trim().is_empty() {
                "(not answered yet)"
            } else {
                turn.answer.as_str()
            };
            let _ = writeln!(prompt, "Q{}: {}", index + 1, turn.question);
            let _ = writeln!(prompt, "A{}: {}", index + 1, answer);
        }
        prompt.push_str("\nAsk the next interview question, building on the answers above.");
    }

    prompt.push_str(" Reply with the question text only, no preamble.");
    prompt
}

/// Build the prompt that asks the model to score the finished interview.
#[must_use]
pub fn feedback_prompt(config: &InterviewConfig, transcript: &[Turn]) -> String {
    let mut prompt = format!(
        "You assessed a mock interview for a {} position at {} level.\n\
         Job description:\n{}\n\nTranscript:\n",
        config.role(),
        config.skill_level(),
        config.job_description()
    );

    for (index, turn) in transcript.iter().enumerate() {
        let _ = writeln!(prompt, "Q{}: {}", index + 1, turn.question);
        let _ = writeln!(prompt, "A{}: {}", index + 1, turn.answer);
    }

    prompt.push_str(
        "\nReply with JSON only, exactly this shape:\n\
         {\"strengths\": [\"...\"], \"improvements\": [\"...\"], \"overallScore\": 7}\n\
         overallScore is an integer from 0 to 10.",
    );
    prompt
}

/// Extract a feedback payload from generated text.
///
/// Tolerates code fences and prose around the JSON object; returns `None`
/// when no parseable object is present.
#[must_use]
pub fn parse_feedback(text: &str) -> Option<Feedback> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}
