//! Routes a math problem to the local evaluator or the completion API, and
//! chat messages straight to the completion API.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::completion::{CompletionClient, Conversation};
use crate::error::{AppError, Result};
use crate::evaluator;

pub const MATH_TUTOR_PROMPT: &str = "You are a math tutor. Solve math problems step by step.";
pub const STUDENT_TUTOR_PROMPT: &str = "You are an AI tutor for students. Help with homework, explain concepts, and provide educational support.";

pub const CHAT_UNAVAILABLE: &str = "AI chat is not available right now because no DeepSeek API key is configured on the server. Set DEEPSEEK_API_KEY to enable AI answers.";
pub const MATH_UNAVAILABLE: &str = "This problem needs the AI solver, which is not configured on the server. Set DEEPSEEK_API_KEY to get step-by-step solutions, or enter a pure arithmetic expression such as 2+2.";
const AI_PENDING: &str = "AI solution pending";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveKind {
    BasicCalculation,
    AiSolution,
    TextAnalysis,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolveResult {
    pub success: bool,
    pub problem: String,
    pub result: String,
    #[serde(rename = "type")]
    pub kind: SolveKind,
    pub steps: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl SolveResult {
    fn new(problem: &str, result: String, kind: SolveKind, steps: Vec<String>) -> Self {
        Self {
            success: true,
            problem: problem.to_string(),
            result,
            kind,
            steps,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    client: CompletionClient,
}

impl Dispatcher {
    pub fn new(client: CompletionClient) -> Self {
        Self { client }
    }

    /// Evaluates `problem` locally when it is plain arithmetic, otherwise
    /// asks the model. Upstream failures on the model path are returned as
    /// [`AppError::Upstream`].
    pub async fn solve(&self, problem: &str) -> Result<SolveResult> {
        let rejection = match evaluator::evaluate(problem) {
            Ok(evaluation) => {
                let result = evaluation.display();
                tracing::debug!(problem, result = %result, "solved locally");
                let steps = vec![
                    format!("Original problem: {problem}"),
                    format!("Cleaned expression: {}", evaluation.cleaned),
                    format!("Calculated: {} = {result}", evaluation.cleaned),
                ];
                return Ok(SolveResult::new(
                    problem,
                    result,
                    SolveKind::BasicCalculation,
                    steps,
                ));
            }
            Err(err) => err,
        };

        if !self.client.is_configured() {
            let steps = vec![
                format!("Original problem: {problem}"),
                format!("Not a pure arithmetic expression: {rejection}"),
                "AI solver unavailable: no API key configured".to_string(),
            ];
            return Ok(SolveResult::new(
                problem,
                MATH_UNAVAILABLE.to_string(),
                SolveKind::TextAnalysis,
                steps,
            ));
        }

        tracing::debug!(problem, reason = %rejection, "falling back to AI solver");
        let conversation = Conversation::with_system(
            MATH_TUTOR_PROMPT,
            format!("Solve this math problem: {problem}. Show step-by-step solution."),
        );
        let answer = self
            .client
            .complete(&conversation)
            .await
            .map_err(|source| AppError::Upstream {
                context: "Failed to solve problem",
                source,
            })?;

        let result = if answer.trim().is_empty() {
            AI_PENDING.to_string()
        } else {
            answer
        };
        let steps = vec![
            format!("Original problem: {problem}"),
            format!("Not a pure arithmetic expression: {rejection}"),
            "Solved by AI math tutor".to_string(),
        ];
        Ok(SolveResult::new(problem, result, SolveKind::AiSolution, steps))
    }

    /// Answers a free-form student message. Never fails: upstream errors
    /// become the apology text.
    pub async fn chat(&self, message: &str) -> String {
        if !self.client.is_configured() {
            return CHAT_UNAVAILABLE.to_string();
        }

        let conversation = Conversation::with_system(STUDENT_TUTOR_PROMPT, message);
        self.client.complete_or_apology(&conversation).await
    }
}
