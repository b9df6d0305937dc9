//! Topical validation by a judge model.

use std::sync::Arc;

use tracing::debug;

use clash_core::prompt::{PromptEngine, RenderedPrompt};
use clash_core::services::{ServiceError, ValidationService};

use crate::llm::{LlmRouter, VALIDATION_SAMPLING};

const JUDGE_SYSTEM: &str = "You judge whether debate messages argue for a given topic.";

/// Asks a designated model whether a draft argues for its topic.
#[derive(Debug, Clone)]
pub struct LlmValidator {
    router: LlmRouter,
    model: String,
    prompts: Arc<PromptEngine>,
}

impl LlmValidator {
    /// Judge with `model`, routed through `router`.
    pub const fn new(router: LlmRouter, model: String, prompts: Arc<PromptEngine>) -> Self {
        Self {
            router,
            model,
            prompts,
        }
    }
}

impl ValidationService for LlmValidator {
    async fn validate(&self, text: &str, topic: &str) -> Result<bool, ServiceError> {
        let user = self
            .prompts
            .render_validation(text, topic)
            .map_err(|e| ServiceError::Protocol(e.to_string()))?;
        let prompt = RenderedPrompt {
            system: JUDGE_SYSTEM.to_owned(),
            user,
        };

        let reply = self
            .router
            .complete(&self.model, &prompt, VALIDATION_SAMPLING)
            .await?;
        let aligned = is_affirmative(&reply);
        debug!(model = %self.model, reply = reply.trim(), aligned, "validation verdict");
        Ok(aligned)
    }
}

/// Only an exact `true`, ignoring case and surrounding whitespace, counts.
fn is_affirmative(reply: &str) -> bool {
    reply.trim().to_lowercase() == "true"
}
