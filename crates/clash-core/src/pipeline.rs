//! The message pipeline: prompt, generate, check, retry, extract potency.
//!
//! ```text
//! render prompt
//!   -> generate draft            (transport failure aborts)
//!   -> count words               (outside bounds: discard, retry)
//!   -> validate against topic    (not aligned: discard, retry)
//!   -> parse potency             (failure is fatal, not retried)
//!   -> accepted Message
//! ```
//!
//! Drafts that fail a constraint are dropped inside [`MessagePipeline::generate`]
//! and never reach the caller. After `max_attempts` drafts the move fails
//! with [`DebateError::GenerationExhausted`].

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use clash_types::{Message, MessageId, MessageOrigin, Team};

use crate::error::DebateError;
use crate::potency::{parse_potency, word_count};
use crate::prompt::{MoveContext, PromptEngine};
use crate::services::{Backend, GenerationRequest, GenerationService, ValidationService};

/// Constraint and retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Minimum words (inclusive).
    pub word_min: u32,
    /// Maximum words (inclusive).
    pub word_max: u32,
    /// Drafts per move before giving up. At least one draft is always made.
    pub max_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            word_min: 30,
            word_max: 40,
            max_attempts: 8,
        }
    }
}

/// One move to generate.
#[derive(Debug, Clone, Copy)]
pub struct MoveRequest<'a> {
    /// The acting team.
    pub team: Team,
    /// Its model identifier.
    pub model: &'a str,
    /// Red's topic.
    pub red_topic: &'a str,
    /// Blue's topic.
    pub blue_topic: &'a str,
    /// The opponent's last accepted message, absent for the opening move.
    pub previous: Option<&'a Message>,
}

impl MoveRequest<'_> {
    fn own_topic(&self) -> &str {
        match self.team {
            Team::Red => self.red_topic,
            Team::Blue => self.blue_topic,
        }
    }
}

/// Why a draft was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    TooShort,
    TooLong,
    OffTopic,
}

/// Drives generation until a draft satisfies every constraint.
pub struct MessagePipeline<B: Backend> {
    generator: Arc<B::Generator>,
    validator: Arc<B::Validator>,
    prompts: Arc<PromptEngine>,
    config: PipelineConfig,
}

impl<B: Backend> MessagePipeline<B> {
    /// Create a pipeline over the given services.
    pub const fn new(
        generator: Arc<B::Generator>,
        validator: Arc<B::Validator>,
        prompts: Arc<PromptEngine>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            generator,
            validator,
            prompts,
            config,
        }
    }

    /// The active constraint settings.
    pub const fn config(&self) -> PipelineConfig {
        self.config
    }

    /// Generate one accepted message for `request.team`.
    ///
    /// # Errors
    ///
    /// - [`DebateError::Transport`] when a service call fails (no retry)
    /// - [`DebateError::Potency`] when the accepted draft has no valid potency
    /// - [`DebateError::GenerationExhausted`] when no draft passed
    /// - [`DebateError::Prompt`] when the prompt cannot be rendered
    pub async fn generate(&self, request: &MoveRequest<'_>) -> Result<Message, DebateError> {
        let prompt = self.prompts.render_move(&MoveContext {
            team: request.team,
            red_topic: request.red_topic,
            blue_topic: request.blue_topic,
            previous: request.previous.map(|m| m.text.as_str()),
            word_min: self.config.word_min,
            word_max: self.config.word_max,
        })?;

        let attempts = self.config.max_attempts.max(1);
        for attempt in 1..=attempts {
            let text = self
                .generator
                .generate(GenerationRequest {
                    team: request.team,
                    model: request.model,
                    prompt: &prompt,
                })
                .await
                .inspect_err(|e| {
                    warn!(team = %request.team, attempt, error = %e, "generation call failed");
                })?;

            let words = word_count(&text);
            if let Some(rejection) = self.check(&text, words, request).await? {
                debug!(
                    team = %request.team,
                    attempt,
                    word_count = words,
                    reason = ?rejection,
                    "draft rejected"
                );
                continue;
            }

            let potency = parse_potency(&text).inspect_err(|e| {
                warn!(team = %request.team, attempt, error = %e, "accepted draft has no valid potency");
            })?;

            info!(
                team = %request.team,
                attempt,
                word_count = words,
                potency = %potency,
                "message accepted"
            );

            return Ok(Message {
                id: MessageId::new(),
                team: request.team,
                origin: MessageOrigin::Generated,
                text,
                word_count: words,
                potency: Some(potency),
                accepted_at: Utc::now(),
            });
        }

        warn!(team = %request.team, attempts, "generation exhausted");
        Err(DebateError::GenerationExhausted {
            team: request.team,
            attempts,
        })
    }

    /// Apply the word-count and topical constraints.
    ///
    /// The validation service is only asked once the length is acceptable.
    async fn check(
        &self,
        text: &str,
        words: u32,
        request: &MoveRequest<'_>,
    ) -> Result<Option<Rejection>, DebateError> {
        if words < self.config.word_min {
            return Ok(Some(Rejection::TooShort));
        }
        if words > self.config.word_max {
            return Ok(Some(Rejection::TooLong));
        }
        let aligned = self
            .validator
            .validate(text, request.own_topic())
            .await
            .inspect_err(|e| {
                warn!(team = %request.team, error = %e, "validation call failed");
            })?;
        Ok((!aligned).then_some(Rejection::OffTopic))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, ScriptedGenerator, TopicValidator, sentence};

    fn pipeline(generator: ScriptedGenerator, validator: TopicValidator) -> MessagePipeline<FakeBackend> {
        MessagePipeline::new(
            Arc::new(generator),
            Arc::new(validator),
            Arc::new(PromptEngine::builtin().unwrap()),
            PipelineConfig {
                max_attempts: 4,
                ..PipelineConfig::default()
            },
        )
    }

    fn request(previous: Option<&Message>) -> MoveRequest<'_> {
        MoveRequest {
            team: Team::Red,
            model: "gpt-4o-mini",
            red_topic: "Trains beat planes",
            blue_topic: "Planes beat trains",
            previous,
        }
    }

    #[tokio::test]
    async fn accepts_compliant_draft_first_time() {
        let generator = ScriptedGenerator::new([sentence(35, "0.62")]);
        let p = pipeline(generator.clone(), TopicValidator::always(true));

        let message = p.generate(&request(None)).await.unwrap();
        assert_eq!(message.word_count, 35);
        assert_eq!(message.potency.map(|p| p.to_string()), Some(String::from("0.62")));
        assert_eq!(message.origin, MessageOrigin::Generated);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn short_draft_is_discarded_and_regenerated() {
        let generator = ScriptedGenerator::new([sentence(25, "0.51"), sentence(33, "0.47")]);
        let validator = TopicValidator::always(true);
        let p = pipeline(generator.clone(), validator.clone());

        let message = p.generate(&request(None)).await.unwrap();
        assert_eq!(message.word_count, 33);
        assert_eq!(generator.calls(), 2);
        assert_eq!(validator.calls(), 1);
    }

    #[tokio::test]
    async fn long_and_off_topic_drafts_are_retried() {
        let generator = ScriptedGenerator::new([
            sentence(41, "0.51"),
            sentence(36, "0.52"),
            sentence(30, "0.53"),
        ]);
        let validator = TopicValidator::sequence([false, true]);
        let p = pipeline(generator.clone(), validator.clone());

        let message = p.generate(&request(None)).await.unwrap();
        assert_eq!(message.word_count, 30);
        assert_eq!(generator.calls(), 3);
        assert_eq!(validator.calls(), 2);
    }

    #[tokio::test]
    async fn boundary_word_counts_accepted() {
        for words in [30, 40] {
            let generator = ScriptedGenerator::new([sentence(words, "0.71")]);
            let p = pipeline(generator, TopicValidator::always(true));
            assert_eq!(p.generate(&request(None)).await.unwrap().word_count, words);
        }
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let generator = ScriptedGenerator::repeat(sentence(12, "0.40"));
        let p = pipeline(generator.clone(), TopicValidator::always(true));

        let err = p.generate(&request(None)).await.unwrap_err();
        assert!(matches!(
            err,
            DebateError::GenerationExhausted {
                team: Team::Red,
                attempts: 4
            }
        ));
        assert_eq!(generator.calls(), 4);
    }

    #[tokio::test]
    async fn missing_potency_is_fatal_not_retried() {
        let mut text = sentence(34, "0.50");
        text = text.replace("Potency = 0.50", "strength unknown here");
        let generator = ScriptedGenerator::new([text, sentence(34, "0.50")]);
        let p = pipeline(generator.clone(), TopicValidator::always(true));

        let err = p.generate(&request(None)).await.unwrap_err();
        assert!(matches!(err, DebateError::Potency(_)));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn transport_failure_aborts_immediately() {
        let generator = ScriptedGenerator::failing();
        let p = pipeline(generator.clone(), TopicValidator::always(true));

        let err = p.generate(&request(None)).await.unwrap_err();
        assert!(matches!(err, DebateError::Transport(_)));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn reply_prompt_quotes_opponent() {
        let previous = Message {
            id: MessageId::new(),
            team: Team::Blue,
            origin: MessageOrigin::Human,
            text: String::from("Flying is faster and everyone knows it"),
            word_count: 7,
            potency: None,
            accepted_at: Utc::now(),
        };
        let generator = ScriptedGenerator::new([sentence(31, "0.33")]);
        let p = pipeline(generator.clone(), TopicValidator::always(true));

        p.generate(&request(Some(&previous))).await.unwrap();
        let prompt = generator.last_prompt().unwrap();
        assert!(prompt.user.contains("Flying is faster and everyone knows it"));
    }

    #[tokio::test]
    async fn validator_receives_own_topic() {
        let generator = ScriptedGenerator::new([sentence(31, "0.33")]);
        let validator = TopicValidator::always(true);
        let p = pipeline(generator, validator.clone());

        p.generate(&request(None)).await.unwrap();
        assert_eq!(validator.last_topic().as_deref(), Some("Trains beat planes"));
    }
}
