//! Team topics.
//!
//! A topic is either one of the configured presets or free text typed by
//! the operator. Custom topics are capped in length so they fit the
//! prompt's rules block.

use core::fmt;

/// Placeholder used when a custom topic is left empty.
pub const NO_TOPIC: &str = "There is no topic entered";

/// Errors raised when resolving a topic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    /// A custom topic exceeded the word cap.
    #[error("custom topic has {words} words, at most {limit} allowed")]
    TooLong {
        /// Words in the rejected topic.
        words: usize,
        /// The configured cap.
        limit: usize,
    },
}

/// The position a team argues for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    /// Taken verbatim from the configured preset list.
    Preset(String),
    /// Typed by the operator.
    Custom(String),
}

impl Topic {
    /// Resolve configured text into a topic.
    ///
    /// Text that matches a preset (ignoring surrounding whitespace) is a
    /// preset. Anything else is custom: trimmed, limited to `word_limit`
    /// words, and replaced by [`NO_TOPIC`] when empty.
    ///
    /// # Errors
    ///
    /// Returns [`TopicError::TooLong`] when a custom topic has more than
    /// `word_limit` words.
    pub fn resolve(text: &str, presets: &[String], word_limit: usize) -> Result<Self, TopicError> {
        let trimmed = text.trim();
        if let Some(preset) = presets.iter().find(|p| p.trim() == trimmed) {
            return Ok(Self::Preset(preset.trim().to_owned()));
        }
        if trimmed.is_empty() {
            return Ok(Self::Custom(NO_TOPIC.to_owned()));
        }
        let words = trimmed.split_whitespace().count();
        if words > word_limit {
            return Err(TopicError::TooLong {
                words,
                limit: word_limit,
            });
        }
        Ok(Self::Custom(trimmed.to_owned()))
    }

    /// The topic text.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Preset(text) | Self::Custom(text) => text,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presets() -> Vec<String> {
        vec![String::from("Cats are better than dogs")]
    }

    #[test]
    fn preset_match_ignores_whitespace() {
        let topic = Topic::resolve("  Cats are better than dogs ", &presets(), 12);
        assert_eq!(
            topic,
            Ok(Topic::Preset(String::from("Cats are better than dogs")))
        );
    }

    #[test]
    fn empty_custom_topic_uses_placeholder() {
        let topic = Topic::resolve("   ", &presets(), 12);
        assert_eq!(topic.map(|t| t.to_string()), Ok(String::from(NO_TOPIC)));
    }

    #[test]
    fn custom_topic_word_cap() {
        let twelve = "one two three four five six seven eight nine ten eleven twelve";
        assert!(Topic::resolve(twelve, &presets(), 12).is_ok());

        let thirteen = format!("{twelve} thirteen");
        assert_eq!(
            Topic::resolve(&thirteen, &presets(), 12),
            Err(TopicError::TooLong {
                words: 13,
                limit: 12
            })
        );
    }
}
