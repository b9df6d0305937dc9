//! Potency extraction and word counting.
//!
//! Generated messages end with a self-assessed strength in the form
//! `Potency = D.DD`. The grammar is strict:
//!
//! ```text
//! potency  = "Potency = " DIGIT "." DIGIT DIGIT
//! ```
//!
//! The last occurrence of the marker wins, the three digits must not be
//! followed by a further digit, and the value must lie in `(0.10, 1.00]`.
//! Anything else is a [`PotencyError`]; there is no fallback value.

use clash_types::Potency;

/// The literal text that introduces the potency value.
pub const POTENCY_MARKER: &str = "Potency = ";

/// Characters of the malformed tail echoed back in errors.
const ECHO_LEN: usize = 8;

/// Why a potency could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PotencyError {
    /// The text does not contain the marker.
    #[error("missing \"Potency = \" marker")]
    MissingMarker,

    /// The marker is not followed by `D.DD`.
    #[error("malformed potency value {found:?}")]
    Malformed {
        /// The text following the marker, truncated.
        found: String,
    },

    /// The value is well-formed but outside `(0.10, 1.00]`.
    #[error("potency {found} outside (0.10, 1.00]")]
    OutOfRange {
        /// The value as written.
        found: String,
    },
}

/// Parse the potency from a message under the strict grammar.
///
/// # Errors
///
/// See [`PotencyError`].
pub fn parse_potency(text: &str) -> Result<Potency, PotencyError> {
    let start = text.rfind(POTENCY_MARKER).ok_or(PotencyError::MissingMarker)?;
    let rest = text
        .get(start..)
        .and_then(|tail| tail.strip_prefix(POTENCY_MARKER))
        .ok_or(PotencyError::MissingMarker)?;

    let malformed = || PotencyError::Malformed {
        found: rest.chars().take(ECHO_LEN).collect(),
    };

    let (units, tenths, hundredths) = match rest.as_bytes() {
        [u, b'.', t, h, tail @ ..]
            if u.is_ascii_digit()
                && t.is_ascii_digit()
                && h.is_ascii_digit()
                && !tail.first().is_some_and(u8::is_ascii_digit) =>
        {
            (digit(*u), digit(*t), digit(*h))
        }
        _ => return Err(malformed()),
    };

    let value = units
        .saturating_mul(100)
        .saturating_add(tenths.saturating_mul(10))
        .saturating_add(hundredths);
    Potency::from_hundredths(value).ok_or_else(|| PotencyError::OutOfRange {
        found: rest.chars().take(4).collect(),
    })
}

/// Read a potency from human text if it happens to carry a valid marker.
///
/// Human submissions bypass the constraint pipeline, so a missing or
/// malformed marker is not an error: the message simply has no potency.
pub fn parse_potency_lenient(text: &str) -> Option<Potency> {
    parse_potency(text).ok()
}

/// Whitespace-delimited word count, empty tokens excluded.
pub fn word_count(text: &str) -> u32 {
    u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX)
}

fn digit(byte: u8) -> u32 {
    u32::from(byte.wrapping_sub(b'0'))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_trailing_marker() {
        let p = parse_potency("We must act now. Potency = 0.73");
        assert_eq!(p.map(|p| p.to_string()), Ok(String::from("0.73")));
    }

    #[test]
    fn full_strength_parses() {
        let p = parse_potency("... Potency = 1.00");
        assert_eq!(p, Ok(Potency::from_hundredths(100).unwrap()));
    }

    #[test]
    fn trailing_punctuation_is_allowed() {
        assert!(parse_potency("Argument. Potency = 0.42.").is_ok());
        assert!(parse_potency("Argument.\nPotency = 0.42\n").is_ok());
    }

    #[test]
    fn last_marker_wins() {
        let p = parse_potency("Potency = 0.20 is quoted here. Potency = 0.85");
        assert_eq!(p.map(|p| p.to_string()), Ok(String::from("0.85")));
    }

    #[test]
    fn missing_marker_is_an_error() {
        assert_eq!(
            parse_potency("An argument without a score."),
            Err(PotencyError::MissingMarker)
        );
        assert_eq!(parse_potency("potency = 0.50"), Err(PotencyError::MissingMarker));
    }

    #[test]
    fn malformed_values_are_rejected() {
        for text in [
            "Potency = .73",
            "Potency = 0.7",
            "Potency = 0,73",
            "Potency = 0.735",
            "Potency = abc",
            "Potency = ",
        ] {
            assert!(
                matches!(parse_potency(text), Err(PotencyError::Malformed { .. })),
                "{text} should be malformed"
            );
        }
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for text in ["Potency = 0.10", "Potency = 0.05", "Potency = 1.01", "Potency = 9.99"] {
            assert!(
                matches!(parse_potency(text), Err(PotencyError::OutOfRange { .. })),
                "{text} should be out of range"
            );
        }
    }

    #[test]
    fn lenient_parse_returns_none() {
        assert!(parse_potency_lenient("I typed this myself").is_none());
        assert!(parse_potency_lenient("Mine. Potency = 0.55").is_some());
    }

    #[test]
    fn word_count_ignores_extra_whitespace() {
        assert_eq!(word_count("  one   two\tthree\n four "), 4);
        assert_eq!(word_count(""), 0);
    }
}
