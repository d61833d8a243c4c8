use std::fmt;

use serde::Serialize;

use crate::errors::DirectoryError;

/// An answer reduced to uppercase letters and digits. Only obtainable through
/// [`CanonicalAnswer::parse`], so an empty answer can never reach the store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CanonicalAnswer(String);

impl CanonicalAnswer {
    pub fn parse(raw: &str) -> Result<Self, DirectoryError> {
        let canonical = canonicalize(raw);
        if canonical.is_empty() {
            return Err(DirectoryError::ValidationFailed { raw: raw.to_owned() });
        }
        Ok(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn canonicalize(raw: &str) -> String {
    raw.to_uppercase().chars().filter(char::is_ascii_alphanumeric).collect()
}

#[cfg(test)]
mod tests {
    use super::{canonicalize, CanonicalAnswer};
    use crate::errors::DirectoryError;

    #[test]
    fn strips_punctuation_and_spacing() {
        assert_eq!(canonicalize("g o!"), "GO");
        assert_eq!(canonicalize("  Hello, World 2 "), "HELLOWORLD2");
    }

    #[test]
    fn drops_non_ascii_letters() {
        assert_eq!(canonicalize("café"), "CAF");
    }

    #[test]
    fn rejects_answers_without_alphanumerics() {
        let error = CanonicalAnswer::parse("!!!").expect_err("empty answer must fail");
        assert!(matches!(error, DirectoryError::ValidationFailed { ref raw } if raw == "!!!"));
    }

    #[test]
    fn parse_keeps_canonical_form() {
        let answer = CanonicalAnswer::parse("lolli-pop").expect("valid answer");
        assert_eq!(answer.as_str(), "LOLLIPOP");
        assert_eq!(answer.to_string(), "LOLLIPOP");
    }
}
