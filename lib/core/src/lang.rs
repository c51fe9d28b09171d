//! Language and topic tags.
//!
//! Tags are normalised on construction so lookups in the topic catalog are
//! insensitive to the casing a client happens to send: language tags use the
//! BCP 47 convention (`es-ES`), topic tags are lowercase (`family`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a tag is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTagError {
    /// The kind of tag that failed to parse.
    pub tag_type: &'static str,
    /// The rejected input.
    pub input: String,
}

impl fmt::Display for ParseTagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} '{}'", self.tag_type, self.input)
    }
}

impl std::error::Error for ParseTagError {}

/// A locale tag such as `en-US`.
///
/// Only well-formedness is checked here; whether the language is supported is
/// decided by the topic catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageTag(String);

impl LanguageTag {
    /// Parses and normalises a locale tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag is empty or contains characters other than
    /// ASCII letters, digits, `-` and `_`.
    pub fn new(tag: &str) -> Result<Self, ParseTagError> {
        let trimmed = tag.trim();
        let well_formed = !trimmed.is_empty()
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !well_formed {
            return Err(ParseTagError {
                tag_type: "language tag",
                input: tag.to_string(),
            });
        }

        let mut parts = trimmed.split(['-', '_']);
        let mut normalised = parts.next().unwrap_or_default().to_ascii_lowercase();
        for part in parts {
            normalised.push('-');
            if part.len() == 2 {
                normalised.push_str(&part.to_ascii_uppercase());
            } else {
                normalised.push_str(part);
            }
        }
        Ok(Self(normalised))
    }

    /// Returns the full tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the primary language subtag (`es` for `es-ES`).
    ///
    /// Translation services key on this rather than the full locale.
    #[must_use]
    pub fn primary(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LanguageTag {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LanguageTag {
    type Error = ParseTagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<LanguageTag> for String {
    fn from(tag: LanguageTag) -> Self {
        tag.0
    }
}

/// A conversation topic such as `family`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TopicTag(String);

impl TopicTag {
    /// Parses and normalises a topic tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag is empty after trimming.
    pub fn new(tag: &str) -> Result<Self, ParseTagError> {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            return Err(ParseTagError {
                tag_type: "topic tag",
                input: tag.to_string(),
            });
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    /// Returns the tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TopicTag {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TopicTag {
    type Error = ParseTagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<TopicTag> for String {
    fn from(tag: TopicTag) -> Self {
        tag.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_tag_normalises_case_and_separator() {
        let tag = LanguageTag::new("es_es").expect("valid");
        assert_eq!(tag.as_str(), "es-ES");
        assert_eq!(tag.primary(), "es");
    }

    #[test]
    fn language_tag_without_region() {
        let tag: LanguageTag = "FR".parse().expect("valid");
        assert_eq!(tag.as_str(), "fr");
        assert_eq!(tag.primary(), "fr");
    }

    #[test]
    fn language_tag_rejects_garbage() {
        assert!(LanguageTag::new("").is_err());
        assert!(LanguageTag::new("en US").is_err());
    }

    #[test]
    fn topic_tag_is_lowercased() {
        let tag = TopicTag::new(" Family ").expect("valid");
        assert_eq!(tag.as_str(), "family");
        assert!(TopicTag::new("  ").is_err());
    }

    #[test]
    fn tags_deserialize_through_validation() {
        let tag: LanguageTag = serde_json::from_str("\"en-us\"").expect("deserialize");
        assert_eq!(tag.as_str(), "en-US");
        assert!(serde_json::from_str::<TopicTag>("\"\"").is_err());
    }
}
