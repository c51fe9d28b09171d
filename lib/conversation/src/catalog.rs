//! Topic catalog.
//!
//! Immutable table of supported languages, their conversation preambles and
//! speaker labels, and the seed question for every topic. Built once at
//! startup and shared behind an `Arc`.

use crate::error::CatalogError;
use lingochat_core::{LanguageTag, TopicTag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Per-language catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageProfile {
    /// Framing text placed before the transcript.
    pub preamble: String,
    /// Label used for the model's turns.
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
    /// Label used for the learner's turns.
    #[serde(default = "default_user_name")]
    pub user_name: String,
    /// Seed question per topic.
    pub topics: BTreeMap<TopicTag, String>,
}

fn default_assistant_name() -> String {
    "Alicia".to_string()
}

fn default_user_name() -> String {
    "Student".to_string()
}

/// Serialized form of a catalog, as read from a configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDefinition {
    /// Entries keyed by language tag.
    pub languages: BTreeMap<LanguageTag, LanguageProfile>,
}

/// The validated, immutable topic catalog.
#[derive(Debug, Clone)]
pub struct TopicCatalog {
    languages: BTreeMap<LanguageTag, LanguageProfile>,
}

impl TopicCatalog {
    /// Builds a catalog from a definition.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Invalid`] if the definition has no languages,
    /// or a language has an empty preamble, an empty speaker label, identical
    /// speaker labels, no topics, or an empty seed.
    pub fn from_definition(definition: CatalogDefinition) -> Result<Self, CatalogError> {
        if definition.languages.is_empty() {
            return Err(CatalogError::Invalid {
                reason: "no languages defined".to_string(),
            });
        }

        for (language, profile) in &definition.languages {
            let invalid = |reason: &str| CatalogError::Invalid {
                reason: format!("{language}: {reason}"),
            };
            if profile.preamble.trim().is_empty() {
                return Err(invalid("empty preamble"));
            }
            if profile.assistant_name.trim().is_empty() || profile.user_name.trim().is_empty() {
                return Err(invalid("empty speaker label"));
            }
            if profile.assistant_name.trim() == profile.user_name.trim() {
                return Err(invalid("speaker labels must differ"));
            }
            if profile.topics.is_empty() {
                return Err(invalid("no topics"));
            }
            if let Some((topic, _)) = profile.topics.iter().find(|(_, s)| s.trim().is_empty()) {
                return Err(invalid(&format!("empty seed for topic '{topic}'")));
            }
        }

        Ok(Self {
            languages: definition.languages,
        })
    }

    /// Loads a catalog from a TOML, JSON or YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::LoadFailed`] if the file cannot be read or
    /// parsed, or a validation error from [`TopicCatalog::from_definition`].
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let load_failed = |e: config::ConfigError| CatalogError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        };
        let definition: CatalogDefinition = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .map_err(load_failed)?
            .try_deserialize()
            .map_err(load_failed)?;

        let catalog = Self::from_definition(definition)?;
        tracing::info!(
            path = %path.display(),
            languages = catalog.languages.len(),
            "loaded topic catalog"
        );
        Ok(catalog)
    }

    /// The built-in catalog: English, Spanish and French, five topics each.
    #[must_use]
    pub fn builtin() -> Self {
        let entry = |preamble: &str, user_name: &str, seeds: [&str; 5]| {
            let topics = ["family", "food", "animals", "travel", "hobbies"]
                .into_iter()
                .zip(seeds)
                .filter_map(|(topic, seed)| Some((TopicTag::new(topic).ok()?, seed.to_string())))
                .collect();
            LanguageProfile {
                preamble: preamble.to_string(),
                assistant_name: default_assistant_name(),
                user_name: user_name.to_string(),
                topics,
            }
        };

        let languages = [
            (
                "en-US",
                entry(
                    "The following is a casual conversation between 2 people that speak English.",
                    "Student",
                    [
                        "How many people are in your family?",
                        "What is your favorite food?",
                        "Do you have any pets?",
                        "Where do you want to travel?",
                        "What are your hobbies?",
                    ],
                ),
            ),
            (
                "es-ES",
                entry(
                    "La siguiente es una conversación casual entre 2 personas que hablan español.",
                    "Estudiante",
                    [
                        "¿Cuántas personas hay en tu familia?",
                        "¿Cuál es tu comida favorita?",
                        "¿Tienes algún animal?",
                        "¿A dónde quieres viajar?",
                        "¿Cuáles son tus pasatiempos?",
                    ],
                ),
            ),
            (
                "fr-FR",
                entry(
                    "La suivante est une conversation entre 2 personnes qui parlent français.",
                    "Étudiant",
                    [
                        "Combien de personnes sont dans votre famille?",
                        "Quel est votre plat préféré?",
                        "Avez-vous des animaux?",
                        "Où voulez-vous voyager?",
                        "Quels sont vos loisirs?",
                    ],
                ),
            ),
        ]
        .into_iter()
        .filter_map(|(tag, profile)| Some((LanguageTag::new(tag).ok()?, profile)))
        .collect();

        Self { languages }
    }

    /// Returns the full entry for a language.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnsupportedLanguage`] if the language is unknown.
    pub fn profile(&self, language: &LanguageTag) -> Result<&LanguageProfile, CatalogError> {
        self.languages
            .get(language)
            .ok_or_else(|| CatalogError::UnsupportedLanguage {
                language: language.clone(),
            })
    }

    /// Returns the seed question for a topic.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnsupportedLanguage`] or
    /// [`CatalogError::UnsupportedTopic`] when the pair is not in the catalog.
    pub fn lookup(&self, language: &LanguageTag, topic: &TopicTag) -> Result<&str, CatalogError> {
        self.profile(language)?
            .topics
            .get(topic)
            .map(String::as_str)
            .ok_or_else(|| CatalogError::UnsupportedTopic {
                language: language.clone(),
                topic: topic.clone(),
            })
    }

    /// Returns the conversation preamble for a language.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnsupportedLanguage`] if the language is unknown.
    pub fn preamble(&self, language: &LanguageTag) -> Result<&str, CatalogError> {
        Ok(&self.profile(language)?.preamble)
    }

    /// Returns the `(assistant, user)` speaker labels for a language.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnsupportedLanguage`] if the language is unknown.
    pub fn speakers(&self, language: &LanguageTag) -> Result<(&str, &str), CatalogError> {
        let profile = self.profile(language)?;
        Ok((profile.assistant_name.trim(), profile.user_name.trim()))
    }

    /// Returns the supported languages in tag order.
    pub fn languages(&self) -> impl Iterator<Item = &LanguageTag> {
        self.languages.keys()
    }

    /// Returns the topics offered for a language in tag order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnsupportedLanguage`] if the language is unknown.
    pub fn topics(
        &self,
        language: &LanguageTag,
    ) -> Result<impl Iterator<Item = &TopicTag>, CatalogError> {
        Ok(self.profile(language)?.topics.keys())
    }
}

impl Default for TopicCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
