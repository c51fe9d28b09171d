//! Language identification for learner text.

use crate::capability::LanguageDetector;
use crate::error::SpeechError;
use lingochat_core::LanguageTag;
use tracing::debug;
use whatlang::Lang;

/// Identifies languages locally with `whatlang` trigram models.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatlangDetector;

/// Two-letter code for a detected language, falling back to its three-letter
/// ISO 639-3 code.
fn primary_subtag(lang: Lang) -> &'static str {
    match lang {
        Lang::Eng => "en",
        Lang::Spa => "es",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Ita => "it",
        Lang::Por => "pt",
        Lang::Nld => "nl",
        Lang::Rus => "ru",
        Lang::Ukr => "uk",
        Lang::Pol => "pl",
        Lang::Tur => "tr",
        Lang::Swe => "sv",
        Lang::Dan => "da",
        Lang::Fin => "fi",
        Lang::Ell => "el",
        Lang::Heb => "he",
        Lang::Ara => "ar",
        Lang::Hin => "hi",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        Lang::Cmn => "zh",
        Lang::Vie => "vi",
        Lang::Tha => "th",
        Lang::Ind => "id",
        other => other.code(),
    }
}

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Result<LanguageTag, SpeechError> {
        let info = whatlang::detect(text.trim()).ok_or(SpeechError::UndetectedLanguage)?;
        debug!(
            lang = info.lang().code(),
            confidence = info.confidence(),
            reliable = info.is_reliable(),
            "detected language"
        );
        LanguageTag::new(primary_subtag(info.lang())).map_err(|_| SpeechError::UndetectedLanguage)
    }
}
