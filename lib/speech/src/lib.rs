//! Speech and translation capabilities for lingochat.
//!
//! - **Translation**: Google Cloud Translation
//! - **Synthesis**: Local speech command, or silence
//! - **Recognition**: OpenAI-compatible transcription endpoint
//! - **Detection**: Local language identification

pub mod capability;
pub mod detect;
pub mod error;
pub mod recognize;
pub mod synth;
pub mod translate;

pub use capability::{LanguageDetector, SpeechRecognizer, SpeechSynthesizer, Translator};
pub use detect::WhatlangDetector;
pub use error::SpeechError;
pub use recognize::{RecognitionConfig, TranscriptionRecognizer};
pub use synth::{CommandSynthesizer, SilentSynthesizer, SpeechConfig, create_synthesizer};
pub use translate::{GoogleTranslator, TranslationConfig};
