//! Speech synthesis.
//!
//! [`CommandSynthesizer`] shells out to a local speech command (macOS `say`
//! by default) with a per-language voice and a slowed speaking rate, which
//! suits learners. Utterances are played one at a time.

use crate::capability::SpeechSynthesizer;
use crate::error::SpeechError;
use async_trait::async_trait;
use lingochat_core::LanguageTag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Speech output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Whether replies are spoken at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Speech command to run.
    #[serde(default = "default_command")]
    pub command: String,
    /// Words per minute.
    #[serde(default = "default_rate")]
    pub rate: u32,
    /// Voice name per language.
    #[serde(default = "default_voices")]
    pub voices: BTreeMap<LanguageTag, String>,
}

fn default_enabled() -> bool {
    true
}

fn default_command() -> String {
    "say".to_string()
}

fn default_rate() -> u32 {
    150
}

fn default_voices() -> BTreeMap<LanguageTag, String> {
    [
        ("en-US", "com.apple.voice.compact.en-US.Samantha"),
        ("es-ES", "com.apple.eloquence.es-ES.Rocko"),
        ("fr-FR", "com.apple.voice.compact.fr-CA.Amelie"),
    ]
    .into_iter()
    .filter_map(|(tag, voice)| Some((LanguageTag::new(tag).ok()?, voice.to_string())))
    .collect()
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            command: default_command(),
            rate: default_rate(),
            voices: default_voices(),
        }
    }
}

/// Builds the synthesizer selected by `config`.
#[must_use]
pub fn create_synthesizer(config: &SpeechConfig) -> Arc<dyn SpeechSynthesizer> {
    if config.enabled {
        info!(
            command = %config.command,
            rate = config.rate,
            voices = config.voices.len(),
            "speech output enabled"
        );
        Arc::new(CommandSynthesizer::new(config))
    } else {
        info!("speech output disabled");
        Arc::new(SilentSynthesizer)
    }
}

/// Speaks through a local command such as `say -v <voice> -r <rate> -- <text>`.
#[derive(Debug)]
pub struct CommandSynthesizer {
    command: String,
    rate: u32,
    voices: BTreeMap<LanguageTag, String>,
    playback: Mutex<()>,
}

impl CommandSynthesizer {
    /// Creates a synthesizer from configuration.
    #[must_use]
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            command: config.command.clone(),
            rate: config.rate,
            voices: config.voices.clone(),
            playback: Mutex::new(()),
        }
    }

    /// Returns the voice configured for a language.
    ///
    /// # Errors
    ///
    /// Returns [`SpeechError::UnsupportedVoice`] if none is configured.
    pub fn voice(&self, language: &LanguageTag) -> Result<&str, SpeechError> {
        self.voices
            .get(language)
            .map(String::as_str)
            .ok_or_else(|| SpeechError::UnsupportedVoice {
                language: language.clone(),
            })
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn speak(&self, text: &str, language: &LanguageTag) -> Result<(), SpeechError> {
        let voice = self.voice(language)?;
        if text.trim().is_empty() {
            return Ok(());
        }

        let _playing = self.playback.lock().await;
        let status = Command::new(&self.command)
            .arg("-v")
            .arg(voice)
            .arg("-r")
            .arg(self.rate.to_string())
            .arg("--")
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| SpeechError::service(format!("{}: {e}", self.command)))?;

        if !status.success() {
            return Err(SpeechError::service(format!(
                "{} exited with {status}",
                self.command
            )));
        }
        debug!(%language, voice, "spoke text");
        Ok(())
    }
}

/// Discards speech output.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSynthesizer;

#[async_trait]
impl SpeechSynthesizer for SilentSynthesizer {
    async fn speak(&self, _text: &str, _language: &LanguageTag) -> Result<(), SpeechError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lang(tag: &str) -> LanguageTag {
        tag.parse().expect("tag")
    }

    fn synthesizer(command: &str) -> CommandSynthesizer {
        CommandSynthesizer::new(&SpeechConfig {
            command: command.to_string(),
            ..SpeechConfig::default()
        })
    }

    #[test]
    fn default_voices_cover_builtin_languages() {
        let synth = synthesizer("say");
        assert_eq!(
            synth.voice(&lang("en-US")).expect("voice"),
            "com.apple.voice.compact.en-US.Samantha"
        );
        assert!(synth.voice(&lang("es_es")).is_ok());
        assert!(synth.voice(&lang("fr-FR")).is_ok());
        assert_eq!(SpeechConfig::default().rate, 150);
    }

    #[tokio::test]
    async fn unknown_language_has_no_voice() {
        let err = synthesizer("true")
            .speak("Hallo", &lang("de-DE"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SpeechError::UnsupportedVoice {
                language: lang("de-DE")
            }
        );
    }

    #[tokio::test]
    async fn successful_command_speaks() {
        synthesizer("true")
            .speak("Hola", &lang("es-ES"))
            .await
            .expect("spoken");
    }

    #[tokio::test]
    async fn failing_command_is_service_error() {
        let err = synthesizer("false")
            .speak("Hola", &lang("es-ES"))
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::ServiceUnavailable { .. }));

        let err = synthesizer("/nonexistent/speech-command")
            .speak("Hola", &lang("es-ES"))
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::ServiceUnavailable { .. }));
    }

    #[tokio::test]
    async fn silent_synthesizer_accepts_anything() {
        SilentSynthesizer
            .speak("Hallo", &lang("de-DE"))
            .await
            .expect("silent");
        let synth = create_synthesizer(&SpeechConfig {
            enabled: false,
            ..SpeechConfig::default()
        });
        synth.speak("Hallo", &lang("de-DE")).await.expect("silent");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn text_is_passed_after_option_terminator() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("fake-say");
        let argv = dir.path().join("argv");
        std::fs::write(
            &script,
            format!("#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\n", argv.display()),
        )
        .expect("write script");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("chmod");

        synthesizer(&script.display().to_string())
            .speak("-o /tmp/out.aiff", &lang("en-US"))
            .await
            .expect("spoken");

        let recorded = std::fs::read_to_string(&argv).expect("argv");
        let args: Vec<&str> = recorded.lines().collect();
        assert_eq!(
            args,
            [
                "-v",
                "com.apple.voice.compact.en-US.Samantha",
                "-r",
                "150",
                "--",
                "-o /tmp/out.aiff",
            ]
        );
    }
}
