//! Korean lyrics romanization
//!
//! An external command can be configured to do the work. Without one, a
//! built-in letter-by-letter Revised Romanization is used.

use std::io;
use std::process::{Command, Stdio};

use serde::Deserialize;

use crate::error::{Result, TagfixError};
use crate::features::lyrics::contains_hangul;
use crate::features::settings::RomanizerSettings;
use crate::features::tags::CanonicalTag;

pub trait Romanizer: Send + Sync {
    fn romanize(&self, text: &str) -> Result<String>;

    /// Fails with `CapabilityMissing` when the romanizer cannot run at all
    fn check(&self) -> Result<()> {
        Ok(())
    }
}

/// Runs a configured command with the lyrics as its last argument
#[derive(Debug, Clone)]
pub struct CommandRomanizer {
    program: String,
    args: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CommandReply {
    result: Option<String>,
    error: Option<String>,
}

impl CommandRomanizer {
    /// `None` for an empty command line
    pub fn new(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn spawn_error(&self, e: io::Error) -> TagfixError {
        match e.kind() {
            io::ErrorKind::NotFound => {
                TagfixError::CapabilityMissing(format!("romanizer '{}'", self.program))
            }
            _ => TagfixError::Io(e),
        }
    }
}

fn romanizer_error(reason: impl ToString) -> TagfixError {
    TagfixError::write(
        CanonicalTag::Lyrics,
        format!("romanizer failed: {}", reason.to_string()),
    )
}

impl Romanizer for CommandRomanizer {
    fn romanize(&self, text: &str) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .output()
            .map_err(|e| self.spawn_error(e))?;

        // The reply on stdout explains a failure better than the exit code
        let reply = serde_json::from_slice::<CommandReply>(&output.stdout);
        match reply {
            Ok(CommandReply {
                error: Some(error), ..
            }) => Err(romanizer_error(error)),
            _ if !output.status.success() => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let stderr = stderr.trim();
                if stderr.is_empty() {
                    Err(romanizer_error(format!("exited with {}", output.status)))
                } else {
                    Err(romanizer_error(stderr))
                }
            }
            Ok(CommandReply {
                result: Some(result),
                ..
            }) => Ok(result),
            Ok(_) => Err(romanizer_error("empty reply")),
            Err(e) => Err(romanizer_error(e)),
        }
    }

    fn check(&self) -> Result<()> {
        Command::new(&self.program)
            .args(&self.args)
            .arg("")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| {
                tracing::debug!("Romanizer {:?} check exited with {}", self.program, status);
            })
            .map_err(|e| self.spawn_error(e))
    }
}

const INITIALS: [&str; 19] = [
    "g", "kk", "n", "d", "tt", "r", "m", "b", "pp", "s", "ss", "", "j", "jj", "ch", "k", "t", "p",
    "h",
];

const VOWELS: [&str; 21] = [
    "a", "ae", "ya", "yae", "eo", "e", "yeo", "ye", "o", "wa", "wae", "oe", "yo", "u", "wo", "we",
    "wi", "yu", "eu", "ui", "i",
];

const FINALS: [&str; 28] = [
    "", "k", "k", "k", "n", "n", "n", "t", "l", "k", "m", "l", "l", "l", "p", "l", "m", "p", "p",
    "t", "t", "ng", "t", "t", "k", "t", "p", "t",
];

/// Revised Romanization of precomposed syllables, without sound change rules
#[derive(Debug, Clone, Copy, Default)]
pub struct HangulRomanizer;

impl HangulRomanizer {
    fn syllable(c: char) -> Option<String> {
        let index = (c as u32).checked_sub(0xAC00)?;
        if index >= 11172 {
            return None;
        }
        let initial = INITIALS[(index / 588) as usize];
        let vowel = VOWELS[((index % 588) / 28) as usize];
        let last = FINALS[(index % 28) as usize];
        Some(format!("{initial}{vowel}{last}"))
    }
}

impl Romanizer for HangulRomanizer {
    fn romanize(&self, text: &str) -> Result<String> {
        let mut out = String::with_capacity(text.len() * 2);
        for c in text.chars() {
            match Self::syllable(c) {
                Some(roman) => out.push_str(&roman),
                None => out.push(c),
            }
        }
        Ok(out)
    }
}

/// Romanizer described by the settings
pub fn from_settings(settings: &RomanizerSettings) -> Box<dyn Romanizer> {
    match settings.command.as_deref().and_then(CommandRomanizer::new) {
        Some(command) => Box::new(command),
        None => Box::new(HangulRomanizer),
    }
}

/// Romanized lyrics, or `None` when nothing should be written
///
/// Text without Hangul, romanizer failures and unchanged output all give
/// `None`, so the original lyrics stay in place.
pub fn romanize_lyrics(romanizer: &dyn Romanizer, text: &str) -> Option<String> {
    if !contains_hangul(text) {
        return None;
    }
    match romanizer.romanize(text) {
        Ok(romanized) if !romanized.trim().is_empty() && romanized != text => Some(romanized),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Failed to romanize lyrics: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingRomanizer;

    impl Romanizer for FailingRomanizer {
        fn romanize(&self, _text: &str) -> Result<String> {
            Err(romanizer_error("boom"))
        }
    }

    #[test]
    fn test_builtin_romanization() {
        let r = HangulRomanizer;
        assert_eq!(r.romanize("사랑해").unwrap(), "saranghae");
        assert_eq!(r.romanize("안녕 세상").unwrap(), "annyeong sesang");
        assert_eq!(r.romanize("[00:01.00]밤 night").unwrap(), "[00:01.00]bam night");
    }

    #[test]
    fn test_romanize_lyrics_skips_non_korean() {
        assert_eq!(romanize_lyrics(&HangulRomanizer, "hello"), None);
        assert_eq!(
            romanize_lyrics(&HangulRomanizer, "사랑"),
            Some("sarang".to_string())
        );
    }

    #[test]
    fn test_romanize_lyrics_failure_is_none() {
        assert_eq!(romanize_lyrics(&FailingRomanizer, "사랑"), None);
    }

    #[test]
    fn test_from_settings() {
        let settings = RomanizerSettings { command: None };
        assert_eq!(from_settings(&settings).romanize("밤").unwrap(), "bam");
        assert!(CommandRomanizer::new(&[]).is_none());
    }

    #[test]
    fn test_missing_command_is_capability_missing() {
        let romanizer =
            CommandRomanizer::new(&["tagfix-no-such-romanizer".to_string()]).unwrap();
        assert!(matches!(
            romanizer.romanize("사랑"),
            Err(TagfixError::CapabilityMissing(_))
        ));
    }

    #[test]
    fn test_check() {
        assert!(HangulRomanizer.check().is_ok());
        let missing =
            CommandRomanizer::new(&["tagfix-no-such-romanizer".to_string()]).unwrap();
        assert!(matches!(
            missing.check(),
            Err(TagfixError::CapabilityMissing(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_exit_reports_stdout_error() {
        let romanizer = CommandRomanizer::new(&[
            "sh".to_string(),
            "-c".to_string(),
            r#"echo '{"error": "module not installed"}'; echo 'Traceback' >&2; exit 1"#
                .to_string(),
        ])
        .unwrap();
        let err = romanizer.romanize("x").unwrap_err();
        assert!(err.to_string().contains("module not installed"), "{err}");

        let silent = CommandRomanizer::new(&[
            "sh".to_string(),
            "-c".to_string(),
            "echo 'Traceback' >&2; exit 2".to_string(),
        ])
        .unwrap();
        let err = silent.romanize("x").unwrap_err();
        assert!(err.to_string().contains("Traceback"), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_reply() {
        let ok = CommandRomanizer::new(&[
            "sh".to_string(),
            "-c".to_string(),
            r#"printf '{"result": "romanized %s"}' "$0""#.to_string(),
        ])
        .unwrap();
        assert_eq!(ok.romanize("x").unwrap(), "romanized x");

        let failing = CommandRomanizer::new(&[
            "sh".to_string(),
            "-c".to_string(),
            r#"echo '{"error": "no model"}'"#.to_string(),
        ])
        .unwrap();
        let err = failing.romanize("x").unwrap_err();
        assert!(err.to_string().contains("no model"));
    }
}
