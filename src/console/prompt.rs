//! Line based input and output for the interactive flows

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use crate::error::TagfixError;

const HEADER_WIDTH: usize = 60;

pub struct Prompt<R, W> {
    input: R,
    output: W,
    /// ANSI style for headers, `None` for plain output
    accent: Option<&'static str>,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            accent: None,
        }
    }

    pub fn with_accent(mut self, accent: Option<&'static str>) -> Self {
        self.accent = accent;
        self
    }

    /// Print one line
    pub fn say(&mut self, text: impl AsRef<str>) -> Result<()> {
        writeln!(self.output, "{}", text.as_ref()).context("Failed to write to terminal")
    }

    pub fn header(&mut self, title: &str) -> Result<()> {
        let rule = "=".repeat(HEADER_WIDTH);
        let text = format!("{}\n{:^width$}\n{}", rule, title, rule, width = HEADER_WIDTH);
        match self.accent {
            Some(style) => self.say(format!("\n{}{}\x1b[0m", style, text)),
            None => self.say(format!("\n{}", text)),
        }
    }

    /// Ask a question and return the trimmed answer
    ///
    /// End of input is reported as `UserCanceled`.
    pub fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "\n{}: ", question).context("Failed to write to terminal")?;
        self.output.flush().context("Failed to flush terminal")?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read from terminal")?;
        if read == 0 {
            return Err(TagfixError::UserCanceled.into());
        }
        Ok(line.trim().to_string())
    }

    /// Ask until the lowercase answer is one of `valid`
    pub fn choose(&mut self, question: &str, valid: &[&str]) -> Result<String> {
        loop {
            let answer = self.ask(question)?.to_lowercase();
            if valid.contains(&answer.as_str()) {
                return Ok(answer);
            }
        }
    }

    /// Ask for a 1-based index into a list of `len` items; `0` returns `None`
    pub fn pick(&mut self, question: &str, len: usize) -> Result<Option<usize>> {
        loop {
            let answer = self.ask(question)?;
            match answer.parse::<usize>() {
                Ok(0) => return Ok(None),
                Ok(n) if n <= len => return Ok(Some(n - 1)),
                Ok(_) => self.say("Invalid selection. Try again.")?,
                Err(_) => self.say("Invalid input. Enter a number.")?,
            }
        }
    }
}

/// True when an error came from the input running out
pub fn is_canceled(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<TagfixError>(),
        Some(TagfixError::UserCanceled)
    )
}

#[cfg(test)]
pub(crate) fn scripted(lines: &[&str]) -> Prompt<std::io::Cursor<Vec<u8>>, Vec<u8>> {
    let mut input = lines.join("\n");
    input.push('\n');
    Prompt::new(std::io::Cursor::new(input.into_bytes()), Vec::new())
}

#[cfg(test)]
pub(crate) fn output_of(prompt: Prompt<std::io::Cursor<Vec<u8>>, Vec<u8>>) -> String {
    String::from_utf8_lossy(&prompt.output).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_repeats_until_valid() {
        let mut prompt = scripted(&["x", " Y "]);
        assert_eq!(prompt.choose("Continue? [y]es / [b]ack", &["y", "b"]).unwrap(), "y");
        let out = output_of(prompt);
        assert_eq!(out.matches("Continue?").count(), 2);
    }

    #[test]
    fn test_pick() {
        let mut prompt = scripted(&["abc", "9", "2", "0"]);
        assert_eq!(prompt.pick("Select", 3).unwrap(), Some(1));
        assert_eq!(prompt.pick("Select", 3).unwrap(), None);
        let out = output_of(prompt);
        assert!(out.contains("Invalid input. Enter a number."));
        assert!(out.contains("Invalid selection. Try again."));
    }

    #[test]
    fn test_end_of_input_is_cancel() {
        let mut prompt = scripted(&[]);
        assert_eq!(prompt.ask("First").unwrap(), "");
        let err = prompt.ask("Second").unwrap_err();
        assert!(is_canceled(&err));
    }
}
