//! Interactive console front-end
//!
//! Every menu accepts `b` to return to the previous level. Work that touches
//! many files runs through the batch controller.

mod flows;
mod prompt;
mod setup;

pub use prompt::{Prompt, is_canceled};

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Result;

use crate::features::convert::TargetFormat;
use crate::features::dispatch::{
    AudioFile, SUPPORTED_EXTENSIONS, normalize_input_path, resolve_targets,
};
use crate::features::session::Session;
use crate::features::tags::CanonicalTag;

use flows::FlowOutcome;
use setup::{SetupItem, SetupOutcome};

/// Header colour for the configured theme
pub fn accent_for(dark_mode: bool) -> Option<&'static str> {
    if dark_mode {
        Some("\x1b[1;36m")
    } else {
        Some("\x1b[1;34m")
    }
}

/// Run the main menu until the user exits or input ends
pub fn run<R: BufRead, W: Write>(
    prompt: &mut Prompt<R, W>,
    session: &mut Session,
    initial_path: Option<String>,
) -> Result<()> {
    match main_loop(prompt, session, initial_path) {
        Err(e) if is_canceled(&e) => prompt.say("\nGoodbye!"),
        other => other,
    }
}

fn main_loop<R: BufRead, W: Write>(
    prompt: &mut Prompt<R, W>,
    session: &mut Session,
    mut initial_path: Option<String>,
) -> Result<()> {
    prompt.header("tagfix - Audio Metadata Editor")?;

    loop {
        let input = match initial_path.take() {
            Some(path) => path,
            None => {
                prompt.say("\n\nMain Menu\n---------")?;
                if let Some(recent) = session.settings.recent_folders.first() {
                    prompt.say(format!("Last folder: {}", recent.display()))?;
                }
                prompt.say("\nDrag and drop or enter folder's path to begin")?;
                prompt.say("Type 'e' to exit")?;
                prompt.ask("Path (file or folder)")?
            }
        };

        if input.eq_ignore_ascii_case("e") {
            prompt.say("Goodbye!")?;
            return Ok(());
        }
        if input.is_empty() {
            continue;
        }

        let files = match resolve_targets(&input) {
            Ok(files) if !files.is_empty() => files,
            Ok(_) => {
                prompt.say(format!(
                    "No audio files found (supported: {}).",
                    SUPPORTED_EXTENSIONS.join(", ")
                ))?;
                continue;
            }
            Err(e) => {
                prompt.say(format!("Error: {}", e))?;
                continue;
            }
        };
        prompt.say(format!("Found {} audio file(s).", files.len()))?;

        let path = normalize_input_path(&input);
        let folder = if path.is_dir() {
            path.as_path()
        } else {
            path.parent().unwrap_or(Path::new("."))
        };
        session.remember_folder(folder);

        album_loop(prompt, session, &input, files)?;
    }
}

/// Setup menu and the flows it selects, repeated until a pass completes
fn album_loop<R: BufRead, W: Write>(
    prompt: &mut Prompt<R, W>,
    session: &Session,
    input: &str,
    mut files: Vec<AudioFile>,
) -> Result<()> {
    loop {
        let choice = match setup::setup_menu(prompt, &files)? {
            SetupOutcome::Back => return Ok(()),
            SetupOutcome::Tools => {
                flows::tools_flow(prompt, session, &files)?;
                // Renames change paths
                files = resolve_targets(input).unwrap_or(files);
                continue;
            }
            SetupOutcome::Selected(choice) => choice,
        };

        if choice.has(SetupItem::Tag(CanonicalTag::Cover))
            && flows::cover_flow(prompt, session, &files)? == FlowOutcome::Back
        {
            continue;
        }
        if choice.has(SetupItem::Tag(CanonicalTag::Lyrics))
            && flows::lyrics_flow(prompt, session, &files)? == FlowOutcome::Back
        {
            continue;
        }
        if choice.has(SetupItem::ConvertWav)
            && flows::convert_flow(prompt, session, &files, TargetFormat::Wav)? == FlowOutcome::Back
        {
            continue;
        }
        if choice.has(SetupItem::ConvertFlac)
            && flows::convert_flow(prompt, session, &files, TargetFormat::Flac)?
                == FlowOutcome::Back
        {
            continue;
        }
        if flows::edit_flow(prompt, session, &files, choice)? == FlowOutcome::Back {
            continue;
        }
        return Ok(());
    }
}
