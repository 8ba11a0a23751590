//! Interactive flows started from the setup menu

use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::error::TagfixError;
use crate::features::batch::{BatchEvent, BatchSummary, CaseMode, EditPlan, Operation};
use crate::features::convert::TargetFormat;
use crate::features::cover;
use crate::features::csv_io;
use crate::features::dispatch::{AudioFile, normalize_input_path};
use crate::features::lyrics;
use crate::features::rename;
use crate::features::session::Session;
use crate::features::tags::{CanonicalTag, TagSession, parse_position};

use super::prompt::Prompt;
use super::setup::{NOT_SET, SetupChoice};

/// How a flow ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
    Done,
    /// Return to the setup menu
    Back,
}

const MAX_LISTED: usize = 10;

/// Run a batch and print each record and the summary line
///
/// Start errors such as `Busy` are printed and give `None`. Ctrl-C stops the
/// batch before its next file when the session routes interrupts.
pub fn run_batch<R: BufRead, W: Write>(
    prompt: &mut Prompt<R, W>,
    session: &Session,
    files: &[AudioFile],
    operation: Operation,
) -> Result<Option<BatchSummary>> {
    let mut handle = match session.start_batch(files.to_vec(), operation) {
        Ok(handle) => handle,
        Err(e @ (TagfixError::Busy | TagfixError::CapabilityMissing(_))) => {
            prompt.say(format!("Error: {}", e))?;
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let mut position = (0, 0);
    let mut summary = None;
    while let Some(event) = handle.next_event() {
        match event {
            BatchEvent::Started { total } => {
                prompt.say(format!("Processing {} item(s)...", total))?;
                if session.is_interruptible() {
                    prompt.say("Press Ctrl-C to stop after the current file.")?;
                }
            }
            BatchEvent::Progress { current, total } => position = (current, total),
            BatchEvent::Result(result) => {
                let name = result
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                prompt.say(format!(
                    "  [{}/{}] {}: {} - {}",
                    position.0, position.1, name, result.status, result.message
                ))?;
            }
            BatchEvent::Finished(finished) => {
                prompt.say(format!("\n{}", finished.message()))?;
                summary = Some(finished);
            }
            BatchEvent::Conversion(stats) => {
                prompt.say("\nConversion Complete")?;
                prompt.say(format!("Converted: {}", stats.converted))?;
                prompt.say(format!("Copied: {}", stats.copied))?;
                if stats.failed > 0 {
                    prompt.say(format!("Failed: {}", stats.failed))?;
                }
                for error in &stats.errors {
                    prompt.say(format!("  - {}", error))?;
                }
            }
        }
    }
    handle.wait()?;
    Ok(summary)
}

fn first_tags(files: &[AudioFile]) -> (String, String) {
    let Some(first) = files.first() else {
        return (String::new(), String::new());
    };
    match TagSession::open(first) {
        Ok(session) => (
            session.get(CanonicalTag::Album).unwrap_or_default(),
            session
                .get(CanonicalTag::AlbumArtist)
                .or_else(|| session.get(CanonicalTag::Artist))
                .unwrap_or_default(),
        ),
        Err(e) => {
            tracing::warn!("Could not read {:?}: {}", first.path, e);
            (String::new(), String::new())
        }
    }
}

fn ask_local_image<R: BufRead, W: Write>(
    prompt: &mut Prompt<R, W>,
    files: &[AudioFile],
) -> Result<Option<Vec<u8>>> {
    let suggestion = files.first().and_then(cover::find_folder_cover);
    if let Some(found) = &suggestion {
        prompt.say(format!("Found image next to the files: {}", found.display()))?;
        prompt.say("Press Enter to use it.")?;
    }

    loop {
        let answer = prompt.ask("Enter local image path (or 'b' to go back)")?;
        if answer.eq_ignore_ascii_case("b") {
            return Ok(None);
        }
        let path = match (&suggestion, answer.is_empty()) {
            (Some(found), true) => found.clone(),
            (None, true) => continue,
            _ => normalize_input_path(&answer),
        };
        match cover::load_local_image(&path) {
            Ok(data) => return Ok(Some(data)),
            Err(TagfixError::NotFound(_)) => prompt.say("File not found. Try again.")?,
            Err(TagfixError::UnsupportedFormat(_)) => {
                prompt.say("Unsupported image format. Try jpg/jpeg/png/bmp/gif.")?
            }
            Err(e) => prompt.say(format!("Error: {}", e))?,
        }
    }
}

/// Pick one cover and embed it into every file
pub fn cover_flow<R: BufRead, W: Write>(
    prompt: &mut Prompt<R, W>,
    session: &Session,
    files: &[AudioFile],
) -> Result<FlowOutcome> {
    prompt.header("Album Cover Embedder")?;
    let (album, artist) = first_tags(files);
    prompt.say(format!("\nAlbum detected: {}", album))?;
    prompt.say(format!("Artist detected: {}\n", artist))?;
    prompt.say("Choose album cover source:")?;
    prompt.say(format!(
        "  [1] Search online ({})",
        session.settings.covers.source
    ))?;
    prompt.say("  [2] Provide local image file")?;
    prompt.say("  [3] Fetch a cover for every album")?;
    prompt.say("  [b] Back to setup menu")?;

    let choice = prompt.choose("Your choice", &["1", "2", "3", "b"])?;
    let mut image = None;
    match choice.as_str() {
        "b" => return Ok(FlowOutcome::Back),
        "3" => {
            run_batch(prompt, session, files, Operation::FetchCover)?;
            return Ok(FlowOutcome::Done);
        }
        "1" if !session.is_online() => {
            prompt.say("Online lookup not available. Switching to local image.")?;
        }
        "1" => {
            prompt.say("Searching online for album cover...")?;
            image = session.fetch_cover(&artist, &album);
            if image.is_none() {
                prompt.say("No online cover found. Switching to local image.")?;
            }
        }
        _ => {}
    }

    let image = match image {
        Some(image) => image,
        None => match ask_local_image(prompt, files)? {
            Some(image) => image,
            None => return Ok(FlowOutcome::Back),
        },
    };

    let Some((width, height)) = cover::image_dimensions(&image) else {
        prompt.say("Could not read this image.")?;
        return Ok(FlowOutcome::Done);
    };
    let (preview_w, preview_h) = cover::preview_dimensions(width, height);
    prompt.say(format!("\nDimensions: {}x{}", width, height))?;
    prompt.say(format!("Preview: {}x{}", preview_w, preview_h))?;
    prompt.say(format!("Size: {} KB", image.len() / 1024))?;

    if prompt.choose("Use this cover? [y]es / [s]kip", &["y", "s"])? == "s" {
        prompt.say("Album cover embedding skipped.")?;
        return Ok(FlowOutcome::Done);
    }

    let prepared = match cover::prepare_cover(&image) {
        Ok(prepared) => prepared,
        Err(e) => {
            prompt.say(format!("Error: {}", e))?;
            return Ok(FlowOutcome::Done);
        }
    };
    run_batch(prompt, session, files, Operation::EmbedCover(Arc::new(prepared)))?;
    Ok(FlowOutcome::Done)
}

/// Embed, copy, extract, romanize or fetch lyrics
pub fn lyrics_flow<R: BufRead, W: Write>(
    prompt: &mut Prompt<R, W>,
    session: &Session,
    files: &[AudioFile],
) -> Result<FlowOutcome> {
    prompt.header("Lyrics Embedder")?;
    prompt.say(format!("\nFound {} audio file(s).", files.len()))?;
    prompt.say("\nLyrics Options:")?;
    prompt.say("  [1] Embed lyrics file into audio metadata")?;
    prompt.say("  [2] Copy lyrics file to match song filename")?;
    prompt.say("  [3] Do both (embed + copy)")?;
    prompt.say("  [4] Extract embedded lyrics to .lrc files")?;
    prompt.say("  [5] Romanize lyrics (Korean)")?;
    prompt.say("  [6] Fetch lyrics online")?;
    prompt.say("  [b] Back to setup menu")?;

    let choice = prompt.choose("Your choice", &["1", "2", "3", "4", "5", "6", "b"])?;
    match choice.as_str() {
        "b" => return Ok(FlowOutcome::Back),
        "5" => {
            run_batch(prompt, session, files, Operation::RomanizeLyrics)?;
            return Ok(FlowOutcome::Done);
        }
        "6" => {
            run_batch(prompt, session, files, Operation::FetchLyrics)?;
            return Ok(FlowOutcome::Done);
        }
        "4" => {
            run_batch(prompt, session, files, Operation::ExtractLyrics)?;
            return Ok(FlowOutcome::Done);
        }
        _ => {}
    }

    let lyrics_files = loop {
        let dir = prompt.ask("Enter lyrics directory path (or 'b' to go back)")?;
        if dir.eq_ignore_ascii_case("b") {
            return Ok(FlowOutcome::Back);
        }
        match lyrics::find_lyrics_files(&normalize_input_path(&dir)) {
            Ok(found) if !found.is_empty() => break found,
            _ => prompt.say("No lyrics files found in directory. Try again.")?,
        }
    };

    prompt.say(format!("\nFound {} lyrics file(s):", lyrics_files.len()))?;
    for path in lyrics_files.iter().take(MAX_LISTED) {
        prompt.say(format!("  - {}", file_name(path)))?;
    }
    if lyrics_files.len() > MAX_LISTED {
        prompt.say(format!("  ... and {} more", lyrics_files.len() - MAX_LISTED))?;
    }

    let selected = loop {
        let term = prompt.ask("Enter song title to search (or 'b' to go back)")?;
        if term.eq_ignore_ascii_case("b") {
            return Ok(FlowOutcome::Back);
        }
        if term.is_empty() {
            prompt.say("Please enter a search term.")?;
            continue;
        }

        let matches = lyrics::search_lyrics_files(&lyrics_files, &term);
        if matches.is_empty() {
            prompt.say(format!("No lyrics files found matching '{}'. Try again.", term))?;
            continue;
        }
        prompt.say(format!("\nFound {} matching file(s):", matches.len()))?;
        for (i, path) in matches.iter().enumerate() {
            prompt.say(format!("  [{}] {}", i + 1, file_name(path)))?;
        }
        prompt.say("  [0] Search again")?;
        if let Some(index) = prompt.pick("Select lyrics file number", matches.len())? {
            break matches[index].clone();
        }
    };

    let text = match lyrics::read_lyrics_file(&selected) {
        Ok(text) => text,
        Err(e) => {
            prompt.say(format!("Error reading lyrics file: {}", e))?;
            return Ok(FlowOutcome::Done);
        }
    };
    prompt.say(format!("\nLyrics file loaded: {}", file_name(&selected)))?;
    prompt.say(format!("Size: {} characters", text.chars().count()))?;

    if choice == "1" || choice == "3" {
        run_batch(prompt, session, files, Operation::EmbedLyrics(text))?;
    }

    if choice == "2" || choice == "3" {
        let target = if files.len() == 1 {
            files.first()
        } else {
            prompt.say("\nMultiple audio files found. Select which song to match:")?;
            for (i, file) in files.iter().enumerate() {
                prompt.say(format!("  [{}] {}", i + 1, file.file_name()))?;
            }
            prompt.say("  [0] Skip copying")?;
            prompt
                .pick("Select file number", files.len())?
                .and_then(|i| files.get(i))
        };
        if let Some(audio) = target {
            match lyrics::copy_lyrics_for(&selected, audio) {
                Ok(copied) => prompt.say(format!("\nLyrics file copied to: {}", copied.display()))?,
                Err(e) => prompt.say(format!("Error copying lyrics file: {}", e))?,
            }
        }
    }

    prompt.say("\nLyrics processing complete.")?;
    Ok(FlowOutcome::Done)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn convert_flow<R: BufRead, W: Write>(
    prompt: &mut Prompt<R, W>,
    session: &Session,
    files: &[AudioFile],
    target: TargetFormat,
) -> Result<FlowOutcome> {
    if !session.capabilities.can_encode(target) {
        prompt.say(format!(
            "\nError: no encoder available for {}. Install ffmpeg to enable it.",
            target
        ))?;
        return Ok(FlowOutcome::Done);
    }

    prompt.header(&format!("{} Conversion", target))?;
    prompt.say(format!("Found {} audio file(s) to convert", files.len()))?;
    if prompt.choose("Start conversion? [y]es / [b]ack", &["y", "b"])? == "b" {
        return Ok(FlowOutcome::Back);
    }

    prompt.say("\nStarting conversion...")?;
    run_batch(prompt, session, files, Operation::Convert(target))?;
    Ok(FlowOutcome::Done)
}

/// Collect per-file values, then apply them with the global values in one batch
pub fn edit_flow<R: BufRead, W: Write>(
    prompt: &mut Prompt<R, W>,
    session: &Session,
    files: &[AudioFile],
    choice: SetupChoice,
) -> Result<FlowOutcome> {
    let mut plan: EditPlan = choice.plan;

    if !choice.per_file_tags.is_empty() {
        prompt.header("Individual File Editing")?;
        for (index, file) in files.iter().enumerate() {
            let current = match TagSession::open(file) {
                Ok(tags) => tags,
                Err(e) => {
                    prompt.say(format!("\n[{}/{}] {}: {}", index + 1, files.len(), file.file_name(), e))?;
                    continue;
                }
            };

            prompt.say(format!("\n[{}/{}] File: {}", index + 1, files.len(), file.file_name()))?;
            for tag in &choice.per_file_tags {
                let value = current.get(*tag).unwrap_or_else(|| NOT_SET.to_string());
                prompt.say(format!("  {}: {}", tag.label(), value))?;
            }
            prompt.say("\nOptions:")?;
            prompt.say("  [Enter] Edit this file")?;
            prompt.say("  [s] Skip this file")?;
            prompt.say("  [b] Back to setup")?;
            prompt.say("  [q] Quit and finish")?;

            match prompt.ask("Your choice")?.to_lowercase().as_str() {
                "q" => break,
                "b" => return Ok(FlowOutcome::Back),
                "s" => continue,
                _ => {}
            }

            for tag in &choice.per_file_tags {
                let shown = current
                    .get(*tag)
                    .map(|v| format!("[{}]", v))
                    .unwrap_or_else(|| NOT_SET.to_string());
                let value = prompt.ask(&format!("  {} {}", tag.label(), shown))?;
                if value.is_empty() {
                    continue;
                }
                if tag.is_position() {
                    if let Err(e) = parse_position(*tag, &value) {
                        prompt.say(format!("  Ignored: {}", e))?;
                        continue;
                    }
                }
                plan.set_for_file(&file.path, *tag, value);
            }
        }
    }

    if plan.is_empty() {
        return Ok(FlowOutcome::Done);
    }
    prompt.header("Saving Tags")?;
    run_batch(prompt, session, files, Operation::ApplyEdits(plan))?;
    Ok(FlowOutcome::Done)
}

const TOOLS_TEXT: &str = "  [1] Rename files by pattern
  [2] Resize covers to 500x500
  [3] Case conversion
  [4] Export tags to CSV
  [5] Import tags from CSV
  [6] Auto-tag from MusicBrainz
  [7] Re-encode FLAC files
  [8] Export embedded covers
  [b] Back to setup menu";

/// Less common batch operations
pub fn tools_flow<R: BufRead, W: Write>(
    prompt: &mut Prompt<R, W>,
    session: &Session,
    files: &[AudioFile],
) -> Result<FlowOutcome> {
    prompt.header("Tools")?;
    prompt.say(TOOLS_TEXT)?;

    let choice = prompt.choose("Your choice", &["1", "2", "3", "4", "5", "6", "7", "8", "b"])?;
    let operation = match choice.as_str() {
        "b" => return Ok(FlowOutcome::Back),
        "1" => {
            prompt.say(format!(
                "\nPlaceholders: {}",
                rename::PLACEHOLDERS
                    .iter()
                    .map(|t| format!("{{{}}}", t.as_str()))
                    .collect::<Vec<_>>()
                    .join(" ")
            ))?;
            let mut pattern = prompt.ask(&format!("Pattern (Enter for '{}')", rename::DEFAULT_PATTERN))?;
            if pattern.is_empty() {
                pattern = rename::DEFAULT_PATTERN.to_string();
            }
            for file in files.iter().take(3) {
                match rename::preview_name(file, &pattern) {
                    Ok(name) => prompt.say(format!("  {} -> {}", file.file_name(), name))?,
                    Err(e) => prompt.say(format!("  {}: {}", file.file_name(), e))?,
                }
            }
            if prompt.choose("Rename files? [y]es / [b]ack", &["y", "b"])? == "b" {
                return Ok(FlowOutcome::Back);
            }
            Operation::Rename(pattern)
        }
        "2" => Operation::ResizeCover,
        "3" => {
            prompt.say("  [1] Title Case\n  [2] UPPERCASE\n  [3] lowercase\n  [b] Back")?;
            match prompt.choose("Your choice", &["1", "2", "3", "b"])?.as_str() {
                "1" => Operation::CaseConvert(CaseMode::Title),
                "2" => Operation::CaseConvert(CaseMode::Upper),
                "3" => Operation::CaseConvert(CaseMode::Lower),
                _ => return Ok(FlowOutcome::Back),
            }
        }
        "4" => {
            let default = files
                .first()
                .map(|f| f.dir().join("tags.csv"))
                .unwrap_or_else(|| "tags.csv".into());
            let answer = prompt.ask(&format!("Output file (Enter for {})", default.display()))?;
            let out = if answer.is_empty() {
                default
            } else {
                normalize_input_path(&answer)
            };
            match csv_io::export(files, &out) {
                Ok(count) => prompt.say(format!("Exported {} file(s) to {}", count, out.display()))?,
                Err(e) => prompt.say(format!("Error: {}", e))?,
            }
            return Ok(FlowOutcome::Done);
        }
        "5" => {
            let answer = prompt.ask("CSV file path (or 'b' to go back)")?;
            if answer.eq_ignore_ascii_case("b") {
                return Ok(FlowOutcome::Back);
            }
            match csv_io::import(&normalize_input_path(&answer)) {
                Ok(rows) => {
                    prompt.say(format!("Loaded {} row(s)", rows.len()))?;
                    Operation::CsvImport(rows)
                }
                Err(e) => {
                    prompt.say(format!("Error: {}", e))?;
                    return Ok(FlowOutcome::Done);
                }
            }
        }
        "6" => {
            let skip = prompt.choose("Skip files that already have album and date? [y]es / [n]o", &["y", "n"])?;
            Operation::AutoTag {
                skip_existing: skip == "y",
            }
        }
        "7" => Operation::ReencodeFlac,
        _ => {
            let answer = prompt.ask("Output folder (Enter for next to each file)")?;
            Operation::ExportCovers((!answer.is_empty()).then(|| normalize_input_path(&answer)))
        }
    };

    run_batch(prompt, session, files, operation)?;
    Ok(FlowOutcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::prompt::{output_of, scripted};
    use crate::features::settings::Settings;
    use crate::test_support::{sample_png, write_silent_wav};
    use std::fs;
    use tempfile::TempDir;

    fn wavs(dir: &Path, names: &[&str]) -> Vec<AudioFile> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                write_silent_wav(&path);
                AudioFile::from_path(&path).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_local_cover_is_resized_and_embedded() {
        let dir = TempDir::new().unwrap();
        let files = wavs(dir.path(), &["a.wav", "b.wav"]);
        let image = dir.path().join("art.png");
        fs::write(&image, sample_png(64, 32)).unwrap();
        fs::write(dir.path().join("notes.doc"), b"x").unwrap();

        let session = Session::offline(Settings::default());
        let mut prompt = scripted(&[
            "2",
            dir.path().join("missing.png").to_str().unwrap(),
            dir.path().join("notes.doc").to_str().unwrap(),
            image.to_str().unwrap(),
            "y",
        ]);
        assert_eq!(cover_flow(&mut prompt, &session, &files).unwrap(), FlowOutcome::Done);

        let out = output_of(prompt);
        assert!(out.contains("File not found. Try again."));
        assert!(out.contains("Unsupported image format."));
        assert!(out.contains("Dimensions: 64x32"));
        assert!(out.contains("[2/2] b.wav: Updated - Cover embedded"));
        assert!(out.contains("Done, updated 2 files."));

        let art = cover::get_cover(&files[1]).unwrap().unwrap();
        assert_eq!(cover::image_dimensions(&art.data), Some((500, 500)));
    }

    #[test]
    fn test_cover_back_and_offline_fallback() {
        let dir = TempDir::new().unwrap();
        let files = wavs(dir.path(), &["a.wav"]);
        let session = Session::offline(Settings::default());

        let mut prompt = scripted(&["b"]);
        assert_eq!(cover_flow(&mut prompt, &session, &files).unwrap(), FlowOutcome::Back);

        let mut prompt = scripted(&["1", "b"]);
        assert_eq!(cover_flow(&mut prompt, &session, &files).unwrap(), FlowOutcome::Back);
        assert!(output_of(prompt).contains("Online lookup not available"));
    }

    #[test]
    fn test_lyrics_embed_and_copy() {
        let dir = TempDir::new().unwrap();
        let files = wavs(dir.path(), &["one.wav", "two.wav"]);
        let lyrics_dir = dir.path().join("lyrics");
        fs::create_dir(&lyrics_dir).unwrap();
        fs::write(lyrics_dir.join("Two Song.lrc"), "[00:01.00]la la").unwrap();
        fs::write(lyrics_dir.join("Other.lrc"), "x").unwrap();

        let session = Session::offline(Settings::default());
        let mut prompt = scripted(&[
            "3",
            dir.path().join("nowhere").to_str().unwrap(),
            lyrics_dir.to_str().unwrap(),
            "",
            "zzz",
            "two",
            "1",
            "2",
        ]);
        assert_eq!(lyrics_flow(&mut prompt, &session, &files).unwrap(), FlowOutcome::Done);

        let out = output_of(prompt);
        assert!(out.contains("No lyrics files found in directory. Try again."));
        assert!(out.contains("Please enter a search term."));
        assert!(out.contains("No lyrics files found matching 'zzz'. Try again."));
        assert!(out.contains("[1/2] one.wav: Updated - Lyrics embedded"));
        assert!(out.contains("Done, updated 2 files."));

        assert_eq!(
            lyrics::get_lyrics(&files[0]).unwrap(),
            Some("[00:01.00]la la".to_string())
        );
        assert!(dir.path().join("two.lrc").exists());
        assert!(!dir.path().join("one.lrc").exists());
    }

    #[test]
    fn test_lyrics_extract_reports_each_file() {
        let dir = TempDir::new().unwrap();
        let files = wavs(dir.path(), &["a.wav", "b.wav"]);
        lyrics::embed_lyrics(&files[1], "[00:02.00]hey").unwrap();
        let session = Session::offline(Settings::default());

        let mut prompt = scripted(&["4"]);
        assert_eq!(lyrics_flow(&mut prompt, &session, &files).unwrap(), FlowOutcome::Done);
        let out = output_of(prompt);
        assert!(out.contains("[1/2] a.wav: Skipped - No embedded lyrics"));
        assert!(out.contains("[2/2] b.wav: Success - Saved b.lrc"));
        assert!(out.contains("Done. Updated 1, Skipped 1"));
        assert!(dir.path().join("b.lrc").exists());
    }

    #[test]
    fn test_conversion_prints_totals() {
        let dir = TempDir::new().unwrap();
        let album = dir.path().join("Album");
        fs::create_dir(&album).unwrap();
        let files = wavs(&album, &["01.wav", "02.wav"]);
        fs::write(album.join("cover.jpg"), b"jpeg").unwrap();

        let mut session = Session::offline(Settings::default());
        session.capabilities.library_wav = true;
        let mut prompt = scripted(&["y"]);
        assert_eq!(
            convert_flow(&mut prompt, &session, &files, TargetFormat::Wav).unwrap(),
            FlowOutcome::Done
        );

        let out = output_of(prompt);
        assert!(out.contains("Done, updated 2 files."));
        assert!(out.contains("Conversion Complete"));
        assert!(out.contains("Converted: 2"));
        assert!(out.contains("Copied: 1"));
        assert!(!out.contains("Failed:"));
        assert!(album.join("Album - wav").join("cover.jpg").exists());
    }

    #[test]
    fn test_convert_without_encoder() {
        let dir = TempDir::new().unwrap();
        let files = wavs(dir.path(), &["a.wav"]);
        let session = Session::offline(Settings::default());
        let mut prompt = scripted(&[]);
        assert_eq!(
            convert_flow(&mut prompt, &session, &files, TargetFormat::Flac).unwrap(),
            FlowOutcome::Done
        );
        assert!(output_of(prompt).contains("no encoder available for FLAC"));
    }

    #[test]
    fn test_edit_flow_applies_plan() {
        let dir = TempDir::new().unwrap();
        let files = wavs(dir.path(), &["a.wav", "b.wav", "c.wav"]);
        let session = Session::offline(Settings::default());

        let mut choice = SetupChoice::default();
        choice.plan.set_global(CanonicalTag::Album, "Record").unwrap();
        choice.per_file_tags = vec![CanonicalTag::Title, CanonicalTag::TrackNumber];

        let mut prompt = scripted(&["", "First", "one", "s", "", "Third", "3"]);
        assert_eq!(
            edit_flow(&mut prompt, &session, &files, choice).unwrap(),
            FlowOutcome::Done
        );
        let out = output_of(prompt);
        assert!(out.contains("Ignored:"));
        assert!(out.contains("Done, updated 3 files."));

        let a = TagSession::open(&files[0]).unwrap();
        assert_eq!(a.get(CanonicalTag::Title), Some("First".to_string()));
        assert_eq!(a.get(CanonicalTag::TrackNumber), None);
        assert_eq!(a.get(CanonicalTag::Album), Some("Record".to_string()));
        let b = TagSession::open(&files[1]).unwrap();
        assert_eq!(b.get(CanonicalTag::Title), None);
        assert_eq!(b.get(CanonicalTag::Album), Some("Record".to_string()));
        let c = TagSession::open(&files[2]).unwrap();
        assert_eq!(c.get(CanonicalTag::TrackNumber), Some("3".to_string()));
    }

    #[test]
    fn test_edit_flow_back_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let files = wavs(dir.path(), &["a.wav"]);
        let session = Session::offline(Settings::default());

        let mut choice = SetupChoice::default();
        choice.plan.set_global(CanonicalTag::Genre, "Jazz").unwrap();
        choice.per_file_tags = vec![CanonicalTag::Title];

        let mut prompt = scripted(&["b"]);
        assert_eq!(
            edit_flow(&mut prompt, &session, &files, choice).unwrap(),
            FlowOutcome::Back
        );
        let tags = TagSession::open(&files[0]).unwrap();
        assert_eq!(tags.get(CanonicalTag::Genre), None);
    }

    #[test]
    fn test_tools_case_conversion_and_csv_export() {
        let dir = TempDir::new().unwrap();
        let files = wavs(dir.path(), &["a.wav"]);
        let mut tags = TagSession::open(&files[0]).unwrap();
        tags.set(CanonicalTag::Title, "quiet song").unwrap();
        tags.save().unwrap();
        let session = Session::offline(Settings::default());

        let mut prompt = scripted(&["3", "2"]);
        tools_flow(&mut prompt, &session, &files).unwrap();
        assert!(output_of(prompt).contains("Done, updated 1 files."));
        assert_eq!(
            TagSession::open(&files[0]).unwrap().get(CanonicalTag::Title),
            Some("QUIET SONG".to_string())
        );

        let mut prompt = scripted(&["4", ""]);
        tools_flow(&mut prompt, &session, &files).unwrap();
        let csv = fs::read_to_string(dir.path().join("tags.csv")).unwrap();
        assert!(csv.contains("QUIET SONG"));
    }

    #[test]
    fn test_tools_cover_export_reports_each_file() {
        let dir = TempDir::new().unwrap();
        let files = wavs(dir.path(), &["a.wav", "b.wav"]);
        cover::set_cover(&files[0], sample_png(8, 8), "image/png").unwrap();
        let session = Session::offline(Settings::default());
        let out_dir = dir.path().join("art");

        let mut prompt = scripted(&["8", out_dir.to_str().unwrap()]);
        tools_flow(&mut prompt, &session, &files).unwrap();
        let out = output_of(prompt);
        assert!(out.contains("a.wav: Success - Saved"));
        assert!(out.contains("b.wav: Skipped - No cover"));
        assert!(out_dir.join("a.jpg").exists());
    }
}
