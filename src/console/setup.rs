//! Setup menu and metadata analysis

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use anyhow::Result;
use rayon::prelude::*;

use crate::features::batch::EditPlan;
use crate::features::cover;
use crate::features::dispatch::AudioFile;
use crate::features::lyrics::LyricsStatus;
use crate::features::tags::{CanonicalTag, TagSession};

use super::prompt::Prompt;

pub const NOT_SET: &str = "[Not Set]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupItem {
    Tag(CanonicalTag),
    ConvertWav,
    ConvertFlac,
}

pub const MENU_ITEMS: &[(&str, SetupItem)] = &[
    ("1", SetupItem::Tag(CanonicalTag::Cover)),
    ("2", SetupItem::Tag(CanonicalTag::Lyrics)),
    ("3", SetupItem::Tag(CanonicalTag::Title)),
    ("4", SetupItem::Tag(CanonicalTag::Artist)),
    ("5", SetupItem::Tag(CanonicalTag::Album)),
    ("6", SetupItem::Tag(CanonicalTag::AlbumArtist)),
    ("7", SetupItem::Tag(CanonicalTag::Genre)),
    ("8", SetupItem::Tag(CanonicalTag::Date)),
    ("9", SetupItem::Tag(CanonicalTag::TrackNumber)),
    ("10", SetupItem::Tag(CanonicalTag::DiscNumber)),
    ("11", SetupItem::Tag(CanonicalTag::Comment)),
    ("12", SetupItem::ConvertWav),
    ("13", SetupItem::ConvertFlac),
];

const MENU_TEXT: &str = "\nAvailable Tags:
  [1] Cover          [7] Genre
  [2] Lyrics         [8] Date
  [3] Title          [9] Track Number
  [4] Artist         [10] Disc Number
  [5] Album          [11] Comment
  [6] Album Artist   [12] Convert to WAV
                     [13] Convert to FLAC

Instructions: Enter numbers separated by spaces (e.g., 1 2 4)
              Type 't' for more tools
              Type 'b' to go back to main menu";

/// Space separated menu numbers, unknown entries and repeats dropped
pub fn parse_selection(input: &str) -> Vec<SetupItem> {
    let mut items = Vec::new();
    for token in input.split_whitespace() {
        if let Some((_, item)) = MENU_ITEMS.iter().find(|(key, _)| *key == token) {
            if !items.contains(item) {
                items.push(*item);
            }
        }
    }
    items
}

/// The text tag behind a menu item, if it goes through analysis and editing
fn text_tag_of(item: &SetupItem) -> Option<CanonicalTag> {
    match item {
        SetupItem::Tag(CanonicalTag::Cover | CanonicalTag::Lyrics) => None,
        SetupItem::Tag(tag) => Some(*tag),
        _ => None,
    }
}

/// Files grouped by value, `[Not Set]` last
pub type Distribution = Vec<(String, Vec<String>)>;

/// Value distribution of each tag across the files
pub fn analyze(files: &[AudioFile], tags: &[CanonicalTag]) -> BTreeMap<CanonicalTag, Distribution> {
    let per_file: Vec<(String, Vec<Option<String>>)> = files
        .par_iter()
        .filter_map(|file| match TagSession::open(file) {
            Ok(session) => Some((
                file.file_name(),
                tags.iter().map(|tag| session.get(*tag)).collect(),
            )),
            Err(e) => {
                tracing::warn!("Skipping {:?} in analysis: {}", file.path, e);
                None
            }
        })
        .collect();

    let mut result = BTreeMap::new();
    for (index, tag) in tags.iter().enumerate() {
        let mut groups: BTreeMap<(bool, String), Vec<String>> = BTreeMap::new();
        for (name, values) in &per_file {
            let value = values[index].clone().filter(|v| !v.is_empty());
            let key = match value {
                Some(v) => (false, v),
                None => (true, NOT_SET.to_string()),
            };
            groups.entry(key).or_default().push(name.clone());
        }
        let distribution = groups
            .into_iter()
            .map(|((_, value), names)| (value, names))
            .collect();
        result.insert(*tag, distribution);
    }
    result
}

/// Cover or lyrics state of each file, grouped by status label
pub fn analyze_status(files: &[AudioFile], tag: CanonicalTag) -> Distribution {
    let per_file: Vec<(String, &'static str)> = files
        .par_iter()
        .filter_map(|file| match TagSession::open(file) {
            Ok(session) => {
                let label = match tag {
                    CanonicalTag::Cover => {
                        let art = session.get_cover();
                        cover::cover_status(art.as_ref().map(|a| a.data.as_slice())).label()
                    }
                    _ => LyricsStatus::of(session.get(CanonicalTag::Lyrics).as_deref()).label(),
                };
                Some((file.file_name(), label))
            }
            Err(e) => {
                tracing::warn!("Skipping {:?} in analysis: {}", file.path, e);
                None
            }
        })
        .collect();

    let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (name, label) in per_file {
        groups.entry(label).or_default().push(name);
    }
    groups
        .into_iter()
        .map(|(label, names)| (label.to_string(), names))
        .collect()
}

/// Lines describing one distribution under `heading`, e.g. "Artist Values"
pub fn format_distribution(heading: &str, distribution: &Distribution, total: usize) -> Vec<String> {
    let mut lines = vec![format!("\nCurrent {}:", heading), "-".repeat(60)];
    if distribution.is_empty() {
        lines.push("  No metadata found".to_string());
        return lines;
    }

    for (value, names) in distribution {
        let count = names.len();
        let percentage = if total > 0 {
            count as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        lines.push(format!("  '{}' - {} file(s) ({:.1}%)", value, count, percentage));
        if count <= 3 {
            lines.extend(names.iter().map(|n| format!("    - {}", n)));
        } else {
            lines.extend(names.iter().take(2).map(|n| format!("    - {}", n)));
            lines.push(format!("    ... and {} more", count - 2));
        }
    }
    lines
}

/// What the user picked in the setup menu
#[derive(Debug, Clone, Default)]
pub struct SetupChoice {
    pub items: Vec<SetupItem>,
    pub plan: EditPlan,
    pub per_file_tags: Vec<CanonicalTag>,
}

impl SetupChoice {
    pub fn has(&self, item: SetupItem) -> bool {
        self.items.contains(&item)
    }
}

pub enum SetupOutcome {
    Selected(SetupChoice),
    Tools,
    Back,
}

pub fn setup_menu<R: BufRead, W: Write>(
    prompt: &mut Prompt<R, W>,
    files: &[AudioFile],
) -> Result<SetupOutcome> {
    prompt.header("Setup Menu - Select Metadata Fields to Edit")?;
    prompt.say(MENU_TEXT)?;

    let items = loop {
        let selection = prompt.ask("Your selection")?;
        match selection.to_lowercase().as_str() {
            "b" => return Ok(SetupOutcome::Back),
            "t" => return Ok(SetupOutcome::Tools),
            _ => {}
        }
        let items = parse_selection(&selection);
        if !items.is_empty() {
            break items;
        }
        prompt.say("Error: No valid tags selected. Try again.")?;
    };

    for item in &items {
        if let SetupItem::Tag(tag @ (CanonicalTag::Cover | CanonicalTag::Lyrics)) = item {
            let distribution = analyze_status(files, *tag);
            let heading = format!("{} Status", tag.label());
            for line in format_distribution(&heading, &distribution, files.len()) {
                prompt.say(line)?;
            }
        }
    }

    let text_tags: Vec<CanonicalTag> = items.iter().filter_map(text_tag_of).collect();
    let analysis = analyze(files, &text_tags);

    let mut choice = SetupChoice {
        items,
        ..SetupChoice::default()
    };
    for tag in text_tags {
        let distribution = analysis.get(&tag).cloned().unwrap_or_default();
        let heading = format!("{} Values", tag.label());
        for line in format_distribution(&heading, &distribution, files.len()) {
            prompt.say(line)?;
        }

        if !tag.is_global_eligible() {
            choice.per_file_tags.push(tag);
            continue;
        }

        prompt.say(format!("\nOptions for {}:", tag.label()))?;
        prompt.say("  [g] Set global value for all files")?;
        prompt.say("  [i] Edit individually per file")?;
        prompt.say("  [s] Skip this tag")?;
        prompt.say("  [b] Back to setup menu")?;
        match prompt.choose("Your choice", &["g", "i", "s", "b"])?.as_str() {
            "b" => return Ok(SetupOutcome::Back),
            "g" => {
                let value = prompt.ask(&format!("Enter new {} value", tag.label()))?;
                if !value.is_empty() {
                    choice.plan.set_global(tag, value)?;
                }
            }
            "i" => choice.per_file_tags.push(tag),
            _ => {}
        }
    }

    Ok(SetupOutcome::Selected(choice))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::prompt::{output_of, scripted};
    use crate::test_support::{sample_jpeg, write_silent_wav};
    use tempfile::TempDir;

    fn album(dir: &TempDir, artists: &[Option<&str>]) -> Vec<AudioFile> {
        artists
            .iter()
            .enumerate()
            .map(|(i, artist)| {
                let path = dir.path().join(format!("{:02}.wav", i + 1));
                write_silent_wav(&path);
                let file = AudioFile::from_path(&path).unwrap();
                if let Some(artist) = artist {
                    let mut session = TagSession::open(&file).unwrap();
                    session.set(CanonicalTag::Artist, artist).unwrap();
                    session.save().unwrap();
                }
                file
            })
            .collect()
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(
            parse_selection("3 x 3 12 99 1"),
            vec![
                SetupItem::Tag(CanonicalTag::Title),
                SetupItem::ConvertWav,
                SetupItem::Tag(CanonicalTag::Cover)
            ]
        );
        assert!(parse_selection("nothing").is_empty());
    }

    #[test]
    fn test_distribution_lines() {
        let dir = TempDir::new().unwrap();
        let files = album(
            &dir,
            &[Some("B"), Some("B"), Some("B"), Some("B"), None, Some("A")],
        );
        let analysis = analyze(&files, &[CanonicalTag::Artist]);
        let lines = format_distribution("Artist Values", &analysis[&CanonicalTag::Artist], 6);

        assert_eq!(lines[0], "\nCurrent Artist Values:");
        assert_eq!(lines[2], "  'A' - 1 file(s) (16.7%)");
        assert_eq!(lines[3], "    - 06.wav");
        assert_eq!(lines[4], "  'B' - 4 file(s) (66.7%)");
        assert_eq!(lines[5], "    - 01.wav");
        assert_eq!(lines[7], "    ... and 2 more");
        assert_eq!(lines[8], "  '[Not Set]' - 1 file(s) (16.7%)");
    }

    #[test]
    fn test_setup_global_and_individual() {
        let dir = TempDir::new().unwrap();
        let files = album(&dir, &[Some("A"), None]);
        let mut prompt = scripted(&["bogus", "4 5 3", "g", "Band", "i"]);

        let outcome = setup_menu(&mut prompt, &files).unwrap();
        let SetupOutcome::Selected(choice) = outcome else {
            panic!("expected a selection");
        };
        let mut expected = EditPlan::default();
        expected.set_global(CanonicalTag::Artist, "Band").unwrap();
        assert_eq!(choice.plan, expected);
        assert_eq!(
            choice.per_file_tags,
            vec![CanonicalTag::Album, CanonicalTag::Title]
        );
        assert!(output_of(prompt).contains("Error: No valid tags selected. Try again."));
    }

    #[test]
    fn test_cover_and_lyrics_status() {
        let dir = TempDir::new().unwrap();
        let files = album(&dir, &[None, None, None]);
        cover::set_cover(&files[0], sample_jpeg(500, 500), "image/jpeg").unwrap();
        cover::set_cover(&files[1], sample_jpeg(40, 40), "image/jpeg").unwrap();
        let mut session = TagSession::open(&files[1]).unwrap();
        session.set(CanonicalTag::Lyrics, "[00:01.00]la").unwrap();
        session.save().unwrap();
        let mut session = TagSession::open(&files[2]).unwrap();
        session.set(CanonicalTag::Lyrics, "just words").unwrap();
        session.save().unwrap();

        let covers = analyze_status(&files, CanonicalTag::Cover);
        assert_eq!(
            covers,
            vec![
                ("500x500".to_string(), vec!["01.wav".to_string()]),
                ("Exists".to_string(), vec!["02.wav".to_string()]),
                ("None".to_string(), vec!["03.wav".to_string()]),
            ]
        );
        let lyrics = analyze_status(&files, CanonicalTag::Lyrics);
        assert_eq!(
            lyrics,
            vec![
                ("None".to_string(), vec!["01.wav".to_string()]),
                ("Synced".to_string(), vec!["02.wav".to_string()]),
                ("Unsynced".to_string(), vec!["03.wav".to_string()]),
            ]
        );

        let mut prompt = scripted(&["1 2"]);
        assert!(matches!(
            setup_menu(&mut prompt, &files).unwrap(),
            SetupOutcome::Selected(_)
        ));
        let out = output_of(prompt);
        assert!(out.contains("Current Cover Status:"));
        assert!(out.contains("  'Synced' - 1 file(s) (33.3%)"));
    }

    #[test]
    fn test_setup_back() {
        let dir = TempDir::new().unwrap();
        let files = album(&dir, &[None]);
        let mut prompt = scripted(&["5", "b"]);
        assert!(matches!(
            setup_menu(&mut prompt, &files).unwrap(),
            SetupOutcome::Back
        ));
        let mut prompt = scripted(&["t"]);
        assert!(matches!(
            setup_menu(&mut prompt, &files).unwrap(),
            SetupOutcome::Tools
        ));
    }
}
