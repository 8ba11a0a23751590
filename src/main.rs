//! tagfix - audio metadata editor
//! Batch tag editing, covers, lyrics and conversion from an interactive console

mod api;
mod console;
mod error;
mod features;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use features::session::Session;
use features::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Theme {
    Dark,
    Light,
    /// No colours
    Plain,
}

#[derive(Debug, Parser)]
#[command(name = "tagfix", version, about = "Audio metadata editor")]
struct Cli {
    /// File or folder to open, skipping the first prompt
    path: Option<String>,

    /// Settings file to use instead of the default location
    #[arg(long, value_name = "FILE", env = "TAGFIX_CONFIG")]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Console colour theme (defaults to the saved setting)
    #[arg(long, value_enum)]
    theme: Option<Theme>,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "tagfix=info,warn",
        _ => "tagfix=debug,info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

fn load_settings(config: Option<&PathBuf>) -> (Settings, Option<PathBuf>) {
    let path = config.cloned().or_else(Settings::file_path);
    let settings = match &path {
        Some(path) if path.exists() => Settings::load_from_file(path).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable settings {:?}: {}", path, e);
            Settings::default()
        }),
        _ => Settings::default(),
    };
    (settings, path)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let (mut settings, settings_path) = load_settings(cli.config.as_ref());
    let accent = match cli.theme {
        Some(Theme::Plain) => None,
        Some(theme) => {
            settings.display.dark_mode = theme == Theme::Dark;
            console::accent_for(settings.display.dark_mode)
        }
        None => console::accent_for(settings.display.dark_mode),
    };
    tracing::debug!("Settings loaded from {:?}", settings_path);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let mut session = Session::new(settings, settings_path, Some(runtime.handle().clone()));
    // Ctrl-C outside a batch ends the program like an exit from the menu
    let _interrupts = session.watch_interrupts(|| {
        println!("\nGoodbye!");
        std::process::exit(0);
    });

    let stdin = io::stdin();
    let mut prompt = console::Prompt::new(stdin.lock(), io::stdout()).with_accent(accent);
    console::run(&mut prompt, &mut session, cli.path)?;

    session.persist();
    Ok(())
}

/// Fixtures shared by the unit tests
#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Cursor;
    use std::path::Path;

    use image::{DynamicImage, ImageFormat, RgbImage};

    /// A short silent 16-bit stereo WAV
    pub fn write_silent_wav(path: &Path) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..4410 {
            writer.write_sample(0i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    /// Eight silent MPEG-1 Layer III frames at 128 kbps, 44.1 kHz
    pub fn write_silent_mp3(path: &Path) {
        let mut frame = vec![0u8; 417];
        frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
        std::fs::write(path, frame.repeat(8)).unwrap();
    }

    /// A FLAC stream holding only its STREAMINFO block
    pub fn write_empty_flac(path: &Path) {
        let mut bytes = b"fLaC".to_vec();
        // Last metadata block, STREAMINFO, 34 bytes
        bytes.extend_from_slice(&[0x80, 0x00, 0x00, 0x22]);
        bytes.extend_from_slice(&4096u16.to_be_bytes());
        bytes.extend_from_slice(&4096u16.to_be_bytes());
        bytes.extend_from_slice(&[0; 6]);
        let packed: u64 = (44_100u64 << 44) | (1 << 41) | (15 << 36);
        bytes.extend_from_slice(&packed.to_be_bytes());
        bytes.extend_from_slice(&[0; 16]);
        std::fs::write(path, bytes).unwrap();
    }

    fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
        encode(width, height, ImageFormat::Png)
    }

    pub fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
        encode(width, height, ImageFormat::Jpeg)
    }
}
