//! Cover art extraction, embedding and normalization
//!
//! Every cover that gets embedded from an external source goes through
//! [`prepare_cover`] first, so embedded art is always a 500x500 JPEG.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};

use crate::error::{Result, TagfixError};
use crate::features::dispatch::AudioFile;
use crate::features::tags::{CanonicalTag, CoverArt, TagSession};

/// Edge length of an embedded cover
pub const COVER_SIZE: u32 = 500;

/// Bounding box used when describing a cover in the console
pub const PREVIEW_BOUNDS: (u32, u32) = (1200, 900);

/// Image files accepted as local cover sources
pub const LOCAL_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif"];

/// Common cover art filenames to search for (in priority order)
const COVER_FILENAMES: &[&str] = &["cover", "folder", "front", "albumart", "album", "artwork"];

/// What kind of cover a file carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverStatus {
    None,
    /// A cover of any other size
    Exists,
    /// Already the normalized 500x500 cover
    Standard500,
}

impl CoverStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Exists => "Exists",
            Self::Standard500 => "500x500",
        }
    }
}

fn invalid_image(e: impl ToString) -> TagfixError {
    TagfixError::write(CanonicalTag::Cover, format!("invalid image: {}", e.to_string()))
}

/// First embedded picture of a file
pub fn get_cover(file: &AudioFile) -> Result<Option<CoverArt>> {
    Ok(TagSession::open(file)?.get_cover())
}

/// Replace every embedded picture with one front cover and save
pub fn set_cover(file: &AudioFile, data: Vec<u8>, mime: &str) -> Result<()> {
    let mut session = TagSession::open(file)?;
    session.set_cover(data, mime)?;
    session.save()
}

/// Decode any supported image, scale it to exactly 500x500 and re-encode as JPEG
///
/// The aspect ratio is not preserved.
pub fn prepare_cover(bytes: &[u8]) -> Result<Vec<u8>> {
    let image = image::load_from_memory(bytes).map_err(invalid_image)?;
    let resized = image.resize_exact(COVER_SIZE, COVER_SIZE, FilterType::Lanczos3);
    encode_jpeg(resized)
}

fn encode_jpeg(image: DynamicImage) -> Result<Vec<u8>> {
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut out = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
        .map_err(invalid_image)?;
    Ok(out)
}

/// Pixel dimensions of an encoded image without decoding it fully
pub fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

pub fn cover_status(data: Option<&[u8]>) -> CoverStatus {
    match data {
        None => CoverStatus::None,
        Some(bytes) => match image_dimensions(bytes) {
            Some((COVER_SIZE, COVER_SIZE)) => CoverStatus::Standard500,
            _ => CoverStatus::Exists,
        },
    }
}

/// Size at which a cover is shown, fitted into [`PREVIEW_BOUNDS`] without upscaling
pub fn preview_dimensions(width: u32, height: u32) -> (u32, u32) {
    let (max_w, max_h) = PREVIEW_BOUNDS;
    if width == 0 || height == 0 || (width <= max_w && height <= max_h) {
        return (width, height);
    }
    let scale = f64::min(max_w as f64 / width as f64, max_h as f64 / height as f64);
    (
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
    )
}

fn is_local_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| LOCAL_IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Read an image chosen by the user
pub fn load_local_image(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(TagfixError::NotFound(path.to_path_buf()));
    }
    if !is_local_image(path) {
        return Err(TagfixError::UnsupportedFormat(
            path.extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_else(|| path.display().to_string()),
        ));
    }
    Ok(fs::read(path)?)
}

/// Write the embedded cover next to `out_dir` as `<stem>.jpg`
///
/// Returns `None` when the file has no cover.
pub fn export_cover(file: &AudioFile, out_dir: &Path) -> Result<Option<PathBuf>> {
    let Some(cover) = get_cover(file)? else {
        return Ok(None);
    };

    let data = if cover.mime == "image/jpeg" {
        cover.data
    } else {
        encode_jpeg(image::load_from_memory(&cover.data).map_err(invalid_image)?)?
    };

    fs::create_dir_all(out_dir)?;
    let output = out_dir.join(format!("{}.jpg", file.stem()));
    fs::write(&output, data)?;
    tracing::info!("Exported cover to {:?}", output);
    Ok(Some(output))
}

/// Find an image next to the audio file
///
/// Priority:
/// 1. Image with the same stem as the audio file
/// 2. Common cover filenames in the same directory
pub fn find_folder_cover(file: &AudioFile) -> Option<PathBuf> {
    let entries: Vec<PathBuf> = fs::read_dir(file.dir())
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_local_image(p))
        .collect();

    let stem_of = |p: &Path| {
        p.file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    };

    let own_stem = file.stem().to_lowercase();
    let mut candidates = std::iter::once(own_stem.as_str()).chain(COVER_FILENAMES.iter().copied());
    candidates.find_map(|wanted| {
        let mut matches: Vec<&PathBuf> = entries.iter().filter(|p| stem_of(p) == wanted).collect();
        matches.sort();
        matches.first().map(|p| (*p).clone())
    })
}

/// On-disk cache of downloaded covers, keyed by album
///
/// One lookup per album serves every track of that album.
#[derive(Debug, Clone)]
pub struct CoverCache {
    dir: PathBuf,
}

impl CoverCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache inside the platform cache directory
    pub fn default_location() -> Option<Self> {
        ProjectDirs::from("com", "tagfix", "TagFix").map(|dirs| Self::new(dirs.cache_dir().join("covers")))
    }

    fn entry_path(&self, artist: &str, album: &str) -> PathBuf {
        let key = format!("{}\0{}", artist.trim().to_lowercase(), album.trim().to_lowercase());
        let hash = xxhash_rust::xxh3::xxh3_64(key.as_bytes());
        self.dir.join(format!("cover_{:016x}.jpg", hash))
    }

    pub fn get(&self, artist: &str, album: &str) -> Option<Vec<u8>> {
        fs::read(self.entry_path(artist, album)).ok()
    }

    pub fn put(&self, artist: &str, album: &str, data: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.entry_path(artist, album);
        fs::write(&path, data)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_jpeg, sample_png, write_silent_wav};
    use tempfile::TempDir;

    #[test]
    fn test_prepare_cover_is_square_jpeg() {
        let prepared = prepare_cover(&sample_png(640, 480)).unwrap();
        assert_eq!(image_dimensions(&prepared), Some((500, 500)));
        assert_eq!(image::guess_format(&prepared).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_prepare_cover_rejects_garbage() {
        let err = prepare_cover(b"not an image").unwrap_err();
        assert!(matches!(err, TagfixError::WriteFailure { .. }));
    }

    #[test]
    fn test_cover_status() {
        assert_eq!(cover_status(None), CoverStatus::None);
        assert_eq!(cover_status(Some(&sample_jpeg(500, 500))), CoverStatus::Standard500);
        assert_eq!(cover_status(Some(&sample_jpeg(300, 300))), CoverStatus::Exists);
        assert_eq!(cover_status(Some(b"junk")), CoverStatus::Exists);
    }

    #[test]
    fn test_preview_dimensions() {
        assert_eq!(preview_dimensions(500, 500), (500, 500));
        assert_eq!(preview_dimensions(2400, 1200), (1200, 600));
        assert_eq!(preview_dimensions(1000, 1800), (500, 900));
    }

    #[test]
    fn test_load_local_image_checks_extension() {
        let dir = TempDir::new().unwrap();
        let webp = dir.path().join("cover.webp");
        fs::write(&webp, b"data").unwrap();
        assert!(matches!(
            load_local_image(&webp),
            Err(TagfixError::UnsupportedFormat(_))
        ));

        let png = dir.path().join("cover.PNG");
        fs::write(&png, sample_png(4, 4)).unwrap();
        assert!(load_local_image(&png).is_ok());

        assert!(matches!(
            load_local_image(&dir.path().join("missing.jpg")),
            Err(TagfixError::NotFound(_))
        ));
    }

    #[test]
    fn test_find_folder_cover_priority() {
        let dir = TempDir::new().unwrap();
        let audio = dir.path().join("song.wav");
        fs::write(&audio, b"RIFF").unwrap();
        fs::write(dir.path().join("Folder.jpg"), b"x").unwrap();
        let file = AudioFile::from_path(&audio).unwrap();

        assert_eq!(find_folder_cover(&file), Some(dir.path().join("Folder.jpg")));

        fs::write(dir.path().join("cover.png"), b"x").unwrap();
        assert_eq!(find_folder_cover(&file), Some(dir.path().join("cover.png")));

        fs::write(dir.path().join("song.jpeg"), b"x").unwrap();
        assert_eq!(find_folder_cover(&file), Some(dir.path().join("song.jpeg")));
    }

    #[test]
    fn test_set_and_export_cover() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("track.wav");
        write_silent_wav(&path);
        let file = AudioFile::from_path(&path).unwrap();

        assert!(get_cover(&file).unwrap().is_none());
        assert!(export_cover(&file, dir.path()).unwrap().is_none());

        let jpeg = prepare_cover(&sample_png(64, 32)).unwrap();
        set_cover(&file, jpeg.clone(), "image/jpeg").unwrap();

        let cover = get_cover(&file).unwrap().unwrap();
        assert_eq!(cover.data, jpeg);
        assert_eq!(cover.mime, "image/jpeg");

        let out = export_cover(&file, &dir.path().join("covers")).unwrap().unwrap();
        assert_eq!(out.file_name().unwrap(), "track.jpg");
        assert_eq!(fs::read(out).unwrap(), jpeg);
    }

    #[test]
    fn test_cover_cache() {
        let dir = TempDir::new().unwrap();
        let cache = CoverCache::new(dir.path().join("cache"));
        assert!(cache.get("Artist", "Album").is_none());

        cache.put("Artist", "Album", b"jpeg").unwrap();
        assert_eq!(cache.get(" artist ", "ALBUM").unwrap(), b"jpeg");
        assert!(cache.get("Artist", "Other").is_none());
    }
}
