use async_zip::base::read::mem::ZipFileReader;
use async_zip::error::ZipError;
use async_zip::ZipDateTime;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use derive_more::{Display, Error};
use serde::Serialize;
use shopify_admin::ImagePayload;
use std::path::Path;

pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];
pub const EXPECTED_IMAGES: usize = 2;
pub const TIMESTAMP_FALLBACK_WARNING: &str = "timestamps unavailable, alphabetical ordering used";
/// Folder macOS adds to archives for resource forks.
const MACOS_METADATA_FOLDER: &str = "__MACOSX";

#[derive(Debug, Display, Error)]
pub enum ArchiveError {
    #[display("Invalid zip archive: {source}")]
    Invalid { source: ZipError },
    #[display("Unable to read archive {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

impl From<ZipError> for ArchiveError {
    fn from(source: ZipError) -> Self {
        Self::Invalid { source }
    }
}

/// Images of one model, taken from a top-level folder of the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelGroup {
    pub name: String,
    pub images: Vec<ImagePayload>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ArchiveEntry {
    index: usize,
    path: String,
    /// Unix seconds, `None` when the stored date is not a valid calendar date.
    modified: Option<i64>,
}

#[derive(Debug)]
struct Folder {
    name: String,
    entries: Vec<ArchiveEntry>,
}

pub fn is_image(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Top-level folder of `path`, or `None` for entries at the archive root.
fn model_folder(path: &str) -> Option<&str> {
    let (first, _) = path.split_once('/')?;
    let first = first.trim();
    (!first.is_empty()).then_some(first)
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn zip_timestamp(date: &ZipDateTime) -> Option<i64> {
    let month = time::Month::try_from(u8::try_from(date.month()).ok()?).ok()?;
    let day = u8::try_from(date.day()).ok()?;
    let year = i32::try_from(date.year()).ok()?;
    let date_part = time::Date::from_calendar_date(year, month, day).ok()?;
    let time_part = time::Time::from_hms(
        u8::try_from(date.hour()).ok()?,
        u8::try_from(date.minute()).ok()?,
        u8::try_from(date.second()).ok()?,
    )
    .ok()?;
    Some(
        time::PrimitiveDateTime::new(date_part, time_part)
            .assume_utc()
            .unix_timestamp(),
    )
}

fn group_by_folder(entries: Vec<ArchiveEntry>) -> Vec<Folder> {
    let mut folders: Vec<Folder> = Vec::new();
    for entry in entries {
        let Some(name) = model_folder(&entry.path) else {
            log::debug!("Skipping {:?}: not inside a model folder", entry.path);
            continue;
        };
        if name == MACOS_METADATA_FOLDER {
            log::warn!("Skipping {:?}: macOS metadata", entry.path);
            continue;
        }
        match folders.iter_mut().find(|f| f.name == name) {
            Some(folder) => folder.entries.push(entry),
            None => folders.push(Folder {
                name: name.to_string(),
                entries: vec![entry],
            }),
        }
    }
    folders
}

/// Sorts a folder oldest first and keeps at most [`EXPECTED_IMAGES`] entries.
/// Returns the warnings raised on the way.
fn order_entries(name: &str, entries: &mut Vec<ArchiveEntry>) -> Vec<String> {
    let mut warnings = Vec::new();
    if entries.iter().all(|e| e.modified.is_some()) {
        entries.sort_by_key(|e| e.modified);
    } else {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        warnings.push(TIMESTAMP_FALLBACK_WARNING.to_string());
    }
    if entries.len() != EXPECTED_IMAGES {
        warnings.push(format!(
            "folder '{name}' contains {} images (expected: {EXPECTED_IMAGES}); the first {EXPECTED_IMAGES} will be used",
            entries.len()
        ));
        entries.truncate(EXPECTED_IMAGES);
    }
    warnings
}

fn list_entries(zip: &ZipFileReader) -> Vec<ArchiveEntry> {
    let mut out = Vec::new();
    for (index, entry) in zip.file().entries().iter().enumerate() {
        let path = match entry.filename().as_str() {
            Ok(path) => path.to_string(),
            Err(err) => {
                log::warn!("Skipping entry {index} with undecodable name: {err}");
                continue;
            }
        };
        if path.ends_with('/') || matches!(entry.dir(), Ok(true)) {
            continue;
        }
        if !is_image(&path) {
            log::debug!("Skipping {path:?}: not an image");
            continue;
        }
        out.push(ArchiveEntry {
            index,
            modified: zip_timestamp(entry.last_modification_date()),
            path,
        });
    }
    out
}

async fn read_entry(zip: &ZipFileReader, index: usize) -> Result<Vec<u8>, ArchiveError> {
    let mut reader = zip.reader_with_entry(index).await?;
    let mut buf = Vec::new();
    reader.read_to_end_checked(&mut buf).await?;
    Ok(buf)
}

/// Groups the images of a zip archive into one [`ModelGroup`] per top-level
/// folder, in the order the folders first appear in the archive.
pub async fn extract_models(data: Vec<u8>) -> Result<Vec<ModelGroup>, ArchiveError> {
    let zip = ZipFileReader::new(data).await?;
    let folders = group_by_folder(list_entries(&zip));
    let mut models = Vec::with_capacity(folders.len());
    for Folder { name, mut entries } in folders {
        let warnings = order_entries(&name, &mut entries);
        let mut images = Vec::with_capacity(entries.len());
        for (position, entry) in (1u32..).zip(entries.iter()) {
            let raw = read_entry(&zip, entry.index).await?;
            images.push(ImagePayload {
                content: STANDARD.encode(&raw),
                filename: basename(&entry.path).to_string(),
                position,
            });
        }
        for warning in &warnings {
            log::warn!("{name}: {warning}");
        }
        models.push(ModelGroup {
            name,
            images,
            warnings,
        });
    }
    log::info!("Found {} models in archive", models.len());
    Ok(models)
}

pub async fn extract_models_from_path(path: &Path) -> Result<Vec<ModelGroup>, ArchiveError> {
    let data = tokio::fs::read(path).await.map_err(|source| ArchiveError::Io {
        path: path.display().to_string(),
        source,
    })?;
    extract_models(data).await
}
