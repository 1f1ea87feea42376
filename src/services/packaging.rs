// src/services/packaging.rs
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use log::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::errors::BoothError;
use crate::models::{AspectRatio, EncodedImage, GenerationSlot, SlotStatus};
use crate::services::image_processor::ImageProcessor;

pub const NOTHING_TO_PACKAGE: &str = "No successful images to download yet.";

const UNSAFE_IN_NAMES: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Lowercases and turns each run of whitespace or path-unsafe characters
/// into a single hyphen, so a slug never escapes the output directory.
pub fn filename_slug(variant_id: &str) -> String {
    let mut slug = String::with_capacity(variant_id.len());
    let mut in_space = false;
    for c in variant_id.chars() {
        if c.is_whitespace() || c.is_control() || UNSAFE_IN_NAMES.contains(&c) {
            if !in_space {
                slug.push('-');
            }
            in_space = true;
        } else {
            slug.extend(c.to_lowercase());
            in_space = false;
        }
    }
    slug
}

/// `position` is 1-based among the successful slots.
pub fn album_entry_name(prefix: &str, variant_id: &str, position: usize) -> String {
    format!("{}-{}-{}.png", prefix, filename_slug(variant_id), position)
}

pub fn album_file_name(prefix: &str) -> String {
    format!("{}-album.zip", prefix)
}

pub fn single_download_name(prefix: &str, variant_id: &str) -> String {
    format!("{}-{}.png", prefix, filename_slug(variant_id))
}

#[derive(Debug, Clone)]
pub struct Album {
    pub file_name: String,
    pub bytes: Bytes,
    pub entries: Vec<String>,
}

/// A single ready-to-save output.
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub image: EncodedImage,
}

/// Zips every successful slot. `Ok(None)` when there is nothing to package.
pub fn build_album(slots: &[GenerationSlot], prefix: &str) -> Result<Option<Album>, BoothError> {
    let successes: Vec<(&str, &EncodedImage)> = slots
        .iter()
        .filter_map(|slot| match (slot.status, &slot.image) {
            (SlotStatus::Success, Some(image)) => Some((slot.variant_id.as_str(), image)),
            _ => None,
        })
        .collect();
    if successes.is_empty() {
        return Ok(None);
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut entries = Vec::with_capacity(successes.len());

    for (i, (variant_id, image)) in successes.into_iter().enumerate() {
        let name = album_entry_name(prefix, variant_id, i + 1);
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| BoothError::Packaging(format!("Failed to add {}: {}", name, e)))?;
        writer
            .write_all(&image.data)
            .map_err(|e| BoothError::Packaging(format!("Failed to write {}: {}", name, e)))?;
        entries.push(name);
    }

    let cursor = writer
        .finish()
        .map_err(|e| BoothError::Packaging(format!("Failed to finish archive: {}", e)))?;

    let album = Album {
        file_name: album_file_name(prefix),
        bytes: Bytes::from(cursor.into_inner()),
        entries,
    };
    info!(
        "Packaged {} image(s) into {} ({} bytes)",
        album.entries.len(),
        album.file_name,
        album.bytes.len()
    );
    Ok(Some(album))
}

/// One output for saving: the watermarked image as-is, or a framed card
/// when a ratio is given. `label` is printed on the card when present.
pub fn single_download(
    processor: &ImageProcessor,
    variant_id: &str,
    image: &EncodedImage,
    ratio: Option<AspectRatio>,
    label: Option<&str>,
) -> Result<Download, BoothError> {
    let image = match ratio {
        Some(ratio) => processor.framed_card(image, ratio, label)?,
        None => image.clone(),
    };
    Ok(Download {
        file_name: single_download_name(&processor.branding().file_prefix, variant_id),
        image,
    })
}

/// Writes through a `.part` sibling and renames it into place, so a failed
/// write never leaves a partial file under `path`.
pub async fn write_output(path: &Path, data: &[u8]) -> Result<(), BoothError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            BoothError::Storage(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);

    let written = match tokio::fs::write(&tmp, data).await {
        Ok(()) => tokio::fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove {}: {}", tmp.display(), cleanup);
            }
        }
        return Err(BoothError::Storage(format!(
            "Failed to write {}: {}",
            path.display(),
            e
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn slot(id: &str, status: SlotStatus, data: Option<&[u8]>) -> GenerationSlot {
        GenerationSlot {
            variant_id: id.to_string(),
            status,
            image: data.map(|d| EncodedImage::png(d.to_vec())),
            error: None,
        }
    }

    #[test]
    fn slug_lowercases_and_hyphenates_whitespace_runs() {
        assert_eq!(filename_slug("Glamour Shot"), "glamour-shot");
        assert_eq!(filename_slug("Old  Money\tLook"), "old-money-look");
        assert_eq!(filename_slug("1980s"), "1980s");
    }

    #[test]
    fn slug_never_contains_path_separators() {
        assert_eq!(filename_slug("a\\b"), "a-b");
        assert_eq!(filename_slug("../../etc/passwd"), "..-..-etc-passwd");
        assert_eq!(filename_slug("Red / Carpet"), "red-carpet");

        let entry = album_entry_name("themebooth", "/etc/x", 1);
        assert_eq!(entry, "themebooth--etc-x-1.png");
        let name = single_download_name("themebooth", "..\\..\\win");
        assert!(!name.contains('/') && !name.contains('\\'));
        assert_eq!(std::path::Path::new(&name).components().count(), 1);
    }

    #[test]
    fn names_follow_the_prefix_convention() {
        assert_eq!(album_entry_name("themebooth", "Red Carpet", 2), "themebooth-red-carpet-2.png");
        assert_eq!(single_download_name("themebooth", "Look 1"), "themebooth-look-1.png");
        assert_eq!(album_file_name("themebooth"), "themebooth-album.zip");
    }

    #[test]
    fn empty_batch_produces_no_album() {
        let slots = vec![
            slot("a", SlotStatus::Failed, None),
            slot("b", SlotStatus::Pending, None),
        ];
        assert!(build_album(&slots, "themebooth").unwrap().is_none());
    }

    #[test]
    fn album_numbers_entries_among_successes() {
        let slots = vec![
            slot("1970s", SlotStatus::Success, Some(b"one")),
            slot("1980s", SlotStatus::Failed, None),
            slot("1990s", SlotStatus::Success, Some(b"three")),
        ];
        let album = build_album(&slots, "themebooth").unwrap().unwrap();
        assert_eq!(
            album.entries,
            vec!["themebooth-1970s-1.png", "themebooth-1990s-2.png"]
        );

        let mut archive = zip::ZipArchive::new(Cursor::new(album.bytes.to_vec())).unwrap();
        assert_eq!(archive.len(), 2);
        let mut contents = Vec::new();
        archive
            .by_name("themebooth-1990s-2.png")
            .unwrap()
            .read_to_end(&mut contents)
            .unwrap();
        assert_eq!(contents, b"three");
    }

    #[tokio::test]
    async fn write_output_leaves_no_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("themebooth-1970s.png");
        write_output(&path, b"png").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"png");
        assert!(!dir.path().join("nested").join("themebooth-1970s.png.part").exists());
    }

    #[tokio::test]
    async fn failed_write_reports_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in the way makes the rename fail.
        let path = dir.path().join("taken");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("file"), b"x").unwrap();
        let err = write_output(&path, b"png").await.unwrap_err();
        assert!(matches!(err, BoothError::Storage(_)));
        assert!(!dir.path().join("taken.part").exists());
    }
}
