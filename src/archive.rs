// src/archive.rs
//
// Zip archive of converted results: one entry per finished item plus a
// manifest listing every entry. Duplicate output names are disambiguated
// with a " (n)" suffix so no entry silently overwrites another.

use crate::error::{ConvertError, Result};
use crate::queue::{ConversionQueue, ItemStatus};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::sync::Arc;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Deflate level used for every entry.
const COMPRESSION_LEVEL: i64 = 6;

/// Name of the generated listing entry, always written last.
pub const MANIFEST_NAME: &str = "manifest.txt";

/// One file to be placed in the archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Arc<Vec<u8>>,
}

/// Build a zip archive from the given entries, in order, followed by a
/// manifest with one `name<TAB>media type<TAB>size` line per entry.
pub fn build_archive(entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
    if entries.is_empty() {
        return Err(ConvertError::EmptyArchive);
    }

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL));

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut used_names = HashSet::new();
    let mut manifest_lines = Vec::with_capacity(entries.len());

    for entry in entries {
        let name = dedupe_file_name(&entry.file_name, &used_names);
        used_names.insert(name.clone());

        writer
            .start_file(name.as_str(), options)
            .map_err(|e| ConvertError::archive_failed(format!("failed to add {name}: {e}")))?;
        writer
            .write_all(&entry.bytes)
            .map_err(|e| ConvertError::archive_failed(format!("failed to write {name}: {e}")))?;

        manifest_lines.push(format!(
            "{name}\t{}\t{}",
            entry.media_type,
            entry.bytes.len()
        ));
    }

    writer
        .start_file(MANIFEST_NAME, options)
        .map_err(|e| ConvertError::archive_failed(format!("failed to add manifest: {e}")))?;
    writer
        .write_all(manifest_lines.join("\n").as_bytes())
        .map_err(|e| ConvertError::archive_failed(format!("failed to write manifest: {e}")))?;

    let cursor = writer
        .finish()
        .map_err(|e| ConvertError::archive_failed(format!("failed to finalize archive: {e}")))?;

    let bytes = cursor.into_inner();
    info!(entries = entries.len(), size = bytes.len(), "archive built");
    Ok(bytes)
}

/// Archive every finished item of the queue, in queue order.
pub fn archive_converted(queue: &ConversionQueue) -> Result<Vec<u8>> {
    let mut entries = Vec::new();
    for item in queue.items() {
        if item.status != ItemStatus::Done {
            continue;
        }
        let Some(artifact) = &item.converted else {
            continue;
        };
        let bytes = queue.converted_bytes(item.id).ok_or_else(|| {
            ConvertError::archive_failed("converted bytes are no longer available")
        })?;
        entries.push(ArchiveEntry {
            file_name: artifact.file_name.clone(),
            media_type: artifact.media_type.clone(),
            bytes,
        });
    }
    build_archive(&entries)
}

/// Insert " (n)" before the extension until the name is unique, counting
/// from 2.
fn dedupe_file_name(name: &str, used: &HashSet<String>) -> String {
    if !used.contains(name) {
        return name.to_string();
    }
    let (base, ext) = match name.rfind('.') {
        Some(idx) => (&name[..idx], &name[idx..]),
        None => (name, ""),
    };
    let mut counter = 2u32;
    loop {
        let candidate = format!("{base} ({counter}){ext}");
        if !used.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn entry(name: &str, media_type: &str, bytes: &[u8]) -> ArchiveEntry {
        ArchiveEntry {
            file_name: name.to_string(),
            media_type: media_type.to_string(),
            bytes: Arc::new(bytes.to_vec()),
        }
    }

    fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Vec<u8> {
        let mut file = archive.by_name(name).unwrap();
        let mut out = Vec::new();
        file.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_empty_archive_is_an_error() {
        assert_eq!(build_archive(&[]), Err(ConvertError::EmptyArchive));
    }

    #[test]
    fn test_archive_round_trips_entries_and_manifest() {
        let bytes = build_archive(&[
            entry("a.png", "image/png", b"AAAA"),
            entry("b.jpg", "image/jpeg", b"BBBBBB"),
        ])
        .unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);

        assert_eq!(read_entry(&mut archive, "a.png"), b"AAAA");
        assert_eq!(read_entry(&mut archive, "b.jpg"), b"BBBBBB");

        let manifest = String::from_utf8(read_entry(&mut archive, MANIFEST_NAME)).unwrap();
        assert_eq!(
            manifest,
            "a.png\timage/png\t4\nb.jpg\timage/jpeg\t6"
        );
    }

    #[test]
    fn test_duplicate_names_are_suffixed() {
        let bytes = build_archive(&[
            entry("photo.png", "image/png", b"1"),
            entry("photo.png", "image/png", b"22"),
            entry("photo.png", "image/png", b"333"),
            entry("noext", "image/png", b"4"),
            entry("noext", "image/png", b"5"),
        ])
        .unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(read_entry(&mut archive, "photo.png"), b"1");
        assert_eq!(read_entry(&mut archive, "photo (2).png"), b"22");
        assert_eq!(read_entry(&mut archive, "photo (3).png"), b"333");
        assert_eq!(read_entry(&mut archive, "noext"), b"4");
        assert_eq!(read_entry(&mut archive, "noext (2)"), b"5");

        let manifest = String::from_utf8(read_entry(&mut archive, MANIFEST_NAME)).unwrap();
        assert!(manifest.contains("photo (2).png\timage/png\t2"));
    }

    #[test]
    fn test_entries_are_deflated() {
        let bytes = build_archive(&[entry("a.bin", "application/octet-stream", &[7u8; 4096])])
            .unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let file = archive.by_name("a.bin").unwrap();
        assert_eq!(file.compression(), CompressionMethod::Deflated);
        assert!(file.compressed_size() < file.size());
    }
}
