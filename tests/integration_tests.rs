// tests/integration_tests.rs
//
// End-to-end tests through the public API with the real native codec:
// files in, converted artifacts and archives out.

use imgconv::{
    archive_converted, ConversionQueue, ConversionSettings, EncodeCapabilities, ItemStatus,
    NativeCodec, OutputFormatKey, SourceFile,
};
use imgconv::settings::{
    load_settings, save_settings, MemorySettingsStore, SettingsUpdate,
};
use std::io::Read;

// Helper to build an encoded test image of the given format.
fn encoded_test_image(format: image::ImageFormat, translucent: bool) -> Vec<u8> {
    let alpha = if translucent { 128 } else { 255 };
    let img = image::RgbaImage::from_fn(64, 48, |x, y| {
        image::Rgba([(x * 4) as u8, (y * 5) as u8, 128, alpha])
    });
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), format)
        .unwrap();
    buf
}

fn source(name: &str, media_type: &str, bytes: Vec<u8>) -> SourceFile {
    SourceFile {
        name: name.to_string(),
        media_type: media_type.to_string(),
        bytes,
        last_modified: None,
    }
}

fn settings(format: OutputFormatKey) -> ConversionSettings {
    ConversionSettings {
        output_format: format,
        ..ConversionSettings::default()
    }
}

#[test]
fn test_png_to_jpeg_batch() {
    let codec = NativeCodec;
    let caps = EncodeCapabilities::probe(&codec);

    let mut queue = ConversionQueue::new(settings(OutputFormatKey::Jpeg));
    queue
        .add_files(vec![
            source(
                "a.png",
                "image/png",
                encoded_test_image(image::ImageFormat::Png, false),
            ),
            source(
                "b.png",
                "image/png",
                encoded_test_image(image::ImageFormat::Png, false),
            ),
        ])
        .unwrap();

    queue.convert_all(&codec, None, &caps).unwrap();

    for item in queue.items() {
        assert_eq!(item.status, ItemStatus::Done, "{}", item.name);
        assert_eq!(item.original_dimensions, Some((64, 48)));
        let artifact = item.converted.as_ref().unwrap();
        assert_eq!(artifact.media_type, "image/jpeg");
        assert!(artifact.file_name.ends_with(".jpg"));

        let bytes = queue.converted_bytes(item.id).unwrap();
        // JPEG SOI marker.
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
    }
}

#[test]
fn test_translucent_png_to_jpeg_warns_about_flattening() {
    let codec = NativeCodec;
    let caps = EncodeCapabilities::probe(&codec);

    let mut queue = ConversionQueue::new(settings(OutputFormatKey::Jpeg));
    queue
        .add_files(vec![source(
            "glass.png",
            "image/png",
            encoded_test_image(image::ImageFormat::Png, true),
        )])
        .unwrap();
    queue.convert_all(&codec, None, &caps).unwrap();

    let item = &queue.items()[0];
    assert_eq!(item.status, ItemStatus::Done);
    assert!(item.warnings.iter().any(|w| w.contains("flattened")));
}

#[test]
fn test_jpeg_to_png_with_resize() {
    let codec = NativeCodec;
    let caps = EncodeCapabilities::probe(&codec);

    let mut queue = ConversionQueue::new(ConversionSettings {
        resize_enabled: true,
        resize_width: Some(32),
        lock_aspect: true,
        ..settings(OutputFormatKey::Png)
    });
    queue
        .add_files(vec![source(
            "photo.jpg",
            "image/jpeg",
            encoded_test_image(image::ImageFormat::Jpeg, false),
        )])
        .unwrap();
    queue.convert_all(&codec, None, &caps).unwrap();

    let item = &queue.items()[0];
    let artifact = item.converted.as_ref().unwrap();
    assert!(artifact.resized);
    assert_eq!((artifact.width, artifact.height), (32, 24));

    let bytes = queue.converted_bytes(item.id).unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (32, 24));
}

#[test]
fn test_png_to_bmp_round_trips_through_image_crate() {
    let codec = NativeCodec;
    let caps = EncodeCapabilities::probe(&codec);

    let mut queue = ConversionQueue::new(settings(OutputFormatKey::Bmp));
    queue
        .add_files(vec![source(
            "a.png",
            "image/png",
            encoded_test_image(image::ImageFormat::Png, false),
        )])
        .unwrap();
    queue.convert_all(&codec, None, &caps).unwrap();

    let item = &queue.items()[0];
    assert_eq!(item.status, ItemStatus::Done);
    let bytes = queue.converted_bytes(item.id).unwrap();
    assert_eq!(&bytes[0..2], b"BM");

    let decoded = image::load_from_memory(&bytes).unwrap().into_rgba8();
    assert_eq!(decoded.dimensions(), (64, 48));
    // Opaque source survives exactly through the 24-bit container.
    assert_eq!(decoded.get_pixel(3, 2).0, [12, 10, 128, 255]);
}

#[test]
fn test_png_to_ico_is_decodable() {
    let codec = NativeCodec;
    let caps = EncodeCapabilities::probe(&codec);

    let mut queue = ConversionQueue::new(settings(OutputFormatKey::Ico));
    queue
        .add_files(vec![source(
            "icon.png",
            "image/png",
            encoded_test_image(image::ImageFormat::Png, false),
        )])
        .unwrap();
    queue.convert_all(&codec, None, &caps).unwrap();

    let item = &queue.items()[0];
    let artifact = item.converted.as_ref().unwrap();
    assert_eq!(artifact.media_type, "image/x-icon");
    // 64x48 fits the icon limit, but is not square.
    assert!(item.warnings.iter().any(|w| w.contains("square")));

    let bytes = queue.converted_bytes(item.id).unwrap();
    let decoded = image::load_from_memory_with_format(&bytes, image::ImageFormat::Ico).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (64, 48));
}

#[test]
fn test_webp_output_when_supported() {
    let codec = NativeCodec;
    let caps = EncodeCapabilities::probe(&codec);
    assert!(caps.webp, "native codec bundles a webp encoder");

    let mut queue = ConversionQueue::new(settings(OutputFormatKey::Webp));
    queue
        .add_files(vec![source(
            "a.png",
            "image/png",
            encoded_test_image(image::ImageFormat::Png, false),
        )])
        .unwrap();
    queue.convert_all(&codec, None, &caps).unwrap();

    let bytes = queue.converted_bytes(queue.items()[0].id).unwrap();
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WEBP");
}

#[test]
fn test_archive_of_converted_batch() {
    let codec = NativeCodec;
    let caps = EncodeCapabilities::probe(&codec);

    let mut queue = ConversionQueue::new(settings(OutputFormatKey::Png));
    queue
        .add_files(vec![
            // Same stem from different folders collides after conversion.
            source(
                "photo.jpg",
                "image/jpeg",
                encoded_test_image(image::ImageFormat::Jpeg, false),
            ),
            source(
                "photo.bmp",
                "image/bmp",
                encoded_test_image(image::ImageFormat::Bmp, false),
            ),
            source("junk.xyz", "application/octet-stream", vec![0, 1, 2]),
        ])
        .unwrap();
    queue.convert_all(&codec, None, &caps).unwrap();

    let zip_bytes = archive_converted(&queue).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();

    // Two converted entries plus the manifest; the failed item is excluded.
    assert_eq!(archive.len(), 3);
    assert!(archive.by_name("photo.png").is_ok());
    assert!(archive.by_name("photo (2).png").is_ok());

    let mut manifest = String::new();
    archive
        .by_name("manifest.txt")
        .unwrap()
        .read_to_string(&mut manifest)
        .unwrap();
    assert_eq!(manifest.lines().count(), 2);
    for line in manifest.lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1], "image/png");
        assert!(fields[2].parse::<u64>().unwrap() > 0);
    }
}

#[test]
fn test_archive_written_to_disk_reopens() {
    let codec = NativeCodec;
    let caps = EncodeCapabilities::probe(&codec);

    let mut queue = ConversionQueue::new(settings(OutputFormatKey::Png));
    queue
        .add_files(vec![source(
            "a.jpg",
            "image/jpeg",
            encoded_test_image(image::ImageFormat::Jpeg, false),
        )])
        .unwrap();
    queue.convert_all(&codec, None, &caps).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("converted.zip");
    std::fs::write(&path, archive_converted(&queue).unwrap()).unwrap();

    let file = std::fs::File::open(&path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    assert_eq!(archive.len(), 2);
    assert!(archive.by_name("a.png").is_ok());
}

#[test]
fn test_settings_persist_across_sessions() {
    let mut store = MemorySettingsStore::new();

    let mut queue = ConversionQueue::default();
    queue
        .update_settings(SettingsUpdate {
            output_format: Some(OutputFormatKey::Webp),
            quality: Some(0.6),
            ..SettingsUpdate::default()
        })
        .unwrap();
    save_settings(&mut store, queue.settings());

    let restored = load_settings(&store);
    assert_eq!(restored.output_format, OutputFormatKey::Webp);
    assert_eq!(restored.quality, 0.6);

    let queue = ConversionQueue::new(restored);
    assert_eq!(queue.settings().output_format, OutputFormatKey::Webp);
}

#[test]
fn test_quality_affects_jpeg_size() {
    let codec = NativeCodec;
    let caps = EncodeCapabilities::probe(&codec);
    let png = encoded_test_image(image::ImageFormat::Png, false);

    let mut sizes = Vec::new();
    for quality in [0.3_f32, 0.95] {
        let mut queue = ConversionQueue::new(ConversionSettings {
            quality,
            ..settings(OutputFormatKey::Jpeg)
        });
        queue
            .add_files(vec![source("a.png", "image/png", png.clone())])
            .unwrap();
        queue.convert_all(&codec, None, &caps).unwrap();
        sizes.push(queue.items()[0].converted.as_ref().unwrap().size);
    }
    assert!(sizes[0] < sizes[1], "low quality should compress harder: {sizes:?}");
}
