// lib.rs
//
// imgconv: batch image conversion pipeline
//
// Design goals:
// - Every input format converges on one normalized RGBA8 buffer
// - Per-item failure isolation: one bad file never aborts a batch
// - No silent fallbacks: container substitution and capability gaps
//   are reported as errors, not renamed files
// - Explicit resource lifecycle for every byte buffer the queue owns

pub mod archive;
pub mod codecs;
pub mod engine;
pub mod error;
pub mod formats;
pub mod queue;
pub mod settings;

pub use archive::{archive_converted, build_archive, ArchiveEntry};
pub use codecs::{EncodedImage, ExternalCodec, NativeCodec, PlatformCodec};
pub use engine::PixelBuffer;
pub use error::{ConvertError, Result};
pub use formats::{detect_format, list_output_formats, InputFormatKey, OutputFormatKey};
pub use queue::{
    BlobStore, ConversionQueue, ConvertedArtifact, EncodeCapabilities, ItemStatus, SourceFile,
    WorkItem,
};
pub use settings::{ConversionSettings, SettingsStore, SettingsUpdate};
