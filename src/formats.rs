// src/formats.rs
//
// Static format registry: which inputs are recognized, which outputs can be
// produced, and the capability flags attached to each.

use crate::codecs::PlatformCodec;
use serde::{Deserialize, Serialize};

/// Recognized input format keys.
///
/// Closed set: the decode pipeline dispatches over this enum, so every
/// supported input kind is enumerable and finite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormatKey {
    Png,
    Jpeg,
    Webp,
    Bmp,
    Gif,
    Tiff,
    Ico,
    Avif,
    Svg,
    Heic,
}

/// Producible output format keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatKey {
    Png,
    Jpeg,
    Webp,
    Avif,
    Bmp,
    Ico,
}

/// Runtime capability an output format may depend on. Support is a property
/// of the running platform, probed once per session and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeRequirement {
    WebpEncode,
    AvifEncode,
}

/// One entry of the static input catalog.
#[derive(Debug, Clone, Copy)]
pub struct InputFormat {
    pub key: InputFormatKey,
    pub label: &'static str,
    pub extensions: &'static [&'static str],
    pub media_types: &'static [&'static str],
    /// Advisory note for formats with known decode limitations.
    pub limitations: Option<&'static str>,
}

/// One entry of the static output catalog.
#[derive(Debug, Clone, Copy)]
pub struct OutputFormat {
    pub key: OutputFormatKey,
    pub label: &'static str,
    pub media_type: &'static str,
    pub extension: &'static str,
    pub lossy: bool,
    pub supports_alpha: bool,
    pub runtime_requirement: Option<RuntimeRequirement>,
}

/// Output descriptor annotated with the probed per-session support flag.
#[derive(Debug, Clone, Copy)]
pub struct OutputFormatSupport {
    pub format: &'static OutputFormat,
    pub supported: bool,
}

pub static INPUT_FORMATS: &[InputFormat] = &[
    InputFormat {
        key: InputFormatKey::Png,
        label: "PNG",
        extensions: &["png"],
        media_types: &["image/png"],
        limitations: None,
    },
    InputFormat {
        key: InputFormatKey::Jpeg,
        label: "JPG / JPEG",
        extensions: &["jpg", "jpeg"],
        media_types: &["image/jpeg"],
        limitations: None,
    },
    InputFormat {
        key: InputFormatKey::Webp,
        label: "WEBP",
        extensions: &["webp"],
        media_types: &["image/webp"],
        limitations: None,
    },
    InputFormat {
        key: InputFormatKey::Bmp,
        label: "BMP",
        extensions: &["bmp"],
        media_types: &["image/bmp"],
        limitations: None,
    },
    InputFormat {
        key: InputFormatKey::Gif,
        label: "GIF",
        extensions: &["gif"],
        media_types: &["image/gif"],
        limitations: Some("Animated GIFs are converted using the first frame only."),
    },
    InputFormat {
        key: InputFormatKey::Tiff,
        label: "TIFF",
        extensions: &["tif", "tiff"],
        media_types: &["image/tiff"],
        limitations: Some("TIFF decoding depends on platform support."),
    },
    InputFormat {
        key: InputFormatKey::Ico,
        label: "ICO",
        extensions: &["ico"],
        media_types: &["image/x-icon", "image/vnd.microsoft.icon"],
        limitations: Some("ICO decoding depends on platform support."),
    },
    InputFormat {
        key: InputFormatKey::Avif,
        label: "AVIF",
        extensions: &["avif"],
        media_types: &["image/avif"],
        limitations: Some("AVIF decoding depends on platform support."),
    },
    InputFormat {
        key: InputFormatKey::Svg,
        label: "SVG",
        extensions: &["svg"],
        media_types: &["image/svg+xml"],
        limitations: Some("SVG is rasterized to a bitmap before conversion."),
    },
    InputFormat {
        key: InputFormatKey::Heic,
        label: "HEIC / HEIF",
        extensions: &["heic", "heif"],
        media_types: &["image/heic", "image/heif"],
        limitations: Some("HEIC/HEIF is decoded through an external codec before conversion."),
    },
];

pub static OUTPUT_FORMATS: &[OutputFormat] = &[
    OutputFormat {
        key: OutputFormatKey::Png,
        label: "PNG",
        media_type: "image/png",
        extension: "png",
        lossy: false,
        supports_alpha: true,
        runtime_requirement: None,
    },
    OutputFormat {
        key: OutputFormatKey::Jpeg,
        label: "JPG / JPEG",
        media_type: "image/jpeg",
        extension: "jpg",
        lossy: true,
        supports_alpha: false,
        runtime_requirement: None,
    },
    OutputFormat {
        key: OutputFormatKey::Webp,
        label: "WEBP",
        media_type: "image/webp",
        extension: "webp",
        lossy: true,
        supports_alpha: true,
        runtime_requirement: Some(RuntimeRequirement::WebpEncode),
    },
    OutputFormat {
        key: OutputFormatKey::Avif,
        label: "AVIF",
        media_type: "image/avif",
        extension: "avif",
        lossy: true,
        supports_alpha: true,
        runtime_requirement: Some(RuntimeRequirement::AvifEncode),
    },
    OutputFormat {
        key: OutputFormatKey::Bmp,
        label: "BMP",
        media_type: "image/bmp",
        extension: "bmp",
        lossy: false,
        supports_alpha: false,
        runtime_requirement: None,
    },
    OutputFormat {
        key: OutputFormatKey::Ico,
        label: "ICO",
        media_type: "image/x-icon",
        extension: "ico",
        lossy: false,
        supports_alpha: true,
        runtime_requirement: None,
    },
];

/// Lowercased extension of a file name, without the dot. Empty when absent.
pub fn file_extension(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(idx) => file_name[idx + 1..].to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Detect the input format for a queued file, matching first by file
/// extension and then by the declared media type. Returns None for
/// unrecognized inputs; the queue treats that as a hard per-item failure,
/// never a default.
pub fn detect_format(file_name: &str, declared_media_type: &str) -> Option<&'static InputFormat> {
    let ext = file_extension(file_name);
    if !ext.is_empty() {
        if let Some(format) = INPUT_FORMATS
            .iter()
            .find(|f| f.extensions.contains(&ext.as_str()))
        {
            return Some(format);
        }
    }

    let media = declared_media_type.trim().to_ascii_lowercase();
    if media.is_empty() {
        return None;
    }
    INPUT_FORMATS
        .iter()
        .find(|f| f.media_types.contains(&media.as_str()))
}

/// Look up the static input descriptor for a key.
pub fn input_format(key: InputFormatKey) -> &'static InputFormat {
    INPUT_FORMATS
        .iter()
        .find(|f| f.key == key)
        .expect("every InputFormatKey has a catalog entry")
}

/// Look up the static output descriptor for a key.
pub fn output_format(key: OutputFormatKey) -> &'static OutputFormat {
    OUTPUT_FORMATS
        .iter()
        .find(|f| f.key == key)
        .expect("every OutputFormatKey has a catalog entry")
}

/// Annotate the output catalog with per-session support flags. Formats
/// without a runtime requirement are unconditionally supported; the rest are
/// probed against the platform codec.
pub fn list_output_formats(codec: &dyn PlatformCodec) -> Vec<OutputFormatSupport> {
    OUTPUT_FORMATS
        .iter()
        .map(|format| {
            let supported = match format.runtime_requirement {
                None => true,
                Some(_) => codec.probe_encode(format.media_type),
            };
            OutputFormatSupport { format, supported }
        })
        .collect()
}

/// Derive the output file name by replacing the source extension with the
/// target format's canonical extension.
pub fn build_output_file_name(input_name: &str, output_extension: &str) -> String {
    let base = match input_name.rfind('.') {
        Some(idx) => &input_name[..idx],
        None => input_name,
    };
    format!("{base}.{output_extension}")
}

/// Deduplicated accept list (media types then dotted extensions) for file
/// pickers offered by the shell.
pub fn accept_list() -> Vec<String> {
    let mut entries = Vec::new();
    for format in INPUT_FORMATS {
        for media in format.media_types {
            if !entries.iter().any(|e| e == media) {
                entries.push((*media).to_string());
            }
        }
    }
    for format in INPUT_FORMATS {
        for ext in format.extensions {
            let dotted = format!(".{ext}");
            if !entries.contains(&dotted) {
                entries.push(dotted);
            }
        }
    }
    entries
}

/// Human-readable byte size for result listings.
pub fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let units = ["KB", "MB", "GB"];
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < units.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if value >= 10.0 {
        format!("{value:.1} {}", units[unit])
    } else {
        format!("{value:.2} {}", units[unit])
    }
}
