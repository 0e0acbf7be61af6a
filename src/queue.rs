// src/queue.rs
//
// Sequential conversion queue: work items, the blob store that owns their
// byte buffers, per-session encode capabilities, and the conversion pass
// itself. Items fail individually; one bad file never aborts the pass.

use crate::codecs::{ExternalCodec, PlatformCodec};
use crate::engine::{decoder, encoder};
use crate::error::{ConvertError, Result};
use crate::formats::{detect_format, output_format, InputFormatKey, OutputFormatKey, RuntimeRequirement};
use crate::settings::{ConversionSettings, SettingsUpdate};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Lifecycle of one queued file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Ready,
    Converting,
    Done,
    Error,
}

/// One file handed to the queue, with the metadata its origin declared.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
    /// Origin-reported modification time, milliseconds since the epoch.
    pub last_modified: Option<u64>,
}

/// A finished conversion attached to a work item. The bytes live in the blob
/// store under `handle` and are freed when the item is removed, reset, or the
/// queue is cleared.
#[derive(Debug, Clone)]
pub struct ConvertedArtifact {
    pub handle: BlobHandle,
    pub media_type: String,
    pub file_name: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub resized: bool,
}

/// One entry in the conversion queue.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub id: u64,
    pub name: String,
    pub media_type: String,
    pub size: u64,
    pub last_modified: Option<u64>,
    /// Detected at add time; `None` marks the item as unrecognized, which
    /// surfaces as a per-item error during the pass.
    pub input_format: Option<InputFormatKey>,
    pub status: ItemStatus,
    pub error: Option<ConvertError>,
    pub warnings: Vec<String>,
    /// Decoded source dimensions, known after the first successful decode.
    pub original_dimensions: Option<(u32, u32)>,
    pub original_handle: BlobHandle,
    pub converted: Option<ConvertedArtifact>,
}

pub type BlobHandle = u64;

/// Owner of every byte buffer the queue references. Acquire hands out a
/// handle; release frees the bytes. Handles model explicitly-revoked
/// resources, so dropping a handle without releasing it leaks until `clear`.
#[derive(Debug, Default)]
pub struct BlobStore {
    entries: HashMap<BlobHandle, Arc<Vec<u8>>>,
    next_handle: BlobHandle,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self, bytes: Vec<u8>) -> BlobHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.entries.insert(handle, Arc::new(bytes));
        handle
    }

    pub fn release(&mut self, handle: BlobHandle) {
        self.entries.remove(&handle);
    }

    pub fn get(&self, handle: BlobHandle) -> Option<Arc<Vec<u8>>> {
        self.entries.get(&handle).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Per-session encode support, probed once at startup. Formats without a
/// runtime requirement are always available.
#[derive(Debug, Clone, Copy)]
pub struct EncodeCapabilities {
    pub webp: bool,
    pub avif: bool,
}

impl EncodeCapabilities {
    /// Probe the platform codec with a 1x1 encode per conditional format.
    pub fn probe(codec: &dyn PlatformCodec) -> Self {
        let caps = Self {
            webp: codec.probe_encode("image/webp"),
            avif: codec.probe_encode("image/avif"),
        };
        info!(webp = caps.webp, avif = caps.avif, "probed encode capabilities");
        caps
    }

    pub fn supports(&self, key: OutputFormatKey) -> bool {
        match output_format(key).runtime_requirement {
            None => true,
            Some(RuntimeRequirement::WebpEncode) => self.webp,
            Some(RuntimeRequirement::AvifEncode) => self.avif,
        }
    }
}

/// The conversion queue. All mutation goes through `&mut self`; a pass runs
/// items strictly in queue order.
#[derive(Debug)]
pub struct ConversionQueue {
    items: Vec<WorkItem>,
    store: BlobStore,
    settings: ConversionSettings,
    selected: Option<u64>,
    is_converting: bool,
    next_id: u64,
}

impl Default for ConversionQueue {
    fn default() -> Self {
        Self::new(ConversionSettings::default())
    }
}

impl ConversionQueue {
    pub fn new(settings: ConversionSettings) -> Self {
        Self {
            items: Vec::new(),
            store: BlobStore::new(),
            settings,
            selected: None,
            is_converting: false,
            next_id: 1,
        }
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn item(&self, id: u64) -> Option<&WorkItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn settings(&self) -> &ConversionSettings {
        &self.settings
    }

    pub fn selected(&self) -> Option<u64> {
        self.selected
    }

    pub fn is_converting(&self) -> bool {
        self.is_converting
    }

    pub fn blob_store(&self) -> &BlobStore {
        &self.store
    }

    /// Converted bytes of a finished item.
    pub fn converted_bytes(&self, id: u64) -> Option<Arc<Vec<u8>>> {
        let artifact = self.item(id)?.converted.as_ref()?;
        self.store.get(artifact.handle)
    }

    /// Append files to the queue. Unrecognized files are queued too; their
    /// failure is reported per item when a pass runs, not swallowed at add
    /// time. Returns the ids assigned, in input order.
    pub fn add_files(&mut self, files: Vec<SourceFile>) -> Result<Vec<u64>> {
        if self.is_converting {
            return Err(ConvertError::ConversionInProgress);
        }

        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            let id = self.next_id;
            self.next_id += 1;

            let input_format = detect_format(&file.name, &file.media_type).map(|f| f.key);
            if input_format.is_none() {
                warn!(name = %file.name, media_type = %file.media_type, "unrecognized input queued");
            }

            let size = file.bytes.len() as u64;
            let original_handle = self.store.acquire(file.bytes);

            self.items.push(WorkItem {
                id,
                name: file.name,
                media_type: file.media_type,
                size,
                last_modified: file.last_modified,
                input_format,
                status: ItemStatus::Ready,
                error: None,
                warnings: Vec::new(),
                original_dimensions: None,
                original_handle,
                converted: None,
            });
            ids.push(id);
        }

        if self.selected.is_none() {
            self.selected = ids.first().copied();
        }
        Ok(ids)
    }

    /// Remove one item and free every buffer it owns.
    pub fn remove_item(&mut self, id: u64) -> Result<()> {
        if self.is_converting {
            return Err(ConvertError::ConversionInProgress);
        }
        let Some(idx) = self.items.iter().position(|item| item.id == id) else {
            return Ok(());
        };
        let item = self.items.remove(idx);
        self.store.release(item.original_handle);
        if let Some(artifact) = item.converted {
            self.store.release(artifact.handle);
        }
        if self.selected == Some(id) {
            self.selected = self.items.first().map(|item| item.id);
        }
        Ok(())
    }

    /// Drop every item and free all buffers.
    pub fn clear(&mut self) -> Result<()> {
        if self.is_converting {
            return Err(ConvertError::ConversionInProgress);
        }
        self.items.clear();
        self.store.clear();
        self.selected = None;
        Ok(())
    }

    /// Move `source_id` to the position currently held by `target_id`,
    /// shifting the items between them. Unknown ids are ignored.
    pub fn reorder(&mut self, source_id: u64, target_id: u64) -> Result<()> {
        if self.is_converting {
            return Err(ConvertError::ConversionInProgress);
        }
        if source_id == target_id {
            return Ok(());
        }
        let Some(from) = self.items.iter().position(|item| item.id == source_id) else {
            return Ok(());
        };
        let Some(to) = self.items.iter().position(|item| item.id == target_id) else {
            return Ok(());
        };
        let item = self.items.remove(from);
        self.items.insert(to, item);
        Ok(())
    }

    /// Select an item for detail display. Unknown ids clear the selection.
    pub fn select_item(&mut self, id: u64) {
        self.selected = self.items.iter().find(|item| item.id == id).map(|i| i.id);
    }

    /// Apply a partial settings update. Existing results are reset eagerly:
    /// they were produced under the old settings and are stale the moment the
    /// settings change, whether or not another pass ever runs.
    pub fn update_settings(&mut self, update: SettingsUpdate) -> Result<()> {
        if self.is_converting {
            return Err(ConvertError::ConversionInProgress);
        }
        update.apply(&mut self.settings);
        self.reset_results();
        Ok(())
    }

    /// Reset every item to Ready and free converted buffers. Original bytes
    /// stay in the store so the items can be converted again.
    fn reset_results(&mut self) {
        for item in &mut self.items {
            if let Some(artifact) = item.converted.take() {
                self.store.release(artifact.handle);
            }
            item.status = ItemStatus::Ready;
            item.error = None;
            item.warnings.clear();
        }
    }

    /// Run one conversion pass over every queued item, in order.
    pub fn convert_all(
        &mut self,
        codec: &dyn PlatformCodec,
        external: Option<&dyn ExternalCodec>,
        capabilities: &EncodeCapabilities,
    ) -> Result<()> {
        self.convert_all_with(codec, external, capabilities, |_| {})
    }

    /// `convert_all` with a per-item progress callback, invoked after each
    /// item reaches Done or Error.
    pub fn convert_all_with(
        &mut self,
        codec: &dyn PlatformCodec,
        external: Option<&dyn ExternalCodec>,
        capabilities: &EncodeCapabilities,
        mut on_item: impl FnMut(&WorkItem),
    ) -> Result<()> {
        if self.is_converting {
            return Err(ConvertError::ConversionInProgress);
        }
        self.is_converting = true;
        self.reset_results();

        info!(
            items = self.items.len(),
            format = ?self.settings.output_format,
            "starting conversion pass"
        );

        for idx in 0..self.items.len() {
            self.items[idx].status = ItemStatus::Converting;

            match self.convert_one(idx, codec, external, capabilities) {
                Ok(()) => {
                    self.items[idx].status = ItemStatus::Done;
                }
                Err(err) => {
                    let item = &mut self.items[idx];
                    warn!(name = %item.name, error = %err, "item failed");
                    item.status = ItemStatus::Error;
                    item.error = Some(err);
                }
            }
            on_item(&self.items[idx]);
        }

        self.is_converting = false;
        info!(
            done = self.items.iter().filter(|i| i.status == ItemStatus::Done).count(),
            failed = self.items.iter().filter(|i| i.status == ItemStatus::Error).count(),
            "conversion pass finished"
        );
        Ok(())
    }

    fn convert_one(
        &mut self,
        idx: usize,
        codec: &dyn PlatformCodec,
        external: Option<&dyn ExternalCodec>,
        capabilities: &EncodeCapabilities,
    ) -> Result<()> {
        let target_format = self.settings.output_format;
        if !capabilities.supports(target_format) {
            return Err(ConvertError::unsupported_capability(
                output_format(target_format).label,
            ));
        }

        let (input_format, name, handle) = {
            let item = &self.items[idx];
            let format = item
                .input_format
                .ok_or_else(|| ConvertError::unrecognized_input(item.name.clone()))?;
            (format, item.name.clone(), item.original_handle)
        };

        let bytes = self
            .store
            .get(handle)
            .ok_or_else(|| ConvertError::decode_failed("source bytes are no longer available"))?;

        let decoded = decoder::decode(&bytes, input_format, codec, external)?;
        self.items[idx].original_dimensions =
            Some((decoded.pixels.width(), decoded.pixels.height()));
        self.items[idx].warnings.extend(decoded.warnings);

        let encoded = encoder::encode(&decoded.pixels, &self.settings, &name, codec)?;
        self.items[idx].warnings.extend(encoded.warnings);

        let size = encoded.bytes.len() as u64;
        let converted_handle = self.store.acquire(encoded.bytes);
        self.items[idx].converted = Some(ConvertedArtifact {
            handle: converted_handle,
            media_type: encoded.media_type,
            file_name: encoded.output_name,
            size,
            width: encoded.width,
            height: encoded.height,
            resized: encoded.resized,
        });

        info!(name = %name, size, "item converted");
        Ok(())
    }
}
