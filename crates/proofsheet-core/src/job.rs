//! Export jobs
//!
//! Wraps [`crate::render`] with what an export worker needs around it: the
//! JSON job message, asset storage, and a completion notification. Storage
//! and notification are traits so workers can plug in any backend.
//!
//! # Flow
//!
//! 1. Parse wire settings into [`ExportSettings`] (fetching the mark if any)
//! 2. Fetch the source asset
//! 3. Render
//! 4. Store under `exports/{userId}/{imageId}/{exportId}.{ext}`
//! 5. Notify `SUCCEEDED` or `FAILED`

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::RenderError;
use crate::pipeline::render;
use crate::resolve::{BudgetStatus, ResolverConfig};
use crate::watermark::{WatermarkAsset, WatermarkSpec};
use crate::{ColorSpace, EditParameters, ExportSettings, MetadataPolicy, OutputFormat};

const BYTES_PER_MIB: f64 = 1_048_576.0;

/// Key of an object in an [`AssetStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetRef(String);

impl AssetRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failures reported by storage backends.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(AssetRef),

    #[error("Invalid asset key '{0}'")]
    InvalidKey(String),

    #[error("Storage failure for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Object storage for sources, marks and finished exports.
pub trait AssetStore: Send + Sync {
    fn fetch(&self, asset: &AssetRef) -> Result<Vec<u8>, AssetError>;

    /// Persist `bytes` under `key` and return where they landed.
    fn store(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<AssetRef, AssetError>;
}

/// Receives completion events. Delivery is fire-and-forget.
pub trait CompletionNotifier: Send + Sync {
    fn notify(&self, event: &CompletionEvent);
}

/// Broadcast when an export finishes either way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    pub export_id: String,
    pub image_id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub completion: Completion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Completion {
    #[serde(rename_all = "camelCase")]
    Succeeded {
        location: AssetRef,
        byte_length: u64,
        width: u32,
        height: u32,
        budget_met: bool,
    },
    #[serde(rename_all = "camelCase")]
    Failed { code: String, message: String },
}

/// An export request as it arrives on the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportJob {
    pub export_id: String,
    pub image_id: String,
    pub user_id: String,
    pub source_key: String,
    #[serde(default)]
    pub edits: EditsMessage,
    #[serde(default)]
    pub settings: ExportSettingsMessage,
}

impl ExportJob {
    /// Storage key of the finished export.
    pub fn export_key(&self, format: OutputFormat) -> String {
        format!(
            "exports/{}/{}/{}.{}",
            self.user_id,
            self.image_id,
            self.export_id,
            format.extension()
        )
    }
}

/// Edits as sent by clients.
///
/// Temperature and tint are accepted so existing clients keep working, but
/// they are not applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditsMessage {
    pub exposure: Option<f32>,
    pub contrast: Option<f32>,
    pub saturation: Option<f32>,
    pub temperature: Option<f32>,
    pub tint: Option<f32>,
}

impl EditsMessage {
    pub fn to_edits(&self) -> EditParameters {
        for (name, value) in [("temperature", self.temperature), ("tint", self.tint)] {
            if value.is_some_and(|v| v != 0.0) {
                tracing::warn!(edit = name, "edit is not supported and was ignored");
            }
        }
        EditParameters {
            exposure: self.exposure,
            contrast: self.contrast,
            saturation: self.saturation,
        }
    }
}

/// Watermark settings as sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkMessage {
    pub asset_key: String,
    #[serde(default)]
    pub anchor: Option<String>,
    #[serde(default)]
    pub opacity: Option<f32>,
    #[serde(default)]
    pub scale: Option<f32>,
    #[serde(default)]
    pub margin: Option<f32>,
}

/// Export settings as sent by clients: loosely typed, checked on conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportSettingsMessage {
    pub max_pixels: Option<i64>,
    pub max_file_size_bytes: Option<i64>,
    /// Legacy budget in MiB; ignored when `maxFileSizeBytes` is present
    #[serde(rename = "maxFileSizeMB")]
    pub max_file_size_mb: Option<f64>,
    pub quality: Option<i64>,
    pub format: Option<String>,
    pub color_space: Option<String>,
    pub metadata: Option<String>,
    pub watermark: Option<WatermarkMessage>,
    pub resolver: Option<ResolverConfig>,
}

impl ExportSettingsMessage {
    /// Check and convert into [`ExportSettings`].
    ///
    /// `mark` must be the decoded asset named by `watermark.assetKey` when a
    /// watermark is requested.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat`, `UnsupportedColorSpace` or
    /// `InvalidParameter` for values the renderer cannot honor.
    pub fn to_settings(&self, mark: Option<Arc<WatermarkAsset>>) -> Result<ExportSettings, RenderError> {
        let mut settings = ExportSettings::default();

        if let Some(format) = &self.format {
            settings.format = format.parse::<OutputFormat>()?;
        }
        if let Some(space) = &self.color_space {
            settings.color_space = space.parse::<ColorSpace>()?;
        }
        if let Some(policy) = &self.metadata {
            settings.metadata_policy = policy
                .parse::<MetadataPolicy>()
                .map_err(|reason| RenderError::invalid("metadata", reason))?;
        }
        if let Some(quality) = self.quality {
            settings.quality = u8::try_from(quality)
                .ok()
                .filter(|q| (1..=100).contains(q))
                .ok_or_else(|| RenderError::invalid("quality", format!("{quality} is outside 1..=100")))?;
        }
        settings.max_pixels = self.max_pixels.map(|v| positive("maxPixels", v)).transpose()?;
        settings.max_file_size_bytes = self.byte_budget()?;
        if let Some(resolver) = self.resolver {
            settings.resolver = resolver;
        }

        if let Some(wm) = &self.watermark {
            let asset = mark.ok_or_else(|| {
                RenderError::invalid("watermark.assetKey", format!("asset '{}' was not loaded", wm.asset_key))
            })?;
            let mut spec = WatermarkSpec::new(asset);
            if let Some(anchor) = &wm.anchor {
                spec.anchor = anchor
                    .parse()
                    .map_err(|reason| RenderError::invalid("watermark.anchor", reason))?;
            }
            spec.opacity = wm.opacity.unwrap_or(spec.opacity);
            spec.scale = wm.scale.unwrap_or(spec.scale);
            spec.margin = wm.margin.unwrap_or(spec.margin);
            settings.watermark = Some(spec);
        }

        settings.validate()?;
        Ok(settings)
    }

    fn byte_budget(&self) -> Result<Option<u64>, RenderError> {
        if let Some(bytes) = self.max_file_size_bytes {
            return positive("maxFileSizeBytes", bytes).map(Some);
        }
        match self.max_file_size_mb {
            None => Ok(None),
            Some(mb) if mb.is_finite() && mb > 0.0 => {
                let bytes = (mb * BYTES_PER_MIB).round() as u64;
                if bytes == 0 {
                    return Err(RenderError::invalid("maxFileSizeMB", format!("{mb} is below one byte")));
                }
                Ok(Some(bytes))
            }
            Some(mb) => Err(RenderError::invalid("maxFileSizeMB", format!("{mb} must be positive"))),
        }
    }
}

fn positive(parameter: &'static str, value: i64) -> Result<u64, RenderError> {
    u64::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| RenderError::invalid(parameter, format!("{value} must be positive")))
}

/// Why an export job failed.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Asset(#[from] AssetError),
}

impl JobError {
    /// Stable code for completion events.
    pub fn code(&self) -> String {
        match self {
            JobError::Render(err) => err.kind().to_string(),
            JobError::Asset(_) => "ASSET".to_string(),
        }
    }
}

/// Where a finished export was stored and what it contains.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredExport {
    pub location: AssetRef,
    pub content_type: &'static str,
    pub byte_length: u64,
    pub width: u32,
    pub height: u32,
    pub quality: Option<u8>,
    pub budget: BudgetStatus,
}

/// Result of one [`run_export`] call.
#[derive(Debug)]
pub struct JobReport {
    pub export_id: String,
    pub result: Result<StoredExport, JobError>,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Decoded watermark assets, shared across jobs by key.
#[derive(Debug, Default)]
pub struct WatermarkCache {
    entries: Mutex<HashMap<String, Arc<WatermarkAsset>>>,
}

impl WatermarkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached mark for `key`, fetching and decoding it on a miss.
    ///
    /// # Errors
    ///
    /// Returns `JobError::Asset` if the fetch fails and `JobError::Render`
    /// (decode) if the bytes are not an image.
    pub fn get_or_load<S>(&self, store: &S, key: &str) -> Result<Arc<WatermarkAsset>, JobError>
    where
        S: AssetStore + ?Sized,
    {
        if let Some(asset) = self.lock().get(key) {
            return Ok(Arc::clone(asset));
        }

        let bytes = store.fetch(&AssetRef::new(key))?;
        let asset = Arc::new(WatermarkAsset::from_bytes(&bytes).map_err(RenderError::from)?);
        tracing::debug!(key, width = asset.dimensions().0, height = asset.dimensions().1, "loaded watermark");

        Ok(Arc::clone(self.lock().entry(key.to_string()).or_insert(asset)))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<WatermarkAsset>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Runs export jobs against one store and notifier.
pub struct ExportRunner<'a, S: ?Sized, N: ?Sized> {
    store: &'a S,
    notifier: &'a N,
    marks: WatermarkCache,
}

impl<'a, S, N> ExportRunner<'a, S, N>
where
    S: AssetStore + ?Sized,
    N: CompletionNotifier + ?Sized,
{
    pub fn new(store: &'a S, notifier: &'a N) -> Self {
        Self {
            store,
            notifier,
            marks: WatermarkCache::new(),
        }
    }

    /// Render, store and announce one export. Never panics on bad input;
    /// every failure is reported through the notifier and the returned report.
    pub fn run(&self, job: &ExportJob) -> JobReport {
        let span = tracing::info_span!(
            "export",
            export_id = %job.export_id,
            image_id = %job.image_id,
            user_id = %job.user_id
        );
        let _enter = span.enter();

        let result = self.execute(job);
        let completion = match &result {
            Ok(stored) => {
                tracing::info!(location = %stored.location, bytes = stored.byte_length, "export stored");
                Completion::Succeeded {
                    location: stored.location.clone(),
                    byte_length: stored.byte_length,
                    width: stored.width,
                    height: stored.height,
                    budget_met: stored.budget.is_met(),
                }
            }
            Err(err) => {
                tracing::error!(error = %err, code = %err.code(), "export failed");
                Completion::Failed {
                    code: err.code(),
                    message: err.to_string(),
                }
            }
        };

        self.notifier.notify(&CompletionEvent {
            export_id: job.export_id.clone(),
            image_id: job.image_id.clone(),
            user_id: job.user_id.clone(),
            completion,
        });

        JobReport {
            export_id: job.export_id.clone(),
            result,
        }
    }

    fn execute(&self, job: &ExportJob) -> Result<StoredExport, JobError> {
        let mark = job
            .settings
            .watermark
            .as_ref()
            .map(|wm| self.marks.get_or_load(self.store, &wm.asset_key))
            .transpose()?;
        let settings = job.settings.to_settings(mark)?;
        let edits = job.edits.to_edits();

        let source = self.store.fetch(&AssetRef::new(job.source_key.as_str()))?;
        let result = render(&source, &edits, &settings)?;

        let key = job.export_key(settings.format);
        let location = self.store.store(&key, &result.bytes, result.content_type)?;

        Ok(StoredExport {
            location,
            content_type: result.content_type,
            byte_length: result.byte_len(),
            width: result.width,
            height: result.height,
            quality: result.quality,
            budget: result.budget,
        })
    }
}

/// Run a single export with a fresh watermark cache.
pub fn run_export<S, N>(job: &ExportJob, store: &S, notifier: &N) -> JobReport
where
    S: AssetStore + ?Sized,
    N: CompletionNotifier + ?Sized,
{
    ExportRunner::new(store, notifier).run(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{ChannelLayout, Image};
    use crate::encode::encode;
    use crate::error::ErrorKind;
    use crate::metadata::MetadataSet;

    #[derive(Default)]
    struct MemoryStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MemoryStore {
        fn with(objects: &[(&str, Vec<u8>)]) -> Self {
            let store = Self::default();
            for (key, bytes) in objects {
                store.objects.lock().unwrap().insert(key.to_string(), bytes.clone());
            }
            store
        }

        fn get(&self, key: &str) -> Option<Vec<u8>> {
            self.objects.lock().unwrap().get(key).cloned()
        }
    }

    impl AssetStore for MemoryStore {
        fn fetch(&self, asset: &AssetRef) -> Result<Vec<u8>, AssetError> {
            self.get(asset.as_str())
                .ok_or_else(|| AssetError::NotFound(asset.clone()))
        }

        fn store(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<AssetRef, AssetError> {
            self.objects.lock().unwrap().insert(key.to_string(), bytes.to_vec());
            Ok(AssetRef::new(key))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        events: Mutex<Vec<CompletionEvent>>,
    }

    impl CompletionNotifier for RecordingNotifier {
        fn notify(&self, event: &CompletionEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn png(width: u32, height: u32, layout: ChannelLayout, value: u8) -> Vec<u8> {
        let len = (width * height) as usize * layout.channels();
        let img = Image::new(width, height, layout, vec![value; len]).unwrap();
        encode(&img, &MetadataSet::new(), OutputFormat::Png, 90).unwrap()
    }

    fn job(settings: &str) -> ExportJob {
        serde_json::from_str(&format!(
            r#"{{
                "exportId": "exp-1",
                "imageId": "img-1",
                "userId": "user-1",
                "sourceKey": "originals/img-1.png",
                "edits": {{"exposure": 10, "temperature": 15}},
                "settings": {settings}
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_parse_job_message() {
        let job = job(r#"{"format": "PNG", "maxFileSizeMB": 2, "metadata": "STRIP_GPS"}"#);
        assert_eq!(job.export_id, "exp-1");
        assert_eq!(job.edits.temperature, Some(15.0));
        assert_eq!(job.export_key(OutputFormat::Png), "exports/user-1/img-1/exp-1.png");

        let settings = job.settings.to_settings(None).unwrap();
        assert_eq!(settings.format, OutputFormat::Png);
        assert_eq!(settings.max_file_size_bytes, Some(2 * 1_048_576));
        assert_eq!(settings.metadata_policy, MetadataPolicy::StripGps);
        assert_eq!(settings.quality, 90);
    }

    #[test]
    fn test_edits_drop_temperature_and_tint() {
        let edits = job("{}").edits.to_edits();
        assert_eq!(edits.exposure, Some(10.0));
        assert_eq!(edits.contrast, None);
    }

    #[test]
    fn test_settings_errors() {
        let parse = |json: &str| {
            serde_json::from_str::<ExportSettingsMessage>(json)
                .unwrap()
                .to_settings(None)
                .unwrap_err()
        };

        assert_eq!(parse(r#"{"format": "GIF"}"#).kind(), ErrorKind::UnsupportedFormat);
        assert_eq!(parse(r#"{"colorSpace": "CMYK"}"#).kind(), ErrorKind::UnsupportedColorSpace);
        assert_eq!(parse(r#"{"colorSpace": "PROPHOTO_RGB"}"#).kind(), ErrorKind::UnsupportedColorSpace);
        assert_eq!(parse(r#"{"quality": 0}"#).kind(), ErrorKind::InvalidParameter);
        assert_eq!(parse(r#"{"quality": 300}"#).kind(), ErrorKind::InvalidParameter);
        assert_eq!(parse(r#"{"maxPixels": -5}"#).kind(), ErrorKind::InvalidParameter);
        assert_eq!(parse(r#"{"maxFileSizeMB": -1}"#).kind(), ErrorKind::InvalidParameter);
        assert_eq!(parse(r#"{"metadata": "SOME"}"#).kind(), ErrorKind::InvalidParameter);
        assert_eq!(
            parse(r#"{"watermark": {"assetKey": "marks/logo.png"}}"#).kind(),
            ErrorKind::InvalidParameter
        );
    }

    #[test]
    fn test_bytes_take_precedence_over_mib() {
        let message: ExportSettingsMessage =
            serde_json::from_str(r#"{"maxFileSizeBytes": 1000, "maxFileSizeMB": 5}"#).unwrap();
        assert_eq!(message.to_settings(None).unwrap().max_file_size_bytes, Some(1000));
    }

    #[test]
    fn test_run_export_success() {
        let store = MemoryStore::with(&[
            ("originals/img-1.png", png(40, 30, ChannelLayout::Rgb, 100)),
            ("marks/logo.png", png(8, 4, ChannelLayout::Rgba, 200)),
        ]);
        let notifier = RecordingNotifier::default();
        let job = job(
            r#"{"format": "JPEG", "maxPixels": 300, "watermark": {"assetKey": "marks/logo.png", "anchor": "TOP_LEFT"}}"#,
        );

        let report = run_export(&job, &store, &notifier);
        let stored = report.result.unwrap();
        assert_eq!(stored.location.as_str(), "exports/user-1/img-1/exp-1.jpeg");
        assert_eq!((stored.width, stored.height), (20, 15));
        assert_eq!(stored.content_type, "image/jpeg");

        let bytes = store.get("exports/user-1/img-1/exp-1.jpeg").unwrap();
        assert_eq!(bytes.len() as u64, stored.byte_length);

        let events = notifier.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].completion, Completion::Succeeded { budget_met: true, .. }));
    }

    #[test]
    fn test_run_export_missing_source() {
        let store = MemoryStore::default();
        let notifier = RecordingNotifier::default();

        let report = run_export(&job("{}"), &store, &notifier);
        assert!(!report.is_success());
        assert!(matches!(report.result, Err(JobError::Asset(AssetError::NotFound(_)))));

        let events = notifier.events.lock().unwrap();
        assert_eq!(
            events[0].completion,
            Completion::Failed {
                code: "ASSET".to_string(),
                message: "Asset not found: originals/img-1.png".to_string(),
            }
        );
    }

    #[test]
    fn test_run_export_render_failure() {
        let store = MemoryStore::with(&[("originals/img-1.png", b"not an image".to_vec())]);
        let notifier = RecordingNotifier::default();

        let report = run_export(&job("{}"), &store, &notifier);
        assert_eq!(report.result.unwrap_err().code(), "DECODE");
        assert!(store.get("exports/user-1/img-1/exp-1.jpeg").is_none());
    }

    #[test]
    fn test_watermark_cache_shares_assets() {
        let store = MemoryStore::with(&[("marks/logo.png", png(4, 4, ChannelLayout::Rgba, 10))]);
        let cache = WatermarkCache::new();

        let a = cache.get_or_load(&store, "marks/logo.png").unwrap();
        let b = cache.get_or_load(&store, "marks/logo.png").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(cache.get_or_load(&store, "marks/missing.png").is_err());
    }

    #[test]
    fn test_completion_event_json() {
        let event = CompletionEvent {
            export_id: "e".to_string(),
            image_id: "i".to_string(),
            user_id: "u".to_string(),
            completion: Completion::Succeeded {
                location: AssetRef::new("exports/u/i/e.png"),
                byte_length: 10,
                width: 2,
                height: 1,
                budget_met: true,
            },
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "SUCCEEDED");
        assert_eq!(json["exportId"], "e");
        assert_eq!(json["byteLength"], 10);
        assert_eq!(json["location"], "exports/u/i/e.png");
    }
}
