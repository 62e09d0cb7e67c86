//! Local-filesystem collaborators for the export runner.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use proofsheet_core::job::{AssetError, AssetRef, AssetStore, CompletionEvent, CompletionNotifier};

/// Reads assets from one directory and writes exports under another.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    assets: PathBuf,
    exports: PathBuf,
}

impl DirectoryStore {
    pub fn new(assets: impl Into<PathBuf>, exports: impl Into<PathBuf>) -> Self {
        Self {
            assets: assets.into(),
            exports: exports.into(),
        }
    }
}

/// Join a slash-separated key onto `root`, refusing anything that would
/// escape it.
fn resolve_key(root: &Path, key: &str) -> Result<PathBuf, AssetError> {
    let relative = Path::new(key);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if key.is_empty() || escapes {
        return Err(AssetError::InvalidKey(key.to_string()));
    }
    Ok(root.join(relative))
}

impl AssetStore for DirectoryStore {
    fn fetch(&self, asset: &AssetRef) -> Result<Vec<u8>, AssetError> {
        let path = resolve_key(&self.assets, asset.as_str())?;
        fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => AssetError::NotFound(asset.clone()),
            _ => AssetError::Io {
                key: asset.to_string(),
                source,
            },
        })
    }

    fn store(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<AssetRef, AssetError> {
        let path = resolve_key(&self.exports, key)?;
        let io_err = |source| AssetError::Io {
            key: key.to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&path, bytes).map_err(io_err)?;

        tracing::debug!(path = %path.display(), content_type, bytes = bytes.len(), "wrote export");
        Ok(AssetRef::new(key))
    }
}

/// Emits completion events as structured log records.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl CompletionNotifier for LogNotifier {
    fn notify(&self, event: &CompletionEvent) {
        match serde_json::to_string(event) {
            Ok(json) => tracing::info!(target: "proofsheet::completion", event = %json, "export completion"),
            Err(err) => tracing::warn!(error = %err, export_id = %event.export_id, "failed to serialize completion event"),
        }
    }
}
