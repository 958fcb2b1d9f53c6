//! Registry of generated call-graph artifacts.
//!
//! Maps `call-graph://<name>` identifiers to files on disk. The registry only
//! holds a path reference: the file itself belongs to the filesystem and is
//! read again on every resolution.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

/// URI scheme prefix for generated call graphs.
pub const CALL_GRAPH_SCHEME: &str = "call-graph://";

/// MIME type of generated call graphs.
pub const PNG_MIME: &str = "image/png";

/// A registered artifact. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub identifier: String,
    pub backing_path: PathBuf,
    pub mime_type: String,
}

/// Bytes and MIME type of a resolved resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceContent {
    pub uri: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Process-wide mapping of identifier to record.
///
/// Constructed once at startup and shared by the dispatcher and the resolver.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    records: Mutex<BTreeMap<String, ResourceRecord>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, BTreeMap<String, ResourceRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `path` and returns its identifier.
    ///
    /// The identifier is `call-graph://<file name>`. Registering the same path
    /// again yields the same identifier. When the name is already taken by a
    /// different path, a numeric suffix is added before the extension
    /// (`call_graph-2.png`, `call_graph-3.png`, ...), so an earlier graph is
    /// never silently replaced.
    pub fn register(&self, path: &Path, mime_type: &str) -> String {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "graph".to_string());

        let mut records = self.records();
        let mut attempt = 1;
        let identifier = loop {
            let candidate = format!("{}{}", CALL_GRAPH_SCHEME, suffixed_name(&file_name, attempt));
            match records.get(&candidate) {
                Some(existing) if existing.backing_path == path => {
                    debug!(%candidate, "resource already registered");
                    return candidate;
                }
                Some(_) => attempt += 1,
                None => break candidate,
            }
        };

        records.insert(
            identifier.clone(),
            ResourceRecord {
                identifier: identifier.clone(),
                backing_path: path.to_path_buf(),
                mime_type: mime_type.to_string(),
            },
        );
        info!(%identifier, path = %path.display(), "registered resource");
        identifier
    }

    /// Looks up a record without touching the backing file.
    pub fn get(&self, identifier: &str) -> Option<ResourceRecord> {
        self.records().get(identifier).cloned()
    }

    /// Returns every registered record, ordered by identifier.
    pub fn list(&self) -> Vec<ResourceRecord> {
        self.records().values().cloned().collect()
    }

    /// Reads the backing file of `identifier`.
    ///
    /// Returns `None` if the identifier is unknown or the file is missing or
    /// unreadable.
    pub fn resolve(&self, identifier: &str) -> Option<ResourceContent> {
        let record = self.get(identifier)?;
        match fs::read(&record.backing_path) {
            Ok(bytes) => Some(ResourceContent {
                uri: record.identifier,
                mime_type: record.mime_type,
                bytes,
            }),
            Err(e) => {
                debug!(
                    %identifier,
                    path = %record.backing_path.display(),
                    error = %e,
                    "backing file unreadable"
                );
                None
            }
        }
    }
}

fn suffixed_name(file_name: &str, attempt: usize) -> String {
    if attempt == 1 {
        return file_name.to_string();
    }
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-{}.{}", stem, attempt, ext),
        _ => format!("{}-{}", file_name, attempt),
    }
}
