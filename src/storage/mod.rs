//! Persistence of extracted text.
//!
//! The extraction pipeline never talks to storage itself. Callers hand the
//! finished text to a [`TextStore`], which returns a publicly resolvable
//! locator for it.
//!
//! * [`gcs::GcsStore`]: Google Cloud Storage, used by the HTTP service
//! * [`MemoryStore`]: in-process map, used by tests and dry runs

pub mod auth;
pub mod gcs;

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::Mutex;

pub use gcs::GcsStore;

/// Destination for extracted text.
#[async_trait]
pub trait TextStore: Send + Sync {
    /// Store `text` under `destination` and return its public URL.
    ///
    /// # Errors
    /// [`StoreError::MissingInput`] when `text` or `destination` is empty;
    /// implementations add their own configuration and transport errors.
    async fn put_text(&self, text: &str, destination: &str) -> Result<String, StoreError>;
}

/// Insert a `_YYYYMMDD_HHMMSS` timestamp before the file extension.
///
/// `"report.txt"` → `"report_20240131_094500.txt"`; a name without an
/// extension gets the timestamp appended. Leading dots (hidden files) do
/// not count as an extension separator.
pub fn timestamped_filename(filename: &str, now: NaiveDateTime) -> String {
    let timestamp = now.format("%Y%m%d_%H%M%S");
    match split_extension(filename) {
        (stem, Some(ext)) => format!("{stem}_{timestamp}{ext}"),
        (name, None) => format!("{name}_{timestamp}"),
    }
}

/// Split `name` into stem and `.ext`, looking only at the last path component.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    let base_start = name.rfind('/').map(|i| i + 1).unwrap_or(0);
    let base = &name[base_start..];
    let leading_dots = base.len() - base.trim_start_matches('.').len();
    match base[leading_dots..].rfind('.') {
        Some(dot) => {
            let split = base_start + leading_dots + dot;
            (&name[..split], Some(&name[split..]))
        }
        None => (name, None),
    }
}

/// Ensure the destination name ends with `.txt`.
pub fn output_filename(name: &str) -> String {
    if name.ends_with(".txt") {
        name.to_string()
    } else {
        format!("{name}.txt")
    }
}

/// A [`TextStore`] that keeps everything in memory.
///
/// URLs have the form `memory://{destination}`; a second write to the same
/// destination replaces the first.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text previously stored under `destination`.
    pub fn get(&self, destination: &str) -> Option<String> {
        self.objects
            .lock()
            .ok()
            .and_then(|objects| objects.get(destination).cloned())
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TextStore for MemoryStore {
    async fn put_text(&self, text: &str, destination: &str) -> Result<String, StoreError> {
        if text.is_empty() || destination.is_empty() {
            return Err(StoreError::MissingInput);
        }
        self.objects
            .lock()
            .map_err(|_| StoreError::Upload {
                object: destination.to_string(),
                reason: "store lock poisoned".into(),
            })?
            .insert(destination.to_string(), text.to_string());
        Ok(format!("memory://{destination}"))
    }
}
