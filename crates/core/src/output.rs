//! Output descriptors and the 3D model file policy.

use serde::{Deserialize, Serialize};

/// Extensions accepted as 3D model output by default.
pub const DEFAULT_MODEL_EXTENSIONS: &[&str] = &[".glb", ".obj"];

/// Subfolder marker used when falling back to the global output listing.
pub const DEFAULT_FALLBACK_SUBFOLDER_MARKER: &str = "mesh";

/// Extension required of fallback listing entries.
pub const FALLBACK_EXTENSION: &str = ".glb";

/// Logical location of an artifact inside the backend's output namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
}

impl OutputDescriptor {
    pub fn new(filename: impl Into<String>, subfolder: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            subfolder: subfolder.into(),
        }
    }

    /// `subfolder/filename`, or just the filename at the output root.
    pub fn relative_path(&self) -> String {
        if self.subfolder.is_empty() {
            self.filename.clone()
        } else {
            format!("{}/{}", self.subfolder.trim_end_matches('/'), self.filename)
        }
    }
}

/// One entry of the backend's global output listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFileEntry {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    /// Modification time as reported by the backend (seconds since epoch).
    #[serde(default)]
    pub mtime: f64,
}

impl From<OutputFileEntry> for OutputDescriptor {
    fn from(entry: OutputFileEntry) -> Self {
        Self {
            filename: entry.filename,
            subfolder: entry.subfolder,
        }
    }
}

/// Set of filename extensions recognized as 3D models.
///
/// Matching is case-insensitive; extensions are stored lowercase with a
/// leading dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelExtensions(Vec<String>);

impl ModelExtensions {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalized = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .map(|ext| {
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                }
            })
            .collect();
        Self(normalized)
    }

    pub fn matches(&self, filename: &str) -> bool {
        has_extension_in(filename, &self.0)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for ModelExtensions {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_EXTENSIONS)
    }
}

/// Case-insensitive suffix check against a list of extensions.
pub fn has_extension_in<S: AsRef<str>>(filename: &str, extensions: &[S]) -> bool {
    let lower = filename.to_ascii_lowercase();
    extensions.iter().any(|ext| lower.ends_with(ext.as_ref()))
}
