//! File uploads into the session's upload folder.
//!
//! Upload outcomes are values, not errors: every case maps to a status line
//! shown next to the upload control.

use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

pub const DEFAULT_ALLOWED_FILE_TYPES: [&str; 3] = [".pdf", ".docx", ".txt"];

static UNSAFE_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.\-]").expect("file name pattern"));

/// A file handed over by the front end: its user-facing name and where its
/// bytes currently live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub temp_path: PathBuf,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, temp_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            temp_path: temp_path.into(),
        }
    }

    /// Uses the file's own path as both name and source.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let temp_path = path.into();
        Self {
            name: temp_path.display().to_string(),
            temp_path,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadLogEntry {
    pub original_name: String,
    pub sanitized_path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadStatus {
    NoFile,
    Disallowed,
    Uploaded { path: PathBuf },
    Failed { reason: String },
    Disabled,
}

impl UploadStatus {
    pub fn is_uploaded(&self) -> bool {
        matches!(self, Self::Uploaded { .. })
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFile => f.write_str("No file uploaded"),
            Self::Disallowed => f.write_str("File type disallowed"),
            Self::Uploaded { path } => write!(f, "File uploaded: {}", path.display()),
            Self::Failed { reason } => write!(f, "Upload failed: {reason}"),
            Self::Disabled => f.write_str("File uploads are disabled"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct UploadHandler {
    folder: PathBuf,
    allowed: Vec<String>,
}

impl UploadHandler {
    /// `allowed` entries are compared case-insensitively and include the dot.
    pub fn new(folder: impl Into<PathBuf>, allowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            folder: folder.into(),
            allowed: allowed
                .into_iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn with_default_types(folder: impl Into<PathBuf>) -> Self {
        Self::new(folder, DEFAULT_ALLOWED_FILE_TYPES.map(String::from))
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Accepted extensions, lowercased and dotted.
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        let Some(ext) = Path::new(name).extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = format!(".{}", ext.to_ascii_lowercase());
        self.allowed.iter().any(|allowed| *allowed == ext)
    }

    /// Validates and copies `file` into the upload folder, recording it in
    /// `log` on success. The log is left untouched on every other outcome.
    pub fn upload(&self, file: Option<&UploadedFile>, log: &mut Vec<UploadLogEntry>) -> UploadStatus {
        let Some(file) = file else {
            return UploadStatus::NoFile;
        };
        if !self.is_allowed(&file.name) {
            info!(
                event = "upload.disallowed",
                domain = "upload",
                name = %file.name
            );
            return UploadStatus::Disallowed;
        }

        let target = self.folder.join(sanitize_file_name(&file.name));
        if is_same_file(&file.temp_path, &target) {
            // Copying a file onto itself truncates it; the bytes are already in place.
            warn!(
                event = "upload.same_file",
                domain = "upload",
                path = %target.display(),
                name = %file.name
            );
        } else if let Err(err) = store(&file.temp_path, &target, &file.name) {
            warn!(
                event = "upload.copy_failed",
                domain = "upload",
                path = %target.display(),
                error = %err
            );
            return UploadStatus::Failed {
                reason: err.to_string(),
            };
        }

        log.push(UploadLogEntry {
            original_name: file.name.clone(),
            sanitized_path: target.clone(),
        });
        info!(
            event = "upload.stored",
            domain = "upload",
            path = %target.display()
        );
        UploadStatus::Uploaded { path: target }
    }
}

fn store(source: &Path, target: &Path, name: &str) -> std::io::Result<u64> {
    if target.exists() {
        warn!(
            event = "upload.overwrite",
            domain = "upload",
            path = %target.display(),
            name = %name
        );
    }
    std::fs::copy(source, target)
}

fn is_same_file(source: &Path, target: &Path) -> bool {
    match (std::fs::canonicalize(source), std::fs::canonicalize(target)) {
        (Ok(source), Ok(target)) => source == target,
        _ => false,
    }
}

/// Keeps the base name only and replaces anything outside `[A-Za-z0-9_.-]`
/// with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name);
    UNSAFE_NAME_CHARS.replace_all(base, "_").into_owned()
}
