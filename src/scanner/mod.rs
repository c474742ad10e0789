//! Source directory scanner
//!
//! Walks a directory tree and yields candidate video files with basic
//! metadata. Filtering (extension allow-list, size bounds) happens here so
//! the rest of the pipeline only ever sees eligible media.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

use crate::error::ScanError;

/// Video container extensions accepted by default.
const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "mkv", "avi", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "ts", "m2ts",
];

/// A single scanned media file.
///
/// Immutable once produced; identity is the absolute path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    /// Absolute path to the file
    pub path: PathBuf,

    /// File name for display (no directory components)
    pub name: String,

    /// Size in bytes
    pub size_bytes: u64,

    /// Lowercased extension, e.g. "mp4"
    pub format: String,

    /// MIME type guessed from the extension
    pub mime_type: Option<String>,

    /// Creation timestamp, when the platform reports one
    pub created_at: Option<DateTime<Utc>>,

    /// Last-modified timestamp
    pub modified_at: Option<DateTime<Utc>>,
}

/// Configuration for a scan pass.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Descend into subdirectories
    pub recursive: bool,

    /// Lowercased extensions to accept
    pub extensions: HashSet<String>,

    /// Files smaller than this are silently excluded
    pub min_size_bytes: u64,

    /// Files larger than this are silently excluded (0 = unlimited)
    pub max_size_bytes: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            extensions: DEFAULT_VIDEO_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            min_size_bytes: 0,
            max_size_bytes: 0,
        }
    }
}

/// Statistics from a scan pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    /// Entries visited during the walk
    pub entries_seen: usize,

    /// Files that passed all filters
    pub files_matched: usize,

    /// Files excluded by extension or size bounds
    pub files_filtered: usize,

    /// Entries skipped because of read errors (permission etc.)
    pub errors: usize,

    /// Time taken in milliseconds
    pub scan_duration_ms: u64,
}

/// Directory scanner with extension and size filtering.
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    config: ScanConfig,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Scan `root` and collect all eligible media files in walk order.
    ///
    /// The walk is sorted by file name so repeated scans of the same tree
    /// yield the same order. Entries that fail mid-walk (e.g. permission
    /// errors on a subdirectory) are logged and skipped; only an unusable
    /// root aborts the scan.
    pub fn scan(&self, root: &Path) -> Result<Vec<MediaFile>, ScanError> {
        let start = Instant::now();
        let mut stats = ScanStats::default();

        self.check_root(root)?;

        let mut files = Vec::new();
        for media in self.scan_iter(root, &mut stats) {
            files.push(media);
        }

        stats.files_matched = files.len();
        stats.scan_duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            root = %root.display(),
            matched = stats.files_matched,
            filtered = stats.files_filtered,
            errors = stats.errors,
            duration_ms = stats.scan_duration_ms,
            "Scan complete"
        );

        Ok(files)
    }

    /// Lazy variant of [`scan`](Self::scan): yields files as the walk
    /// progresses. The caller must have validated the root via `scan` or
    /// [`check_root`](Self::check_root) for root errors to surface as
    /// `ScanError` rather than an empty sequence.
    pub fn scan_iter<'a>(
        &'a self,
        root: &Path,
        stats: &'a mut ScanStats,
    ) -> impl Iterator<Item = MediaFile> + 'a {
        let mut walker = WalkDir::new(root).follow_links(false).sort_by_file_name();
        if !self.config.recursive {
            walker = walker.max_depth(1);
        }

        walker.into_iter().filter_map(move |entry| {
            stats.entries_seen += 1;
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable entry");
                    stats.errors += 1;
                    return None;
                }
            };

            if !entry.file_type().is_file() {
                return None;
            }

            match self.build_media_file(entry.path()) {
                Ok(Some(media)) => Some(media),
                Ok(None) => {
                    stats.files_filtered += 1;
                    None
                }
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "Skipping file");
                    stats.errors += 1;
                    None
                }
            }
        })
    }

    /// Validate the scan root. Fatal errors only.
    pub fn check_root(&self, root: &Path) -> Result<(), ScanError> {
        if !root.exists() {
            return Err(ScanError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }
        // Surface permission problems on the root up front instead of
        // producing a silently empty scan.
        std::fs::read_dir(root).map_err(|source| ScanError::Unreadable {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Build a `MediaFile` from a path, or `None` if filtered out.
    fn build_media_file(&self, path: &Path) -> std::io::Result<Option<MediaFile>> {
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_lowercase(),
            None => return Ok(None),
        };

        if !self.config.extensions.contains(&ext) {
            return Ok(None);
        }

        let metadata = std::fs::metadata(path)?;
        let size = metadata.len();

        if size < self.config.min_size_bytes {
            return Ok(None);
        }
        if self.config.max_size_bytes > 0 && size > self.config.max_size_bytes {
            return Ok(None);
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mime_type = mime_guess::from_ext(&ext).first().map(|m| m.to_string());

        Ok(Some(MediaFile {
            path: path.to_path_buf(),
            name,
            size_bytes: size,
            format: ext,
            mime_type,
            created_at: system_time_to_utc(metadata.created().ok()),
            modified_at: system_time_to_utc(metadata.modified().ok()),
        }))
    }
}

fn system_time_to_utc(time: Option<std::time::SystemTime>) -> Option<DateTime<Utc>> {
    let duration = time?.duration_since(std::time::UNIX_EPOCH).ok()?;
    Utc.timestamp_opt(duration.as_secs() as i64, duration.subsec_nanos())
        .single()
}
