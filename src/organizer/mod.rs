//! File organization
//!
//! Owns every file-system side effect in the pipeline: naming, conflict
//! resolution, optional backup, and the copy/move itself. No other
//! component touches the disk under the destination root.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::analysis::AnalysisResult;
use crate::error::FileOperationError;
use crate::scanner::MediaFile;

/// Kind of file operation performed (or attempted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    Copy,
    Move,
    Skip,
}

/// Caller-supplied naming function: receives the analysis (when one
/// exists) and the original file name, returns the desired name.
pub type NamingFn = dyn Fn(Option<&AnalysisResult>, &str) -> String + Send + Sync;

/// Strategy for deriving the on-disk name at the destination.
#[derive(Clone, Default)]
pub enum NamingPolicy {
    /// Keep the original name, only normalize the extension case
    #[default]
    PreserveOriginal,
    /// Derive the name from the analysis category and top keywords
    Smart,
    /// Derive the name from the current UTC time
    Timestamp,
    /// Caller-supplied naming function
    Custom(Arc<NamingFn>),
}

impl fmt::Debug for NamingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreserveOriginal => write!(f, "PreserveOriginal"),
            Self::Smart => write!(f, "Smart"),
            Self::Timestamp => write!(f, "Timestamp"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Policy applied when the computed destination path already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Append a numeric suffix until a free name is found
    #[default]
    Rename,
    /// Replace the existing file
    Overwrite,
    /// Fail this single operation, touching neither file
    Skip,
}

/// Organizer configuration.
#[derive(Debug, Clone, Default)]
pub struct OrganizerConfig {
    pub naming: NamingPolicy,
    pub conflict: ConflictResolution,

    /// Move instead of copy. Copy is the safe default.
    pub move_files: bool,

    /// Copy the original to a backup location before a move, so a failed
    /// move never destroys the only copy. Ignored for copies.
    pub create_backup: bool,

    /// Backup location; defaults to `.backup` under the destination folder
    pub backup_dir: Option<PathBuf>,
}

/// Outcome of a single organize call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOperationResult {
    /// Original path
    pub source: PathBuf,

    /// Resulting path, `None` if the operation was skipped or failed
    pub destination: Option<PathBuf>,

    /// What was performed (or attempted)
    pub operation: FileOperation,

    pub success: bool,

    /// Error message when `success` is false
    pub error: Option<String>,

    /// Where the pre-move backup landed, when one was made
    pub backup_path: Option<PathBuf>,
}

/// Performs copy/move operations with conflict resolution and backup.
pub struct FileOrganizer {
    config: OrganizerConfig,
}

impl FileOrganizer {
    pub fn new(config: OrganizerConfig) -> Self {
        Self { config }
    }

    /// Organize one file into `destination_folder`.
    ///
    /// The conflict check runs immediately before the write; the narrow
    /// race window is accepted because destinations are single-writer in
    /// practice.
    pub async fn organize(
        &self,
        file: &MediaFile,
        analysis: Option<&AnalysisResult>,
        destination_folder: &Path,
    ) -> Result<FileOperationResult, FileOperationError> {
        if !file.path.exists() {
            return Err(FileOperationError::SourceMissing(file.path.clone()));
        }

        ensure_dir(destination_folder).await?;

        let name = self.derive_name(file, analysis);
        let mut target = destination_folder.join(&name);

        if target.exists() {
            match self.config.conflict {
                ConflictResolution::Rename => {
                    target = unique_destination(destination_folder, &name);
                }
                ConflictResolution::Overwrite => {
                    tracing::debug!(target = %target.display(), "Overwriting existing destination");
                }
                ConflictResolution::Skip => {
                    tracing::info!(
                        source = %file.path.display(),
                        target = %target.display(),
                        "Destination exists, skipping"
                    );
                    return Ok(FileOperationResult {
                        source: file.path.clone(),
                        destination: None,
                        operation: FileOperation::Skip,
                        success: false,
                        error: Some(format!("file exists: {}", target.display())),
                        backup_path: None,
                    });
                }
            }
        }

        let backup_path = if self.config.move_files && self.config.create_backup {
            Some(self.back_up(file, destination_folder).await?)
        } else {
            None
        };

        let operation = if self.config.move_files {
            self.move_file(&file.path, &target).await?;
            FileOperation::Move
        } else {
            tokio::fs::copy(&file.path, &target)
                .await
                .map_err(|source| FileOperationError::Io {
                    operation: "copy",
                    path: target.clone(),
                    source,
                })?;
            FileOperation::Copy
        };

        tracing::info!(
            source = %file.path.display(),
            target = %target.display(),
            operation = ?operation,
            "Organized file"
        );

        Ok(FileOperationResult {
            source: file.path.clone(),
            destination: Some(target),
            operation,
            success: true,
            error: None,
            backup_path,
        })
    }

    /// Organize a batch sequentially. A failure in one item never aborts
    /// the batch; failures are folded into failed results.
    pub async fn organize_many(
        &self,
        items: Vec<(MediaFile, Option<AnalysisResult>, PathBuf)>,
    ) -> Vec<FileOperationResult> {
        let mut results = Vec::with_capacity(items.len());
        for (file, analysis, destination) in items {
            match self.organize(&file, analysis.as_ref(), &destination).await {
                Ok(result) => results.push(result),
                Err(err) => {
                    tracing::warn!(
                        source = %file.path.display(),
                        error = %err,
                        "Organize failed"
                    );
                    results.push(FileOperationResult {
                        source: file.path.clone(),
                        destination: None,
                        operation: if self.config.move_files {
                            FileOperation::Move
                        } else {
                            FileOperation::Copy
                        },
                        success: false,
                        error: Some(err.to_string()),
                        backup_path: None,
                    });
                }
            }
        }
        results
    }

    fn derive_name(&self, file: &MediaFile, analysis: Option<&AnalysisResult>) -> String {
        let name = match &self.config.naming {
            NamingPolicy::PreserveOriginal => normalize_extension(&file.name),
            NamingPolicy::Smart => match analysis {
                Some(a) => smart_name(a, &file.format),
                None => normalize_extension(&file.name),
            },
            NamingPolicy::Timestamp => {
                format!("{}.{}", Utc::now().format("%Y%m%d-%H%M%S"), file.format)
            }
            NamingPolicy::Custom(f) => f(analysis, &file.name),
        };
        sanitize_file_name(&name)
    }

    /// Copy the original into the backup location before a move.
    async fn back_up(
        &self,
        file: &MediaFile,
        destination_folder: &Path,
    ) -> Result<PathBuf, FileOperationError> {
        let backup_dir = self
            .config
            .backup_dir
            .clone()
            .unwrap_or_else(|| destination_folder.join(".backup"));
        ensure_dir(&backup_dir).await?;

        let backup_path = unique_destination(&backup_dir, &sanitize_file_name(&file.name));
        tokio::fs::copy(&file.path, &backup_path)
            .await
            .map_err(|source| FileOperationError::Backup {
                path: file.path.clone(),
                source,
            })?;

        tracing::debug!(
            source = %file.path.display(),
            backup = %backup_path.display(),
            "Created backup"
        );
        Ok(backup_path)
    }

    /// Move via rename, falling back to copy+delete across filesystems.
    async fn move_file(&self, source: &Path, target: &Path) -> Result<(), FileOperationError> {
        if tokio::fs::rename(source, target).await.is_ok() {
            return Ok(());
        }

        tokio::fs::copy(source, target)
            .await
            .map_err(|e| FileOperationError::Io {
                operation: "move",
                path: target.to_path_buf(),
                source: e,
            })?;
        tokio::fs::remove_file(source)
            .await
            .map_err(|e| FileOperationError::Io {
                operation: "remove",
                path: source.to_path_buf(),
                source: e,
            })?;
        Ok(())
    }
}

/// Idempotent directory creation: "already exists" is fine, permission
/// errors propagate.
pub async fn ensure_dir(path: &Path) -> Result<(), FileOperationError> {
    match tokio::fs::create_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(source) => Err(FileOperationError::CreateDir {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Append `_1`, `_2`, ... before the extension until the name is free.
fn unique_destination(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = split_name(name);
    let mut counter = 1;
    loop {
        let next = if ext.is_empty() {
            format!("{}_{}", stem, counter)
        } else {
            format!("{}_{}.{}", stem, counter, ext)
        };
        let candidate = dir.join(&next);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

fn split_name(name: &str) -> (&str, &str) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext),
        _ => (name, ""),
    }
}

/// Lowercase the extension, leave the stem alone.
fn normalize_extension(name: &str) -> String {
    let (stem, ext) = split_name(name);
    if ext.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", stem, ext.to_lowercase())
    }
}

/// Category plus up to two keywords, hyphenated.
fn smart_name(analysis: &AnalysisResult, format: &str) -> String {
    let mut parts = vec![analysis.category.clone()];
    parts.extend(analysis.keywords.iter().take(2).cloned());

    let stem = parts
        .iter()
        .map(|p| p.trim().replace(' ', "-"))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();

    if stem.is_empty() {
        format!("clip.{}", format)
    } else {
        format!("{}.{}", stem, format)
    }
}

/// Strip path-unsafe characters before any disk write.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn media_file(path: &Path) -> MediaFile {
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        MediaFile {
            path: path.to_path_buf(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            size_bytes: size,
            format: path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default(),
            mime_type: None,
            created_at: None,
            modified_at: None,
        }
    }

    fn analysis(category: &str, keywords: &[&str]) -> AnalysisResult {
        AnalysisResult {
            media_path: PathBuf::from("/videos/clip.mp4"),
            description: String::new(),
            category: category.to_string(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            scenes: vec![],
            objects: vec![],
            analysis_duration_ms: 0,
            backend: "mock".to_string(),
        }
    }

    fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn copy_is_the_default_and_preserves_source() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let source = write_file(src.path(), "clip.mp4", b"video-bytes");

        let organizer = FileOrganizer::new(OrganizerConfig::default());
        let result = organizer
            .organize(&media_file(&source), None, dest.path())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.operation, FileOperation::Copy);
        assert!(source.exists());
        assert_eq!(
            fs::read(result.destination.unwrap()).unwrap(),
            b"video-bytes"
        );
    }

    #[tokio::test]
    async fn rename_conflict_appends_numeric_suffix() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let source = write_file(src.path(), "clip.mp4", b"new");
        write_file(dest.path(), "clip.mp4", b"existing");

        let organizer = FileOrganizer::new(OrganizerConfig::default());
        let result = organizer
            .organize(&media_file(&source), None, dest.path())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.destination.unwrap(), dest.path().join("clip_1.mp4"));
        // The existing file is untouched.
        assert_eq!(fs::read(dest.path().join("clip.mp4")).unwrap(), b"existing");
    }

    #[tokio::test]
    async fn rename_never_overwrites_across_repeated_runs() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let source = write_file(src.path(), "clip.mp4", b"v");
        write_file(dest.path(), "clip.mp4", b"existing");

        let organizer = FileOrganizer::new(OrganizerConfig::default());
        for expected in ["clip_1.mp4", "clip_2.mp4", "clip_3.mp4"] {
            let result = organizer
                .organize(&media_file(&source), None, dest.path())
                .await
                .unwrap();
            assert_eq!(result.destination.unwrap(), dest.path().join(expected));
        }
    }

    #[tokio::test]
    async fn skip_conflict_touches_neither_file() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let source = write_file(src.path(), "clip.mp4", b"new");
        write_file(dest.path(), "clip.mp4", b"existing");

        let organizer = FileOrganizer::new(OrganizerConfig {
            conflict: ConflictResolution::Skip,
            ..OrganizerConfig::default()
        });
        let result = organizer
            .organize(&media_file(&source), None, dest.path())
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.operation, FileOperation::Skip);
        assert!(result.destination.is_none());
        assert!(result.error.unwrap().contains("file exists"));
        assert!(source.exists());
        assert_eq!(fs::read(dest.path().join("clip.mp4")).unwrap(), b"existing");
    }

    #[tokio::test]
    async fn overwrite_conflict_replaces_destination() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let source = write_file(src.path(), "clip.mp4", b"new");
        write_file(dest.path(), "clip.mp4", b"existing");

        let organizer = FileOrganizer::new(OrganizerConfig {
            conflict: ConflictResolution::Overwrite,
            ..OrganizerConfig::default()
        });
        let result = organizer
            .organize(&media_file(&source), None, dest.path())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(fs::read(dest.path().join("clip.mp4")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn move_removes_source() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let source = write_file(src.path(), "clip.mp4", b"v");

        let organizer = FileOrganizer::new(OrganizerConfig {
            move_files: true,
            ..OrganizerConfig::default()
        });
        let result = organizer
            .organize(&media_file(&source), None, dest.path())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.operation, FileOperation::Move);
        assert!(!source.exists());
        assert!(dest.path().join("clip.mp4").exists());
    }

    #[tokio::test]
    async fn move_with_backup_keeps_a_copy() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let source = write_file(src.path(), "clip.mp4", b"precious");

        let organizer = FileOrganizer::new(OrganizerConfig {
            move_files: true,
            create_backup: true,
            ..OrganizerConfig::default()
        });
        let result = organizer
            .organize(&media_file(&source), None, dest.path())
            .await
            .unwrap();

        let backup = result.backup_path.unwrap();
        assert!(backup.exists());
        assert_eq!(fs::read(&backup).unwrap(), b"precious");
        assert!(!source.exists());
        assert!(dest.path().join("clip.mp4").exists());
    }

    #[tokio::test]
    async fn failed_move_leaves_backup_and_source_intact() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let source = write_file(src.path(), "clip.mp4", b"precious");
        // A directory squatting on the target path makes both the rename
        // and the copy fallback fail.
        fs::create_dir(dest.path().join("clip.mp4")).unwrap();

        let organizer = FileOrganizer::new(OrganizerConfig {
            move_files: true,
            create_backup: true,
            conflict: ConflictResolution::Overwrite,
            ..OrganizerConfig::default()
        });
        let err = organizer
            .organize(&media_file(&source), None, dest.path())
            .await
            .unwrap_err();

        assert!(matches!(err, FileOperationError::Io { .. }));
        assert!(source.exists(), "failed move must not destroy the source");
        assert_eq!(fs::read(&source).unwrap(), b"precious");
        let backup = dest.path().join(".backup/clip.mp4");
        assert!(backup.exists(), "backup must survive a failed move");
    }

    #[tokio::test]
    async fn organize_many_isolates_failures() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let a = write_file(src.path(), "a.mp4", b"a");
        let c = write_file(src.path(), "c.mp4", b"c");

        let missing = MediaFile {
            path: src.path().join("gone.mp4"),
            name: "gone.mp4".to_string(),
            size_bytes: 0,
            format: "mp4".to_string(),
            mime_type: None,
            created_at: None,
            modified_at: None,
        };

        let organizer = FileOrganizer::new(OrganizerConfig::default());
        let results = organizer
            .organize_many(vec![
                (media_file(&a), None, dest.path().to_path_buf()),
                (missing, None, dest.path().to_path_buf()),
                (media_file(&c), None, dest.path().to_path_buf()),
            ])
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[1].error.is_some());
        assert!(results[2].success);
    }

    #[tokio::test]
    async fn smart_naming_uses_category_and_keywords() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let source = write_file(src.path(), "IMG_0001.MP4", b"v");

        let organizer = FileOrganizer::new(OrganizerConfig {
            naming: NamingPolicy::Smart,
            ..OrganizerConfig::default()
        });
        let result = organizer
            .organize(
                &media_file(&source),
                Some(&analysis("travel", &["beach", "sunset", "extra"])),
                dest.path(),
            )
            .await
            .unwrap();

        assert_eq!(
            result.destination.unwrap(),
            dest.path().join("travel-beach-sunset.mp4")
        );
    }

    #[tokio::test]
    async fn smart_naming_falls_back_without_analysis() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let source = write_file(src.path(), "clip.MP4", b"v");

        let organizer = FileOrganizer::new(OrganizerConfig {
            naming: NamingPolicy::Smart,
            ..OrganizerConfig::default()
        });
        let result = organizer
            .organize(&media_file(&source), None, dest.path())
            .await
            .unwrap();

        assert_eq!(result.destination.unwrap(), dest.path().join("clip.mp4"));
    }

    #[tokio::test]
    async fn custom_naming_is_applied_and_sanitized() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let source = write_file(src.path(), "clip.mp4", b"v");

        let organizer = FileOrganizer::new(OrganizerConfig {
            naming: NamingPolicy::Custom(Arc::new(|analysis, original| {
                let prefix = analysis.map(|a| a.category.as_str()).unwrap_or("raw");
                format!("{}:{}", prefix, original)
            })),
            ..OrganizerConfig::default()
        });
        let result = organizer
            .organize(
                &media_file(&source),
                Some(&analysis("travel", &[])),
                dest.path(),
            )
            .await
            .unwrap();

        // The ':' is path-unsafe and gets replaced.
        assert_eq!(
            result.destination.unwrap(),
            dest.path().join("travel_clip.mp4")
        );
    }

    #[tokio::test]
    async fn timestamp_naming_keeps_the_extension() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let source = write_file(src.path(), "clip.mp4", b"v");

        let organizer = FileOrganizer::new(OrganizerConfig {
            naming: NamingPolicy::Timestamp,
            ..OrganizerConfig::default()
        });
        let result = organizer
            .organize(&media_file(&source), None, dest.path())
            .await
            .unwrap();

        let dest_path = result.destination.unwrap();
        let name = dest_path.file_name().unwrap().to_string_lossy();
        assert!(name.ends_with(".mp4"));
        assert_eq!(name.len(), "YYYYMMDD-HHMMSS.mp4".len());
    }

    #[test]
    fn sanitize_strips_path_unsafe_characters() {
        assert_eq!(sanitize_file_name("a/b\\c:d.mp4"), "a_b_c_d.mp4");
        assert_eq!(sanitize_file_name("what?.mp4"), "what_.mp4");
        assert_eq!(sanitize_file_name("  plain.mp4  "), "plain.mp4");
    }

    #[test]
    fn normalize_extension_lowercases_only_the_extension() {
        assert_eq!(normalize_extension("Holiday.MP4"), "Holiday.mp4");
        assert_eq!(normalize_extension("noext"), "noext");
    }
}
