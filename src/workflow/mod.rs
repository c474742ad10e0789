//! Workflow orchestration
//!
//! Drives the scan → analyze → match → organize pipeline over a source
//! directory with a bounded worker pool. Per-file failures are captured
//! into the per-file outcome; only a scan failure aborts the run. Workers
//! complete out of order, but outcomes are reassembled into scan order
//! before the result is returned so downstream reporting is deterministic.

mod progress;

pub use progress::{ProgressCallback, ProgressEvent, ProgressSender, WorkflowPhase};

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::analysis::{Analyzer, AnalyzerOptions};
use crate::error::WorkflowError;
use crate::matching::{FolderCandidate, FolderMatch, FolderMatcher, MatcherConfig};
use crate::organizer::{FileOperationResult, FileOrganizer, OrganizerConfig};
use crate::scanner::{MediaFile, ScanConfig, Scanner};

/// Configuration for a workflow run.
///
/// `min_confidence_for_move` has no default on purpose: the threshold
/// decides whether files get moved at all, so the caller must pick it
/// explicitly via [`WorkflowConfig::new`].
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// A file is organized only if its best match confidence is at or
    /// above this value (0.0-1.0)
    pub min_confidence_for_move: f32,

    /// Destination category folders to match against
    pub candidates: Vec<FolderCandidate>,

    /// Concurrent per-file pipelines; kept small to respect analyzer
    /// rate limits
    pub concurrency: usize,

    pub scan: ScanConfig,
    pub matcher: MatcherConfig,
    pub organizer: OrganizerConfig,

    /// Options passed through to the analyzer, including the opaque
    /// backend/model descriptor
    pub analyzer_options: AnalyzerOptions,
}

impl WorkflowConfig {
    pub fn new(min_confidence_for_move: f32, candidates: Vec<FolderCandidate>) -> Self {
        Self {
            min_confidence_for_move: min_confidence_for_move.clamp(0.0, 1.0),
            candidates,
            concurrency: 3,
            scan: ScanConfig::default(),
            matcher: MatcherConfig::default(),
            organizer: OrganizerConfig::default(),
            analyzer_options: AnalyzerOptions::default(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_organizer(mut self, organizer: OrganizerConfig) -> Self {
        self.organizer = organizer;
        self
    }
}

/// Cooperative cancellation signal.
///
/// Once raised, in-flight per-file operations finish (no forced abort
/// mid-write) but no new files are dispatched.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything that happened to one file, stage by stage. Later fields are
/// `None` when an earlier stage failed or was gated off.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub file: MediaFile,

    /// Present once analysis succeeded
    pub analysis: Option<crate::analysis::AnalysisResult>,

    /// Best-ranked folder match, present even below the move threshold
    pub best_match: Option<FolderMatch>,

    /// File operation outcome; `None` when the file was never organized
    /// (stage failure or confidence below threshold)
    pub operation: Option<FileOperationResult>,

    /// Message of the stage error that stopped this file, if any
    pub error: Option<String>,
}

/// Summary statistics over a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStats {
    /// Fraction of processed files that hit no stage error (0.0-1.0)
    pub success_rate: f32,

    /// Wall-clock duration of the whole run
    pub total_duration_ms: u64,

    /// Average wall-clock time per processed file
    pub avg_file_duration_ms: u64,
}

/// Aggregated result of one workflow run. Immutable once returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    pub run_id: Uuid,

    /// Files yielded by the scan (after per-run deduplication)
    pub total_files: usize,

    /// Files with a successful analysis
    pub analyzed_files: usize,

    /// Files with at least one folder match
    pub matched_files: usize,

    /// Files actually copied or moved
    pub organized_files: usize,

    /// Per-file outcomes, in scan order
    pub results: Vec<FileOutcome>,

    pub stats: WorkflowStats,
}

/// Shared, read-only state for the worker tasks.
struct PipelineContext {
    analyzer: Arc<dyn Analyzer>,
    matcher: Arc<FolderMatcher>,
    organizer: Arc<FileOrganizer>,
    candidates: Vec<FolderCandidate>,
    options: AnalyzerOptions,
    min_confidence: f32,
    progress: ProgressSender,
    processed: AtomicUsize,
    total: usize,
}

impl PipelineContext {
    fn emit(&self, phase: WorkflowPhase, step: String) {
        let processed = self.processed.load(Ordering::SeqCst);
        self.progress.emit(ProgressEvent {
            phase,
            step,
            percent: percent_of(processed, self.total),
            processed,
            total: self.total,
        });
    }

    /// Count one file as fully processed and notify.
    fn finish(&self, file: &MediaFile, phase: WorkflowPhase) {
        let processed = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
        self.progress.emit(ProgressEvent {
            phase,
            step: format!("Finished {}", file.name),
            percent: percent_of(processed, self.total),
            processed,
            total: self.total,
        });
    }
}

fn percent_of(processed: usize, total: usize) -> f32 {
    if total == 0 {
        100.0
    } else {
        processed as f32 / total as f32 * 100.0
    }
}

/// Orchestrates workflow runs.
pub struct WorkflowManager {
    analyzer: Arc<dyn Analyzer>,
    matcher: Arc<FolderMatcher>,
    organizer: Arc<FileOrganizer>,
    config: WorkflowConfig,
    progress: ProgressSender,
    cancel: CancelFlag,
}

impl WorkflowManager {
    pub fn new(analyzer: Arc<dyn Analyzer>, config: WorkflowConfig) -> Self {
        let matcher = Arc::new(FolderMatcher::new(config.matcher.clone()));
        let organizer = Arc::new(FileOrganizer::new(config.organizer.clone()));
        Self {
            analyzer,
            matcher,
            organizer,
            config,
            progress: ProgressSender::disabled(),
            cancel: CancelFlag::new(),
        }
    }

    /// Replace the matcher, e.g. to inject a semantic scorer.
    pub fn with_matcher(mut self, matcher: FolderMatcher) -> Self {
        self.matcher = Arc::new(matcher);
        self
    }

    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the full pipeline over `source_dir`.
    ///
    /// Always completes with a `WorkflowResult` — even if every file
    /// failed at every stage — unless the source directory itself cannot
    /// be scanned.
    pub async fn execute(&self, source_dir: &Path) -> Result<WorkflowResult, WorkflowError> {
        let run_id = Uuid::new_v4();
        let start = Instant::now();

        tracing::info!(
            run_id = %run_id,
            source = %source_dir.display(),
            concurrency = self.config.concurrency,
            "Starting workflow run"
        );

        self.progress.emit(ProgressEvent {
            phase: WorkflowPhase::Scanning,
            step: format!("Scanning {}", source_dir.display()),
            percent: 0.0,
            processed: 0,
            total: 0,
        });

        let scanner = Scanner::new(self.config.scan.clone());
        let files = match scanner.scan(source_dir) {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "Scan failed, aborting run");
                self.progress.emit(ProgressEvent {
                    phase: WorkflowPhase::Failed,
                    step: e.to_string(),
                    percent: 0.0,
                    processed: 0,
                    total: 0,
                });
                return Err(WorkflowError::Scan(e));
            }
        };

        // Per-run arena: a path is dispatched at most once, even if the
        // walk yields it twice (e.g. overlapping symlinked trees).
        let mut seen: HashSet<std::path::PathBuf> = HashSet::new();
        let files: Vec<MediaFile> = files
            .into_iter()
            .filter(|f| seen.insert(f.path.clone()))
            .collect();
        let total = files.len();

        let ctx = Arc::new(PipelineContext {
            analyzer: Arc::clone(&self.analyzer),
            matcher: Arc::clone(&self.matcher),
            organizer: Arc::clone(&self.organizer),
            candidates: self.config.candidates.clone(),
            options: self.config.analyzer_options.clone(),
            min_confidence: self.config.min_confidence_for_move,
            progress: self.progress.clone(),
            processed: AtomicUsize::new(0),
            total,
        });

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = FuturesUnordered::new();
        let mut dispatched = 0;

        for (index, file) in files.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::info!(
                    run_id = %run_id,
                    remaining = total - index,
                    "Cancellation requested, not dispatching further files"
                );
                break;
            }
            dispatched += 1;

            let ctx = Arc::clone(&ctx);
            let semaphore = Arc::clone(&semaphore);
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("Semaphore closed");
                let outcome = process_file(&ctx, &file).await;
                (index, outcome)
            }));
        }

        // Outcomes arrive in completion order; slot them back into scan
        // order. The coordinator is the only writer of this buffer.
        let mut slots: Vec<Option<FileOutcome>> = Vec::with_capacity(dispatched);
        slots.resize_with(dispatched, || None);

        while let Some(joined) = tasks.next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => tracing::warn!(run_id = %run_id, error = %e, "Worker task panicked"),
            }
        }

        let results: Vec<FileOutcome> = slots.into_iter().flatten().collect();

        let analyzed_files = results.iter().filter(|r| r.analysis.is_some()).count();
        let matched_files = results.iter().filter(|r| r.best_match.is_some()).count();
        let organized_files = results
            .iter()
            .filter(|r| r.operation.as_ref().is_some_and(|op| op.success))
            .count();
        let clean = results.iter().filter(|r| r.error.is_none()).count();

        let total_duration_ms = start.elapsed().as_millis() as u64;
        let stats = WorkflowStats {
            success_rate: if results.is_empty() {
                1.0
            } else {
                clean as f32 / results.len() as f32
            },
            total_duration_ms,
            avg_file_duration_ms: if results.is_empty() {
                0
            } else {
                total_duration_ms / results.len() as u64
            },
        };

        self.progress.emit(ProgressEvent {
            phase: WorkflowPhase::Completed,
            step: format!(
                "Organized {} of {} files",
                organized_files, total
            ),
            percent: 100.0,
            processed: results.len(),
            total,
        });

        tracing::info!(
            run_id = %run_id,
            total = total,
            analyzed = analyzed_files,
            matched = matched_files,
            organized = organized_files,
            duration_ms = total_duration_ms,
            "Workflow run complete"
        );

        Ok(WorkflowResult {
            run_id,
            total_files: total,
            analyzed_files,
            matched_files,
            organized_files,
            results,
            stats,
        })
    }
}

/// Run the analyze → match → organize stages for one file. Never fails:
/// stage errors are folded into the outcome.
async fn process_file(ctx: &PipelineContext, file: &MediaFile) -> FileOutcome {
    let mut outcome = FileOutcome {
        file: file.clone(),
        analysis: None,
        best_match: None,
        operation: None,
        error: None,
    };

    ctx.emit(WorkflowPhase::Analyzing, format!("Analyzing {}", file.name));
    let analysis = match ctx.analyzer.analyze(file, &ctx.options).await {
        Ok(analysis) => analysis,
        Err(e) => {
            tracing::warn!(path = %file.path.display(), error = %e, "Analysis failed");
            outcome.error = Some(e.to_string());
            ctx.finish(file, WorkflowPhase::Analyzing);
            return outcome;
        }
    };
    outcome.analysis = Some(analysis.clone());

    ctx.emit(WorkflowPhase::Matching, format!("Matching {}", file.name));
    let ranked = match ctx.matcher.match_folders(&analysis, &ctx.candidates) {
        Ok(ranked) => ranked,
        Err(e) => {
            tracing::warn!(path = %file.path.display(), error = %e, "Matching failed");
            outcome.error = Some(e.to_string());
            ctx.finish(file, WorkflowPhase::Matching);
            return outcome;
        }
    };

    let best = match ranked.into_iter().next() {
        Some(best) => best,
        None => {
            tracing::debug!(
                path = %file.path.display(),
                category = %analysis.category,
                "No candidate folder matched"
            );
            outcome.error = Some(format!(
                "no destination folder matched category '{}'",
                analysis.category
            ));
            ctx.finish(file, WorkflowPhase::Matching);
            return outcome;
        }
    };
    outcome.best_match = Some(best.clone());

    if best.confidence >= ctx.min_confidence {
        ctx.emit(
            WorkflowPhase::Organizing,
            format!("Organizing {}", file.name),
        );
        match ctx
            .organizer
            .organize(file, Some(&analysis), &best.candidate.path)
            .await
        {
            Ok(op) => outcome.operation = Some(op),
            Err(e) => {
                tracing::warn!(path = %file.path.display(), error = %e, "Organize failed");
                outcome.error = Some(e.to_string());
            }
        }
    } else {
        tracing::debug!(
            path = %file.path.display(),
            confidence = best.confidence,
            threshold = ctx.min_confidence,
            "Best match below move threshold, leaving file in place"
        );
    }

    ctx.finish(file, WorkflowPhase::Organizing);
    outcome
}
