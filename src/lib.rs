//! clipsort — scan, classify and organize video libraries.
//!
//! The pipeline walks a source directory, asks a content-analysis backend
//! to classify each video, ranks the configured category folders by match
//! confidence, and copies or moves confident matches into place. Per-file
//! failures never abort a run; everything ends up in the final
//! [`WorkflowResult`](workflow::WorkflowResult).

pub mod analysis;
pub mod error;
pub mod matching;
pub mod organizer;
pub mod report;
pub mod scanner;
pub mod workflow;

pub use analysis::{
    AnalysisMode, AnalysisResult, Analyzer, AnalyzerOptions, HttpAnalyzer, HttpAnalyzerConfig,
    RetryPolicy, RetryingAnalyzer,
};
pub use error::{AnalysisError, FileOperationError, MatchError, ScanError, WorkflowError};
pub use matching::{FolderCandidate, FolderMatch, FolderMatcher, MatcherConfig, SemanticScorer};
pub use organizer::{
    ConflictResolution, FileOperation, FileOperationResult, FileOrganizer, NamingPolicy,
    OrganizerConfig,
};
pub use scanner::{MediaFile, ScanConfig, Scanner};
pub use workflow::{
    CancelFlag, FileOutcome, ProgressEvent, ProgressSender, WorkflowConfig, WorkflowManager,
    WorkflowPhase, WorkflowResult, WorkflowStats,
};

use tracing_subscriber::EnvFilter;

/// Initialize tracing with a `RUST_LOG` env filter.
///
/// Default: warn for dependencies, info for this crate. Use
/// `RUST_LOG=debug` for verbose per-file logs. Call at most once per
/// process; library consumers with their own subscriber should skip this.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,clipsort=info")),
        )
        .init();
}
