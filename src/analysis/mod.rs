//! Content analysis capability
//!
//! The pipeline consumes analysis through the [`Analyzer`] trait and never
//! interprets how a backend arrives at its answer. [`RetryingAnalyzer`]
//! wraps any backend with bounded retries and exponential backoff for
//! transient failures; non-retryable failures surface immediately.

mod http;
mod json;
mod types;

pub use http::{HttpAnalyzer, HttpAnalyzerConfig};
pub use types::{AnalysisMode, AnalysisResult, ObjectObservation, SceneInterval};

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{AnalysisError, AnalysisErrorKind};
use crate::scanner::MediaFile;

/// Per-call options handed to the analyzer.
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    /// Which backend/model to use; passed through uninterpreted
    pub mode: AnalysisMode,

    /// Hard cap on a single analysis request
    pub timeout: Duration,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::new("openai", "gpt-4o-mini"),
            timeout: Duration::from_secs(90),
        }
    }
}

/// A content-analysis collaborator.
///
/// Implementations may take seconds per call; all of them are expected to
/// be idempotent at the category level (same file, same options, same
/// category even if the wording differs).
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        file: &MediaFile,
        options: &AnalyzerOptions,
    ) -> Result<AnalysisResult, AnalysisError>;
}

/// Retry policy for transient analysis failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure
    pub max_retries: u32,

    /// Delay before the first retry; doubles on each subsequent one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

/// Wraps an [`Analyzer`] with bounded exponential-backoff retries.
///
/// Only retryable errors (network transport, 429/5xx) trigger another
/// attempt; malformed-input failures surface on the first try.
pub struct RetryingAnalyzer<A> {
    inner: A,
    policy: RetryPolicy,
}

impl<A: Analyzer> RetryingAnalyzer<A> {
    pub fn new(inner: A, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn with_defaults(inner: A) -> Self {
        Self::new(inner, RetryPolicy::default())
    }
}

#[async_trait]
impl<A: Analyzer> Analyzer for RetryingAnalyzer<A> {
    async fn analyze(
        &self,
        file: &MediaFile,
        options: &AnalyzerOptions,
    ) -> Result<AnalysisResult, AnalysisError> {
        let mut delay = self.policy.base_delay;
        let mut last_error: Option<AnalysisError> = None;

        for attempt in 0..=self.policy.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    path = %file.path.display(),
                    attempt,
                    max = self.policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying analysis"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }

            match self.inner.analyze(file, options).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_retryable() => {
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        let last = last_error
            .map(|e| e.kind.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Err(AnalysisError::new(
            file.path.clone(),
            AnalysisErrorKind::RetriesExhausted {
                attempts: self.policy.max_retries + 1,
                last_error: last,
            },
        ))
    }
}
