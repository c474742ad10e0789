//! Destination folder matching
//!
//! Ranks candidate category folders against an analysis result. Scoring is
//! lexical by default (token overlap between the analysis category/keywords
//! and the folder's name and path segments) with an optional semantic
//! scorer blended in. Output ordering is deterministic: score descending,
//! ties broken by folder path.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::PathBuf;

use crate::analysis::AnalysisResult;
use crate::error::MatchError;

/// A destination directory a file might be organized into.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FolderCandidate {
    /// Destination directory path
    pub path: PathBuf,

    /// Optional display name; falls back to the final path component
    pub display_name: Option<String>,
}

impl FolderCandidate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            display_name: None,
        }
    }

    pub fn with_name(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            display_name: Some(name.into()),
        }
    }

    fn label(&self) -> String {
        match &self.display_name {
            Some(name) => name.clone(),
            None => self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        }
    }
}

/// A scored candidate for one analysis result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderMatch {
    /// The candidate this score applies to
    pub candidate: FolderCandidate,

    /// Match confidence (0.0-1.0)
    pub confidence: f32,

    /// Human-readable reasons supporting the score, in order of weight
    pub reasons: Vec<String>,
}

/// Optional semantic-similarity scorer.
///
/// Implementations return a similarity in [0,1] between the analysis and a
/// candidate; the matcher blends it with the lexical score. Embedding
/// backends plug in here.
pub trait SemanticScorer: Send + Sync {
    fn score(&self, analysis: &AnalysisResult, candidate: &FolderCandidate) -> f32;
}

/// Matcher configuration.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Candidates scoring below this are omitted from the result entirely
    pub min_score: f32,

    /// Weight of the semantic score when a scorer is configured (0.0-1.0)
    pub semantic_weight: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_score: 0.05,
            semantic_weight: 0.5,
        }
    }
}

// Relative weight of a category hit vs. keyword overlap in the lexical score.
const CATEGORY_WEIGHT: f32 = 0.6;
const KEYWORD_WEIGHT: f32 = 0.4;

/// Ranks destination folders for analysis results.
pub struct FolderMatcher {
    config: MatcherConfig,
    semantic: Option<Box<dyn SemanticScorer>>,
}

impl FolderMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            config,
            semantic: None,
        }
    }

    pub fn with_semantic_scorer(mut self, scorer: Box<dyn SemanticScorer>) -> Self {
        self.semantic = Some(scorer);
        self
    }

    /// Score every candidate against `analysis` and return the ranked list.
    ///
    /// Candidates below the configured floor are dropped rather than
    /// returned with a near-zero score, so large taxonomies stay cheap.
    pub fn match_folders(
        &self,
        analysis: &AnalysisResult,
        candidates: &[FolderCandidate],
    ) -> Result<Vec<FolderMatch>, MatchError> {
        if candidates.is_empty() {
            return Err(MatchError::NoCandidates);
        }

        let mut matches: Vec<FolderMatch> = candidates
            .iter()
            .filter_map(|candidate| {
                let m = self.score_candidate(analysis, candidate);
                if m.confidence >= self.config.min_score {
                    Some(m)
                } else {
                    None
                }
            })
            .collect();

        matches.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.candidate.path.cmp(&b.candidate.path))
        });

        tracing::debug!(
            path = %analysis.media_path.display(),
            category = %analysis.category,
            candidates = candidates.len(),
            kept = matches.len(),
            "Ranked folder candidates"
        );

        Ok(matches)
    }

    fn score_candidate(&self, analysis: &AnalysisResult, candidate: &FolderCandidate) -> FolderMatch {
        let folder_tokens = candidate_tokens(candidate);
        let mut reasons = Vec::new();
        let mut lexical = 0.0f32;

        let category_tokens = tokenize(&analysis.category);
        let category_hit = category_tokens
            .iter()
            .any(|t| folder_tokens.contains(t));
        if category_hit {
            lexical += CATEGORY_WEIGHT;
            reasons.push(format!(
                "category '{}' matches folder '{}'",
                analysis.category,
                candidate.label()
            ));
        }

        if !analysis.keywords.is_empty() {
            let matched: Vec<&String> = analysis
                .keywords
                .iter()
                .filter(|kw| tokenize(kw).iter().any(|t| folder_tokens.contains(t)))
                .collect();
            if !matched.is_empty() {
                let ratio = matched.len() as f32 / analysis.keywords.len() as f32;
                lexical += KEYWORD_WEIGHT * ratio;
                reasons.push(format!(
                    "{} of {} keywords match ({})",
                    matched.len(),
                    analysis.keywords.len(),
                    matched
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
        }

        let confidence = match &self.semantic {
            Some(scorer) => {
                let semantic = scorer.score(analysis, candidate).clamp(0.0, 1.0);
                let w = self.config.semantic_weight.clamp(0.0, 1.0);
                if semantic > 0.0 {
                    reasons.push(format!("semantic similarity {:.2}", semantic));
                }
                lexical * (1.0 - w) + semantic * w
            }
            None => lexical,
        };

        FolderMatch {
            candidate: candidate.clone(),
            confidence: confidence.clamp(0.0, 1.0),
            reasons,
        }
    }
}

/// Tokens describing a candidate: its display name plus trailing path
/// segments (the leading components of a taxonomy root carry no signal).
fn candidate_tokens(candidate: &FolderCandidate) -> Vec<String> {
    let mut tokens = tokenize(&candidate.label());
    for segment in candidate.path.iter().rev().take(2) {
        tokens.extend(tokenize(&segment.to_string_lossy()));
    }
    tokens.sort();
    tokens.dedup();
    tokens
}

/// Lowercased alphanumeric tokens, single characters dropped.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(|t| t.to_lowercase())
        .collect()
}
