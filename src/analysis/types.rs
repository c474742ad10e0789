//! Shared types for content analysis

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Structured content description for one media file.
///
/// Produced once per file by an [`Analyzer`](super::Analyzer); never
/// mutated afterward. Repeated analysis of the same file may vary in
/// wording but keeps the category stable, so callers must not assume
/// byte-identical results across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Path of the analyzed file
    pub media_path: PathBuf,

    /// Free-text summary of the content (1-2 sentences)
    pub description: String,

    /// Primary category label, e.g. "travel" or "sports"
    pub category: String,

    /// Keyword / topic strings extracted from the content
    pub keywords: Vec<String>,

    /// Detected scene intervals
    pub scenes: Vec<SceneInterval>,

    /// Detected object observations
    pub objects: Vec<ObjectObservation>,

    /// How long the analysis took, in milliseconds
    pub analysis_duration_ms: u64,

    /// Identifier of the backend that produced this result
    pub backend: String,
}

/// A detected scene within the video.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneInterval {
    /// Scene start, seconds from the beginning
    pub start_secs: f64,

    /// Scene end, seconds from the beginning
    pub end_secs: f64,

    /// Short description of the scene
    pub description: String,

    /// Detection confidence (0.0-1.0)
    pub confidence: f32,
}

/// A detected object within the video.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectObservation {
    /// Object name, e.g. "bicycle"
    pub name: String,

    /// Broad object category, e.g. "vehicle"
    pub category: String,

    /// Detection confidence (0.0-1.0)
    pub confidence: f32,

    /// When the object appears, seconds from the beginning
    pub timestamp_secs: f64,
}

/// Opaque capability selector for the analysis backend.
///
/// The pipeline passes this through uninterpreted; only the concrete
/// analyzer gives the fields meaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMode {
    /// Backend name, e.g. "openai"
    pub backend: String,

    /// Model identifier understood by that backend
    pub model: String,
}

impl AnalysisMode {
    pub fn new(backend: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            model: model.into(),
        }
    }
}
