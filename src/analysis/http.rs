//! HTTP analysis backend
//!
//! Talks to an OpenAI-compatible chat-completions endpoint through a
//! shared, lazily-initialized client with connection pooling. The model is
//! asked for a single JSON object describing the video; the reply is parsed
//! tolerantly because models like to wrap JSON in code fences.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::{Duration, Instant};

use super::json::extract_json_object;
use super::types::{AnalysisResult, ObjectObservation, SceneInterval};
use super::{Analyzer, AnalyzerOptions};
use crate::error::{AnalysisError, AnalysisErrorKind};
use crate::scanner::MediaFile;

/// Shared HTTP client for analysis calls.
///
/// Connection pooling and TLS session reuse matter here: a run issues one
/// request per file, all against the same host.
static ANALYSIS_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .pool_max_idle_per_host(16)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .build()
        .expect("Failed to create analysis HTTP client")
});

/// Configuration for [`HttpAnalyzer`].
#[derive(Debug, Clone)]
pub struct HttpAnalyzerConfig {
    /// Bearer token for the backend
    pub api_key: String,

    /// Chat-completions endpoint URL
    pub endpoint: String,

    /// Response token budget
    pub max_tokens: u32,
}

impl HttpAnalyzerConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            max_tokens: 2048,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Content analyzer backed by an OpenAI-compatible chat endpoint.
pub struct HttpAnalyzer {
    config: HttpAnalyzerConfig,
}

impl HttpAnalyzer {
    pub fn new(config: HttpAnalyzerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Analyzer for HttpAnalyzer {
    async fn analyze(
        &self,
        file: &MediaFile,
        options: &AnalyzerOptions,
    ) -> Result<AnalysisResult, AnalysisError> {
        let start = Instant::now();
        let prompt = build_analysis_prompt(file);

        tracing::debug!(
            path = %file.path.display(),
            model = %options.mode.model,
            "Requesting analysis"
        );

        let request = ANALYSIS_CLIENT
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&serde_json::json!({
                "model": options.mode.model,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": prompt}
                ],
                "max_completion_tokens": self.config.max_tokens
            }))
            .send();

        let response = match tokio::time::timeout(options.timeout, request).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                return Err(AnalysisError::new(
                    file.path.clone(),
                    AnalysisErrorKind::Transport(e.to_string()),
                ));
            }
            Err(_) => {
                return Err(AnalysisError::new(
                    file.path.clone(),
                    AnalysisErrorKind::Transport(format!(
                        "request timed out after {}s",
                        options.timeout.as_secs()
                    )),
                ));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let kind = if status.as_u16() == 429 || status.is_server_error() {
                AnalysisErrorKind::Unavailable {
                    status: status.as_u16(),
                    message,
                }
            } else {
                AnalysisErrorKind::Rejected {
                    status: status.as_u16(),
                    message,
                }
            };
            return Err(AnalysisError::new(file.path.clone(), kind));
        }

        let body = response.text().await.map_err(|e| {
            AnalysisError::new(file.path.clone(), AnalysisErrorKind::Transport(e.to_string()))
        })?;

        let content = extract_completion_text(&body).map_err(|e| {
            AnalysisError::new(file.path.clone(), AnalysisErrorKind::MalformedResponse(e))
        })?;

        parse_analysis_reply(
            &file.path,
            &content,
            &options.mode.model,
            start.elapsed().as_millis() as u64,
        )
    }
}

const SYSTEM_PROMPT: &str = "You are a video content analyst. \
Respond only with a single valid JSON object, no other text.";

/// Build the user prompt from file metadata.
fn build_analysis_prompt(file: &MediaFile) -> String {
    format!(
        r#"Classify this video file and return a JSON object:

{{
  "description": "1-2 sentence summary of the likely content",
  "category": "one lowercase word, e.g. travel, sports, family, gaming",
  "keywords": ["topic", "strings"],
  "scenes": [{{"startSecs": 0.0, "endSecs": 12.5, "description": "...", "confidence": 0.8}}],
  "objects": [{{"name": "bicycle", "category": "vehicle", "confidence": 0.9, "timestampSecs": 3.0}}]
}}

FILE:
- name: {}
- format: {}
- size: {} bytes
- modified: {}

Return ONLY the JSON object."#,
        file.name,
        file.format,
        file.size_bytes,
        file.modified_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string()),
    )
}

/// Pull the assistant text out of a chat-completions response body.
fn extract_completion_text(body: &str) -> Result<String, String> {
    #[derive(Deserialize)]
    struct ChatResponse {
        choices: Vec<Choice>,
    }
    #[derive(Deserialize)]
    struct Choice {
        message: Message,
    }
    #[derive(Deserialize)]
    struct Message {
        content: Option<String>,
    }

    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| format!("invalid completion envelope: {}", e))?;

    let content = parsed
        .choices
        .first()
        .and_then(|c| c.message.content.clone())
        .ok_or_else(|| "completion had no content".to_string())?;

    if content.trim().is_empty() {
        return Err("completion content was empty".to_string());
    }
    Ok(content)
}

/// Parse the model's JSON reply into an [`AnalysisResult`].
fn parse_analysis_reply(
    path: &Path,
    content: &str,
    backend: &str,
    duration_ms: u64,
) -> Result<AnalysisResult, AnalysisError> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct RawAnalysis {
        description: String,
        category: String,
        #[serde(default)]
        keywords: Vec<String>,
        #[serde(default)]
        scenes: Vec<SceneInterval>,
        #[serde(default)]
        objects: Vec<ObjectObservation>,
    }

    let json = extract_json_object(content).map_err(|e| {
        AnalysisError::new(path.to_path_buf(), AnalysisErrorKind::MalformedResponse(e))
    })?;

    let raw: RawAnalysis = serde_json::from_str(&json).map_err(|e| {
        AnalysisError::new(
            path.to_path_buf(),
            AnalysisErrorKind::MalformedResponse(format!("invalid analysis JSON: {}", e)),
        )
    })?;

    Ok(AnalysisResult {
        media_path: path.to_path_buf(),
        description: raw.description,
        category: raw.category.trim().to_lowercase(),
        keywords: raw.keywords,
        scenes: raw.scenes,
        objects: raw.objects,
        analysis_duration_ms: duration_ms,
        backend: backend.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parses_fenced_analysis_reply() {
        let content = r#"Here you go:
```json
{
  "description": "Mountain biking footage.",
  "category": "Sports",
  "keywords": ["biking", "mountains"],
  "scenes": [{"startSecs": 0.0, "endSecs": 10.0, "description": "trail ride", "confidence": 0.9}],
  "objects": [{"name": "bicycle", "category": "vehicle", "confidence": 0.95, "timestampSecs": 2.0}]
}
```"#;

        let result =
            parse_analysis_reply(&PathBuf::from("/v/ride.mp4"), content, "gpt-4o-mini", 42)
                .unwrap();

        assert_eq!(result.category, "sports");
        assert_eq!(result.keywords.len(), 2);
        assert_eq!(result.scenes.len(), 1);
        assert_eq!(result.objects[0].name, "bicycle");
        assert_eq!(result.analysis_duration_ms, 42);
        assert_eq!(result.backend, "gpt-4o-mini");
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let content = r#"{"description": "A clip.", "category": "family"}"#;
        let result =
            parse_analysis_reply(&PathBuf::from("/v/c.mp4"), content, "gpt-4o-mini", 1).unwrap();
        assert!(result.keywords.is_empty());
        assert!(result.scenes.is_empty());
    }

    #[test]
    fn garbage_reply_is_malformed() {
        let err = parse_analysis_reply(&PathBuf::from("/v/c.mp4"), "nope", "m", 1).unwrap_err();
        assert!(matches!(err.kind, AnalysisErrorKind::MalformedResponse(_)));
        assert_eq!(err.path, PathBuf::from("/v/c.mp4"));
    }

    #[test]
    fn extracts_completion_text_from_envelope() {
        let body = r#"{"choices":[{"message":{"content":"{\"a\":1}"}}]}"#;
        assert_eq!(extract_completion_text(body).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn empty_completion_is_an_error() {
        let body = r#"{"choices":[{"message":{"content":""}}]}"#;
        assert!(extract_completion_text(body).is_err());
    }
}
