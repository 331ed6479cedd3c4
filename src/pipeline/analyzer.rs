//! AI analyzer — model-assisted classification, scoring and distillation.
//!
//! `analyze` always returns a value. Transport failures, timeouts and
//! malformed model output all collapse into the fixed default analysis, so
//! one bad email or one flaky model call never breaks the pipeline. The
//! `AnalysisSource` on the result records which path produced it.

use std::sync::Arc;

use tracing::warn;

use crate::config::AppConfig;
use crate::error::LlmError;
use crate::llm::{ChatRequest, LlmClient};
use crate::model::{Analysis, Sentiment};

/// Hard truncation limit for normalized content embedded in the prompt.
const MAX_CONTENT_CHARS: usize = 3000;

const SYSTEM_PROMPT: &str =
    "You are a professional email content editor. Always respond with valid JSON.";

/// Where an analysis came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisSource {
    /// The model returned schema-valid output.
    Model,
    /// The model call or its output failed; this is the default record.
    Fallback,
}

/// Outcome of analyzing one email.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub analysis: Analysis,
    pub source: AnalysisSource,
}

/// Analyzes normalized email content via the external model.
pub struct AiAnalyzer {
    llm: Arc<dyn LlmClient>,
    temperature: f32,
    max_tokens: u32,
}

impl AiAnalyzer {
    pub fn new(llm: Arc<dyn LlmClient>, config: &AppConfig) -> Self {
        Self {
            llm,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Analyze one email. Never propagates an error to the caller.
    pub async fn analyze(&self, subject: &str, sender: &str, content: &str) -> AnalysisResult {
        let request = ChatRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: build_prompt(subject, sender, content),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let text = match self.llm.chat(request).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, subject, "Model call failed, using default analysis");
                return fallback();
            }
        };

        match parse_analysis(&text) {
            Ok(analysis) => AnalysisResult {
                analysis,
                source: AnalysisSource::Model,
            },
            Err(e) => {
                warn!(error = %e, subject, "Model output unusable, using default analysis");
                fallback()
            }
        }
    }
}

/// Build the single analysis prompt embedding subject, sender and at most
/// the first 3000 characters of normalized content.
fn build_prompt(subject: &str, sender: &str, content: &str) -> String {
    let content: String = content.chars().take(MAX_CONTENT_CHARS).collect();

    format!(
        r#"You are a professional email content editor. Please intelligently process the following email:

Original Email:
Subject: {subject}
Sender: {sender}
Content: {content}

Please perform the following tasks:
1. **Content Classification**: Determine email type (AI_NEWS|SHOPPING|EVENT|TECH|FINANCE|OTHER)
2. **Importance Scoring**: Rate 1-10 scale based on content value and timeliness
3. **Markdown Reformatting**: Reorganize content into clean Markdown format
4. **Image Processing**: Extract image URLs, add appropriate alt descriptions
5. **Content Distillation**: Generate concise summary and key points

Return JSON format:
{{
  "category": "classification",
  "importance_score": score,
  "title_optimized": "optimized title",
  "summary": "one-sentence compelling summary",
  "content_markdown": "reformatted Markdown content",
  "key_points": ["key points list"],
  "tags": ["relevant tags"],
  "images": [{{"url": "image_link", "alt": "description", "caption": "title"}}],
  "important_links": ["important links"],
  "reading_time": estimated_minutes,
  "sentiment": "positive|neutral|negative",
  "action_items": ["actionable suggestions"]
}}"#
    )
}

/// Parse and validate model output against the analysis schema.
fn parse_analysis(text: &str) -> Result<Analysis, LlmError> {
    let analysis: Analysis = serde_json::from_str(text)?;

    if !(1..=10).contains(&analysis.importance_score) {
        return Err(LlmError::InvalidResponse(format!(
            "importance_score {} out of range",
            analysis.importance_score
        )));
    }

    Ok(analysis)
}

/// The fixed default record. Satisfies the same invariants as a real result
/// so downstream code never special-cases it.
pub fn default_analysis() -> Analysis {
    Analysis {
        category: "OTHER".to_string(),
        importance_score: 5,
        title_optimized: "Email Content".to_string(),
        summary: "Email content requires manual review".to_string(),
        content_markdown: "Content processing pending".to_string(),
        key_points: Vec::new(),
        tags: Vec::new(),
        images: Vec::new(),
        important_links: Vec::new(),
        reading_time: 1,
        sentiment: Sentiment::Neutral,
        action_items: Vec::new(),
    }
}

fn fallback() -> AnalysisResult {
    AnalysisResult {
        analysis: default_analysis(),
        source: AnalysisSource::Fallback,
    }
}
