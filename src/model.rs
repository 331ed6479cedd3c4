//! Domain model types.

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A raw inbound email.
///
/// Immutable once received, except for `processed`, which flips
/// false → true exactly once after analysis completes or is attempted.
#[derive(Debug, Clone, Serialize)]
pub struct Email {
    pub id: Uuid,
    pub subject: String,
    pub sender_email: String,
    pub sender_name: Option<String>,
    pub raw_content: String,
    pub received_at: DateTime<Utc>,
    pub processed: bool,
}

/// The shape accepted by the email intake surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEmail {
    pub subject: String,
    pub sender_email: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub raw_content: String,
}

/// Sentiment classification of email content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

/// An image reference extracted from email content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    pub alt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Structured analysis of one email — exactly the JSON schema the external
/// model is instructed to produce.
///
/// Invariants: `importance_score` ∈ [1,10]; `sentiment` is one of the three
/// fixed values. The analyzer enforces both before an `Analysis` reaches
/// storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub category: String,
    pub importance_score: u8,
    pub title_optimized: String,
    pub summary: String,
    pub content_markdown: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default)]
    pub important_links: Vec<String>,
    pub reading_time: u32,
    pub sentiment: Sentiment,
    #[serde(default)]
    pub action_items: Vec<String>,
}

/// A stored analysis record, one per analyzed email.
///
/// `category_id` is a weak reference: it may be empty, and category deletion
/// never cleans it up.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedEmail {
    pub id: Uuid,
    pub email_id: Uuid,
    pub category_id: Option<Uuid>,
    #[serde(flatten)]
    pub analysis: Analysis,
    pub created_at: DateTime<Utc>,
}

/// An email category with display metadata. Independent lifecycle from
/// analyzed records.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
}

/// Payload for creating a category.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update for a category. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A shortlisted item inside a category's aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopItem {
    pub title: String,
    pub summary: String,
    pub score: u8,
}

/// Per-category aggregation for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub count: u32,
    pub importance_total: u32,
    pub average_importance: f64,
    pub top_items: Vec<TopItem>,
}

/// Category id → stats, in first-seen order so regeneration over unchanged
/// data renders identically.
pub type CategoriesSummary = IndexMap<String, CategoryStats>;

/// The per-day digest document, keyed uniquely by calendar date.
#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub id: Uuid,
    pub date: NaiveDate,
    pub content_markdown: String,
    pub total_emails: u32,
    pub categories_summary: CategoriesSummary,
    pub created_at: DateTime<Utc>,
}
