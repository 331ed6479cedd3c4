//! Unified `Database` trait — single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::model::{
    AnalyzedEmail, CategoriesSummary, Category, CategoryUpdate, DailySummary, Email, NewCategory,
    NewEmail,
};

/// Backend-agnostic database trait covering emails, analyzed records,
/// categories and daily summaries.
#[async_trait]
pub trait Database: Send + Sync {
    // ── Emails ──────────────────────────────────────────────────────

    /// Insert a new raw email. Returns the stored record.
    async fn insert_email(
        &self,
        email: &NewEmail,
        received_at: DateTime<Utc>,
    ) -> Result<Email, DatabaseError>;

    /// Get an email by id.
    async fn get_email(&self, id: Uuid) -> Result<Option<Email>, DatabaseError>;

    /// List emails, most recent first, optionally filtered by processed flag.
    async fn list_emails(
        &self,
        skip: u32,
        limit: u32,
        processed: Option<bool>,
    ) -> Result<Vec<Email>, DatabaseError>;

    /// Flip an email's processed flag to true.
    async fn mark_email_processed(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// Processed emails received in the half-open interval `[start, end)`.
    async fn list_processed_emails_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Email>, DatabaseError>;

    // ── Analyzed records ────────────────────────────────────────────

    /// Insert an analyzed record.
    async fn insert_analyzed(&self, item: &AnalyzedEmail) -> Result<(), DatabaseError>;

    /// Analyzed records whose parent email was received in `[start, end)`.
    ///
    /// Joins purely on timestamp — the parent's processed flag is not
    /// consulted, so records for mid-processing emails are included.
    async fn list_analyzed_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AnalyzedEmail>, DatabaseError>;

    // ── Categories ──────────────────────────────────────────────────

    /// Create a category. Names are unique.
    async fn insert_category(&self, category: &NewCategory) -> Result<Category, DatabaseError>;

    /// Get a category by id.
    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, DatabaseError>;

    /// Look up a category by name, case-insensitively.
    async fn get_category_by_name(&self, name: &str) -> Result<Option<Category>, DatabaseError>;

    /// List all categories.
    async fn list_categories(&self) -> Result<Vec<Category>, DatabaseError>;

    /// Apply a partial update. Returns the updated record, or `None` if the
    /// category does not exist.
    async fn update_category(
        &self,
        id: Uuid,
        update: &CategoryUpdate,
    ) -> Result<Option<Category>, DatabaseError>;

    /// Delete a category. Dangling analyzed-record references are left as-is.
    /// Returns whether a row was deleted.
    async fn delete_category(&self, id: Uuid) -> Result<bool, DatabaseError>;

    // ── Daily summaries ─────────────────────────────────────────────

    /// Get the summary for a calendar date.
    async fn get_daily_summary(&self, date: NaiveDate)
    -> Result<Option<DailySummary>, DatabaseError>;

    /// Insert or overwrite the summary for a date, returning the freshly
    /// persisted record — never a stale read.
    async fn upsert_daily_summary(
        &self,
        date: NaiveDate,
        content_markdown: &str,
        total_emails: u32,
        categories_summary: &CategoriesSummary,
    ) -> Result<DailySummary, DatabaseError>;
}
