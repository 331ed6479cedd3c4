//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Timestamps are stored as
//! RFC 3339 UTC strings with fixed-width fractional seconds so range scans
//! can compare them lexicographically; summary dates are `YYYY-MM-DD`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::model::{
    AnalyzedEmail, Analysis, CategoriesSummary, Category, CategoryUpdate, DailySummary, Email,
    ImageRef, NewCategory, NewEmail, Sentiment,
};
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn init_schema(&self) -> Result<(), DatabaseError> {
        self.conn()
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS emails (
                    id TEXT PRIMARY KEY,
                    subject TEXT NOT NULL,
                    sender_email TEXT NOT NULL,
                    sender_name TEXT,
                    raw_content TEXT NOT NULL,
                    received_at TEXT NOT NULL,
                    processed INTEGER NOT NULL DEFAULT 0
                );
                CREATE INDEX IF NOT EXISTS idx_emails_received_at ON emails(received_at);
                CREATE INDEX IF NOT EXISTS idx_emails_processed ON emails(processed);

                CREATE TABLE IF NOT EXISTS analyzed_emails (
                    id TEXT PRIMARY KEY,
                    email_id TEXT NOT NULL,
                    category_id TEXT,
                    category TEXT NOT NULL,
                    importance_score INTEGER NOT NULL,
                    title_optimized TEXT NOT NULL,
                    summary TEXT NOT NULL,
                    content_markdown TEXT NOT NULL,
                    key_points TEXT NOT NULL,
                    tags TEXT NOT NULL,
                    images TEXT NOT NULL,
                    important_links TEXT NOT NULL,
                    reading_time INTEGER NOT NULL,
                    sentiment TEXT NOT NULL,
                    action_items TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_analyzed_email_id ON analyzed_emails(email_id);

                CREATE TABLE IF NOT EXISTS categories (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE,
                    color TEXT,
                    icon TEXT,
                    description TEXT
                );

                CREATE TABLE IF NOT EXISTS daily_summaries (
                    id TEXT PRIMARY KEY,
                    date TEXT NOT NULL UNIQUE,
                    content_markdown TEXT NOT NULL,
                    total_emails INTEGER NOT NULL,
                    categories_summary TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );",
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("init_schema: {e}")))?;

        debug!("Database schema initialized");
        Ok(())
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Canonical timestamp write format: RFC 3339 UTC with fixed-width micros.
fn fmt_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 datetime string back into `DateTime<Utc>`.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_else(|_| Uuid::nil())
}

fn sentiment_to_str(sentiment: Sentiment) -> &'static str {
    match sentiment {
        Sentiment::Positive => "positive",
        Sentiment::Neutral => "neutral",
        Sentiment::Negative => "negative",
    }
}

fn str_to_sentiment(s: &str) -> Sentiment {
    match s {
        "positive" => Sentiment::Positive,
        "negative" => Sentiment::Negative,
        _ => Sentiment::Neutral,
    }
}

/// Convert `Option<&str>` to a libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn json_list<T: serde::Serialize>(list: &[T]) -> Result<String, DatabaseError> {
    serde_json::to_string(list).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn parse_json_list<T: serde::de::DeserializeOwned>(s: &str) -> Vec<T> {
    serde_json::from_str(s).unwrap_or_default()
}

fn map_query_err(op: &str, e: libsql::Error) -> DatabaseError {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint failed") {
        DatabaseError::Constraint(format!("{op}: {msg}"))
    } else {
        DatabaseError::Query(format!("{op}: {msg}"))
    }
}

/// Map a libsql row to an Email.
///
/// Column order matches EMAIL_COLUMNS:
/// 0:id, 1:subject, 2:sender_email, 3:sender_name, 4:raw_content,
/// 5:received_at, 6:processed
fn row_to_email(row: &libsql::Row) -> Result<Email, libsql::Error> {
    let id_str: String = row.get(0)?;
    let received_str: String = row.get(5)?;
    let processed: i64 = row.get(6)?;

    Ok(Email {
        id: parse_uuid(&id_str),
        subject: row.get(1)?,
        sender_email: row.get(2)?,
        sender_name: row.get(3).ok(),
        raw_content: row.get(4)?,
        received_at: parse_datetime(&received_str),
        processed: processed != 0,
    })
}

/// Map a libsql row to an AnalyzedEmail.
///
/// Column order matches ANALYZED_COLUMNS:
/// 0:id, 1:email_id, 2:category_id, 3:category, 4:importance_score,
/// 5:title_optimized, 6:summary, 7:content_markdown, 8:key_points, 9:tags,
/// 10:images, 11:important_links, 12:reading_time, 13:sentiment,
/// 14:action_items, 15:created_at
fn row_to_analyzed(row: &libsql::Row) -> Result<AnalyzedEmail, libsql::Error> {
    let id_str: String = row.get(0)?;
    let email_id_str: String = row.get(1)?;
    let category_id_str: Option<String> = row.get(2).ok();
    let score: i64 = row.get(4)?;
    let key_points: String = row.get(8)?;
    let tags: String = row.get(9)?;
    let images: String = row.get(10)?;
    let important_links: String = row.get(11)?;
    let reading_time: i64 = row.get(12)?;
    let sentiment_str: String = row.get(13)?;
    let action_items: String = row.get(14)?;
    let created_str: String = row.get(15)?;

    Ok(AnalyzedEmail {
        id: parse_uuid(&id_str),
        email_id: parse_uuid(&email_id_str),
        category_id: category_id_str.as_deref().map(parse_uuid),
        analysis: Analysis {
            category: row.get(3)?,
            importance_score: score.clamp(1, 10) as u8,
            title_optimized: row.get(5)?,
            summary: row.get(6)?,
            content_markdown: row.get(7)?,
            key_points: parse_json_list(&key_points),
            tags: parse_json_list(&tags),
            images: parse_json_list::<ImageRef>(&images),
            important_links: parse_json_list(&important_links),
            reading_time: reading_time.max(0) as u32,
            sentiment: str_to_sentiment(&sentiment_str),
            action_items: parse_json_list(&action_items),
        },
        created_at: parse_datetime(&created_str),
    })
}

fn row_to_category(row: &libsql::Row) -> Result<Category, libsql::Error> {
    let id_str: String = row.get(0)?;
    Ok(Category {
        id: parse_uuid(&id_str),
        name: row.get(1)?,
        color: row.get(2).ok(),
        icon: row.get(3).ok(),
        description: row.get(4).ok(),
    })
}

fn row_to_summary(row: &libsql::Row) -> Result<DailySummary, libsql::Error> {
    let id_str: String = row.get(0)?;
    let date_str: String = row.get(1)?;
    let total: i64 = row.get(3)?;
    let categories_str: String = row.get(4)?;
    let created_str: String = row.get(5)?;

    Ok(DailySummary {
        id: parse_uuid(&id_str),
        date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").unwrap_or_default(),
        content_markdown: row.get(2)?,
        total_emails: total.max(0) as u32,
        categories_summary: serde_json::from_str::<CategoriesSummary>(&categories_str)
            .unwrap_or_default(),
        created_at: parse_datetime(&created_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

const EMAIL_COLUMNS: &str =
    "id, subject, sender_email, sender_name, raw_content, received_at, processed";

const ANALYZED_COLUMNS: &str = "id, email_id, category_id, category, importance_score, \
     title_optimized, summary, content_markdown, key_points, tags, images, important_links, \
     reading_time, sentiment, action_items, created_at";

const CATEGORY_COLUMNS: &str = "id, name, color, icon, description";

const SUMMARY_COLUMNS: &str =
    "id, date, content_markdown, total_emails, categories_summary, created_at";

#[async_trait]
impl Database for LibSqlBackend {
    async fn insert_email(
        &self,
        email: &NewEmail,
        received_at: DateTime<Utc>,
    ) -> Result<Email, DatabaseError> {
        let id = Uuid::new_v4();

        self.conn()
            .execute(
                "INSERT INTO emails (id, subject, sender_email, sender_name, raw_content, received_at, processed) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
                params![
                    id.to_string(),
                    email.subject.clone(),
                    email.sender_email.clone(),
                    opt_text(email.sender_name.as_deref()),
                    email.raw_content.clone(),
                    fmt_ts(received_at),
                ],
            )
            .await
            .map_err(|e| map_query_err("insert_email", e))?;

        debug!(email_id = %id, sender = %email.sender_email, "Email stored");

        Ok(Email {
            id,
            subject: email.subject.clone(),
            sender_email: email.sender_email.clone(),
            sender_name: email.sender_name.clone(),
            raw_content: email.raw_content.clone(),
            received_at,
            processed: false,
        })
    }

    async fn get_email(&self, id: Uuid) -> Result<Option<Email>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {EMAIL_COLUMNS} FROM emails WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| map_query_err("get_email", e))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row_to_email(&row).map_err(|e| map_query_err("get_email", e))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(map_query_err("get_email", e)),
        }
    }

    async fn list_emails(
        &self,
        skip: u32,
        limit: u32,
        processed: Option<bool>,
    ) -> Result<Vec<Email>, DatabaseError> {
        let sql = match processed {
            Some(_) => format!(
                "SELECT {EMAIL_COLUMNS} FROM emails WHERE processed = ?1 \
                 ORDER BY received_at DESC LIMIT ?2 OFFSET ?3"
            ),
            None => format!(
                "SELECT {EMAIL_COLUMNS} FROM emails \
                 ORDER BY received_at DESC LIMIT ?1 OFFSET ?2"
            ),
        };

        let mut rows = match processed {
            Some(flag) => self
                .conn()
                .query(&sql, params![flag as i64, limit as i64, skip as i64])
                .await,
            None => self
                .conn()
                .query(&sql, params![limit as i64, skip as i64])
                .await,
        }
        .map_err(|e| map_query_err("list_emails", e))?;

        let mut emails = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            emails.push(row_to_email(&row).map_err(|e| map_query_err("list_emails", e))?);
        }
        Ok(emails)
    }

    async fn mark_email_processed(&self, id: Uuid) -> Result<(), DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE emails SET processed = 1 WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| map_query_err("mark_email_processed", e))?;

        if changed == 0 {
            return Err(DatabaseError::not_found("email", id));
        }
        Ok(())
    }

    async fn list_processed_emails_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Email>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {EMAIL_COLUMNS} FROM emails \
                     WHERE received_at >= ?1 AND received_at < ?2 AND processed = 1 \
                     ORDER BY received_at ASC"
                ),
                params![fmt_ts(start), fmt_ts(end)],
            )
            .await
            .map_err(|e| map_query_err("list_processed_emails_between", e))?;

        let mut emails = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            emails.push(
                row_to_email(&row).map_err(|e| map_query_err("list_processed_emails_between", e))?,
            );
        }
        Ok(emails)
    }

    async fn insert_analyzed(&self, item: &AnalyzedEmail) -> Result<(), DatabaseError> {
        let analysis = &item.analysis;

        self.conn()
            .execute(
                "INSERT INTO analyzed_emails (id, email_id, category_id, category, importance_score, \
                 title_optimized, summary, content_markdown, key_points, tags, images, \
                 important_links, reading_time, sentiment, action_items, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    item.id.to_string(),
                    item.email_id.to_string(),
                    opt_text(item.category_id.map(|id| id.to_string()).as_deref()),
                    analysis.category.clone(),
                    analysis.importance_score as i64,
                    analysis.title_optimized.clone(),
                    analysis.summary.clone(),
                    analysis.content_markdown.clone(),
                    json_list(&analysis.key_points)?,
                    json_list(&analysis.tags)?,
                    json_list(&analysis.images)?,
                    json_list(&analysis.important_links)?,
                    analysis.reading_time as i64,
                    sentiment_to_str(analysis.sentiment),
                    json_list(&analysis.action_items)?,
                    fmt_ts(item.created_at),
                ],
            )
            .await
            .map_err(|e| map_query_err("insert_analyzed", e))?;

        debug!(analyzed_id = %item.id, email_id = %item.email_id, "Analyzed record stored");
        Ok(())
    }

    async fn list_analyzed_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AnalyzedEmail>, DatabaseError> {
        // Joins on the parent's timestamp only; processed is intentionally
        // not part of the filter.
        let columns: String = ANALYZED_COLUMNS
            .split(", ")
            .map(|c| format!("a.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");

        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {columns} FROM analyzed_emails a \
                     JOIN emails e ON a.email_id = e.id \
                     WHERE e.received_at >= ?1 AND e.received_at < ?2 \
                     ORDER BY a.created_at ASC, a.id ASC"
                ),
                params![fmt_ts(start), fmt_ts(end)],
            )
            .await
            .map_err(|e| map_query_err("list_analyzed_between", e))?;

        let mut items = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            items.push(row_to_analyzed(&row).map_err(|e| map_query_err("list_analyzed_between", e))?);
        }
        Ok(items)
    }

    async fn insert_category(&self, category: &NewCategory) -> Result<Category, DatabaseError> {
        let id = Uuid::new_v4();

        self.conn()
            .execute(
                "INSERT INTO categories (id, name, color, icon, description) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.to_string(),
                    category.name.clone(),
                    opt_text(category.color.as_deref()),
                    opt_text(category.icon.as_deref()),
                    opt_text(category.description.as_deref()),
                ],
            )
            .await
            .map_err(|e| map_query_err("insert_category", e))?;

        Ok(Category {
            id,
            name: category.name.clone(),
            color: category.color.clone(),
            icon: category.icon.clone(),
            description: category.description.clone(),
        })
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| map_query_err("get_category", e))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row_to_category(&row).map_err(|e| map_query_err("get_category", e))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(map_query_err("get_category", e)),
        }
    }

    async fn get_category_by_name(&self, name: &str) -> Result<Option<Category>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {CATEGORY_COLUMNS} FROM categories WHERE name = ?1 COLLATE NOCASE"
                ),
                params![name],
            )
            .await
            .map_err(|e| map_query_err("get_category_by_name", e))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row_to_category(&row).map_err(|e| map_query_err("get_category_by_name", e))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(map_query_err("get_category_by_name", e)),
        }
    }

    async fn list_categories(&self) -> Result<Vec<Category>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name ASC"),
                (),
            )
            .await
            .map_err(|e| map_query_err("list_categories", e))?;

        let mut categories = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            categories.push(row_to_category(&row).map_err(|e| map_query_err("list_categories", e))?);
        }
        Ok(categories)
    }

    async fn update_category(
        &self,
        id: Uuid,
        update: &CategoryUpdate,
    ) -> Result<Option<Category>, DatabaseError> {
        let Some(existing) = self.get_category(id).await? else {
            return Ok(None);
        };

        let updated = Category {
            id,
            name: update.name.clone().unwrap_or(existing.name),
            color: update.color.clone().or(existing.color),
            icon: update.icon.clone().or(existing.icon),
            description: update.description.clone().or(existing.description),
        };

        self.conn()
            .execute(
                "UPDATE categories SET name = ?1, color = ?2, icon = ?3, description = ?4 \
                 WHERE id = ?5",
                params![
                    updated.name.clone(),
                    opt_text(updated.color.as_deref()),
                    opt_text(updated.icon.as_deref()),
                    opt_text(updated.description.as_deref()),
                    id.to_string(),
                ],
            )
            .await
            .map_err(|e| map_query_err("update_category", e))?;

        Ok(Some(updated))
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "DELETE FROM categories WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| map_query_err("delete_category", e))?;

        Ok(changed > 0)
    }

    async fn get_daily_summary(
        &self,
        date: NaiveDate,
    ) -> Result<Option<DailySummary>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {SUMMARY_COLUMNS} FROM daily_summaries WHERE date = ?1"),
                params![date.to_string()],
            )
            .await
            .map_err(|e| map_query_err("get_daily_summary", e))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row_to_summary(&row).map_err(|e| map_query_err("get_daily_summary", e))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(map_query_err("get_daily_summary", e)),
        }
    }

    async fn upsert_daily_summary(
        &self,
        date: NaiveDate,
        content_markdown: &str,
        total_emails: u32,
        categories_summary: &CategoriesSummary,
    ) -> Result<DailySummary, DatabaseError> {
        let categories_json = serde_json::to_string(categories_summary)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        // Full-document replace on conflict; never a merge.
        self.conn()
            .execute(
                "INSERT INTO daily_summaries (id, date, content_markdown, total_emails, categories_summary, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(date) DO UPDATE SET \
                     content_markdown = excluded.content_markdown, \
                     total_emails = excluded.total_emails, \
                     categories_summary = excluded.categories_summary",
                params![
                    Uuid::new_v4().to_string(),
                    date.to_string(),
                    content_markdown,
                    total_emails as i64,
                    categories_json,
                    fmt_ts(Utc::now()),
                ],
            )
            .await
            .map_err(|e| map_query_err("upsert_daily_summary", e))?;

        // Re-read so the caller gets the persisted state, not a stale copy.
        self.get_daily_summary(date)
            .await?
            .ok_or_else(|| DatabaseError::not_found("daily_summary", date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::analyzer::default_analysis;
    use chrono::TimeZone;

    fn new_email(subject: &str) -> NewEmail {
        NewEmail {
            subject: subject.to_string(),
            sender_email: "alice@example.com".to_string(),
            sender_name: Some("Alice".to_string()),
            raw_content: "Hello there".to_string(),
        }
    }

    fn analyzed_for(email_id: Uuid, score: u8) -> AnalyzedEmail {
        let mut analysis = default_analysis();
        analysis.importance_score = score;
        AnalyzedEmail {
            id: Uuid::new_v4(),
            email_id,
            category_id: None,
            analysis,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_get_email_roundtrip() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let received = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap();

        let stored = db.insert_email(&new_email("Hi"), received).await.unwrap();
        let fetched = db.get_email(stored.id).await.unwrap().unwrap();

        assert_eq!(fetched.subject, "Hi");
        assert_eq!(fetched.sender_name.as_deref(), Some("Alice"));
        assert_eq!(fetched.received_at, received);
        assert!(!fetched.processed);
    }

    #[tokio::test]
    async fn get_email_missing_returns_none() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        assert!(db.get_email(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_processed_flips_flag_once() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let stored = db.insert_email(&new_email("Hi"), Utc::now()).await.unwrap();

        db.mark_email_processed(stored.id).await.unwrap();
        let fetched = db.get_email(stored.id).await.unwrap().unwrap();
        assert!(fetched.processed);
    }

    #[tokio::test]
    async fn mark_processed_missing_is_not_found() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let err = db.mark_email_processed(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn range_query_is_half_open() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let day_start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let day_end = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();

        let inside = db
            .insert_email(&new_email("inside"), day_start)
            .await
            .unwrap();
        let late = db
            .insert_email(
                &new_email("late"),
                Utc.with_ymd_and_hms(2025, 6, 1, 23, 59, 59).unwrap(),
            )
            .await
            .unwrap();
        let boundary = db.insert_email(&new_email("boundary"), day_end).await.unwrap();

        for id in [inside.id, late.id, boundary.id] {
            db.mark_email_processed(id).await.unwrap();
        }

        let emails = db
            .list_processed_emails_between(day_start, day_end)
            .await
            .unwrap();
        let subjects: Vec<_> = emails.iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(subjects, vec!["inside", "late"]);
    }

    #[tokio::test]
    async fn unprocessed_emails_excluded_from_processed_range() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let day_start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let day_end = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();

        db.insert_email(&new_email("pending"), day_start)
            .await
            .unwrap();

        let emails = db
            .list_processed_emails_between(day_start, day_end)
            .await
            .unwrap();
        assert!(emails.is_empty());
    }

    #[tokio::test]
    async fn analyzed_join_ignores_processed_flag() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let day_start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let day_end = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();

        // Email analyzed but not yet marked processed.
        let email = db
            .insert_email(&new_email("mid-processing"), day_start)
            .await
            .unwrap();
        db.insert_analyzed(&analyzed_for(email.id, 6)).await.unwrap();

        let items = db.list_analyzed_between(day_start, day_end).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].email_id, email.id);
    }

    #[tokio::test]
    async fn analyzed_roundtrip_preserves_lists_and_sentiment() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let received = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let email = db.insert_email(&new_email("rt"), received).await.unwrap();

        let mut item = analyzed_for(email.id, 9);
        item.analysis.sentiment = Sentiment::Negative;
        item.analysis.key_points = vec!["a".to_string(), "b".to_string()];
        item.analysis.images = vec![ImageRef {
            url: "https://x/y.png".to_string(),
            alt: "logo".to_string(),
            caption: Some("The logo".to_string()),
        }];
        db.insert_analyzed(&item).await.unwrap();

        let items = db
            .list_analyzed_between(received, received + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(items[0].analysis.sentiment, Sentiment::Negative);
        assert_eq!(items[0].analysis.key_points, vec!["a", "b"]);
        assert_eq!(items[0].analysis.images, item.analysis.images);
    }

    #[tokio::test]
    async fn category_crud() {
        let db = LibSqlBackend::new_memory().await.unwrap();

        let created = db
            .insert_category(&NewCategory {
                name: "Tech".to_string(),
                color: Some("#ff0000".to_string()),
                icon: None,
                description: None,
            })
            .await
            .unwrap();

        let by_name = db.get_category_by_name("tech").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);

        let updated = db
            .update_category(
                created.id,
                &CategoryUpdate {
                    description: Some("Technology news".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Tech");
        assert_eq!(updated.description.as_deref(), Some("Technology news"));

        assert!(db.delete_category(created.id).await.unwrap());
        assert!(!db.delete_category(created.id).await.unwrap());
        assert!(db.get_category(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_category_name_is_constraint_error() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let category = NewCategory {
            name: "Tech".to_string(),
            color: None,
            icon: None,
            description: None,
        };

        db.insert_category(&category).await.unwrap();
        let err = db.insert_category(&category).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)));
    }

    #[tokio::test]
    async fn category_deletion_leaves_analyzed_references() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let received = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let email = db.insert_email(&new_email("weak"), received).await.unwrap();

        let category = db
            .insert_category(&NewCategory {
                name: "Tech".to_string(),
                color: None,
                icon: None,
                description: None,
            })
            .await
            .unwrap();

        let mut item = analyzed_for(email.id, 7);
        item.category_id = Some(category.id);
        db.insert_analyzed(&item).await.unwrap();

        assert!(db.delete_category(category.id).await.unwrap());

        // The analyzed row still carries the dangling reference.
        let items = db
            .list_analyzed_between(received, received + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(items[0].category_id, Some(category.id));
    }

    #[tokio::test]
    async fn summary_upsert_overwrites_in_place() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

        let first = db
            .upsert_daily_summary(date, "# v1", 3, &CategoriesSummary::new())
            .await
            .unwrap();
        let second = db
            .upsert_daily_summary(date, "# v2", 5, &CategoriesSummary::new())
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.content_markdown, "# v2");
        assert_eq!(second.total_emails, 5);

        let fetched = db.get_daily_summary(date).await.unwrap().unwrap();
        assert_eq!(fetched.content_markdown, "# v2");
    }

    #[tokio::test]
    async fn open_creates_parent_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("mail-digest.db");
        let db = LibSqlBackend::new_local(&db_path).await.unwrap();
        assert!(db_path.exists());
        drop(db);
    }
}
