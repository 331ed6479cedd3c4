//! Ingestion entry point — accepts a raw email and runs
//! normalize → analyze → persist as a detached background unit of work.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{DatabaseError, Error};
use crate::model::{AnalyzedEmail, Email, NewEmail};
use crate::pipeline::analyzer::AiAnalyzer;
use crate::pipeline::normalizer::ContentNormalizer;
use crate::store::Database;

/// Orchestrates the per-email processing pipeline.
pub struct EmailPipeline {
    db: Arc<dyn Database>,
    normalizer: ContentNormalizer,
    analyzer: AiAnalyzer,
}

impl EmailPipeline {
    pub fn new(db: Arc<dyn Database>, analyzer: AiAnalyzer) -> Self {
        Self {
            db,
            normalizer: ContentNormalizer::new(),
            analyzer,
        }
    }

    /// Store a raw email and kick off background analysis.
    ///
    /// Returns as soon as the email row is committed; the analyzed result is
    /// not observable from this call.
    pub async fn accept(self: &Arc<Self>, email: &NewEmail) -> Result<Email, Error> {
        let stored = self.db.insert_email(email, Utc::now()).await?;
        info!(email_id = %stored.id, sender = %stored.sender_email, "Email accepted");
        self.spawn_analysis(stored.id);
        Ok(stored)
    }

    /// Spawn a detached analysis task for one email.
    ///
    /// There is no de-duplication: two triggers for the same email run two
    /// independent analyses, layered by commit order — last committed wins
    /// on the processed flag and duplicate analyzed rows may result.
    pub fn spawn_analysis(self: &Arc<Self>, email_id: Uuid) -> JoinHandle<()> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = pipeline.process(email_id).await {
                error!(email_id = %email_id, error = %e, "Email analysis failed");
            }
        })
    }

    /// Run the full pipeline for one stored email:
    /// normalize → analyze → insert analyzed record → mark processed.
    ///
    /// Normalization and model failures never surface here — both degrade to
    /// valid output. Only structural problems (missing email, storage
    /// failure) return an error.
    pub async fn process(&self, email_id: Uuid) -> Result<(), Error> {
        let email = self
            .db
            .get_email(email_id)
            .await?
            .ok_or_else(|| DatabaseError::not_found("email", email_id))?;

        let content = self.normalizer.normalize(&email.raw_content);
        let result = self
            .analyzer
            .analyze(&email.subject, &email.sender_email, &content)
            .await;

        // Resolve the model's free-form label against stored categories by
        // name; no match leaves the weak reference empty.
        let category_id = match self.db.get_category_by_name(&result.analysis.category).await {
            Ok(category) => category.map(|c| c.id),
            Err(e) => {
                warn!(error = %e, label = %result.analysis.category, "Category lookup failed");
                None
            }
        };

        let item = AnalyzedEmail {
            id: Uuid::new_v4(),
            email_id,
            category_id,
            analysis: result.analysis,
            created_at: Utc::now(),
        };
        self.db.insert_analyzed(&item).await?;
        self.db.mark_email_processed(email_id).await?;

        info!(
            email_id = %email_id,
            category = %item.analysis.category,
            score = item.analysis.importance_score,
            source = ?result.source,
            "Email analyzed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::error::LlmError;
    use crate::llm::{ChatRequest, LlmClient};
    use crate::model::NewCategory;
    use crate::store::LibSqlBackend;
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::time::Duration;

    struct FixedLlm(String);

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn chat(&self, _request: ChatRequest) -> Result<String, LlmError> {
            Ok(self.0.clone())
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl LlmClient for FailingLlm {
        async fn chat(&self, _request: ChatRequest) -> Result<String, LlmError> {
            Err(LlmError::RequestFailed("connection refused".to_string()))
        }
    }

    fn test_config() -> AppConfig {
        AppConfig {
            http_bind: "127.0.0.1:0".to_string(),
            db_path: ":memory:".to_string(),
            openrouter_api_key: SecretString::from("test-key"),
            openrouter_base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "anthropic/claude-3-haiku".to_string(),
            temperature: 0.3,
            max_tokens: 2000,
            request_timeout: Duration::from_secs(30),
            allowed_senders: Vec::new(),
        }
    }

    async fn pipeline_with(llm: impl LlmClient + 'static) -> (Arc<EmailPipeline>, Arc<dyn Database>) {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let analyzer = AiAnalyzer::new(Arc::new(llm), &test_config());
        (
            Arc::new(EmailPipeline::new(Arc::clone(&db), analyzer)),
            db,
        )
    }

    fn tech_payload() -> String {
        r##"{
            "category": "TECH",
            "importance_score": 8,
            "title_optimized": "Big release",
            "summary": "Something shipped",
            "content_markdown": "# Release",
            "reading_time": 2,
            "sentiment": "positive"
        }"##
        .to_string()
    }

    fn new_email() -> NewEmail {
        NewEmail {
            subject: "Release notes".to_string(),
            sender_email: "news@example.com".to_string(),
            sender_name: None,
            raw_content: "<p>Hello</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn process_stores_analysis_and_marks_processed() {
        let (pipeline, db) = pipeline_with(FixedLlm(tech_payload())).await;
        let stored = db.insert_email(&new_email(), Utc::now()).await.unwrap();

        pipeline.process(stored.id).await.unwrap();

        let email = db.get_email(stored.id).await.unwrap().unwrap();
        assert!(email.processed);

        let day_start = Utc::now() - chrono::Duration::hours(1);
        let day_end = Utc::now() + chrono::Duration::hours(1);
        let items = db.list_analyzed_between(day_start, day_end).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].analysis.category, "TECH");
    }

    #[tokio::test]
    async fn model_failure_still_marks_processed_with_default() {
        let (pipeline, db) = pipeline_with(FailingLlm).await;
        let stored = db.insert_email(&new_email(), Utc::now()).await.unwrap();

        pipeline.process(stored.id).await.unwrap();

        let email = db.get_email(stored.id).await.unwrap().unwrap();
        assert!(email.processed);

        let items = db
            .list_analyzed_between(
                Utc::now() - chrono::Duration::hours(1),
                Utc::now() + chrono::Duration::hours(1),
            )
            .await
            .unwrap();
        assert_eq!(items[0].analysis.category, "OTHER");
        assert_eq!(items[0].analysis.importance_score, 5);
    }

    #[tokio::test]
    async fn process_missing_email_is_not_found() {
        let (pipeline, _db) = pipeline_with(FixedLlm(tech_payload())).await;
        let err = pipeline.process(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Database(DatabaseError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn category_label_resolves_to_stored_category() {
        let (pipeline, db) = pipeline_with(FixedLlm(tech_payload())).await;
        let category = db
            .insert_category(&NewCategory {
                name: "tech".to_string(),
                color: None,
                icon: None,
                description: None,
            })
            .await
            .unwrap();

        let stored = db.insert_email(&new_email(), Utc::now()).await.unwrap();
        pipeline.process(stored.id).await.unwrap();

        let items = db
            .list_analyzed_between(
                Utc::now() - chrono::Duration::hours(1),
                Utc::now() + chrono::Duration::hours(1),
            )
            .await
            .unwrap();
        assert_eq!(items[0].category_id, Some(category.id));
    }

    #[tokio::test]
    async fn accept_returns_before_analysis_completes() {
        let (pipeline, db) = pipeline_with(FixedLlm(tech_payload())).await;

        let stored = pipeline.accept(&new_email()).await.unwrap();
        assert!(!stored.processed);

        // The detached task finishes eventually; poll for it.
        for _ in 0..50 {
            if db.get_email(stored.id).await.unwrap().unwrap().processed {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("background analysis never completed");
    }

    #[tokio::test]
    async fn duplicate_triggers_produce_duplicate_rows() {
        let (pipeline, db) = pipeline_with(FixedLlm(tech_payload())).await;
        let stored = db.insert_email(&new_email(), Utc::now()).await.unwrap();

        // Two triggers for the same email: no dedup by design.
        pipeline.process(stored.id).await.unwrap();
        pipeline.process(stored.id).await.unwrap();

        let items = db
            .list_analyzed_between(
                Utc::now() - chrono::Duration::hours(1),
                Utc::now() + chrono::Duration::hours(1),
            )
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
    }
}
