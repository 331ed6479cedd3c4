//! Daily digest aggregation — groups a day's analyzed emails by category,
//! ranks by importance and renders the Markdown digest.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::error::Error;
use crate::model::{AnalyzedEmail, CategoriesSummary, CategoryStats, DailySummary, TopItem};
use crate::store::Database;

/// Importance threshold for a category's shortlist.
const TOP_ITEM_THRESHOLD: u8 = 7;

/// Shortlist length per category.
const TOP_ITEMS_PER_CATEGORY: usize = 5;

/// Number of items in the Top Stories section.
const TOP_STORIES: usize = 10;

/// Generates per-day digest documents. Deterministic given identical stored
/// data: regenerating over an unchanged day yields byte-identical Markdown.
#[derive(Debug, Clone, Default)]
pub struct SummaryGenerator;

impl SummaryGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Compute and upsert the summary for a calendar date (UTC day
    /// boundaries, half-open interval).
    pub async fn generate(
        &self,
        date: NaiveDate,
        db: &dyn Database,
    ) -> Result<DailySummary, Error> {
        let (start, end) = day_interval(date);

        let emails = db.list_processed_emails_between(start, end).await?;
        let analyzed = db.list_analyzed_between(start, end).await?;

        let categories_summary = build_categories_summary(&analyzed);
        let markdown = render_markdown(date, emails.len(), &analyzed, &categories_summary);

        let summary = db
            .upsert_daily_summary(date, &markdown, emails.len() as u32, &categories_summary)
            .await?;
        Ok(summary)
    }
}

/// The half-open UTC interval `[day start, day start + 24h)`.
fn day_interval(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

/// Group analyzed items by category id, in first-seen order.
///
/// Items without a category id are excluded from the grouping entirely — not
/// bucketed as "uncategorized".
fn build_categories_summary(items: &[AnalyzedEmail]) -> CategoriesSummary {
    let mut categories = CategoriesSummary::new();

    for item in items {
        let Some(category_id) = item.category_id else {
            continue;
        };

        let stats = categories
            .entry(category_id.to_string())
            .or_insert_with(|| CategoryStats {
                count: 0,
                importance_total: 0,
                average_importance: 0.0,
                top_items: Vec::new(),
            });

        stats.count += 1;
        stats.importance_total += item.analysis.importance_score as u32;

        if item.analysis.importance_score >= TOP_ITEM_THRESHOLD {
            stats.top_items.push(TopItem {
                title: item.analysis.title_optimized.clone(),
                summary: item.analysis.summary.clone(),
                score: item.analysis.importance_score,
            });
        }
    }

    for stats in categories.values_mut() {
        // Stable sort: equal scores keep their original relative order.
        stats.top_items.sort_by(|a, b| b.score.cmp(&a.score));
        stats.top_items.truncate(TOP_ITEMS_PER_CATEGORY);
        stats.average_importance = if stats.count > 0 {
            f64::from(stats.importance_total) / f64::from(stats.count)
        } else {
            0.0
        };
    }

    categories
}

/// Render the digest document.
fn render_markdown(
    date: NaiveDate,
    total_emails: usize,
    analyzed: &[AnalyzedEmail],
    categories: &CategoriesSummary,
) -> String {
    let mut lines: Vec<String> = vec![
        format!("# Daily Email Summary - {date}"),
        String::new(),
        format!("**Total Emails Received:** {total_emails}"),
        format!("**Processed Emails:** {}", analyzed.len()),
        String::new(),
        "## Top Stories".to_string(),
        String::new(),
    ];

    let mut top: Vec<&AnalyzedEmail> = analyzed.iter().collect();
    top.sort_by(|a, b| {
        b.analysis
            .importance_score
            .cmp(&a.analysis.importance_score)
    });
    top.truncate(TOP_STORIES);

    for (idx, item) in top.iter().enumerate() {
        lines.push(format!("### {}. {}", idx + 1, item.analysis.title_optimized));
        lines.push(format!(
            "*Importance: {}/10*",
            item.analysis.importance_score
        ));
        lines.push(String::new());

        let summary = if item.analysis.summary.is_empty() {
            "No summary available"
        } else {
            item.analysis.summary.as_str()
        };
        lines.push(summary.to_string());
        lines.push(String::new());

        if !item.analysis.key_points.is_empty() {
            lines.push("**Key Points:**".to_string());
            for point in item.analysis.key_points.iter().take(3) {
                lines.push(format!("- {point}"));
            }
            lines.push(String::new());
        }
    }

    lines.push("## Category Distribution".to_string());
    lines.push(String::new());

    for (category_id, stats) in categories {
        lines.push(format!(
            "- **Category {category_id}**: {} emails",
            stats.count
        ));
        lines.push(format!(
            "  Average Importance: {:.1}/10",
            stats.average_importance
        ));
        lines.push(String::new());
    }

    lines.join("\n")
}
