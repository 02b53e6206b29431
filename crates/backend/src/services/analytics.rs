//! Daily analytics aggregation.
//!
//! A day's snapshot is always recomputed from the emails received that UTC
//! day and upserted by date, so running it any number of times leaves one
//! row per day.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use shared_types::{
    AnalyticsSummary, CategoryCount, DailyAnalytics, DashboardStats, Email, EmailStatus,
    Priority, Sentiment, SentimentTotals,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::StoreError;
use crate::repository::EmailStore;

/// Most categories a distribution reports
pub const MAX_CATEGORIES: usize = 10;

/// Service for analytics snapshots
#[derive(Clone)]
pub struct AnalyticsService {
    store: Arc<dyn EmailStore>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn EmailStore>) -> Self {
        Self { store }
    }

    /// Recompute and store the snapshot for `date`
    pub async fn refresh_day(&self, date: NaiveDate) -> Result<DailyAnalytics, StoreError> {
        let start = day_start(date);
        let emails = self
            .store
            .list_emails_received_between(start, start + Duration::days(1))
            .await?;

        let mut first_sent = Vec::with_capacity(emails.len());
        for email in &emails {
            let responses = self.store.list_responses(email.id).await?;
            first_sent.push(responses.iter().filter_map(|r| r.sent_at).min());
        }

        let stats = aggregate_day(date, &emails, &first_sent);
        tracing::debug!(
            "Analytics for {}: {} emails, {} urgent",
            date,
            stats.total_emails,
            stats.urgent_emails
        );
        self.store.upsert_daily_analytics(stats).await
    }

    /// Live counters for mail received today, read straight from the emails
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, StoreError> {
        let start = day_start(Utc::now().date_naive());
        let emails = self
            .store
            .list_emails_received_between(start, start + Duration::days(1))
            .await?;

        let mut stats = DashboardStats {
            total_today: emails.len() as i64,
            ..Default::default()
        };
        for email in &emails {
            if email.priority == Priority::Urgent {
                stats.urgent += 1;
            }
            match email.status {
                EmailStatus::Resolved => stats.resolved += 1,
                EmailStatus::Pending => stats.pending += 1,
                EmailStatus::Draft => {}
            }
        }
        Ok(stats)
    }

    /// Most common categories among mail received in the last `days` days
    pub async fn category_distribution(&self, days: u32) -> Result<Vec<CategoryCount>, StoreError> {
        let today = Utc::now().date_naive();
        let from = today - Duration::days(i64::from(days.max(1)) - 1);
        let emails = self
            .store
            .list_emails_received_between(day_start(from), day_start(today) + Duration::days(1))
            .await?;
        Ok(count_categories(&emails))
    }

    /// Stored snapshots for the last `days` days (today included)
    pub async fn summary(&self, days: u32) -> Result<AnalyticsSummary, StoreError> {
        let to = Utc::now().date_naive();
        let from = to - Duration::days(i64::from(days.max(1)) - 1);
        let snapshots = self.store.list_analytics(from, to).await?;

        let sentiment = snapshots
            .iter()
            .fold(SentimentTotals::default(), |mut totals, day| {
                totals.positive += i64::from(day.positive_emails);
                totals.neutral += i64::from(day.neutral_emails);
                totals.negative += i64::from(day.negative_emails);
                totals
            });

        Ok(AnalyticsSummary {
            days: snapshots,
            sentiment,
        })
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Category counts, largest first with ties by name, capped at
/// `MAX_CATEGORIES`
pub fn count_categories(emails: &[Email]) -> Vec<CategoryCount> {
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for email in emails {
        *counts.entry(email.category.as_str()).or_default() += 1;
    }

    let mut distribution: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(category, count)| CategoryCount {
            category: category.to_string(),
            count,
        })
        .collect();
    distribution.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
    distribution.truncate(MAX_CATEGORIES);
    distribution
}

/// Count one day's emails. `first_sent[i]` is the earliest sent response
/// for `emails[i]`, if any.
pub fn aggregate_day(
    date: NaiveDate,
    emails: &[Email],
    first_sent: &[Option<DateTime<Utc>>],
) -> DailyAnalytics {
    let mut stats = DailyAnalytics {
        date,
        ..Default::default()
    };

    for email in emails {
        stats.total_emails += 1;
        match email.priority {
            Priority::Urgent => stats.urgent_emails += 1,
            Priority::Normal => stats.normal_emails += 1,
            Priority::Low => stats.low_emails += 1,
        }
        match email.status {
            EmailStatus::Resolved => stats.resolved_emails += 1,
            EmailStatus::Pending => stats.pending_emails += 1,
            EmailStatus::Draft => {}
        }
        match email.sentiment {
            Sentiment::Positive => stats.positive_emails += 1,
            Sentiment::Neutral => stats.neutral_emails += 1,
            Sentiment::Negative => stats.negative_emails += 1,
        }
    }

    let latencies: Vec<i64> = emails
        .iter()
        .zip(first_sent)
        .filter_map(|(email, sent)| sent.map(|s| (s - email.received_at).num_minutes().max(0)))
        .collect();

    if !latencies.is_empty() {
        let total: i64 = latencies.iter().sum();
        stats.avg_response_time_minutes =
            (total as f64 / latencies.len() as f64).round() as i32;
    }

    stats
}
