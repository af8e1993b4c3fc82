use futures::future::join_all;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::graph::{GraphApi, GraphPage, InsightMetric, PageDetails, PostSummary};
use crate::providers::ProviderError;

/// Page-level metrics requested for every page
pub const PAGE_METRICS: [&str; 4] = [
    "page_impressions_unique",
    "page_post_engagements",
    "page_fan_adds",
    "page_views_total",
];

/// Rolling window for `PAGE_METRICS`
pub const METRIC_PERIOD: &str = "days_28";

#[derive(Debug, Error)]
pub enum AggregateError {
    /// The profile lookup failed, so there is no identity to aggregate for
    #[error("Facebook token rejected: {0}")]
    Unauthorized(ProviderError),

    #[error("Facebook pages could not be listed: {0}")]
    Provider(ProviderError),
}

/// Sub-fetch of a page that can fail on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSection {
    Details,
    Insights,
    Posts,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    pub fan_count: u64,
    pub followers_count: u64,
    pub insights: Vec<InsightMetric>,
    pub posts: Vec<PostSummary>,
    /// Sections that could not be fetched and were zeroed
    pub failures: Vec<PageSection>,
}

/// Request-scoped merge of profile, pages, insights and posts. Never stored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedRecord {
    pub name: String,
    pub pages: Vec<PageRecord>,
}

pub struct Aggregator {
    graph: Arc<dyn GraphApi>,
    timeout: Duration,
    post_limit: u32,
}

impl Aggregator {
    pub fn new(graph: Arc<dyn GraphApi>, timeout: Duration, post_limit: u32) -> Self {
        Self {
            graph,
            timeout,
            post_limit,
        }
    }

    pub async fn aggregate(&self, token: &str) -> Result<AggregatedRecord, AggregateError> {
        let profile = with_timeout(self.timeout, self.graph.profile(token))
            .await
            .map_err(AggregateError::Unauthorized)?;

        let pages = with_timeout(self.timeout, self.graph.pages(token))
            .await
            .map_err(AggregateError::Provider)?;
        debug!("Aggregating {} pages", pages.len());

        // join_all keeps input order and lets every page settle
        let pages = join_all(pages.into_iter().map(|page| self.collect_page(page))).await;

        Ok(AggregatedRecord {
            name: profile.name,
            pages,
        })
    }

    async fn collect_page(&self, page: GraphPage) -> PageRecord {
        let (details, insights, posts) = tokio::join!(
            with_timeout(self.timeout, self.graph.page_details(&page.id, &page.access_token)),
            with_timeout(
                self.timeout,
                self.graph
                    .page_insights(&page.id, &page.access_token, &PAGE_METRICS, METRIC_PERIOD)
            ),
            with_timeout(self.timeout, self.graph.page_posts(&page.id, &page.access_token, self.post_limit)),
        );

        let mut failures = Vec::new();

        let details = settle(&page.id, PageSection::Details, details, &mut failures).unwrap_or_default();
        let insights = settle(&page.id, PageSection::Insights, insights, &mut failures)
            .map(complete_metrics)
            .unwrap_or_else(|| complete_metrics(Vec::new()));
        let posts = settle(&page.id, PageSection::Posts, posts, &mut failures).unwrap_or_default();

        let PageDetails {
            fan_count,
            followers_count,
        } = details;

        PageRecord {
            id: page.id,
            name: page.name,
            category: page.category,
            access_token: page.access_token,
            fan_count,
            followers_count,
            insights,
            posts,
            failures,
        }
    }
}

/// Run a provider call under `timeout`; expiry counts as a provider failure.
async fn with_timeout<T, F>(timeout: Duration, call: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or(Err(ProviderError::Timeout))
}

fn settle<T>(
    page_id: &str,
    section: PageSection,
    result: Result<T, ProviderError>,
    failures: &mut Vec<PageSection>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Page {} {:?} unavailable, zeroing: {}", page_id, section, e);
            failures.push(section);
            None
        }
    }
}

/// Every requested metric appears exactly once, in request order, zero when
/// the provider returned nothing for it.
fn complete_metrics(fetched: Vec<InsightMetric>) -> Vec<InsightMetric> {
    PAGE_METRICS
        .iter()
        .map(|name| {
            fetched
                .iter()
                .find(|m| m.name == *name)
                .cloned()
                .unwrap_or_else(|| InsightMetric {
                    name: name.to_string(),
                    period: METRIC_PERIOD.to_string(),
                    value: 0,
                    end_time: None,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::graph::GraphProfile;
    use async_trait::async_trait;
    use serde_json::json;

    /// Serves `page_count` pages; the listed pages fail (or hang) per section.
    struct FakeGraph {
        page_count: usize,
        fail_insights: Vec<String>,
        fail_posts: Vec<String>,
        hang_details: Vec<String>,
        reject_profile: bool,
    }

    impl FakeGraph {
        fn with_pages(page_count: usize) -> Self {
            Self {
                page_count,
                fail_insights: Vec::new(),
                fail_posts: Vec::new(),
                hang_details: Vec::new(),
                reject_profile: false,
            }
        }
    }

    fn provider_500() -> ProviderError {
        ProviderError::Status {
            status: 500,
            body: json!({"error": {"message": "boom"}}),
        }
    }

    #[async_trait]
    impl GraphApi for FakeGraph {
        async fn profile(&self, _token: &str) -> Result<GraphProfile, ProviderError> {
            if self.reject_profile {
                return Err(ProviderError::Status {
                    status: 401,
                    body: json!({"error": {"code": 190}}),
                });
            }
            Ok(GraphProfile {
                id: "u1".into(),
                name: "Alice".into(),
            })
        }

        async fn pages(&self, _token: &str) -> Result<Vec<GraphPage>, ProviderError> {
            Ok((0..self.page_count)
                .map(|i| GraphPage {
                    id: format!("p{}", i),
                    name: format!("Page {}", i),
                    category: "Brand".into(),
                    access_token: format!("tok{}", i),
                })
                .collect())
        }

        async fn page_details(&self, page_id: &str, _page_token: &str) -> Result<PageDetails, ProviderError> {
            if self.hang_details.iter().any(|p| p == page_id) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(PageDetails {
                fan_count: 100,
                followers_count: 120,
            })
        }

        async fn page_insights(
            &self,
            page_id: &str,
            _page_token: &str,
            metrics: &[&str],
            period: &str,
        ) -> Result<Vec<InsightMetric>, ProviderError> {
            if self.fail_insights.iter().any(|p| p == page_id) {
                return Err(provider_500());
            }
            Ok(metrics
                .iter()
                .map(|m| InsightMetric {
                    name: m.to_string(),
                    period: period.to_string(),
                    value: 10,
                    end_time: None,
                })
                .collect())
        }

        async fn page_posts(&self, page_id: &str, _page_token: &str, limit: u32) -> Result<Vec<PostSummary>, ProviderError> {
            if self.fail_posts.iter().any(|p| p == page_id) {
                return Err(provider_500());
            }
            Ok((0..limit)
                .map(|i| PostSummary {
                    id: format!("{}_{}", page_id, i),
                    message: None,
                    created_time: None,
                    likes: 1,
                    comments: 2,
                    shares: 3,
                })
                .collect())
        }
    }

    fn aggregator(graph: FakeGraph) -> Aggregator {
        Aggregator::new(Arc::new(graph), Duration::from_millis(200), 5)
    }

    #[tokio::test]
    async fn failed_insights_zero_only_that_page() {
        for k in 0..4 {
            let mut graph = FakeGraph::with_pages(4);
            graph.fail_insights = vec![format!("p{}", k)];

            let record = aggregator(graph).aggregate("user-token").await.unwrap();
            assert_eq!(record.name, "Alice");
            assert_eq!(record.pages.len(), 4);

            for (i, page) in record.pages.iter().enumerate() {
                assert_eq!(page.id, format!("p{}", i), "page order is preserved");
                assert_eq!(page.insights.len(), PAGE_METRICS.len());
                assert_eq!(page.posts.len(), 5);
                if i == k {
                    assert!(page.insights.iter().all(|m| m.value == 0));
                    assert_eq!(page.failures, vec![PageSection::Insights]);
                } else {
                    assert!(page.insights.iter().all(|m| m.value == 10));
                    assert!(page.failures.is_empty());
                }
            }
        }
    }

    #[tokio::test]
    async fn posts_failure_leaves_metrics_intact() {
        let mut graph = FakeGraph::with_pages(2);
        graph.fail_posts = vec!["p1".into()];

        let record = aggregator(graph).aggregate("user-token").await.unwrap();
        assert!(record.pages[1].posts.is_empty());
        assert_eq!(record.pages[1].fan_count, 100);
        assert_eq!(record.pages[1].failures, vec![PageSection::Posts]);
        assert_eq!(record.pages[0].posts.len(), 5);
    }

    #[tokio::test]
    async fn slow_section_times_out_as_a_page_failure() {
        let mut graph = FakeGraph::with_pages(2);
        graph.hang_details = vec!["p0".into()];

        let record = aggregator(graph).aggregate("user-token").await.unwrap();
        assert_eq!(record.pages[0].fan_count, 0);
        assert_eq!(record.pages[0].followers_count, 0);
        assert_eq!(record.pages[0].failures, vec![PageSection::Details]);
        assert_eq!(record.pages[1].fan_count, 100);
    }

    #[tokio::test]
    async fn profile_failure_fails_fast() {
        let mut graph = FakeGraph::with_pages(3);
        graph.reject_profile = true;

        let err = aggregator(graph).aggregate("bad").await.unwrap_err();
        assert!(matches!(err, AggregateError::Unauthorized(_)));
    }

    #[test]
    fn missing_metrics_are_filled_with_zero() {
        let partial = vec![InsightMetric {
            name: "page_fan_adds".into(),
            period: METRIC_PERIOD.into(),
            value: 4,
            end_time: None,
        }];
        let complete = complete_metrics(partial);
        let names: Vec<_> = complete.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, PAGE_METRICS.to_vec());
        assert_eq!(complete[2].value, 4);
        assert_eq!(complete[0].value, 0);
    }

    #[test]
    fn page_tokens_stay_server_side() {
        let record = PageRecord {
            id: "p".into(),
            name: "P".into(),
            category: "c".into(),
            access_token: "page-secret".into(),
            fan_count: 0,
            followers_count: 0,
            insights: Vec::new(),
            posts: Vec::new(),
            failures: Vec::new(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("page-secret"));
    }
}
