use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::providers::{send_json, ProviderError};

/// Identity behind a delegated Facebook token
#[derive(Debug, Clone, Deserialize)]
pub struct GraphProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A page the user manages, with its own page-scoped token
#[derive(Debug, Clone, Deserialize)]
pub struct GraphPage {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub access_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDetails {
    pub fan_count: u64,
    pub followers_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightMetric {
    pub name: String,
    pub period: String,
    pub value: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: String,
    pub message: Option<String>,
    pub created_time: Option<String>,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
}

/// The slice of the Graph API the dashboard reads. Every call is bearer
/// authenticated with the token it is given.
#[async_trait]
pub trait GraphApi: Send + Sync {
    async fn profile(&self, token: &str) -> Result<GraphProfile, ProviderError>;

    async fn pages(&self, token: &str) -> Result<Vec<GraphPage>, ProviderError>;

    async fn page_details(&self, page_id: &str, page_token: &str) -> Result<PageDetails, ProviderError>;

    async fn page_insights(
        &self,
        page_id: &str,
        page_token: &str,
        metrics: &[&str],
        period: &str,
    ) -> Result<Vec<InsightMetric>, ProviderError>;

    async fn page_posts(&self, page_id: &str, page_token: &str, limit: u32) -> Result<Vec<PostSummary>, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RawInsight {
    name: String,
    #[serde(default)]
    period: String,
    #[serde(default)]
    values: Vec<RawInsightValue>,
}

#[derive(Debug, Deserialize)]
struct RawInsightValue {
    #[serde(default)]
    value: Value,
    end_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    id: String,
    message: Option<String>,
    created_time: Option<String>,
    #[serde(default)]
    likes: Option<RawSummaryEdge>,
    #[serde(default)]
    comments: Option<RawSummaryEdge>,
    #[serde(default)]
    shares: Option<RawShares>,
}

#[derive(Debug, Deserialize)]
struct RawSummaryEdge {
    summary: Option<RawSummary>,
}

#[derive(Debug, Deserialize)]
struct RawSummary {
    #[serde(default)]
    total_count: u64,
}

#[derive(Debug, Deserialize)]
struct RawShares {
    #[serde(default)]
    count: u64,
}

impl From<RawPost> for PostSummary {
    fn from(raw: RawPost) -> Self {
        let total = |edge: Option<RawSummaryEdge>| edge.and_then(|e| e.summary).map(|s| s.total_count).unwrap_or(0);
        PostSummary {
            id: raw.id,
            message: raw.message,
            created_time: raw.created_time,
            likes: total(raw.likes),
            comments: total(raw.comments),
            shares: raw.shares.map(|s| s.count).unwrap_or(0),
        }
    }
}

/// Insight values are plain numbers for most metrics and keyed breakdowns for
/// a few; breakdowns are summed.
fn insight_value(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::Object(map) => map.values().map(insight_value).sum(),
        _ => 0,
    }
}

/// Graph API over HTTPS
#[derive(Clone)]
pub struct FacebookGraphClient {
    http: reqwest::Client,
    graph_url: String,
}

impl FacebookGraphClient {
    pub fn new(http: reqwest::Client, graph_url: impl Into<String>) -> Self {
        Self {
            http,
            graph_url: graph_url.into(),
        }
    }

    fn get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.http.get(format!("{}/{}", self.graph_url, path)).bearer_auth(token)
    }
}

#[async_trait]
impl GraphApi for FacebookGraphClient {
    async fn profile(&self, token: &str) -> Result<GraphProfile, ProviderError> {
        send_json(self.get("me", token).query(&[("fields", "id,name")])).await
    }

    async fn pages(&self, token: &str) -> Result<Vec<GraphPage>, ProviderError> {
        let envelope: DataEnvelope<GraphPage> = send_json(
            self.get("me/accounts", token)
                .query(&[("fields", "id,name,category,access_token")]),
        )
        .await?;
        Ok(envelope.data)
    }

    async fn page_details(&self, page_id: &str, page_token: &str) -> Result<PageDetails, ProviderError> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            fan_count: u64,
            #[serde(default)]
            followers_count: u64,
        }

        let raw: Raw = send_json(
            self.get(page_id, page_token)
                .query(&[("fields", "fan_count,followers_count")]),
        )
        .await?;
        Ok(PageDetails {
            fan_count: raw.fan_count,
            followers_count: raw.followers_count,
        })
    }

    async fn page_insights(
        &self,
        page_id: &str,
        page_token: &str,
        metrics: &[&str],
        period: &str,
    ) -> Result<Vec<InsightMetric>, ProviderError> {
        let metric = metrics.join(",");
        let envelope: DataEnvelope<RawInsight> = send_json(
            self.get(&format!("{}/insights", page_id), page_token)
                .query(&[("metric", metric.as_str()), ("period", period)]),
        )
        .await?;

        // Latest value per metric
        Ok(envelope
            .data
            .into_iter()
            .map(|raw| {
                let latest = raw.values.last();
                InsightMetric {
                    name: raw.name,
                    period: raw.period,
                    value: latest.map(|v| insight_value(&v.value)).unwrap_or(0),
                    end_time: latest.and_then(|v| v.end_time.clone()),
                }
            })
            .collect())
    }

    async fn page_posts(&self, page_id: &str, page_token: &str, limit: u32) -> Result<Vec<PostSummary>, ProviderError> {
        let limit = limit.to_string();
        let envelope: DataEnvelope<RawPost> = send_json(
            self.get(&format!("{}/posts", page_id), page_token).query(&[
                (
                    "fields",
                    "id,message,created_time,likes.summary(true),comments.summary(true),shares",
                ),
                ("limit", limit.as_str()),
            ]),
        )
        .await?;
        Ok(envelope.data.into_iter().map(PostSummary::from).collect())
    }
}
