use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::archive::{ArchiveError, ArchiveStore};
use crate::providers::{send_json, ProviderError};

/// Ad-level fields requested from the insights edge
pub const AD_INSIGHT_FIELDS: [&str; 15] = [
    "campaign_id",
    "campaign_name",
    "adset_id",
    "adset_name",
    "ad_id",
    "ad_name",
    "spend",
    "impressions",
    "clicks",
    "reach",
    "frequency",
    "cpc",
    "cpm",
    "ctr",
    "actions",
];

/// Upper bound on followed `paging.next` links for one sync
const MAX_PAGES: usize = 200;

#[derive(Debug, Error)]
pub enum AdsError {
    #[error("{0}")]
    Invalid(String),

    #[error("Missing configuration: {0}")]
    NotConfigured(&'static str),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// Account and inclusive date range of one export
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub account_id: String,
    pub date_start: String,
    pub date_stop: String,
}

/// A `SyncRequest` that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRange {
    pub account_id: String,
    pub since: NaiveDate,
    pub until: NaiveDate,
}

impl ExportRange {
    /// `facebook_ads/{accountId}/{dateStart}_{dateStop}.json`
    pub fn archive_key(&self) -> String {
        format!(
            "facebook_ads/{}/{}_{}.json",
            self.account_id,
            self.since.format("%Y-%m-%d"),
            self.until.format("%Y-%m-%d")
        )
    }
}

impl SyncRequest {
    pub fn validate(&self) -> Result<ExportRange, AdsError> {
        let account_id = self.account_id.trim().trim_start_matches("act_");
        if account_id.is_empty() || !account_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(AdsError::Invalid("accountId must be a numeric ad account id".to_string()));
        }

        let parse = |field: &str, value: &str| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map_err(|_| AdsError::Invalid(format!("{} must be a YYYY-MM-DD date", field)))
        };
        let since = parse("dateStart", &self.date_start)?;
        let until = parse("dateStop", &self.date_stop)?;
        if since > until {
            return Err(AdsError::Invalid("dateStart must not be after dateStop".to_string()));
        }

        Ok(ExportRange {
            account_id: account_id.to_string(),
            since,
            until,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub blob_url: String,
    pub insights_count: usize,
}

#[derive(Debug, Deserialize)]
struct InsightsPage {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<String>,
}

/// Pulls daily ad-level insights for an ad account and archives them as JSON
pub struct AdsSyncService {
    http: reqwest::Client,
    graph_url: String,
    access_token: Option<String>,
    archive: Arc<dyn ArchiveStore>,
}

impl AdsSyncService {
    pub fn new(
        http: reqwest::Client,
        graph_url: impl Into<String>,
        access_token: Option<String>,
        archive: Arc<dyn ArchiveStore>,
    ) -> Self {
        Self {
            http,
            graph_url: graph_url.into(),
            access_token,
            archive,
        }
    }

    pub async fn fetch_insights(&self, range: &ExportRange) -> Result<Vec<Value>, AdsError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or(AdsError::NotConfigured("FACEBOOK_ADS_ACCESS_TOKEN"))?;

        let fields = AD_INSIGHT_FIELDS.join(",");
        let time_range = json!({
            "since": range.since.format("%Y-%m-%d").to_string(),
            "until": range.until.format("%Y-%m-%d").to_string(),
        })
        .to_string();

        let first = self
            .http
            .get(format!("{}/act_{}/insights", self.graph_url, range.account_id))
            .bearer_auth(token)
            .query(&[
                ("level", "ad"),
                ("fields", fields.as_str()),
                ("time_range", time_range.as_str()),
                ("time_increment", "1"),
            ]);

        let mut page: InsightsPage = send_json(first).await?;
        let mut insights = std::mem::take(&mut page.data);

        let mut followed = 0;
        while let Some(next) = page.paging.take().and_then(|p| p.next) {
            if followed == MAX_PAGES {
                warn!("Stopped following insight pages for act_{} after {}", range.account_id, MAX_PAGES);
                break;
            }
            followed += 1;
            page = send_json(self.http.get(&next).bearer_auth(token)).await?;
            insights.append(&mut page.data);
        }

        Ok(insights)
    }

    /// Fetch, archive as pretty JSON, report where it went
    pub async fn sync(&self, request: &SyncRequest) -> Result<SyncOutcome, AdsError> {
        let range = request.validate()?;
        let insights = self.fetch_insights(&range).await?;

        let body = serde_json::to_vec_pretty(&insights)
            .map_err(|e| AdsError::Invalid(format!("Insights could not be serialized: {}", e)))?;
        let blob_url = self.archive.put(&range.archive_key(), body).await?;

        info!(
            "Archived {} ad insights for act_{} to {}",
            insights.len(),
            range.account_id,
            blob_url
        );
        Ok(SyncOutcome {
            blob_url,
            insights_count: insights.len(),
        })
    }

    /// Read back a previously archived export
    pub async fn load(&self, request: &SyncRequest) -> Result<Vec<Value>, AdsError> {
        let range = request.validate()?;
        let bytes = self.archive.get(&range.archive_key()).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AdsError::Invalid(format!("Archived export is not valid JSON: {}", e)))
    }
}
