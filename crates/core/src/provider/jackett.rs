//! Jackett indexer provider.
//!
//! Each configured Jackett indexer is exposed as its own [`Provider`], so the
//! orchestrator can time, rank and penalize indexers independently.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{JackettConfig, ResolvedSearchConfig};

use super::{LogContext, Provider, ProviderError, ProviderQuery, ResultRecord};

/// Provider backed by a single Jackett indexer.
pub struct JackettProvider {
    client: Client,
    base_url: String,
    api_key: String,
    indexer: String,
}

impl JackettProvider {
    pub fn new(client: Client, config: &JackettConfig, indexer: &str) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            indexer: indexer.to_string(),
        }
    }

    /// Build the Jackett API URL for a search.
    fn build_search_url(&self, query: &ProviderQuery) -> String {
        let text = match &query.language {
            Some(language) => format!("{} {}", query.query, language),
            None => query.query.clone(),
        };
        format!(
            "{}/api/v2.0/indexers/{}/results?apikey={}&Query={}",
            self.base_url,
            urlencoding::encode(&self.indexer),
            urlencoding::encode(&self.api_key),
            urlencoding::encode(&text)
        )
    }

    async fn fetch(&self, query: &ProviderQuery) -> Result<Vec<ResultRecord>, ProviderError> {
        let url = self.build_search_url(query);

        let response = self
            .client
            .get(&url)
            .timeout(query.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else if e.is_connect() {
                    ProviderError::ConnectionFailed(e.to_string())
                } else {
                    ProviderError::Other(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_challenge_page(&body) {
                return Err(ProviderError::Captcha(format!("HTTP {}", status.as_u16())));
            }
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let jackett_response: JackettResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Parse(e.to_string())
            }
        })?;

        let languages: Vec<String> = query.language.iter().cloned().collect();
        Ok(jackett_response
            .Results
            .into_iter()
            .map(|r| {
                let seeders = r.Seeders.unwrap_or(0).max(0);
                ResultRecord {
                    title: r.Title,
                    info_hash: r.InfoHash.map(|h| h.to_lowercase()).unwrap_or_default(),
                    size_bytes: r.Size.unwrap_or(0).max(0) as u64,
                    seeders: seeders as u32,
                    peers: r.Peers.unwrap_or(0).saturating_sub(seeders).max(0) as u32,
                    source: r.Tracker.unwrap_or_else(|| self.indexer.clone()),
                    languages: languages.clone(),
                }
            })
            .collect())
    }
}

#[async_trait]
impl Provider for JackettProvider {
    fn name(&self) -> &str {
        &self.indexer
    }

    async fn search(
        &self,
        query: &ProviderQuery,
        cancel: &CancellationToken,
        ctx: &LogContext,
        _config: &ResolvedSearchConfig,
    ) -> Result<Vec<ResultRecord>, ProviderError> {
        debug!(
            request_id = %ctx.request_id,
            task = %ctx.task,
            timeout_ms = query.timeout.as_millis() as u64,
            "Searching Jackett indexer"
        );

        tokio::select! {
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            result = self.fetch(query) => result,
        }
    }
}

/// Build one provider per configured indexer, sharing a single HTTP client.
pub fn jackett_providers(
    config: &JackettConfig,
) -> Result<Vec<(JackettProvider, bool)>, ProviderError> {
    let client = Client::builder()
        .build()
        .map_err(|e| ProviderError::Other(format!("Failed to create HTTP client: {}", e)))?;

    Ok(config
        .indexers
        .iter()
        .map(|indexer| {
            (
                JackettProvider::new(client.clone(), config, &indexer.name),
                indexer.enabled,
            )
        })
        .collect())
}

/// Anti-bot interstitials come back as HTML error pages rather than JSON.
fn is_challenge_page(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("cf-chl") || lower.contains("captcha") || lower.contains("just a moment")
}

// Jackett API response types
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResponse {
    Results: Vec<JackettResult>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResult {
    Title: String,
    Tracker: Option<String>,
    InfoHash: Option<String>,
    Size: Option<i64>,
    Seeders: Option<i32>,
    Peers: Option<i32>,
}
