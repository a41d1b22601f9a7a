use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SearchOverrides;
use crate::provider::{ProviderId, ResultRecord};

/// A caller's search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Explicit provider allow-list. `None` (or empty) lets the orchestrator choose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<String>>,
    /// Language partitions; empty means the single global partition.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    /// Per-request overrides, highest precedence.
    #[serde(default, skip_serializing_if = "SearchOverrides::is_empty")]
    pub overrides: SearchOverrides,
    /// Per-user overrides, below the request's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SearchOverrides>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_providers<I, S>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.providers = Some(providers.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_overrides(mut self, overrides: SearchOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Normalized explicit allow-list, if the caller made a selection.
    pub fn explicit_providers(&self) -> Option<Vec<ProviderId>> {
        let providers = self.providers.as_ref()?;
        let ids: Vec<ProviderId> = providers
            .iter()
            .map(|p| ProviderId::normalize(p))
            .filter(|id| !id.is_empty())
            .collect();
        (!ids.is_empty()).then_some(ids)
    }

    /// Partitions to run per provider. Always at least one (`None` = global).
    pub fn language_partitions(&self) -> Vec<Option<String>> {
        let mut languages: Vec<String> = Vec::new();
        for language in &self.languages {
            let language = language.trim().to_lowercase();
            if !language.is_empty() && !languages.contains(&language) {
                languages.push(language);
            }
        }
        if languages.is_empty() {
            vec![None]
        } else {
            languages.into_iter().map(Some).collect()
        }
    }

    /// Key identifying requests that would produce the same provider calls.
    pub fn coalescing_key(&self) -> String {
        let query = self
            .query
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let mut providers: Vec<String> = self
            .explicit_providers()
            .unwrap_or_default()
            .into_iter()
            .map(String::from)
            .collect();
        providers.sort();
        providers.dedup();

        let mut languages: Vec<String> = self
            .language_partitions()
            .into_iter()
            .flatten()
            .collect();
        languages.sort();

        let overrides = serde_json::to_string(&self.overrides).unwrap_or_default();
        let user = serde_json::to_string(&self.user).unwrap_or_default();

        format!(
            "{}|{}|{}|{}|{}",
            query,
            providers.join(","),
            languages.join(","),
            overrides,
            user
        )
    }
}

/// How the provider set of a search was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionMode {
    /// Caller's allow-list, minus penalized providers.
    Explicit,
    /// Configured default subset (no performance data yet).
    DefaultSubset,
    /// Performance tracker ranking.
    Ranked,
    /// Every enabled provider (no defaults configured, or tracking off).
    AllEnabled,
    /// Every candidate was penalized, so all of them ran anyway.
    PenaltyFallback,
}

impl AdmissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionMode::Explicit => "explicit",
            AdmissionMode::DefaultSubset => "default_subset",
            AdmissionMode::Ranked => "ranked",
            AdmissionMode::AllEnabled => "all_enabled",
            AdmissionMode::PenaltyFallback => "penalty_fallback",
        }
    }
}

/// Overall result of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// Every task succeeded.
    Completed,
    /// Some tasks failed.
    Partial,
    /// Tasks ran and none succeeded.
    AllFailed,
    /// Nothing was eligible to run.
    NoProviders,
    /// The caller cancelled.
    Cancelled,
}

impl SearchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStatus::Completed => "completed",
            SearchStatus::Partial => "partial",
            SearchStatus::AllFailed => "all_failed",
            SearchStatus::NoProviders => "no_providers",
            SearchStatus::Cancelled => "cancelled",
        }
    }
}

/// Per-task diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// `provider` or `provider:language`.
    pub task: String,
    pub provider: ProviderId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// "success" or an error kind ("timeout", "rate_limit", ...).
    pub outcome: String,
    pub result_count: usize,
    pub duration_ms: u64,
    pub timeout_ms: u64,
    /// Empty result near the budget, counted as a timeout.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub silent_timeout: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskSummary {
    pub fn is_success(&self) -> bool {
        self.outcome == "success"
    }
}

/// What a search returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterResult {
    pub request_id: String,
    /// Concatenated results, in task completion order.
    pub results: Vec<ResultRecord>,
    pub tasks: Vec<TaskSummary>,
    pub status: SearchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admission: Option<AdmissionMode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_penalized: Vec<ProviderId>,
    pub duration_ms: u64,
}

impl ScatterResult {
    /// Result with no tasks, e.g. for a caller that gave up waiting.
    pub fn empty(status: SearchStatus) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            results: Vec::new(),
            tasks: Vec::new(),
            status,
            admission: None,
            skipped_penalized: Vec::new(),
            duration_ms: 0,
        }
    }
}
