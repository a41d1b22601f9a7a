//! Static provider classification and per-class timeout bounds.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::ProviderId;

/// How a provider is reached, which determines its timeout envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderClass {
    /// Plain HTML or JSON scraping of a public site.
    HttpScraping,
    /// Authenticated debrid service API.
    DebridApi,
    /// Usenet indexer.
    Usenet,
    /// Site behind an anti-bot challenge (slowest, least predictable).
    ChallengeProtected,
}

/// Static timeout envelope for a provider class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutBounds {
    pub min_ms: u64,
    pub max_ms: u64,
    pub default_ms: u64,
}

impl TimeoutBounds {
    /// Clamp a candidate timeout into `[min_ms, max_ms]`.
    pub fn clamp(&self, timeout_ms: u64) -> u64 {
        timeout_ms.clamp(self.min_ms, self.max_ms)
    }

    pub fn default_duration(&self) -> Duration {
        Duration::from_millis(self.default_ms)
    }
}

impl ProviderClass {
    /// The class used for providers missing from both the static table and config.
    pub const MOST_CONSERVATIVE: ProviderClass = ProviderClass::ChallengeProtected;

    pub fn bounds(&self) -> TimeoutBounds {
        match self {
            ProviderClass::DebridApi => TimeoutBounds {
                min_ms: 1_000,
                max_ms: 10_000,
                default_ms: 5_000,
            },
            ProviderClass::HttpScraping => TimeoutBounds {
                min_ms: 2_000,
                max_ms: 15_000,
                default_ms: 8_000,
            },
            ProviderClass::Usenet => TimeoutBounds {
                min_ms: 2_000,
                max_ms: 20_000,
                default_ms: 10_000,
            },
            ProviderClass::ChallengeProtected => TimeoutBounds {
                min_ms: 5_000,
                max_ms: 45_000,
                default_ms: 30_000,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderClass::HttpScraping => "http_scraping",
            ProviderClass::DebridApi => "debrid_api",
            ProviderClass::Usenet => "usenet",
            ProviderClass::ChallengeProtected => "challenge_protected",
        }
    }
}

/// Known providers and their classes, keyed by display name.
const KNOWN_PROVIDERS: &[(&str, ProviderClass)] = &[
    ("1337x", ProviderClass::ChallengeProtected),
    ("Torrent Galaxy", ProviderClass::ChallengeProtected),
    ("Kickass Torrents", ProviderClass::ChallengeProtected),
    ("LimeTorrents", ProviderClass::ChallengeProtected),
    ("The Pirate Bay", ProviderClass::HttpScraping),
    ("YTS", ProviderClass::HttpScraping),
    ("EZTV", ProviderClass::HttpScraping),
    ("Nyaa", ProviderClass::HttpScraping),
    ("BT4G", ProviderClass::HttpScraping),
    ("Knaben", ProviderClass::HttpScraping),
    ("SolidTorrents", ProviderClass::HttpScraping),
    ("TorrentDownload", ProviderClass::HttpScraping),
    ("Rutor", ProviderClass::HttpScraping),
    ("Rutracker", ProviderClass::HttpScraping),
    ("MagnetDL", ProviderClass::HttpScraping),
    ("Jackett", ProviderClass::HttpScraping),
    ("Real-Debrid", ProviderClass::DebridApi),
    ("AllDebrid", ProviderClass::DebridApi),
    ("Premiumize", ProviderClass::DebridApi),
    ("TorBox", ProviderClass::DebridApi),
    ("Debrid-Link", ProviderClass::DebridApi),
    ("Easynews", ProviderClass::Usenet),
    ("NZBGeek", ProviderClass::Usenet),
    ("NZBPlanet", ProviderClass::Usenet),
];

/// Lookup from provider id to class: static table overlaid with config overrides.
#[derive(Debug, Clone)]
pub struct ProviderClassTable {
    classes: HashMap<ProviderId, ProviderClass>,
}

impl Default for ProviderClassTable {
    fn default() -> Self {
        Self::new(&HashMap::new())
    }
}

impl ProviderClassTable {
    /// Build the table from the static list, with `overrides` taking precedence.
    pub fn new(overrides: &HashMap<ProviderId, ProviderClass>) -> Self {
        let mut classes: HashMap<ProviderId, ProviderClass> = KNOWN_PROVIDERS
            .iter()
            .map(|(name, class)| (ProviderId::normalize(name), *class))
            .collect();
        for (id, class) in overrides {
            classes.insert(id.clone(), *class);
        }
        Self { classes }
    }

    /// Class of a provider, falling back to the most conservative class.
    pub fn class_of(&self, provider: &ProviderId) -> ProviderClass {
        self.classes
            .get(provider)
            .copied()
            .unwrap_or(ProviderClass::MOST_CONSERVATIVE)
    }

    pub fn bounds_of(&self, provider: &ProviderId) -> TimeoutBounds {
        self.class_of(provider).bounds()
    }
}
