//! Site classification: decides whether a hostname counts as distracting
//! given the user's site list and list mode.
//!
//! The match predicate is intentionally loose: bidirectional substring
//! containment over normalized hosts. An entry "you" matches "youtube.com",
//! and "example.com" matches an entry "example.com.evil.org" read the other
//! direction. Users rely on the fragment-matching behavior; see DESIGN.md
//! before tightening it.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ListMode {
    #[default]
    Blacklist,
    Whitelist,
}

/// Lowercase the host and strip a single leading `www.`. Applied to both
/// hostnames and list entries before matching.
pub fn normalize_host(raw: &str) -> String {
    let host = raw.trim().to_ascii_lowercase();
    host.strip_prefix("www.").unwrap_or(&host).to_string()
}

fn matches_entry(host: &str, entry: &str) -> bool {
    host.contains(entry) || entry.contains(host)
}

/// An ordered, deduplicated sequence of user-entered domain fragments.
/// Entries are normalized on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct SiteList {
    entries: Vec<String>,
}

impl SiteList {
    pub fn from_entries(entries: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        let mut list = Self::default();
        for entry in entries {
            list.add(entry.as_ref());
        }
        list
    }

    /// Returns false when the entry was empty after normalization or already
    /// present.
    pub fn add(&mut self, entry: &str) -> bool {
        let entry = normalize_host(entry);
        if entry.is_empty() || self.entries.contains(&entry) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn remove(&mut self, entry: &str) -> bool {
        let entry = normalize_host(entry);
        let before = self.entries.len();
        self.entries.retain(|e| *e != entry);
        self.entries.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Whether any entry matches the (already normalized) host.
    fn matches(&self, host: &str) -> bool {
        self.entries.iter().any(|entry| matches_entry(host, entry))
    }
}

/// The persisted user configuration: both site lists, the active mode and the
/// feature toggles. Lives in `settings.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub watchlist: SiteList,
    pub whitelist: SiteList,
    pub list_mode: ListMode,
    pub lock_in_enabled: bool,
    pub dim_inactive: bool,
    pub posture_enabled: bool,
    pub eye_rest_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            watchlist: SiteList::from_entries(DEFAULT_WATCHLIST),
            whitelist: SiteList::default(),
            list_mode: ListMode::Blacklist,
            lock_in_enabled: true,
            dim_inactive: true,
            posture_enabled: true,
            eye_rest_enabled: true,
        }
    }
}

/// Seeded into the watchlist on first use.
const DEFAULT_WATCHLIST: [&str; 6] = [
    "youtube.com",
    "twitter.com",
    "facebook.com",
    "instagram.com",
    "reddit.com",
    "tiktok.com",
];

impl Settings {
    /// Classify a hostname against the active list.
    ///
    /// Blacklist mode: distracting iff some entry matches; an empty list
    /// matches nothing. Whitelist mode: distracting iff the list is non-empty
    /// and nothing matches — an empty whitelist blocks nothing (fail-open by
    /// policy, not fail-closed).
    pub fn is_distracting(&self, host: &str) -> bool {
        let host = normalize_host(host);
        match self.list_mode {
            ListMode::Blacklist => self.watchlist.matches(&host),
            ListMode::Whitelist => {
                !self.whitelist.is_empty() && !self.whitelist.matches(&host)
            }
        }
    }

    /// The full lock-in decision: blocking requires the feature toggle on top
    /// of classification.
    pub fn is_blocked(&self, host: &str) -> bool {
        self.lock_in_enabled && self.is_distracting(host)
    }

    pub fn active_list_mut(&mut self) -> &mut SiteList {
        match self.list_mode {
            ListMode::Blacklist => &mut self.watchlist,
            ListMode::Whitelist => &mut self.whitelist,
        }
    }

    pub fn active_list(&self) -> &SiteList {
        match self.list_mode {
            ListMode::Blacklist => &self.watchlist,
            ListMode::Whitelist => &self.whitelist,
        }
    }
}

/// Extracts the normalized domain from a URL, or None when there is nothing
/// host-shaped in it.
pub fn domain_of_url(url: &str) -> Option<String> {
    let rest = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let authority = rest.split(['/', '?', '#']).next()?;
    // Drop userinfo and port.
    let host = authority.rsplit('@').next()?;
    let host = host.split(':').next()?;
    if host.is_empty() || !host.contains('.') {
        return None;
    }
    Some(normalize_host(host))
}

/// Browser-internal pages never get tracked or blocked.
pub fn is_trackable_url(url: &str) -> bool {
    !(url.is_empty()
        || url.starts_with("chrome://")
        || url.starts_with("chrome-extension://")
        || url.starts_with("about:")
        || url.starts_with("edge://")
        || url.starts_with("moz-extension://"))
}
