//! Configuration snapshot for one pipeline run
//!
//! Every field is read leniently: a value of the wrong shape falls back to the
//! field's disabled default and is logged, so a bad setting switches a feature
//! off instead of failing the message.

use crate::error::Result;
use rand::Rng;
use rand::seq::IndexedRandom;
use scraper::Selector;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Options recognized by the digest rewriter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DigestConfig {
    /// Host the forum is served from (e.g. `forum.example.com`)
    #[serde(deserialize_with = "lenient")]
    pub origin_domain: String,

    /// Candidate hosts for the domain swap
    #[serde(deserialize_with = "lenient")]
    pub target_domains: Vec<String>,

    #[serde(deserialize_with = "lenient")]
    pub html_links_enabled: bool,

    #[serde(deserialize_with = "lenient")]
    pub text_links_enabled: bool,

    #[serde(deserialize_with = "lenient")]
    pub resource_attributes_enabled: bool,

    #[serde(deserialize_with = "lenient")]
    pub headers_enabled: bool,

    #[serde(deserialize_with = "lenient")]
    pub message_id_enabled: bool,

    /// Character budget for HTML excerpts; zero or negative disables trimming
    #[serde(deserialize_with = "lenient")]
    pub html_max_chars: i64,

    /// Character budget for text blocks; zero or negative disables trimming
    #[serde(deserialize_with = "lenient")]
    pub text_max_chars: i64,

    /// CSS selectors matching one rendered post excerpt each
    #[serde(deserialize_with = "lenient")]
    pub excerpt_selectors: Vec<String>,

    /// CSS selectors matching topic title elements
    #[serde(deserialize_with = "lenient")]
    pub topic_name_selectors: Vec<String>,

    /// Attribute carrying a numeric topic id on digest markup
    #[serde(deserialize_with = "lenient")]
    pub topic_id_attribute: String,

    /// Phrases marking the start of the secondary "popular" section
    #[serde(deserialize_with = "lenient")]
    pub boundary_phrases: Vec<String>,

    /// Substrings that make a link or excerpt off-limits
    #[serde(deserialize_with = "lenient")]
    pub never_touch_substrings: Vec<String>,

    /// Keywords that exclude a text block from trimming
    #[serde(deserialize_with = "lenient")]
    pub protected_text_keywords: Vec<String>,

    /// Query parameter names receiving the tracking value on redirected links
    #[serde(deserialize_with = "lenient")]
    pub tracking_param_names: Vec<String>,

    /// Redirect endpoint, root-relative or absolute; empty disables redirects
    #[serde(deserialize_with = "lenient")]
    pub redirector_path: String,

    /// Query parameter carrying the encoded destination
    #[serde(deserialize_with = "lenient")]
    pub redirector_param: String,

    /// Keep images and other elements after a trim point, dropping only text
    #[serde(deserialize_with = "lenient")]
    pub keep_trailing_media_on_cut: bool,

    /// Parse the HTML body into a tree; when off only regex link annotation runs
    #[serde(deserialize_with = "lenient_dom")]
    pub dom_enabled: bool,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            origin_domain: String::new(),
            target_domains: Vec::new(),
            html_links_enabled: false,
            text_links_enabled: false,
            resource_attributes_enabled: false,
            headers_enabled: false,
            message_id_enabled: false,
            html_max_chars: 0,
            text_max_chars: 0,
            excerpt_selectors: strings(&[".digest-post-excerpt", ".post-excerpt"]),
            topic_name_selectors: strings(&[".digest-topic-name", ".digest-topic-title"]),
            topic_id_attribute: "data-topic-id".into(),
            boundary_phrases: strings(&["popular posts", "popular topics"]),
            never_touch_substrings: strings(&[
                "/email/unsubscribe",
                "/my/preferences",
                "unsubscribe",
            ]),
            protected_text_keywords: strings(&["unsubscribe", "preferences"]),
            tracking_param_names: Vec::new(),
            redirector_path: String::new(),
            redirector_param: "url".into(),
            keep_trailing_media_on_cut: false,
            dom_enabled: true,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Deserialize a field, falling back to its default when the value has the wrong shape
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_else(|e| {
        warn!("Ignoring unreadable config value: {e}");
        T::default()
    }))
}

/// Like [`lenient`] but the parser stays on unless explicitly switched off
fn lenient_dom<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_bool().unwrap_or_else(|| {
        warn!("Ignoring unreadable dom_enabled value: {value}");
        true
    }))
}

impl DigestConfig {
    /// Read a configuration snapshot from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// HTML excerpt budget, if trimming is enabled
    #[must_use]
    pub fn html_budget(&self) -> Option<usize> {
        usize::try_from(self.html_max_chars).ok().filter(|n| *n > 0)
    }

    /// Text block budget, if trimming is enabled
    #[must_use]
    pub fn text_budget(&self) -> Option<usize> {
        usize::try_from(self.text_max_chars).ok().filter(|n| *n > 0)
    }

    /// Lowercased origin host, if configured
    #[must_use]
    pub fn origin(&self) -> Option<String> {
        let origin = self.origin_domain.trim().trim_end_matches('.');
        (!origin.is_empty()).then(|| origin.to_ascii_lowercase())
    }

    /// Check a link or fragment of text against the never-touch list
    #[must_use]
    pub fn is_never_touch(&self, value: &str) -> bool {
        let lower = value.to_lowercase();
        self.never_touch_substrings
            .iter()
            .filter(|s| !s.is_empty())
            .any(|s| lower.contains(&s.to_lowercase()))
    }

    /// Check a text block against the protected keywords and never-touch list
    #[must_use]
    pub fn is_protected_text(&self, value: &str) -> bool {
        let lower = value.to_lowercase();
        self.protected_text_keywords
            .iter()
            .filter(|s| !s.is_empty())
            .any(|s| lower.contains(&s.to_lowercase()))
            || self.is_never_touch(value)
    }

    /// Lowercased boundary phrases
    #[must_use]
    pub fn phrases(&self) -> Vec<String> {
        self.boundary_phrases
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect()
    }

    /// Compile the excerpt selectors, dropping ones that do not parse
    #[must_use]
    pub fn excerpt_selector_list(&self) -> Vec<Selector> {
        compile_selectors(&self.excerpt_selectors)
    }

    /// Compile the topic-name selectors, dropping ones that do not parse
    #[must_use]
    pub fn topic_name_selector_list(&self) -> Vec<Selector> {
        compile_selectors(&self.topic_name_selectors)
    }

    /// Pick the swap target for one message
    pub fn pick_target_domain<R: Rng>(&self, rng: &mut R) -> Option<String> {
        self.origin()?;
        let candidates: Vec<&str> = self
            .target_domains
            .iter()
            .map(|d| d.trim().trim_end_matches('.'))
            .filter(|d| !d.is_empty())
            .collect();
        candidates.choose(rng).map(|d| d.to_ascii_lowercase())
    }

    /// Whether any domain swap area is switched on
    #[must_use]
    pub const fn any_swap_enabled(&self) -> bool {
        self.html_links_enabled
            || self.text_links_enabled
            || self.resource_attributes_enabled
            || self.headers_enabled
            || self.message_id_enabled
    }
}

fn compile_selectors(sources: &[String]) -> Vec<Selector> {
    sources
        .iter()
        .filter(|s| !s.trim().is_empty())
        .filter_map(|s| match Selector::parse(s) {
            Ok(selector) => Some(selector),
            Err(e) => {
                warn!("Ignoring invalid selector {s:?}: {e}");
                None
            }
        })
        .collect()
}
