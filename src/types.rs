//! Core types for digest messages

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A digest message handed over by the host before delivery
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Raw HTML part (if any)
    pub html_body: Option<String>,

    /// Raw plain-text part (if any)
    pub text_body: Option<String>,

    /// Outbound headers
    pub headers: Headers,
}

impl EmailMessage {
    #[must_use]
    pub fn new(html_body: Option<String>, text_body: Option<String>) -> Self {
        Self {
            html_body,
            text_body,
            headers: Headers::default(),
        }
    }
}

/// Ordered header list with case-insensitive lookup
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Headers {
    /// All headers as name/value pairs, in insertion order
    pub all: Vec<(String, String)>,
}

impl Headers {
    /// First value stored under `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.all
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Replace the first value stored under `name`, or append a new header
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .all
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.all.push((name, value)),
        }
    }

    /// Mutable access to every value stored under `name`
    pub fn values_mut<'a>(&'a mut self, name: &'a str) -> impl Iterator<Item = &'a mut String> {
        self.all
            .iter_mut()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.all.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            all: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The digest recipient
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipient {
    /// Numeric user id
    pub id: u64,

    /// Email address the digest is sent to
    pub email: String,
}

impl Recipient {
    pub fn new(id: u64, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
        }
    }
}

/// Per-message identifier: 20 zero-padded decimal digits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EmailId(String);

impl EmailId {
    pub const DIGITS: usize = 20;

    /// Build an id from a number, zero-padded to 20 digits
    #[must_use]
    pub fn from_number(n: u64) -> Self {
        Self(format!("{n:020}"))
    }

    /// Draw a fresh id, one random decimal digit at a time
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        let digits = (0..Self::DIGITS)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect();
        Self(digits)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deduplication key for one topic
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TopicKey {
    /// Numeric topic id taken from a topic path
    Id(u64),

    /// Normalized, lowercased title text
    Title(String),
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id:{id}"),
            Self::Title(title) => write!(f, "title:{title}"),
        }
    }
}

/// Set of topic keys; its size is the topic count
pub type TopicKeys = BTreeSet<TopicKey>;

/// Result of topic counting
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TopicCount {
    Known(usize),
    Unknown,
}

impl TopicCount {
    /// Whether the message should be treated as carrying more than one topic.
    ///
    /// An unknown count is treated as multiple so trimming still happens.
    #[must_use]
    pub const fn is_multiple(self) -> bool {
        match self {
            Self::Known(n) => n > 1,
            Self::Unknown => true,
        }
    }
}

impl fmt::Display for TopicCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(n) => write!(f, "{n}"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Attribution carried into redirected links
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingContext {
    pub user_id: u64,
    pub topic_id: Option<u64>,
    pub email_id: Option<EmailId>,
}

impl TrackingContext {
    /// Tracking value `"<user>-<topic>-<email>"`, or `None` without an email id
    #[must_use]
    pub fn value(&self) -> Option<String> {
        let email_id = self.email_id.as_ref()?;
        let topic = self.topic_id.map(|id| id.to_string()).unwrap_or_default();
        Some(format!("{}-{topic}-{email_id}", self.user_id))
    }
}

/// Summary of what one pipeline run changed
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransformReport {
    /// Topic count computed from the HTML part
    pub html_topics: Option<TopicCount>,

    /// Topic count computed from the text part
    pub text_topics: Option<TopicCount>,

    /// Internal links that received tracking parameters
    pub links_annotated: usize,

    /// Excerpt links routed through the redirector
    pub links_redirected: usize,

    /// Excerpt nodes that were shortened
    pub excerpts_trimmed: usize,

    /// Text blocks that were shortened
    pub text_blocks_trimmed: usize,

    /// Target domain picked for this message
    pub swap_domain: Option<String>,

    /// Hosts rewritten across all areas
    pub hosts_swapped: usize,

    /// HTML processing was abandoned and the body left as-is
    pub html_skipped: bool,
}
