//! Hostname substitution across the message
//!
//! One target domain is picked per message and used for every area, so all
//! links in a single email point at the same host.

use crate::config::DigestConfig;
use crate::dom::{Document, Element, NodeId};
use crate::types::Headers;
use crate::url_utils::{ANCHOR_HREF_REGEX, TEXT_URL_REGEX, swap_host, swap_url_host};
use regex::Captures;
use tracing::debug;

/// Headers whose URLs follow the swap
pub const SWAPPED_HEADERS: &[&str] = &["List-Unsubscribe", "List-Help", "List-Subscribe", "List-Owner"];

/// `mailto:` address, stopping before any `?subject=...` part
static MAILTO_REGEX: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
    regex::Regex::new(r"(?i)\bmailto:[^\s<>@,?]+@[^\s<>?,]+").unwrap()
});

/// `(element names, attribute)` pairs holding a single resource URL
const RESOURCE_ATTRIBUTES: &[(&[&str], &str)] = &[
    (
        &["img", "video", "audio", "iframe", "script", "source", "track", "embed"],
        "src",
    ),
    (&["form"], "action"),
    (&["video"], "poster"),
];

/// Per-message host substitution
#[derive(Debug, Clone)]
pub struct DomainSwap<'a> {
    config: &'a DigestConfig,
    origin: String,
    target: String,
}

impl<'a> DomainSwap<'a> {
    /// Swap engine for a picked target, or `None` if swapping is not configured
    #[must_use]
    pub fn new(config: &'a DigestConfig, target: Option<String>) -> Option<Self> {
        let origin = config.origin()?;
        let target = target?;
        if target.eq_ignore_ascii_case(&origin) {
            return None;
        }
        Some(Self {
            config,
            origin,
            target,
        })
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Swap the host of one URL
    #[must_use]
    pub fn url(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        let swapped = swap_url_host(trimmed, &self.origin, &self.target)?;
        Some(raw.replacen(trimmed, &swapped, 1))
    }

    /// Swap every candidate URL of a `srcset` list, keeping descriptors
    #[must_use]
    pub fn srcset(&self, raw: &str) -> Option<String> {
        let mut changed = false;
        let candidates: Vec<String> = raw
            .split(',')
            .map(|candidate| {
                let url = candidate.split_whitespace().next().unwrap_or_default();
                match (url.is_empty(), self.url(url)) {
                    (false, Some(swapped)) => {
                        changed = true;
                        candidate.replacen(url, &swapped, 1)
                    }
                    _ => candidate.to_string(),
                }
            })
            .collect();
        changed.then(|| candidates.join(","))
    }

    /// Swap every http(s) URL in running text. Returns the text and the count.
    ///
    /// URLs on the never-touch list are kept.
    #[must_use]
    pub fn text(&self, text: &str) -> (String, usize) {
        self.swap_urls(text, true)
    }

    fn swap_urls(&self, text: &str, respect_never_touch: bool) -> (String, usize) {
        let mut swapped = 0;
        let out = TEXT_URL_REGEX.replace_all(text, |caps: &Captures<'_>| {
            let url = &caps[0];
            if respect_never_touch && self.config.is_never_touch(url) {
                return url.to_string();
            }
            self.url(url).map_or_else(
                || url.to_string(),
                |new_url| {
                    swapped += 1;
                    new_url
                },
            )
        });
        (out.into_owned(), swapped)
    }

    /// Swap the domain of every `mailto:` address in a header value
    fn swap_mailtos(&self, text: &str) -> (String, usize) {
        let mut swapped = 0;
        let out = MAILTO_REGEX.replace_all(text, |caps: &Captures<'_>| {
            self.address(&caps[0]).map_or_else(
                || caps[0].to_string(),
                |address| {
                    swapped += 1;
                    address
                },
            )
        });
        (out.into_owned(), swapped)
    }

    /// Swap the host part of a `Message-ID` value
    #[must_use]
    pub fn message_id(&self, value: &str) -> Option<String> {
        self.address(value)
    }

    /// Swap the host after the last `@`, up to an optional closing `>`
    fn address(&self, value: &str) -> Option<String> {
        let at = value.rfind('@')?;
        let rest = &value[at + 1..];
        let end = rest.find('>').unwrap_or(rest.len());
        let host = rest[..end].trim();
        let swapped = swap_host(host, &self.origin, &self.target)?;
        Some(format!("{}@{swapped}{}", &value[..at], &rest[end..]))
    }

    /// Apply the enabled HTML areas to the document.
    ///
    /// Nodes inside `protected` excerpts are left alone.
    pub fn swap_document(&self, doc: &mut Document, protected: &[NodeId]) -> usize {
        let mut swapped = 0;
        for id in doc.live_nodes() {
            if protected
                .iter()
                .any(|p| *p == id || doc.is_ancestor(*p, id))
            {
                continue;
            }
            let Some(element) = doc.element(id) else {
                continue;
            };

            let mut updates: Vec<(&'static str, String)> = Vec::new();
            if self.config.html_links_enabled
                && element.is(&["a", "area"])
                && let Some(href) = element.attr("href")
                && !self.config.is_never_touch(href)
                && let Some(new_href) = self.url(href)
            {
                updates.push(("href", new_href));
            }
            if self.config.resource_attributes_enabled {
                updates.extend(self.resource_updates(element));
            }

            if let Some(element) = doc.element_mut(id) {
                for (name, value) in updates {
                    element.set_attr(name, value);
                    swapped += 1;
                }
            }
        }
        debug!("Swapped {swapped} HTML attributes to {}", self.target);
        swapped
    }

    fn resource_updates(&self, element: &Element) -> Vec<(&'static str, String)> {
        let mut updates = Vec::new();
        for (names, attribute) in RESOURCE_ATTRIBUTES {
            if element.is(names)
                && let Some(value) = element.attr(attribute)
                && let Some(new_value) = self.url(value)
            {
                updates.push((*attribute, new_value));
            }
        }
        if element.is(&["link"])
            && element.attr("rel").is_some_and(|rel| {
                let rel = rel.to_ascii_lowercase();
                rel.contains("stylesheet") || rel.contains("icon")
            })
            && let Some(href) = element.attr("href")
            && let Some(new_href) = self.url(href)
        {
            updates.push(("href", new_href));
        }
        if element.is(&["img", "source"])
            && let Some(srcset) = element.attr("srcset")
            && let Some(new_srcset) = self.srcset(srcset)
        {
            updates.push(("srcset", new_srcset));
        }
        updates
    }

    /// Swap anchor hrefs in raw markup, for when the parser is switched off
    #[must_use]
    pub fn swap_markup_links(&self, html: &str) -> (String, usize) {
        if !self.config.html_links_enabled {
            return (html.to_string(), 0);
        }
        let mut swapped = 0;
        let out = ANCHOR_HREF_REGEX.replace_all(html, |caps: &Captures<'_>| {
            let (quote, href) = match (caps.get(2), caps.get(3)) {
                (Some(m), _) => ('"', m.as_str()),
                (None, Some(m)) => ('\'', m.as_str()),
                (None, None) => return caps[0].to_string(),
            };
            if self.config.is_never_touch(href) {
                return caps[0].to_string();
            }
            match self.url(href) {
                Some(new_href) => {
                    swapped += 1;
                    format!("{}{quote}{new_href}{quote}", &caps[1])
                }
                None => caps[0].to_string(),
            }
        });
        (out.into_owned(), swapped)
    }

    /// Apply the enabled header areas
    pub fn swap_headers(&self, headers: &mut Headers) -> usize {
        let mut swapped = 0;
        if self.config.headers_enabled {
            for name in SWAPPED_HEADERS {
                for value in headers.values_mut(name) {
                    let (new_value, urls) = self.swap_urls(value, false);
                    let (new_value, mailtos) = self.swap_mailtos(&new_value);
                    if urls + mailtos > 0 {
                        *value = new_value;
                        swapped += urls + mailtos;
                    }
                }
            }
        }
        if self.config.message_id_enabled {
            for value in headers.values_mut("Message-ID") {
                if let Some(new_value) = self.message_id(value) {
                    *value = new_value;
                    swapped += 1;
                }
            }
        }
        debug!("Swapped {swapped} header hosts to {}", self.target);
        swapped
    }
}
