//! Routing excerpt links through the first-party redirect endpoint
//!
//! Every link inside a post excerpt is replaced by
//! `<redirector_path>?<param>=<token>`, where the token is the unpadded
//! base64url form of the destination URL with attribution parameters added.

use crate::config::DigestConfig;
use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::types::{EmailId, TrackingContext};
use crate::url_utils::{
    append_query_pairs, encode_token, host_matches, is_non_navigational, origin_base, resolve,
    split_href, topic_id,
};
use tracing::debug;
use url::Url;

/// Per-message redirect settings resolved from the configuration
#[derive(Debug, Clone)]
pub struct Redirector<'a> {
    config: &'a DigestConfig,
    origin: String,
    base: Url,
    endpoint: Url,
    user_id: u64,
    email_id: Option<EmailId>,
}

impl<'a> Redirector<'a> {
    /// Build a redirector, or `None` when redirects are not configured
    pub fn new(
        config: &'a DigestConfig,
        user_id: u64,
        email_id: Option<EmailId>,
    ) -> Result<Option<Self>> {
        let Some(origin) = config.origin() else {
            return Ok(None);
        };
        if config.redirector_path.trim().is_empty() || config.redirector_param.trim().is_empty() {
            return Ok(None);
        }
        let base = origin_base(&origin)?;
        let endpoint = resolve(&config.redirector_path, &base)?;
        Ok(Some(Self {
            config,
            origin,
            base,
            endpoint,
            user_id,
            email_id,
        }))
    }

    /// Destination already is the redirect endpoint on the origin
    fn is_endpoint(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| host_matches(host, &self.origin))
            && url.path() == self.endpoint.path()
    }

    /// Build the redirect href for one link, or `None` to leave it alone
    #[must_use]
    pub fn redirect_href(&self, href: &str, topic: Option<u64>) -> Option<String> {
        if is_non_navigational(href) || self.config.is_never_touch(href) {
            return None;
        }
        let url = match resolve(href, &self.base) {
            Ok(url) => url,
            Err(e) => {
                debug!("Skipping malformed excerpt link: {e}");
                return None;
            }
        };
        if !matches!(url.scheme(), "http" | "https") || self.is_endpoint(&url) {
            return None;
        }

        let destination = fix_affiliate_path(url.as_str());
        let context = TrackingContext {
            user_id: self.user_id,
            topic_id: topic,
            email_id: self.email_id.clone(),
        };
        let destination = match (&context.email_id, context.value()) {
            (Some(email_id), Some(value)) => {
                let email_id = email_id.to_string();
                let mut pairs = vec![("email_id", email_id.as_str())];
                pairs.extend(
                    self.config
                        .tracking_param_names
                        .iter()
                        .filter(|name| !name.trim().is_empty())
                        .map(|name| (name.as_str(), value.as_str())),
                );
                append_query_pairs(&destination, &pairs).unwrap_or(destination)
            }
            _ => destination,
        };

        let path = self.config.redirector_path.trim();
        let joiner = if path.contains('?') { '&' } else { '?' };
        Some(format!(
            "{path}{joiner}{}={}",
            self.config.redirector_param.trim(),
            encode_token(&destination)
        ))
    }
}

/// Move a query string glued onto the path as `/&key=value` into the query
#[must_use]
pub fn fix_affiliate_path(url: &str) -> String {
    let (base, query, fragment) = split_href(url);
    let path_start = base.find("://").map_or(0, |i| i + 3);
    let Some(offset) = base[path_start..].find("/&") else {
        return url.to_string();
    };
    let split = path_start + offset;
    let path = &base[..=split];
    let extra = base[split + 2..].trim_matches('&');

    let mut out = String::from(path);
    let query = query.unwrap_or("").trim_matches('&');
    match (query.is_empty(), extra.is_empty()) {
        (true, true) => {}
        (true, false) => {
            out.push('?');
            out.push_str(extra);
        }
        (false, true) => {
            out.push('?');
            out.push_str(query);
        }
        (false, false) => {
            out.push('?');
            out.push_str(query);
            out.push('&');
            out.push_str(extra);
        }
    }
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

/// Topic id for an excerpt, trying each source in order
#[must_use]
pub fn resolve_topic_context(
    doc: &Document,
    excerpt: NodeId,
    topic_names: &[NodeId],
    config: &DigestConfig,
) -> Option<u64> {
    from_topic_attribute(doc, excerpt, &config.topic_id_attribute)
        .or_else(|| from_preceding_topic_name(doc, excerpt, topic_names))
        .or_else(|| from_preceding_anchor(doc, excerpt))
}

fn from_topic_attribute(doc: &Document, excerpt: NodeId, attribute: &str) -> Option<u64> {
    if attribute.trim().is_empty() {
        return None;
    }
    std::iter::once(excerpt)
        .chain(doc.ancestors(excerpt))
        .find_map(|id| doc.attr(id, attribute)?.trim().parse().ok())
}

fn from_preceding_topic_name(
    doc: &Document,
    excerpt: NodeId,
    topic_names: &[NodeId],
) -> Option<u64> {
    topic_names
        .iter()
        .rev()
        .filter(|id| **id < excerpt && !doc.is_ancestor(**id, excerpt))
        .find_map(|id| {
            doc.elements_within(*id, &["a"])
                .into_iter()
                .find_map(|a| doc.attr(a, "href").and_then(topic_id))
        })
}

fn from_preceding_anchor(doc: &Document, excerpt: NodeId) -> Option<u64> {
    doc.preceding(excerpt)
        .into_iter()
        .filter(|id| doc.is_element(*id, &["a"]))
        .find_map(|id| doc.attr(id, "href").and_then(topic_id))
}

/// Redirect every eligible link inside the unprotected excerpts.
///
/// Topic context for all excerpts is resolved before the first href changes.
/// Returns the number of links rewritten.
pub fn redirect_excerpt_links(
    doc: &mut Document,
    redirector: &Redirector<'_>,
    excerpts: &[NodeId],
    topic_names: &[NodeId],
) -> usize {
    let contexts: Vec<(NodeId, Option<u64>)> = excerpts
        .iter()
        .map(|id| {
            let topic = resolve_topic_context(doc, *id, topic_names, redirector.config);
            debug!("Excerpt {id} topic context: {topic:?}");
            (*id, topic)
        })
        .collect();

    let mut rewritten = 0;
    for (excerpt, topic) in contexts {
        for anchor in doc.elements_within(excerpt, &["a"]) {
            let updated = doc
                .attr(anchor, "href")
                .and_then(|href| redirector.redirect_href(href, topic));
            if let Some(updated) = updated
                && let Some(element) = doc.element_mut(anchor)
            {
                element.set_attr("href", updated);
                rewritten += 1;
            }
        }
    }
    debug!("Redirected {rewritten} excerpt links");
    rewritten
}
