//! Tracking parameters on internal links

use crate::config::DigestConfig;
use crate::dom::{Document, NodeId};
use crate::types::{EmailId, Recipient};
use crate::url_utils::{
    ANCHOR_HREF_REGEX, append_query_pairs, encode_token, is_internal, is_non_navigational,
    origin_base, resolve,
};
use regex::Captures;
use tracing::debug;
use url::Url;

/// Query parameters added to every internal link of one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTracking {
    pairs: Vec<(&'static str, String)>,
}

impl LinkTracking {
    #[must_use]
    pub fn new(recipient: &Recipient, email_id: &EmailId) -> Self {
        Self {
            pairs: vec![
                ("isdigest", "1".to_string()),
                ("u", recipient.id.to_string()),
                ("dayofweek", encode_token(&recipient.email)),
                ("email_id", email_id.to_string()),
            ],
        }
    }

    fn as_pairs(&self) -> Vec<(&str, &str)> {
        self.pairs.iter().map(|(k, v)| (*k, v.as_str())).collect()
    }
}

/// Decide whether an href gets tracking parameters and build the new value.
///
/// Returns `None` when the link is left alone: external, non-navigational,
/// protected, malformed, or already carrying every parameter.
#[must_use]
pub fn annotate_href(
    href: &str,
    tracking: &LinkTracking,
    base: &Url,
    origin: &str,
    config: &DigestConfig,
) -> Option<String> {
    if is_non_navigational(href) || config.is_never_touch(href) || !is_internal(href, origin) {
        return None;
    }
    if let Err(e) = resolve(href, base) {
        debug!("Skipping malformed link: {e}");
        return None;
    }
    append_query_pairs(href.trim(), &tracking.as_pairs())
}

/// Annotate every eligible `<a href>` in the document.
///
/// Anchors inside `protected` excerpt nodes are skipped. Returns the number
/// of links rewritten.
pub fn annotate_links(
    doc: &mut Document,
    protected: &[NodeId],
    tracking: &LinkTracking,
    config: &DigestConfig,
) -> usize {
    let Some(origin) = config.origin() else {
        return 0;
    };
    let base = match origin_base(&origin) {
        Ok(base) => base,
        Err(e) => {
            debug!("Link annotation disabled: {e}");
            return 0;
        }
    };

    let anchors = doc.elements_within(doc.content_root(), &["a"]);
    let mut rewritten = 0;
    for anchor in anchors {
        if protected
            .iter()
            .any(|p| *p == anchor || doc.is_ancestor(*p, anchor))
        {
            continue;
        }
        let Some(href) = doc.attr(anchor, "href") else {
            continue;
        };
        if let Some(updated) = annotate_href(href, tracking, &base, &origin, config)
            && let Some(element) = doc.element_mut(anchor)
        {
            element.set_attr("href", updated);
            rewritten += 1;
        }
    }
    debug!("Annotated {rewritten} internal links");
    rewritten
}

/// Annotate internal links in raw markup without building a tree.
///
/// Used when the HTML parser is switched off. Returns the new markup and the
/// number of links rewritten.
#[must_use]
pub fn annotate_markup(html: &str, tracking: &LinkTracking, config: &DigestConfig) -> (String, usize) {
    let Some(origin) = config.origin() else {
        return (html.to_string(), 0);
    };
    let Ok(base) = origin_base(&origin) else {
        return (html.to_string(), 0);
    };

    let mut rewritten = 0;
    let out = ANCHOR_HREF_REGEX.replace_all(html, |caps: &Captures<'_>| {
        let (quote, raw) = match (caps.get(2), caps.get(3)) {
            (Some(m), _) => ('"', m.as_str()),
            (None, Some(m)) => ('\'', m.as_str()),
            (None, None) => return caps[0].to_string(),
        };
        let href = raw.replace("&amp;", "&");
        match annotate_href(&href, tracking, &base, &origin, config) {
            Some(updated) => {
                rewritten += 1;
                format!("{}{quote}{}{quote}", &caps[1], updated.replace('&', "&amp;"))
            }
            None => caps[0].to_string(),
        }
    });
    (out.into_owned(), rewritten)
}
