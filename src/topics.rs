//! Topic counting for the HTML and text parts
//!
//! Each body is counted once, before any stage mutates it. Counting is scoped
//! to the content above the "popular" section so topics that only appear in
//! that secondary list are not counted. The HTML counter tries three
//! strategies in order and the first one that finds something wins.

use crate::dom::{Document, NodeId, normalize_whitespace};
use crate::types::{TopicCount, TopicKey, TopicKeys};
use crate::url_utils::{TOPIC_URL_REGEX, topic_id, topic_ids};
use std::collections::BTreeSet;
use tracing::debug;

/// Elements that can carry the "popular posts" heading
const MARKER_ELEMENTS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "strong", "b", "td", "th", "p", "div", "span",
];

/// Longer text is prose, not a section heading
const MAX_MARKER_CHARS: usize = 120;

/// Inputs to the HTML topic counter
#[derive(Debug, Clone, Copy)]
pub struct TopicScan<'a> {
    pub doc: &'a Document,
    pub excerpts: &'a [NodeId],
    pub topic_names: &'a [NodeId],
    pub phrases: &'a [String],
}

/// Count distinct topics in the HTML part
#[must_use]
pub fn count_html_topics(scan: &TopicScan<'_>) -> TopicCount {
    let boundary = find_boundary(scan.doc, scan.phrases);
    debug!("Topic boundary marker: {boundary:?}");

    let strategies: [fn(&TopicScan<'_>, Option<NodeId>) -> Option<TopicCount>; 3] =
        [from_topic_names, from_topic_anchors, from_excerpts_only];
    let count = strategies
        .iter()
        .find_map(|strategy| strategy(scan, boundary))
        .unwrap_or(TopicCount::Unknown);
    debug!("HTML topic count: {count}");
    count
}

/// First innermost marker element whose text contains a boundary phrase
#[must_use]
pub fn find_boundary(doc: &Document, phrases: &[String]) -> Option<NodeId> {
    if phrases.is_empty() {
        return None;
    }
    let candidates: Vec<NodeId> = doc
        .live_nodes()
        .into_iter()
        .filter(|id| doc.is_element(*id, MARKER_ELEMENTS))
        .filter(|id| contains_phrase(&doc.normalized_text(*id), phrases))
        .collect();

    candidates.iter().copied().find(|id| {
        doc.normalized_text(*id).chars().count() <= MAX_MARKER_CHARS
            && !candidates
                .iter()
                .any(|other| other != id && doc.is_ancestor(*id, *other))
    })
}

fn contains_phrase(text: &str, phrases: &[String]) -> bool {
    let folded = text.to_lowercase();
    phrases.iter().any(|phrase| folded.contains(phrase.as_str()))
}

/// Node lies before the boundary (or there is no boundary)
fn before_boundary(doc: &Document, id: NodeId, boundary: Option<NodeId>) -> bool {
    boundary.is_none_or(|b| id < b && !doc.is_ancestor(id, b))
}

/// Key for one topic-name element: a linked topic id, else its title text
#[must_use]
pub fn topic_key(doc: &Document, id: NodeId) -> Option<TopicKey> {
    let linked = doc
        .elements_within(id, &["a"])
        .into_iter()
        .find_map(|a| doc.attr(a, "href").and_then(topic_id));
    if let Some(topic) = linked {
        return Some(TopicKey::Id(topic));
    }
    let title = doc.normalized_text(id).to_lowercase();
    (!title.is_empty()).then_some(TopicKey::Title(title))
}

fn from_topic_names(scan: &TopicScan<'_>, boundary: Option<NodeId>) -> Option<TopicCount> {
    let keys: TopicKeys = scan
        .topic_names
        .iter()
        .filter(|id| before_boundary(scan.doc, **id, boundary))
        .filter_map(|id| topic_key(scan.doc, *id))
        .collect();
    debug!(
        "Topic keys from topic names: {}",
        keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    );
    (!keys.is_empty()).then_some(TopicCount::Known(keys.len()))
}

fn from_topic_anchors(scan: &TopicScan<'_>, boundary: Option<NodeId>) -> Option<TopicCount> {
    let doc = scan.doc;
    let ids: BTreeSet<u64> = doc
        .live_nodes()
        .into_iter()
        .filter(|id| doc.is_element(*id, &["a"]) && before_boundary(doc, *id, boundary))
        .filter_map(|id| doc.attr(id, "href").and_then(topic_id))
        .collect();
    (!ids.is_empty()).then_some(TopicCount::Known(ids.len()))
}

fn from_excerpts_only(scan: &TopicScan<'_>, _boundary: Option<NodeId>) -> Option<TopicCount> {
    if scan.excerpts.is_empty() {
        return None;
    }
    let doc = scan.doc;
    let any_topic_link = doc
        .live_nodes()
        .into_iter()
        .filter(|id| doc.is_element(*id, &["a"]))
        .any(|id| doc.attr(id, "href").and_then(topic_id).is_some());
    (!any_topic_link).then_some(TopicCount::Known(1))
}

/// Split a text body into blank-line-delimited blocks.
///
/// Returns `(block, separator_after)` pairs; joining them reproduces the input.
#[must_use]
pub fn split_blocks(text: &str) -> Vec<(&str, &str)> {
    static BLANK_LINES: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
        regex::Regex::new(r"\r?\n(?:[ \t]*\r?\n)+").unwrap()
    });

    let mut blocks = Vec::new();
    let mut start = 0;
    for sep in BLANK_LINES.find_iter(text) {
        blocks.push((&text[start..sep.start()], sep.as_str()));
        start = sep.end();
    }
    blocks.push((&text[start..], ""));
    blocks
}

/// Block is a bare topic URL, surrounding whitespace aside
#[must_use]
pub fn is_topic_url_block(block: &str) -> bool {
    TOPIC_URL_REGEX.is_match(block.trim())
}

/// Count distinct topics in the text part
#[must_use]
pub fn count_text_topics(text: &str, phrases: &[String]) -> TopicCount {
    let blocks: Vec<&str> = split_blocks(text)
        .into_iter()
        .map(|(block, _)| block)
        .take_while(|block| !contains_phrase(&normalize_whitespace(block), phrases))
        .collect();

    let ids: BTreeSet<u64> = blocks.iter().flat_map(|block| topic_ids(block)).collect();
    let count = if ids.is_empty() {
        match blocks.iter().filter(|block| is_topic_url_block(block)).count() {
            0 => TopicCount::Unknown,
            n => TopicCount::Known(n),
        }
    } else {
        TopicCount::Known(ids.len())
    };
    debug!("Text topic count: {count}");
    count
}
