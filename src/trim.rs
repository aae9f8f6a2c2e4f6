//! Forward trimming of HTML post excerpts
//!
//! Trimming keeps the start of an excerpt and removes what follows. A cut is
//! made either at the first visual break (a `<br>` or the end of the first
//! paragraph or list item) or, failing that, inside the text node where the
//! character budget runs out. Only text content is shortened and only whole
//! nodes are removed, so the serialized markup stays well formed.

use crate::config::DigestConfig;
use crate::dom::{Document, NodeId};

pub const ELLIPSIS: char = '…';

/// Elements that count as content even without text
const MEDIA_ELEMENTS: &[&str] = &["img", "video", "audio", "iframe", "picture", "svg"];

/// Attributes checked against the never-touch list
const LINK_ATTRIBUTES: &[&str] = &["href", "src", "action"];

/// Budget and trailing-content policy for one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimPolicy {
    pub max_chars: usize,
    pub keep_trailing_media: bool,
}

impl TrimPolicy {
    #[must_use]
    pub fn from_config(config: &DigestConfig) -> Option<Self> {
        config.html_budget().map(|max_chars| Self {
            max_chars,
            keep_trailing_media: config.keep_trailing_media_on_cut,
        })
    }
}

/// Excerpt links to something on the never-touch list
#[must_use]
pub fn is_protected_excerpt(doc: &Document, excerpt: NodeId, config: &DigestConfig) -> bool {
    doc.subtree(excerpt).into_iter().any(|id| {
        doc.element(id).is_some_and(|el| {
            LINK_ATTRIBUTES
                .iter()
                .filter_map(|name| el.attr(name))
                .any(|value| config.is_never_touch(value))
        })
    })
}

/// Trim each excerpt in turn; returns how many were shortened
pub fn trim_excerpts(doc: &mut Document, excerpts: &[NodeId], policy: TrimPolicy) -> usize {
    excerpts
        .iter()
        .filter(|id| trim_excerpt(doc, **id, policy))
        .count()
}

/// Trim one excerpt to the policy's budget. Returns whether anything changed.
///
/// A visual break is cut even when the excerpt already fits; the budget cut
/// only runs when the text is still too long afterwards.
pub fn trim_excerpt(doc: &mut Document, excerpt: NodeId, policy: TrimPolicy) -> bool {
    let budget = policy.max_chars;
    if budget == 0 || doc.text_nodes(excerpt).is_empty() {
        return false;
    }

    let mut broke = false;
    if let Some(cut) = find_visual_break(doc, excerpt, budget) {
        match cut {
            Break::LineBreak(br) => {
                doc.remove_following(br, excerpt, policy.keep_trailing_media);
                doc.detach(br);
            }
            Break::BlockEnd(block) => {
                doc.remove_following(block, excerpt, policy.keep_trailing_media);
            }
        }
        broke = true;

        let text = doc.normalized_text(excerpt);
        let len = char_len(&text);
        if ends_sentence(&text) && len <= budget {
            return true;
        }
        if len < budget {
            append_ellipsis(doc, excerpt);
            return true;
        }
    }

    if broke || char_len(&doc.normalized_text(excerpt)) > budget {
        cut_to_budget(doc, excerpt, policy);
        return true;
    }
    false
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Break {
    /// Cut at this `<br>`, removing it
    LineBreak(NodeId),
    /// Cut right after this paragraph or list item
    BlockEnd(NodeId),
}

/// Earliest of the first `<br>` and the first paragraph or list item end.
///
/// Either needs visible text before it and meaningful content after it; the
/// block end must also come before the budget runs out.
fn find_visual_break(doc: &Document, excerpt: NodeId, budget: usize) -> Option<Break> {
    let mut candidates: Vec<(NodeId, Break)> = doc
        .descendants(excerpt)
        .into_iter()
        .filter_map(|id| {
            let el = doc.element(id)?;
            if el.is(&["br"]) {
                Some((id, Break::LineBreak(id)))
            } else if el.is(&["p", "li"]) {
                let last = doc.subtree(id).last().copied().unwrap_or(id);
                Some((last, Break::BlockEnd(id)))
            } else {
                None
            }
        })
        .collect();
    candidates.sort_by_key(|(point, _)| *point);

    let text_before = |point: NodeId| doc.normalized_text_through(excerpt, point);
    let texts = doc.text_nodes(excerpt);
    let follows = |point: NodeId| {
        doc.descendants(excerpt).into_iter().any(|id| {
            id > point
                && (doc.is_element(id, MEDIA_ELEMENTS)
                    || (texts.contains(&id) && doc.text(id).is_some_and(|t| !t.trim().is_empty())))
        })
    };

    let first_line_break = candidates
        .iter()
        .filter(|(_, cut)| matches!(cut, Break::LineBreak(_)))
        .find(|(point, _)| !text_before(*point).is_empty())
        .filter(|(point, _)| follows(*point));
    let first_block_end = candidates
        .iter()
        .filter(|(_, cut)| matches!(cut, Break::BlockEnd(_)))
        .find(|(point, _)| !text_before(*point).is_empty())
        .filter(|(point, _)| char_len(&text_before(*point)) < budget && follows(*point));

    [first_line_break, first_block_end]
        .into_iter()
        .flatten()
        .min_by_key(|(point, _)| *point)
        .map(|(_, cut)| *cut)
}

/// Walk text nodes until the budget runs out and cut inside that node
fn cut_to_budget(doc: &mut Document, excerpt: NodeId, policy: TrimPolicy) {
    let mut remaining = policy.max_chars.saturating_sub(1);
    for id in doc.text_nodes(excerpt) {
        let collapsed = collapse_whitespace(doc.text(id).unwrap_or_default());
        let len = char_len(&collapsed);
        if len <= remaining {
            remaining -= len;
            continue;
        }
        let kept = cut_at_whitespace(&collapsed, remaining);
        doc.set_text(id, with_ellipsis(kept));
        doc.remove_following(id, excerpt, policy.keep_trailing_media);
        return;
    }
}

/// Append an ellipsis to the last visible text in the excerpt
fn append_ellipsis(doc: &mut Document, excerpt: NodeId) {
    let last = doc
        .text_nodes(excerpt)
        .into_iter()
        .rev()
        .find(|id| doc.text(*id).is_some_and(|t| !t.trim().is_empty()));
    if let Some(id) = last {
        let text = doc.text(id).unwrap_or_default().trim_end().to_string();
        doc.set_text(id, with_ellipsis(&text));
    }
}

/// Collapse whitespace runs to one space without trimming the ends
#[must_use]
pub fn collapse_whitespace(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_space = false;
    for c in value.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Longest prefix of at most `limit` chars that ends on a word boundary
#[must_use]
pub fn cut_at_whitespace(value: &str, limit: usize) -> &str {
    let end = value.char_indices().nth(limit).map_or(value.len(), |(i, _)| i);
    let prefix = &value[..end];
    let at_boundary = value[end..].chars().next().is_none_or(char::is_whitespace);
    if at_boundary {
        return prefix.trim_end();
    }
    prefix
        .rfind(char::is_whitespace)
        .map_or("", |i| prefix[..i].trim_end())
}

/// Add a single trailing ellipsis
#[must_use]
pub fn with_ellipsis(value: &str) -> String {
    let trimmed = value.trim_end();
    if trimmed.ends_with(ELLIPSIS) || trimmed.ends_with("...") {
        trimmed.to_string()
    } else {
        format!("{trimmed}{ELLIPSIS}")
    }
}

/// Text ends at a sentence boundary
#[must_use]
pub fn ends_sentence(value: &str) -> bool {
    value
        .trim_end()
        .chars()
        .last()
        .is_some_and(|c| matches!(c, '.' | '!' | '?' | ':' | ELLIPSIS))
}

#[must_use]
pub fn char_len(value: &str) -> usize {
    value.chars().count()
}
