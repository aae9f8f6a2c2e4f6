//! Owned HTML tree with index handles
//!
//! The digest body is parsed once with `scraper`, copied into an arena whose
//! node ids follow document order, mutated through those ids, and written
//! back out. Nodes are only ever detached, never inserted, so comparing ids
//! still compares document positions after any number of edits.

use crate::error::{Result, TransformError};
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::fmt::Write as _;

/// Index of a node in a [`Document`]
pub type NodeId = usize;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script",
    "style",
    "xmp",
    "iframe",
    "noembed",
    "noframes",
    "noscript",
    "plaintext",
];

/// Elements whose text never counts as visible content
const HIDDEN_TEXT_ELEMENTS: &[&str] = &["script", "style", "template", "head", "title"];

/// Elements whose edges separate words in visible text
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "td", "th", "tr", "table", "h1", "h2", "h3", "h4", "h5", "h6",
    "blockquote", "pre", "section", "article", "header", "footer", "dd", "dt", "hr",
];

/// Element name and attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl Element {
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attrs
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    #[must_use]
    pub fn is(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.name.eq_ignore_ascii_case(n))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Root,
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
    Comment(String),
    Text(String),
    Element(Element),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Parsed HTML body
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    /// Node whose children make up the serialized output
    content_root: NodeId,
}

impl Document {
    /// Parse markup and resolve each group of selectors to node ids.
    ///
    /// Inputs without an `<html>`, `<body>` or doctype are parsed as fragments
    /// and serialized back without the wrapper elements.
    pub fn parse(raw: &str, selector_sets: &[&[Selector]]) -> Result<(Self, Vec<Vec<NodeId>>)> {
        let lower = raw.to_ascii_lowercase();
        let whole = lower.contains("<html") || lower.contains("<body") || lower.contains("<!doctype");
        let html = if whole {
            Html::parse_document(raw)
        } else {
            Html::parse_fragment(raw)
        };

        let mut nodes: Vec<Node> = Vec::new();
        let mut index = HashMap::new();
        let mut stack = vec![(html.tree.root(), None)];
        while let Some((source, parent)) = stack.pop() {
            let kind = match source.value() {
                scraper::Node::Document | scraper::Node::Fragment => NodeKind::Root,
                scraper::Node::Doctype(doctype) => NodeKind::Doctype {
                    name: doctype.name().to_string(),
                    public_id: doctype.public_id().to_string(),
                    system_id: doctype.system_id().to_string(),
                },
                scraper::Node::Comment(comment) => NodeKind::Comment((**comment).to_string()),
                scraper::Node::Text(text) => NodeKind::Text((**text).to_string()),
                scraper::Node::Element(element) => NodeKind::Element(Element {
                    name: element.name().to_string(),
                    attrs: element
                        .attrs()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                }),
                scraper::Node::ProcessingInstruction(_) => continue,
            };

            let id = nodes.len();
            nodes.push(Node {
                kind,
                parent,
                children: Vec::new(),
            });
            if let Some(parent) = parent {
                nodes[parent].children.push(id);
            }
            index.insert(source.id(), id);
            for child in source.children().rev() {
                stack.push((child, Some(id)));
            }
        }

        let html_element = nodes.iter().position(
            |node| matches!(&node.kind, NodeKind::Element(el) if el.name.eq_ignore_ascii_case("html")),
        );
        let Some(html_element) = html_element else {
            return Err(TransformError::HtmlParse("no root element".into()));
        };
        let content_root = if whole { 0 } else { html_element };

        let matches = selector_sets
            .iter()
            .map(|selectors| {
                let mut ids: Vec<NodeId> = selectors
                    .iter()
                    .flat_map(|selector| html.select(selector))
                    .filter_map(|element| index.get(&element.id()).copied())
                    .collect();
                ids.sort_unstable();
                ids.dedup();
                ids
            })
            .collect();

        Ok((
            Self {
                nodes,
                content_root,
            },
            matches,
        ))
    }

    #[must_use]
    pub const fn content_root(&self) -> NodeId {
        self.content_root
    }

    #[must_use]
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    #[must_use]
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    /// Element with one of the given tag names
    #[must_use]
    pub fn is_element(&self, id: NodeId, names: &[&str]) -> bool {
        self.element(id).is_some_and(|el| el.is(names))
    }

    #[must_use]
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) {
        if let NodeKind::Text(text) = &mut self.nodes[id].kind {
            *text = value.into();
        }
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// Ancestors from the parent upwards
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes[id].parent, |n| self.nodes[*n].parent)
    }

    #[must_use]
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).any(|n| n == ancestor)
    }

    /// `id` and everything below it, in document order
    #[must_use]
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.nodes[node].children.iter().rev());
        }
        out
    }

    /// Everything below `id`, in document order
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = self.subtree(id);
        out.remove(0);
        out
    }

    /// All nodes still attached to the tree, in document order
    #[must_use]
    pub fn live_nodes(&self) -> Vec<NodeId> {
        self.subtree(0)
    }

    /// Attached nodes before `id` that are not its ancestors, nearest first
    #[must_use]
    pub fn preceding(&self, id: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .live_nodes()
            .into_iter()
            .take_while(|n| *n < id)
            .filter(|n| !self.is_ancestor(*n, id))
            .collect();
        out.reverse();
        out
    }

    /// Descendant elements (self included) with one of the given names
    #[must_use]
    pub fn elements_within(&self, id: NodeId, names: &[&str]) -> Vec<NodeId> {
        self.subtree(id)
            .into_iter()
            .filter(|n| self.is_element(*n, names))
            .collect()
    }

    /// Text node ids below `id`, skipping script/style content
    #[must_use]
    pub fn text_nodes(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            match &self.nodes[node].kind {
                NodeKind::Text(_) => out.push(node),
                NodeKind::Element(el) if el.is(HIDDEN_TEXT_ELEMENTS) => {}
                _ => stack.extend(self.nodes[node].children.iter().rev()),
            }
        }
        out
    }

    /// Visible text below `id` with whitespace collapsed.
    ///
    /// Line breaks and block element edges count as whitespace.
    #[must_use]
    pub fn normalized_text(&self, id: NodeId) -> String {
        self.visible_text(id, None)
    }

    /// Like [`normalized_text`](Self::normalized_text) but only nodes up to
    /// and including `last` in document order contribute
    #[must_use]
    pub fn normalized_text_through(&self, id: NodeId, last: NodeId) -> String {
        self.visible_text(id, Some(last))
    }

    fn visible_text(&self, id: NodeId, last: Option<NodeId>) -> String {
        enum Step {
            Node(NodeId),
            Gap,
        }

        let mut raw = String::new();
        let mut stack = vec![Step::Node(id)];
        while let Some(step) = stack.pop() {
            let node = match step {
                Step::Gap => {
                    raw.push(' ');
                    continue;
                }
                Step::Node(node) if last.is_some_and(|last| node > last) => continue,
                Step::Node(node) => node,
            };
            let children = self.nodes[node].children.iter().rev().map(|c| Step::Node(*c));
            match &self.nodes[node].kind {
                NodeKind::Text(text) => raw.push_str(text),
                NodeKind::Element(el) if el.is(HIDDEN_TEXT_ELEMENTS) => {}
                NodeKind::Element(el) if el.is(&["br"]) => raw.push(' '),
                NodeKind::Element(el) if el.is(BLOCK_ELEMENTS) => {
                    stack.push(Step::Gap);
                    stack.extend(children);
                    stack.push(Step::Gap);
                }
                _ => stack.extend(children),
            }
        }
        normalize_whitespace(&raw)
    }

    /// Unlink a node from its parent; it is no longer reachable from the root
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|child| *child != id);
        }
    }

    /// Remove everything after `cut` inside `root`.
    ///
    /// Walks from `cut` up to `root`, removing every later sibling at each
    /// level. With `keep_elements` only text nodes in those siblings are
    /// removed. Returns the number of nodes detached.
    pub fn remove_following(&mut self, cut: NodeId, root: NodeId, keep_elements: bool) -> usize {
        if cut != root && !self.is_ancestor(root, cut) {
            return 0;
        }
        let mut removed = 0;
        let mut current = cut;
        while current != root {
            let Some(parent) = self.nodes[current].parent else {
                break;
            };
            let later: Vec<NodeId> = self.nodes[parent]
                .children
                .iter()
                .skip_while(|child| **child != current)
                .skip(1)
                .copied()
                .collect();
            for sibling in later {
                if keep_elements {
                    for node in self.text_nodes(sibling) {
                        self.detach(node);
                        removed += 1;
                    }
                } else {
                    self.detach(sibling);
                    removed += 1;
                }
            }
            current = parent;
        }
        removed
    }

    /// Write the document back out as HTML
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for child in &self.nodes[self.content_root].children {
            self.write_node(*child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id].kind {
            NodeKind::Root => {
                for child in &self.nodes[id].children {
                    self.write_node(*child, out);
                }
            }
            NodeKind::Doctype {
                name,
                public_id,
                system_id,
            } => {
                out.push_str("<!DOCTYPE ");
                out.push_str(name);
                if !public_id.is_empty() {
                    let _ = write!(out, " PUBLIC \"{public_id}\"");
                    if !system_id.is_empty() {
                        let _ = write!(out, " \"{system_id}\"");
                    }
                } else if !system_id.is_empty() {
                    let _ = write!(out, " SYSTEM \"{system_id}\"");
                }
                out.push('>');
            }
            NodeKind::Comment(comment) => {
                let _ = write!(out, "<!--{comment}-->");
            }
            NodeKind::Text(text) => {
                let raw = self.nodes[id]
                    .parent
                    .is_some_and(|p| self.is_element(p, RAW_TEXT_ELEMENTS));
                if raw {
                    out.push_str(text);
                } else {
                    escape_into(text, false, out);
                }
            }
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.name);
                for (key, value) in &element.attrs {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');
                if element.is(VOID_ELEMENTS) {
                    return;
                }
                for child in &self.nodes[id].children {
                    self.write_node(*child, out);
                }
                let _ = write!(out, "</{}>", element.name);
            }
        }
    }
}

fn escape_into(value: &str, attribute: bool, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

/// Collapse whitespace runs to single spaces and trim the ends
#[must_use]
pub fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
