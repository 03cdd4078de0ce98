//! Minimal CSS selector matching.
//!
//! Supports compound simple selectors: `tag`, `#id`, `.class`, `[attr]`
//! and `[attr=value]` (no combinators). This covers the router's
//! `attachTo` insertion points.

use crate::{Document, ElementData, NodeId};

#[derive(Debug, PartialEq, Eq)]
enum SimpleSelector {
    Tag(String),
    Id(String),
    Class(String),
    AttrPresent(String),
    AttrEquals(String, String),
}

fn parse_selector(selector: &str) -> Option<Vec<SimpleSelector>> {
    let selector = selector.trim();
    if selector.is_empty() || selector.contains(char::is_whitespace) {
        return None;
    }
    let mut parts = Vec::new();
    let mut rest = selector;
    while !rest.is_empty() {
        let (part, remainder) = match rest.as_bytes()[0] {
            b'#' | b'.' => {
                let kind = rest.as_bytes()[0];
                let body = &rest[1..];
                let end = body
                    .find(['#', '.', '['])
                    .unwrap_or(body.len());
                if end == 0 {
                    return None;
                }
                let name = body[..end].to_string();
                let sel = if kind == b'#' {
                    SimpleSelector::Id(name)
                } else {
                    SimpleSelector::Class(name)
                };
                (sel, &body[end..])
            }
            b'[' => {
                let close = rest.find(']')?;
                let body = &rest[1..close];
                let sel = match body.split_once('=') {
                    Some((name, value)) => SimpleSelector::AttrEquals(
                        name.trim().to_string(),
                        value.trim().trim_matches(['"', '\'']).to_string(),
                    ),
                    None => SimpleSelector::AttrPresent(body.trim().to_string()),
                };
                (sel, &rest[close + 1..])
            }
            _ => {
                let end = rest.find(['#', '.', '[']).unwrap_or(rest.len());
                (SimpleSelector::Tag(rest[..end].to_lowercase()), &rest[end..])
            }
        };
        parts.push(part);
        rest = remainder;
    }
    Some(parts)
}

fn matches(el: &ElementData, parts: &[SimpleSelector]) -> bool {
    parts.iter().all(|part| match part {
        SimpleSelector::Tag(tag) => el.tag == *tag,
        SimpleSelector::Id(id) => el.attr("id") == Some(id.as_str()),
        SimpleSelector::Class(class) => el.has_class(class),
        SimpleSelector::AttrPresent(name) => el.has_attr(name),
        SimpleSelector::AttrEquals(name, value) => el.attr(name) == Some(value.as_str()),
    })
}

impl Document {
    /// Find the first element matching a compound simple selector.
    pub fn query_selector(&self, selector: &str) -> Option<NodeId> {
        let parts = parse_selector(selector)?;
        self.find_element(|el| matches(el, &parts))
    }

    /// Find all elements matching a compound simple selector.
    pub fn query_selector_all(&self, selector: &str) -> Vec<NodeId> {
        let Some(parts) = parse_selector(selector) else {
            return Vec::new();
        };
        self.tree()
            .descendants(self.root())
            .filter(|&id| self.element(id).is_some_and(|el| matches(el, &parts)))
            .collect()
    }
}
