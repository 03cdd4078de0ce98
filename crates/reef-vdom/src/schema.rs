//! Directive attribute grammar.
//!
//! The naming pattern must stay bit-exact with any server-side
//! counterpart that emits these attributes:
//! `data-{prefix}-{directive}(--{suffix})?="{value}"`, where the value
//! may begin with `{namespace}::` before the expression body.

use regex::Regex;

/// Attribute names and grammar for one directive prefix.
#[derive(Debug, Clone)]
pub struct DirectiveSchema {
    prefix: String,
    full_prefix: String,
    ignore_attr: String,
    island_attr: String,
    region_attr: String,
    name_re: Regex,
    ns_re: Regex,
}

impl DirectiveSchema {
    /// Build a schema for the given directive prefix (e.g. `reef` for
    /// `data-reef-on--click`).
    pub fn new(prefix: &str) -> Self {
        let name_re = Regex::new(&format!(
            "(?i)^data-{prefix}-([a-z0-9]+(?:-[a-z0-9]+)*)(?:--([a-z0-9_-]+))?$"
        ))
        .expect("directive name pattern is valid");
        let ns_re = Regex::new(r"^([\w_/-]+)::(.+)$").expect("namespace pattern is valid");
        Self {
            prefix: prefix.to_string(),
            full_prefix: format!("data-{prefix}-"),
            ignore_attr: format!("data-{prefix}-ignore"),
            island_attr: format!("data-{prefix}-interactive"),
            region_attr: format!("data-{prefix}-router-region"),
            name_re,
            ns_re,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `data-{prefix}-`.
    pub fn full_prefix(&self) -> &str {
        &self.full_prefix
    }

    /// The ignore marker attribute name.
    pub fn ignore_attr(&self) -> &str {
        &self.ignore_attr
    }

    /// The island marker attribute name.
    pub fn island_attr(&self) -> &str {
        &self.island_attr
    }

    /// The router region marker attribute name.
    pub fn region_attr(&self) -> &str {
        &self.region_attr
    }

    /// Check whether an attribute name carries the directive prefix.
    pub fn is_directive_attr(&self, name: &str) -> bool {
        name.len() > self.full_prefix.len() && name.starts_with(&self.full_prefix)
    }

    /// Parse a directive attribute name into `(directive, suffix)`.
    ///
    /// Returns `None` for names failing the grammar; callers warn and
    /// drop those.
    pub fn parse_name(&self, name: &str) -> Option<(String, Option<String>)> {
        let captures = self.name_re.captures(name)?;
        let directive = captures.get(1)?.as_str().to_lowercase();
        let suffix = captures.get(2).map(|m| m.as_str().to_string());
        Some((directive, suffix))
    }

    /// Split an optional `namespace::` qualifier off an attribute value.
    pub fn split_namespace<'a>(&self, value: &'a str) -> (Option<&'a str>, &'a str) {
        match self.ns_re.captures(value) {
            Some(captures) => {
                let ns = captures.get(1).map(|m| m.as_str());
                let expr = captures.get(2).map(|m| m.as_str()).unwrap_or(value);
                (ns, expr)
            }
            None => (None, value),
        }
    }
}

impl Default for DirectiveSchema {
    fn default() -> Self {
        Self::new("reef")
    }
}
