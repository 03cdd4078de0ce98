//! Import-map resolution for script modules.
//!
//! Maps bare module specifiers to URLs, with scoped overrides keyed by
//! referrer URL prefix. Map entries are resolved against the document
//! base once, when a map is merged; lookup then never touches the base
//! again.

use indexmap::IndexMap;
use serde_json::Value;
use url::Url;

type Packages = IndexMap<String, String>;

#[derive(Debug, Default)]
pub struct ImportMap {
    imports: Packages,
    scopes: IndexMap<String, Packages>,
}

impl ImportMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a raw JSON import map, resolving keys and targets against
    /// `base` at merge time. Later maps override earlier entries.
    pub fn add(&mut self, raw: &Value, base: &Url) {
        let Some(map) = raw.as_object() else {
            tracing::warn!("import map is not a JSON object");
            return;
        };
        if let Some(imports) = map.get("imports").and_then(|v| v.as_object()) {
            merge_packages(&mut self.imports, imports, base);
        }
        if let Some(scopes) = map.get("scopes").and_then(|v| v.as_object()) {
            for (scope, packages) in scopes {
                let Some(packages) = packages.as_object() else {
                    tracing::warn!("import map scope '{scope}' is not an object");
                    continue;
                };
                let scope_url = resolve_url(scope, base);
                let entry = self.scopes.entry(scope_url).or_default();
                merge_packages(entry, packages, base);
            }
        }
    }

    /// Resolve a specifier imported from `referrer`.
    ///
    /// Scopes are consulted innermost-first, walking outward one path
    /// segment at a time; top-level imports come last. Unmapped URL-ish
    /// specifiers pass through; unmapped bare specifiers return `None`.
    pub fn resolve(&self, specifier: &str, referrer: &Url) -> Option<String> {
        let resolved_or_plain =
            resolve_if_not_plain_or_url(specifier, referrer).unwrap_or_else(|| specifier.into());

        let mut scope = get_match(referrer.as_str(), &self.scopes);
        while let Some(scope_url) = scope {
            if let Some(hit) = self
                .scopes
                .get(&scope_url)
                .and_then(|packages| apply_packages(&resolved_or_plain, packages))
            {
                return Some(hit);
            }
            let parent = &scope_url[..scope_url.rfind('/').unwrap_or(0)];
            scope = get_match(parent, &self.scopes);
        }
        if let Some(hit) = apply_packages(&resolved_or_plain, &self.imports) {
            return Some(hit);
        }
        resolved_or_plain.contains(':').then_some(resolved_or_plain)
    }

    pub fn is_empty(&self) -> bool {
        self.imports.is_empty() && self.scopes.is_empty()
    }
}

fn merge_packages(target: &mut Packages, source: &serde_json::Map<String, Value>, base: &Url) {
    for (key, value) in source {
        let Some(spec) = value.as_str() else {
            tracing::warn!("import map target for '{key}' is not a string");
            continue;
        };
        let resolved_key = resolve_if_not_plain_or_url(key, base).unwrap_or_else(|| key.clone());
        target.insert(resolved_key, resolve_url(spec, base));
    }
}

/// Resolve URL-like specifiers (`/`, `./`, `../` prefixed) against a
/// base; bare specifiers stay unresolved.
fn resolve_if_not_plain_or_url(spec: &str, base: &Url) -> Option<String> {
    if spec.starts_with('/') || spec.starts_with("./") || spec.starts_with("../") {
        base.join(spec).ok().map(|u| u.to_string())
    } else {
        None
    }
}

/// Resolve a map target: URL-like against the base, absolute URLs kept,
/// everything else treated as base-relative.
fn resolve_url(spec: &str, base: &Url) -> String {
    if let Some(resolved) = resolve_if_not_plain_or_url(spec, base) {
        return resolved;
    }
    if spec.contains(':') {
        return spec.to_string();
    }
    base.join(spec)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| spec.to_string())
}

/// Longest matching key for a path: an exact entry, or the longest
/// prefix entry ending in `/`, truncating at path-segment boundaries.
fn get_match<V>(path: &str, map: &IndexMap<String, V>) -> Option<String> {
    if map.contains_key(path) {
        return Some(path.to_string());
    }
    let mut sep = path.rfind('/');
    while let Some(index) = sep {
        let segment = &path[..=index];
        if map.contains_key(segment) {
            return Some(segment.to_string());
        }
        if index == 0 {
            break;
        }
        sep = path[..index].rfind('/');
    }
    None
}

fn apply_packages(id: &str, packages: &Packages) -> Option<String> {
    let name = get_match(id, packages)?;
    let target = packages.get(&name)?;
    Some(format!("{target}{}", &id[name.len()..]))
}
