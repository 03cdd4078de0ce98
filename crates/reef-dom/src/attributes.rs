//! Class-token and inline-style helpers on element data.
//!
//! The `class` and `style` directives perform a one-time hydration pass
//! directly against the live element. Token matching must honor word
//! boundaries: removing `open` must not touch `reopen`.

use crate::ElementData;

impl ElementData {
    /// Check whether a class token is present (whole-token match).
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|v| v.split_whitespace().any(|t| t == class))
            .unwrap_or(false)
    }

    /// Add a class token if not already present. Never duplicates a token.
    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let current = self.attr("class").unwrap_or("");
        let next = if current.is_empty() {
            class.to_string()
        } else {
            format!("{current} {class}")
        };
        self.set_attr("class", next);
    }

    /// Remove a class token (whole-token match).
    pub fn remove_class(&mut self, class: &str) {
        let Some(current) = self.attr("class") else {
            return;
        };
        let next = current
            .split_whitespace()
            .filter(|t| *t != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attr("class", next);
    }

    /// Read a property from the inline `style` attribute.
    pub fn style_property(&self, name: &str) -> Option<String> {
        let style = self.attr("style")?;
        for decl in style.split(';') {
            let mut parts = decl.splitn(2, ':');
            let prop = parts.next()?.trim();
            if prop == name {
                return parts.next().map(|v| v.trim().to_string());
            }
        }
        None
    }

    /// Set a property in the inline `style` attribute.
    pub fn set_style_property(&mut self, name: &str, value: &str) {
        let mut decls = self.parse_style();
        if let Some(entry) = decls.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value.to_string();
        } else {
            decls.push((name.to_string(), value.to_string()));
        }
        self.write_style(&decls);
    }

    /// Remove a property from the inline `style` attribute.
    pub fn remove_style_property(&mut self, name: &str) {
        let mut decls = self.parse_style();
        decls.retain(|(n, _)| n != name);
        self.write_style(&decls);
    }

    fn parse_style(&self) -> Vec<(String, String)> {
        let Some(style) = self.attr("style") else {
            return Vec::new();
        };
        style
            .split(';')
            .filter_map(|decl| {
                let mut parts = decl.splitn(2, ':');
                let name = parts.next()?.trim();
                let value = parts.next()?.trim();
                if name.is_empty() || value.is_empty() {
                    None
                } else {
                    Some((name.to_string(), value.to_string()))
                }
            })
            .collect()
    }

    fn write_style(&mut self, decls: &[(String, String)]) {
        if decls.is_empty() {
            self.remove_attr("style");
            return;
        }
        let text = decls
            .iter()
            .map(|(n, v)| format!("{n}: {v}"))
            .collect::<Vec<_>>()
            .join("; ");
        self.set_attr("style", text);
    }
}
