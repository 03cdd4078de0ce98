//! Built-in directives.
//!
//! Registered on every engine at construction. Evaluation failures are
//! isolated per entry: a broken expression logs a warning and skips
//! that entry, never the node or the pass.

use crate::engine::{EffectKind, GlobalListener, GlobalTarget};
use crate::evaluate::{resolve, truthy};
use crate::events::{Listener, ListenerMode};
use crate::registry::{DirectiveArgs, DirectiveRegistry, EachItem};
use crate::render::{DomPatch, RenderChildren};
use reef_state::deep_merge;
use reef_vdom::Children;
use serde_json::Value;
use std::rc::Rc;

/// Attributes the `bind` directive never sets through direct property
/// assignment. Attribute names arrive lowercased from the parser.
const BIND_ATTRIBUTE_ONLY: &[&str] = &[
    "width", "height", "href", "list", "form", "tabindex", "download", "rowspan", "colspan",
    "role",
];

pub fn register_builtins(registry: &mut DirectiveRegistry) {
    registry.register_with_priority("each-child", 1, Rc::new(each_child));
    registry.register_with_priority("context", 5, Rc::new(context));
    registry.register("watch", Rc::new(watch));
    registry.register("init", Rc::new(init));
    registry.register("on", Rc::new(on));
    registry.register("on-async", Rc::new(on_async));
    registry.register("on-window", Rc::new(on_window));
    registry.register("on-document", Rc::new(on_document));
    registry.register("on-async-window", Rc::new(on_async_window));
    registry.register("on-async-document", Rc::new(on_async_document));
    registry.register("class", Rc::new(class));
    registry.register("style", Rc::new(style));
    registry.register("bind", Rc::new(bind));
    registry.register("ignore", Rc::new(ignore));
    registry.register("text", Rc::new(text));
    registry.register("run", Rc::new(run));
    registry.register_with_priority("each", 20, Rc::new(each));
}

type Result = std::result::Result<(), crate::evaluate::EvalError>;

/// Server-rendered list items inside a hydrated list are dropped; the
/// list directive regenerates them.
fn each_child(args: &mut DirectiveArgs<'_>) -> Result {
    *args.suppressed = true;
    Ok(())
}

fn context(args: &mut DirectiveArgs<'_>) -> Result {
    let Some(entry) = args.entries.iter().find(|e| e.suffix.is_none()).cloned() else {
        return Ok(());
    };
    let Some(ns) = entry.namespace.clone() else {
        return Ok(());
    };
    let value = match entry.value.as_object() {
        Some(map) => Value::Object(map.clone()),
        None => {
            tracing::warn!("context value must be a stringified JSON object");
            Value::Object(Default::default())
        }
    };

    let cell = match args.slot.context_cell.clone() {
        Some(cell) => {
            // Client writes survive re-renders; only new keys come in.
            cell.merge_defaults(&value);
            cell
        }
        None => {
            let mut seed = args
                .scope
                .context(&ns)
                .map(|c| c.snapshot())
                .unwrap_or_else(|| Value::Object(Default::default()));
            deep_merge(&mut seed, &value, true);
            let cell = args.alloc_cell(seed);
            args.slot.context_cell = Some(cell.clone());
            cell
        }
    };

    let server = match args.slot.context_server.clone() {
        Some(server) => server,
        None => {
            let mut seed = args
                .scope
                .server_context(&ns)
                .map(|v| (**v).clone())
                .unwrap_or_else(|| Value::Object(Default::default()));
            deep_merge(&mut seed, &value, true);
            let server = Rc::new(seed);
            args.slot.context_server = Some(Rc::clone(&server));
            server
        }
    };

    *args.scope = args.scope.with_context(&ns, cell, server);
    Ok(())
}

fn watch(args: &mut DirectiveArgs<'_>) -> Result {
    for entry in args.entries.to_vec() {
        args.push_effect(EffectKind::Watch, &entry);
    }
    Ok(())
}

fn init(args: &mut DirectiveArgs<'_>) -> Result {
    for entry in args.entries.to_vec() {
        args.push_effect(EffectKind::Init, &entry);
    }
    Ok(())
}

/// Event name from a listener suffix: anything after a second `--` only
/// disambiguates multiple listeners for the same event.
fn event_name(suffix: &str) -> &str {
    suffix.split_once("--").map_or(suffix, |(name, _)| name)
}

fn attach_listeners(args: &mut DirectiveArgs<'_>, mode: ListenerMode) {
    for entry in args.entries.to_vec() {
        let Some(suffix) = entry.suffix.as_deref() else {
            tracing::warn!("event directive is missing an event-name suffix");
            continue;
        };
        let event = event_name(suffix).to_string();
        args.node.listeners.entry(event).or_default().push(Listener {
            entry: entry.clone(),
            scope: args.scope.clone(),
            mode,
        });
    }
}

fn on(args: &mut DirectiveArgs<'_>) -> Result {
    attach_listeners(args, ListenerMode::Sync);
    Ok(())
}

fn on_async(args: &mut DirectiveArgs<'_>) -> Result {
    attach_listeners(args, ListenerMode::Async);
    Ok(())
}

/// Window/document listeners attach once per mount; the slot drops them
/// on unmount.
fn attach_global(args: &mut DirectiveArgs<'_>, target: GlobalTarget, mode: ListenerMode) {
    if !args.first_mount {
        return;
    }
    for entry in args.entries.to_vec() {
        let Some(suffix) = entry.suffix.as_deref() else {
            tracing::warn!("event directive is missing an event-name suffix");
            continue;
        };
        args.slot.global_listeners.push(GlobalListener {
            target,
            event: event_name(suffix).to_string(),
            listener: Listener {
                entry: entry.clone(),
                scope: args.scope.clone(),
                mode,
            },
        });
    }
}

fn on_window(args: &mut DirectiveArgs<'_>) -> Result {
    attach_global(args, GlobalTarget::Window, ListenerMode::Sync);
    Ok(())
}

fn on_document(args: &mut DirectiveArgs<'_>) -> Result {
    attach_global(args, GlobalTarget::Document, ListenerMode::Sync);
    Ok(())
}

fn on_async_window(args: &mut DirectiveArgs<'_>) -> Result {
    attach_global(args, GlobalTarget::Window, ListenerMode::Async);
    Ok(())
}

fn on_async_document(args: &mut DirectiveArgs<'_>) -> Result {
    attach_global(args, GlobalTarget::Document, ListenerMode::Async);
    Ok(())
}

fn class(args: &mut DirectiveArgs<'_>) -> Result {
    for entry in args.entries.to_vec() {
        let Some(class) = entry.suffix.clone() else {
            continue;
        };
        let value = match args.resolve(&entry) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("class directive for '{class}' failed: {err}");
                continue;
            }
        };
        let on = truthy(&value);
        let current = args
            .node
            .props
            .get("class")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let next = if on {
            class_list_add(&current, &class)
        } else {
            class_list_remove(&current, &class)
        };
        args.node.props.insert("class".into(), Value::String(next));
        if args.first_mount {
            args.patches.push(if on {
                DomPatch::AddClass {
                    node: args.node.dom,
                    class: class.clone(),
                }
            } else {
                DomPatch::RemoveClass {
                    node: args.node.dom,
                    class: class.clone(),
                }
            });
        }
    }
    Ok(())
}

fn style(args: &mut DirectiveArgs<'_>) -> Result {
    for entry in args.entries.to_vec() {
        let Some(name) = entry.suffix.clone() else {
            continue;
        };
        let value = match args.resolve(&entry) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("style directive for '{name}' failed: {err}");
                continue;
            }
        };
        let current = args
            .node
            .props
            .get("style")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let mut decls = parse_style_decls(&current);
        // Falsy values remove the property.
        let set = truthy(&value).then(|| css_value(&value));
        match &set {
            Some(css) => {
                if let Some(decl) = decls.iter_mut().find(|(n, _)| n == &name) {
                    decl.1 = css.clone();
                } else {
                    decls.push((name.clone(), css.clone()));
                }
            }
            None => decls.retain(|(n, _)| n != &name),
        }
        args.node
            .props
            .insert("style".into(), Value::String(write_style_decls(&decls)));
        if args.first_mount {
            args.patches.push(match set {
                Some(css) => DomPatch::SetStyleProperty {
                    node: args.node.dom,
                    name: name.clone(),
                    value: css,
                },
                None => DomPatch::RemoveStyleProperty {
                    node: args.node.dom,
                    name: name.clone(),
                },
            });
        }
    }
    Ok(())
}

fn bind(args: &mut DirectiveArgs<'_>) -> Result {
    for entry in args.entries.to_vec() {
        let Some(attribute) = entry.suffix.clone() else {
            continue;
        };
        let value = match args.resolve(&entry) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("bind directive for '{attribute}' failed: {err}");
                continue;
            }
        };
        args.node.props.insert(attribute.clone(), value.clone());
        if !args.first_mount {
            continue;
        }
        let node = args.node.dom;
        if attribute == "style" {
            args.patches.push(match value.as_str() {
                Some(css) => DomPatch::SetAttribute {
                    node,
                    name: attribute,
                    value: css.to_string(),
                },
                None => DomPatch::RemoveAttribute {
                    node,
                    name: attribute,
                },
            });
        } else if !BIND_ATTRIBUTE_ONLY.contains(&attribute.as_str())
            && !attribute.starts_with("data-")
            && !attribute.starts_with("aria-")
        {
            // Direct property assignment; null collapses to the empty
            // string the way missing IDL values do.
            let prop = if value.is_null() {
                Value::String(String::new())
            } else {
                value.clone()
            };
            args.patches.push(DomPatch::SetProperty {
                node,
                name: attribute.clone(),
                value: prop,
            });
            // Boolean and null assignments reflect onto the markup
            // attribute, like reflected IDL properties in a browser.
            match value {
                Value::Bool(true) => args.patches.push(DomPatch::SetAttribute {
                    node,
                    name: attribute,
                    value: String::new(),
                }),
                Value::Bool(false) | Value::Null => {
                    args.patches.push(DomPatch::RemoveAttribute {
                        node,
                        name: attribute,
                    });
                }
                _ => {}
            }
        } else {
            let boolean_keeps = value != Value::Bool(false)
                || attribute.starts_with("data-")
                || attribute.starts_with("aria-");
            if !value.is_null() && boolean_keeps {
                args.patches.push(DomPatch::SetAttribute {
                    node,
                    name: attribute,
                    value: attr_string(&value),
                });
            } else {
                args.patches.push(DomPatch::RemoveAttribute {
                    node,
                    name: attribute,
                });
            }
        }
    }
    Ok(())
}

fn ignore(args: &mut DirectiveArgs<'_>) -> Result {
    if let Children::RawHtml(html) = &args.node.source.children {
        let html = html.clone();
        args.node.children = RenderChildren::RawHtml(html);
    }
    Ok(())
}

fn text(args: &mut DirectiveArgs<'_>) -> Result {
    let Some(entry) = args.entries.iter().find(|e| e.suffix.is_none()).cloned() else {
        return Ok(());
    };
    args.node.children = match args.resolve(&entry) {
        Ok(Value::String(s)) => RenderChildren::Text(s),
        Ok(Value::Number(n)) => RenderChildren::Text(n.to_string()),
        Ok(Value::Bool(b)) => RenderChildren::Text(b.to_string()),
        // Null and structured values clear the content.
        Ok(_) => RenderChildren::Empty,
        Err(err) => {
            tracing::warn!("text directive failed: {err}");
            RenderChildren::Empty
        }
    };
    Ok(())
}

fn run(args: &mut DirectiveArgs<'_>) -> Result {
    for entry in args.entries.to_vec() {
        if let Err(err) = args.resolve(&entry) {
            tracing::warn!("run directive failed: {err}");
        }
    }
    Ok(())
}

fn each(args: &mut DirectiveArgs<'_>) -> Result {
    if args.node.tag != "template" {
        return Ok(());
    }
    let Some(entry) = args.entries.first().cloned() else {
        return Ok(());
    };
    let Some(ns) = entry.namespace.clone() else {
        return Ok(());
    };
    let Value::Array(items) = args.resolve(&entry)? else {
        return Ok(());
    };
    let item_prop = entry
        .suffix
        .as_deref()
        .map(kebab_to_camel)
        .unwrap_or_else(|| "item".to_string());
    let key_entry = args
        .directives
        .get("each-key")
        .and_then(|entries| entries.first())
        .cloned();
    let inherited = args.scope.context(&ns).map(|c| c.snapshot());
    let server = args
        .scope
        .server_context(&ns)
        .cloned()
        .unwrap_or_else(|| Rc::new(Value::Object(Default::default())));

    let mut out = Vec::with_capacity(items.len());
    let mut used_keys = Vec::with_capacity(items.len());
    for item in items {
        let inherit_seed = || {
            inherited
                .clone()
                .unwrap_or_else(|| Value::Object(Default::default()))
        };
        let key = match &key_entry {
            Some(key_entry) => {
                // The key expression sees the item under a throwaway
                // binding; item cells are looked up by the key after.
                let mut seed = inherit_seed();
                set_object_key(&mut seed, &item_prop, item.clone());
                let probe = args.alloc_cell(seed);
                let probe_scope = args.scope.with_context(&ns, probe, Rc::clone(&server));
                match resolve(key_entry, &probe_scope, args.state, args.actions) {
                    Ok(key) => key,
                    Err(err) => {
                        tracing::warn!("each-key failed: {err}");
                        item.clone()
                    }
                }
            }
            None => item.clone(),
        };
        let cache_key = serde_json::to_string(&key).unwrap_or_default();
        let cell = match args.slot.each_cells.get(&cache_key) {
            Some(cell) => cell.clone(),
            None => {
                let cell = args.alloc_cell(inherit_seed());
                args.slot.each_cells.insert(cache_key.clone(), cell.clone());
                cell
            }
        };
        if cell.peek(&item_prop).as_ref() != Some(&item) {
            cell.set(&item_prop, item.clone(), args.state);
        }
        used_keys.push(cache_key);
        out.push(EachItem {
            key,
            scope: args.scope.with_context(&ns, cell, Rc::clone(&server)),
        });
    }
    // Drop cells for items no longer in the list.
    args.slot
        .each_cells
        .retain(|key, _| used_keys.iter().any(|k| k == key));
    *args.each_items = Some(out);
    Ok(())
}

fn set_object_key(target: &mut Value, key: &str, value: Value) {
    if let Value::Object(map) = target {
        map.insert(key.to_string(), value);
    }
}

fn kebab_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for ch in name.chars() {
        if ch == '-' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn class_list_add(current: &str, class: &str) -> String {
    if current.split_whitespace().any(|t| t == class) {
        return current.to_string();
    }
    if current.is_empty() {
        class.to_string()
    } else {
        format!("{current} {class}")
    }
}

fn class_list_remove(current: &str, class: &str) -> String {
    current
        .split_whitespace()
        .filter(|t| *t != class)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_style_decls(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() || value.is_empty() {
                None
            } else {
                Some((name.to_string(), value.to_string()))
            }
        })
        .collect()
}

fn write_style_decls(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(n, v)| format!("{n}: {v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn css_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => attr_string(other),
    }
}

fn attr_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kebab_to_camel() {
        assert_eq!(kebab_to_camel("item"), "item");
        assert_eq!(kebab_to_camel("my-list-item"), "myListItem");
    }

    #[test]
    fn test_class_list_respects_token_boundaries() {
        assert_eq!(class_list_add("reopen", "open"), "reopen open");
        assert_eq!(class_list_add("open", "open"), "open");
        assert_eq!(class_list_remove("reopen open wide-open", "open"), "reopen wide-open");
    }

    #[test]
    fn test_event_name_strips_disambiguation() {
        assert_eq!(event_name("click"), "click");
        assert_eq!(event_name("keydown--two"), "keydown");
    }
}
