//! HTML5 parser implementation.

use html5ever::parse_document as h5_parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};
use reef_dom::{Document, NodeData, NodeId};

/// Parse an HTML string into a Reef document.
pub fn parse_document(html: &str, base_url: &str) -> Document {
    tracing::debug!("parsing HTML document: {}", base_url);

    let dom = h5_parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .expect("reading from a string is infallible");

    let mut document = Document::empty(base_url);
    convert_node(&dom.document, &mut document, NodeId::ROOT);

    tracing::debug!("parsed {} nodes", document.tree().len());
    document
}

fn convert_node(handle: &Handle, doc: &mut Document, parent: NodeId) {
    match &handle.data {
        RcNodeData::Document => {
            for child in handle.children.borrow().iter() {
                convert_node(child, doc, parent);
            }
        }
        RcNodeData::Doctype { .. } => {
            // Not represented; irrelevant to hydration.
        }
        RcNodeData::Text { contents } => {
            let id = doc.create_text(&contents.borrow());
            doc.tree_mut().append_child(parent, id);
        }
        RcNodeData::Comment { contents } => {
            let id = doc
                .tree_mut()
                .alloc(NodeData::Comment(contents.to_string()));
            doc.tree_mut().append_child(parent, id);
        }
        RcNodeData::ProcessingInstruction { target, contents } => {
            let id = doc.tree_mut().alloc(NodeData::ProcessingInstruction {
                target: target.to_string(),
                data: contents.to_string(),
            });
            doc.tree_mut().append_child(parent, id);
        }
        RcNodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            let id = doc.create_element(&name.local);
            for attr in attrs.borrow().iter() {
                doc.element_mut(id)
                    .expect("just created element")
                    .set_attr(&attr.name.local, attr.value.to_string());
            }
            doc.tree_mut().append_child(parent, id);

            // Template contents live in a separate fragment in html5ever;
            // attach them as the template's children so the translator can
            // map them individually.
            if let Some(contents) = template_contents.borrow().as_ref() {
                for child in contents.children.borrow().iter() {
                    convert_node(child, doc, id);
                }
            }
            for child in handle.children.borrow().iter() {
                convert_node(child, doc, id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let doc = parse_document(
            "<html><head><title>Test</title></head><body><p id=\"x\">Hello</p></body></html>",
            "https://example.test/",
        );
        assert_eq!(doc.title().as_deref(), Some("Test"));
        let p = doc.query_selector("#x").unwrap();
        assert_eq!(doc.tag(p), Some("p"));
        assert_eq!(doc.text_content(p), "Hello");
    }

    #[test]
    fn test_comments_are_preserved() {
        let doc = parse_document(
            "<body><div><!-- keep me -->text</div></body>",
            "https://example.test/",
        );
        let div = doc.query_selector("div").unwrap();
        assert!(doc.inner_html(div).contains("<!-- keep me -->"));
    }

    #[test]
    fn test_template_contents_become_children() {
        let doc = parse_document(
            "<body><template id=\"t\"><li>item</li></template></body>",
            "https://example.test/",
        );
        let template = doc.query_selector("#t").unwrap();
        let children: Vec<_> = doc.tree().children(template).collect();
        assert_eq!(children.len(), 1);
        assert_eq!(doc.tag(children[0]), Some("li"));
    }
}
