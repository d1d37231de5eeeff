//! Source Document Model
//!
//! The analyzer consumes an already-parsed document. Nodes live in an arena
//! owned by the [`Document`]: parents are plain ids, and only the ordered child
//! lists express ownership. [`Document::parse_html`] adapts an html5ever parse
//! into this model.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use id_arena::{Arena, Id};
use indexmap::IndexMap;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};
use serde::{Deserialize, Serialize};

use crate::html::{escape_attribute, escape_text, is_void_element};

pub type NodeId = Id<DomNode>;

/// Position of a node in its source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpan {
    pub line: u32,
    pub column: u32,
}

impl SourceSpan {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to read HTML input: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub enum NodeData {
    Document,
    Doctype { name: String },
    Element {
        tag: String,
        attributes: IndexMap<String, String>,
    },
    Text { contents: String },
    Comment { contents: String },
}

#[derive(Debug)]
pub struct DomNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub data: NodeData,
    pub span: SourceSpan,
}

pub struct Document {
    arena: Arena<DomNode>,
    root: NodeId,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.arena.len())
            .finish()
    }
}

/// Finds start tags in the raw source, moving forward only.
struct SpanLocator {
    lowered: String,
    line_starts: Vec<usize>,
    cursor: usize,
}

impl SpanLocator {
    fn new(source: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            lowered: source.to_ascii_lowercase(),
            line_starts,
            cursor: 0,
        }
    }

    /// Position of the next `<tag` after the cursor. A miss leaves the cursor
    /// where it was.
    fn locate(&mut self, tag: &str) -> Option<SourceSpan> {
        let pattern = format!("<{}", tag);
        let mut from = self.cursor;
        while let Some(found) = self.lowered.get(from..)?.find(&pattern) {
            let start = from + found;
            let end = start + pattern.len();
            let boundary = self.lowered[end..]
                .chars()
                .next()
                .map(|c| c.is_ascii_whitespace() || c == '>' || c == '/')
                .unwrap_or(true);
            if boundary {
                self.cursor = end;
                return Some(self.span_at(start));
            }
            from = end;
        }
        None
    }

    fn span_at(&self, offset: usize) -> SourceSpan {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let column = offset - self.line_starts[line - 1] + 1;
        SourceSpan::new(line as u32, column as u32)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.alloc_with_id(|id| DomNode {
            id,
            parent: None,
            children: Vec::new(),
            data: NodeData::Document,
            span: SourceSpan::default(),
        });
        Self { arena, root }
    }

    /// Parse an HTML string with html5ever and import the resulting tree.
    ///
    /// The rcdom sink keeps no positions. Elements get the position of their
    /// start tag, found by scanning the source in document order; elements the
    /// parser implied (`<html>`, `<body>`, ...) keep the default span. Text and
    /// comments share the span of their parent element.
    pub fn parse_html(source: &str) -> Result<Self, DocumentError> {
        let dom = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut source.as_bytes())?;

        let mut document = Document::new();
        let mut locator = SpanLocator::new(source);
        let root = document.root;
        for child in dom.document.children.borrow().iter() {
            document.import_handle(child, root, &mut locator);
        }
        Ok(document)
    }

    fn import_handle(&mut self, handle: &Handle, parent: NodeId, locator: &mut SpanLocator) {
        let inherited = self.arena[parent].span;
        let id = match &handle.data {
            RcNodeData::Document => {
                for child in handle.children.borrow().iter() {
                    self.import_handle(child, parent, locator);
                }
                return;
            }
            RcNodeData::Doctype { name, .. } => self.alloc(NodeData::Doctype {
                name: name.to_string(),
            }),
            RcNodeData::Text { contents } => self.alloc_with_span(
                NodeData::Text {
                    contents: contents.borrow().to_string(),
                },
                inherited,
            ),
            RcNodeData::Comment { contents } => self.alloc_with_span(
                NodeData::Comment {
                    contents: contents.to_string(),
                },
                inherited,
            ),
            RcNodeData::Element {
                name,
                attrs,
                template_contents,
                ..
            } => {
                let tag = name.local.to_string();
                let span = locator.locate(&tag).unwrap_or_default();
                let element = self.create_element(&tag, span);
                for attr in attrs.borrow().iter() {
                    self.set_attribute(element, &attr.name.local.to_string(), &attr.value.to_string());
                }
                self.append_child(parent, element);

                // <template> children live in a separate fragment in html5ever.
                let children: Vec<Handle> = match template_contents.borrow().as_ref() {
                    Some(fragment) => fragment.children.borrow().iter().cloned().collect(),
                    None => handle.children.borrow().iter().cloned().collect(),
                };
                for child in &children {
                    self.import_handle(child, element, locator);
                }
                return;
            }
            RcNodeData::ProcessingInstruction { .. } => return,
        };
        self.append_child(parent, id);
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        self.alloc_with_span(data, SourceSpan::default())
    }

    fn alloc_with_span(&mut self, data: NodeData, span: SourceSpan) -> NodeId {
        self.arena.alloc_with_id(|id| DomNode {
            id,
            parent: None,
            children: Vec::new(),
            data,
            span,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BUILDING
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn create_element(&mut self, tag: &str, span: SourceSpan) -> NodeId {
        self.alloc_with_span(
            NodeData::Element {
                tag: tag.to_ascii_lowercase(),
                attributes: IndexMap::new(),
            },
            span,
        )
    }

    pub fn create_text(&mut self, contents: &str, span: SourceSpan) -> NodeId {
        self.alloc_with_span(
            NodeData::Text {
                contents: contents.to_string(),
            },
            span,
        )
    }

    /// Append `child` as the last child of `parent`, detaching it from any
    /// previous parent first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.arena[child].parent = Some(parent);
        self.arena[parent].children.push(child);
    }

    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.arena[node].parent.take() {
            self.arena[parent].children.retain(|&c| c != node);
        }
    }

    /// Move every child of `from` to the end of `to`, preserving order.
    pub fn move_children(&mut self, from: NodeId, to: NodeId) {
        let children = std::mem::take(&mut self.arena[from].children);
        for child in children {
            self.arena[child].parent = Some(to);
            self.arena[to].children.push(child);
        }
    }

    /// Shallow copy of an element: same tag, attributes and span, no children,
    /// no parent.
    pub fn clone_element(&mut self, node: NodeId) -> NodeId {
        let data = self.arena[node].data.clone();
        let span = self.arena[node].span;
        self.alloc_with_span(data, span)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ACCESS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, node: NodeId) -> &DomNode {
        &self.arena[node]
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena[self.root].children.is_empty()
    }

    pub fn span(&self, node: NodeId) -> SourceSpan {
        self.arena[node].span
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena[node].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.arena[node].children
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        match &self.arena[node].data {
            NodeData::Element { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn is_element(&self, node: NodeId, tag_name: &str) -> bool {
        self.tag_name(node) == Some(tag_name)
    }

    pub fn attributes(&self, node: NodeId) -> Option<&IndexMap<String, String>> {
        match &self.arena[node].data {
            NodeData::Element { attributes, .. } => Some(attributes),
            _ => None,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.attributes(node)
            .and_then(|attrs| attrs.get(name))
            .map(String::as_str)
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attributes, .. } = &mut self.arena[node].data {
            attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Option<String> {
        match &mut self.arena[node].data {
            NodeData::Element { attributes, .. } => attributes.shift_remove(name),
            _ => None,
        }
    }

    pub fn clear_attributes(&mut self, node: NodeId) {
        if let NodeData::Element { attributes, .. } = &mut self.arena[node].data {
            attributes.clear();
        }
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.arena[node].data {
            NodeData::Text { contents } => Some(contents.as_str()),
            _ => None,
        }
    }

    pub fn set_text(&mut self, node: NodeId, value: &str) {
        if let NodeData::Text { contents } = &mut self.arena[node].data {
            *contents = value.to_string();
        }
    }

    /// Concatenated text of the direct text children.
    pub fn inner_text(&self, node: NodeId) -> String {
        self.children(node)
            .iter()
            .filter_map(|&child| self.text(child))
            .collect()
    }

    /// Direct element children with the given tag.
    pub fn child_elements<'a>(
        &'a self,
        node: NodeId,
        tag_name: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.children(node)
            .iter()
            .copied()
            .filter(move |&child| self.is_element(child, tag_name))
    }

    /// First element with the given tag, in document order.
    pub fn find_element(&self, tag_name: &str) -> Option<NodeId> {
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if self.is_element(node, tag_name) {
                return Some(node);
            }
            stack.extend(self.children(node).iter().rev());
        }
        None
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn outer_html(&self, node: NodeId) -> String {
        self.outer_html_filtered(node, &|_, _| true)
    }

    /// Serialize a subtree, keeping only the attributes `keep` accepts.
    pub fn outer_html_filtered(&self, node: NodeId, keep: &dyn Fn(NodeId, &str) -> bool) -> String {
        let mut out = String::new();
        self.write_html(node, keep, &mut out);
        out
    }

    /// Opening tag of an element, with its attributes.
    pub fn start_tag(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_start_tag(node, &|_, _| true, &mut out);
        out
    }

    fn write_start_tag(&self, node: NodeId, keep: &dyn Fn(NodeId, &str) -> bool, out: &mut String) {
        let NodeData::Element { tag, attributes } = &self.arena[node].data else {
            return;
        };
        out.push('<');
        out.push_str(tag);
        for (name, value) in attributes.iter().filter(|(name, _)| keep(node, name.as_str())) {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attribute(value));
            out.push('"');
        }
        out.push('>');
    }

    fn write_html(&self, node: NodeId, keep: &dyn Fn(NodeId, &str) -> bool, out: &mut String) {
        match &self.arena[node].data {
            NodeData::Document => {
                for &child in self.children(node) {
                    self.write_html(child, keep, out);
                }
            }
            NodeData::Doctype { name } => {
                out.push_str("<!DOCTYPE ");
                out.push_str(name);
                out.push('>');
            }
            NodeData::Text { contents } => {
                let raw_parent = self
                    .parent(node)
                    .and_then(|p| self.tag_name(p))
                    .map(|tag| tag == "script" || tag == "style")
                    .unwrap_or(false);
                if raw_parent {
                    out.push_str(contents);
                } else {
                    out.push_str(&escape_text(contents));
                }
            }
            NodeData::Comment { contents } => {
                out.push_str("<!--");
                out.push_str(contents);
                out.push_str("-->");
            }
            NodeData::Element { tag, .. } => {
                self.write_start_tag(node, keep, out);
                if is_void_element(tag) {
                    return;
                }
                for &child in self.children(node) {
                    self.write_html(child, keep, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_html_keeps_body_and_attributes() {
        let doc = Document::parse_html(r#"<div id="a" class="b c">hi</div>"#).unwrap();
        let body = doc.find_element("body").unwrap();
        let div = doc.children(body)[0];
        assert_eq!(doc.tag_name(div), Some("div"));
        assert_eq!(doc.attribute(div, "class"), Some("b c"));
        let names: Vec<&str> = doc.attributes(div).unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["id", "class"]);
        assert_eq!(doc.inner_text(div), "hi");
    }

    #[test]
    fn test_parse_html_records_start_tag_positions() {
        let source = "<body>\n  <div>\n    <p>a</p><P>b</P>\n  </div>\n  <Pre>c</Pre>\n</body>";
        let doc = Document::parse_html(source).unwrap();
        let body = doc.find_element("body").unwrap();
        assert_eq!(doc.span(body), SourceSpan::new(1, 1));

        let div = doc.child_elements(body, "div").next().unwrap();
        assert_eq!(doc.span(div), SourceSpan::new(2, 3));
        let paragraphs: Vec<NodeId> = doc.child_elements(div, "p").collect();
        assert_eq!(doc.span(paragraphs[0]), SourceSpan::new(3, 5));
        assert_eq!(doc.span(paragraphs[1]), SourceSpan::new(3, 13));
        assert_eq!(doc.span(doc.children(paragraphs[1])[0]), SourceSpan::new(3, 13));

        let pre = doc.child_elements(body, "pre").next().unwrap();
        assert_eq!(doc.span(pre), SourceSpan::new(5, 3));

        // implied by the parser, never written in the source
        let html = doc.find_element("html").unwrap();
        assert_eq!(doc.span(html), SourceSpan::default());
    }

    #[test]
    fn test_implied_head_does_not_claim_a_longer_tag() {
        let doc = Document::parse_html("<header>x</header>").unwrap();
        assert_eq!(doc.span(doc.find_element("head").unwrap()), SourceSpan::default());
        assert_eq!(doc.span(doc.find_element("header").unwrap()), SourceSpan::new(1, 1));
    }

    #[test]
    fn test_template_contents_become_children() {
        let doc = Document::parse_html("<template><span>x</span></template>").unwrap();
        let template = doc.find_element("template").unwrap();
        assert_eq!(doc.children(template).len(), 1);
        assert!(doc.is_element(doc.children(template)[0], "span"));
    }

    #[test]
    fn test_clone_and_move_children() {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.create_element("DIV", SourceSpan::new(3, 4));
        doc.append_child(root, div);
        doc.set_attribute(div, "if", "show");
        let text = doc.create_text("hi", SourceSpan::default());
        doc.append_child(div, text);

        let copy = doc.clone_element(div);
        doc.move_children(div, copy);
        doc.clear_attributes(div);

        assert_eq!(doc.tag_name(copy), Some("div"));
        assert_eq!(doc.attribute(copy, "if"), Some("show"));
        assert_eq!(doc.span(copy), SourceSpan::new(3, 4));
        assert!(doc.children(div).is_empty());
        assert_eq!(doc.parent(text), Some(copy));
        assert!(doc.attributes(div).unwrap().is_empty());
        assert_eq!(doc.parent(copy), None);
    }

    #[test]
    fn test_outer_html() {
        let doc = Document::parse_html(r#"<p title="a&quot;b">x &lt; y<br></p>"#).unwrap();
        let p = doc.find_element("p").unwrap();
        assert_eq!(doc.outer_html(p), r#"<p title="a&quot;b">x &lt; y<br></p>"#);
        assert_eq!(doc.start_tag(p), r#"<p title="a&quot;b">"#);
        assert_eq!(doc.outer_html_filtered(p, &|_, name| name != "title"), "<p>x &lt; y<br></p>");
    }
}
