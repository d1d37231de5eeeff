//! Binding Model
//!
//! Everything the passes produce: file records, component symbols and the
//! annotated node tree. Annotated nodes live in an arena owned by their
//! [`FileRecord`]; a node's `parent` is a plain id and only `children` express
//! ownership. Components live in one [`ComponentTable`] shared by a project, so
//! two symbols are the same only when their [`ComponentId`]s are equal.

use id_arena::{Arena, Id};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::code_unit::CodeUnit;
use crate::dom::{Document, NodeId, SourceSpan};
use crate::html::escape_single_quoted;
use crate::scanner::BindingExpr;

pub type ComponentId = Id<ComponentSymbol>;
pub type InfoId = Id<AnnotatedNode>;

/// Identifier given to the root of every scope.
pub const ROOT_IDENTIFIER: &str = "_root";

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Sequential identifier source shared by every file of one run.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    pub fn element_id(&self) -> String {
        format!("__e-{}", self.next())
    }

    pub fn text_id(&self) -> String {
        format!("__binding{}", self.next())
    }
}

/// Numeric part of a generated identifier.
pub fn identifier_sequence(identifier: &str) -> Option<u64> {
    identifier
        .strip_prefix("__e-")
        .or_else(|| identifier.strip_prefix("__binding"))
        .and_then(|n| n.parse().ok())
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct ComponentSymbol {
    pub tag_name: String,
    pub extends_tag: String,
    pub declaring_file: PathBuf,
    /// The `<element>` declaration node in the declaring file's document.
    pub element: NodeId,
    pub template: Option<NodeId>,
    pub span: SourceSpan,
    pub extends_component: Option<ComponentId>,
    pub has_conflict: bool,
    pub code: Option<CodeUnit>,
    /// `src` of the declaration's script, resolved during normalization.
    pub external_code: Option<PathBuf>,
    pub used_components: IndexSet<ComponentId>,
}

impl ComponentSymbol {
    pub fn new(
        tag_name: &str,
        extends_tag: &str,
        declaring_file: PathBuf,
        element: NodeId,
        span: SourceSpan,
    ) -> Self {
        Self {
            tag_name: tag_name.to_string(),
            extends_tag: extends_tag.to_string(),
            declaring_file,
            element,
            template: None,
            span,
            extends_component: None,
            has_conflict: false,
            code: None,
            external_code: None,
            used_components: IndexSet::new(),
        }
    }
}

pub struct ComponentTable {
    arena: Arena<ComponentSymbol>,
}

impl Default for ComponentTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentTable {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
        }
    }

    pub fn register(&mut self, symbol: ComponentSymbol) -> ComponentId {
        self.arena.alloc(symbol)
    }

    pub fn get(&self, id: ComponentId) -> &ComponentSymbol {
        &self.arena[id]
    }

    pub fn get_mut(&mut self, id: ComponentId) -> &mut ComponentSymbol {
        &mut self.arena[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &ComponentSymbol)> {
        self.arena.iter()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BINDINGS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BindingStyle {
    Plain,
    Style,
    /// One binding per class token.
    Class,
    TwoWay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeBinding {
    pub bindings: Vec<BindingExpr>,
    /// Literal segments around the bindings of a string interpolation;
    /// `None` for a direct binding.
    pub text_content: Option<Vec<String>>,
    pub style: BindingStyle,
}

impl AttributeBinding {
    pub fn direct(expr: BindingExpr, style: BindingStyle) -> Self {
        Self {
            bindings: vec![expr],
            text_content: None,
            style,
        }
    }

    pub fn interpolation(bindings: Vec<BindingExpr>, texts: Vec<String>, style: BindingStyle) -> Self {
        Self {
            bindings,
            text_content: Some(texts),
            style,
        }
    }

    pub fn is_direct(&self) -> bool {
        self.text_content.is_none()
    }

    /// Expression text of a direct binding.
    pub fn expression(&self) -> Option<&str> {
        match (self.is_direct(), self.bindings.as_slice()) {
            (true, [single]) => Some(single.expr.as_str()),
            _ => None,
        }
    }
}

/// Builds the action text of an event handler from the runtime event value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum EventAction {
    /// Handler text written by the user, used verbatim.
    Inline { code: String },
    /// `target = <event>.property`
    AssignProperty { target: String, property: String },
    /// `target = '<literal>'`
    AssignLiteral { target: String, literal: String },
}

impl EventAction {
    pub fn render(&self, event_value: &str) -> String {
        match self {
            EventAction::Inline { code } => code.clone(),
            EventAction::AssignProperty { target, property } => {
                format!("{} = {}.{}", target, event_value, property)
            }
            EventAction::AssignLiteral { target, literal } => {
                format!("{} = '{}'", target, escape_single_quoted(literal))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBinding {
    pub name: String,
    pub action: EventAction,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ANNOTATED TREE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct ElementInfo {
    pub attributes: IndexMap<String, AttributeBinding>,
    pub events: IndexMap<String, Vec<EventBinding>>,
    pub component: Option<ComponentId>,
}

impl ElementInfo {
    pub fn add_event(&mut self, name: &str, action: EventAction) {
        self.events
            .entry(name.to_string())
            .or_default()
            .push(EventBinding {
                name: name.to_string(),
                action,
            });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Directive {
    Conditional { condition: String },
    Iteration { variable: String, items: String },
}

#[derive(Debug, Clone)]
pub struct StructuralInfo {
    pub directive: Directive,
    /// Bindings of an element that hosts an iteration in place.
    pub element: ElementInfo,
    /// Content node split off an element that opted in to the template role.
    pub content: Option<InfoId>,
}

#[derive(Debug, Clone, Default)]
pub struct TextInfo {
    pub binding: Option<BindingExpr>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element(ElementInfo),
    Structural(StructuralInfo),
    Text(TextInfo),
}

#[derive(Debug, Clone)]
pub struct AnnotatedNode {
    pub id: InfoId,
    pub node: NodeId,
    pub parent: Option<InfoId>,
    pub children: Vec<InfoId>,
    pub identifier: Option<String>,
    pub has_data_binding: bool,
    /// Generated code must look descendants up by query instead of holding
    /// direct references.
    pub has_query: bool,
    pub is_root: bool,
    pub children_created_in_code: bool,
    /// Attributes removed from the static tag once their bindings are extracted.
    pub strip_attributes: IndexSet<String>,
    pub kind: NodeKind,
}

impl AnnotatedNode {
    /// Attribute and event bindings, for elements and structural hosts.
    pub fn element(&self) -> Option<&ElementInfo> {
        match &self.kind {
            NodeKind::Element(info) => Some(info),
            NodeKind::Structural(info) => Some(&info.element),
            NodeKind::Text(_) => None,
        }
    }

    pub fn element_mut(&mut self) -> Option<&mut ElementInfo> {
        match &mut self.kind {
            NodeKind::Element(info) => Some(info),
            NodeKind::Structural(info) => Some(&mut info.element),
            NodeKind::Text(_) => None,
        }
    }

    pub fn structural(&self) -> Option<&StructuralInfo> {
        match &self.kind {
            NodeKind::Structural(info) => Some(info),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&TextInfo> {
        match &self.kind {
            NodeKind::Text(info) => Some(info),
            _ => None,
        }
    }

    pub fn component(&self) -> Option<ComponentId> {
        self.element().and_then(|info| info.component)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE RECORD
// ═══════════════════════════════════════════════════════════════════════════════

pub struct FileRecord {
    pub path: PathBuf,
    pub is_entry_point: bool,
    pub document: Document,
    pub declared_components: Vec<ComponentId>,
    pub component_links: Vec<PathBuf>,
    pub stylesheet_links: IndexSet<PathBuf>,
    /// Components visible in this file, keyed by tag name.
    pub components: IndexMap<String, ComponentId>,
    pub code: Option<CodeUnit>,
    pub external_code: Option<PathBuf>,
    pub used_components: IndexSet<ComponentId>,
    pub nodes: Arena<AnnotatedNode>,
    pub root: Option<InfoId>,
}

impl std::fmt::Debug for FileRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRecord")
            .field("path", &self.path)
            .field("is_entry_point", &self.is_entry_point)
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

impl FileRecord {
    pub fn new(path: PathBuf, document: Document, is_entry_point: bool) -> Self {
        Self {
            path,
            is_entry_point,
            document,
            declared_components: Vec::new(),
            component_links: Vec::new(),
            stylesheet_links: IndexSet::new(),
            components: IndexMap::new(),
            code: None,
            external_code: None,
            used_components: IndexSet::new(),
            nodes: Arena::new(),
            root: None,
        }
    }

    /// Allocate a node under `parent` (appended to its children).
    pub fn alloc_node(&mut self, node: NodeId, parent: Option<InfoId>, kind: NodeKind) -> InfoId {
        let id = self.nodes.alloc_with_id(|id| AnnotatedNode {
            id,
            node,
            parent,
            children: Vec::new(),
            identifier: None,
            has_data_binding: false,
            has_query: false,
            is_root: false,
            children_created_in_code: false,
            strip_attributes: IndexSet::new(),
            kind,
        });
        match parent {
            Some(parent) => self.nodes[parent].children.push(id),
            None => {
                if self.root.is_none() {
                    self.root = Some(id);
                }
            }
        }
        id
    }

    pub fn node(&self, id: InfoId) -> &AnnotatedNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: InfoId) -> &mut AnnotatedNode {
        &mut self.nodes[id]
    }

    /// A node is built by generated code when its parent builds its children.
    pub fn created_in_code(&self, id: InfoId) -> bool {
        self.nodes[id]
            .parent
            .map(|parent| self.nodes[parent].children_created_in_code)
            .unwrap_or(false)
    }

    pub fn ancestors(&self, id: InfoId) -> AncestorIter<'_> {
        AncestorIter {
            file: self,
            current: self.nodes[id].parent,
        }
    }

    /// Pre-order walk of the annotated tree.
    pub fn walk(&self) -> Vec<InfoId> {
        let mut order = Vec::new();
        let mut stack: Vec<InfoId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.iter().rev());
        }
        order
    }
}

/// Walks the parents of a node, nearest first.
pub struct AncestorIter<'a> {
    file: &'a FileRecord,
    current: Option<InfoId>,
}

impl<'a> Iterator for AncestorIter<'a> {
    type Item = &'a AnnotatedNode;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        let node = &self.file.nodes[id];
        self.current = node.parent;
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generator_is_shared_and_increasing() {
        let ids = IdGenerator::new();
        assert_eq!(ids.element_id(), "__e-0");
        assert_eq!(ids.text_id(), "__binding1");
        assert_eq!(ids.element_id(), "__e-2");
        assert_eq!(identifier_sequence("__binding1"), Some(1));
        assert_eq!(identifier_sequence("_root"), None);
    }

    #[test]
    fn test_event_action_render() {
        let assign = EventAction::AssignProperty {
            target: "sel".into(),
            property: "value".into(),
        };
        assert_eq!(assign.render("e"), "sel = e.value");
        let literal = EventAction::AssignLiteral {
            target: "color".into(),
            literal: "it's".into(),
        };
        assert_eq!(literal.render("e"), "color = 'it\\'s'");
        let inline = EventAction::Inline {
            code: "save()".into(),
        };
        assert_eq!(inline.render("e"), "save()");
    }

    #[test]
    fn test_tree_links() {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.create_element("div", SourceSpan::default());
        doc.append_child(root, div);
        let mut file = FileRecord::new(PathBuf::from("a.html"), doc, true);

        let top = file.alloc_node(div, None, NodeKind::Element(ElementInfo::default()));
        file.node_mut(top).children_created_in_code = true;
        let child = file.alloc_node(div, Some(top), NodeKind::Text(TextInfo::default()));
        let grandchild = file.alloc_node(div, Some(child), NodeKind::Text(TextInfo::default()));

        assert_eq!(file.root, Some(top));
        assert!(file.created_in_code(child));
        assert!(!file.created_in_code(grandchild));
        let ancestors: Vec<InfoId> = file.ancestors(grandchild).map(|n| n.id).collect();
        assert_eq!(ancestors, vec![child, top]);
        assert_eq!(file.walk(), vec![top, child, grandchild]);
    }
}
