//! Semantic Pass
//!
//! Walks one normalized document from `<body>` and builds the annotated node
//! tree: structural directives, component binding, attribute and text
//! bindings, and runtime identifiers.
//!
//! ## Invariants
//!
//! 1. **One node per source node**: every analyzed element or text node gets
//!    exactly one annotated node. The only synthetic nodes are the content
//!    node of an opt-in conditional and the split segments of bound text.
//! 2. **Roots**: `<body>` and each component's template are roots. They carry
//!    the fixed `_root` identifier and never get a generated one.
//! 3. **Identifiers**: assigned post-order, at most once, only to nodes that
//!    need one, from the run-wide [`IdGenerator`]. Nodes not built by generated
//!    code get the identifier written back onto their `id` attribute.
//! 4. **Dropped nodes**: a malformed directive reports a diagnostic and removes
//!    the element (and its subtree) from the annotated tree only; the source
//!    document keeps it.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, trace};

use crate::diagnostics::DiagnosticSink;
use crate::dom::{NodeData, NodeId};
use crate::html::{is_custom_tag, trim_or_compact};
use crate::model::{
    ComponentId, ComponentTable, Directive, ElementInfo, FileRecord, IdGenerator, InfoId,
    NodeKind, StructuralInfo, TextInfo, ROOT_IDENTIFIER,
};
use crate::options::AnalyzerOptions;
use crate::scanner::scan;

lazy_static! {
    /// `<identifier> in <expression>`
    static ref ITERATE_RE: Regex =
        Regex::new(r"^\s*([A-Za-z_$][A-Za-z0-9_$]*)\s+in\s+(.+?)\s*$").unwrap();
}

/// Attributes that drive the analyzer itself and are never bindings.
pub(crate) const DIRECTIVE_ATTRIBUTES: &[&str] =
    &["if", "iterate", "instantiate", "template", "indentation"];

#[derive(Debug, Clone, Copy)]
pub(crate) struct Context {
    /// Component whose declaration encloses the node, if any.
    pub scope: Option<ComponentId>,
    pub parent: Option<InfoId>,
    pub keep_indentation: bool,
}

enum Structural {
    NotStructural,
    Dropped,
    Built(InfoId),
}

pub(crate) struct Analyzer<'a> {
    pub file: &'a mut FileRecord,
    pub components: &'a mut ComponentTable,
    pub ids: &'a IdGenerator,
    pub sink: &'a mut dyn DiagnosticSink,
}

/// Run the semantic pass over a normalized file.
pub fn analyze_file(
    file: &mut FileRecord,
    components: &mut ComponentTable,
    ids: &IdGenerator,
    sink: &mut dyn DiagnosticSink,
    options: &AnalyzerOptions,
) {
    debug!(file = %file.path.display(), "semantic pass");
    let Some(body) = file.document.find_element("body") else {
        debug!(file = %file.path.display(), "document has no body");
        return;
    };
    let mut analyzer = Analyzer {
        file,
        components,
        ids,
        sink,
    };
    analyzer.visit_element(
        body,
        Context {
            scope: None,
            parent: None,
            keep_indentation: options.preserve_indentation,
        },
    );
}

impl<'a> Analyzer<'a> {
    pub(crate) fn warning(&mut self, message: &str, node: NodeId) {
        let span = self.file.document.span(node);
        self.sink.warning(message, span, &self.file.path);
    }

    pub(crate) fn error(&mut self, message: &str, node: NodeId) {
        let span = self.file.document.span(node);
        self.sink.error(message, span, &self.file.path);
    }

    pub(crate) fn strip(&mut self, info: InfoId, name: &str) {
        self.file.node_mut(info).strip_attributes.insert(name.to_string());
    }

    pub(crate) fn element_info(&mut self, info: InfoId) -> Option<&mut ElementInfo> {
        self.file.node_mut(info).element_mut()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TRAVERSAL
    // ═══════════════════════════════════════════════════════════════════════════

    fn visit_children(&mut self, node: NodeId, context: Context) {
        let children = self.file.document.children(node).to_vec();
        for child in children {
            if self.file.document.tag_name(child).is_some() {
                self.visit_element(child, context);
            } else if self.file.document.text(child).is_some() {
                self.visit_text(child, context);
            }
        }
    }

    fn visit_element(&mut self, node: NodeId, context: Context) -> Option<InfoId> {
        let tag = self.file.document.tag_name(node)?.to_string();
        if tag == "script" {
            return None;
        }

        let document = &self.file.document;
        let is_candidate = tag == "template"
            || ["template", "if", "iterate", "instantiate"]
                .iter()
                .any(|name| document.has_attribute(node, name));
        if is_candidate {
            match self.create_structural(node, &tag, context) {
                Structural::NotStructural => {}
                Structural::Dropped => return None,
                Structural::Built(info) => return Some(info),
            }
        }

        let info = self.file.alloc_node(
            node,
            context.parent,
            NodeKind::Element(ElementInfo::default()),
        );
        self.analyze_element(info, node, &tag, context);
        Some(info)
    }

    fn analyze_element(&mut self, info: InfoId, node: NodeId, tag: &str, context: Context) {
        let mut scope = context.scope;
        if tag == "element" {
            if let Some(component) = self.declared_component(node) {
                scope = Some(component);
            }
        }

        let is_root = tag == "body"
            || context
                .scope
                .map(|c| self.components.get(c).template == Some(node))
                .unwrap_or(false);
        if is_root {
            let annotated = self.file.node_mut(info);
            annotated.is_root = true;
            annotated.identifier = Some(ROOT_IDENTIFIER.to_string());
        }

        self.bind_component(info, node, tag, context.scope);
        self.analyze_attributes(info, node);
        let keep_indentation = self.indentation_mode(info, node, context.keep_indentation);

        // Element siblings are finished before a later bound text node is
        // reached, so the split is decided before any child is visited.
        if self.has_bound_text(node) {
            let annotated = self.file.node_mut(info);
            annotated.has_data_binding = true;
            annotated.children_created_in_code = true;
        }

        self.visit_children(
            node,
            Context {
                scope,
                parent: Some(info),
                keep_indentation,
            },
        );
        self.assign_identifier(info);
    }

    fn has_bound_text(&self, node: NodeId) -> bool {
        let document = &self.file.document;
        document.children(node).iter().any(|&child| {
            document
                .text(child)
                .map(|text| !scan(text).0.is_empty())
                .unwrap_or(false)
        })
    }

    fn declared_component(&self, node: NodeId) -> Option<ComponentId> {
        self.file
            .declared_components
            .iter()
            .copied()
            .find(|&id| self.components.get(id).element == node)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COMPONENTS
    // ═══════════════════════════════════════════════════════════════════════════

    fn bind_component(&mut self, info: InfoId, node: NodeId, tag: &str, scope: Option<ComponentId>) {
        let name = if self.file.components.contains_key(tag) {
            tag.to_string()
        } else if let Some(is) = self.file.document.attribute(node, "is") {
            is.trim().to_ascii_lowercase()
        } else {
            tag.to_string()
        };

        match self.file.components.get(&name).copied() {
            Some(component) => {
                if self.components.get(component).has_conflict {
                    return;
                }
                if let Some(element) = self.element_info(info) {
                    element.component = Some(component);
                }
                match scope {
                    Some(owner) => {
                        self.components.get_mut(owner).used_components.insert(component);
                    }
                    None => {
                        self.file.used_components.insert(component);
                    }
                }
            }
            None if is_custom_tag(&name) => {
                self.warning(&format!("custom element with tag name {} not found.", name), node);
            }
            None => {}
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STRUCTURAL DIRECTIVES
    // ═══════════════════════════════════════════════════════════════════════════

    fn create_structural(&mut self, node: NodeId, tag: &str, context: Context) -> Structural {
        let document = &self.file.document;
        let is_template_tag = tag == "template";
        let has_template_attr = document.has_attribute(node, "template");
        let mut condition = document.attribute(node, "if").map(str::to_string);
        let iterate = document.attribute(node, "iterate").map(str::to_string);
        let instantiate = document.attribute(node, "instantiate").map(str::to_string);
        let parent_is_declaration = document
            .parent(node)
            .map(|parent| document.is_element(parent, "element"))
            .unwrap_or(false);

        if let Some(instantiate) = &instantiate {
            match instantiate.trim().strip_prefix("if ") {
                Some(_) if condition.is_some() => {
                    self.warning(
                        r#"another condition was already defined on this element; instantiate="if ..." is ignored."#,
                        node,
                    );
                }
                Some(expr) => condition = Some(expr.trim().to_string()),
                None => self.warning(
                    r#"instantiate attribute should have the form instantiate="if <expression>"."#,
                    node,
                ),
            }
        }

        if condition.is_none() && iterate.is_none() {
            return Structural::NotStructural;
        }

        if !is_template_tag && !has_template_attr {
            self.warning(
                r#"template attribute is required when using if, instantiate, or iterate attributes."#,
                node,
            );
        }

        if condition.is_some() && iterate.is_some() {
            self.error("template cannot have both iteration and conditional attributes.", node);
            return Structural::Dropped;
        }

        if parent_is_declaration {
            let example = self.wrapped_template_example(node);
            self.error(
                &format!(
                    "the template root of a component cannot be conditional or iterated. \
                     Wrap it in another template instead, for example: {}",
                    example
                ),
                node,
            );
            return Structural::Dropped;
        }

        match (condition, iterate) {
            (Some(condition), _) => self.create_conditional(node, is_template_tag, condition, context),
            (None, Some(iterate)) => self.create_iteration(node, tag, &iterate, context),
            (None, None) => Structural::NotStructural,
        }
    }

    fn create_conditional(
        &mut self,
        node: NodeId,
        is_template_tag: bool,
        condition: String,
        context: Context,
    ) -> Structural {
        if is_template_tag && self.is_empty_body(node) {
            debug!("conditional template without content dropped");
            return Structural::Dropped;
        }

        let info = self.file.alloc_node(
            node,
            context.parent,
            NodeKind::Structural(StructuralInfo {
                directive: Directive::Conditional { condition },
                element: ElementInfo::default(),
                content: None,
            }),
        );
        self.file.node_mut(info).children_created_in_code = true;
        for name in ["if", "instantiate", "template"] {
            if self.file.document.has_attribute(node, name) {
                self.strip(info, name);
            }
        }

        let keep_indentation = self.indentation_mode(info, node, context.keep_indentation);
        let child_context = Context {
            scope: context.scope,
            parent: Some(info),
            keep_indentation,
        };

        if is_template_tag {
            self.visit_children(node, child_context);
        } else {
            let content = self.split_content(node);
            let content_info = self.visit_element(content, child_context);
            if let NodeKind::Structural(structural) = &mut self.file.node_mut(info).kind {
                structural.content = content_info;
            }
        }

        self.assign_identifier(info);
        Structural::Built(info)
    }

    /// Move the attributes and children of an opt-in conditional onto a new
    /// content element under the placeholder.
    fn split_content(&mut self, node: NodeId) -> NodeId {
        let document = &mut self.file.document;
        let content = document.clone_element(node);
        for name in DIRECTIVE_ATTRIBUTES {
            document.remove_attribute(content, name);
        }
        document.move_children(node, content);

        let directives: Vec<(String, String)> = document
            .attributes(node)
            .map(|attrs| {
                attrs
                    .iter()
                    .filter(|(name, _)| DIRECTIVE_ATTRIBUTES.contains(&name.as_str()))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();
        document.clear_attributes(node);
        for (name, value) in directives {
            document.set_attribute(node, &name, &value);
        }
        document.append_child(node, content);
        content
    }

    fn create_iteration(
        &mut self,
        node: NodeId,
        tag: &str,
        iterate: &str,
        context: Context,
    ) -> Structural {
        let is_template_tag = tag == "template";
        let Some(captures) = ITERATE_RE.captures(iterate) else {
            self.error(
                &format!(
                    r#"template iterate must be of the form: iterate="variable in list", where "variable" is your variable name and "list" evaluates to a list. Got "{}"."#,
                    iterate
                ),
                node,
            );
            return Structural::Dropped;
        };
        let variable = captures[1].to_string();
        let items = captures[2].to_string();

        if self.is_empty_body(node) {
            debug!("iteration without content dropped");
            return Structural::Dropped;
        }

        let info = self.file.alloc_node(
            node,
            context.parent,
            NodeKind::Structural(StructuralInfo {
                directive: Directive::Iteration { variable, items },
                element: ElementInfo::default(),
                content: None,
            }),
        );
        self.file.node_mut(info).children_created_in_code = true;
        self.strip(info, "iterate");
        if !is_template_tag && self.file.document.has_attribute(node, "template") {
            self.strip(info, "template");
        }
        if !is_template_tag {
            // the host element stays in place; its own bindings still apply
            self.bind_component(info, node, tag, context.scope);
            self.analyze_attributes(info, node);
        }

        let keep_indentation = self.indentation_mode(info, node, context.keep_indentation);
        self.visit_children(
            node,
            Context {
                scope: context.scope,
                parent: Some(info),
                keep_indentation,
            },
        );
        self.assign_identifier(info);
        Structural::Built(info)
    }

    fn is_empty_body(&self, node: NodeId) -> bool {
        let document = &self.file.document;
        document
            .children(node)
            .iter()
            .all(|&child| match &document.get(child).data {
                NodeData::Element { .. } => false,
                NodeData::Text { contents } => contents.trim().is_empty(),
                _ => true,
            })
    }

    fn wrapped_template_example(&self, node: NodeId) -> String {
        let document = &self.file.document;
        let declaration = document
            .parent(node)
            .map(|parent| document.start_tag(parent))
            .unwrap_or_else(|| "<element>".to_string());
        format!(
            "{}<template>{}</template></element>",
            declaration,
            document.outer_html(node)
        )
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TEXT
    // ═══════════════════════════════════════════════════════════════════════════

    fn indentation_mode(&mut self, info: InfoId, node: NodeId, inherited: bool) -> bool {
        let Some(value) = self
            .file
            .document
            .attribute(node, "indentation")
            .map(str::to_string)
        else {
            return inherited;
        };
        self.strip(info, "indentation");
        match value.as_str() {
            "remove" => false,
            "preserve" => true,
            other => {
                self.warning(
                    &format!(
                        r#"Invalid value for "indentation" ("{}"). It should be either "preserve" or "remove"."#,
                        other
                    ),
                    node,
                );
                true
            }
        }
    }

    fn normalize_text(text: &str, keep_indentation: bool) -> String {
        if keep_indentation {
            text.to_string()
        } else {
            trim_or_compact(text)
        }
    }

    fn visit_text(&mut self, node: NodeId, context: Context) {
        let Some(parent) = context.parent else {
            return;
        };
        let contents = self.file.document.text(node).unwrap_or("").to_string();
        let (exprs, texts) = scan(&contents);

        if exprs.is_empty() {
            let value = Self::normalize_text(&contents, context.keep_indentation);
            if value != contents {
                self.file.document.set_text(node, &value);
            }
            if !value.is_empty() {
                self.file
                    .alloc_node(node, Some(parent), NodeKind::Text(TextInfo::default()));
            }
            return;
        }

        {
            let annotated = self.file.node_mut(parent);
            annotated.has_data_binding = true;
            annotated.children_created_in_code = true;
        }
        let span = self.file.document.span(node);
        for (text, expr) in texts.iter().zip(exprs) {
            self.emit_literal(text, parent, context.keep_indentation, node);
            let placeholder = self.file.document.create_text("", span);
            let info = self.file.alloc_node(
                placeholder,
                Some(parent),
                NodeKind::Text(TextInfo {
                    binding: Some(expr),
                }),
            );
            let identifier = self.ids.text_id();
            trace!(identifier = %identifier, "text binding");
            self.file.node_mut(info).identifier = Some(identifier);
        }
        if let Some(tail) = texts.last() {
            self.emit_literal(tail, parent, context.keep_indentation, node);
        }
    }

    fn emit_literal(&mut self, text: &str, parent: InfoId, keep_indentation: bool, source: NodeId) {
        let value = Self::normalize_text(text, keep_indentation);
        if value.is_empty() {
            return;
        }
        let span = self.file.document.span(source);
        let literal = self.file.document.create_text(&value, span);
        self.file
            .alloc_node(literal, Some(parent), NodeKind::Text(TextInfo::default()));
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // IDENTIFIERS
    // ═══════════════════════════════════════════════════════════════════════════

    fn needs_identifier(&self, info: InfoId) -> bool {
        let annotated = self.file.node(info);
        if annotated.is_root {
            return false;
        }
        let has_bindings = annotated
            .element()
            .map(|e| e.component.is_some() || !e.attributes.is_empty() || !e.events.is_empty())
            .unwrap_or(false);
        annotated.has_data_binding
            || annotated.has_query
            || matches!(annotated.kind, NodeKind::Structural(_))
            || has_bindings
    }

    fn assign_identifier(&mut self, info: InfoId) {
        if self.file.node(info).identifier.is_some() || !self.needs_identifier(info) {
            return;
        }

        let query_root = self
            .file
            .ancestors(info)
            .map(|ancestor| ancestor.id)
            .find(|&ancestor| self.file.created_in_code(ancestor));
        if let Some(ancestor) = query_root {
            self.file.node_mut(ancestor).has_query = true;
        }

        let identifier = self.ids.element_id();
        trace!(identifier = %identifier, "element identifier");
        if !self.file.created_in_code(info) {
            let node = self.file.node(info).node;
            self.file.document.set_attribute(node, "id", &identifier);
        }
        self.file.node_mut(info).identifier = Some(identifier);
    }
}
