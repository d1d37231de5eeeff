//! Serializable views of analyzed files, for hosts that consume the binding
//! model as JSON.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::collections::HashMap;

use crate::code_unit::CodeUnit;
use crate::dom::NodeId;
use crate::model::{
    AttributeBinding, ComponentId, ComponentTable, Directive, EventAction, FileRecord, InfoId,
    NodeKind,
};
use crate::scanner::BindingExpr;

/// Name the rendered event actions use for the runtime event value.
pub const EVENT_VALUE: &str = "e";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileExport {
    pub path: String,
    pub is_entry_point: bool,
    pub components: Vec<ComponentExport>,
    /// Tag name → declaring file, for every component visible in this file.
    pub scope: IndexMap<String, String>,
    pub component_links: Vec<String>,
    pub stylesheet_links: Vec<String>,
    pub code: Option<CodeUnit>,
    pub used_components: Vec<String>,
    pub root: Option<NodeExport>,
    /// `<body>` after analysis, with stripped attributes removed.
    pub html: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentExport {
    pub tag_name: String,
    pub extends_tag: String,
    pub extends: Option<String>,
    pub has_conflict: bool,
    pub code: Option<CodeUnit>,
    pub used_components: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventExport {
    pub name: String,
    pub action: EventAction,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExport {
    pub kind: &'static str,
    pub tag: Option<String>,
    pub identifier: Option<String>,
    pub has_data_binding: bool,
    pub has_query: bool,
    pub is_root: bool,
    pub children_created_in_code: bool,
    pub strip_attributes: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, AttributeBinding>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub events: IndexMap<String, Vec<EventExport>>,
    pub component: Option<String>,
    pub directive: Option<Directive>,
    pub text: Option<String>,
    pub binding: Option<BindingExpr>,
    pub children: Vec<NodeExport>,
}

fn tag_names(ids: &IndexSet<ComponentId>, components: &ComponentTable) -> Vec<String> {
    ids.iter()
        .map(|&id| components.get(id).tag_name.clone())
        .collect()
}

pub fn export_file(file: &FileRecord, components: &ComponentTable) -> FileExport {
    let declared = file
        .declared_components
        .iter()
        .map(|&id| {
            let symbol = components.get(id);
            ComponentExport {
                tag_name: symbol.tag_name.clone(),
                extends_tag: symbol.extends_tag.clone(),
                extends: symbol
                    .extends_component
                    .map(|base| components.get(base).tag_name.clone()),
                has_conflict: symbol.has_conflict,
                code: symbol.code.clone(),
                used_components: tag_names(&symbol.used_components, components),
            }
        })
        .collect();

    FileExport {
        path: file.path.display().to_string(),
        is_entry_point: file.is_entry_point,
        components: declared,
        scope: file
            .components
            .iter()
            .map(|(tag, &id)| (tag.clone(), components.get(id).declaring_file.display().to_string()))
            .collect(),
        component_links: file.component_links.iter().map(|p| p.display().to_string()).collect(),
        stylesheet_links: file.stylesheet_links.iter().map(|p| p.display().to_string()).collect(),
        code: file.code.clone(),
        used_components: tag_names(&file.used_components, components),
        root: file.root.map(|root| export_node(file, components, root)),
        html: static_html(file),
    }
}

fn export_node(file: &FileRecord, components: &ComponentTable, id: InfoId) -> NodeExport {
    let node = file.node(id);
    let document = &file.document;
    let (kind, directive, binding) = match &node.kind {
        NodeKind::Element(_) => ("element", None, None),
        NodeKind::Structural(info) => ("structural", Some(info.directive.clone()), None),
        NodeKind::Text(info) => ("text", None, info.binding.clone()),
    };
    let (attributes, events) = match node.element() {
        Some(element) => (
            element.attributes.clone(),
            element
                .events
                .iter()
                .map(|(name, handlers)| {
                    let handlers = handlers
                        .iter()
                        .map(|h| EventExport {
                            name: h.name.clone(),
                            action: h.action.clone(),
                            code: h.action.render(EVENT_VALUE),
                        })
                        .collect();
                    (name.clone(), handlers)
                })
                .collect(),
        ),
        None => (IndexMap::new(), IndexMap::new()),
    };

    NodeExport {
        kind,
        tag: document.tag_name(node.node).map(str::to_string),
        identifier: node.identifier.clone(),
        has_data_binding: node.has_data_binding,
        has_query: node.has_query,
        is_root: node.is_root,
        children_created_in_code: node.children_created_in_code,
        strip_attributes: node.strip_attributes.iter().cloned().collect(),
        attributes,
        events,
        component: node.component().map(|c| components.get(c).tag_name.clone()),
        directive,
        text: document.text(node.node).map(str::to_string),
        binding,
        children: node
            .children
            .iter()
            .map(|&child| export_node(file, components, child))
            .collect(),
    }
}

/// Serialize `<body>` without the attributes the analyzer extracted.
pub fn static_html(file: &FileRecord) -> String {
    let stripped: HashMap<NodeId, &IndexSet<String>> = file
        .nodes
        .iter()
        .filter(|(_, n)| !n.strip_attributes.is_empty())
        .map(|(_, n)| (n.node, &n.strip_attributes))
        .collect();
    let keep = |node: NodeId, name: &str| {
        stripped
            .get(&node)
            .map(|names| !names.contains(name))
            .unwrap_or(true)
    };
    match file.document.find_element("body") {
        Some(body) => file.document.outer_html_filtered(body, &keep),
        None => String::new(),
    }
}
