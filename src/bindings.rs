//! Attribute bindings: events, two-way bindings, and the `style` / `class` /
//! generic extractors. Part of the semantic pass.

use crate::analyzer::{Analyzer, DIRECTIVE_ATTRIBUTES};
use crate::dom::NodeId;
use crate::html::{escape_single_quoted, is_global_attribute, to_camel_case};
use crate::model::{AttributeBinding, BindingStyle, EventAction, InfoId};
use crate::scanner::{scan, BindingExpr};

const EVENT_PREFIX: &str = "on";
const EVENT_SEPARATOR: &str = "on-";
const TWO_WAY_PREFIX: &str = "bind-";

/// Properties with a native two-way policy, in DOM casing. Attribute names
/// arrive lower-cased from the parser.
const KNOWN_PROPERTIES: &[&str] = &[
    "checked",
    "value",
    "selectedIndex",
    "valueAsDate",
    "valueAsNumber",
];

const CHANGE_EVENT: &str = "onChange";
const INPUT_EVENT: &str = "onInput";

fn canonical_property(name: &str) -> String {
    let camel = to_camel_case(name);
    KNOWN_PROPERTIES
        .iter()
        .find(|known| known.eq_ignore_ascii_case(&camel))
        .map(|known| known.to_string())
        .unwrap_or(camel)
}

/// A scanned attribute value with no literal text around a single expression.
fn single_expression(exprs: &[BindingExpr], texts: &[String]) -> bool {
    exprs.len() == 1 && texts.iter().all(|t| t.is_empty())
}

impl<'a> Analyzer<'a> {
    pub(crate) fn analyze_attributes(&mut self, info: InfoId, node: NodeId) {
        let attributes: Vec<(String, String)> = self
            .file
            .document
            .attributes(node)
            .map(|attrs| attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        for (name, value) in attributes {
            if DIRECTIVE_ATTRIBUTES.contains(&name.as_str()) {
                continue;
            }
            // already dropped in favor of a two-way binding
            if self.file.node(info).strip_attributes.contains(&name) {
                continue;
            }
            if name.starts_with(EVENT_PREFIX) {
                self.event_attribute(info, node, &name, &value);
            } else if let Some(property) = name.strip_prefix(TWO_WAY_PREFIX) {
                self.two_way_binding(info, node, &name, &canonical_property(property), &value);
            } else {
                match name.as_str() {
                    "style" => self.style_attribute(info, &value),
                    "class" => self.class_attribute(info, node, &value),
                    _ => self.generic_attribute(info, &name, &value),
                }
            }
        }
    }

    fn set_binding(&mut self, info: InfoId, name: &str, binding: AttributeBinding) {
        let annotated = self.file.node_mut(info);
        annotated.has_data_binding = true;
        if let Some(element) = annotated.element_mut() {
            element.attributes.insert(name.to_string(), binding);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EVENTS
    // ═══════════════════════════════════════════════════════════════════════════

    fn event_attribute(&mut self, info: InfoId, node: NodeId, name: &str, value: &str) {
        if !name.starts_with(EVENT_SEPARATOR) {
            self.warning(
                &format!(
                    r#"Event handler "{}" will be interpreted as a native inline handler. Use the form on-event-name="handler" for a data-bound event handler."#,
                    name
                ),
                node,
            );
            return;
        }
        let event = to_camel_case(name);
        if let Some(element) = self.element_info(info) {
            element.add_event(
                &event,
                EventAction::Inline {
                    code: value.trim().to_string(),
                },
            );
        }
        self.strip(info, name);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // VALUE BINDINGS
    // ═══════════════════════════════════════════════════════════════════════════

    fn style_attribute(&mut self, info: InfoId, value: &str) {
        let (exprs, texts) = scan(value);
        if exprs.is_empty() {
            return;
        }
        let binding = if single_expression(&exprs, &texts) {
            AttributeBinding::direct(exprs[0].clone(), BindingStyle::Style)
        } else {
            AttributeBinding::interpolation(exprs, texts, BindingStyle::Plain)
        };
        self.set_binding(info, "style", binding);
        self.strip(info, "style");
    }

    fn class_attribute(&mut self, info: InfoId, node: NodeId, value: &str) {
        let (exprs, texts) = scan(value);
        if exprs.is_empty() {
            return;
        }
        let tokens: Vec<&str> = texts.iter().flat_map(|t| t.split_whitespace()).collect();
        if tokens.is_empty() {
            self.file.document.remove_attribute(node, "class");
        } else {
            self.file.document.set_attribute(node, "class", &tokens.join(" "));
        }
        self.set_binding(
            info,
            "class",
            AttributeBinding {
                bindings: exprs,
                text_content: None,
                style: BindingStyle::Class,
            },
        );
    }

    fn generic_attribute(&mut self, info: InfoId, name: &str, value: &str) {
        let (exprs, texts) = scan(value);
        if exprs.is_empty() {
            let bound_to_component = self.file.node(info).component().is_some();
            if bound_to_component && !is_global_attribute(name) && name != "is" {
                // static text still reaches the component as an input
                self.set_binding(
                    info,
                    name,
                    AttributeBinding::interpolation(Vec::new(), vec![value.to_string()], BindingStyle::Plain),
                );
            }
            return;
        }
        let binding = if single_expression(&exprs, &texts) {
            AttributeBinding::direct(exprs[0].clone(), BindingStyle::Plain)
        } else {
            AttributeBinding::interpolation(exprs, texts, BindingStyle::Plain)
        };
        self.set_binding(info, name, binding);
        self.strip(info, name);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TWO-WAY BINDINGS
    // ═══════════════════════════════════════════════════════════════════════════

    fn two_way_binding(&mut self, info: InfoId, node: NodeId, name: &str, property: &str, value: &str) {
        let document = &self.file.document;
        let tag = document.tag_name(node).unwrap_or("").to_string();
        let input_type = document
            .attribute(node, "type")
            .map(|t| t.trim().to_ascii_lowercase())
            .unwrap_or_default();
        let expr = value.trim();
        let is_radio = tag == "input" && input_type == "radio";
        let has_component = self.file.node(info).component().is_some();

        match (tag.as_str(), property) {
            ("input", "checked") if is_radio => {
                if self.radio_exclusive(info, node) {
                    self.install_two_way(info, node, name, property, expr, CHANGE_EVENT);
                }
            }
            ("input", "checked") if input_type == "checkbox" => {
                self.install_two_way(info, node, name, property, expr, CHANGE_EVENT);
            }
            ("input", "checked") => self.error(
                r#"checked is only supported in HTML with type="radio" or type="checkbox"."#,
                node,
            ),
            ("select", "selectedIndex" | "value") => {
                self.install_two_way(info, node, name, property, expr, CHANGE_EVENT);
            }
            ("input", "value") if is_radio => self.radio_value_binding(info, node, name, expr),
            ("textarea", "value") | ("input", "value" | "valueAsDate" | "valueAsNumber") => {
                self.install_two_way(info, node, name, property, expr, INPUT_EVENT);
            }
            _ if has_component => {
                self.set_binding(
                    info,
                    property,
                    AttributeBinding::direct(BindingExpr::from_expression(expr), BindingStyle::TwoWay),
                );
                self.strip(info, name);
            }
            _ => self.error(
                &format!("Unknown two-way binding attribute {}. Ignored.", name),
                node,
            ),
        }
    }

    /// A radio input may bind either `checked` or `value`, not both. Both
    /// bindings end up on `checked`, so the first one installed wins.
    fn radio_exclusive(&mut self, info: InfoId, node: NodeId) -> bool {
        let taken = self
            .file
            .node(info)
            .element()
            .map(|e| e.attributes.contains_key("checked"))
            .unwrap_or(false);
        if taken {
            self.error(
                "Radio buttons cannot have both bind-checked and bind-value. Ignored.",
                node,
            );
        }
        !taken
    }

    fn radio_value_binding(&mut self, info: InfoId, node: NodeId, name: &str, expr: &str) {
        let Some(static_value) = self
            .file
            .document
            .attribute(node, "value")
            .map(str::to_string)
        else {
            self.error(
                r#"Radio buttons with bind-value must have a static value attribute, for example value="red"."#,
                node,
            );
            return;
        };
        if !self.radio_exclusive(info, node) {
            return;
        }

        let condition = format!("{} == '{}'", expr, escape_single_quoted(&static_value));
        self.check_static_duplicate(info, node, "checked");
        self.set_binding(
            info,
            "checked",
            AttributeBinding::direct(BindingExpr::from_expression(&condition), BindingStyle::Plain),
        );
        if let Some(element) = self.element_info(info) {
            element.add_event(
                CHANGE_EVENT,
                EventAction::AssignLiteral {
                    target: expr.to_string(),
                    literal: static_value,
                },
            );
        }
        self.strip(info, name);
    }

    fn install_two_way(
        &mut self,
        info: InfoId,
        node: NodeId,
        name: &str,
        property: &str,
        expr: &str,
        event: &str,
    ) {
        self.check_static_duplicate(info, node, property);
        self.set_binding(
            info,
            property,
            AttributeBinding::direct(BindingExpr::from_expression(expr), BindingStyle::Plain),
        );
        if let Some(element) = self.element_info(info) {
            element.add_event(
                event,
                EventAction::AssignProperty {
                    target: expr.to_string(),
                    property: property.to_string(),
                },
            );
        }
        self.strip(info, name);
    }

    /// A static attribute next to a two-way binding of the same property is
    /// dropped in favor of the binding.
    fn check_static_duplicate(&mut self, info: InfoId, node: NodeId, property: &str) {
        let static_name = property.to_ascii_lowercase();
        if !self.file.document.has_attribute(node, &static_name) {
            return;
        }
        self.warning(
            &format!(
                "Duplicate attribute {}. You should provide either the two-way binding or the attribute itself. The attribute will be ignored.",
                static_name
            ),
            node,
        );
        self.strip(info, &static_name);
    }
}
