//! Discovery Pass
//!
//! One forward walk over a parsed document that records what the file
//! declares: component definitions, component and stylesheet links, and the
//! code units attached to the file or to the nearest enclosing declaration.
//! Nothing here looks at other files; linking happens in `normalize`.

use indexmap::IndexSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::code_unit::{is_script_path, CodeUnit, CodeUnitParser, SCRIPT_TYPE};
use crate::diagnostics::DiagnosticSink;
use crate::dom::{Document, NodeId, SourceSpan};
use crate::model::{ComponentSymbol, FileRecord};
use crate::resolve::PathResolver;

const DEFAULT_EXTENDS: &str = "span";

/// A parsed document handed to the analyzer.
#[derive(Debug)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub document: Document,
    pub is_entry_point: bool,
}

impl SourceDocument {
    pub fn new(path: impl Into<PathBuf>, document: Document, is_entry_point: bool) -> Self {
        Self {
            path: path.into(),
            document,
            is_entry_point,
        }
    }
}

/// Result of discovering one file. Components are not registered yet; the
/// caller moves them into its component table.
#[derive(Debug)]
pub struct Discovery {
    pub file: FileRecord,
    pub components: Vec<ComponentSymbol>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    File,
    Component(usize),
}

#[derive(Debug, Clone, Copy)]
struct Context {
    scope: Scope,
    in_head: bool,
}

#[derive(Default)]
struct ScopeCode {
    code: Option<CodeUnit>,
    external: Option<PathBuf>,
}

impl ScopeCode {
    fn is_set(&self) -> bool {
        self.code.is_some() || self.external.is_some()
    }
}

struct Discoverer<'a> {
    path: &'a Path,
    document: &'a Document,
    is_entry_point: bool,
    resolver: &'a dyn PathResolver,
    parser: &'a dyn CodeUnitParser,
    sink: &'a mut dyn DiagnosticSink,
    component_links: Vec<PathBuf>,
    stylesheet_links: IndexSet<PathBuf>,
    file_code: ScopeCode,
    components: Vec<(ComponentSymbol, ScopeCode)>,
}

/// Run the discovery pass over one document.
pub fn discover_file(
    source: SourceDocument,
    resolver: &dyn PathResolver,
    parser: &dyn CodeUnitParser,
    sink: &mut dyn DiagnosticSink,
) -> Discovery {
    let SourceDocument {
        path,
        document,
        is_entry_point,
    } = source;
    debug!(file = %path.display(), entry = is_entry_point, "discovery pass");

    let mut discoverer = Discoverer {
        path: &path,
        document: &document,
        is_entry_point,
        resolver,
        parser,
        sink,
        component_links: Vec::new(),
        stylesheet_links: IndexSet::new(),
        file_code: ScopeCode::default(),
        components: Vec::new(),
    };
    let context = Context {
        scope: Scope::File,
        in_head: false,
    };
    for &child in document.children(document.root()) {
        discoverer.visit(child, context);
    }

    let Discoverer {
        component_links,
        stylesheet_links,
        file_code,
        components,
        ..
    } = discoverer;

    let components: Vec<ComponentSymbol> = components
        .into_iter()
        .map(|(mut symbol, code)| {
            symbol.code = code.code;
            symbol.external_code = code.external;
            symbol
        })
        .collect();
    debug!(
        file = %path.display(),
        components = components.len(),
        links = component_links.len(),
        "discovered declarations"
    );

    let mut file = FileRecord::new(path, document, is_entry_point);
    file.component_links = component_links;
    file.stylesheet_links = stylesheet_links;
    file.code = file_code.code;
    file.external_code = file_code.external;

    Discovery { file, components }
}

impl<'a> Discoverer<'a> {
    fn visit(&mut self, node: NodeId, context: Context) {
        let Some(tag) = self.document.tag_name(node) else {
            return;
        };
        let mut child_context = context;
        match tag {
            "head" => child_context.in_head = true,
            "link" => {
                self.visit_link(node, context);
                return;
            }
            "script" => {
                self.visit_script(node, context);
                return;
            }
            "element" => match self.visit_element_declaration(node, context) {
                Some(scope) => child_context.scope = scope,
                None => return,
            },
            _ => {}
        }
        for &child in self.document.children(node) {
            self.visit(child, child_context);
        }
    }

    fn span(&self, node: NodeId) -> SourceSpan {
        self.document.span(node)
    }

    fn warning(&mut self, message: &str, node: NodeId) {
        let span = self.span(node);
        self.sink.warning(message, span, self.path);
    }

    fn error(&mut self, message: &str, node: NodeId) {
        let span = self.span(node);
        self.sink.error(message, span, self.path);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LINKS
    // ═══════════════════════════════════════════════════════════════════════════

    fn visit_link(&mut self, node: NodeId, context: Context) {
        let rel = self.document.attribute(node, "rel").unwrap_or("").trim();
        let is_components = rel == "components";
        if !is_components && rel != "stylesheet" {
            return;
        }
        if !context.in_head {
            self.warning(
                &format!(r#"link rel="{}" is only valid inside the <head>; ignored."#, rel),
                node,
            );
            return;
        }
        let href = self.document.attribute(node, "href").unwrap_or("").trim();
        if href.is_empty() {
            self.warning(&format!(r#"link rel="{}" is missing the href attribute."#, rel), node);
            return;
        }
        let Some(target) = self.resolver.resolve(href, self.path) else {
            debug!(href, "link target outside the file graph");
            return;
        };
        if is_components {
            if !self.component_links.contains(&target) {
                self.component_links.push(target);
            }
        } else {
            self.stylesheet_links.insert(target);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COMPONENT DECLARATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    fn visit_element_declaration(&mut self, node: NodeId, context: Context) -> Option<Scope> {
        if let Scope::Component(_) = context.scope {
            self.warning("Nested component definitions are not supported; ignored.", node);
            return Some(context.scope);
        }

        let name = self.document.attribute(node, "name").unwrap_or("").trim();
        if name.is_empty() {
            self.error(
                r#"Missing tag name of the component. Please include an attribute like name="your-tag-name"."#,
                node,
            );
            return None;
        }
        let extends = match self.document.attribute(node, "extends").map(str::trim) {
            Some(tag) if !tag.is_empty() => tag,
            _ => DEFAULT_EXTENDS,
        };

        let templates: Vec<NodeId> = self.document.child_elements(node, "template").collect();
        if templates.len() != 1 {
            self.warning(
                &format!(
                    r#"the <element name="{}"> declaration should have exactly one <template> child, found {}."#,
                    name,
                    templates.len()
                ),
                node,
            );
        }

        let mut symbol = ComponentSymbol::new(
            &name.to_ascii_lowercase(),
            &extends.to_ascii_lowercase(),
            self.path.to_path_buf(),
            node,
            self.span(node),
        );
        symbol.template = templates.first().copied();
        debug!(tag = %symbol.tag_name, extends = %symbol.extends_tag, "component declaration");

        self.components.push((symbol, ScopeCode::default()));
        Some(Scope::Component(self.components.len() - 1))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CODE UNITS
    // ═══════════════════════════════════════════════════════════════════════════

    fn visit_script(&mut self, node: NodeId, context: Context) {
        let script_type = self.document.attribute(node, "type").map(str::trim);
        let src = self
            .document
            .attribute(node, "src")
            .map(|s| s.trim().to_string());
        let text = self.document.inner_text(node);
        let in_component = matches!(context.scope, Scope::Component(_));

        match script_type {
            Some(SCRIPT_TYPE) => {}
            None => {
                let looks_managed = match &src {
                    Some(src) => is_script_path(src),
                    None => in_component,
                };
                if looks_managed {
                    self.warning(
                        &format!(
                            r#"script tag seems to be missing type="{}"; it is treated as a classic script."#,
                            SCRIPT_TYPE
                        ),
                        node,
                    );
                }
                return;
            }
            Some(_) => return,
        }

        if let Some(src) = src {
            if !is_script_path(&src) {
                self.warning(
                    &format!(
                        r#""{}" does not look like a script file; expected a .js, .mjs or .ts extension."#,
                        src
                    ),
                    node,
                );
                return;
            }
            if !text.trim().is_empty() {
                self.error(r#"script tag has a "src" attribute and also has script text."#, node);
            }
            if self.check_single_unit(node, context.scope) {
                let resolved = self.resolver.resolve(&src, self.path);
                self.scope_code(context.scope).external = resolved;
            }
            return;
        }

        if context.scope == Scope::File && !self.is_entry_point {
            self.warning(
                "top-level script code is only allowed in the entry point file; ignored.",
                node,
            );
            return;
        }
        if !self.check_single_unit(node, context.scope) {
            return;
        }

        let span = self.span(node);
        let unit = self.parser.parse(self.path, &text, span, &mut *self.sink);
        if !unit.is_library() {
            self.error(
                "inline script must define a library, not a part of another library.",
                node,
            );
        }
        self.scope_code(context.scope).code = Some(unit);
    }

    fn check_single_unit(&mut self, node: NodeId, scope: Scope) -> bool {
        if !self.scope_code(scope).is_set() {
            return true;
        }
        let message = match scope {
            Scope::File => format!(
                "There should be only one script tag in the file {}.",
                self.path.display()
            ),
            Scope::Component(_) => "There should be only one script tag per <element>.".to_string(),
        };
        self.error(&message, node);
        false
    }

    fn scope_code(&mut self, scope: Scope) -> &mut ScopeCode {
        match scope {
            Scope::File => &mut self.file_code,
            Scope::Component(index) => &mut self.components[index].1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code_unit::OxcCodeUnitParser;
    use crate::diagnostics::Messages;
    use crate::resolve::FsPathResolver;

    fn discover(path: &str, html: &str, entry: bool) -> (Discovery, Messages) {
        let document = Document::parse_html(html).unwrap();
        let mut sink = Messages::new();
        let discovery = discover_file(
            SourceDocument::new(path, document, entry),
            &FsPathResolver::default(),
            &OxcCodeUnitParser,
            &mut sink,
        );
        (discovery, sink)
    }

    #[test]
    fn test_links_and_components() {
        let (discovery, sink) = discover(
            "app/index.html",
            r#"<html><head>
                <link rel="components" href="widgets.html">
                <link rel="components" href="./widgets.html">
                <link rel="stylesheet" href="../css/site.css">
                <link rel="stylesheet" href="https://cdn.example.com/a.css">
            </head><body>
                <element name="x-foo" extends="div"><template><p>hi</p></template></element>
                <element name="x-bar"><template></template></element>
            </body></html>"#,
            true,
        );
        assert!(sink.is_empty(), "{:?}", sink.all());
        assert_eq!(discovery.file.component_links, vec![PathBuf::from("app/widgets.html")]);
        let styles: Vec<&PathBuf> = discovery.file.stylesheet_links.iter().collect();
        assert_eq!(styles, vec![&PathBuf::from("css/site.css")]);

        let tags: Vec<(&str, &str)> = discovery
            .components
            .iter()
            .map(|c| (c.tag_name.as_str(), c.extends_tag.as_str()))
            .collect();
        assert_eq!(tags, vec![("x-foo", "div"), ("x-bar", "span")]);
        assert!(discovery.components.iter().all(|c| c.template.is_some()));
    }

    #[test]
    fn test_declaration_problems() {
        let (discovery, sink) = discover(
            "index.html",
            r#"<body>
                <element><template></template></element>
                <element name="x-a"></element>
                <element name="x-b"><template></template><element name="x-c"><template></template></element></element>
            </body>"#,
            true,
        );
        let names: Vec<&str> = discovery.components.iter().map(|c| c.tag_name.as_str()).collect();
        assert_eq!(names, vec!["x-a", "x-b"]);
        assert_eq!(sink.errors().count(), 1);
        let warnings: Vec<&str> = sink.warnings().map(|d| d.message.as_str()).collect();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("exactly one <template>"));
        assert!(warnings[1].contains("Nested component"));
    }

    #[test]
    fn test_link_outside_head_is_ignored() {
        let (discovery, sink) = discover(
            "index.html",
            r#"<body><div><link rel="components" href="x.html"></div></body>"#,
            true,
        );
        assert!(discovery.file.component_links.is_empty());
        assert_eq!(sink.warnings().count(), 1);
    }

    #[test]
    fn test_code_units_attach_to_nearest_scope() {
        let (discovery, sink) = discover(
            "web/index.html",
            r#"<body>
                <element name="x-foo"><template></template>
                    <script type="module">export class XFoo {}</script>
                </element>
                <script type="module" src="main.js"></script>
            </body>"#,
            true,
        );
        assert!(sink.is_empty(), "{:?}", sink.all());
        let component = &discovery.components[0];
        let unit = component.code.as_ref().unwrap();
        assert_eq!(unit.declarations, vec!["XFoo"]);
        assert_eq!(discovery.file.external_code, Some(PathBuf::from("web/main.js")));
        assert!(discovery.file.code.is_none());
    }

    #[test]
    fn test_script_rules() {
        let (discovery, sink) = discover(
            "index.html",
            r#"<body>
                <script type="module">let a = 1;</script>
                <script type="module">let b = 2;</script>
                <script src="x.js"></script>
                <script type="module" src="y.js">let c;</script>
                <script type="text/template">ignored</script>
            </body>"#,
            true,
        );
        assert!(discovery.file.code.is_some());
        assert!(discovery.file.external_code.is_none());
        let errors: Vec<&str> = sink.errors().map(|d| d.message.as_str()).collect();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("only one script tag"));
        assert!(errors[1].contains("also has script text"));
        assert!(errors[2].contains("only one script tag"));
        assert_eq!(sink.warnings().count(), 1);
    }

    #[test]
    fn test_top_level_code_outside_entry_point() {
        let (discovery, sink) = discover(
            "widgets.html",
            r#"<body><script type="module">let a = 1;</script></body>"#,
            false,
        );
        assert!(discovery.file.code.is_none());
        assert_eq!(sink.warnings().count(), 1);
    }

    #[test]
    fn test_inline_part_is_reported() {
        let (discovery, sink) = discover(
            "index.html",
            r#"<body><script type="module">'part of app'; let a;</script></body>"#,
            true,
        );
        assert!(discovery.file.code.is_some());
        assert_eq!(sink.errors().count(), 1);
    }
}
