//! Code units attached to files and component declarations.

use oxc_allocator::Allocator;
use oxc_ast::ast::{BindingPattern, Declaration, Statement};
use oxc_parser::Parser;
use oxc_span::SourceType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::diagnostics::DiagnosticSink;
use crate::dom::SourceSpan;

/// `<script type="...">` value that marks a managed code unit.
pub const SCRIPT_TYPE: &str = "module";

const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "ts"];

const PART_OF_DIRECTIVE: &str = "part of ";

pub fn is_script_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SCRIPT_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeUnit {
    pub path: PathBuf,
    pub source: String,
    pub start: SourceSpan,
    /// Library name this unit belongs to, when it is a part.
    pub part_of: Option<String>,
    /// Top-level names declared by the unit.
    pub declarations: Vec<String>,
}

impl CodeUnit {
    pub fn is_library(&self) -> bool {
        self.part_of.is_none()
    }
}

pub trait CodeUnitParser: Send + Sync {
    fn parse(
        &self,
        path: &Path,
        source: &str,
        start: SourceSpan,
        sink: &mut dyn DiagnosticSink,
    ) -> CodeUnit;
}

/// Parses JS/TS modules with oxc.
#[derive(Debug, Clone, Copy, Default)]
pub struct OxcCodeUnitParser;

impl CodeUnitParser for OxcCodeUnitParser {
    fn parse(
        &self,
        path: &Path,
        source: &str,
        start: SourceSpan,
        sink: &mut dyn DiagnosticSink,
    ) -> CodeUnit {
        let is_typescript = path.extension().and_then(|e| e.to_str()) == Some("ts");
        let allocator = Allocator::default();
        let source_type = SourceType::default()
            .with_module(true)
            .with_typescript(is_typescript);
        let ret = Parser::new(&allocator, source, source_type).parse();

        for error in &ret.errors {
            sink.error(&format!("syntax error in code unit: {}", error), start, path);
        }

        let part_of = ret.program.directives.iter().find_map(|d| {
            d.directive
                .as_str()
                .strip_prefix(PART_OF_DIRECTIVE)
                .map(|name| name.trim().to_string())
        });

        let mut declarations = Vec::new();
        for stmt in &ret.program.body {
            match stmt {
                Statement::ExportNamedDeclaration(export) => {
                    if let Some(decl) = &export.declaration {
                        collect_declaration(decl, &mut declarations);
                    }
                }
                Statement::VariableDeclaration(var_decl) => {
                    for decl in &var_decl.declarations {
                        collect_binding_pattern(&decl.id, &mut declarations);
                    }
                }
                Statement::FunctionDeclaration(func) => {
                    if let Some(id) = &func.id {
                        declarations.push(id.name.to_string());
                    }
                }
                Statement::ClassDeclaration(class) => {
                    if let Some(id) = &class.id {
                        declarations.push(id.name.to_string());
                    }
                }
                _ => {}
            }
        }

        CodeUnit {
            path: path.to_path_buf(),
            source: source.to_string(),
            start,
            part_of,
            declarations,
        }
    }
}

fn collect_declaration(decl: &Declaration, names: &mut Vec<String>) {
    match decl {
        Declaration::VariableDeclaration(var_decl) => {
            for d in &var_decl.declarations {
                collect_binding_pattern(&d.id, names);
            }
        }
        Declaration::FunctionDeclaration(func) => {
            if let Some(id) = &func.id {
                names.push(id.name.to_string());
            }
        }
        Declaration::ClassDeclaration(class) => {
            if let Some(id) = &class.id {
                names.push(id.name.to_string());
            }
        }
        _ => {}
    }
}

fn collect_binding_pattern(pattern: &BindingPattern, names: &mut Vec<String>) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => names.push(id.name.to_string()),
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_binding_pattern(&prop.value, names);
            }
            if let Some(rest) = &obj.rest {
                collect_binding_pattern(&rest.argument, names);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for pattern in arr.elements.iter().flatten() {
                collect_binding_pattern(pattern, names);
            }
            if let Some(rest) = &arr.rest {
                collect_binding_pattern(&rest.argument, names);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Messages;

    #[test]
    fn test_library_declarations() {
        let mut sink = Messages::new();
        let unit = OxcCodeUnitParser.parse(
            Path::new("app.js"),
            "export class XFoo {}\nconst { a, b: [c] } = init();\nfunction main() {}",
            SourceSpan::default(),
            &mut sink,
        );
        assert!(unit.is_library());
        assert_eq!(unit.declarations, vec!["XFoo", "a", "c", "main"]);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_part_of_directive() {
        let mut sink = Messages::new();
        let unit = OxcCodeUnitParser.parse(
            Path::new("part.js"),
            "'part of app';\nlet x = 1;",
            SourceSpan::default(),
            &mut sink,
        );
        assert_eq!(unit.part_of.as_deref(), Some("app"));
        assert!(!unit.is_library());
    }

    #[test]
    fn test_syntax_errors_become_diagnostics() {
        let mut sink = Messages::new();
        OxcCodeUnitParser.parse(Path::new("bad.js"), "let = ;", SourceSpan::new(4, 1), &mut sink);
        assert!(sink.has_errors());
        assert_eq!(sink.all()[0].span, SourceSpan::new(4, 1));
    }

    #[test]
    fn test_script_extensions() {
        assert!(is_script_path("a/b.js"));
        assert!(is_script_path("c.ts"));
        assert!(!is_script_path("d.css"));
        assert!(!is_script_path("noext"));
    }
}
