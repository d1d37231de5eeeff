//! # Template Analyzer
//!
//! Front end of a component template compiler. A project is a set of HTML
//! files that declare custom elements (`<element name="x-foo">`), link each
//! other (`<link rel="components">`) and carry `{{ }}` data bindings. The
//! analyzer produces, per file, an annotated node tree that a code generator
//! can consume directly.
//!
//! ## Phases
//!
//! 1. **Discovery** (`discover_file`): finds component declarations, links and
//!    code units. Files are independent, so this phase runs in parallel.
//! 2. **Normalization** (`normalize_file`): builds each file's component
//!    scope from its own declarations and the files it links, attaches
//!    external code, resolves `extends`, and reports duplicate definitions.
//! 3. **Semantic pass** (`analyze_file`): structural directives, component
//!    binding, attribute, event and text bindings, identifiers.
//!
//! ## Invariants
//!
//! 1. **Diagnostics never abort**: every problem in the input is reported
//!    through a [`DiagnosticSink`] and the offending construct is skipped.
//! 2. **One scope per file**: a tag name maps to at most one component in a
//!    file's scope. Local declarations shadow imports; two imports of the
//!    same tag are a conflict, reported once.
//! 3. **Unique identifiers**: one run shares one [`IdGenerator`], so no two
//!    annotated nodes of a project share a generated identifier.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod analyzer;
mod bindings;
mod code_unit;
mod diagnostics;
mod discovery;
mod dom;
mod export;
mod html;
mod model;
mod normalize;
mod options;
mod project;
mod resolve;
mod scanner;


pub use analyzer::analyze_file;
pub use code_unit::{is_script_path, CodeUnit, CodeUnitParser, OxcCodeUnitParser, SCRIPT_TYPE};
pub use diagnostics::{Diagnostic, DiagnosticSink, Messages, Severity};
pub use discovery::{discover_file, Discovery, SourceDocument};
pub use dom::{Document, DocumentError, DomNode, NodeData, NodeId, SourceSpan};
pub use export::{export_file, static_html, ComponentExport, EventExport, FileExport, NodeExport};
pub use model::{
    identifier_sequence, AncestorIter, AnnotatedNode, AttributeBinding, BindingStyle, ComponentId,
    ComponentSymbol, ComponentTable, Directive, ElementInfo, EventAction, EventBinding,
    FileRecord, IdGenerator, InfoId, NodeKind, StructuralInfo, TextInfo, ROOT_IDENTIFIER,
};
pub use normalize::{add_component, normalize_file};
pub use options::{AnalyzerOptions, ConfigError};
pub use project::{
    analyze_project_json, InputFile, InputScript, Project, ProjectError, ProjectInput,
    ProjectOutput,
};
pub use resolve::{FsPathResolver, PathResolver};
pub use scanner::{scan, BindingExpr, BindingScanner, ScanError};

#[cfg(feature = "napi")]
pub use project::analyze_project_native;

/// Scan a string for `{{ }}` bindings and return `{ "expressions": [...],
/// "texts": [...] }` as JSON.
#[cfg(feature = "napi")]
#[napi]
pub fn scan_bindings_native(input: String) -> napi::Result<String> {
    let (expressions, texts) = scan(&input);
    serde_json::to_string(&serde_json::json!({
        "expressions": expressions,
        "texts": texts,
    }))
    .map_err(|e| napi::Error::from_reason(e.to_string()))
}
