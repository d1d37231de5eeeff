//! Project orchestration.
//!
//! Drives the three phases over a set of files: discover every file, then
//! normalize every file, then analyze every file. Discovery of independent
//! files runs on the rayon pool; the later phases share the component table
//! and the identifier counter and run in order.

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[cfg(feature = "napi")]
use napi_derive::napi;

use crate::analyzer::analyze_file;
use crate::code_unit::{CodeUnit, CodeUnitParser, OxcCodeUnitParser};
use crate::diagnostics::{Diagnostic, DiagnosticSink, Messages};
use crate::discovery::{discover_file, Discovery, SourceDocument};
use crate::dom::{Document, DocumentError, SourceSpan};
use crate::export::{export_file, FileExport};
use crate::model::{ComponentSymbol, ComponentTable, FileRecord, IdGenerator};
use crate::normalize::normalize_file;
use crate::options::{AnalyzerOptions, ConfigError};
use crate::resolve::{FsPathResolver, PathResolver};

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("Invalid project JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct Project {
    pub options: AnalyzerOptions,
    pub files: IndexMap<PathBuf, FileRecord>,
    pub components: ComponentTable,
    /// External code units, keyed by resolved path.
    pub scripts: HashMap<PathBuf, CodeUnit>,
    pub ids: IdGenerator,
    resolver: Box<dyn PathResolver>,
    parser: Box<dyn CodeUnitParser>,
}

impl Project {
    pub fn new(options: AnalyzerOptions) -> Self {
        let resolver = FsPathResolver::new(options.package_root.clone());
        Self::with_collaborators(options, Box::new(resolver), Box::new(OxcCodeUnitParser))
    }

    pub fn with_collaborators(
        options: AnalyzerOptions,
        resolver: Box<dyn PathResolver>,
        parser: Box<dyn CodeUnitParser>,
    ) -> Self {
        Self {
            options,
            files: IndexMap::new(),
            components: ComponentTable::new(),
            scripts: HashMap::new(),
            ids: IdGenerator::new(),
            resolver,
            parser,
        }
    }

    /// Parse an external script so normalization can attach it.
    pub fn add_script(&mut self, path: impl Into<PathBuf>, source: &str, sink: &mut dyn DiagnosticSink) {
        let path = path.into();
        let unit = self.parser.parse(&path, source, SourceSpan::new(1, 1), sink);
        self.scripts.insert(path, unit);
    }

    pub fn file(&self, path: &Path) -> Option<&FileRecord> {
        self.files.get(path)
    }

    /// Component visible under `tag` in `path`'s scope.
    pub fn lookup(&self, path: &Path, tag: &str) -> Option<&ComponentSymbol> {
        let id = self.files.get(path)?.components.get(tag)?;
        Some(self.components.get(*id))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PHASES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Discover every source. Each file reports into its own buffer; the
    /// buffers are replayed into `sink` in input order.
    pub fn discover_all(&mut self, sources: Vec<SourceDocument>, sink: &mut dyn DiagnosticSink) {
        let resolver = self.resolver.as_ref();
        let parser = self.parser.as_ref();
        let discover = |source: SourceDocument| {
            let mut messages = Messages::silent();
            let discovery = discover_file(source, resolver, parser, &mut messages);
            (discovery, messages)
        };

        info!(files = sources.len(), parallel = self.options.parallel_discovery, "discovery");
        let results: Vec<(Discovery, Messages)> = if self.options.parallel_discovery {
            sources.into_par_iter().map(discover).collect()
        } else {
            sources.into_iter().map(discover).collect()
        };

        for (discovery, messages) in results {
            messages.replay_into(sink);
            let Discovery {
                mut file,
                components,
            } = discovery;
            for symbol in components {
                file.declared_components.push(self.components.register(symbol));
            }
            if self.files.contains_key(&file.path) {
                debug!(file = %file.path.display(), "file discovered twice; keeping the last");
            }
            self.files.insert(file.path.clone(), file);
        }
    }

    pub fn normalize_all(&mut self, sink: &mut dyn DiagnosticSink) {
        let paths: Vec<PathBuf> = self.files.keys().cloned().collect();
        for path in paths {
            normalize_file(&path, &mut self.files, &mut self.components, &self.scripts, sink);
        }
    }

    pub fn analyze_all(&mut self, sink: &mut dyn DiagnosticSink) {
        for file in self.files.values_mut() {
            analyze_file(file, &mut self.components, &self.ids, sink, &self.options);
        }
    }

    pub fn run(&mut self, sources: Vec<SourceDocument>, sink: &mut dyn DiagnosticSink) {
        self.discover_all(sources, sink);
        self.normalize_all(sink);
        self.analyze_all(sink);
    }

    pub fn export(&self) -> Vec<FileExport> {
        self.files
            .values()
            .map(|file| export_file(file, &self.components))
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSON ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    #[serde(default)]
    pub options: AnalyzerOptions,
    pub files: Vec<InputFile>,
    #[serde(default)]
    pub scripts: Vec<InputScript>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputFile {
    pub path: String,
    pub html: String,
    #[serde(default)]
    pub entry_point: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputScript {
    pub path: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectOutput {
    pub files: Vec<FileExport>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Analyze a whole project described as JSON and return the exported files
/// and diagnostics as JSON.
pub fn analyze_project_json(input: &str) -> Result<String, ProjectError> {
    let input: ProjectInput = serde_json::from_str(input)?;
    let mut project = Project::new(input.options);
    let mut messages = Messages::new();

    for script in &input.scripts {
        project.add_script(&script.path, &script.source, &mut messages);
    }
    let sources = input
        .files
        .into_iter()
        .map(|file| {
            let document = Document::parse_html(&file.html)?;
            Ok(SourceDocument::new(file.path, document, file.entry_point))
        })
        .collect::<Result<Vec<_>, DocumentError>>()?;

    project.run(sources, &mut messages);
    let output = ProjectOutput {
        files: project.export(),
        diagnostics: messages.into_vec(),
    };
    Ok(serde_json::to_string(&output)?)
}

#[cfg(feature = "napi")]
#[napi]
pub fn analyze_project_native(input: String) -> napi::Result<String> {
    analyze_project_json(&input).map_err(|e| napi::Error::from_reason(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(path: &str, html: &str, entry: bool) -> SourceDocument {
        SourceDocument::new(path, Document::parse_html(html).unwrap(), entry)
    }

    #[test]
    fn test_parallel_discovery_replays_in_input_order() {
        for parallel in [true, false] {
            let options = AnalyzerOptions {
                parallel_discovery: parallel,
                ..AnalyzerOptions::default()
            };
            let mut project = Project::new(options);
            let mut sink = Messages::new();
            let sources = (0..8)
                .map(|i| source(&format!("f{}.html", i), "<body><element></element></body>", false))
                .collect();
            project.discover_all(sources, &mut sink);

            let files: Vec<String> = sink.all().iter().map(|d| d.file.display().to_string()).collect();
            let expected: Vec<String> = (0..8).map(|i| format!("f{}.html", i)).collect();
            assert_eq!(files, expected);
            let order: Vec<&PathBuf> = project.files.keys().collect();
            assert_eq!(order.len(), 8);
            assert_eq!(order[3], &PathBuf::from("f3.html"));
        }
    }

    #[test]
    fn test_run_links_components_across_files() {
        let mut project = Project::new(AnalyzerOptions::default());
        let mut sink = Messages::new();
        project.add_script("app/widgets.js", "export class XCard {}", &mut sink);
        project.run(
            vec![
                source(
                    "app/index.html",
                    r#"<head><link rel="components" href="widgets.html"></head><body><x-card></x-card></body>"#,
                    true,
                ),
                source(
                    "app/widgets.html",
                    r#"<body><element name="x-card"><template><p>card</p></template><script type="module" src="widgets.js"></script></element></body>"#,
                    false,
                ),
            ],
            &mut sink,
        );
        assert!(sink.is_empty(), "{:?}", sink.all());

        let card = project.lookup(Path::new("app/index.html"), "x-card").unwrap();
        assert_eq!(card.declaring_file, PathBuf::from("app/widgets.html"));
        assert_eq!(card.code.as_ref().unwrap().declarations, vec!["XCard"]);

        let index = project.file(Path::new("app/index.html")).unwrap();
        assert_eq!(index.used_components.len(), 1);
    }

    #[test]
    fn test_analyze_project_json() {
        let input = r#"{
            "options": {"parallelDiscovery": false},
            "files": [
                {"path": "index.html", "html": "<body><p on-click=\"save()\">Hi {{name}}</p></body>", "entryPoint": true}
            ]
        }"#;
        let output: serde_json::Value = serde_json::from_str(&analyze_project_json(input).unwrap()).unwrap();
        let file = &output["files"][0];
        assert_eq!(file["path"], "index.html");
        let p = &file["root"]["children"][0];
        assert_eq!(p["tag"], "p");
        assert_eq!(p["events"]["onClick"][0]["code"], "save()");
        assert_eq!(p["children"][1]["binding"]["expr"], "name");
        assert!(!file["html"].as_str().unwrap().contains("on-click"));
        assert_eq!(output["diagnostics"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_analyze_project_json_rejects_bad_input() {
        assert!(matches!(analyze_project_json("{"), Err(ProjectError::Json(_))));
    }
}
