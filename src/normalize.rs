//! Cross-File Normalizer
//!
//! Runs once every file of a project has been discovered. Builds a file's
//! component scope from its own declarations and from every file it links,
//! attaches external code units, and resolves `extends` tags.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::code_unit::CodeUnit;
use crate::diagnostics::DiagnosticSink;
use crate::html::is_custom_tag;
use crate::model::{ComponentId, ComponentTable, FileRecord};

/// Link `path` against the rest of the project.
///
/// Linked files that were never discovered are skipped; they are not part of
/// this run's file graph.
pub fn normalize_file(
    path: &Path,
    files: &mut IndexMap<PathBuf, FileRecord>,
    components: &mut ComponentTable,
    scripts: &HashMap<PathBuf, CodeUnit>,
    sink: &mut dyn DiagnosticSink,
) {
    let imported: Vec<ComponentId> = match files.get(path) {
        Some(file) => file
            .component_links
            .iter()
            .filter_map(|link| match files.get(link) {
                Some(linked) => Some(linked.declared_components.iter().copied()),
                None => {
                    debug!(file = %path.display(), link = %link.display(), "linked file not in project");
                    None
                }
            })
            .flatten()
            .collect(),
        None => return,
    };
    let Some(file) = files.get_mut(path) else {
        return;
    };
    debug!(file = %path.display(), imports = imported.len(), "normalizing");

    if let Some(external) = file.external_code.clone() {
        if file.code.is_none() {
            file.code = attach_external(&external, scripts, &file.path, sink);
        }
    }

    for &id in &file.declared_components {
        add_component(&file.path, &mut file.components, id, components, sink);

        let symbol = components.get(id);
        if symbol.code.is_none() {
            if let Some(external) = symbol.external_code.clone() {
                let declaring_file = symbol.declaring_file.clone();
                let unit = attach_external(&external, scripts, &declaring_file, sink);
                components.get_mut(id).code = unit;
            }
        }
    }

    for id in imported {
        add_component(&file.path, &mut file.components, id, components, sink);
    }

    for &id in &file.declared_components {
        let extends_tag = components.get(id).extends_tag.clone();
        match file.components.get(&extends_tag) {
            Some(&base) if base != id => components.get_mut(id).extends_component = Some(base),
            _ if is_custom_tag(&extends_tag) => {
                let symbol = components.get(id);
                sink.warning(
                    &format!("custom element with tag name {} not found.", extends_tag),
                    symbol.span,
                    &symbol.declaring_file,
                );
            }
            _ => {}
        }
    }
}

fn attach_external(
    external: &Path,
    scripts: &HashMap<PathBuf, CodeUnit>,
    owner: &Path,
    sink: &mut dyn DiagnosticSink,
) -> Option<CodeUnit> {
    let Some(unit) = scripts.get(external) else {
        debug!(script = %external.display(), "external code unit not provided");
        return None;
    };
    if !unit.is_library() {
        sink.error(
            &format!(
                "{} must define a library, not a part of another library.",
                external.display()
            ),
            unit.start,
            owner,
        );
    }
    Some(unit.clone())
}

/// Register `id` under its tag name in `scope`.
///
/// Local declarations shadow imported ones. Any other clash flags the symbol
/// already in scope as conflicted and reports both declaration sites, once.
pub fn add_component(
    file: &Path,
    scope: &mut IndexMap<String, ComponentId>,
    id: ComponentId,
    components: &mut ComponentTable,
    sink: &mut dyn DiagnosticSink,
) {
    let tag = components.get(id).tag_name.clone();
    let Some(&existing) = scope.get(&tag) else {
        scope.insert(tag, id);
        return;
    };
    if existing == id {
        return;
    }

    let existing_is_local = components.get(existing).declaring_file == file;
    let new_is_local = components.get(id).declaring_file == file;
    if existing_is_local && !new_is_local {
        debug!(tag = %tag, file = %file.display(), "local declaration shadows import");
        return;
    }
    if components.get(existing).has_conflict {
        return;
    }
    components.get_mut(existing).has_conflict = true;

    let message = if new_is_local {
        format!(r#"duplicate custom element definition for "{}"."#, tag)
    } else {
        format!(r#"imported duplicate custom element definitions for "{}"."#, tag)
    };
    let first = components.get(existing);
    sink.error(&message, first.span, &first.declaring_file);
    let second = components.get(id);
    sink.error(
        &format!("{} (second location).", message.trim_end_matches('.')),
        second.span,
        &second.declaring_file,
    );
    debug!(tag = %tag, file = %file.display(), "component conflict");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Messages;
    use crate::dom::{Document, SourceSpan};
    use crate::model::ComponentSymbol;

    fn declare(
        files: &mut IndexMap<PathBuf, FileRecord>,
        components: &mut ComponentTable,
        path: &str,
        tags: &[&str],
        links: &[&str],
    ) {
        let document = Document::new();
        let root = document.root();
        let mut file = FileRecord::new(PathBuf::from(path), document, false);
        for tag in tags {
            let symbol = ComponentSymbol::new(tag, "span", PathBuf::from(path), root, SourceSpan::default());
            file.declared_components.push(components.register(symbol));
        }
        file.component_links = links.iter().map(PathBuf::from).collect();
        files.insert(PathBuf::from(path), file);
    }

    #[test]
    fn test_imports_merge_into_scope() {
        let mut files = IndexMap::new();
        let mut components = ComponentTable::new();
        declare(&mut files, &mut components, "main.html", &["x-main"], &["lib.html", "missing.html"]);
        declare(&mut files, &mut components, "lib.html", &["x-a", "x-b"], &[]);

        let mut sink = Messages::new();
        normalize_file(Path::new("main.html"), &mut files, &mut components, &HashMap::new(), &mut sink);
        let tags: Vec<&String> = files[Path::new("main.html")].components.keys().collect();
        assert_eq!(tags, vec!["x-main", "x-a", "x-b"]);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_local_declaration_shadows_import() {
        let mut files = IndexMap::new();
        let mut components = ComponentTable::new();
        declare(&mut files, &mut components, "a.html", &["x-foo"], &["b.html"]);
        declare(&mut files, &mut components, "b.html", &["x-foo"], &[]);

        let mut sink = Messages::new();
        normalize_file(Path::new("a.html"), &mut files, &mut components, &HashMap::new(), &mut sink);
        let local = files[Path::new("a.html")].declared_components[0];
        assert_eq!(files[Path::new("a.html")].components["x-foo"], local);
        assert!(sink.is_empty());
        assert!(!components.get(local).has_conflict);
    }

    #[test]
    fn test_local_duplicates_conflict() {
        let mut files = IndexMap::new();
        let mut components = ComponentTable::new();
        declare(&mut files, &mut components, "a.html", &["x-foo", "x-foo"], &[]);

        let mut sink = Messages::new();
        normalize_file(Path::new("a.html"), &mut files, &mut components, &HashMap::new(), &mut sink);
        let errors: Vec<&str> = sink.errors().map(|d| d.message.as_str()).collect();
        assert_eq!(
            errors,
            vec![
                r#"duplicate custom element definition for "x-foo"."#,
                r#"duplicate custom element definition for "x-foo" (second location)."#,
            ]
        );
        let first = files[Path::new("a.html")].declared_components[0];
        assert!(components.get(first).has_conflict);
    }

    #[test]
    fn test_conflict_reported_once() {
        let mut files = IndexMap::new();
        let mut components = ComponentTable::new();
        declare(&mut files, &mut components, "main.html", &[], &["a.html", "b.html", "c.html"]);
        for name in ["a.html", "b.html", "c.html"] {
            declare(&mut files, &mut components, name, &["x-bar"], &[]);
        }

        let mut sink = Messages::new();
        let paths: Vec<PathBuf> = files.keys().cloned().collect();
        for path in &paths {
            normalize_file(path, &mut files, &mut components, &HashMap::new(), &mut sink);
        }
        let errors: Vec<&Path> = sink.errors().map(|d| d.file.as_path()).collect();
        assert_eq!(errors, vec![Path::new("a.html"), Path::new("b.html")]);
        assert!(sink.all()[0].message.starts_with("imported duplicate"));
    }

    #[test]
    fn test_unresolved_custom_base_warns() {
        let mut files = IndexMap::new();
        let mut components = ComponentTable::new();
        declare(&mut files, &mut components, "a.html", &["x-base"], &[]);
        let document = Document::new();
        let root = document.root();
        let mut file = FileRecord::new(PathBuf::from("b.html"), document, false);
        for (tag, extends) in [("x-child", "x-base"), ("x-orphan", "x-missing"), ("x-plain", "div")] {
            let symbol = ComponentSymbol::new(tag, extends, PathBuf::from("b.html"), root, SourceSpan::default());
            file.declared_components.push(components.register(symbol));
        }
        file.component_links = vec![PathBuf::from("a.html")];
        files.insert(PathBuf::from("b.html"), file);

        let mut sink = Messages::new();
        normalize_file(Path::new("b.html"), &mut files, &mut components, &HashMap::new(), &mut sink);
        let ids = files[Path::new("b.html")].declared_components.clone();
        let base = files[Path::new("a.html")].declared_components[0];
        assert_eq!(components.get(ids[0]).extends_component, Some(base));
        assert_eq!(components.get(ids[1]).extends_component, None);
        assert_eq!(sink.warnings().count(), 1);
        assert!(!sink.has_errors());
    }

    #[test]
    fn test_external_code_attached() {
        let mut files = IndexMap::new();
        let mut components = ComponentTable::new();
        declare(&mut files, &mut components, "a.html", &[], &[]);
        files[Path::new("a.html")].external_code = Some(PathBuf::from("a.js"));
        let mut scripts = HashMap::new();
        scripts.insert(
            PathBuf::from("a.js"),
            CodeUnit {
                path: PathBuf::from("a.js"),
                source: "'part of app';".into(),
                start: SourceSpan::default(),
                part_of: Some("app".into()),
                declarations: Vec::new(),
            },
        );

        let mut sink = Messages::new();
        normalize_file(Path::new("a.html"), &mut files, &mut components, &scripts, &mut sink);
        assert!(files[Path::new("a.html")].code.is_some());
        assert_eq!(sink.errors().count(), 1);
    }
}
