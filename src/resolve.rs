//! href resolution for links and external scripts.

use std::path::{Component, Path, PathBuf};

const PACKAGE_PREFIX: &str = "package:";

pub trait PathResolver: Send + Sync {
    /// Resolve `href` as seen from `from_file`. `None` means the target is not
    /// part of the file graph (remote URL, data URI).
    fn resolve(&self, href: &str, from_file: &Path) -> Option<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct FsPathResolver {
    pub package_root: PathBuf,
}

impl FsPathResolver {
    pub fn new(package_root: impl Into<PathBuf>) -> Self {
        Self {
            package_root: package_root.into(),
        }
    }
}

impl Default for FsPathResolver {
    fn default() -> Self {
        Self::new("packages")
    }
}

impl PathResolver for FsPathResolver {
    fn resolve(&self, href: &str, from_file: &Path) -> Option<PathBuf> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        if let Some(rest) = href.strip_prefix(PACKAGE_PREFIX) {
            return Some(normalize_path(&self.package_root.join(rest)));
        }
        if href.starts_with("//") || has_scheme(href) {
            return None;
        }
        if href.starts_with('/') {
            return Some(normalize_path(Path::new(href)));
        }
        let base = from_file.parent().unwrap_or_else(|| Path::new(""));
        Some(normalize_path(&base.join(href)))
    }
}

fn has_scheme(href: &str) -> bool {
    match href.find(':') {
        Some(idx) if idx > 1 => href[..idx]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')),
        _ => false,
    }
}

/// Collapse `.` and `..` segments without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.iter().map(|c| c.as_os_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_hrefs() {
        let resolver = FsPathResolver::default();
        let from = Path::new("web/app/index.html");
        assert_eq!(
            resolver.resolve("components/x.html", from),
            Some(PathBuf::from("web/app/components/x.html"))
        );
        assert_eq!(
            resolver.resolve("../shared/./y.html", from),
            Some(PathBuf::from("web/shared/y.html"))
        );
        assert_eq!(resolver.resolve("a.html", Path::new("index.html")), Some(PathBuf::from("a.html")));
    }

    #[test]
    fn test_package_and_absolute() {
        let resolver = FsPathResolver::new("/deps");
        let from = Path::new("web/index.html");
        assert_eq!(
            resolver.resolve("package:widgets/menu.html", from),
            Some(PathBuf::from("/deps/widgets/menu.html"))
        );
        assert_eq!(resolver.resolve("/abs/../z.html", from), Some(PathBuf::from("/z.html")));
    }

    #[test]
    fn test_remote_hrefs_are_skipped() {
        let resolver = FsPathResolver::default();
        let from = Path::new("index.html");
        assert_eq!(resolver.resolve("https://cdn.example.com/x.css", from), None);
        assert_eq!(resolver.resolve("//cdn.example.com/x.css", from), None);
        assert_eq!(resolver.resolve("data:text/css,a", from), None);
        assert_eq!(resolver.resolve("  ", from), None);
    }
}
