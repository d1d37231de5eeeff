//! Markup helpers shared by the passes: tag/attribute tables, name casing,
//! whitespace compaction and escaping.

use lazy_static::lazy_static;
use std::collections::HashSet;

lazy_static! {
    /// Attributes every HTML element understands. They are never promoted to
    /// component inputs.
    static ref GLOBAL_ATTRIBUTES: HashSet<&'static str> = [
        "accesskey",
        "class",
        "contenteditable",
        "contextmenu",
        "dir",
        "draggable",
        "dropzone",
        "hidden",
        "id",
        "lang",
        "spellcheck",
        "style",
        "tabindex",
        "title",
        "translate",
    ]
    .into_iter()
    .collect();

    /// Hyphenated names the HTML/SVG/MathML vocabularies already own.
    static ref RESERVED_CUSTOM_TAGS: HashSet<&'static str> = [
        "annotation-xml",
        "color-profile",
        "font-face",
        "font-face-src",
        "font-face-uri",
        "font-face-format",
        "font-face-name",
        "missing-glyph",
    ]
    .into_iter()
    .collect();

    static ref VOID_ELEMENTS: HashSet<&'static str> = [
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
        "source", "track", "wbr",
    ]
    .into_iter()
    .collect();
}

pub fn is_global_attribute(name: &str) -> bool {
    GLOBAL_ATTRIBUTES.contains(name)
}

/// A custom element name contains a hyphen and is not one of the reserved
/// hyphenated tags.
pub fn is_custom_tag(name: &str) -> bool {
    name.contains('-') && !RESERVED_CUSTOM_TAGS.contains(name)
}

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(tag)
}

/// `on-double-click` → `onDoubleClick`
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for ch in name.chars() {
        if ch == '-' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn is_html_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r' | '\x0c')
}

/// Trims or compacts the leading and trailing whitespace of `text`.
///
/// A whitespace run that contains a line break is dropped; otherwise it is
/// collapsed to a single space.
///
/// ```text
/// "  x  "          => " x "
/// "\n\n  x  \n"    => "x"
/// "\n\n  x      "  => "x "
/// "\n\n  "         => ""
/// "      "         => " "
/// " \n  "          => ""
/// ```
pub fn trim_or_compact(text: &str) -> String {
    let start = match text.find(|c: char| !is_html_whitespace(c)) {
        Some(start) => start,
        None => {
            return if text.is_empty() || text.contains('\n') {
                String::new()
            } else {
                " ".to_string()
            };
        }
    };
    // `start` found a non-whitespace char, so `rfind` does too.
    let last = text.rfind(|c: char| !is_html_whitespace(c)).unwrap_or(start);
    let last_len = text[last..].chars().next().map(char::len_utf8).unwrap_or(1);
    let end = last + last_len;

    let compact = |run: &str| {
        if run.is_empty() || run.contains('\n') {
            ""
        } else {
            " "
        }
    };

    let mut out = String::with_capacity(end - start + 2);
    out.push_str(compact(&text[..start]));
    out.push_str(&text[start..end]);
    out.push_str(compact(&text[end..]));
    out
}

/// Escape `value` for use inside a single-quoted string literal.
pub fn escape_single_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '$' => out.push_str("\\$"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_or_compact() {
        assert_eq!(trim_or_compact("  x  "), " x ");
        assert_eq!(trim_or_compact("\n\n  x  \n"), "x");
        assert_eq!(trim_or_compact("\n\n  x       "), "x ");
        assert_eq!(trim_or_compact("\n\n  "), "");
        assert_eq!(trim_or_compact("      "), " ");
        assert_eq!(trim_or_compact(" \n  "), "");
        assert_eq!(trim_or_compact("  \n"), "");
        assert_eq!(trim_or_compact(""), "");
        assert_eq!(trim_or_compact("Hello "), "Hello ");
        assert_eq!(trim_or_compact("a  b"), "a  b");
    }

    #[test]
    fn test_custom_tags() {
        assert!(is_custom_tag("x-foo"));
        assert!(!is_custom_tag("div"));
        assert!(!is_custom_tag("font-face"));
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(to_camel_case("on-double-click"), "onDoubleClick");
        assert_eq!(to_camel_case("value-as-date"), "valueAsDate");
        assert_eq!(to_camel_case("click"), "click");
    }

    #[test]
    fn test_escape_single_quoted() {
        assert_eq!(escape_single_quoted("it's"), "it\\'s");
        assert_eq!(escape_single_quoted("a\\b"), "a\\\\b");
    }
}
