//! Binding-expression scanner.
//!
//! Splits a string into alternating literal text and `{{ ... }}` expressions.
//! There is no nesting: the first `}}` after a `{{` closes the expression.

use serde::{Deserialize, Serialize};

pub const OPEN_MARKER: &str = "{{";
pub const CLOSE_MARKER: &str = "}}";

const FINAL_MODIFIER: &str = "final";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("invalid scanner state: {0}")]
    InvalidState(&'static str),
}

/// One decoded `{{ ... }}` expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingExpr {
    /// Expression text, trimmed, with any `| final` modifier removed.
    pub expr: String,
    /// Exact text between the markers.
    pub raw: String,
    /// Byte offset of the opening marker in the scanned string.
    pub start: usize,
    /// Byte offset just past the closing marker.
    pub end: usize,
    /// One-time binding (`{{ expr | final }}`).
    pub is_final: bool,
}

impl BindingExpr {
    pub fn new(raw: &str, start: usize, end: usize) -> Self {
        let trimmed = raw.trim();
        let (expr, is_final) = split_final_modifier(trimmed);
        Self {
            expr: expr.to_string(),
            raw: raw.to_string(),
            start,
            end,
            is_final,
        }
    }

    /// An expression that did not come from markup, e.g. a two-way binding value.
    pub fn from_expression(expr: &str) -> Self {
        Self::new(expr, 0, 0)
    }

    /// The bracketed source form, `{{raw}}`.
    pub fn source(&self) -> String {
        format!("{}{}{}", OPEN_MARKER, self.raw, CLOSE_MARKER)
    }
}

fn split_final_modifier(text: &str) -> (&str, bool) {
    let Some(head) = text.strip_suffix(FINAL_MODIFIER) else {
        return (text, false);
    };
    let head = head.trim_end();
    match head.strip_suffix('|') {
        // `a || final` is a boolean expression, not a modifier
        Some(expr) if !expr.ends_with('|') => (expr.trim_end(), true),
        _ => (text, false),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Start,
    Binding,
    Done,
}

/// Cursor over the bindings of one string.
///
/// `current_expr` and `preceding_text` are only meaningful after a call to
/// [`advance`](Self::advance). Once `advance` returns false, `preceding_text`
/// yields the trailing literal text.
#[derive(Debug)]
pub struct BindingScanner<'a> {
    input: &'a str,
    pos: usize,
    state: ScanState,
    preceding: &'a str,
    current: Option<BindingExpr>,
}

impl<'a> BindingScanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            state: ScanState::Start,
            preceding: "",
            current: None,
        }
    }

    /// Move to the next binding. Returns false when none is left; an
    /// unterminated `{{` leaves the rest of the input as literal text.
    pub fn advance(&mut self) -> bool {
        if self.state == ScanState::Done {
            return false;
        }
        let rest = &self.input[self.pos..];
        let found = rest.find(OPEN_MARKER).and_then(|open| {
            let body = open + OPEN_MARKER.len();
            rest[body..]
                .find(CLOSE_MARKER)
                .map(|close| (open, body, body + close))
        });

        match found {
            Some((open, body, close)) => {
                let base = self.pos;
                let end = close + CLOSE_MARKER.len();
                self.preceding = &rest[..open];
                self.current = Some(BindingExpr::new(&rest[body..close], base + open, base + end));
                self.pos = base + end;
                self.state = ScanState::Binding;
                true
            }
            None => {
                self.preceding = rest;
                self.current = None;
                self.pos = self.input.len();
                self.state = ScanState::Done;
                false
            }
        }
    }

    pub fn current_expr(&self) -> Result<&BindingExpr, ScanError> {
        match (self.state, &self.current) {
            (ScanState::Binding, Some(expr)) => Ok(expr),
            (ScanState::Start, _) => Err(ScanError::InvalidState("current_expr called before advance")),
            _ => Err(ScanError::InvalidState("current_expr called after the last binding")),
        }
    }

    pub fn preceding_text(&self) -> Result<&'a str, ScanError> {
        match self.state {
            ScanState::Start => Err(ScanError::InvalidState("preceding_text called before advance")),
            _ => Ok(self.preceding),
        }
    }

    /// Drain the remaining bindings. Always pushes one more text segment than
    /// expressions; the last segment is the (possibly empty) tail.
    pub fn collect_all(&mut self, exprs: &mut Vec<BindingExpr>, texts: &mut Vec<String>) {
        if self.state == ScanState::Binding {
            if let Some(expr) = self.current.take() {
                texts.push(self.preceding.to_string());
                exprs.push(expr);
            }
        }
        while self.advance() {
            texts.push(self.preceding.to_string());
            if let Some(expr) = self.current.clone() {
                exprs.push(expr);
            }
        }
        texts.push(self.preceding.to_string());
    }

    pub fn reset(&mut self) {
        self.pos = 0;
        self.state = ScanState::Start;
        self.preceding = "";
        self.current = None;
    }
}

/// Scan `input` in one go.
pub fn scan(input: &str) -> (Vec<BindingExpr>, Vec<String>) {
    let mut exprs = Vec::new();
    let mut texts = Vec::new();
    BindingScanner::new(input).collect_all(&mut exprs, &mut texts);
    (exprs, texts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rebuild(exprs: &[BindingExpr], texts: &[String]) -> String {
        let mut out = String::new();
        for (text, expr) in texts.iter().zip(exprs) {
            out.push_str(text);
            out.push_str(&expr.source());
        }
        out.push_str(texts.last().map(String::as_str).unwrap_or(""));
        out
    }

    #[test]
    fn test_collect_all_yields_n_plus_one_texts() {
        let inputs = [
            "",
            "plain",
            "{{a}}",
            "Hello {{name}}!",
            "{{ a }}{{b}} and {{ c | final }} tail",
            "x {{ '}' }} y",
        ];
        for input in inputs {
            let (exprs, texts) = scan(input);
            assert_eq!(texts.len(), exprs.len() + 1, "input {:?}", input);
            assert_eq!(rebuild(&exprs, &texts), input);
        }
    }

    #[test]
    fn test_segments() {
        let (exprs, texts) = scan("Hello {{ name }}!");
        assert_eq!(texts, vec!["Hello ".to_string(), "!".to_string()]);
        assert_eq!(exprs[0].expr, "name");
        assert_eq!(exprs[0].raw, " name ");
        assert_eq!((exprs[0].start, exprs[0].end), (6, 16));
    }

    #[test]
    fn test_first_close_marker_wins() {
        let (exprs, texts) = scan("{{ {a: 1}}} }}");
        assert_eq!(exprs.len(), 1);
        assert_eq!(exprs[0].raw, " {a: 1");
        assert_eq!(texts[1], "} }}");
    }

    #[test]
    fn test_unterminated_marker_is_literal() {
        let (exprs, texts) = scan("a {{ b");
        assert!(exprs.is_empty());
        assert_eq!(texts, vec!["a {{ b".to_string()]);

        let (exprs, texts) = scan("{{x}} then {{ y");
        assert_eq!(exprs.len(), 1);
        assert_eq!(texts[1], " then {{ y");
    }

    #[test]
    fn test_final_modifier() {
        let (exprs, _) = scan("{{ user.name | final }}{{ a || final }}{{x}}");
        assert_eq!(exprs[0].expr, "user.name");
        assert!(exprs[0].is_final);
        assert_eq!(exprs[1].expr, "a || final");
        assert!(!exprs[1].is_final);
        assert!(!exprs[2].is_final);
    }

    #[test]
    fn test_cursor_contract() {
        let mut scanner = BindingScanner::new("a{{b}}c");
        assert!(scanner.current_expr().is_err());
        assert!(scanner.preceding_text().is_err());

        assert!(scanner.advance());
        assert_eq!(scanner.preceding_text().unwrap(), "a");
        assert_eq!(scanner.current_expr().unwrap().expr, "b");

        assert!(!scanner.advance());
        assert_eq!(scanner.preceding_text().unwrap(), "c");
        assert!(matches!(scanner.current_expr(), Err(ScanError::InvalidState(_))));
        assert!(!scanner.advance());

        scanner.reset();
        let mut exprs = Vec::new();
        let mut texts = Vec::new();
        scanner.collect_all(&mut exprs, &mut texts);
        assert_eq!(exprs.len(), 1);
        assert_eq!(texts, vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_collect_all_after_advance_keeps_current() {
        let mut scanner = BindingScanner::new("{{a}}-{{b}}");
        assert!(scanner.advance());
        let mut exprs = Vec::new();
        let mut texts = Vec::new();
        scanner.collect_all(&mut exprs, &mut texts);
        let names: Vec<&str> = exprs.iter().map(|e| e.expr.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(texts, vec!["".to_string(), "-".to_string(), "".to_string()]);
    }
}
