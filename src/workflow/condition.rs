//! Condition Evaluation
//!
//! Evaluates step conditions after template resolution. The grammar is
//! deliberately closed: boolean literals, `==`/`!=` comparison of literals,
//! and `in` membership. There is no variable lookup here (templates have
//! already been substituted) and no code execution of any kind.
//!
//! Expressions outside the grammar evaluate to `false` with a warning, which
//! skips the step instead of failing the workflow.

use log::warn;

/// Evaluates a resolved condition string to a boolean.
///
/// Supported forms:
/// - `true` / `false`
/// - `lhs == rhs`, `lhs != rhs`: literal comparison; operands may be quoted
///   with single or double quotes
/// - `lhs in rhs`: membership; when `rhs` is a `[a, b, c]` list literal the
///   elements are tested, otherwise substring containment applies
///
/// # Example
///
/// ```
/// use flowrunner::workflow::condition::evaluate;
///
/// assert!(evaluate("'approved' == 'approved'"));
/// assert!(evaluate("staging != production"));
/// assert!(evaluate("infra in [platform, infra]"));
/// assert!(!evaluate("launch the missiles"));
/// ```
pub fn evaluate(expression: &str) -> bool {
    let expr = expression.trim();

    match expr {
        "true" => return true,
        "false" | "" => return false,
        _ => {}
    }

    if let Some((lhs, rhs)) = split_operator(expr, "==") {
        return unquote(lhs) == unquote(rhs);
    }

    if let Some((lhs, rhs)) = split_operator(expr, "!=") {
        return unquote(lhs) != unquote(rhs);
    }

    if let Some((lhs, rhs)) = split_keyword(expr, "in") {
        return contains(&unquote(lhs), rhs);
    }

    warn!("Condition '{}' is not a recognized expression - treating as false", expr);
    false
}

/// Splits on the first occurrence of a symbolic operator.
fn split_operator<'a>(expr: &'a str, op: &str) -> Option<(&'a str, &'a str)> {
    let index = expr.find(op)?;
    let (lhs, rest) = expr.split_at(index);
    Some((lhs.trim(), rest[op.len()..].trim()))
}

/// Splits on a whitespace-delimited keyword operator.
fn split_keyword<'a>(expr: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
    let padded = format!(" {} ", keyword);
    let index = expr.find(&padded)?;
    let lhs = expr[..index].trim();
    let rhs = expr[index + padded.len()..].trim();
    if lhs.is_empty() || rhs.is_empty() {
        return None;
    }
    Some((lhs, rhs))
}

/// Strips one layer of matching single or double quotes.
fn unquote(text: &str) -> String {
    let trimmed = text.trim();
    for quote in ['\'', '"'] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}

/// Membership test: list literal on the right, substring otherwise.
fn contains(needle: &str, haystack: &str) -> bool {
    let haystack = haystack.trim();
    if let Some(inner) = haystack.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        return inner
            .split(',')
            .map(unquote)
            .any(|element| element == needle);
    }
    unquote(haystack).contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_literals() {
        assert!(evaluate("true"));
        assert!(evaluate(" true "));
        assert!(!evaluate("false"));
        assert!(!evaluate(""));
    }

    #[test]
    fn test_equality() {
        assert!(evaluate("approved == approved"));
        assert!(evaluate("'approved' == 'approved'"));
        assert!(evaluate("\"a b\" == 'a b'"));
        assert!(!evaluate("approved == rejected"));
        assert!(evaluate("3 == 3"));
    }

    #[test]
    fn test_inequality() {
        assert!(evaluate("staging != production"));
        assert!(!evaluate("'x' != 'x'"));
    }

    #[test]
    fn test_membership_list() {
        assert!(evaluate("infra in [platform, infra]"));
        assert!(evaluate("'infra' in ['platform', 'infra']"));
        assert!(!evaluate("sales in [platform, infra]"));
    }

    #[test]
    fn test_membership_substring() {
        assert!(evaluate("mar in martha"));
        assert!(!evaluate("zed in martha"));
    }

    #[test]
    fn test_unrecognized_expression_is_false() {
        assert!(!evaluate("launch()"));
        assert!(!evaluate("1 < 2"));
        assert!(!evaluate("a && b"));
        assert!(!evaluate("process::exit(1)"));
    }

    #[test]
    fn test_unresolved_placeholder_compares_literally() {
        // An unresolvable template stays verbatim, so it only matches itself.
        assert!(!evaluate("${missing} == approved"));
        assert!(evaluate("${missing} == ${missing}"));
    }

    #[test]
    fn test_keyword_needs_spacing() {
        // "in" inside a word must not be treated as the operator
        assert!(!evaluate("pint"));
        assert!(!evaluate("insider trading"));
    }

    #[test]
    fn test_empty_list_membership() {
        assert!(!evaluate("x in []"));
    }
}
