//! SQL literal helpers shared by DDL generation and row coercion

use itertools::Itertools;

/// SQL literal written for an absent value
pub const NULL_LITERAL: &str = "NULL";

/// Wrap a value in single quotes, doubling any embedded single quote.
///
/// The result is one SQL expression that evaluates back to `value`. SQLite
/// ends a quoted string at a NUL byte, so embedded NULs are spliced in with
/// `char(0)` between quoted segments.
pub fn escape_string_literal(value: &str) -> String {
    if !value.contains('\0') {
        return quote_segment(value);
    }
    value.split('\0').map(quote_segment).join("||char(0)||")
}

fn quote_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len() + 2);
    out.push('\'');
    for ch in segment.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

/// Quote a table or column name as a SQL identifier.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// True when `value` can be written unquoted as a numeric literal.
pub fn is_numeric_literal(value: &str) -> bool {
    if value.is_empty() || value.chars().any(|c| c.is_alphabetic() && c != 'e' && c != 'E') {
        return false;
    }
    value.parse::<f64>().map(|v| v.is_finite()).unwrap_or(false)
}
