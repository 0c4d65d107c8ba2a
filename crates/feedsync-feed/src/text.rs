//! Text cleanup primitives applied to extracted field values.
//!
//! Two distinct pipelines: [`clean_text`] for long-text fields
//! (descriptions, remarks) and [`clean_name`] for entity-name-like fields,
//! which additionally removes characters the target store rejects in names.

use regex::Regex;

/// Clean a long-text field: unwrap CDATA markers, strip markup, collapse
/// whitespace runs to single spaces, trim.
#[must_use]
pub fn clean_text(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }

    let cdata_re = Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("valid regex");
    let unwrapped = cdata_re.replace_all(content, "$1");

    collapse_whitespace(&strip_markup(&unwrapped))
}

/// Clean an entity-name field: strip markup, drop characters the store
/// does not allow in names, collapse whitespace, trim.
#[must_use]
pub fn clean_name(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }

    let stripped = strip_markup(name);
    let legal: String = stripped
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '&' | '"' | '\''))
        .collect();

    collapse_whitespace(&legal)
}

/// Parse a feed decimal that may use comma as the decimal separator.
///
/// Malformed input yields 0.0 — feed numerics are best-effort and must
/// never abort a record.
#[must_use]
pub fn parse_decimal(value: &str) -> f64 {
    let normalized = value.trim().replace(',', ".");
    normalized.parse::<f64>().unwrap_or(0.0)
}

/// Parse a feed integer flag; malformed input yields 0.
#[must_use]
pub fn parse_int(value: &str) -> i64 {
    value.trim().parse::<i64>().unwrap_or(0)
}

/// Remove markup tags by dropping everything between `<` and `>`.
fn strip_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_unwraps_cdata() {
        assert_eq!(
            clean_text("<![CDATA[Herbal tea   blend]]>"),
            "Herbal tea blend"
        );
    }

    #[test]
    fn clean_text_strips_markup_and_collapses_whitespace() {
        assert_eq!(
            clean_text("<p>Great   <b>tea</b></p>\n\t from Slovakia"),
            "Great tea from Slovakia"
        );
    }

    #[test]
    fn clean_text_handles_multiline_cdata() {
        assert_eq!(clean_text("<![CDATA[line one\nline two]]>"), "line one line two");
    }

    #[test]
    fn clean_text_empty_stays_empty() {
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn clean_name_removes_store_illegal_characters() {
        assert_eq!(clean_name(r#"Acme & Sons "Premium"'"#), "Acme Sons Premium");
    }

    #[test]
    fn clean_name_strips_markup_first() {
        assert_eq!(clean_name("<b>Herbatica</b> s.r.o."), "Herbatica s.r.o.");
    }

    #[test]
    fn parse_decimal_accepts_comma_separator() {
        assert!((parse_decimal("12,50") - 12.50).abs() < 1e-9);
    }

    #[test]
    fn parse_decimal_accepts_dot_separator() {
        assert!((parse_decimal("8.99") - 8.99).abs() < 1e-9);
    }

    #[test]
    fn parse_decimal_malformed_yields_zero() {
        assert!((parse_decimal("abc") - 0.0).abs() < f64::EPSILON);
        assert!((parse_decimal("") - 0.0).abs() < f64::EPSILON);
        assert!((parse_decimal("12,5,0") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_int_defaults_to_zero() {
        assert_eq!(parse_int("1"), 1);
        assert_eq!(parse_int("yes"), 0);
    }
}
