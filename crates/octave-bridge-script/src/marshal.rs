//! Lowering of [`ArgumentValue`]s into Octave literal syntax.

use crate::value::ArgumentValue;
use std::fmt::Write as _;

/// Rewrite a host path or string so it resolves relative to the workspace
/// mount: backslashes become forward slashes and leading `./` markers are
/// dropped.
pub fn normalize_text(s: &str) -> String {
    let normalized = s.replace('\\', "/");
    let mut rest = normalized.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.to_owned()
}

/// Single-quoted Octave string literal. Quotes are doubled; control
/// characters are spliced in with `char(n)` because single-quoted strings
/// cannot span lines.
pub fn quote(s: &str) -> String {
    if !s.chars().any(char::is_control) {
        return format!("'{}'", s.replace('\'', "''"));
    }
    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();
    for c in s.chars() {
        if c.is_control() {
            if !current.is_empty() {
                parts.push(format!("'{}'", current.replace('\'', "''")));
                current.clear();
            }
            parts.push(format!("char({})", u32::from(c)));
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        parts.push(format!("'{}'", current.replace('\'', "''")));
    }
    format!("[{}]", parts.join(", "))
}

pub fn number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 { "Inf" } else { "-Inf" }.to_owned()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n:?}")
    }
}

fn numeric_row(values: &[f64]) -> String {
    let mut out = String::from("[");
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{}", number(*v));
    }
    out.push(']');
    out
}

/// Render one argument as the right-hand side of an assignment.
pub fn literal(value: &ArgumentValue) -> String {
    match value {
        ArgumentValue::Number(n) => number(*n),
        ArgumentValue::Text(s) => quote(&normalize_text(s)),
        ArgumentValue::Boolean(b) => if *b { "1" } else { "0" }.to_owned(),
        ArgumentValue::Absent => "[]".to_owned(),
        ArgumentValue::NumericList(v) => numeric_row(v),
        ArgumentValue::TextList(items) => {
            let cells: Vec<String> = items.iter().map(|s| quote(s)).collect();
            format!("{{{}}}", cells.join(", "))
        }
        // Shape is not carried across; the callee receives a flat row vector.
        ArgumentValue::NumericArray(a) => numeric_row(a.data()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::NumericArray;

    #[test]
    fn normalize_strips_relative_markers() {
        assert_eq!(normalize_text("./data/file.spar"), "data/file.spar");
        assert_eq!(normalize_text("././data"), "data");
        assert_eq!(normalize_text(".\\data\\file.spar"), "data/file.spar");
        assert_eq!(normalize_text("../up"), "../up");
        assert_eq!(normalize_text(".hidden"), ".hidden");
        assert_eq!(normalize_text("plain"), "plain");
    }

    #[test]
    fn quote_doubles_single_quotes() {
        assert_eq!(quote("it's"), "'it''s'");
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn quote_splices_newlines() {
        assert_eq!(quote("a\nb"), "['a', char(10), 'b']");
        assert_eq!(quote("\ttab"), "[char(9), 'tab']");
    }

    #[test]
    fn numbers_render_as_numerals() {
        assert_eq!(number(4096.0), "4096");
        assert_eq!(number(-3.0), "-3");
        assert_eq!(number(2.5), "2.5");
        assert_eq!(number(1e-7), "1e-7");
        assert_eq!(number(1e300), "1e300");
        assert_eq!(number(f64::NAN), "NaN");
        assert_eq!(number(f64::INFINITY), "Inf");
        assert_eq!(number(f64::NEG_INFINITY), "-Inf");
    }

    #[test]
    fn literal_per_category() {
        assert_eq!(literal(&ArgumentValue::Number(123.0)), "123");
        assert_eq!(literal(&ArgumentValue::Boolean(true)), "1");
        assert_eq!(literal(&ArgumentValue::Boolean(false)), "0");
        assert_eq!(literal(&ArgumentValue::Absent), "[]");
        assert_eq!(
            literal(&ArgumentValue::Text("./externals\\fidA".to_owned())),
            "'externals/fidA'"
        );
        assert_eq!(
            literal(&ArgumentValue::NumericList(vec![1.0, 2.5, -3.0])),
            "[1, 2.5, -3]"
        );
        assert_eq!(literal(&ArgumentValue::NumericList(Vec::new())), "[]");
        assert_eq!(
            literal(&ArgumentValue::TextList(vec!["NAA".into(), "Cr".into()])),
            "{'NAA', 'Cr'}"
        );
        assert_eq!(literal(&ArgumentValue::TextList(Vec::new())), "{}");
    }

    #[test]
    fn numeric_array_is_raveled_row_major() {
        let a = NumericArray::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(literal(&a.into()), "[1, 2, 3, 4, 5, 6]");
    }

    #[test]
    fn literal_is_deterministic() {
        let v = ArgumentValue::TextList(vec!["x'y".into(), "z".into()]);
        assert_eq!(literal(&v), literal(&v.clone()));
    }
}
