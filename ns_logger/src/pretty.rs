//! Highlighted, HTML-safe JSON rendering for the inspection panel

use crate::cycle::stringify_pretty;
use crate::value::Value;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static JSON_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^( *)("[A-Za-z0-9_]+": )?("[^"]*"|[A-Za-z0-9_.+-]*)?([,\[{])?$"#)
        .expect("json line pattern is a valid regex")
});

/// Render `value` as indented JSON wrapped in highlighting spans
///
/// The value is decycled first, so any graph can be printed. Keys are wrapped
/// in `<span class=json-key>`, string values in `<span class=json-string>`
/// and other values in `<span class=json-value>`. Escaped newlines inside
/// strings are expanded so multi-line text stays readable. Returns
/// `"undefined"` when the value has no JSON form.
pub fn pretty_print(value: &Value) -> String {
    let Some(json) = stringify_pretty(value) else {
        return "undefined".to_string();
    };

    let escaped = json
        .replace("\\n", "\n")
        .replace('&', "&amp;")
        .replace("\\\"", "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");

    JSON_LINE.replace_all(&escaped, highlight_line).into_owned()
}

fn highlight_line(caps: &Captures) -> String {
    let mut line = caps.get(1).map_or("", |m| m.as_str()).to_string();

    if let Some(key) = caps.get(2) {
        let bare: String = key.as_str().chars().filter(|c| !matches!(c, '"' | ':' | ' ')).collect();
        line.push_str("<span class=json-key>");
        line.push_str(&bare);
        line.push_str("</span>: ");
    }

    if let Some(value) = caps.get(3).filter(|m| !m.as_str().is_empty()) {
        let value = value.as_str();
        line.push_str(if value.starts_with('"') {
            "<span class=json-string>"
        } else {
            "<span class=json-value>"
        });
        line.push_str(value);
        line.push_str("</span>");
    }

    if let Some(end) = caps.get(4) {
        line.push_str(end.as_str());
    }
    line
}
