//! Argument classification for logging calls
//!
//! Every argument handed to the logger is classified once into an [`Arg`];
//! the ingestion pipeline, the console forwarding and the extra rendering all
//! match on that closed set instead of probing the value repeatedly.

use crate::cycle::stringify;
use crate::pretty::pretty_print;
use crate::types::ExtraItem;
use crate::value::Value;
use chrono::SecondsFormat;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Characters of markup text shown on the console before truncating
pub const DEFAULT_PREVIEW_LEN: usize = 80;

static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is a valid regex"));

static BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("blank line pattern is a valid regex"));

/// One classified argument of a logging call
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Undefined, null, booleans, numbers, strings, dates and patterns
    Primitive(Value),
    /// Error-like value with message and optional stack or source location
    Error(ErrorValue),
    /// Markup-like value exposing both its markup and its text content
    Markup(Markup),
    /// Arrays and objects
    Structured(Value),
}

impl Arg {
    /// Classify a dynamic value
    pub fn classify(value: Value) -> Self {
        if value.is_node() {
            Arg::Structured(value)
        } else {
            Arg::Primitive(value)
        }
    }

    /// Error-like argument built from a Rust error and its source chain
    pub fn error(err: &dyn std::error::Error) -> Self {
        Arg::Error(ErrorValue::from_error(err))
    }

    /// The undefined primitive
    pub fn undefined() -> Self {
        Arg::Primitive(Value::Undefined)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Arg::Primitive(Value::Undefined))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Primitive(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Plain-text form, as a console would print it
    pub fn display_string(&self) -> String {
        match self {
            Arg::Primitive(value) => display_primitive(value),
            Arg::Error(err) => err.long_form(),
            Arg::Markup(markup) => markup.text().to_string(),
            Arg::Structured(value) => stringify(value).unwrap_or_else(|| "undefined".to_string()),
        }
    }

    /// Rendering descriptor for the inspection panel
    pub fn to_extra(&self) -> ExtraItem {
        match self {
            Arg::Markup(markup) => ExtraItem::html(markup.html()),
            Arg::Primitive(value) | Arg::Structured(value) => ExtraItem::code(pretty_print(value)),
            Arg::Error(err) => ExtraItem::code(pretty_print(&Value::String(err.long_form()))),
        }
    }

    /// Copy of the argument as forwarded to the console
    ///
    /// Markup is shortened to its text preview; everything else is unchanged.
    pub fn console_form(&self, preview_len: usize) -> Arg {
        match self {
            Arg::Markup(markup) => Arg::Primitive(Value::String(markup.preview(preview_len))),
            other => other.clone(),
        }
    }
}

/// Display form of a primitive value
pub fn display_primitive(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => s.clone(),
        Value::Date(date) => date.to_rfc3339_opts(SecondsFormat::Millis, true),
        Value::Pattern(source) => format!("/{}/", source),
        Value::Array(_) | Value::Object(_) => {
            stringify(value).unwrap_or_else(|| "undefined".to_string())
        }
    }
}

/// Numbers print without a fraction when integral, and in exponent form
/// outside `[1e-6, 1e21)`
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        let text = format!("{:e}", n);
        match text.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{}e+{}", mantissa, exponent)
            }
            _ => text,
        }
    } else if n.fract() == 0.0 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

/// Turn literal `\n` escape sequences into real newlines
pub fn expand_newlines(s: &str) -> String {
    s.replace("\\n", "\n")
}

/// An error-like value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorValue {
    /// Error kind name, `"Error"` unless set
    pub name: String,
    pub message: String,
    /// Multi-line stack trace; its first line usually repeats the message
    pub stack: Option<String>,
    /// Source location reported instead of a stack
    pub source_url: Option<String>,
    pub line: Option<u32>,
}

impl ErrorValue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: "Error".to_string(),
            message: message.into(),
            stack: None,
            source_url: None,
            line: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_source(mut self, url: impl Into<String>, line: u32) -> Self {
        self.source_url = Some(url.into());
        self.line = Some(line);
        self
    }

    /// Build from a Rust error; the source chain becomes the stack
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        let message = err.to_string();
        let mut stack = format!("Error: {}", message);
        let mut source = err.source();
        while let Some(cause) = source {
            stack.push_str("\n    caused by: ");
            stack.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::new(message).with_stack(stack)
    }

    fn stack(&self) -> Option<&str> {
        self.stack.as_deref().filter(|stack| !stack.is_empty())
    }

    fn location(&self) -> Option<String> {
        self.source_url.as_ref().map(|url| match self.line {
            Some(line) => format!("{}\n{}:{}", self.message, url, line),
            None => format!("{}\n{}", self.message, url),
        })
    }

    /// Full form, stored as an extra argument
    pub fn long_form(&self) -> String {
        if let Some(stack) = self.stack() {
            if !self.message.is_empty() && !stack.contains(&self.message) {
                return format!("Error: {}\n{}", self.message, stack);
            }
            return stack.to_string();
        }
        self.location().unwrap_or_else(|| self.to_string())
    }

    /// One-line form, used as the record message
    pub fn short_form(&self) -> String {
        if let Some(stack) = self.stack() {
            let first = stack.lines().next().unwrap_or_default();
            if self.message.is_empty() || first.contains(&self.message) {
                return first.to_string();
            }
            return self.message.clone();
        }
        self.location().unwrap_or_else(|| self.to_string())
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// A markup fragment, as produced by a UI element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markup {
    html: String,
    text: String,
}

impl Markup {
    /// Wrap markup; the text content is derived by dropping tags
    pub fn new(html: impl Into<String>) -> Self {
        let html = html.into();
        let text = decode_entities(&TAG.replace_all(&html, ""));
        Self { html, text }
    }

    /// Wrap markup whose text content is already known
    pub fn with_text(html: impl Into<String>, text: impl Into<String>) -> Self {
        Self { html: html.into(), text: text.into() }
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text with blank-line runs collapsed, cut to `max_len` characters
    pub fn preview(&self, max_len: usize) -> String {
        let text = BLANK_LINES.replace_all(&self.text, "\n");
        if text.chars().count() > max_len {
            let mut cut: String = text.chars().take(max_len).collect();
            cut.push_str("...");
            cut
        } else {
            text.into_owned()
        }
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::classify(value)
    }
}

impl From<serde_json::Value> for Arg {
    fn from(json: serde_json::Value) -> Self {
        Arg::classify(Value::from(json))
    }
}

impl From<ErrorValue> for Arg {
    fn from(err: ErrorValue) -> Self {
        Arg::Error(err)
    }
}

impl From<Markup> for Arg {
    fn from(markup: Markup) -> Self {
        Arg::Markup(markup)
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Primitive(Value::from(s))
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Primitive(Value::String(s))
    }
}

impl From<&String> for Arg {
    fn from(s: &String) -> Self {
        Arg::Primitive(Value::String(s.clone()))
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Primitive(Value::Bool(b))
    }
}

impl From<f64> for Arg {
    fn from(n: f64) -> Self {
        Arg::Primitive(Value::Number(n))
    }
}

impl From<i32> for Arg {
    fn from(n: i32) -> Self {
        Arg::Primitive(Value::from(n))
    }
}

impl From<i64> for Arg {
    fn from(n: i64) -> Self {
        Arg::Primitive(Value::from(n))
    }
}

impl From<u32> for Arg {
    fn from(n: u32) -> Self {
        Arg::Primitive(Value::Number(f64::from(n)))
    }
}

impl From<u64> for Arg {
    fn from(n: u64) -> Self {
        Arg::Primitive(Value::from(n))
    }
}

impl From<usize> for Arg {
    fn from(n: usize) -> Self {
        Arg::Primitive(Value::Number(n as f64))
    }
}
