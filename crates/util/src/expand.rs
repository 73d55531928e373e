//! URL template expansion.
//!
//! Templates mix literal text with references:
//!
//! - `$(path)` the resource's configured path, verbatim.
//! - `$(body.a.b)` the value at `a.b` in the body, path-escaped. Absent
//!   values are an error.
//! - `#(body.self)` the value with the base URL stripped, for servers that
//!   return self links.
//! - `$url_path.trim_path(body.self)` functions applied left to right to the
//!   raw (unescaped) value.
//!
//! `#` not followed by `(` is literal text; any other `$` is an error.

use serde_json::Value;

use crate::{
    error::PathError,
    http::{
        decode_path_segment, decode_query_value, encode_path_segment, encode_query_value, last_segment,
        strip_base_url, trim_base_path, url_path,
    },
    json_path::{JsonPath, value_to_string},
};

/// Values a template is expanded against, besides the body.
#[derive(Debug, Clone, Copy)]
pub struct ExpandContext<'a> {
    /// The resource's configured path, substituted for `$(path)`.
    pub path: &'a str,
    /// The provider base URL, stripped by `#(...)` and `trim_path`.
    pub base_url: &'a str,
}

impl<'a> ExpandContext<'a> {
    pub fn new(path: &'a str, base_url: &'a str) -> Self {
        Self { path, base_url }
    }
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    raw: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Reference(Reference),
}

#[derive(Debug, Clone, PartialEq)]
struct Reference {
    source: String,
    strip_base: bool,
    functions: Vec<Function>,
    target: Target,
}

#[derive(Debug, Clone, PartialEq)]
enum Target {
    Path,
    Body(Option<JsonPath>),
}

/// Functions usable in `$f1.f2(...)` chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Escape,
    Unescape,
    QueryEscape,
    QueryUnescape,
    Base,
    UrlPath,
    TrimPath,
}

impl Function {
    fn from_name(name: &str) -> Result<Self, PathError> {
        match name {
            "escape" => Ok(Self::Escape),
            "unescape" => Ok(Self::Unescape),
            "query_escape" => Ok(Self::QueryEscape),
            "query_unescape" => Ok(Self::QueryUnescape),
            "base" => Ok(Self::Base),
            "url_path" => Ok(Self::UrlPath),
            "trim_path" => Ok(Self::TrimPath),
            other => Err(PathError::UnknownFunction { name: other.to_string() }),
        }
    }

    fn apply(self, value: &str, base_url: &str) -> String {
        match self {
            Self::Escape => encode_path_segment(value),
            Self::Unescape => decode_path_segment(value),
            Self::QueryEscape => encode_query_value(value),
            Self::QueryUnescape => decode_query_value(value),
            Self::Base => last_segment(value),
            Self::UrlPath => url_path(value),
            Self::TrimPath => trim_base_path(&strip_base_url(value, base_url), base_url),
        }
    }
}

impl Template {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = raw;

        while let Some(index) = rest.find(['$', '#']) {
            literal.push_str(&rest[..index]);
            let sigil = rest.as_bytes()[index];
            let after = &rest[index + 1..];

            let (strip_base, functions, after_functions) = if sigil == b'#' {
                if !after.starts_with('(') {
                    literal.push('#');
                    rest = after;
                    continue;
                }
                (true, Vec::new(), after)
            } else if after.starts_with('(') {
                (false, Vec::new(), after)
            } else {
                let Some(open) = after.find('(') else {
                    return Err(PathError::template(raw, "'$' must be followed by '(' or a function chain"));
                };
                let chain = &after[..open];
                if chain.is_empty() || !chain.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.') {
                    return Err(PathError::template(raw, format!("unknown prefix '${chain}'")));
                }
                let functions = chain.split('.').map(Function::from_name).collect::<Result<Vec<_>, _>>()?;
                (false, functions, &after[open..])
            };

            let close = find_closing_paren(after_functions)
                .ok_or_else(|| PathError::template(raw, "unterminated reference"))?;
            let source = after_functions[1..close].trim().to_string();
            let target = parse_target(raw, &source)?;

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Reference(Reference {
                source,
                strip_base,
                functions,
                target,
            }));
            rest = &after_functions[close + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Expand into a URL or path. `$(body.x)` values are path-escaped.
    pub fn render(&self, context: &ExpandContext<'_>, body: &Value) -> Result<String, PathError> {
        self.render_with(context, body, true)
    }

    /// Expand without escaping plain `$(body.x)` values.
    pub fn render_raw(&self, context: &ExpandContext<'_>, body: &Value) -> Result<String, PathError> {
        self.render_with(context, body, false)
    }

    fn render_with(&self, context: &ExpandContext<'_>, body: &Value, escape_body: bool) -> Result<String, PathError> {
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Reference(reference) => output.push_str(&reference.render(context, body, escape_body)?),
            }
        }
        Ok(output)
    }

    /// The sole body reference when the template is exactly `$(body.x)`.
    fn sole_body_reference(&self) -> Option<&Reference> {
        match self.segments.as_slice() {
            [Segment::Reference(reference)]
                if !reference.strip_base
                    && reference.functions.is_empty()
                    && matches!(reference.target, Target::Body(_)) =>
            {
                Some(reference)
            }
            _ => None,
        }
    }
}

impl Reference {
    fn raw_value(&self, context: &ExpandContext<'_>, body: &Value) -> Result<String, PathError> {
        match &self.target {
            Target::Path => Ok(context.path.to_string()),
            Target::Body(path) => self.json_value(body).map(|value| value_to_string(&value)).ok_or_else(|| {
                PathError::Missing {
                    reference: path.as_ref().map_or_else(|| "body".to_string(), |path| format!("body.{path}")),
                }
            }),
        }
    }

    fn json_value(&self, body: &Value) -> Option<Value> {
        match &self.target {
            Target::Path => None,
            Target::Body(None) => (!body.is_null()).then(|| body.clone()),
            Target::Body(Some(path)) => path.get(body),
        }
    }

    fn render(&self, context: &ExpandContext<'_>, body: &Value, escape_body: bool) -> Result<String, PathError> {
        let raw = self.raw_value(context, body)?;
        if self.strip_base {
            return Ok(strip_base_url(&raw, context.base_url));
        }
        if self.functions.is_empty() {
            let escape = escape_body && matches!(self.target, Target::Body(_));
            return Ok(if escape { encode_path_segment(&raw) } else { raw });
        }
        Ok(self
            .functions
            .iter()
            .fold(raw, |value, function| function.apply(&value, context.base_url)))
    }
}

fn parse_target(raw: &str, source: &str) -> Result<Target, PathError> {
    match source {
        "path" => Ok(Target::Path),
        "body" => Ok(Target::Body(None)),
        other => match other.strip_prefix("body.") {
            Some(path) => Ok(Target::Body(Some(JsonPath::parse(path)?))),
            None => Err(PathError::template(raw, format!("unknown reference '{other}'"))),
        },
    }
}

/// Index of the `)` matching the `(` at the start of `text`, skipping quoted
/// strings and nested queries.
fn find_closing_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (index, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse and expand `template` in one step.
pub fn expand(template: &str, context: &ExpandContext<'_>, body: &Value) -> Result<String, PathError> {
    Template::parse(template)?.render(context, body)
}

/// Check that `template` parses, without evaluating it.
pub fn validate_template(template: &str) -> Result<(), PathError> {
    Template::parse(template).map(|_| ())
}

/// Render a JSON template against `body`.
///
/// String values that are exactly `$(body.x)` are replaced by the referenced
/// JSON value (`null` when absent); other strings have their references
/// replaced by the unescaped string form. Keys are left untouched.
pub fn render_json_template(template: &str, context: &ExpandContext<'_>, body: &Value) -> Result<Value, PathError> {
    let document: Value = serde_json::from_str(template)
        .map_err(|error| PathError::template(template, format!("not valid JSON: {error}")))?;
    render_json_value(document, context, body)
}

/// Render every string inside `value` as in [`render_json_template`].
pub fn render_json_value(value: Value, context: &ExpandContext<'_>, body: &Value) -> Result<Value, PathError> {
    match value {
        Value::String(text) => {
            let template = Template::parse(&text)?;
            if let Some(reference) = template.sole_body_reference() {
                return Ok(reference.json_value(body).unwrap_or(Value::Null));
            }
            Ok(Value::String(template.render_raw(context, body)?))
        }
        Value::Array(items) => items
            .into_iter()
            .map(|item| render_json_value(item, context, body))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut rendered = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                rendered.insert(key, render_json_value(item, context, body)?);
            }
            Ok(Value::Object(rendered))
        }
        scalar => Ok(scalar),
    }
}
