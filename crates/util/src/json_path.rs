//! Dotted JSON path language used by locators, selectors, write-only
//! attributes and output filters.
//!
//! Supported syntax:
//!
//! - `a.b.c` object keys; `\.`, `\*`, `\?`, `\#` escape special characters.
//! - `items.0` numeric array indices.
//! - `items.#.name` splat over every array element; a trailing `#` yields the
//!   array length.
//! - `a*`, `na?e` key wildcards (first matching key on reads).
//! - `items.#(name=="x")` first element matching a condition, and
//!   `items.#(age>30)#` every matching element. Operators: `==`, `!=`, `<`,
//!   `<=`, `>`, `>=`, `%` (glob match) and `!%`. `#(field)` tests presence.
//!
//! The empty path addresses the whole document.

use std::{cmp::Ordering, fmt};

use serde_json::{Map, Value};

use crate::error::PathError;

/// A parsed JSON path.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    raw: String,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Object key, or array index when the key is numeric.
    Key(String),
    /// Object key glob with `*` and `?`; escapes are kept in the pattern.
    Wildcard(String),
    /// `#`: every array element.
    Splat,
    /// `#(...)` or `#(...)#`.
    Query(Box<Query>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    field: JsonPath,
    condition: Option<(Comparison, Value)>,
    all: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
}

/// A path made only of plain keys; the result of expanding wildcards against
/// a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConcretePath {
    keys: Vec<String>,
}

impl JsonPath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let chars: Vec<char> = raw.chars().collect();
        let mut steps = Vec::new();
        let mut position = 0;
        while position < chars.len() {
            let (step, end) = parse_step(raw, &chars, position)?;
            steps.push(step);
            if end >= chars.len() {
                break;
            }
            position = end + 1;
            if position >= chars.len() {
                return Err(PathError::syntax(raw, "path ends with '.'"));
            }
        }
        Ok(Self {
            raw: raw.to_string(),
            steps,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The path as plain keys, when it contains no wildcard, splat or query.
    pub fn as_concrete(&self) -> Option<ConcretePath> {
        self.steps
            .iter()
            .map(|step| match step {
                Step::Key(key) => Some(key.clone()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(|keys| ConcretePath { keys })
    }

    /// Value at this path. Splats and `#(...)#` queries collect their matches
    /// into an array.
    pub fn get(&self, document: &Value) -> Option<Value> {
        get_steps(document, &self.steps)
    }

    pub fn exists(&self, document: &Value) -> bool {
        self.get(document).is_some()
    }

    /// Remove every location this path matches. Returns whether anything was
    /// removed.
    pub fn delete(&self, document: &mut Value) -> bool {
        delete_steps(document, &self.steps)
    }

    /// Write `value` at this path, creating intermediate containers.
    pub fn set(&self, document: &mut Value, value: Value) -> Result<(), PathError> {
        let concrete = self.as_concrete().ok_or_else(|| PathError::NotConcrete {
            path: self.raw.clone(),
        })?;
        concrete.set(document, value);
        Ok(())
    }

    /// Expand splats, wildcards and queries against `document` into the
    /// concrete locations they match. Locations that do not exist are skipped.
    pub fn concrete_paths(&self, document: &Value) -> Vec<ConcretePath> {
        let mut found = Vec::new();
        collect_concrete(document, &self.steps, &mut Vec::new(), &mut found);
        found
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for JsonPath {
    type Err = PathError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl ConcretePath {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn get<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.keys.iter().try_fold(document, |value, key| child(value, key))
    }

    /// Write `value`, replacing scalars in the way with containers. Numeric
    /// keys create arrays padded with nulls.
    pub fn set(&self, document: &mut Value, value: Value) {
        let keys: Vec<&str> = self.keys.iter().map(String::as_str).collect();
        set_keys(document, &keys, value);
    }
}

impl fmt::Display for ConcretePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let escaped: Vec<String> = self.keys.iter().map(|key| escape_key(key)).collect();
        f.write_str(&escaped.join("."))
    }
}

impl From<ConcretePath> for JsonPath {
    fn from(path: ConcretePath) -> Self {
        Self {
            raw: path.to_string(),
            steps: path.keys.into_iter().map(Step::Key).collect(),
        }
    }
}

/// Escape a literal key so it parses back as a single [`Step::Key`].
pub fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for ch in key.chars() {
        if matches!(ch, '.' | '*' | '?' | '\\' | '#') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// gjson-style string form of a value: strings unquoted, `null` empty,
/// containers as compact JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Glob match with `*` and `?`; a backslash makes the next character literal.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern = glob_tokens(pattern);
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut resume: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p) {
            Some(GlobToken::Star) => {
                resume = Some((p, t));
                p += 1;
            }
            Some(GlobToken::One) => {
                p += 1;
                t += 1;
            }
            Some(GlobToken::Literal(expected)) if *expected == text[t] => {
                p += 1;
                t += 1;
            }
            _ => {
                let Some((star, consumed)) = resume else {
                    return false;
                };
                p = star + 1;
                t = consumed + 1;
                resume = Some((star, consumed + 1));
            }
        }
    }
    pattern[p..].iter().all(|token| *token == GlobToken::Star)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlobToken {
    Star,
    One,
    Literal(char),
}

fn glob_tokens(pattern: &str) -> Vec<GlobToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        tokens.push(match ch {
            '*' => GlobToken::Star,
            '?' => GlobToken::One,
            '\\' => GlobToken::Literal(chars.next().unwrap_or('\\')),
            other => GlobToken::Literal(other),
        });
    }
    tokens
}

fn parse_step(raw: &str, chars: &[char], start: usize) -> Result<(Step, usize), PathError> {
    if chars[start] == '#' && chars.get(start + 1) == Some(&'(') {
        let close = find_closing_paren(raw, chars, start + 1)?;
        let body: String = chars[start + 2..close].iter().collect();
        let mut end = close + 1;
        let all = chars.get(end) == Some(&'#');
        if all {
            end += 1;
        }
        if end < chars.len() && chars[end] != '.' {
            return Err(PathError::syntax(raw, "expected '.' after query"));
        }
        let query = parse_query(raw, &body, all)?;
        return Ok((Step::Query(Box::new(query)), end));
    }

    let mut key = String::new();
    let mut pattern = String::new();
    let mut wildcard = false;
    let mut position = start;
    while position < chars.len() {
        match chars[position] {
            '\\' => {
                let Some(&escaped) = chars.get(position + 1) else {
                    return Err(PathError::syntax(raw, "dangling escape"));
                };
                key.push(escaped);
                pattern.push('\\');
                pattern.push(escaped);
                position += 2;
            }
            '.' => break,
            ch => {
                if ch == '*' || ch == '?' {
                    wildcard = true;
                }
                key.push(ch);
                pattern.push(ch);
                position += 1;
            }
        }
    }

    if position == start {
        return Err(PathError::syntax(raw, "empty path segment"));
    }
    let segment_is_bare_hash = position == start + 1 && chars[start] == '#';
    let step = if segment_is_bare_hash {
        Step::Splat
    } else if wildcard {
        Step::Wildcard(pattern)
    } else {
        Step::Key(key)
    };
    Ok((step, position))
}

fn find_closing_paren(raw: &str, chars: &[char], open: usize) -> Result<usize, PathError> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut position = open;
    while position < chars.len() {
        match chars[position] {
            '\\' if in_string => position += 1,
            '"' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Ok(position);
                }
            }
            _ => {}
        }
        position += 1;
    }
    Err(PathError::syntax(raw, "unterminated query"))
}

const OPERATORS: [(&str, Comparison); 9] = [
    ("==", Comparison::Eq),
    ("!=", Comparison::Ne),
    ("<=", Comparison::Le),
    (">=", Comparison::Ge),
    ("!%", Comparison::NotLike),
    ("<", Comparison::Lt),
    (">", Comparison::Gt),
    ("%", Comparison::Like),
    ("=", Comparison::Eq),
];

fn parse_query(raw: &str, body: &str, all: bool) -> Result<Query, PathError> {
    let Some(operator_start) = find_operator(body) else {
        let field = JsonPath::parse(body.trim())?;
        return Ok(Query {
            field,
            condition: None,
            all,
        });
    };
    let rest = &body[operator_start..];
    let Some((symbol, comparison)) = OPERATORS.iter().find(|(symbol, _)| rest.starts_with(symbol)) else {
        return Err(PathError::syntax(raw, "unknown query operator"));
    };
    let field = JsonPath::parse(body[..operator_start].trim())?;
    let literal = rest[symbol.len()..].trim();
    if literal.is_empty() {
        return Err(PathError::syntax(raw, "query is missing a value"));
    }
    let expected = serde_json::from_str::<Value>(literal).unwrap_or_else(|_| Value::String(literal.to_string()));
    Ok(Query {
        field,
        condition: Some((*comparison, expected)),
        all,
    })
}

fn find_operator(body: &str) -> Option<usize> {
    let mut escaped = false;
    let mut depth = 0usize;
    for (index, ch) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '=' | '!' | '<' | '>' | '%' if depth == 0 => return Some(index),
            _ => {}
        }
    }
    None
}

impl Query {
    fn matches(&self, item: &Value) -> bool {
        let Some(actual) = self.field.get(item) else {
            return false;
        };
        match &self.condition {
            None => true,
            Some((comparison, expected)) => comparison.evaluate(&actual, expected),
        }
    }
}

impl Comparison {
    fn evaluate(self, actual: &Value, expected: &Value) -> bool {
        match (actual, expected) {
            (Value::String(actual), Value::String(expected)) => match self {
                Self::Like => glob_match(expected, actual),
                Self::NotLike => !glob_match(expected, actual),
                _ => self.holds(actual.as_str().cmp(expected.as_str())),
            },
            (Value::Number(actual), Value::Number(expected)) => {
                let (Some(actual), Some(expected)) = (actual.as_f64(), expected.as_f64()) else {
                    return false;
                };
                actual.partial_cmp(&expected).is_some_and(|ordering| self.holds(ordering))
            }
            (actual, expected) => match self {
                Self::Eq => actual == expected,
                Self::Ne => actual != expected,
                _ => false,
            },
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Like | Self::NotLike => false,
        }
    }
}

fn child<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    }
}

fn child_mut<'a>(value: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|index| items.get_mut(index)),
        _ => None,
    }
}

fn get_steps(value: &Value, steps: &[Step]) -> Option<Value> {
    let Some((step, rest)) = steps.split_first() else {
        return Some(value.clone());
    };
    match step {
        Step::Key(key) => child(value, key).and_then(|child| get_steps(child, rest)),
        Step::Wildcard(pattern) => {
            let Value::Object(map) = value else {
                return None;
            };
            map.iter()
                .find(|(key, _)| glob_match(pattern, key))
                .and_then(|(_, child)| get_steps(child, rest))
        }
        Step::Splat => {
            let Value::Array(items) = value else {
                return None;
            };
            if rest.is_empty() {
                return Some(Value::from(items.len()));
            }
            Some(Value::Array(items.iter().filter_map(|item| get_steps(item, rest)).collect()))
        }
        Step::Query(query) => {
            let Value::Array(items) = value else {
                return None;
            };
            if query.all {
                let selected = items
                    .iter()
                    .filter(|item| query.matches(item))
                    .filter_map(|item| get_steps(item, rest))
                    .collect();
                Some(Value::Array(selected))
            } else {
                items
                    .iter()
                    .find(|item| query.matches(item))
                    .and_then(|item| get_steps(item, rest))
            }
        }
    }
}

fn delete_steps(value: &mut Value, steps: &[Step]) -> bool {
    let Some((step, rest)) = steps.split_first() else {
        return false;
    };
    if rest.is_empty() {
        return remove_matches(value, step);
    }
    match step {
        Step::Key(key) => child_mut(value, key).is_some_and(|child| delete_steps(child, rest)),
        Step::Wildcard(pattern) => {
            let Value::Object(map) = value else {
                return false;
            };
            let mut removed = false;
            for (key, child) in map.iter_mut() {
                if glob_match(pattern, key) {
                    removed |= delete_steps(child, rest);
                }
            }
            removed
        }
        Step::Splat => {
            let Value::Array(items) = value else {
                return false;
            };
            let mut removed = false;
            for item in items.iter_mut() {
                removed |= delete_steps(item, rest);
            }
            removed
        }
        Step::Query(query) => {
            let Value::Array(items) = value else {
                return false;
            };
            let mut removed = false;
            for item in items.iter_mut() {
                if query.matches(item) {
                    removed |= delete_steps(item, rest);
                    if !query.all {
                        break;
                    }
                }
            }
            removed
        }
    }
}

fn remove_matches(value: &mut Value, step: &Step) -> bool {
    match (value, step) {
        (Value::Object(map), Step::Key(key)) => map.shift_remove(key).is_some(),
        (Value::Array(items), Step::Key(key)) => match key.parse::<usize>() {
            Ok(index) if index < items.len() => {
                items.remove(index);
                true
            }
            _ => false,
        },
        (Value::Object(map), Step::Wildcard(pattern)) => {
            let before = map.len();
            map.retain(|key, _| !glob_match(pattern, key));
            map.len() != before
        }
        (Value::Array(items), Step::Query(query)) => {
            let before = items.len();
            if query.all {
                items.retain(|item| !query.matches(item));
            } else if let Some(index) = items.iter().position(|item| query.matches(item)) {
                items.remove(index);
            }
            items.len() != before
        }
        _ => false,
    }
}

fn set_keys(target: &mut Value, keys: &[&str], value: Value) {
    let Some((key, rest)) = keys.split_first() else {
        *target = value;
        return;
    };
    let index = key.parse::<usize>().ok();
    let needs_container = match (&*target, index) {
        (Value::Object(_), _) => false,
        (Value::Array(_), Some(_)) => false,
        _ => true,
    };
    if needs_container {
        *target = if index.is_some() {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        };
    }
    let slot = match target {
        Value::Object(map) => map.entry(key.to_string()).or_insert(Value::Null),
        Value::Array(items) => {
            let Some(index) = index else {
                return;
            };
            if items.len() <= index {
                items.resize(index + 1, Value::Null);
            }
            &mut items[index]
        }
        _ => return,
    };
    set_keys(slot, rest, value);
}

fn collect_concrete(value: &Value, steps: &[Step], prefix: &mut Vec<String>, found: &mut Vec<ConcretePath>) {
    let Some((step, rest)) = steps.split_first() else {
        found.push(ConcretePath::new(prefix.clone()));
        return;
    };
    let descend = |key: String, child: &Value, prefix: &mut Vec<String>, found: &mut Vec<ConcretePath>| {
        prefix.push(key);
        collect_concrete(child, rest, prefix, found);
        prefix.pop();
    };
    match (value, step) {
        (_, Step::Key(key)) => {
            if let Some(next) = child(value, key) {
                descend(key.clone(), next, prefix, found);
            }
        }
        (Value::Object(map), Step::Wildcard(pattern)) => {
            for (key, next) in map.iter().filter(|(key, _)| glob_match(pattern, key)) {
                descend(key.clone(), next, prefix, found);
            }
        }
        (Value::Array(items), Step::Splat) => {
            for (index, next) in items.iter().enumerate() {
                descend(index.to_string(), next, prefix, found);
            }
        }
        (Value::Array(items), Step::Query(query)) => {
            for (index, next) in items.iter().enumerate().filter(|(_, item)| query.matches(item)) {
                descend(index.to_string(), next, prefix, found);
                if !query.all {
                    break;
                }
            }
        }
        _ => {}
    }
}
