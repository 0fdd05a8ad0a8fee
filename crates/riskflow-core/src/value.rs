//! Value resolution helpers shared by the node executors.
//!
//! Everything here is total: lookups return `None` instead of failing, so
//! callers can chain fallbacks with `or_else`.

use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Path resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Split `a.b[0].c` into segments. `None` for malformed paths.
fn parse_path(path: &str) -> Option<Vec<Segment>> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }

    let mut segments = Vec::new();
    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if !key.is_empty() {
            segments.push(Segment::Key(key.to_string()));
        } else if rest.is_empty() {
            // empty segment, e.g. `a..b`
            return None;
        }
        while !rest.is_empty() {
            let inner = rest.strip_prefix('[')?;
            let close = inner.find(']')?;
            let index = inner[..close].trim().parse::<usize>().ok()?;
            segments.push(Segment::Index(index));
            rest = &inner[close + 1..];
        }
    }
    Some(segments)
}

fn step<'a>(current: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (current, segment) {
        (Value::Object(map), Segment::Key(key)) => map.get(key),
        (Value::Object(map), Segment::Index(i)) => map.get(&i.to_string()),
        (Value::Array(items), Segment::Index(i)) => items.get(*i),
        (Value::Array(items), Segment::Key(key)) => {
            key.parse::<usize>().ok().and_then(|i| items.get(i))
        }
        _ => None,
    }
}

/// Resolve a dot/bracket path (`flags.forceBlock`, `items[0].flag`) against a value.
pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = parse_path(path)?;
    segments.iter().try_fold(root, |current, segment| step(current, segment))
}

/// Resolve a dot/bracket path against an object's fields.
pub fn resolve_path_in<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let segments = parse_path(path)?;
    let (first, rest) = segments.split_first()?;
    let start = match first {
        Segment::Key(key) => root.get(key),
        Segment::Index(i) => root.get(&i.to_string()),
    }?;
    rest.iter().try_fold(start, |current, segment| step(current, segment))
}

/// Look a key up in a container: dot path when the key contains `.`,
/// direct property otherwise. Non-object containers yield `None`.
pub fn lookup_key<'a>(container: &'a Value, key: &str) -> Option<&'a Value> {
    let map = container.as_object()?;
    if key.contains('.') {
        resolve_path_in(map, key)
    } else {
        map.get(key)
    }
}

// ---------------------------------------------------------------------------
// Resolved parameter envelope
// ---------------------------------------------------------------------------

/// Field names that carry the effective value of a resolved parameter, in
/// lookup order.
pub const PARAM_VALUE_FIELDS: [&str; 3] = ["value", "currentValue", "effectiveValue"];

/// A raw value found in a parameter snapshot.
///
/// Parameter services sometimes return a bare value and sometimes a record
/// such as `{ "code": "...", "value": "HIGH", "updatedAt": "..." }`.
/// [`ResolvedParam::effective`] is the single place that unwraps it.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedParam<'a> {
    raw: &'a Value,
}

impl<'a> ResolvedParam<'a> {
    pub fn new(raw: &'a Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &'a Value {
        self.raw
    }

    /// The first non-null of `value`, `currentValue`, `effectiveValue` when
    /// the raw value is an object exposing one of them; the raw value otherwise.
    pub fn effective(&self) -> &'a Value {
        if let Value::Object(map) = self.raw {
            for field in PARAM_VALUE_FIELDS {
                if let Some(v) = map.get(field).filter(|v| !v.is_null()) {
                    return v;
                }
            }
        }
        self.raw
    }
}

// ---------------------------------------------------------------------------
// Coercions
// ---------------------------------------------------------------------------

/// A finite number from a JSON number or a numeric string.
pub fn as_finite_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Truthiness convention for blocker rules and `TRUTHY` rule checks.
///
/// - missing / null: false
/// - bool: itself
/// - number: finite and > 0
/// - string: false when empty, `false`, `0` or `none` (trimmed, any case)
/// - array: non-empty
/// - object: true
pub fn is_blocking(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f.is_finite() && f > 0.0),
        Some(Value::String(s)) => {
            let s = s.trim().to_lowercase();
            !(s.is_empty() || s == "false" || s == "0" || s == "none")
        }
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(_)) => true,
    }
}

/// Loose equality used by rule checks: numbers compare numerically,
/// everything else structurally.
pub fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Resolve `$.path` references in a template value against `scope`.
///
/// Strings of the form `$.a.b[0]` are replaced with the resolved value
/// (or null when missing); objects and arrays are walked recursively.
pub fn resolve_references(template: &Value, scope: &Map<String, Value>) -> Value {
    match template {
        Value::String(s) => match s.strip_prefix("$.") {
            Some(path) => resolve_path_in(scope, path).cloned().unwrap_or(Value::Null),
            None => template.clone(),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_references(item, scope))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_references(v, scope)))
                .collect(),
        ),
        other => other.clone(),
    }
}
