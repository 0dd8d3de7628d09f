//! Type coercion between attribute text and typed property values
//!
//! Observed attributes arrive as text; each declared property names a
//! [`PropKind`] that turns that text into a [`PropValue`] (and back, for
//! property-to-attribute synchronization). Coercion failures carry the raw
//! input so an attribute-change transition can report exactly what it
//! rejected.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ConvertError;

/// The coercion kinds a property can declare
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropKind {
    /// Attribute text taken verbatim
    String,
    /// Floating-point number
    Number,
    /// Exactly `true` or `false`
    Boolean,
    /// A structured literal, parsed as JSON
    Object,
    /// A single-expression callable definition, e.g. `(x, y) => x + y`
    Function,
}

impl PropKind {
    /// Coerce raw attribute text into a typed value
    pub fn process(&self, raw: &str) -> Result<PropValue, ConvertError> {
        match self {
            PropKind::String => Ok(PropValue::String(raw.to_string())),
            PropKind::Number => raw
                .trim()
                .parse::<f64>()
                .map(PropValue::Number)
                .map_err(|_| ConvertError::NotANumber {
                    raw: raw.to_string(),
                }),
            PropKind::Boolean => match raw {
                "true" => Ok(PropValue::Boolean(true)),
                "false" => Ok(PropValue::Boolean(false)),
                _ => Err(ConvertError::NotABoolean {
                    raw: raw.to_string(),
                }),
            },
            PropKind::Object => serde_json::from_str(raw)
                .map(PropValue::Object)
                .map_err(|_| ConvertError::NotAnObject {
                    raw: raw.to_string(),
                }),
            PropKind::Function => FnExpr::parse(raw).map(PropValue::Function),
        }
    }
}

/// A typed property value
#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Object(serde_json::Value),
    Function(FnExpr),
}

impl PropValue {
    /// The attribute-text form of the value, used when a property write is
    /// synchronized back onto the host attribute
    pub fn to_attr_text(&self) -> String {
        match self {
            PropValue::String(s) => s.clone(),
            PropValue::Number(n) => format!("{n}"),
            PropValue::Boolean(b) => b.to_string(),
            PropValue::Object(v) => serde_json::to_string(v).unwrap_or_default(),
            PropValue::Function(f) => f.source().to_string(),
        }
    }

    /// The kind this value round-trips through
    pub fn kind(&self) -> PropKind {
        match self {
            PropValue::String(_) => PropKind::String,
            PropValue::Number(_) => PropKind::Number,
            PropValue::Boolean(_) => PropKind::Boolean,
            PropValue::Object(_) => PropKind::Object,
            PropValue::Function(_) => PropKind::Function,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            PropValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&serde_json::Value> {
        match self {
            PropValue::Object(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FnExpr> {
        match self {
            PropValue::Function(f) => Some(f),
            _ => None,
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::String(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::String(s)
    }
}

impl From<f64> for PropValue {
    fn from(n: f64) -> Self {
        PropValue::Number(n)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Boolean(b)
    }
}

impl From<serde_json::Value> for PropValue {
    fn from(v: serde_json::Value) -> Self {
        PropValue::Object(v)
    }
}

/// A validated single-expression callable definition
///
/// Accepted forms are `ident => expr` and `(a, b) => expr` with a
/// non-block, single-expression body. The definition is retained as data
/// (parameters, body, original source); nothing is evaluated.
#[derive(Clone, Debug, PartialEq)]
pub struct FnExpr {
    params: Vec<String>,
    body: String,
    source: String,
}

fn arrow_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(?:\(\s*(?P<list>[^)]*?)\s*\)|(?P<single>[A-Za-z_$][\w$]*))\s*=>\s*(?P<body>\S.*)$")
            .unwrap()
    })
}

fn ident_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_$][\w$]*$").unwrap())
}

impl FnExpr {
    /// Validate and parse a callable definition
    pub fn parse(raw: &str) -> Result<Self, ConvertError> {
        let reject = || ConvertError::NotAFunction {
            raw: raw.to_string(),
        };
        let captures = arrow_pattern().captures(raw).ok_or_else(reject)?;

        let params = match captures.name("single") {
            Some(single) => vec![single.as_str().to_string()],
            None => {
                let list = captures.name("list").map(|m| m.as_str()).unwrap_or("");
                if list.trim().is_empty() {
                    Vec::new()
                } else {
                    let params: Vec<String> =
                        list.split(',').map(|p| p.trim().to_string()).collect();
                    if !params.iter().all(|p| ident_pattern().is_match(p)) {
                        return Err(reject());
                    }
                    params
                }
            }
        };

        let body = captures["body"].trim().to_string();
        // block bodies and statement sequences are not single expressions
        if body.starts_with('{') || body.contains(';') {
            return Err(reject());
        }

        Ok(Self {
            params,
            body,
            source: raw.to_string(),
        })
    }

    /// Parameter names, in declaration order
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// The expression body text
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The original source text
    pub fn source(&self) -> &str {
        &self.source
    }
}
