//! Simple selector matching for scoped queries
//!
//! Supports the forms the widget runtime actually queries with: a bare tag
//! name, `#id`, `.class`, `[attr]`, and `[attr="value"]`. Combinators are
//! deliberately out of scope; bind targets live inside a single widget's
//! rendered root and are addressed with one of these forms.

use indexmap::IndexMap;

/// A parsed selector
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// Matches by element tag name
    Tag(String),
    /// Matches by `id` attribute
    Id(String),
    /// Matches when the `class` attribute contains the name
    Class(String),
    /// Matches by attribute presence, or by exact attribute value
    Attribute {
        name: String,
        value: Option<String>,
    },
}

impl Selector {
    /// Parse a selector string; `None` when the text fits no supported form
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Some(id) = text.strip_prefix('#') {
            return (!id.is_empty()).then(|| Selector::Id(id.to_string()));
        }
        if let Some(class) = text.strip_prefix('.') {
            return (!class.is_empty()).then(|| Selector::Class(class.to_string()));
        }
        if let Some(body) = text.strip_prefix('[') {
            let body = body.strip_suffix(']')?;
            return match body.split_once('=') {
                Some((name, value)) => {
                    let value = value.strip_prefix('"')?.strip_suffix('"')?;
                    Some(Selector::Attribute {
                        name: name.to_string(),
                        value: Some(value.to_string()),
                    })
                }
                None => Some(Selector::Attribute {
                    name: body.to_string(),
                    value: None,
                }),
            };
        }
        Some(Selector::Tag(text.to_string()))
    }

    /// Whether an element with the given tag and attributes matches
    pub(crate) fn matches(&self, tag: &str, attributes: &IndexMap<String, String>) -> bool {
        match self {
            Selector::Tag(name) => tag == name,
            Selector::Id(id) => attributes.get("id").is_some_and(|v| v == id),
            Selector::Class(class) => attributes
                .get("class")
                .is_some_and(|v| v.split_whitespace().any(|c| c == class)),
            Selector::Attribute { name, value } => match value {
                Some(value) => attributes.get(name).is_some_and(|v| v == value),
                None => attributes.contains_key(name),
            },
        }
    }
}
