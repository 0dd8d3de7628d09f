//! Markup text parsing
//!
//! Widgets produce their rendered content as markup text; the document
//! turns that text into a subtree via [`parse_fragment`]. The grammar is
//! the small HTML-like subset widget renderers actually emit: nested
//! elements, double-quoted attributes (including `@event` binding
//! attributes), text with entity escapes, comments, and self-closing or
//! void tags. No doctypes, no CDATA, no implicit tag closing.

use crate::error::{DomError, Result};

/// A parsed markup node, before it is grafted into a document
#[derive(Clone, Debug, PartialEq)]
pub enum MarkupNode {
    /// An element with its attributes in source order
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        children: Vec<MarkupNode>,
    },
    /// A run of character data, entity-decoded
    Text(String),
}

/// Tags that never have children and need no closing tag
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Parse a markup fragment into a list of sibling nodes
///
/// Returns an error describing the byte position of the first construct
/// that could not be parsed; nothing is partially returned on failure.
pub fn parse_fragment(input: &str) -> Result<Vec<MarkupNode>> {
    let mut parser = Parser { input, pos: 0 };
    let nodes = parser.parse_nodes()?;
    if parser.pos < parser.input.len() {
        // parse_nodes only stops early at a closing tag
        return Err(parser.error("unexpected closing tag"));
    }
    Ok(nodes)
}

/// Whether a tag serializes without children or a closing tag
pub(crate) fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Escape character data for reserialization
pub(crate) fn escape_text(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// Escape an attribute value for reserialization inside double quotes
pub(crate) fn escape_attribute(value: &str) -> String {
    html_escape::encode_double_quoted_attribute(value).into_owned()
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> DomError {
        DomError::MarkupParse {
            position: self.pos,
            message: message.into(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, prefix: &str) -> bool {
        if self.rest().starts_with(prefix) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.bump();
        }
    }

    /// Parse siblings until end of input or a closing tag
    fn parse_nodes(&mut self) -> Result<Vec<MarkupNode>> {
        let mut nodes = Vec::new();
        loop {
            if self.rest().is_empty() || self.rest().starts_with("</") {
                return Ok(nodes);
            }
            if self.eat("<!--") {
                match self.rest().find("-->") {
                    Some(end) => self.pos += end + 3,
                    None => return Err(self.error("unterminated comment")),
                }
                continue;
            }
            if self.rest().starts_with('<') {
                nodes.push(self.parse_element()?);
            } else if let Some(text) = self.parse_text() {
                nodes.push(text);
            }
        }
    }

    fn parse_text(&mut self) -> Option<MarkupNode> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c != '<') {
            self.bump();
        }
        let raw = &self.input[start..self.pos];
        if raw.is_empty() {
            return None;
        }
        Some(MarkupNode::Text(
            html_escape::decode_html_entities(raw).into_owned(),
        ))
    }

    fn parse_element(&mut self) -> Result<MarkupNode> {
        if !self.eat("<") {
            return Err(self.error("expected '<'"));
        }
        let tag = self.parse_name()?;
        let attributes = self.parse_attributes()?;

        if self.eat("/>") {
            return Ok(MarkupNode::Element {
                tag,
                attributes,
                children: Vec::new(),
            });
        }
        if !self.eat(">") {
            return Err(self.error(format!("malformed start tag <{tag}>")));
        }
        if VOID_TAGS.contains(&tag.as_str()) {
            return Ok(MarkupNode::Element {
                tag,
                attributes,
                children: Vec::new(),
            });
        }

        let children = self.parse_nodes()?;

        if !self.eat("</") {
            return Err(self.error(format!("missing closing tag for <{tag}>")));
        }
        let closing = self.parse_name()?;
        if closing != tag {
            return Err(self.error(format!("mismatched closing tag </{closing}> for <{tag}>")));
        }
        self.skip_whitespace();
        if !self.eat(">") {
            return Err(self.error(format!("malformed closing tag </{closing}>")));
        }

        Ok(MarkupNode::Element {
            tag,
            attributes,
            children,
        })
    }

    /// Tag or attribute name: anything up to whitespace or tag punctuation
    fn parse_name(&mut self) -> Result<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && !matches!(c, '=' | '>' | '/' | '<' | '"'))
        {
            self.bump();
        }
        if self.pos == start {
            return Err(self.error("expected a name"));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_attributes(&mut self) -> Result<Vec<(String, String)>> {
        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error("unterminated start tag")),
                Some('>') | Some('/') => return Ok(attributes),
                _ => {}
            }
            let name = self.parse_name()?;
            let value = if self.eat("=") {
                if !self.eat("\"") {
                    return Err(self.error(format!("attribute {name} value must be double-quoted")));
                }
                let start = self.pos;
                while self.peek().is_some_and(|c| c != '"') {
                    self.bump();
                }
                let raw = &self.input[start..self.pos];
                if !self.eat("\"") {
                    return Err(self.error(format!("unterminated value for attribute {name}")));
                }
                html_escape::decode_html_entities(raw).into_owned()
            } else {
                String::new()
            };
            attributes.push((name, value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(node: &MarkupNode) -> (&str, &[(String, String)], &[MarkupNode]) {
        match node {
            MarkupNode::Element {
                tag,
                attributes,
                children,
            } => (tag.as_str(), attributes.as_slice(), children.as_slice()),
            MarkupNode::Text(_) => panic!("expected element, got text"),
        }
    }

    #[test]
    fn test_parse_nested_elements() {
        let nodes = parse_fragment("<div><span>hi</span><b>there</b></div>").unwrap();
        assert_eq!(nodes.len(), 1);
        let (tag, _, children) = element(&nodes[0]);
        assert_eq!(tag, "div");
        assert_eq!(children.len(), 2);
        let (span, _, span_children) = element(&children[0]);
        assert_eq!(span, "span");
        assert_eq!(span_children, &[MarkupNode::Text("hi".into())]);
    }

    #[test]
    fn test_parse_binding_attribute() {
        let nodes = parse_fragment(r#"<button @click="{inc}" id="plus">+</button>"#).unwrap();
        let (_, attrs, _) = element(&nodes[0]);
        assert_eq!(attrs[0], ("@click".to_string(), "{inc}".to_string()));
        assert_eq!(attrs[1], ("id".to_string(), "plus".to_string()));
    }

    #[test]
    fn test_parse_valueless_attribute() {
        let nodes = parse_fragment(r#"<input disabled type="text">"#).unwrap();
        let (tag, attrs, children) = element(&nodes[0]);
        assert_eq!(tag, "input");
        assert_eq!(attrs[0], ("disabled".to_string(), String::new()));
        assert!(children.is_empty());
    }

    #[test]
    fn test_parse_self_closing_and_void() {
        let nodes = parse_fragment("<hr><span/>after").unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[2], MarkupNode::Text("after".into()));
    }

    #[test]
    fn test_parse_entities() {
        let nodes = parse_fragment(r#"<span title="a &amp; b">1 &lt; 2</span>"#).unwrap();
        let (_, attrs, children) = element(&nodes[0]);
        assert_eq!(attrs[0].1, "a & b");
        assert_eq!(children, &[MarkupNode::Text("1 < 2".into())]);
    }

    #[test]
    fn test_comments_are_skipped() {
        let nodes = parse_fragment("<!-- note --><i>x</i>").unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_mismatched_closing_tag_errors() {
        let err = parse_fragment("<div><span></div></span>").unwrap_err();
        assert!(err.to_string().contains("mismatched closing tag"));
    }

    #[test]
    fn test_unterminated_start_tag_errors() {
        assert!(parse_fragment("<div class=\"x\"").is_err());
    }

    #[test]
    fn test_stray_closing_tag_errors() {
        assert!(parse_fragment("</div>").is_err());
    }
}
