//! Document tree management
//!
//! A headless element tree in the shape widget runtimes expect from a
//! native custom-element host: elements with insertion-ordered attributes,
//! text nodes, subtree replacement from markup text, scoped selector
//! queries, and synchronous event dispatch with ancestor bubbling.
//!
//! The [`Document`] is a cheap-to-clone handle over shared single-threaded
//! state. Handlers run outside any internal borrow, so an event handler may
//! freely mutate the document that is dispatching to it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::error::{DomError, Result};
use crate::events::{Event, Listener, ListenerCallback, ListenerId};
use crate::global::GlobalScope;
use crate::markup::{self, MarkupNode};
use crate::selector::Selector;

new_key_type! {
    /// Unique identifier for a node in a document
    pub struct NodeId;
}

enum NodeKind {
    Element { tag: String },
    Text { content: String },
}

struct Node {
    kind: NodeKind,
    attributes: IndexMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: SmallVec<[Listener; 2]>,
}

impl Node {
    fn element(tag: &str) -> Self {
        Self {
            kind: NodeKind::Element {
                tag: tag.to_string(),
            },
            attributes: IndexMap::new(),
            parent: None,
            children: Vec::new(),
            listeners: SmallVec::new(),
        }
    }

    fn text(content: &str) -> Self {
        Self {
            kind: NodeKind::Text {
                content: content.to_string(),
            },
            attributes: IndexMap::new(),
            parent: None,
            children: Vec::new(),
            listeners: SmallVec::new(),
        }
    }
}

struct DocumentInner {
    nodes: RefCell<SlotMap<NodeId, Node>>,
    root: NodeId,
    global: GlobalScope,
    next_listener_id: Cell<u64>,
}

/// A headless document
///
/// Cloning yields another handle to the same tree.
#[derive(Clone)]
pub struct Document {
    inner: Rc<DocumentInner>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document with a root element and a global scope
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::element("#document"));
        Self {
            inner: Rc::new(DocumentInner {
                nodes: RefCell::new(nodes),
                root,
                global: GlobalScope::new(),
                next_listener_id: Cell::new(0),
            }),
        }
    }

    /// The document root every connected node hangs off
    pub fn root(&self) -> NodeId {
        self.inner.root
    }

    /// The document's global scope (exposure table + global listeners)
    pub fn global(&self) -> &GlobalScope {
        &self.inner.global
    }

    /// Create a detached element node
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner.nodes.borrow_mut().insert(Node::element(tag))
    }

    /// Create a detached text node
    pub fn create_text(&self, content: &str) -> NodeId {
        self.inner.nodes.borrow_mut().insert(Node::text(content))
    }

    /// Whether the node id still refers to a live node
    pub fn contains(&self, node: NodeId) -> bool {
        self.inner.nodes.borrow().contains_key(node)
    }

    /// Append a node as the last child of a parent, detaching it from any
    /// previous parent first
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        self.detach_child(child);
        let mut nodes = self.inner.nodes.borrow_mut();
        if !nodes.contains_key(parent) || !nodes.contains_key(child) {
            return;
        }
        nodes[child].parent = Some(parent);
        nodes[parent].children.push(child);
    }

    /// Unlink a node from its parent, keeping the subtree (and its
    /// listeners) alive for re-attachment
    pub fn detach_child(&self, node: NodeId) {
        let mut nodes = self.inner.nodes.borrow_mut();
        let Some(parent) = nodes.get(node).and_then(|n| n.parent) else {
            return;
        };
        nodes[node].parent = None;
        if let Some(parent_node) = nodes.get_mut(parent) {
            parent_node.children.retain(|&c| c != node);
        }
    }

    /// Remove a node and its whole subtree; their listeners die with them
    pub fn remove_subtree(&self, node: NodeId) {
        self.detach_child(node);
        let mut nodes = self.inner.nodes.borrow_mut();
        drop_subtree(&mut nodes, node);
    }

    /// Element tag name (`None` for text nodes and stale ids)
    pub fn tag(&self, node: NodeId) -> Option<String> {
        match self.inner.nodes.borrow().get(node)?.kind {
            NodeKind::Element { ref tag } => Some(tag.clone()),
            NodeKind::Text { .. } => None,
        }
    }

    /// Parent node, when attached
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.nodes.borrow().get(node)?.parent
    }

    /// Child nodes in document order
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner
            .nodes
            .borrow()
            .get(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Whether the node is reachable from the document root
    pub fn is_connected(&self, node: NodeId) -> bool {
        let nodes = self.inner.nodes.borrow();
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.inner.root {
                return true;
            }
            current = nodes.get(id).and_then(|n| n.parent);
        }
        false
    }

    /// An attribute's current text value
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner
            .nodes
            .borrow()
            .get(node)?
            .attributes
            .get(name)
            .cloned()
    }

    /// Set an attribute's text value
    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        if let Some(n) = self.inner.nodes.borrow_mut().get_mut(node) {
            n.attributes.insert(name.to_string(), value.to_string());
        }
    }

    /// Concatenated text content of the subtree
    pub fn text_content(&self, node: NodeId) -> String {
        let nodes = self.inner.nodes.borrow();
        let mut out = String::new();
        collect_text(&nodes, node, &mut out);
        out
    }

    /// Replace the node's children with the parsed markup fragment
    ///
    /// The markup is parsed before anything is touched; a parse error
    /// leaves the existing content untouched. On success the previous
    /// children (and every listener attached within them) are dropped.
    pub fn set_inner_markup(&self, node: NodeId, markup: &str) -> Result<()> {
        let fragment = markup::parse_fragment(markup)?;
        let mut nodes = self.inner.nodes.borrow_mut();
        if !nodes.contains_key(node) {
            return Err(DomError::StaleNode);
        }
        for child in std::mem::take(&mut nodes[node].children) {
            drop_subtree(&mut nodes, child);
        }
        for parsed in fragment {
            graft(&mut nodes, node, parsed);
        }
        Ok(())
    }

    /// Reserialize the node's children as markup text
    pub fn inner_markup(&self, node: NodeId) -> String {
        let nodes = self.inner.nodes.borrow();
        let mut out = String::new();
        if let Some(n) = nodes.get(node) {
            for &child in &n.children {
                serialize(&nodes, child, &mut out);
            }
        }
        out
    }

    /// First descendant of `scope` matching the selector, document order
    pub fn query_selector(&self, scope: NodeId, selector: &str) -> Option<NodeId> {
        self.query_selector_all(scope, selector).into_iter().next()
    }

    /// Every descendant of `scope` matching the selector, document order
    ///
    /// An unsupported selector matches nothing.
    pub fn query_selector_all(&self, scope: NodeId, selector: &str) -> Vec<NodeId> {
        let Some(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        let nodes = self.inner.nodes.borrow();
        let mut matches = Vec::new();
        let mut stack: Vec<NodeId> = nodes
            .get(scope)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            if let Some(node) = nodes.get(id) {
                if let NodeKind::Element { ref tag } = node.kind {
                    if selector.matches(tag, &node.attributes) {
                        matches.push(id);
                    }
                }
                stack.extend(node.children.iter().rev().copied());
            }
        }
        matches
    }

    /// Attach a listener for a named event on a node
    pub fn add_listener(
        &self,
        node: NodeId,
        event: impl Into<String>,
        callback: ListenerCallback,
    ) -> ListenerId {
        let id = ListenerId(self.inner.next_listener_id.get());
        self.inner.next_listener_id.set(id.0 + 1);
        if let Some(n) = self.inner.nodes.borrow_mut().get_mut(node) {
            n.listeners.push(Listener {
                id,
                event: event.into(),
                callback,
            });
        }
        id
    }

    /// Remove a previously attached listener from a node
    pub fn remove_listener(&self, node: NodeId, id: ListenerId) -> bool {
        let mut nodes = self.inner.nodes.borrow_mut();
        let Some(n) = nodes.get_mut(node) else {
            return false;
        };
        let before = n.listeners.len();
        n.listeners.retain(|l| l.id != id);
        n.listeners.len() != before
    }

    /// Dispatch an event at a target node
    ///
    /// Matching listeners run in registration order on the target, then on
    /// each ancestor when the event bubbles. A bubbling event whose chain
    /// reaches the document root is finally delivered to the global scope.
    /// Zero listeners anywhere is a no-op.
    pub fn dispatch(&self, target: NodeId, mut event: Event) {
        event.target = Some(target);
        let (callbacks, reached_root) = {
            let nodes = self.inner.nodes.borrow();
            let mut callbacks: Vec<ListenerCallback> = Vec::new();
            let mut reached_root = false;
            let mut current = Some(target);
            while let Some(id) = current {
                let Some(node) = nodes.get(id) else { break };
                callbacks.extend(
                    node.listeners
                        .iter()
                        .filter(|l| l.event == event.name())
                        .map(|l| l.callback.clone()),
                );
                reached_root = id == self.inner.root;
                current = if event.bubbles() { node.parent } else { None };
            }
            (callbacks, reached_root)
        };
        for callback in &callbacks {
            callback(&event);
        }
        if reached_root && event.bubbles() {
            self.inner.global.dispatch(&event);
        }
    }
}

fn drop_subtree(nodes: &mut SlotMap<NodeId, Node>, node: NodeId) {
    let Some(removed) = nodes.remove(node) else {
        return;
    };
    for child in removed.children {
        drop_subtree(nodes, child);
    }
}

fn graft(nodes: &mut SlotMap<NodeId, Node>, parent: NodeId, parsed: MarkupNode) {
    let id = match parsed {
        MarkupNode::Text(content) => nodes.insert(Node::text(&content)),
        MarkupNode::Element {
            tag,
            attributes,
            children,
        } => {
            let id = nodes.insert(Node::element(&tag));
            nodes[id].attributes = attributes.into_iter().collect();
            for child in children {
                graft(nodes, id, child);
            }
            id
        }
    };
    nodes[id].parent = Some(parent);
    nodes[parent].children.push(id);
}

fn collect_text(nodes: &SlotMap<NodeId, Node>, node: NodeId, out: &mut String) {
    let Some(n) = nodes.get(node) else { return };
    match &n.kind {
        NodeKind::Text { content } => out.push_str(content),
        NodeKind::Element { .. } => {
            for &child in &n.children {
                collect_text(nodes, child, out);
            }
        }
    }
}

fn serialize(nodes: &SlotMap<NodeId, Node>, node: NodeId, out: &mut String) {
    let Some(n) = nodes.get(node) else { return };
    match &n.kind {
        NodeKind::Text { content } => out.push_str(&markup::escape_text(content)),
        NodeKind::Element { tag } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in &n.attributes {
                out.push(' ');
                out.push_str(name);
                if !value.is_empty() {
                    out.push_str("=\"");
                    out.push_str(&markup::escape_attribute(value));
                    out.push('"');
                }
            }
            if markup::is_void_tag(tag) {
                out.push('>');
                return;
            }
            out.push('>');
            for &child in &n.children {
                serialize(nodes, child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<u32>>, ListenerCallback) {
        let count = Rc::new(Cell::new(0u32));
        let inner = count.clone();
        (count, Rc::new(move |_| inner.set(inner.get() + 1)))
    }

    #[test]
    fn test_set_inner_markup_and_query() {
        let doc = Document::new();
        let host = doc.create_element("my-counter");
        doc.append_child(doc.root(), host);
        doc.set_inner_markup(host, r#"<span>0</span><button id="plus" @click="{inc}">+</button>"#)
            .unwrap();

        let button = doc.query_selector(host, "#plus").unwrap();
        assert_eq!(doc.tag(button).as_deref(), Some("button"));
        assert_eq!(doc.attribute(button, "@click").as_deref(), Some("{inc}"));
        assert_eq!(doc.query_selector_all(host, "span").len(), 1);
        assert_eq!(doc.query_selector(host, "#minus"), None);
        assert_eq!(doc.text_content(host), "0+");
    }

    #[test]
    fn test_tree_construction_by_hand() {
        let doc = Document::new();
        let list = doc.create_element("ul");
        let item = doc.create_element("li");
        let label = doc.create_text("first");
        doc.append_child(doc.root(), list);
        doc.append_child(list, item);
        doc.append_child(item, label);

        assert_eq!(doc.children(list), vec![item]);
        assert_eq!(doc.parent(item), Some(list));
        assert_eq!(doc.parent(list), Some(doc.root()));
        assert_eq!(doc.inner_markup(list), "<li>first</li>");

        // re-appending moves rather than duplicates
        let other = doc.create_element("ol");
        doc.append_child(doc.root(), other);
        doc.append_child(other, item);
        assert!(doc.children(list).is_empty());
        assert_eq!(doc.parent(item), Some(other));
    }

    #[test]
    fn test_inner_markup_round_trip() {
        let doc = Document::new();
        let host = doc.create_element("widget-root");
        let markup = r#"<div class="row"><button @click="{inc}">+</button><input type="text"></div>"#;
        doc.set_inner_markup(host, markup).unwrap();
        let serialized = doc.inner_markup(host);
        assert_eq!(serialized, markup);
        // and the serialized form parses back to the same tree
        doc.set_inner_markup(host, &serialized).unwrap();
        assert_eq!(doc.inner_markup(host), markup);
    }

    #[test]
    fn test_parse_failure_leaves_content_untouched() {
        let doc = Document::new();
        let host = doc.create_element("widget-root");
        doc.set_inner_markup(host, "<span>kept</span>").unwrap();
        assert!(doc.set_inner_markup(host, "<div><broken").is_err());
        assert_eq!(doc.inner_markup(host), "<span>kept</span>");
    }

    #[test]
    fn test_dispatch_bubbles_to_ancestors_and_global() {
        let doc = Document::new();
        let host = doc.create_element("my-widget");
        doc.append_child(doc.root(), host);
        doc.set_inner_markup(host, "<div><button>+</button></div>").unwrap();
        let button = doc.query_selector(host, "button").unwrap();

        let (on_button, cb) = counter();
        doc.add_listener(button, "click", cb);
        let (on_host, cb) = counter();
        doc.add_listener(host, "click", cb);
        let (on_global, cb) = counter();
        doc.global().add_listener("click", cb);

        doc.dispatch(button, Event::custom("click", serde_json::Value::Null));
        assert_eq!(on_button.get(), 1);
        assert_eq!(on_host.get(), 1);
        assert_eq!(on_global.get(), 1);

        // non-bubbling events stay on the target
        doc.dispatch(button, Event::new("click"));
        assert_eq!(on_button.get(), 2);
        assert_eq!(on_host.get(), 1);
        assert_eq!(on_global.get(), 1);
    }

    #[test]
    fn test_detached_target_never_reaches_global() {
        let doc = Document::new();
        let island = doc.create_element("island");
        doc.set_inner_markup(island, "<button>+</button>").unwrap();
        let button = doc.query_selector(island, "button").unwrap();

        let (on_button, cb) = counter();
        doc.add_listener(button, "click", cb);
        let (on_global, cb) = counter();
        doc.global().add_listener("click", cb);

        doc.dispatch(button, Event::custom("click", serde_json::Value::Null));
        assert_eq!(on_button.get(), 1);
        assert_eq!(on_global.get(), 0);
    }

    #[test]
    fn test_replacing_markup_drops_old_listeners() {
        let doc = Document::new();
        let host = doc.create_element("my-widget");
        doc.append_child(doc.root(), host);
        doc.set_inner_markup(host, "<button>+</button>").unwrap();
        let stale = doc.query_selector(host, "button").unwrap();

        let (hits, cb) = counter();
        doc.add_listener(stale, "click", cb);

        doc.set_inner_markup(host, "<button>+</button>").unwrap();
        assert!(!doc.contains(stale));

        let fresh = doc.query_selector(host, "button").unwrap();
        doc.dispatch(fresh, Event::custom("click", serde_json::Value::Null));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_listener_removal_by_id() {
        let doc = Document::new();
        let node = doc.create_element("div");
        let (hits, cb) = counter();
        let id = doc.add_listener(node, "ping", cb);

        doc.dispatch(node, Event::new("ping"));
        assert_eq!(hits.get(), 1);

        assert!(doc.remove_listener(node, id));
        assert!(!doc.remove_listener(node, id));
        doc.dispatch(node, Event::new("ping"));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_detach_keeps_subtree_for_reattachment() {
        let doc = Document::new();
        let host = doc.create_element("my-widget");
        doc.append_child(doc.root(), host);
        doc.set_inner_markup(host, "<span>kept</span>").unwrap();

        doc.detach_child(host);
        assert!(doc.contains(host));
        assert!(!doc.is_connected(host));
        assert_eq!(doc.inner_markup(host), "<span>kept</span>");

        doc.append_child(doc.root(), host);
        assert!(doc.is_connected(host));
    }

    #[test]
    fn test_handler_may_mutate_mid_dispatch() {
        let doc = Document::new();
        let host = doc.create_element("my-widget");
        doc.append_child(doc.root(), host);
        doc.set_inner_markup(host, "<button>+</button>").unwrap();
        let button = doc.query_selector(host, "button").unwrap();

        let doc2 = doc.clone();
        doc.add_listener(
            button,
            "click",
            Rc::new(move |_| {
                doc2.set_inner_markup(host, "<span>replaced</span>").unwrap();
            }),
        );
        doc.dispatch(button, Event::custom("click", serde_json::Value::Null));
        assert_eq!(doc.inner_markup(host), "<span>replaced</span>");
    }
}
