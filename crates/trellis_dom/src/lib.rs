//! Trellis Host Document Model
//!
//! This crate provides the native-host half of the Trellis widget
//! framework: a headless document that behaves the way a custom-element
//! runtime expects its host to behave.
//!
//! - **Element tree**: elements with insertion-ordered attributes, text
//!   nodes, attach/detach, subtree replacement
//! - **Markup**: parsing rendered markup text into subtrees and
//!   reserializing them (entity-aware)
//! - **Queries**: scoped `tag` / `#id` / `.class` / `[attr="value"]`
//!   selector lookups
//! - **Events**: per-node listeners, synchronous dispatch with ancestor
//!   bubbling and global-scope tail delivery
//! - **Global scope**: the window analogue - an exposure table with
//!   first-writer-wins semantics plus global event listeners
//!
//! # Example
//!
//! ```rust
//! use trellis_dom::{Document, Event};
//!
//! let doc = Document::new();
//! let host = doc.create_element("my-counter");
//! doc.append_child(doc.root(), host);
//! doc.set_inner_markup(host, r#"<button id="plus">+</button>"#).unwrap();
//!
//! let button = doc.query_selector(host, "#plus").unwrap();
//! doc.add_listener(button, "click", std::rc::Rc::new(|event: &Event| {
//!     println!("clicked: {}", event.name());
//! }));
//! doc.dispatch(button, Event::custom("click", serde_json::Value::Null));
//! ```

pub mod error;
pub mod events;
pub mod global;
pub mod markup;
pub mod selector;
pub mod tree;

pub use error::{DomError, Result};
pub use events::{Event, ListenerCallback, ListenerId};
pub use global::{ExposedFn, GlobalScope};
pub use markup::{parse_fragment, MarkupNode};
pub use selector::Selector;
pub use tree::{Document, NodeId};
