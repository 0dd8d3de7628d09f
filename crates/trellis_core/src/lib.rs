//! Trellis Component Runtime
//!
//! This crate provides the metadata-driven component lifecycle and
//! reactivity engine of the Trellis widget framework:
//!
//! - **Metadata Registry**: process-wide `(type, category)` tables of
//!   declarative configuration, populated once at startup and read at
//!   every lifecycle transition
//! - **Registration**: [`WidgetSpec`], the explicit declaration-time
//!   builder that populates the registry
//! - **Lifecycle Engine**: [`Component`], the per-instance state machine
//!   (construct, connect, attribute-change, re-render, disconnect)
//! - **Type Coercion**: [`PropKind`]/[`PropValue`], turning observed
//!   attribute text into typed property state and back
//! - **Signal/Event Bridge**: [`EventEmitter`], broadcasting named domain
//!   events to an ancestor scope or the global scope
//!
//! # Example
//!
//! ```rust
//! use trellis_core::prelude::*;
//! use trellis_dom::Document;
//!
//! #[derive(Default)]
//! struct Counter {
//!     count: f64,
//! }
//!
//! WidgetSpec::<Counter>::new("my-counter")
//!     .render(|s| format!(r#"<span>{}</span><button @click="{{inc}}">+</button>"#, s.count))
//!     .property(
//!         "count",
//!         PropKind::Number,
//!         Some(PropValue::Number(0.0)),
//!         |s| PropValue::Number(s.count),
//!         |s, v| s.count = v.as_number().unwrap_or_default(),
//!     )
//!     .method("inc", |cmp, _| {
//!         let count = cmp.property("count").and_then(|v| v.as_number()).unwrap_or(0.0);
//!         let _ = cmp.set_property("count", PropValue::Number(count + 1.0));
//!     })
//!     .define();
//!
//! let doc = Document::new();
//! let counter = Component::create(&doc, "my-counter").unwrap();
//! counter.attach(doc.root()).unwrap();
//! counter.set_attribute("count", "5").unwrap();
//! assert!(doc.inner_markup(counter.host()).contains("<span>5</span>"));
//! ```

pub mod convert;
pub mod emitter;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod widget;

pub use convert::{FnExpr, PropKind, PropValue};
pub use emitter::EventEmitter;
pub use error::{ConvertError, LifecycleError, Result};
pub use lifecycle::{Component, Invocation};
pub use registry::{
    BindEntry, Category, HookEntry, HookPhase, ListenerEntry, ListenerScope, MetaEntry,
    MethodEntry, OutputEntry, PropertyEntry, RenderMode, WidgetDescriptor,
};
pub use widget::{bootstrap, WidgetSpec};

/// The commonly needed surface for declaring and driving widgets
pub mod prelude {
    pub use crate::convert::{PropKind, PropValue};
    pub use crate::emitter::EventEmitter;
    pub use crate::lifecycle::{Component, Invocation};
    pub use crate::widget::{bootstrap, WidgetSpec};
    pub use trellis_dom::{Document, Event};
}
