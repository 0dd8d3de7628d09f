//! Signal/event bridge
//!
//! Widgets broadcast domain events under names of their own choosing,
//! decoupled from native DOM event names. An [`EventEmitter`] is
//! materialized onto each declared output field when its widget connects;
//! emitting dispatches a bubbling, non-cancelable, detail-carrying event
//! either from a scope element (propagating through its ancestors) or
//! directly at the document's global scope.

use trellis_dom::{Document, Event, NodeId};

/// A named-event emitter bound to a document
#[derive(Clone)]
pub struct EventEmitter {
    name: String,
    document: Document,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("name", &self.name)
            .finish()
    }
}

impl EventEmitter {
    /// Create an emitter for a fixed event name
    pub fn new(name: impl Into<String>, document: Document) -> Self {
        Self {
            name: name.into(),
            document,
        }
    }

    /// The event name this emitter dispatches under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Synchronously dispatch the named event with a detail payload
    ///
    /// With a scope element the event is dispatched there and bubbles up
    /// through its ancestors (reaching the global scope when the element
    /// is connected). Without one it is delivered directly to the global
    /// scope. Zero listeners is a no-op; multiple listeners run in
    /// registration order.
    pub fn emit(&self, detail: serde_json::Value, scope: Option<NodeId>) {
        let event = Event::custom(self.name.clone(), detail);
        match scope {
            Some(node) => self.document.dispatch(node, event),
            None => self.document.global().dispatch(&event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_emit_to_global_scope() {
        let doc = Document::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        doc.global().add_listener(
            "onCountChange",
            Rc::new(move |event: &Event| sink.borrow_mut().push(event.detail().clone())),
        );

        let emitter = EventEmitter::new("onCountChange", doc.clone());
        emitter.emit(serde_json::json!({ "count": 2 }), None);

        assert_eq!(*seen.borrow(), vec![serde_json::json!({ "count": 2 })]);
    }

    #[test]
    fn test_emit_from_scope_element_bubbles() {
        let doc = Document::new();
        let host = doc.create_element("my-widget");
        doc.append_child(doc.root(), host);

        let on_host = Rc::new(RefCell::new(0u32));
        let hits = on_host.clone();
        doc.add_listener(
            host,
            "onSaved",
            Rc::new(move |_| *hits.borrow_mut() += 1),
        );
        let on_global = Rc::new(RefCell::new(0u32));
        let hits = on_global.clone();
        doc.global()
            .add_listener("onSaved", Rc::new(move |_| *hits.borrow_mut() += 1));

        let emitter = EventEmitter::new("onSaved", doc.clone());
        emitter.emit(serde_json::Value::Null, Some(host));

        assert_eq!(*on_host.borrow(), 1);
        assert_eq!(*on_global.borrow(), 1);
    }

    #[test]
    fn test_emit_with_no_listeners_is_noop() {
        let doc = Document::new();
        let emitter = EventEmitter::new("onSilence", doc);
        emitter.emit(serde_json::Value::Null, None);
    }

    #[test]
    fn test_multiple_listeners_run_in_registration_order() {
        let doc = Document::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let log = order.clone();
            doc.global()
                .add_listener("onPing", Rc::new(move |_| log.borrow_mut().push(tag)));
        }

        EventEmitter::new("onPing", doc).emit(serde_json::Value::Null, None);
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }
}
