//! The global scope - window analogue
//!
//! Two concerns live here: the exposure table widgets publish methods
//! into (first-writer-wins, by bare name), and global event listeners,
//! which receive events dispatched directly at the scope as well as
//! bubbling events whose target is connected to the document.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::events::{Event, Listener, ListenerCallback, ListenerId};

/// A method published onto the global scope
pub type ExposedFn = Rc<dyn Fn()>;

/// The document's global scope
pub struct GlobalScope {
    exposed: RefCell<IndexMap<String, ExposedFn>>,
    listeners: RefCell<Vec<Listener>>,
    next_listener_id: Cell<u64>,
}

impl Default for GlobalScope {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalScope {
    pub(crate) fn new() -> Self {
        Self {
            exposed: RefCell::new(IndexMap::new()),
            listeners: RefCell::new(Vec::new()),
            next_listener_id: Cell::new(0),
        }
    }

    /// Publish a function under a bare global name
    ///
    /// First writer wins: returns false and leaves the table untouched
    /// when the name is already occupied.
    pub fn expose(&self, name: impl Into<String>, func: ExposedFn) -> bool {
        let name = name.into();
        let mut exposed = self.exposed.borrow_mut();
        if exposed.contains_key(&name) {
            tracing::debug!("global name {name} already occupied, keeping first writer");
            return false;
        }
        exposed.insert(name, func);
        true
    }

    /// Look up an exposed function by name
    pub fn exposed(&self, name: &str) -> Option<ExposedFn> {
        self.exposed.borrow().get(name).cloned()
    }

    /// Invoke an exposed function; returns false when the name is unknown
    pub fn invoke(&self, name: &str) -> bool {
        match self.exposed(name) {
            Some(func) => {
                func();
                true
            }
            None => false,
        }
    }

    /// Names currently exposed, in exposure order
    pub fn exposed_names(&self) -> Vec<String> {
        self.exposed.borrow().keys().cloned().collect()
    }

    /// Attach a listener for a named event on the global scope
    pub fn add_listener(&self, event: impl Into<String>, callback: ListenerCallback) -> ListenerId {
        let id = ListenerId(self.next_listener_id.get());
        self.next_listener_id.set(id.0 + 1);
        self.listeners.borrow_mut().push(Listener {
            id,
            event: event.into(),
            callback,
        });
        id
    }

    /// Remove a previously attached listener
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Deliver an event to every matching listener, in registration order
    pub fn dispatch(&self, event: &Event) {
        let callbacks: Vec<ListenerCallback> = self
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.event == event.name())
            .map(|l| l.callback.clone())
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_expose_first_writer_wins() {
        let scope = GlobalScope::new();
        let hits = Rc::new(Cell::new(0u32));

        let first = hits.clone();
        assert!(scope.expose("inc", Rc::new(move || first.set(first.get() + 1))));
        let second = hits.clone();
        assert!(!scope.expose("inc", Rc::new(move || second.set(second.get() + 100))));

        assert!(scope.invoke("inc"));
        assert_eq!(hits.get(), 1);
        assert_eq!(scope.exposed_names(), vec!["inc".to_string()]);
    }

    #[test]
    fn test_invoke_unknown_name() {
        let scope = GlobalScope::new();
        assert!(!scope.invoke("missing"));
    }

    #[test]
    fn test_listener_order_and_removal() {
        let scope = GlobalScope::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let a = log.clone();
        let first = scope.add_listener("ping", Rc::new(move |_| a.borrow_mut().push("a")));
        let b = log.clone();
        scope.add_listener("ping", Rc::new(move |_| b.borrow_mut().push("b")));

        scope.dispatch(&Event::custom("ping", serde_json::Value::Null));
        assert_eq!(*log.borrow(), vec!["a", "b"]);

        assert!(scope.remove_listener(first));
        assert!(!scope.remove_listener(first));
        scope.dispatch(&Event::custom("ping", serde_json::Value::Null));
        assert_eq!(*log.borrow(), vec!["a", "b", "b"]);
    }

    #[test]
    fn test_dispatch_with_no_listeners_is_noop() {
        let scope = GlobalScope::new();
        scope.dispatch(&Event::new("silence"));
    }
}
