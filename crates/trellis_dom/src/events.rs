//! Events and listener plumbing
//!
//! Listeners are stored per node (and on the global scope) as `Rc`
//! callbacks; the UI model is single-threaded. Dispatch always collects the
//! callbacks to run before invoking any of them, so a handler is free to
//! mutate the document mid-dispatch; handlers registered while a dispatch
//! is in flight do not observe that dispatch.

use std::rc::Rc;

use crate::tree::NodeId;

/// Callback invoked when an event reaches a listener
pub type ListenerCallback = Rc<dyn Fn(&Event)>;

/// Stable handle to an attached listener, used for removal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// A dispatched event
///
/// Carries a name, a structured detail payload, and the flags of the
/// native dispatch model. Events produced by the widget bridge are
/// bubbling and never cancelable.
#[derive(Clone, Debug)]
pub struct Event {
    name: String,
    detail: serde_json::Value,
    bubbles: bool,
    cancelable: bool,
    pub(crate) target: Option<NodeId>,
}

impl Event {
    /// A plain non-bubbling event with no detail
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detail: serde_json::Value::Null,
            bubbles: false,
            cancelable: false,
            target: None,
        }
    }

    /// A bubbling, non-cancelable event carrying a detail payload
    pub fn custom(name: impl Into<String>, detail: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            detail,
            bubbles: true,
            cancelable: false,
            target: None,
        }
    }

    /// Attach a detail payload
    #[must_use]
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }

    /// The event name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The detail payload (`Null` when none was attached)
    pub fn detail(&self) -> &serde_json::Value {
        &self.detail
    }

    /// Whether the event propagates to ancestors
    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    /// Whether the event can be canceled (always false for bridge events)
    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    /// The node the event was dispatched at, once dispatched
    pub fn target(&self) -> Option<NodeId> {
        self.target
    }
}

/// A listener attached to a node or to the global scope
#[derive(Clone)]
pub(crate) struct Listener {
    pub(crate) id: ListenerId,
    pub(crate) event: String,
    pub(crate) callback: ListenerCallback,
}
