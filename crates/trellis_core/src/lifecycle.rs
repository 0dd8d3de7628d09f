//! Widget lifecycle engine
//!
//! The state machine that turns registered metadata into DOM operations:
//!
//! ```text
//! Constructed -> Connected -> (AttributeDirty <-> Connected) -> Disconnected
//! ```
//!
//! A [`Component`] is the per-instance handle. Construction resolves the
//! widget's descriptor and builds its state and host element, nothing
//! more. Connecting runs the full ordered sequence: before-init hook,
//! root resolution, property seeding, render, declarative binding scan,
//! global exposure, bind-entry application, emitter materialization,
//! host/global listeners, after-init hook. Attribute changes coerce and
//! assign the new value, then replace the rendered subtree and rebind.
//! Disconnecting removes the listeners the engine recorded and nothing
//! else; a detached instance can re-attach, which re-runs connect.
//!
//! All transitions are synchronous and run to completion; a property write
//! that changes the value re-renders before control returns to the caller,
//! and handlers bound during a pass only ever observe that pass's markup.

use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use rustc_hash::FxHashSet;

use trellis_dom::{Document, Event, ListenerId, NodeId};

use crate::convert::PropValue;
use crate::emitter::EventEmitter;
use crate::error::{LifecycleError, Result};
use crate::registry::{
    self, Category, HookPhase, ListenerScope, MetaEntry, MethodEntry, PropertyEntry, RenderFn,
    RenderMode, WidgetDescriptor,
};

/// Arguments a method invocation carries
///
/// Bind entries contribute fixed leading arguments; event-driven
/// invocations carry the triggering event. A bare invocation (exposed
/// global, direct call) carries neither.
#[derive(Clone, Debug, Default)]
pub struct Invocation {
    /// Fixed leading arguments declared by the bind entry, if any
    pub args: Vec<PropValue>,
    /// The native event that triggered the invocation, if any
    pub event: Option<Event>,
}

impl Invocation {
    /// An invocation triggered by a native event with no leading arguments
    pub fn from_event(event: &Event) -> Self {
        Self {
            args: Vec::new(),
            event: Some(event.clone()),
        }
    }
}

enum ScopedHandle {
    Host(ListenerId),
    Global(ListenerId),
}

struct ComponentInner {
    document: Document,
    descriptor: Rc<WidgetDescriptor>,
    host: NodeId,
    state: RefCell<Box<dyn std::any::Any>>,
    shadow_root: Cell<Option<NodeId>>,
    accessors_installed: Cell<bool>,
    shadow_values: RefCell<IndexMap<String, PropValue>>,
    /// Listeners attached from bind entries, removed at disconnect
    bound: RefCell<Vec<(NodeId, ListenerId)>>,
    /// Host/global listener-entry handles, removed at disconnect
    scoped: RefCell<Vec<ScopedHandle>>,
    connected: Cell<bool>,
}

/// A live widget instance
///
/// Cheap to clone; clones share the same instance state.
#[derive(Clone)]
pub struct Component {
    inner: Rc<ComponentInner>,
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("selector", &self.inner.descriptor.selector)
            .field("connected", &self.inner.connected.get())
            .finish()
    }
}

fn binding_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"@(\w+)="\{(\w+)\}""#).unwrap())
}

impl Component {
    /// Construct an instance of the widget registered under `selector`
    ///
    /// Builds the state value and host element only; nothing renders until
    /// the instance attaches. Safe to construct and never attach.
    pub fn create(document: &Document, selector: &str) -> Result<Self> {
        let descriptor =
            registry::definition(selector).ok_or_else(|| LifecycleError::UnknownSelector {
                selector: selector.to_string(),
            })?;
        let state = (descriptor.construct)();
        let host = document.create_element(selector);
        Ok(Self {
            inner: Rc::new(ComponentInner {
                document: document.clone(),
                descriptor,
                host,
                state: RefCell::new(state),
                shadow_root: Cell::new(None),
                accessors_installed: Cell::new(false),
                shadow_values: RefCell::new(IndexMap::new()),
                bound: RefCell::new(Vec::new()),
                scoped: RefCell::new(Vec::new()),
                connected: Cell::new(false),
            }),
        })
    }

    /// The document this instance lives in
    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    /// The host element carrying the widget's observed attributes
    pub fn host(&self) -> NodeId {
        self.inner.host
    }

    /// The selector the widget type is registered under
    pub fn selector(&self) -> &str {
        &self.inner.descriptor.selector
    }

    /// Whether the instance is currently connected
    pub fn is_connected(&self) -> bool {
        self.inner.connected.get()
    }

    /// The subtree markup is written into: the host element, or the
    /// isolated root once a shadow-mode instance has connected
    pub fn resolved_root(&self) -> NodeId {
        self.inner.shadow_root.get().unwrap_or(self.inner.host)
    }

    /// Append the host under `parent` and run the connect sequence
    pub fn attach(&self, parent: NodeId) -> Result<()> {
        self.inner.document.append_child(parent, self.inner.host);
        self.connect()
    }

    /// Run a method declared on this widget type
    ///
    /// Returns false when no method is registered under the name.
    pub fn call(&self, method: &str) -> bool {
        let Some(entry) = self.method_entry(method) else {
            return false;
        };
        (entry.callable)(self, &Invocation::default());
        true
    }

    /// Borrow the typed widget state
    ///
    /// Returns `None` when `S` is not this widget's state type. The state
    /// stays borrowed for the duration of `f`; reactive writes belong
    /// outside the closure, through [`Component::set_property`].
    pub fn with_state<S: 'static, R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        let mut state = self.inner.state.borrow_mut();
        state.downcast_mut::<S>().map(f)
    }

    /// A property's current value
    pub fn property(&self, name: &str) -> Option<PropValue> {
        if self.inner.accessors_installed.get() {
            if let Some(value) = self.inner.shadow_values.borrow().get(name) {
                return Some(value.clone());
            }
        }
        let entry = self.property_entry(name)?;
        let state = self.inner.state.borrow();
        Some((entry.get)(state.as_ref()))
    }

    /// The reactive property accessor
    ///
    /// A write equal to the current value is a no-op. A differing write
    /// updates the backing field and shadow slot, then synchronizes the
    /// host attribute, which drives the attribute-change transition and
    /// exactly one re-render. Writes to undeclared properties are ignored.
    pub fn set_property(&self, name: &str, value: PropValue) -> Result<()> {
        self.ensure_accessors();
        let Some(entry) = self.property_entry(name) else {
            tracing::warn!(property = name, "no declared property backs this write, ignoring");
            return Ok(());
        };
        if self.inner.shadow_values.borrow().get(name) == Some(&value) {
            return Ok(());
        }
        {
            let mut state = self.inner.state.borrow_mut();
            (entry.set)(state.as_mut(), value.clone());
        }
        self.inner
            .shadow_values
            .borrow_mut()
            .insert(name.to_string(), value.clone());
        self.set_attribute(name, &value.to_attr_text())
    }

    /// Set an attribute on the host element
    ///
    /// Setting the current value again is a no-op. A differing value on a
    /// connected instance runs the attribute-change transition: coerce,
    /// assign, re-render, rebind. On an unconnected instance the text is
    /// stored and picked up by property seeding at connect.
    pub fn set_attribute(&self, name: &str, value: &str) -> Result<()> {
        let previous = self.inner.document.attribute(self.inner.host, name);
        if previous.as_deref() == Some(value) {
            return Ok(());
        }
        self.inner.document.set_attribute(self.inner.host, name, value);
        if !self.inner.connected.get() {
            return Ok(());
        }
        self.attribute_changed(name, value)
    }

    /// Remove recorded event bindings and detach the host
    ///
    /// Deliberately the mirror image of event binding only: no hook runs,
    /// properties and exposed globals survive, and declarative listeners
    /// are left to die with their subtree. Re-attaching re-runs the full
    /// connect sequence.
    pub fn detach(&self) {
        for (node, id) in self.inner.bound.borrow_mut().drain(..) {
            self.inner.document.remove_listener(node, id);
        }
        for handle in self.inner.scoped.borrow_mut().drain(..) {
            match handle {
                ScopedHandle::Host(id) => {
                    self.inner.document.remove_listener(self.inner.host, id);
                }
                ScopedHandle::Global(id) => {
                    self.inner.document.global().remove_listener(id);
                }
            }
        }
        self.inner.document.detach_child(self.inner.host);
        self.inner.connected.set(false);
        tracing::trace!(selector = %self.inner.descriptor.selector, "disconnected");
    }

    // =========================================================================
    // Connect sequence
    // =========================================================================

    fn connect(&self) -> Result<()> {
        let descriptor = &self.inner.descriptor;
        // a widget without a renderer cannot be connected; fail before any
        // other step runs
        let render = descriptor
            .render
            .clone()
            .ok_or_else(|| LifecycleError::MissingRender {
                selector: descriptor.selector.clone(),
            })?;
        tracing::trace!(selector = %descriptor.selector, "connect");

        self.run_hook(HookPhase::BeforeInit);

        if descriptor.mode == RenderMode::Shadow && self.inner.shadow_root.get().is_none() {
            let root = self.inner.document.create_element("shadow-root");
            self.inner.shadow_root.set(Some(root));
        }

        self.seed_properties()?;

        let markup = self.render_markup(&render);
        self.inner
            .document
            .set_inner_markup(self.resolved_root(), &markup)?;

        self.bind_declarative();
        self.expose_methods();
        self.inner.bound.borrow_mut().clear();
        self.apply_bindings();
        self.materialize_outputs();
        self.apply_scoped_listeners();

        self.inner.connected.set(true);
        self.run_hook(HookPhase::AfterInit);
        Ok(())
    }

    /// Assign initial property values before the first render: attribute
    /// text when the host carries the attribute, the declared default
    /// otherwise
    fn seed_properties(&self) -> Result<()> {
        let Some(properties) = registry::entries(self.type_id(), Category::Properties) else {
            return Ok(());
        };
        for (attribute, entry) in &properties {
            let MetaEntry::Property(entry) = entry else {
                continue;
            };
            let value = match self.inner.document.attribute(self.inner.host, attribute) {
                Some(text) => {
                    Some(
                        entry
                            .kind
                            .process(&text)
                            .map_err(|source| LifecycleError::Property {
                                attribute: attribute.clone(),
                                source,
                            })?,
                    )
                }
                None => entry.default.clone(),
            };
            if let Some(value) = value {
                {
                    let mut state = self.inner.state.borrow_mut();
                    (entry.set)(state.as_mut(), value.clone());
                }
                // on re-attach the accessor baseline must track the seeded
                // value, or the equality guard would compare against a
                // previous session's state
                if self.inner.accessors_installed.get() {
                    self.inner
                        .shadow_values
                        .borrow_mut()
                        .insert(attribute.clone(), value);
                }
            }
        }
        Ok(())
    }

    /// Scan the rendered markup for `@event="{method}"` occurrences and
    /// attach a listener per matching element
    ///
    /// Best-effort wiring: unknown method names are skipped silently.
    /// The attached listeners are not recorded; they die with their
    /// subtree on the next re-render.
    fn bind_declarative(&self) {
        let root = self.resolved_root();
        let markup = self.inner.document.inner_markup(root);
        let methods = registry::entries(self.type_id(), Category::Methods).unwrap_or_default();

        let mut seen = FxHashSet::default();
        for captures in binding_pattern().captures_iter(&markup) {
            let event = &captures[1];
            let method = &captures[2];
            if !seen.insert((event.to_string(), method.to_string())) {
                continue;
            }
            let Some(MetaEntry::Method(entry)) = methods.get(method) else {
                tracing::trace!(method, "declarative binding names no known method, skipping");
                continue;
            };
            let selector = format!(r#"[@{event}="{{{method}}}"]"#);
            for element in self.inner.document.query_selector_all(root, &selector) {
                let callable = entry.callable.clone();
                let component = self.clone();
                self.inner.document.add_listener(
                    element,
                    event,
                    Rc::new(move |ev: &Event| callable(&component, &Invocation::from_event(ev))),
                );
            }
        }
    }

    /// Install exposure-flagged methods on the global scope under their
    /// bare names; first writer wins
    fn expose_methods(&self) {
        let Some(exposed) = registry::entries(self.type_id(), Category::Exposed) else {
            return;
        };
        for (name, entry) in &exposed {
            let MetaEntry::Method(entry) = entry else {
                continue;
            };
            let callable = entry.callable.clone();
            let component = self.clone();
            self.inner.document.global().expose(
                name.clone(),
                Rc::new(move || callable(&component, &Invocation::default())),
            );
        }
    }

    /// Attach a listener per bind entry whose target selector matches
    /// inside the resolved root; unmatched selectors are skipped silently
    fn apply_bindings(&self) {
        let Some(bindings) = registry::entries(self.type_id(), Category::Bindings) else {
            return;
        };
        let root = self.resolved_root();
        for (method_name, entry) in &bindings {
            let MetaEntry::Bind(bind) = entry else {
                continue;
            };
            let Some(target) = self.inner.document.query_selector(root, &bind.selector) else {
                tracing::trace!(
                    selector = %bind.selector,
                    "bind entry target not present in rendered markup, skipping"
                );
                continue;
            };
            let Some(method) = self.method_entry(method_name) else {
                tracing::warn!(method = %method_name, "bind entry names no known method, skipping");
                continue;
            };
            let callable = method.callable.clone();
            let component = self.clone();
            let args = bind.args.clone();
            let id = self.inner.document.add_listener(
                target,
                bind.event.clone(),
                Rc::new(move |ev: &Event| {
                    callable(
                        &component,
                        &Invocation {
                            args: args.clone(),
                            event: Some(ev.clone()),
                        },
                    );
                }),
            );
            self.inner.bound.borrow_mut().push((target, id));
        }
    }

    /// Assign a live emitter onto every declared output field
    fn materialize_outputs(&self) {
        let Some(outputs) = registry::entries(self.type_id(), Category::Outputs) else {
            return;
        };
        for (_, entry) in &outputs {
            let MetaEntry::Output(output) = entry else {
                continue;
            };
            let emitter = EventEmitter::new(output.event_name.clone(), self.inner.document.clone());
            let mut state = self.inner.state.borrow_mut();
            (output.assign)(state.as_mut(), emitter);
        }
    }

    /// Attach listener entries to the host element or the global scope,
    /// recording the handles for disconnect
    fn apply_scoped_listeners(&self) {
        let Some(listeners) = registry::entries(self.type_id(), Category::Listeners) else {
            return;
        };
        for (_, entry) in &listeners {
            let MetaEntry::Listener(listener) = entry else {
                continue;
            };
            let Some(method) = self.method_entry(&listener.method) else {
                tracing::warn!(
                    method = %listener.method,
                    "listener entry names no known method, skipping"
                );
                continue;
            };
            let callable = method.callable.clone();
            let component = self.clone();
            let callback: trellis_dom::ListenerCallback =
                Rc::new(move |ev: &Event| callable(&component, &Invocation::from_event(ev)));
            let handle = match listener.scope {
                ListenerScope::Host => ScopedHandle::Host(self.inner.document.add_listener(
                    self.inner.host,
                    listener.event.clone(),
                    callback,
                )),
                ListenerScope::Global => ScopedHandle::Global(
                    self.inner
                        .document
                        .global()
                        .add_listener(listener.event.clone(), callback),
                ),
            };
            self.inner.scoped.borrow_mut().push(handle);
        }
    }

    // =========================================================================
    // Attribute change and re-render
    // =========================================================================

    fn attribute_changed(&self, name: &str, value: &str) -> Result<()> {
        self.ensure_accessors();
        let Some(entry) = self.property_entry(name) else {
            // incidental attribute, nothing observed it
            return Ok(());
        };
        let coerced = entry
            .kind
            .process(value)
            .map_err(|source| LifecycleError::Property {
                attribute: name.to_string(),
                source,
            })?;
        {
            let mut state = self.inner.state.borrow_mut();
            (entry.set)(state.as_mut(), coerced.clone());
        }
        self.inner
            .shadow_values
            .borrow_mut()
            .insert(name.to_string(), coerced);
        self.update()
    }

    /// One-time accessor installation: prime the shadow value table from
    /// the backing fields so the accessor's equality guard has a baseline
    fn ensure_accessors(&self) {
        if self.inner.accessors_installed.get() {
            return;
        }
        if let Some(properties) = registry::entries(self.type_id(), Category::Properties) {
            let state = self.inner.state.borrow();
            let mut shadow = self.inner.shadow_values.borrow_mut();
            for (attribute, entry) in &properties {
                if let MetaEntry::Property(entry) = entry {
                    shadow.insert(attribute.clone(), (entry.get)(state.as_ref()));
                }
            }
        }
        self.inner.accessors_installed.set(true);
    }

    /// Replace the rendered subtree and rebind everything
    ///
    /// The previous pass's listeners died with the replaced subtree, so
    /// both the declarative scan and the bind entries are re-applied
    /// before the transition returns - no stale-handler window.
    fn update(&self) -> Result<()> {
        let render = self
            .inner
            .descriptor
            .render
            .clone()
            .ok_or_else(|| LifecycleError::MissingRender {
                selector: self.inner.descriptor.selector.clone(),
            })?;
        let markup = self.render_markup(&render);
        self.inner
            .document
            .set_inner_markup(self.resolved_root(), &markup)?;
        self.inner.bound.borrow_mut().clear();
        self.bind_declarative();
        self.apply_bindings();
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn type_id(&self) -> TypeId {
        self.inner.descriptor.type_id
    }

    fn render_markup(&self, render: &RenderFn) -> String {
        let state = self.inner.state.borrow();
        render(state.as_ref())
    }

    fn method_entry(&self, name: &str) -> Option<MethodEntry> {
        match registry::entries(self.type_id(), Category::Methods)?.get(name) {
            Some(MetaEntry::Method(entry)) => Some(entry.clone()),
            _ => None,
        }
    }

    fn property_entry(&self, name: &str) -> Option<PropertyEntry> {
        match registry::entries(self.type_id(), Category::Properties)?.get(name) {
            Some(MetaEntry::Property(entry)) => Some(entry.clone()),
            _ => None,
        }
    }

    fn run_hook(&self, phase: HookPhase) {
        let Some(hooks) = registry::entries(self.type_id(), Category::Hooks) else {
            return;
        };
        let Some(MetaEntry::Hook(hook)) = hooks.get(phase.key()).cloned() else {
            return;
        };
        let mut state = self.inner.state.borrow_mut();
        (hook.callable)(state.as_mut());
    }
}
