//! Process-wide widget metadata registry
//!
//! Declarative configuration attaches to the widget *type*, never to an
//! instance. Registration (normally a startup-time call through
//! [`WidgetSpec`](crate::widget::WidgetSpec)) populates an ordered map per
//! `(type, category)` pair; the lifecycle engine reads those maps at every
//! transition. Maps are created lazily on first registration, preserve
//! first-registration order, and are never destroyed - widget types are
//! finite and known at load time.
//!
//! The table is thread-local: the widget runtime is single-threaded and
//! entries hold non-`Send` callables. Population happens before the first
//! instance exists, so reads never race writes.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::convert::{PropKind, PropValue};
use crate::emitter::EventEmitter;
use crate::lifecycle::{Component, Invocation};

/// Callable backing a declared widget method
pub type MethodFn = Rc<dyn Fn(&Component, &Invocation)>;
/// Reads a property's current value out of the widget state
pub type StateGetter = Rc<dyn Fn(&dyn Any) -> PropValue>;
/// Writes a coerced property value into the widget state
pub type StateSetter = Rc<dyn Fn(&mut dyn Any, PropValue)>;
/// Lifecycle hook callable
pub type HookFn = Rc<dyn Fn(&mut dyn Any)>;
/// Produces the widget's markup from its current state
pub type RenderFn = Rc<dyn Fn(&dyn Any) -> String>;
/// Constructs a fresh state value for a new instance
pub type ConstructFn = Rc<dyn Fn() -> Box<dyn Any>>;
/// Stores a materialized emitter onto its declared field
pub type EmitterAssign = Rc<dyn Fn(&mut dyn Any, EventEmitter)>;

/// Metadata categories; the enum key namespaces them so categories can
/// never collide
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    /// Instance methods by name
    Methods,
    /// Methods flagged for global exposure
    Exposed,
    /// Attribute-to-field property bindings
    Properties,
    /// Event-to-method bind entries
    Bindings,
    /// Emitter output bindings
    Outputs,
    /// Before/after-init lifecycle hooks
    Hooks,
    /// Host and global listener entries
    Listeners,
}

/// How a widget's markup root is resolved
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// Render into the host element itself
    #[default]
    Light,
    /// Render into an isolated root created once per instance
    Shadow,
}

/// A declared instance method
#[derive(Clone)]
pub struct MethodEntry {
    pub name: String,
    pub callable: MethodFn,
}

/// The two-way relationship between an observed attribute and a backing
/// field
#[derive(Clone)]
pub struct PropertyEntry {
    /// The observed attribute name (unique within a widget type)
    pub attribute: String,
    /// Coercion applied to incoming attribute text
    pub kind: PropKind,
    /// Value assigned at connect when the attribute is absent
    pub default: Option<PropValue>,
    pub get: StateGetter,
    pub set: StateSetter,
}

/// "When `event` fires on the element matching `selector` inside the
/// widget's root, invoke `method` with (args..., event)"
#[derive(Clone)]
pub struct BindEntry {
    pub event: String,
    pub selector: String,
    pub method: String,
    pub args: Vec<PropValue>,
}

/// A field materialized as a live emitter at connect time
#[derive(Clone)]
pub struct OutputEntry {
    pub field: String,
    /// Derived event name (`on` + capitalized field, optionally + `Change`)
    pub event_name: String,
    pub assign: EmitterAssign,
}

/// Lifecycle hook phases
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookPhase {
    BeforeInit,
    AfterInit,
}

impl HookPhase {
    /// The stable key the hook is registered under
    pub fn key(self) -> &'static str {
        match self {
            HookPhase::BeforeInit => "beforeInit",
            HookPhase::AfterInit => "afterInit",
        }
    }
}

/// At most one hook per phase runs per connect
#[derive(Clone)]
pub struct HookEntry {
    pub phase: HookPhase,
    pub callable: HookFn,
}

/// Where a listener entry attaches
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerScope {
    /// The widget's host element
    Host,
    /// The document's global scope
    Global,
}

/// A method listening for an event on the host element or global scope,
/// attached at connect and removed at disconnect
#[derive(Clone)]
pub struct ListenerEntry {
    pub event: String,
    pub scope: ListenerScope,
    pub method: String,
}

/// A single registered metadata entry
#[derive(Clone)]
pub enum MetaEntry {
    Method(MethodEntry),
    Property(PropertyEntry),
    Bind(BindEntry),
    Output(OutputEntry),
    Hook(HookEntry),
    Listener(ListenerEntry),
}

/// Everything the engine needs to know about a widget type, derived once
/// at registration
pub struct WidgetDescriptor {
    pub selector: String,
    pub type_id: TypeId,
    pub mode: RenderMode,
    /// Observed attribute names, in declaration order
    pub observed_attributes: Vec<String>,
    /// Method names flagged for global exposure, in declaration order
    pub exposed_methods: Vec<String>,
    pub construct: ConstructFn,
    /// The required render capability; its absence is detected at connect
    pub render: Option<RenderFn>,
}

impl std::fmt::Debug for WidgetDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetDescriptor")
            .field("selector", &self.selector)
            .field("mode", &self.mode)
            .field("observed_attributes", &self.observed_attributes)
            .field("exposed_methods", &self.exposed_methods)
            .field("render", &self.render.is_some())
            .finish()
    }
}

thread_local! {
    static METADATA: RefCell<FxHashMap<(TypeId, Category), IndexMap<String, MetaEntry>>> =
        RefCell::new(FxHashMap::default());
    static DEFINITIONS: RefCell<IndexMap<String, Rc<WidgetDescriptor>>> =
        RefCell::new(IndexMap::new());
}

/// Run `f` against the ordered entry map for `(type, category)`, creating
/// an empty map first when none exists yet
pub fn fetch_or_create<R>(
    type_id: TypeId,
    category: Category,
    f: impl FnOnce(&mut IndexMap<String, MetaEntry>) -> R,
) -> R {
    METADATA.with(|metadata| {
        let mut metadata = metadata.borrow_mut();
        f(metadata.entry((type_id, category)).or_default())
    })
}

/// Snapshot of the entry map for `(type, category)`
///
/// Absence means "no entries", never an error; callers treat `None` as an
/// empty category.
pub fn entries(type_id: TypeId, category: Category) -> Option<IndexMap<String, MetaEntry>> {
    METADATA.with(|metadata| metadata.borrow().get(&(type_id, category)).cloned())
}

/// Claim a selector for a widget descriptor
///
/// Idempotent: a selector that is already claimed keeps its first
/// registration and the call returns false.
pub fn define(descriptor: WidgetDescriptor) -> bool {
    DEFINITIONS.with(|definitions| {
        let mut definitions = definitions.borrow_mut();
        if definitions.contains_key(&descriptor.selector) {
            tracing::warn!(
                selector = %descriptor.selector,
                "selector already defined, ignoring re-registration"
            );
            return false;
        }
        definitions.insert(descriptor.selector.clone(), Rc::new(descriptor));
        true
    })
}

/// Look up the descriptor claimed under a selector
pub fn definition(selector: &str) -> Option<Rc<WidgetDescriptor>> {
    DEFINITIONS.with(|definitions| definitions.borrow().get(selector).cloned())
}

/// Whether a selector is already claimed
pub fn is_defined(selector: &str) -> bool {
    DEFINITIONS.with(|definitions| definitions.borrow().contains_key(selector))
}
