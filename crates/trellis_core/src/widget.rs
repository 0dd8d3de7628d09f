//! Widget registration
//!
//! [`WidgetSpec`] is the declaration-time surface of the framework: a
//! builder that accumulates a widget type's declarative configuration and
//! writes it into the process-wide registry in one `define()` call at
//! startup. This replaces annotation processing with an explicit
//! registration call; nothing here is read again after the owning type
//! finishes declaring itself.
//!
//! ```rust
//! use trellis_core::prelude::*;
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
//!     .expose("inc")
//!     .define();
//! ```
//!
//! Registration never errors: duplicate selectors, duplicate attributes,
//! and exposure of undeclared methods are all defensive no-ops that warn
//! and continue.

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::rc::Rc;

use crate::convert::{PropKind, PropValue};
use crate::emitter::EventEmitter;
use crate::lifecycle::{Component, Invocation};
use crate::registry::{
    self, BindEntry, Category, HookEntry, HookPhase, ListenerEntry, ListenerScope, MetaEntry,
    MethodEntry, OutputEntry, PropertyEntry, RenderFn, RenderMode, WidgetDescriptor,
};

/// Declaration-time builder for one widget type with state `S`
pub struct WidgetSpec<S> {
    selector: String,
    mode: RenderMode,
    render: Option<RenderFn>,
    methods: Vec<MethodEntry>,
    exposed: Vec<String>,
    properties: Vec<PropertyEntry>,
    bindings: Vec<BindEntry>,
    outputs: Vec<OutputEntry>,
    hooks: Vec<HookEntry>,
    listeners: Vec<ListenerEntry>,
    _state: PhantomData<S>,
}

impl<S: Default + 'static> WidgetSpec<S> {
    /// Start declaring a widget registered under `selector`
    pub fn new(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            mode: RenderMode::Light,
            render: None,
            methods: Vec::new(),
            exposed: Vec::new(),
            properties: Vec::new(),
            bindings: Vec::new(),
            outputs: Vec::new(),
            hooks: Vec::new(),
            listeners: Vec::new(),
            _state: PhantomData,
        }
    }

    /// Render into an isolated root instead of the host element
    #[must_use]
    pub fn shadow(mut self) -> Self {
        self.mode = RenderMode::Shadow;
        self
    }

    /// The widget's render function - required for the widget to connect
    #[must_use]
    pub fn render(mut self, f: impl Fn(&S) -> String + 'static) -> Self {
        self.render = Some(Rc::new(move |state: &dyn Any| {
            state.downcast_ref::<S>().map(&f).unwrap_or_default()
        }));
        self
    }

    /// Declare an instance method
    #[must_use]
    pub fn method(mut self, name: &str, f: impl Fn(&Component, &Invocation) + 'static) -> Self {
        self.methods.push(MethodEntry {
            name: name.to_string(),
            callable: Rc::new(f),
        });
        self
    }

    /// Flag a declared method for global exposure under its bare name
    #[must_use]
    pub fn expose(mut self, name: &str) -> Self {
        self.exposed.push(name.to_string());
        self
    }

    /// Declare an observed attribute backed by a field of `S`
    ///
    /// The getter/setter pair is the fixed backing-field access the engine
    /// uses; `default` is assigned at connect when the attribute is absent.
    #[must_use]
    pub fn property(
        mut self,
        attribute: &str,
        kind: PropKind,
        default: Option<PropValue>,
        get: impl Fn(&S) -> PropValue + 'static,
        set: impl Fn(&mut S, PropValue) + 'static,
    ) -> Self {
        self.properties.push(PropertyEntry {
            attribute: attribute.to_string(),
            kind,
            default,
            get: Rc::new(move |state: &dyn Any| {
                state
                    .downcast_ref::<S>()
                    .map(&get)
                    .unwrap_or(PropValue::String(String::new()))
            }),
            set: Rc::new(move |state: &mut dyn Any, value| {
                if let Some(state) = state.downcast_mut::<S>() {
                    set(state, value);
                }
            }),
        });
        self
    }

    /// Bind a DOM event on a scoped selector to a declared method
    #[must_use]
    pub fn bind(self, event: &str, selector: &str, method: &str) -> Self {
        self.bind_with_args(event, selector, method, Vec::new())
    }

    /// Bind with fixed leading arguments passed before the event
    #[must_use]
    pub fn bind_with_args(
        mut self,
        event: &str,
        selector: &str,
        method: &str,
        args: Vec<PropValue>,
    ) -> Self {
        self.bindings.push(BindEntry {
            event: event.to_string(),
            selector: selector.to_string(),
            method: method.to_string(),
            args,
        });
        self
    }

    /// Declare a change-output field, emitting as `on<Field>Change`
    #[must_use]
    pub fn output(self, field: &str, assign: impl Fn(&mut S, EventEmitter) + 'static) -> Self {
        let event_name = change_event_name(field);
        self.push_output(field, event_name, assign)
    }

    /// Declare a plain event field, emitting as `on<Field>`
    #[must_use]
    pub fn event_output(
        self,
        field: &str,
        assign: impl Fn(&mut S, EventEmitter) + 'static,
    ) -> Self {
        let event_name = plain_event_name(field);
        self.push_output(field, event_name, assign)
    }

    fn push_output(
        mut self,
        field: &str,
        event_name: String,
        assign: impl Fn(&mut S, EventEmitter) + 'static,
    ) -> Self {
        self.outputs.push(OutputEntry {
            field: field.to_string(),
            event_name,
            assign: Rc::new(move |state: &mut dyn Any, emitter| {
                if let Some(state) = state.downcast_mut::<S>() {
                    assign(state, emitter);
                }
            }),
        });
        self
    }

    /// Run once per connect, before anything else
    #[must_use]
    pub fn before_init(mut self, f: impl Fn(&mut S) + 'static) -> Self {
        self.hooks.push(hook_entry(HookPhase::BeforeInit, f));
        self
    }

    /// Run once per connect, after the full connect sequence
    #[must_use]
    pub fn after_init(mut self, f: impl Fn(&mut S) + 'static) -> Self {
        self.hooks.push(hook_entry(HookPhase::AfterInit, f));
        self
    }

    /// Listen for an event on the host element itself, from connect to
    /// disconnect
    #[must_use]
    pub fn host_listener(mut self, event: &str, method: &str) -> Self {
        self.listeners.push(ListenerEntry {
            event: event.to_string(),
            scope: ListenerScope::Host,
            method: method.to_string(),
        });
        self
    }

    /// Listen for an event on the global scope, from connect to disconnect
    #[must_use]
    pub fn global_listener(mut self, event: &str, method: &str) -> Self {
        self.listeners.push(ListenerEntry {
            event: event.to_string(),
            scope: ListenerScope::Global,
            method: method.to_string(),
        });
        self
    }

    /// Write the accumulated declarations into the registry and claim the
    /// selector
    ///
    /// Idempotent and defensive throughout: re-registration keeps first
    /// writers and warns.
    pub fn define(self) {
        let type_id = TypeId::of::<S>();

        for entry in &self.methods {
            registry::fetch_or_create(type_id, Category::Methods, |map| {
                map.entry(entry.name.clone())
                    .or_insert_with(|| MetaEntry::Method(entry.clone()));
            });
        }

        for name in &self.exposed {
            match self.methods.iter().find(|m| &m.name == name) {
                Some(entry) => registry::fetch_or_create(type_id, Category::Exposed, |map| {
                    map.entry(name.clone())
                        .or_insert_with(|| MetaEntry::Method(entry.clone()));
                }),
                None => tracing::warn!(
                    selector = %self.selector,
                    method = %name,
                    "exposure flags an undeclared method, skipping"
                ),
            }
        }

        for entry in &self.properties {
            registry::fetch_or_create(type_id, Category::Properties, |map| {
                if map.contains_key(&entry.attribute) {
                    tracing::warn!(
                        selector = %self.selector,
                        attribute = %entry.attribute,
                        "observed attribute declared twice, keeping first declaration"
                    );
                } else {
                    map.insert(entry.attribute.clone(), MetaEntry::Property(entry.clone()));
                }
            });
        }

        for entry in &self.bindings {
            registry::fetch_or_create(type_id, Category::Bindings, |map| {
                map.entry(entry.method.clone())
                    .or_insert_with(|| MetaEntry::Bind(entry.clone()));
            });
        }

        for entry in &self.outputs {
            registry::fetch_or_create(type_id, Category::Outputs, |map| {
                map.entry(entry.field.clone())
                    .or_insert_with(|| MetaEntry::Output(entry.clone()));
            });
        }

        for entry in &self.hooks {
            registry::fetch_or_create(type_id, Category::Hooks, |map| {
                map.insert(entry.phase.key().to_string(), MetaEntry::Hook(entry.clone()));
            });
        }

        for entry in &self.listeners {
            registry::fetch_or_create(type_id, Category::Listeners, |map| {
                map.entry(format!("{}:{}", entry.event, entry.method))
                    .or_insert_with(|| MetaEntry::Listener(entry.clone()));
            });
        }

        registry::define(WidgetDescriptor {
            selector: self.selector,
            type_id,
            mode: self.mode,
            observed_attributes: self
                .properties
                .iter()
                .map(|p| p.attribute.clone())
                .collect(),
            exposed_methods: self.exposed,
            construct: Rc::new(|| Box::new(S::default()) as Box<dyn Any>),
            render: self.render,
        });
    }
}

fn hook_entry<S: 'static>(phase: HookPhase, f: impl Fn(&mut S) + 'static) -> HookEntry {
    HookEntry {
        phase,
        callable: Rc::new(move |state: &mut dyn Any| {
            if let Some(state) = state.downcast_mut::<S>() {
                f(state);
            }
        }),
    }
}

/// Run a batch of registration functions once at startup
pub fn bootstrap(registrations: &[fn()]) {
    for register in registrations {
        register();
    }
}

/// `count` -> `onCountChange`
fn change_event_name(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => format!(
            "on{}{}Change",
            first.to_uppercase(),
            chars.as_str().to_lowercase()
        ),
        None => "onChange".to_string(),
    }
}

/// `saved` -> `onSaved`
fn plain_event_name(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
        None => "on".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name_derivation() {
        assert_eq!(change_event_name("count"), "onCountChange");
        assert_eq!(change_event_name("pageSize"), "onPagesizeChange");
        assert_eq!(plain_event_name("saved"), "onSaved");
        assert_eq!(plain_event_name("pageSize"), "onPageSize");
    }

    #[test]
    fn test_define_registers_all_categories() {
        #[derive(Default)]
        struct Widget {
            label: String,
        }

        WidgetSpec::<Widget>::new("full-widget")
            .render(|s| format!("<span>{}</span>", s.label))
            .method("poke", |_, _| {})
            .expose("poke")
            .property(
                "label",
                PropKind::String,
                None,
                |s| PropValue::String(s.label.clone()),
                |s, v| s.label = v.as_str().unwrap_or_default().to_string(),
            )
            .bind("click", "#go", "poke")
            .before_init(|_| {})
            .host_listener("refresh", "poke")
            .define();

        let type_id = TypeId::of::<Widget>();
        assert_eq!(registry::entries(type_id, Category::Methods).unwrap().len(), 1);
        assert_eq!(registry::entries(type_id, Category::Exposed).unwrap().len(), 1);
        assert_eq!(
            registry::entries(type_id, Category::Properties).unwrap().len(),
            1
        );
        assert_eq!(registry::entries(type_id, Category::Bindings).unwrap().len(), 1);
        assert_eq!(registry::entries(type_id, Category::Hooks).unwrap().len(), 1);
        assert_eq!(
            registry::entries(type_id, Category::Listeners).unwrap().len(),
            1
        );

        let descriptor = registry::definition("full-widget").unwrap();
        assert_eq!(descriptor.observed_attributes, vec!["label".to_string()]);
        assert_eq!(descriptor.exposed_methods, vec!["poke".to_string()]);
        assert_eq!(descriptor.mode, RenderMode::Light);
    }

    #[test]
    fn test_registration_is_idempotent() {
        #[derive(Default)]
        struct Widget;

        fn declare() {
            WidgetSpec::<Widget>::new("twice-widget")
                .render(|_| String::new())
                .method("poke", |_, _| {})
                .define();
        }

        declare();
        declare();

        let type_id = TypeId::of::<Widget>();
        assert_eq!(registry::entries(type_id, Category::Methods).unwrap().len(), 1);
        assert!(registry::definition("twice-widget").is_some());
    }

    #[test]
    fn test_duplicate_attribute_keeps_first() {
        #[derive(Default)]
        struct Widget {
            a: f64,
        }

        WidgetSpec::<Widget>::new("dup-attr-widget")
            .render(|_| String::new())
            .property(
                "value",
                PropKind::Number,
                None,
                |s| PropValue::Number(s.a),
                |s, v| s.a = v.as_number().unwrap_or_default(),
            )
            .property(
                "value",
                PropKind::String,
                None,
                |_| PropValue::String(String::new()),
                |_, _| {},
            )
            .define();

        let properties =
            registry::entries(TypeId::of::<Widget>(), Category::Properties).unwrap();
        assert_eq!(properties.len(), 1);
        let MetaEntry::Property(entry) = &properties["value"] else {
            panic!("expected property entry");
        };
        assert_eq!(entry.kind, PropKind::Number);
    }

    #[test]
    fn test_exposing_undeclared_method_is_skipped() {
        #[derive(Default)]
        struct Widget;

        WidgetSpec::<Widget>::new("bad-expose-widget")
            .render(|_| String::new())
            .expose("ghost")
            .define();

        assert!(registry::entries(TypeId::of::<Widget>(), Category::Exposed).is_none());
    }

    #[test]
    fn test_bootstrap_runs_registrations() {
        #[derive(Default)]
        struct Widget;

        fn declare() {
            WidgetSpec::<Widget>::new("boot-widget")
                .render(|_| String::new())
                .define();
        }

        bootstrap(&[declare]);
        assert!(registry::is_defined("boot-widget"));
    }
}
