//! Error types for trellis_core

use thiserror::Error;

/// Errors raised by the type coercion provider
///
/// Every variant carries the raw attribute text so the failure can be
/// traced back to the offending input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    /// The text does not parse as a number
    #[error("value is not of type number: {raw}")]
    NotANumber { raw: String },

    /// The text is neither `true` nor `false`
    #[error("value is not of type boolean: {raw}")]
    NotABoolean { raw: String },

    /// The text does not parse as a structured literal
    #[error("value is not a structured literal: {raw}")]
    NotAnObject { raw: String },

    /// The text does not parse as a single-expression callable
    #[error("value is not a single-expression function: {raw}")]
    NotAFunction { raw: String },
}

/// Errors raised by the widget lifecycle engine
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// No widget registration claims the selector
    #[error("no widget is defined for selector {selector}")]
    UnknownSelector {
        /// The selector that was looked up
        selector: String,
    },

    /// The registration supplied no render function
    ///
    /// Raised at connect time; a widget without a renderer cannot be
    /// connected.
    #[error("widget {selector} has no render implementation")]
    MissingRender {
        /// The widget's selector
        selector: String,
    },

    /// An observed attribute's text was rejected by its coercion kind
    ///
    /// The attribute-change transition that raised this left every
    /// property and the previously rendered markup untouched.
    #[error("attribute {attribute} rejected its value: {source}")]
    Property {
        /// The observed attribute whose update failed
        attribute: String,
        /// The underlying coercion failure
        #[source]
        source: ConvertError,
    },

    /// The host document rejected an operation
    #[error(transparent)]
    Dom(#[from] trellis_dom::DomError),
}

/// Result type for trellis_core operations
pub type Result<T> = std::result::Result<T, LifecycleError>;
