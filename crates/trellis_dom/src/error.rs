//! Error types for trellis_dom

use thiserror::Error;

/// Errors that can occur in the host document model
#[derive(Error, Debug)]
pub enum DomError {
    /// Markup text could not be parsed
    #[error("markup parse failed at byte {position}: {message}")]
    MarkupParse {
        /// Byte offset into the markup text where parsing stopped
        position: usize,
        /// What the parser expected or found
        message: String,
    },

    /// A node id no longer refers to a live node
    #[error("stale node reference")]
    StaleNode,
}

/// Result type for trellis_dom operations
pub type Result<T> = std::result::Result<T, DomError>;
