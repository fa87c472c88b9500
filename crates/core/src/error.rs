//! Error types shared by registries, delegates and weak event bindings.
//!
//! Every variant here is a programmer error: the API was used with a shape,
//! handler or event name that can never work. Nothing in the crate retries
//! after one of these. A weak reference lapsing is not an error and never
//! shows up here.

use thiserror::Error;

/// Failure to build a [`SignatureDescriptor`](crate::shape::SignatureDescriptor)
/// for a shape type.
///
/// Cached alongside successful descriptors, so repeated requests for a broken
/// shape get the same error back without rebuilding anything.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// The shape is not a valid single-call contract
    #[error("shape `{shape}` is not a valid callback contract: {reason}")]
    Unsupported {
        /// Type name of the offending shape
        shape: &'static str,
        /// Human readable explanation
        reason: String,
    },
}

/// Errors returned by the weak multicast API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeakError {
    /// The shape type could not be described
    #[error(transparent)]
    Shape(#[from] ShapeError),

    /// A handler or event does not have the expected parameter and return types
    #[error("`{method}` has signature `{found}`, expected `{expected}`")]
    SignatureMismatch {
        /// Name of the handler method (or event) being attached
        method: &'static str,
        /// Signature the registry or event was declared with
        expected: String,
        /// Signature the handler actually has
        found: String,
    },

    /// The source type has no event with the requested name
    #[error("`{source_type}` has no event named `{event}`")]
    NoSuchEvent {
        /// Type name of the event source
        source_type: &'static str,
        /// Requested event name
        event: String,
    },

    /// A configuration document could not be parsed
    #[error("invalid registry configuration: {0}")]
    Config(String),
}

/// Result type for weak multicast operations
pub type WeakResult<T> = Result<T, WeakError>;
