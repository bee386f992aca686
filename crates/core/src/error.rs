//! Error types for the capture engine
//!
//! This module defines all error types used throughout the workspace.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Most irregularities met while tracing are not errors at all: foreign calls
//! are skipped, unclassifiable method frames become function calls and
//! unregistered opaque mutations are simply not recorded. The variants below
//! cover the few conditions a caller has to react to.

use crate::ids::{CallId, ObjectId, SideEffectId};
use std::io;
use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the capture engine
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (config files)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Another capture context already owns the runtime's event stream
    #[error("Instrumentation is already installed on this runtime")]
    AlreadyTracing,

    /// Object id does not belong to this execution
    #[error("Unknown object: {0:?}")]
    UnknownObject(ObjectId),

    /// Call id does not belong to this execution
    #[error("Unknown call: {0:?}")]
    UnknownCall(CallId),

    /// Side effect id does not belong to this execution
    #[error("Unknown side effect: {0:?}")]
    UnknownSideEffect(SideEffectId),

    /// Object was expected to be a user object
    #[error("Object {0:?} is not an instance of a project class")]
    NotAUserObject(ObjectId),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid operation or state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}
