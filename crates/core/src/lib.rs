//! Core data model for the testscope capture engine
//!
//! This crate defines the types every other crate in the workspace builds on:
//! - Timestamp / Timeline: per-execution logical clock
//! - Ids: arena indices and execution ids
//! - Host value model: what a runtime adapter hands to the engine
//! - Project: registry of the subject program's static definitions
//! - SerializedObject: detached, comparable description of a runtime value
//! - SideEffect and Call: captured behaviour
//! - Execution: the arena owning one run's captured facts
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod call;
pub mod error;
pub mod execution;
pub mod host;
pub mod ids;
pub mod object;
pub mod project;
pub mod side_effect;
pub mod timeline;

pub use call::{Call, CallKind, CallOutcome};
pub use error::{Error, Result};
pub use execution::{human_readable_id, Execution, ExhaustionCheck, FrameReleasedCheck};
pub use host::{
    CodeId, CodeInfo, GeneratorFrame, Handle, HostKind, HostObject, HostValue, Literal,
    SequenceShape, BUILTIN_MODULE,
};
pub use ids::{CallId, ClassId, ExecutionId, FunctionId, MethodId, ObjectId, SideEffectId};
pub use object::{
    library_type, Callable, ExceptionObject, GeneratorActivation, GeneratorObject,
    ImmutableObject, Import, Invocation, LibraryObject, LibraryType, MapObject, ObjectKind,
    SequenceObject, SerializedObject, UnknownObject, UserObject, LIBRARY_TYPES,
};
pub use project::{
    CaptureRef, CaptureTarget, Class, Definition, Function, Method, Project, SharedProject,
    CONSTRUCTOR_NAME,
};
pub use side_effect::{ContainerOp, SideEffect, SideEffectKind};
pub use timeline::{Timeline, Timestamp};
