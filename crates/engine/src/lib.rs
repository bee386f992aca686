//! Capture engine for testscope
//!
//! This crate turns a host runtime's event stream into a captured execution:
//! - Config: `testscope.toml` capture settings
//! - Registry: recognized third-party container mutations
//! - Tracer: classification of raw events into calls, returns and exceptions
//! - Controller: call graph, identity and side-effect bookkeeping
//! - Capture: running an entry point under the tracer
//!
//! The engine is the only component that knows about:
//! - Host runtimes and their event shapes
//! - Frame-level "do not descend" decisions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capture;
pub mod config;
pub mod controller;
pub mod event;
pub mod instrument;
pub mod registry;
pub mod runtime;
pub mod testing;
pub mod tracer;

pub use capture::{capture_point_of_entry, Capture, CaptureReport, PointOfEntry};
pub use config::{CaptureConfig, CONFIG_FILE_NAME};
pub use controller::CaptureController;
pub use event::{
    ArgValues, Descend, Directive, EventSink, Frame, OpaqueInvocation, RaisedException, RawEvent,
    TracebackId,
};
pub use instrument::Instrumenter;
pub use registry::SideEffectRegistry;
pub use runtime::{EntryPoint, EntryPointFailure, HostRuntime, TracingGuard};
pub use tracer::{classify_frame, method_information, Callback, FrameShape, NotMethodFrame, Tracer};
