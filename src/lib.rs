//! testscope - execution capture and test dependency resolution
//!
//! testscope runs a sample program under instrumentation, records every call
//! into the project's own code together with detached descriptions of the
//! values involved, and works out which of those values and side effects a
//! generated unit test has to recreate.
//!
//! # Quick Start
//!
//! ```ignore
//! use testscope::{capture_point_of_entry, setup_lines, CaptureConfig, Dependencies, EntryPoint, SideEffectRegistry};
//!
//! let report = capture_point_of_entry(
//!     &mut runtime,
//!     project,
//!     &EntryPoint::new("smoke", "run()", "/work/app"),
//!     &CaptureConfig::default(),
//!     &SideEffectRegistry::standard(),
//! )?;
//!
//! for &call in report.execution.captured_calls() {
//!     let dependencies = Dependencies::for_call(&report.execution, call)?;
//!     for line in setup_lines(&report.execution, &dependencies).lines {
//!         println!("{}", line);
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - `testscope-core`: data model and the execution arena
//! - `testscope-engine`: tracer, capture controller and host runtime seam
//! - `testscope-resolve`: dependency closure and reconstruction code

pub use testscope_core::*;
pub use testscope_engine::*;
pub use testscope_resolve::*;
