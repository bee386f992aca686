//! Test dependency resolution for testscope
//!
//! Turns a captured call (or user object) chosen as a test subject into the
//! setup a generated test needs:
//! - [`Dependencies`]: causally sorted, pruned list of objects and side effects
//! - [`optimizer`]: folds list creation and appends into one literal
//! - [`reconstruct`]: source text and imports for every setup entry
//!
//! ## Usage
//!
//! ```
//! use testscope_core::{CallOutcome, Execution, HostValue, Project};
//! use testscope_resolve::Dependencies;
//!
//! let mut project = Project::new("/work/app");
//! let f = project.add_function("app", "f", &["x"]);
//! let mut execution = Execution::new(project.into_shared());
//!
//! let call = execution.create_function_call(f, &[("x".to_string(), HostValue::int(1, 42))], None);
//! let output = execution.serialize(&HostValue::none(2));
//! execution.set_outcome(call, CallOutcome::Returned(output)).unwrap();
//! execution.complete_call(call).unwrap();
//!
//! let dependencies = Dependencies::for_call(&execution, call).unwrap();
//! assert!(dependencies.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dependencies;
pub mod optimizer;
pub mod reconstruct;

pub use dependencies::{CollapsedSequence, Dependencies, Dependency};
pub use optimizer::optimize;
pub use reconstruct::{
    call_as_string_for, constructor_as_string, setup_lines, side_effect_as_string, AssignedNames,
    CodeString, Setup, SetupLine,
};
