//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::Once;
pub use testscope::testing::ScriptedRuntime;
pub use testscope::{
    capture_point_of_entry, setup_lines, ArgValues, CallId, CaptureConfig, CaptureReport, CodeId,
    CodeInfo, Dependencies, Dependency, EntryPoint, Execution, Frame, GeneratorFrame, HostValue,
    Method, ObjectId, OpaqueInvocation, Project, RaisedException, RawEvent, SharedProject,
    SideEffectRegistry, TracebackId,
};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route engine logs to the test harness output.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

pub const ROOT: &str = "/work/app";
pub const CALC_FILE: &str = "/work/app/app/calc.py";
pub const STACK_FILE: &str = "/work/app/app/stack.py";
pub const FOREIGN_FILE: &str = "/usr/lib/python/json/__init__.py";

// Code ids of the sample project
pub const F: u64 = 10;
pub const G: u64 = 11;
pub const H: u64 = 12;
pub const COUNT_TO: u64 = 13;
pub const OUTER: u64 = 14;
pub const STACK_INIT: u64 = 20;
pub const STACK_PUSH: u64 = 21;
pub const DUMPS: u64 = 90;

/// Sample project: `app.calc` functions and an `app.stack.Stack` class.
pub fn sample_project() -> SharedProject {
    let mut project = Project::new(ROOT);
    project.add_function("app.calc", "f", &["x"]);
    project.add_function("app.calc", "g", &["a"]);
    project.add_function("app.calc", "h", &["a"]);
    project.add_generator_function("app.calc", "count_to", &["n"]);
    project.add_function("app.calc", "outer", &[]);
    project.add_class(
        "app.stack",
        "Stack",
        vec![
            Method::new("__init__", &["self"]),
            Method::new("push", &["self", "item"]),
        ],
    );
    project.into_shared()
}

/// A `Stack` instance whose methods run the sample project's code.
pub fn stack(handle: u64) -> HostValue {
    HostValue::instance(
        handle,
        "Stack",
        "app.stack",
        vec![
            ("__init__".to_string(), CodeId(STACK_INIT)),
            ("push".to_string(), CodeId(STACK_PUSH)),
        ],
    )
}

// ============================================================================
// Script - fluent event script builder
// ============================================================================

/// Builder for the event stream a [`ScriptedRuntime`] replays.
#[derive(Debug, Default)]
pub struct Script {
    events: Vec<RawEvent>,
}

fn named(args: &[(&str, &HostValue)]) -> ArgValues {
    ArgValues::named(
        args.iter()
            .map(|(name, value)| (name.to_string(), (*value).clone()))
            .collect(),
    )
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a function of `app.calc`.
    pub fn call(mut self, code: u64, name: &str, args: &[(&str, &HostValue)]) -> Self {
        self.events.push(RawEvent::Call(Frame::new(
            CodeInfo::function(code, name, CALC_FILE),
            named(args),
        )));
        self
    }

    /// Enter a function defined outside the project.
    pub fn call_foreign(mut self, code: u64, name: &str, args: &[(&str, &HostValue)]) -> Self {
        self.events.push(RawEvent::Call(Frame::new(
            CodeInfo::function(code, name, FOREIGN_FILE),
            named(args),
        )));
        self
    }

    /// Enter a method of `app.stack`; `receiver` is bound as `self`.
    pub fn call_method(mut self, code: u64, name: &str, receiver: &HostValue, args: &[(&str, &HostValue)]) -> Self {
        let mut all = vec![("self", receiver)];
        all.extend_from_slice(args);
        self.events.push(RawEvent::Call(Frame::new(
            CodeInfo::function(code, name, STACK_FILE),
            named(&all),
        )));
        self
    }

    /// Resume a generator function of `app.calc`.
    pub fn resume(mut self, code: u64, name: &str, generator: &HostValue, args: &[(&str, &HostValue)]) -> Self {
        self.events.push(RawEvent::Call(Frame::resuming(
            CodeInfo::generator(code, name, CALC_FILE),
            named(args),
            generator.clone(),
        )));
        self
    }

    pub fn ret(mut self, value: &HostValue) -> Self {
        self.events.push(RawEvent::Return {
            value: value.clone(),
            handled_traceback: None,
        });
        self
    }

    /// Return after handling the exception raised with `traceback`.
    pub fn ret_handled(mut self, value: &HostValue, traceback: u64) -> Self {
        self.events.push(RawEvent::Return {
            value: value.clone(),
            handled_traceback: Some(TracebackId(traceback)),
        });
        self
    }

    pub fn raise(mut self, exception: &HostValue, traceback: u64) -> Self {
        self.events.push(RawEvent::Exception {
            raised: RaisedException::Instance(exception.clone()),
            traceback: TracebackId(traceback),
        });
        self
    }

    /// Third-party method call on `receiver`, returning `None`.
    pub fn opaque_method(mut self, name: &str, receiver: &HostValue, args: &[&HostValue]) -> Self {
        self.events.push(RawEvent::OpaqueCall(OpaqueInvocation::method(
            name,
            receiver.clone(),
            args.iter().map(|a| (*a).clone()).collect(),
        )));
        self.events.push(RawEvent::OpaqueReturn {
            value: Some(HostValue::none(0)),
        });
        self
    }

    /// Third-party method call on `receiver` that raises.
    pub fn opaque_method_raising(mut self, name: &str, receiver: &HostValue, args: &[&HostValue]) -> Self {
        self.events.push(RawEvent::OpaqueCall(OpaqueInvocation::method(
            name,
            receiver.clone(),
            args.iter().map(|a| (*a).clone()).collect(),
        )));
        self.events.push(RawEvent::OpaqueReturn { value: None });
        self
    }

    /// Third-party function call, returning `None`.
    pub fn opaque_function(mut self, name: &str, args: &[&HostValue]) -> Self {
        self.events.push(RawEvent::OpaqueCall(OpaqueInvocation::function(
            name,
            args.iter().map(|a| (*a).clone()).collect(),
        )));
        self.events.push(RawEvent::OpaqueReturn {
            value: Some(HostValue::none(0)),
        });
        self
    }

    pub fn event(mut self, event: RawEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn build(self) -> Vec<RawEvent> {
        self.events
    }

    pub fn runtime(self) -> ScriptedRuntime {
        ScriptedRuntime::new(self.events)
    }
}

// ============================================================================
// Capturing
// ============================================================================

pub fn entry() -> EntryPoint {
    EntryPoint::new("sample", "run()", ROOT)
}

/// Replay `script` against `project` with default settings.
pub fn capture_with(project: SharedProject, script: Script) -> CaptureReport {
    init_tracing();
    let mut runtime = script.runtime();
    capture_point_of_entry(
        &mut runtime,
        project,
        &entry(),
        &CaptureConfig::default(),
        &SideEffectRegistry::standard(),
    )
    .expect("capture failed")
}

/// Replay `script` against a fresh sample project.
pub fn capture(script: Script) -> CaptureReport {
    capture_with(sample_project(), script)
}

/// Top-level captured calls, in order.
pub fn roots(execution: &Execution) -> Vec<CallId> {
    execution.call_graph().to_vec()
}

/// Object passed to `call` as `param`.
pub fn object_of(execution: &Execution, call: CallId, param: &str) -> ObjectId {
    execution.call(call).input[param]
}
