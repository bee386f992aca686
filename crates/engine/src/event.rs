//! Raw runtime events
//!
//! A host runtime reports what the subject program does as a stream of
//! [`RawEvent`]s. The stream is low level: every frame entered produces a
//! `Call` and a matching `Return`, whether or not the engine cares about the
//! frame. Third-party code the host cannot trace shows up as paired
//! `OpaqueCall` / `OpaqueReturn` events.
//!
//! ## Exception shapes
//!
//! Runtimes do not agree on how a raised exception is reported. Some hand over
//! the instance, some only the type plus a message or an argument tuple, and
//! some legacy runtimes raise plain strings. [`RaisedException`] covers all of
//! them; the tracer turns each into one `HostValue`.

use smallvec::SmallVec;
use testscope_core::{CodeId, CodeInfo, HostValue};

/// Identity of a traceback, as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TracebackId(pub u64);

/// Arguments bound in a frame
#[derive(Debug, Clone, Default)]
pub struct ArgValues {
    /// Named parameters in declaration order
    pub named: Vec<(String, HostValue)>,
    /// Variadic positional parameter and its tuple value
    pub varargs: Option<(String, HostValue)>,
    /// Variadic keyword parameter and its map value
    pub varkw: Option<(String, HostValue)>,
}

impl ArgValues {
    /// Frame arguments with only named parameters
    pub fn named(args: Vec<(String, HostValue)>) -> Self {
        ArgValues {
            named: args,
            ..Self::default()
        }
    }

    /// All arguments as (name, value) pairs, variadic ones last
    pub fn flatten(&self) -> Vec<(String, HostValue)> {
        self.named
            .iter()
            .chain(self.varargs.iter())
            .chain(self.varkw.iter())
            .cloned()
            .collect()
    }
}

/// A frame being entered
#[derive(Debug, Clone)]
pub struct Frame {
    /// Code running in the frame
    pub code: CodeInfo,
    /// Bound arguments
    pub args: ArgValues,
    /// Generator object whose frame is being resumed
    pub generator: Option<HostValue>,
}

impl Frame {
    /// Frame of a plain function or method body
    pub fn new(code: CodeInfo, args: ArgValues) -> Self {
        Frame {
            code,
            args,
            generator: None,
        }
    }

    /// Frame resuming `generator`
    pub fn resuming(code: CodeInfo, args: ArgValues, generator: HostValue) -> Self {
        Frame {
            code,
            args,
            generator: Some(generator),
        }
    }
}

/// An exception as reported by the host
#[derive(Debug, Clone)]
pub enum RaisedException {
    /// Exception instance created by a raise statement
    Instance(HostValue),
    /// Interpreter exception reported as its type and message
    TypeAndMessage {
        /// Exception type name
        type_name: String,
        /// Message argument
        message: String,
    },
    /// Interpreter exception reported as its type and argument tuple
    TypeAndArgs {
        /// Exception type name
        type_name: String,
        /// Constructor arguments
        args: Vec<HostValue>,
    },
    /// String raised as an exception
    Legacy(String),
}

impl RaisedException {
    /// Type name used for filtering
    pub fn type_name(&self) -> &str {
        match self {
            RaisedException::Instance(value) => value.type_name(),
            RaisedException::TypeAndMessage { type_name, .. }
            | RaisedException::TypeAndArgs { type_name, .. } => type_name,
            RaisedException::Legacy(text) => text,
        }
    }
}

/// Call into code the host does not trace
#[derive(Debug, Clone)]
pub struct OpaqueInvocation {
    /// Operation name (method or function name)
    pub name: String,
    /// Bound receiver, for method calls
    pub receiver: Option<HostValue>,
    /// Positional arguments
    pub args: Vec<HostValue>,
    /// Keyword arguments
    pub kwargs: Vec<(String, HostValue)>,
    /// Code of subject-program callables passed as arguments
    pub callables: Vec<CodeId>,
}

impl OpaqueInvocation {
    /// Method call on `receiver`
    pub fn method(name: impl Into<String>, receiver: HostValue, args: Vec<HostValue>) -> Self {
        OpaqueInvocation {
            name: name.into(),
            receiver: Some(receiver),
            args,
            kwargs: Vec::new(),
            callables: Vec::new(),
        }
    }

    /// Free function call
    pub fn function(name: impl Into<String>, args: Vec<HostValue>) -> Self {
        OpaqueInvocation {
            name: name.into(),
            receiver: None,
            args,
            kwargs: Vec::new(),
            callables: Vec::new(),
        }
    }
}

/// Event reported by the host runtime
#[derive(Debug, Clone)]
pub enum RawEvent {
    /// A frame was entered
    Call(Frame),
    /// The innermost frame returned
    Return {
        /// Returned value
        value: HostValue,
        /// Traceback of the exception currently handled in the frame, if any
        handled_traceback: Option<TracebackId>,
    },
    /// An exception passed through the innermost frame
    Exception {
        /// The exception, in whatever shape the host reports
        raised: RaisedException,
        /// Traceback identity
        traceback: TracebackId,
    },
    /// Untraced code was entered
    OpaqueCall(OpaqueInvocation),
    /// Untraced code returned (`None` when it raised)
    OpaqueReturn {
        /// Returned value
        value: Option<HostValue>,
    },
    /// A module-level name was read
    GlobalRead {
        /// Module holding the name
        module: String,
        /// Name
        name: String,
        /// Value read
        value: HostValue,
    },
    /// A module-level name was rebound
    GlobalRebind {
        /// Module holding the name
        module: String,
        /// Name
        name: String,
        /// New value
        value: HostValue,
    },
    /// An attribute was rebound
    AttributeRebind {
        /// Object whose attribute changed
        target: HostValue,
        /// Attribute name
        name: String,
        /// New value
        value: HostValue,
    },
    /// A module was loaded at run time
    ModuleLoaded {
        /// Dotted module name
        module: String,
        /// Code units defined by the module
        codes: Vec<CodeId>,
    },
}

/// Whether the tracer should follow a frame's returns and exceptions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descend {
    /// Keep tracing the frame
    Yes,
    /// Ignore the frame's own events
    No,
}

/// Reply of an event sink to one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Whether the frame just entered is traced
    pub descend: Descend,
    /// Code units the host has to rewrite before continuing
    pub rewrite: SmallVec<[CodeId; 2]>,
}

impl Directive {
    /// Continue without changes
    pub fn proceed() -> Self {
        Directive {
            descend: Descend::Yes,
            rewrite: SmallVec::new(),
        }
    }

    /// Do not trace the frame just entered
    pub fn skip() -> Self {
        Directive {
            descend: Descend::No,
            rewrite: SmallVec::new(),
        }
    }
}

/// Consumer of a host's event stream
pub trait EventSink {
    /// Handle one event
    fn on_event(&mut self, event: RawEvent) -> Directive;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_puts_variadics_last() {
        let args = ArgValues {
            named: vec![("a".to_string(), HostValue::int(1, 1))],
            varargs: Some(("rest".to_string(), HostValue::tuple(2, vec![]))),
            varkw: Some(("options".to_string(), HostValue::map(3, vec![]))),
        };
        let names: Vec<String> = args.flatten().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "rest", "options"]);
    }

    #[test]
    fn test_raised_exception_type_names() {
        let instance = RaisedException::Instance(HostValue::exception(1, "ValueError", vec![]));
        let message = RaisedException::TypeAndMessage {
            type_name: "NameError".to_string(),
            message: "x".to_string(),
        };
        assert_eq!(instance.type_name(), "ValueError");
        assert_eq!(message.type_name(), "NameError");
        assert_eq!(RaisedException::Legacy("Oops".to_string()).type_name(), "Oops");
    }
}
