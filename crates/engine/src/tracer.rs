//! Runtime instrumentation adapter
//!
//! The [`Tracer`] turns the host's raw event stream into the higher level
//! callbacks of the [`Callback`] trait:
//!
//! - frames of class bodies, of the driver code and of ignored code names are
//!   skipped, together with their returns and exceptions
//! - every other frame is classified as a method or a function call
//! - exceptions of every shape become one host value
//! - callables handed to third-party code and freshly loaded modules are
//!   queued for instrumentation exactly once
//!
//! Frames the callback declines (`Descend::No`) keep running; their nested
//! frames are still reported, only their own returns and exceptions are
//! swallowed.

use crate::config::CaptureConfig;
use crate::event::{
    Descend, Directive, EventSink, Frame, OpaqueInvocation, RaisedException, RawEvent,
    TracebackId,
};
use crate::instrument::Instrumenter;
use rustc_hash::FxHashSet;
use testscope_core::{
    CodeId, Handle, HostKind, HostObject, HostValue, Literal, SequenceShape, BUILTIN_MODULE,
};
use tracing::{debug, trace};

/// Receiver of classified events
///
/// The capture controller is the production implementation.
pub trait Callback {
    /// A method `name` was called on `receiver`; `args` exclude the receiver
    fn method_called(
        &mut self,
        name: &str,
        receiver: &HostValue,
        args: &[(String, HostValue)],
        frame: &Frame,
    ) -> Descend;

    /// A function `name` was called
    fn function_called(&mut self, name: &str, args: &[(String, HostValue)], frame: &Frame) -> Descend;

    /// The innermost traced call returned
    fn returned(&mut self, value: &HostValue, handled_traceback: Option<TracebackId>);

    /// An exception passed through the innermost traced call
    fn raised(&mut self, exception: &HostValue, traceback: TracebackId);

    /// Untraced code was entered
    fn opaque_called(&mut self, invocation: &OpaqueInvocation);

    /// Untraced code returned
    fn opaque_returned(&mut self, value: Option<&HostValue>);

    /// A module-level name was read
    fn global_read(&mut self, module: &str, name: &str, value: &HostValue);

    /// A module-level name was rebound
    fn global_rebind(&mut self, module: &str, name: &str, value: &HostValue);

    /// An attribute was rebound
    fn attribute_rebind(&mut self, target: &HostValue, name: &str, value: &HostValue);
}

// =============================================================================
// Frame classification
// =============================================================================

/// Classified call frame
#[derive(Debug, Clone)]
pub enum FrameShape {
    /// Call of a method bound on `receiver`
    Method {
        /// Bound receiver
        receiver: HostValue,
        /// Arguments without the receiver
        args: Vec<(String, HostValue)>,
    },
    /// Call of a free function
    Function {
        /// All arguments
        args: Vec<(String, HostValue)>,
    },
}

/// The frame does not run a method of its first argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotMethodFrame;

/// Source of handles for values the engine builds itself
#[derive(Debug, Default)]
pub struct SyntheticHandles {
    next: u64,
}

impl SyntheticHandles {
    /// Hand out a fresh synthetic handle
    pub fn next_handle(&mut self) -> Handle {
        self.next += 1;
        Handle::synthetic(self.next)
    }
}

fn synthetic_value(handle: Handle, type_name: &str, kind: HostKind) -> HostValue {
    HostValue::new(HostObject {
        handle,
        type_name: type_name.to_string(),
        module: BUILTIN_MODULE.to_string(),
        kind,
        methods: Vec::new(),
    })
}

/// Extract the receiver and remaining arguments of a method frame
///
/// The receiver is the first named argument or, when there is none, the head
/// of the variadic positional tuple. It only counts as a receiver when the
/// method it binds under the frame's name runs the frame's code. A receiver
/// taken from the variadic tuple leaves the tail behind as a new tuple.
pub fn method_information(
    frame: &Frame,
    synthetic: &mut SyntheticHandles,
) -> Result<(HostValue, Vec<(String, HostValue)>), NotMethodFrame> {
    let receiver = match (frame.args.named.first(), &frame.args.varargs) {
        (Some((_, first)), _) => first.clone(),
        (None, Some((_, tuple))) => tuple
            .sequence_items()
            .and_then(|items| items.first())
            .cloned()
            .ok_or(NotMethodFrame)?,
        (None, None) => return Err(NotMethodFrame),
    };

    if receiver.method_code(&frame.code.name) != Some(frame.code.id) {
        return Err(NotMethodFrame);
    }

    let mut args: Vec<(String, HostValue)> = Vec::new();
    if frame.args.named.is_empty() {
        if let Some((name, tuple)) = &frame.args.varargs {
            let tail = tuple
                .sequence_items()
                .map(|items| items[1..].to_vec())
                .unwrap_or_default();
            let repacked = synthetic_value(
                synthetic.next_handle(),
                SequenceShape::Tuple.type_name(),
                HostKind::Sequence {
                    shape: SequenceShape::Tuple,
                    items: tail,
                },
            );
            args.push((name.clone(), repacked));
        }
    } else {
        args.extend(frame.args.named[1..].iter().cloned());
        if let Some(varargs) = &frame.args.varargs {
            args.push(varargs.clone());
        }
    }
    if let Some(varkw) = &frame.args.varkw {
        args.push(varkw.clone());
    }
    Ok((receiver, args))
}

/// Classify a frame as a method or a function call
pub fn classify_frame(frame: &Frame, synthetic: &mut SyntheticHandles) -> FrameShape {
    match method_information(frame, synthetic) {
        Ok((receiver, args)) => FrameShape::Method { receiver, args },
        Err(NotMethodFrame) => FrameShape::Function {
            args: frame.args.flatten(),
        },
    }
}

// =============================================================================
// Tracer
// =============================================================================

#[derive(Debug)]
struct FrameState {
    traced: bool,
    last_exception: Option<Handle>,
}

/// Adapter between a host's event stream and a [`Callback`]
#[derive(Debug)]
pub struct Tracer<C: Callback> {
    callback: C,
    config: CaptureConfig,
    instrumenter: Instrumenter,
    synthetic: SyntheticHandles,
    frames: Vec<FrameState>,
    opaque_depth: usize,
    ignored_codes: FxHashSet<CodeId>,
}

impl<C: Callback> Tracer<C> {
    /// Create a tracer feeding `callback`
    pub fn new(callback: C, config: &CaptureConfig) -> Self {
        Tracer {
            callback,
            config: config.clone(),
            instrumenter: Instrumenter::new(),
            synthetic: SyntheticHandles::default(),
            frames: Vec::new(),
            opaque_depth: 0,
            ignored_codes: FxHashSet::default(),
        }
    }

    /// Start from an instrumenter carried over from earlier runs
    pub fn with_instrumenter(mut self, instrumenter: Instrumenter) -> Self {
        self.instrumenter = instrumenter;
        self
    }

    /// Never capture frames running `code` (the driver of the entry point)
    pub fn ignore_code(&mut self, code: CodeId) {
        self.ignored_codes.insert(code);
    }

    /// The callback
    pub fn callback(&self) -> &C {
        &self.callback
    }

    /// Consume the tracer, returning its callback
    pub fn into_callback(self) -> C {
        self.callback
    }

    /// Code units queued for rewriting so far
    pub fn instrumenter(&self) -> &Instrumenter {
        &self.instrumenter
    }

    /// Number of frames currently entered
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn should_ignore_frame(&self, frame: &Frame) -> bool {
        frame.code.is_class_body
            || self.config.ignores_code(&frame.code.name)
            || self.ignored_codes.contains(&frame.code.id)
    }

    fn record_call(&mut self, frame: &Frame) -> Descend {
        match classify_frame(frame, &mut self.synthetic) {
            FrameShape::Method { receiver, args } => {
                self.callback
                    .method_called(&frame.code.name, &receiver, &args, frame)
            }
            FrameShape::Function { args } => {
                self.callback.function_called(&frame.code.name, &args, frame)
            }
        }
    }

    /// Turn any reported exception shape into one host value
    fn normalize(&mut self, raised: RaisedException) -> HostValue {
        match raised {
            RaisedException::Instance(value) => value,
            RaisedException::TypeAndMessage { type_name, message } => {
                let message = synthetic_value(
                    self.synthetic.next_handle(),
                    "str",
                    HostKind::Literal(Literal::Str(message)),
                );
                synthetic_value(
                    self.synthetic.next_handle(),
                    &type_name,
                    HostKind::Exception {
                        args: vec![message],
                        builtin: true,
                    },
                )
            }
            RaisedException::TypeAndArgs { type_name, args } => synthetic_value(
                self.synthetic.next_handle(),
                &type_name,
                HostKind::Exception {
                    args,
                    builtin: true,
                },
            ),
            RaisedException::Legacy(text) => synthetic_value(
                self.synthetic.next_handle(),
                "str",
                HostKind::Literal(Literal::Str(text)),
            ),
        }
    }

    fn on_call(&mut self, frame: Frame) -> Directive {
        if self.should_ignore_frame(&frame) {
            trace!(target: "testscope::tracer", code = %frame.code.name, "Ignored frame");
            self.frames.push(FrameState {
                traced: false,
                last_exception: None,
            });
            return Directive::skip();
        }

        let descend = self.record_call(&frame);
        let traced = descend == Descend::Yes;
        self.frames.push(FrameState {
            traced,
            last_exception: None,
        });

        let mut directive = Directive {
            descend,
            rewrite: Default::default(),
        };
        if traced && self.instrumenter.request(frame.code.id) {
            directive.rewrite.push(frame.code.id);
        }
        directive
    }

    fn on_exception(&mut self, raised: RaisedException, traceback: TracebackId) {
        if self.config.ignores_exception(raised.type_name()) {
            trace!(target: "testscope::tracer", exception = raised.type_name(), "Ignored exception");
            return;
        }
        let top = match self.frames.last_mut() {
            Some(top) if top.traced => top,
            _ => return,
        };
        if let RaisedException::Instance(value) = &raised {
            if top.last_exception == Some(value.handle()) {
                return;
            }
            top.last_exception = Some(value.handle());
        }
        let exception = self.normalize(raised);
        self.callback.raised(&exception, traceback);
    }
}

impl<C: Callback> EventSink for Tracer<C> {
    fn on_event(&mut self, event: RawEvent) -> Directive {
        match event {
            RawEvent::Call(frame) => return self.on_call(frame),
            RawEvent::Return {
                value,
                handled_traceback,
            } => match self.frames.pop() {
                Some(state) if state.traced => self.callback.returned(&value, handled_traceback),
                Some(_) => {}
                None => trace!(target: "testscope::tracer", "Return without a matching call"),
            },
            RawEvent::Exception { raised, traceback } => self.on_exception(raised, traceback),
            RawEvent::OpaqueCall(invocation) => {
                let mut directive = Directive::proceed();
                for code in &invocation.callables {
                    if self.instrumenter.request(*code) {
                        directive.rewrite.push(*code);
                    }
                }
                self.opaque_depth += 1;
                self.callback.opaque_called(&invocation);
                return directive;
            }
            RawEvent::OpaqueReturn { value } => {
                if self.opaque_depth == 0 {
                    trace!(target: "testscope::tracer", "Opaque return without a matching call");
                } else {
                    self.opaque_depth -= 1;
                    self.callback.opaque_returned(value.as_ref());
                }
            }
            RawEvent::GlobalRead {
                module,
                name,
                value,
            } => self.callback.global_read(&module, &name, &value),
            RawEvent::GlobalRebind {
                module,
                name,
                value,
            } => self.callback.global_rebind(&module, &name, &value),
            RawEvent::AttributeRebind {
                target,
                name,
                value,
            } => self.callback.attribute_rebind(&target, &name, &value),
            RawEvent::ModuleLoaded { module, codes } => {
                let mut directive = Directive::proceed();
                for code in codes {
                    if self.instrumenter.request(code) {
                        directive.rewrite.push(code);
                    }
                }
                debug!(
                    target: "testscope::tracer",
                    module = %module,
                    rewritten = directive.rewrite.len(),
                    "Module loaded"
                );
                return directive;
            }
        }
        Directive::proceed()
    }
}
