//! Execution capture controller
//!
//! The controller receives classified events from the tracer and turns them
//! into calls, objects and side effects on an [`Execution`]. It keeps an
//! explicit stack of the captured calls and opaque invocations currently in
//! flight; the innermost captured call owns every side effect observed.
//!
//! Calls into code the project does not define are declined before anything
//! about them is serialized, so values handed to third-party code leave no
//! trace unless something else captures them.

use crate::config::CaptureConfig;
use crate::event::{Descend, Frame, OpaqueInvocation, TracebackId};
use crate::registry::SideEffectRegistry;
use crate::tracer::Callback;
use std::path::Path;
use testscope_core::{
    CallId, CallOutcome, ContainerOp, Definition, Execution, FunctionId, HostValue, MethodId,
    ObjectId, SideEffectKind,
};
use tracing::{debug, trace, warn};

/// Third-party call in flight
#[derive(Debug, Clone)]
struct OpaqueFrame {
    name: String,
    /// Registered mutation with its serialized receiver and arguments
    mutation: Option<(ContainerOp, ObjectId, Vec<ObjectId>)>,
}

#[derive(Debug, Clone)]
enum StackFrame {
    Call(CallId),
    Opaque(OpaqueFrame),
}

/// Builds the call graph of one execution from tracer callbacks
#[derive(Debug)]
pub struct CaptureController<'a> {
    execution: Execution,
    registry: &'a SideEffectRegistry,
    config: &'a CaptureConfig,
    stack: Vec<StackFrame>,
    last_traceback: Option<TracebackId>,
}

impl<'a> CaptureController<'a> {
    /// Create a controller recording into `execution`
    pub fn new(execution: Execution, registry: &'a SideEffectRegistry, config: &'a CaptureConfig) -> Self {
        CaptureController {
            execution,
            registry,
            config,
            stack: Vec::new(),
            last_traceback: None,
        }
    }

    /// The execution being recorded
    pub fn execution(&self) -> &Execution {
        &self.execution
    }

    /// Consume the controller, returning the execution
    pub fn into_execution(self) -> Execution {
        self.execution
    }

    /// Innermost captured call in flight
    pub fn current_call(&self) -> Option<CallId> {
        self.stack.iter().rev().find_map(|frame| match frame {
            StackFrame::Call(id) => Some(*id),
            StackFrame::Opaque(_) => None,
        })
    }

    /// Number of frames in flight, opaque ones included
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn resolve_method(&self, name: &str, receiver: &HostValue) -> Option<MethodId> {
        let project = self.execution.project().read();
        let class = project.find_class(receiver.type_name(), receiver.module())?;
        project.find_method(class, name)
    }

    fn resolve_function(&self, name: &str, frame: &Frame) -> Option<FunctionId> {
        let project = self.execution.project().read();
        let path = Path::new(&frame.code.filename);
        if !project.contains_path(path) {
            return None;
        }
        let module = project.module_for_path(path)?;
        project.find_function(name, &module)
    }

    fn push_call(&mut self, call: testscope_core::Result<CallId>, name: &str) -> Descend {
        match call {
            Ok(id) => {
                trace!(target: "testscope::capture", call = ?id, name, "Call captured");
                self.stack.push(StackFrame::Call(id));
                Descend::Yes
            }
            Err(e) => {
                warn!(target: "testscope::capture", name, error = %e, "Call not captured");
                Descend::No
            }
        }
    }

    fn record(&mut self, kind: SideEffectKind) {
        let owner = self.current_call();
        let id = self.execution.record_side_effect(kind, owner);
        trace!(target: "testscope::capture", side_effect = ?id, owner = ?owner, "Side effect recorded");
    }
}

impl<'a> Callback for CaptureController<'a> {
    fn method_called(
        &mut self,
        name: &str,
        receiver: &HostValue,
        args: &[(String, HostValue)],
        frame: &Frame,
    ) -> Descend {
        let method = match self.resolve_method(name, receiver) {
            Some(method) => method,
            None => {
                debug!(
                    target: "testscope::capture",
                    name,
                    class = receiver.type_name(),
                    "Method outside the project"
                );
                return Descend::No;
            }
        };
        let caller = self.current_call();
        let call = match &frame.generator {
            Some(generator) => self.execution.create_generator_invocation(
                generator,
                Definition::Method(method),
                args,
                Some(receiver),
                caller,
            ),
            None => self
                .execution
                .create_method_call(method, receiver, args, caller),
        };
        self.push_call(call, name)
    }

    fn function_called(&mut self, name: &str, args: &[(String, HostValue)], frame: &Frame) -> Descend {
        let function = match self.resolve_function(name, frame) {
            Some(function) => function,
            None => {
                debug!(
                    target: "testscope::capture",
                    name,
                    file = %frame.code.filename,
                    "Function outside the project"
                );
                return Descend::No;
            }
        };
        let caller = self.current_call();
        let call = match &frame.generator {
            Some(generator) => self.execution.create_generator_invocation(
                generator,
                Definition::Function(function),
                args,
                None,
                caller,
            ),
            None => Ok(self.execution.create_function_call(function, args, caller)),
        };
        self.push_call(call, name)
    }

    fn returned(&mut self, value: &HostValue, handled_traceback: Option<TracebackId>) {
        let call = match self.stack.pop() {
            Some(StackFrame::Call(id)) => id,
            Some(StackFrame::Opaque(frame)) => {
                warn!(target: "testscope::capture", name = %frame.name, "Return inside an opaque call");
                return;
            }
            None => return,
        };

        let handled = handled_traceback.is_some() && handled_traceback == self.last_traceback;
        let raised = self.execution.call(call).raised();
        if !raised || handled {
            let output = self.execution.serialize(value);
            if let Err(e) = self.execution.set_outcome(call, CallOutcome::Returned(output)) {
                warn!(target: "testscope::capture", call = ?call, error = %e, "Outcome not recorded");
            }
        }
        if let Err(e) = self.execution.complete_call(call) {
            warn!(target: "testscope::capture", call = ?call, error = %e, "Completion not recorded");
        }
    }

    fn raised(&mut self, exception: &HostValue, traceback: TracebackId) {
        let call = match self.stack.last() {
            Some(StackFrame::Call(id)) => *id,
            _ => return,
        };
        let exception = self.execution.serialize(exception);
        if let Err(e) = self.execution.set_outcome(call, CallOutcome::Raised(exception)) {
            warn!(target: "testscope::capture", call = ?call, error = %e, "Exception not recorded");
        }
        self.last_traceback = Some(traceback);
    }

    fn opaque_called(&mut self, invocation: &OpaqueInvocation) {
        let op = match &invocation.receiver {
            Some(receiver) if self.config.record_opaque_side_effects => {
                let op = self.registry.get(receiver.type_name(), &invocation.name);
                if op.is_none() {
                    debug!(
                        target: "testscope::capture",
                        receiver = receiver.type_name(),
                        operation = %invocation.name,
                        "Unregistered opaque operation"
                    );
                }
                op.map(|op| (op, receiver))
            }
            _ => None,
        };
        // Serialized on entry so the receiver is captured before it changes
        let mutation = op.map(|(op, receiver)| {
            let receiver = self.execution.serialize(receiver);
            let mut args: Vec<ObjectId> = invocation
                .args
                .iter()
                .map(|arg| self.execution.serialize(arg))
                .collect();
            args.extend(
                invocation
                    .kwargs
                    .iter()
                    .map(|(_, arg)| self.execution.serialize(arg)),
            );
            (op, receiver, args)
        });
        self.stack.push(StackFrame::Opaque(OpaqueFrame {
            name: invocation.name.clone(),
            mutation,
        }));
    }

    fn opaque_returned(&mut self, value: Option<&HostValue>) {
        let frame = match self.stack.pop() {
            Some(StackFrame::Opaque(frame)) => frame,
            Some(other) => {
                warn!(target: "testscope::capture", "Opaque return while a captured call is in flight");
                self.stack.push(other);
                return;
            }
            None => return,
        };
        match (frame.mutation, value) {
            (Some((op, receiver, args)), Some(_)) => {
                self.record(SideEffectKind::ContainerMutation { op, receiver, args })
            }
            (Some(_), None) => {
                debug!(target: "testscope::capture", operation = %frame.name, "Opaque mutation raised, not recorded");
            }
            (None, _) => {}
        }
    }

    fn global_read(&mut self, module: &str, name: &str, value: &HostValue) {
        if !self.config.record_global_reads {
            return;
        }
        let value = self.execution.serialize(value);
        self.record(SideEffectKind::GlobalRead {
            module: module.to_string(),
            name: name.to_string(),
            value,
        });
    }

    fn global_rebind(&mut self, module: &str, name: &str, value: &HostValue) {
        let value = self.execution.serialize(value);
        self.record(SideEffectKind::GlobalRebind {
            module: module.to_string(),
            name: name.to_string(),
            value,
        });
    }

    fn attribute_rebind(&mut self, target: &HostValue, name: &str, value: &HostValue) {
        let known = self
            .execution
            .project()
            .read()
            .find_class(target.type_name(), target.module())
            .is_some();
        if !known {
            trace!(target: "testscope::capture", attribute = name, "Attribute of a foreign object");
            return;
        }
        let target = self.execution.serialize(target);
        let value = self.execution.serialize(value);
        self.record(SideEffectKind::AttributeRebind {
            target,
            name: name.to_string(),
            value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testscope_core::{CodeId, CodeInfo, Method, ObjectKind, Project, SharedProject};

    fn project() -> SharedProject {
        let mut project = Project::new("/work/app");
        project.add_function("app.util", "compact", &["items"]);
        project.add_class(
            "app.stack",
            "Stack",
            vec![Method::new("__init__", &["self"]), Method::new("push", &["self", "x"])],
        );
        project.into_shared()
    }

    fn frame(id: u64, name: &str, file: &str) -> Frame {
        Frame::new(CodeInfo::function(id, name, file), Default::default())
    }

    fn with_controller<F: FnOnce(&mut CaptureController<'_>)>(f: F) -> Execution {
        let registry = SideEffectRegistry::standard();
        let config = CaptureConfig::default();
        let mut controller = CaptureController::new(Execution::new(project()), &registry, &config);
        f(&mut controller);
        controller.into_execution()
    }

    #[test]
    fn test_function_outside_project_is_declined() {
        let exec = with_controller(|c| {
            let args = vec![("x".to_string(), HostValue::list(1, vec![]))];
            let descend = c.function_called("dumps", &args, &frame(1, "dumps", "/usr/lib/json.py"));
            assert_eq!(descend, Descend::No);
        });
        assert!(exec.calls().is_empty());
        assert!(exec.objects().is_empty());
    }

    #[test]
    fn test_unknown_function_name_is_declined() {
        let exec = with_controller(|c| {
            let descend = c.function_called("missing", &[], &frame(1, "missing", "/work/app/app/util.py"));
            assert_eq!(descend, Descend::No);
        });
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn test_nested_calls_build_the_graph() {
        let exec = with_controller(|c| {
            let f = frame(1, "compact", "/work/app/app/util.py");
            assert_eq!(c.function_called("compact", &[], &f), Descend::Yes);
            assert_eq!(c.function_called("compact", &[], &f), Descend::Yes);
            c.returned(&HostValue::int(10, 1), None);
            c.returned(&HostValue::int(11, 2), None);
        });
        let root = exec.call_graph()[0];
        assert_eq!(exec.call(root).subcalls.len(), 1);
        assert!(exec.calls().iter().all(|call| call.is_completed()));
    }

    #[test]
    fn test_method_on_foreign_receiver_is_declined() {
        let exec = with_controller(|c| {
            let socket = HostValue::instance(1, "socket", "socket", vec![("send".to_string(), CodeId(3))]);
            let descend = c.method_called("send", &socket, &[], &frame(3, "send", "/usr/lib/socket.py"));
            assert_eq!(descend, Descend::No);
        });
        assert!(exec.objects().is_empty());
    }

    #[test]
    fn test_raised_then_returned_keeps_exception() {
        let exec = with_controller(|c| {
            c.function_called("compact", &[], &frame(1, "compact", "/work/app/app/util.py"));
            c.raised(&HostValue::exception(5, "ValueError", vec![]), TracebackId(1));
            c.returned(&HostValue::none(6), None);
        });
        let call = exec.call(exec.call_graph()[0]);
        assert!(call.raised());
        // The None return value of a raising call is never serialized
        assert!(exec.objects().iter().all(|o| !o.is_none()));
    }

    #[test]
    fn test_handled_exception_is_cleared() {
        let exec = with_controller(|c| {
            c.function_called("compact", &[], &frame(1, "compact", "/work/app/app/util.py"));
            c.raised(&HostValue::exception(5, "KeyError", vec![]), TracebackId(9));
            c.returned(&HostValue::int(6, 0), Some(TracebackId(9)));
        });
        let call = exec.call(exec.call_graph()[0]);
        assert!(!call.raised());
        assert!(call.output().is_some());
    }

    #[test]
    fn test_registered_opaque_mutation_becomes_side_effect() {
        let exec = with_controller(|c| {
            let items = HostValue::list(1, vec![]);
            let args = vec![("items".to_string(), items.clone())];
            c.function_called("compact", &args, &frame(1, "compact", "/work/app/app/util.py"));
            c.opaque_called(&OpaqueInvocation::method("append", items, vec![HostValue::int(2, 1)]));
            c.opaque_returned(Some(&HostValue::none(4)));
            c.returned(&HostValue::none(3), None);
        });
        let call = exec.call(exec.call_graph()[0]);
        assert_eq!(call.side_effects.len(), 1);
        let effect = exec.side_effect(call.side_effects[0]);
        assert!(matches!(
            effect.kind,
            SideEffectKind::ContainerMutation { op: ContainerOp::ListAppend, .. }
        ));
        assert_eq!(effect.affected_objects.as_slice(), &[call.input["items"]]);
    }

    #[test]
    fn test_raising_opaque_mutation_is_not_recorded() {
        let exec = with_controller(|c| {
            let items = HostValue::list(1, vec![]);
            let args = vec![("items".to_string(), items.clone())];
            c.function_called("compact", &args, &frame(1, "compact", "/work/app/app/util.py"));
            c.opaque_called(&OpaqueInvocation::method("remove", items, vec![HostValue::int(2, 99)]));
            c.opaque_returned(None);
            c.returned(&HostValue::none(3), None);
        });
        assert!(exec.side_effects().is_empty());
        assert!(exec.call(exec.call_graph()[0]).side_effects.is_empty());
    }

    #[test]
    fn test_unregistered_opaque_operation_is_not_recorded() {
        let exec = with_controller(|c| {
            let items = HostValue::list(1, vec![]);
            c.opaque_called(&OpaqueInvocation::method("index", items, vec![HostValue::int(2, 1)]));
            c.opaque_returned(Some(&HostValue::int(3, 0)));
        });
        assert!(exec.side_effects().is_empty());
        assert!(exec.objects().is_empty());
    }

    #[test]
    fn test_side_effect_outside_calls_goes_to_root() {
        let exec = with_controller(|c| {
            c.global_rebind("app.util", "LIMIT", &HostValue::int(1, 3));
        });
        assert_eq!(exec.root_side_effects().len(), 1);
    }

    #[test]
    fn test_attribute_rebind_only_on_user_objects() {
        let exec = with_controller(|c| {
            let stack = HostValue::instance(1, "Stack", "app.stack", vec![]);
            c.attribute_rebind(&stack, "size", &HostValue::int(2, 0));
            let foreign = HostValue::instance(3, "Thread", "threading", vec![]);
            c.attribute_rebind(&foreign, "name", &HostValue::string(4, "t"));
        });
        assert_eq!(exec.side_effects().len(), 1);
        let target = exec.side_effects()[0].affected_objects[0];
        assert!(matches!(exec.object(target).kind, ObjectKind::User(_)));
    }
}
