//! End-to-end scenarios
//!
//! Small sample programs whose expected capture and setup are known exactly.

use crate::common::*;
use testscope::ObjectKind;

// ============================================================================
// Argument mutated during the call
// ============================================================================

#[test]
fn appended_argument_becomes_one_literal() {
    let x = HostValue::list(1, vec![]);
    let one = HostValue::int(2, 1);
    let none = HostValue::none(3);
    let report = capture(
        Script::new()
            .call(F, "f", &[("x", &x)])
            .opaque_method("append", &x, &[&one])
            .ret(&none),
    );
    let execution = &report.execution;
    let call = roots(execution)[0];
    let x_id = object_of(execution, call, "x");

    let dependencies = Dependencies::for_call(execution, call).unwrap();
    let significant: Vec<&Dependency> = dependencies
        .closure()
        .iter()
        .filter(|d| !matches!(d, Dependency::Object(id) if execution.object(*id).is_immutable()))
        .collect();
    assert_eq!(significant.len(), 2);
    assert_eq!(significant[0], &Dependency::Object(x_id));
    assert!(matches!(significant[1], Dependency::SideEffect(_)));

    assert_eq!(dependencies.named(), &[x_id]);
    let setup = setup_lines(execution, &dependencies);
    let lines: Vec<String> = setup.lines.iter().map(|l| l.to_string()).collect();
    assert_eq!(lines, vec!["alist = [1]".to_string()]);
}

#[test]
fn failed_mutation_is_not_replayed() {
    let x = HostValue::list(1, vec![HostValue::int(2, 1)]);
    let missing = HostValue::int(3, 99);
    let none = HostValue::none(4);
    let report = capture(
        Script::new()
            .call(F, "f", &[("x", &x)])
            .opaque_method_raising("remove", &x, &[&missing])
            .ret(&none),
    );
    let execution = &report.execution;
    assert!(execution.side_effects().is_empty());

    let call = roots(execution)[0];
    let dependencies = Dependencies::for_call(execution, call).unwrap();
    assert_eq!(dependencies.side_effects().count(), 0);
    let setup = setup_lines(execution, &dependencies);
    assert!(setup.lines.iter().all(|line| !line.to_string().contains("remove")));
}

// ============================================================================
// Object shared by two calls
// ============================================================================

#[test]
fn shared_mutable_argument_needs_a_name() {
    let a = HostValue::list(1, vec![HostValue::int(2, 7)]);
    let none = HostValue::none(3);
    let report = capture(
        Script::new()
            .call(G, "g", &[("a", &a)])
            .ret(&none)
            .call(H, "h", &[("a", &a)])
            .ret(&none),
    );
    let execution = &report.execution;
    let calls = roots(execution);
    assert_eq!(calls.len(), 2);
    let (g, h) = (calls[0], calls[1]);
    let a_id = object_of(execution, g, "a");
    assert_eq!(object_of(execution, h, "a"), a_id);

    assert!(!Dependencies::for_call(execution, g).unwrap().needs_name(a_id));
    assert!(Dependencies::for_call(execution, h).unwrap().needs_name(a_id));
    assert!(Dependencies::for_calls(execution, &[g, h]).unwrap().needs_name(a_id));
}

// ============================================================================
// Raised exception
// ============================================================================

#[test]
fn raising_call_has_exception_outcome_and_no_setup() {
    let error = HostValue::exception(1, "ValueError", vec![HostValue::string(2, "bad input")]);
    let report = capture(
        Script::new()
            .call(F, "f", &[("x", &HostValue::int(3, 0))])
            .raise(&error, 1)
            .ret(&HostValue::none(4)),
    );
    let execution = &report.execution;
    let call = execution.call(roots(execution)[0]);
    assert!(call.raised());
    assert!(call.output().is_none());
    let exception = execution.object(call.exception().unwrap());
    assert_eq!(exception.type_name, "ValueError");

    let dependencies = Dependencies::for_call(execution, call.id).unwrap();
    assert!(dependencies.is_empty());
    assert!(dependencies.named().is_empty());
}

#[test]
fn handled_exception_is_forgotten() {
    let error = HostValue::exception(1, "KeyError", vec![]);
    let result = HostValue::int(2, 5);
    let report = capture(
        Script::new()
            .call(F, "f", &[("x", &HostValue::int(3, 0))])
            .raise(&error, 9)
            .ret_handled(&result, 9),
    );
    let execution = &report.execution;
    let call = execution.call(roots(execution)[0]);
    assert!(!call.raised());
    let output = execution.object(call.output().unwrap());
    assert!(matches!(&output.kind, ObjectKind::Immutable(i) if i.reconstructor == "5"));
}

// ============================================================================
// Values handed to foreign code
// ============================================================================

#[test]
fn value_passed_to_foreign_function_leaves_no_trace() {
    let payload = HostValue::list(1, vec![HostValue::int(2, 1)]);
    let report = capture(
        Script::new()
            .call_foreign(DUMPS, "dumps", &[("obj", &payload)])
            .ret(&HostValue::string(3, "[1]")),
    );
    let execution = &report.execution;
    assert!(execution.call_graph().is_empty());
    assert!(execution.captured_calls().is_empty());
    assert!(execution.objects().is_empty());
}

#[test]
fn value_passed_to_opaque_function_leaves_no_trace() {
    let payload = HostValue::list(1, vec![]);
    let report = capture(Script::new().opaque_function("dumps", &[&payload]));
    assert!(report.execution.objects().is_empty());
    assert!(report.execution.side_effects().is_empty());
}

#[test]
fn project_call_inside_foreign_code_is_still_captured() {
    let payload = HostValue::list(1, vec![]);
    let none = HostValue::none(2);
    let report = capture(
        Script::new()
            .call_foreign(DUMPS, "dumps", &[("obj", &payload)])
            .call(F, "f", &[("x", &payload)])
            .ret(&none)
            .ret(&none),
    );
    let execution = &report.execution;
    assert_eq!(execution.call_graph().len(), 1);
    assert!(execution.call(roots(execution)[0]).caller.is_none());
}

// ============================================================================
// User objects
// ============================================================================

#[test]
fn user_object_collects_its_method_calls() {
    let s = stack(1);
    let item = HostValue::string(2, "top");
    let none = HostValue::none(3);
    let report = capture(
        Script::new()
            .call_method(STACK_INIT, "__init__", &s, &[])
            .ret(&none)
            .call_method(STACK_PUSH, "push", &s, &[("item", &item)])
            .ret(&none),
    );
    let execution = &report.execution;
    let calls = roots(execution);
    let receiver = execution.call(calls[1]).receiver().unwrap();
    let user = execution.object(receiver).as_user().unwrap();
    assert_eq!(user.init_call, Some(calls[0]));
    assert_eq!(user.calls.len(), 2);
    assert_eq!(user.external_calls().count(), 1);

    let dependencies = Dependencies::for_user_object(execution, receiver).unwrap();
    assert_eq!(dependencies.named(), &[receiver]);
    let setup = setup_lines(execution, &dependencies);
    assert_eq!(setup.lines[0].to_string(), "stack = Stack()");
    assert!(setup.imports().iter().any(|i| matches!(
        i,
        testscope::Import::Name { module, name } if module == "app.stack" && name == "Stack"
    )));
}

#[test]
fn object_built_and_returned_by_the_subject_needs_no_setup() {
    let s = stack(1);
    let none = HostValue::none(2);
    let report = capture(
        Script::new()
            .call(OUTER, "outer", &[])
            .call_method(STACK_INIT, "__init__", &s, &[])
            .ret(&none)
            .ret(&s),
    );
    let execution = &report.execution;
    let outer = roots(execution)[0];
    let made = execution.call(outer).output().unwrap();
    assert!(execution.object(made).as_user().is_some());

    let dependencies = Dependencies::for_call(execution, outer).unwrap();
    assert!(dependencies.is_empty());
    assert!(!dependencies.closure().contains(&Dependency::Object(made)));
    assert!(setup_lines(execution, &dependencies).lines.is_empty());
}

#[test]
fn attribute_rebind_on_user_object_is_replayed() {
    let s = stack(1);
    let none = HostValue::none(2);
    let limit = HostValue::int(3, 10);
    let report = capture(
        Script::new()
            .call_method(STACK_INIT, "__init__", &s, &[])
            .ret(&none)
            .call(F, "f", &[("x", &s)])
            .event(RawEvent::AttributeRebind {
                target: s.clone(),
                name: "limit".to_string(),
                value: limit.clone(),
            })
            .ret(&none),
    );
    let execution = &report.execution;
    let f = roots(execution)[1];
    let dependencies = Dependencies::for_call(execution, f).unwrap();
    let setup = setup_lines(execution, &dependencies);
    let lines: Vec<String> = setup.lines.iter().map(|l| l.to_string()).collect();
    assert_eq!(lines, vec!["stack = Stack()".to_string(), "stack.limit = 10".to_string()]);
}
