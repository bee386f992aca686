//! Generator capture
//!
//! Resumptions, activation and the trailing resumption exhausted generators
//! report.

use crate::common::*;
use testscope::{constructor_as_string, AssignedNames};

fn count_to(frame: &GeneratorFrame, yields: &[i64], then: Option<&HostValue>) -> Script {
    let generator = HostValue::generator(5, frame.clone());
    let n = HostValue::int(6, yields.len() as i64);
    let mut script = Script::new();
    for (i, value) in yields.iter().enumerate() {
        script = script
            .resume(COUNT_TO, "count_to", &generator, &[("n", &n)])
            .ret(&HostValue::int(100 + i as u64, *value));
    }
    script = script.resume(COUNT_TO, "count_to", &generator, &[("n", &n)]);
    match then {
        Some(exception) => script.raise(exception, 1).ret(&HostValue::none(7)),
        None => script.ret(&HostValue::none(7)),
    }
}

#[test]
fn exhausted_generator_drops_trailing_none() {
    let frame = GeneratorFrame::new();
    let script = count_to(&frame, &[1, 2], None);
    frame.release();
    let report = capture(script);
    let execution = &report.execution;

    assert_eq!(execution.call_graph().len(), 2);
    assert_eq!(execution.captured_calls().len(), 2);
    let generator_id = execution.call(roots(execution)[0]).generator().unwrap();
    let generator = execution.object(generator_id).as_generator().unwrap();
    assert!(generator.is_activated());
    assert_eq!(generator.calls.len(), 2);
    for &call in &generator.calls {
        let output = execution.call(call).output().unwrap();
        assert!(!execution.object(output).is_none());
    }
}

#[test]
fn live_generator_keeps_every_resumption() {
    let frame = GeneratorFrame::new();
    let report = capture(count_to(&frame, &[1, 2], None));
    let execution = &report.execution;
    let generator_id = execution.call(roots(execution)[0]).generator().unwrap();
    assert_eq!(execution.object(generator_id).as_generator().unwrap().calls.len(), 3);
}

#[test]
fn generator_ending_in_exception_keeps_the_exception() {
    let frame = GeneratorFrame::new();
    let error = HostValue::exception(8, "ValueError", vec![]);
    let script = count_to(&frame, &[1, 2, 3], Some(&error));
    frame.release();
    let report = capture(script);
    let execution = &report.execution;

    let generator_id = execution.call(roots(execution)[0]).generator().unwrap();
    let calls = &execution.object(generator_id).as_generator().unwrap().calls;
    assert_eq!(calls.len(), 4);
    assert!(calls[..3].iter().all(|c| execution.call(*c).output().is_some()));
    assert!(execution.call(calls[3]).raised());
}

#[test]
fn resumptions_carry_no_input() {
    let frame = GeneratorFrame::new();
    let report = capture(count_to(&frame, &[1], None));
    let execution = &report.execution;
    for &call in execution.captured_calls() {
        assert!(execution.call(call).input.is_empty());
    }
    let generator_id = execution.call(roots(execution)[0]).generator().unwrap();
    let activation = execution
        .object(generator_id)
        .as_generator()
        .unwrap()
        .activation
        .as_ref()
        .unwrap();
    assert_eq!(activation.args.len(), 1);
}

#[test]
fn activated_generator_is_reconstructed_from_its_call() {
    let frame = GeneratorFrame::new();
    let report = capture(count_to(&frame, &[1, 2], None));
    let execution = &report.execution;
    let generator_id = execution.call(roots(execution)[0]).generator().unwrap();
    let code = constructor_as_string(execution, generator_id, &AssignedNames::new());
    assert_eq!(code.code(), "count_to(2)");
    assert!(!code.is_uncomplete());
}
