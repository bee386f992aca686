//! Capture lifecycle
//!
//! Installation, failing entry points, reruns and module bookkeeping.

use crate::common::*;
use testscope::{Capture, EntryPointFailure, Error, HostRuntime, PointOfEntry};

fn one_call() -> Script {
    Script::new()
        .call(F, "f", &[("x", &HostValue::list(1, vec![]))])
        .ret(&HostValue::none(2))
}

fn function_id(project: &SharedProject, name: &str) -> testscope::FunctionId {
    project.read().find_function(name, "app.calc").unwrap()
}

#[test]
fn second_tracer_is_rejected() {
    let mut runtime = one_call().runtime();
    runtime.install().unwrap();
    let result = capture_point_of_entry(
        &mut runtime,
        sample_project(),
        &entry(),
        &CaptureConfig::default(),
        &SideEffectRegistry::standard(),
    );
    assert!(matches!(result, Err(Error::AlreadyTracing)));
    assert_eq!(runtime.runs(), 0);
}

#[test]
fn tracer_is_uninstalled_after_capture() {
    let mut runtime = one_call().runtime();
    capture_point_of_entry(
        &mut runtime,
        sample_project(),
        &entry(),
        &CaptureConfig::default(),
        &SideEffectRegistry::standard(),
    )
    .unwrap();
    assert!(!runtime.is_installed());
    assert_eq!(runtime.rewritten(), &[CodeId(F)]);
}

#[test]
fn code_is_rewritten_once_across_captures() {
    init_tracing();
    let project = sample_project();
    let config = CaptureConfig::default();
    let registry = SideEffectRegistry::standard();
    let mut runtime = one_call().runtime();
    for _ in 0..2 {
        let report =
            capture_point_of_entry(&mut runtime, project.clone(), &entry(), &config, &registry).unwrap();
        assert_eq!(report.execution.captured_calls().len(), 1);
    }
    assert_eq!(runtime.runs(), 2);
    assert_eq!(runtime.rewritten(), &[CodeId(F)]);
}

#[test]
fn failing_entry_point_is_reported_and_finalized() {
    let mut runtime = Script::new()
        .call(F, "f", &[("x", &HostValue::int(1, 3))])
        .runtime()
        .failing_with(EntryPointFailure {
            exception_type: Some("KeyboardInterrupt".to_string()),
            message: "interrupted".to_string(),
        });
    let report = capture_point_of_entry(
        &mut runtime,
        sample_project(),
        &entry(),
        &CaptureConfig::default(),
        &SideEffectRegistry::standard(),
    )
    .unwrap();

    let failure = report.failure.as_ref().unwrap();
    assert_eq!(failure.to_string(), "KeyboardInterrupt: interrupted");
    assert!(report.execution.is_finalized());
    assert_eq!(report.execution.captured_calls().len(), 1);
    assert!(!report.execution.call(roots(&report.execution)[0]).is_completed());
}

#[test]
fn rerunning_point_of_entry_replaces_previous_run() {
    init_tracing();
    let project = sample_project();
    let config = CaptureConfig::default();
    let registry = SideEffectRegistry::standard();
    let capture = Capture::new(project.clone(), &config, &registry);
    let mut runtime = one_call().runtime();
    let mut point = PointOfEntry::new(entry());
    let f = function_id(&project, "f");

    point.inspect(&capture, &mut runtime).unwrap();
    let first = point.last_run().unwrap().execution.id();
    point.inspect(&capture, &mut runtime).unwrap();
    let second = point.last_run().unwrap().execution.id();

    assert_ne!(first, second);
    assert_eq!(runtime.runs(), 2);
    assert_eq!(runtime.rewritten(), &[CodeId(F)]);
    let links = project.read().function(f).calls.clone();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].execution, second);

    point.clear_previous_run();
    assert!(point.last_run().is_none());
    assert!(project.read().function(f).calls.is_empty());
}

#[test]
fn modules_loaded_by_the_run_are_unloaded() {
    init_tracing();
    let mut runtime = Script::new()
        .event(RawEvent::ModuleLoaded {
            module: "app.plugin".to_string(),
            codes: vec![CodeId(50), CodeId(51)],
        })
        .runtime()
        .with_module("os");
    capture_point_of_entry(
        &mut runtime,
        sample_project(),
        &entry(),
        &CaptureConfig::default(),
        &SideEffectRegistry::standard(),
    )
    .unwrap();
    assert_eq!(runtime.loaded_modules(), vec!["os".to_string()]);
    assert_eq!(runtime.rewritten(), &[CodeId(50), CodeId(51)]);
}

#[test]
fn driver_and_module_frames_are_not_captured() {
    init_tracing();
    let x = HostValue::int(1, 1);
    let none = HostValue::none(2);
    let mut runtime = Script::new()
        .event(RawEvent::Call(Frame::new(
            CodeInfo::function(1, "<module>", CALC_FILE),
            ArgValues::default(),
        )))
        .event(RawEvent::Call(Frame::new(
            CodeInfo::function(99, "f", CALC_FILE),
            ArgValues::named(vec![("x".to_string(), x.clone())]),
        )))
        .call(F, "f", &[("x", &x)])
        .ret(&none)
        .ret(&none)
        .ret(&none)
        .runtime()
        .with_driver(CodeId(99));
    let report = capture_point_of_entry(
        &mut runtime,
        sample_project(),
        &entry(),
        &CaptureConfig::default(),
        &SideEffectRegistry::standard(),
    )
    .unwrap();
    let execution = &report.execution;
    assert_eq!(execution.captured_calls().len(), 1);
    assert!(execution.call(roots(execution)[0]).caller.is_none());
}

#[test]
fn config_file_controls_ignored_code() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = CaptureConfig::load_or_init(dir.path()).unwrap();
    assert!(dir.path().join(testscope::CONFIG_FILE_NAME).exists());
    config.ignored_code_names.push("f".to_string());

    let mut runtime = one_call().runtime();
    let report = capture_point_of_entry(
        &mut runtime,
        sample_project(),
        &entry(),
        &config,
        &SideEffectRegistry::standard(),
    )
    .unwrap();
    assert!(report.execution.captured_calls().is_empty());
}
