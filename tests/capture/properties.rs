//! Property tests over generated event scripts

use crate::common::*;
use proptest::prelude::*;

fn ints(first_handle: u64, values: &[i64]) -> Vec<HostValue> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| HostValue::int(first_handle + i as u64, *v))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// A value returned by the call it was passed to keeps its identity.
    #[test]
    fn returned_argument_is_the_same_object(values in prop::collection::vec(0i64..100, 0..8)) {
        let x = HostValue::list(1, ints(10, &values));
        let report = capture(Script::new().call(F, "f", &[("x", &x)]).ret(&x));
        let execution = &report.execution;
        let call = roots(execution)[0];
        prop_assert_eq!(execution.call(call).output(), Some(object_of(execution, call, "x")));
    }

    /// Inputs exist before the call starts, results before it completes, and
    /// subcalls run strictly inside their caller.
    #[test]
    fn timestamps_follow_causality(nested in prop::collection::vec(any::<bool>(), 1..8)) {
        let none = HostValue::none(2);
        let mut script = Script::new();
        for (i, inner) in nested.iter().enumerate() {
            let x = HostValue::list(100 + i as u64, vec![]);
            script = script.call(F, "f", &[("x", &x)]);
            if *inner {
                let a = HostValue::list(200 + i as u64, vec![]);
                script = script.call(G, "g", &[("a", &a)]).ret(&a);
            }
            script = script.ret(&none);
        }
        let report = capture(script);
        let execution = &report.execution;
        prop_assert_eq!(execution.call_graph().len(), nested.len());

        for &id in execution.captured_calls() {
            let call = execution.call(id);
            let completed = call.completed_at.unwrap();
            prop_assert!(call.timestamp.is_before(completed));
            for object in call.input.values() {
                prop_assert!(execution.object(*object).timestamp.is_before(call.timestamp));
            }
            if let Some(output) = call.output() {
                prop_assert!(execution.object(output).timestamp.is_before(completed));
            }
            for &sub in &call.subcalls {
                let sub = execution.call(sub);
                prop_assert!(call.timestamp.is_before(sub.timestamp));
                prop_assert!(sub.completed_at.unwrap().is_before(completed));
            }
        }
    }

    /// Every mutation of a subject's argument is replayed, and mutations of
    /// unrelated lists are not.
    #[test]
    fn setup_replays_exactly_the_argument_history(
        histories in prop::collection::vec(prop::collection::vec(0i64..100, 0..5), 1..5),
        pick in any::<prop::sample::Index>(),
    ) {
        let none = HostValue::none(2);
        let mut script = Script::new();
        for (i, values) in histories.iter().enumerate() {
            let list = HostValue::list(100 + i as u64, vec![]);
            for value in &ints(1000 + 10 * i as u64, values) {
                script = script.opaque_method("append", &list, &[value]);
            }
            script = script.call(G, "g", &[("a", &list)]).ret(&none);
        }
        let report = capture(script);
        let execution = &report.execution;

        let chosen = pick.index(histories.len());
        let call = roots(execution)[chosen];
        let dependencies = Dependencies::for_call(execution, call).unwrap();
        let setup = setup_lines(execution, &dependencies);

        let values = &histories[chosen];
        if values.is_empty() {
            prop_assert!(setup.lines.is_empty());
        } else {
            let literal = values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
            let lines: Vec<String> = setup.lines.iter().map(|l| l.to_string()).collect();
            prop_assert_eq!(lines, vec![format!("alist = [{}]", literal)]);
            prop_assert_eq!(dependencies.named(), &[object_of(execution, call, "a")][..]);
        }
    }

    /// Every object changed by a replayed side effect is resolved, and named
    /// whenever the side effect survives into the setup.
    #[test]
    fn replayed_side_effects_only_change_resolved_objects(
        prelude in prop::collection::vec((0usize..3, 0usize..3, any::<bool>()), 0..4),
        steps in prop::collection::vec((0usize..3, 0usize..3, any::<bool>(), any::<bool>()), 1..10),
    ) {
        let lists: Vec<HostValue> = (0..3).map(|i| HostValue::list(100 + i as u64, vec![])).collect();
        let none = HostValue::none(2);
        let item = |i: usize, other: usize, nest: bool| {
            if nest {
                lists[other].clone()
            } else {
                HostValue::int(1000 + i as u64, i as i64)
            }
        };

        let mut script = Script::new();
        for (i, (target, other, nest)) in prelude.iter().enumerate() {
            script = script.opaque_method("append", &lists[*target], &[&item(i, *other, *nest)]);
        }
        script = script.call(OUTER, "outer", &[]);
        for (i, (target, other, nest, inside)) in steps.iter().enumerate() {
            let value = item(100 + i, *other, *nest);
            if *inside {
                script = script
                    .call(G, "g", &[("a", &lists[*target])])
                    .opaque_method("append", &lists[*target], &[&value])
                    .ret(&none);
            } else {
                script = script.opaque_method("append", &lists[*target], &[&value]);
            }
            script = script.call(H, "h", &[("a", &lists[*other])]).ret(&none);
        }
        script = script.ret(&none);

        let report = capture(script);
        let execution = &report.execution;
        for &call in execution.captured_calls() {
            let dependencies = Dependencies::for_call(execution, call).unwrap();
            let resolved: Vec<ObjectId> = dependencies
                .closure()
                .iter()
                .filter_map(Dependency::object)
                .collect();
            for effect in dependencies.side_effects() {
                for affected in execution.side_effect(effect).affected_objects.iter() {
                    prop_assert!(resolved.contains(affected));
                }
            }
            for dependency in dependencies.all() {
                if let Dependency::SideEffect(effect) = dependency {
                    for affected in execution.side_effect(*effect).affected_objects.iter() {
                        prop_assert!(dependencies.needs_name(*affected));
                    }
                }
            }
        }
    }

    /// An exhausted generator keeps one invocation per yield, plus one for
    /// the exception it ended with.
    #[test]
    fn generator_invocations_match_yields(yields in 1usize..10, raises in any::<bool>()) {
        let frame = GeneratorFrame::new();
        let generator = HostValue::generator(5, frame.clone());
        let n = HostValue::int(6, yields as i64);
        let mut script = Script::new();
        for i in 0..yields {
            script = script
                .resume(COUNT_TO, "count_to", &generator, &[("n", &n)])
                .ret(&HostValue::int(100 + i as u64, i as i64));
        }
        script = script.resume(COUNT_TO, "count_to", &generator, &[("n", &n)]);
        if raises {
            script = script.raise(&HostValue::exception(7, "ValueError", vec![]), 1);
        }
        script = script.ret(&HostValue::none(8));
        frame.release();

        let report = capture(script);
        let execution = &report.execution;
        let generator_id = execution.call(roots(execution)[0]).generator().unwrap();
        let calls = &execution.object(generator_id).as_generator().unwrap().calls;
        let expected = if raises { yields + 1 } else { yields };
        prop_assert_eq!(calls.len(), expected);
        prop_assert_eq!(execution.captured_calls().len(), expected);
    }
}
