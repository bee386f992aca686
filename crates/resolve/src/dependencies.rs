//! Dependency resolution for test subjects
//!
//! Given one or more captured calls chosen as test subjects, computes the
//! ordered list of objects and side effects that setup code must recreate
//! before the subject can be replayed.
//!
//! ## Algorithm
//!
//! 1. Seed the working set with everything reachable from the subjects:
//!    inputs, receiver, resumed generator and outcome, recursing into
//!    composite parts, constructor inputs of user objects and activation
//!    arguments of generators.
//! 2. Collect the side effects on each subject's lineage: root side effects,
//!    side effects of ancestors and earlier siblings that happened before the
//!    subject started, and everything recorded inside the subject.
//! 3. Include every collected side effect affecting an object of the working
//!    set, and add the objects it references. Repeat until nothing changes.
//! 4. Sort by timestamp. Capture order is causal order, so the result defines
//!    everything before it is used.
//! 5. Prune objects that can be inlined: immutable objects, and objects used
//!    once that no included side effect changes and no method call received.
//!
//! The pruned list then goes through the [`optimizer`](crate::optimizer).

use crate::optimizer::optimize;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use testscope_core::{
    Call, CallId, Callable, Error, Execution, Invocation, ObjectId, ObjectKind, Result, SequenceShape,
    SideEffectId, Timestamp,
};
use tracing::debug;

// ============================================================================
// Dependency
// ============================================================================

/// List literal standing for a sequence and the appends that followed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapsedSequence {
    /// The captured sequence
    pub object: ObjectId,
    /// Shape of the sequence
    pub shape: SequenceShape,
    /// Captured contents followed by the appended values
    pub contained: Vec<ObjectId>,
    /// Append side effects folded into the literal
    pub appends: SmallVec<[SideEffectId; 2]>,
}

/// One entry of a setup list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    /// Object that has to be created and named
    Object(ObjectId),
    /// Side effect that has to be replayed
    SideEffect(SideEffectId),
    /// Sequence created directly with its later appends
    Sequence(CollapsedSequence),
}

impl Dependency {
    /// Position on the execution's timeline
    pub fn timestamp(&self, execution: &Execution) -> Timestamp {
        match self {
            Dependency::Object(id) => execution.object(*id).timestamp,
            Dependency::SideEffect(id) => execution.side_effect(*id).timestamp,
            Dependency::Sequence(seq) => execution.object(seq.object).timestamp,
        }
    }

    /// Object created by this entry
    pub fn object(&self) -> Option<ObjectId> {
        match self {
            Dependency::Object(id) => Some(*id),
            Dependency::Sequence(seq) => Some(seq.object),
            Dependency::SideEffect(_) => None,
        }
    }

    /// Side effect replayed by this entry
    pub fn side_effect(&self) -> Option<SideEffectId> {
        match self {
            Dependency::SideEffect(id) => Some(*id),
            _ => None,
        }
    }
}

// ============================================================================
// Dependencies
// ============================================================================

/// Resolved setup for a test subject
///
/// ## Invariants
///
/// - Every list is sorted by timestamp
/// - Every timestamp precedes the completion of the last subject
/// - Objects changed by an included side effect are in `closure` and `named`
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    closure: Vec<Dependency>,
    all: Vec<Dependency>,
    named: Vec<ObjectId>,
    uses: FxHashMap<ObjectId, usize>,
}

impl Dependencies {
    /// Resolve the setup of a single call
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownCall` if `call` is not part of `execution`.
    pub fn for_call(execution: &Execution, call: CallId) -> Result<Self> {
        Self::for_calls(execution, &[call])
    }

    /// Resolve the setup shared by several calls of one test case
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownCall` if any call is not part of `execution`.
    pub fn for_calls(execution: &Execution, calls: &[CallId]) -> Result<Self> {
        Self::resolve(execution, calls, &[])
    }

    /// Resolve the setup for testing a user object
    ///
    /// Covers the object itself, its method calls and the resumptions of
    /// generators its methods produced.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownObject` for an id outside the execution and
    /// `Error::NotAUserObject` for any other kind of object.
    pub fn for_user_object(execution: &Execution, object: ObjectId) -> Result<Self> {
        let user = execution
            .try_object(object)?
            .as_user()
            .ok_or(Error::NotAUserObject(object))?;
        let mut calls = Vec::new();
        for invocation in &user.calls {
            match invocation {
                Invocation::Call(call) => calls.push(*call),
                Invocation::Generator(generator) => {
                    if let Some(generator) = execution.object(*generator).as_generator() {
                        calls.extend(generator.calls.iter().copied());
                    }
                }
            }
        }
        Self::resolve(execution, &calls, &[object])
    }

    fn resolve(execution: &Execution, subjects: &[CallId], extra: &[ObjectId]) -> Result<Self> {
        for &call in subjects {
            execution.try_call(call)?;
        }
        let mut resolution = Resolution::new(execution, horizon(execution, subjects));
        for &object in extra {
            resolution.add_object(object);
        }
        for &call in subjects {
            resolution.seed_call(call);
            resolution.collect_lineage(call);
        }
        resolution.close();
        let dependencies = resolution.finish();

        debug!(
            target: "testscope::resolve",
            subjects = subjects.len(),
            closure = dependencies.closure.len(),
            setup = dependencies.all.len(),
            named = dependencies.named.len(),
            "Resolved dependencies"
        );
        Ok(dependencies)
    }

    /// Full causally sorted set of objects and side effects, before pruning
    pub fn closure(&self) -> &[Dependency] {
        &self.closure
    }

    /// Pruned and optimized setup list
    pub fn all(&self) -> &[Dependency] {
        &self.all
    }

    /// Objects that need a variable name, in creation order
    pub fn named(&self) -> &[ObjectId] {
        &self.named
    }

    /// Whether `object` needs a variable name
    pub fn needs_name(&self, object: ObjectId) -> bool {
        self.named.contains(&object)
    }

    /// How often a working-set object is used before the horizon
    pub fn usage_count(&self, object: ObjectId) -> usize {
        self.uses.get(&object).copied().unwrap_or(0)
    }

    /// Side effects of the closure, in order
    pub fn side_effects(&self) -> impl Iterator<Item = SideEffectId> + '_ {
        self.closure.iter().filter_map(Dependency::side_effect)
    }

    /// Whether no setup is needed
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Latest completion among the subjects, or `None` when one is still in
/// flight (or there are no subjects) and nothing bounds the resolution
fn horizon(execution: &Execution, subjects: &[CallId]) -> Option<Timestamp> {
    let mut horizon: Option<Timestamp> = None;
    for &call in subjects {
        let completed = execution.call(call).completed_at?;
        horizon = Some(horizon.map_or(completed, |h| h.max(completed)));
    }
    horizon
}

fn top_caller(execution: &Execution, mut call: CallId) -> CallId {
    while let Some(caller) = execution.call(call).caller {
        call = caller;
    }
    call
}

struct Resolution<'e> {
    execution: &'e Execution,
    horizon: Option<Timestamp>,
    objects: FxHashSet<ObjectId>,
    candidates: Vec<SideEffectId>,
    included: FxHashSet<SideEffectId>,
}

impl<'e> Resolution<'e> {
    fn new(execution: &'e Execution, horizon: Option<Timestamp>) -> Self {
        Resolution {
            execution,
            horizon,
            objects: FxHashSet::default(),
            candidates: Vec::new(),
            included: FxHashSet::default(),
        }
    }

    fn before_horizon(&self, timestamp: Timestamp) -> bool {
        self.horizon.map_or(true, |h| timestamp.is_before(h))
    }

    /// Add an object and everything needed to rebuild it
    fn add_object(&mut self, object: ObjectId) {
        let execution = self.execution;
        let mut pending = vec![object];
        while let Some(id) = pending.pop() {
            if !self.objects.insert(id) {
                continue;
            }
            let object = execution.object(id);
            pending.extend(object.parts());
            match &object.kind {
                ObjectKind::User(user) => {
                    if let Some(init) = user.init_call {
                        pending.extend(execution.call(init).input.values().copied());
                    }
                }
                ObjectKind::Generator(generator) => {
                    if let Some(activation) = &generator.activation {
                        pending.extend(activation.args.values().copied());
                        if let Callable::UserObject(owner) = activation.callable {
                            pending.push(owner);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn seed_call(&mut self, call: CallId) {
        let execution = self.execution;
        let call = execution.call(call);
        for &arg in call.input.values() {
            self.add_object(arg);
        }
        if let Some(receiver) = call.receiver() {
            self.add_object(receiver);
        }
        if let Some(generator) = call.generator() {
            self.add_object(generator);
        }
        if let Some(outcome) = call.outcome {
            self.add_existing(outcome.object(), call.timestamp);
        }
    }

    /// Add the parts of `object`'s graph that existed before `started`
    ///
    /// Objects the subject created itself are the result under test, so
    /// only what they were built from goes into the setup.
    fn add_existing(&mut self, object: ObjectId, started: Timestamp) {
        let execution = self.execution;
        let mut pending = vec![object];
        while let Some(id) = pending.pop() {
            let object = execution.object(id);
            if object.timestamp.is_before(started) {
                self.add_object(id);
            } else {
                pending.extend(object.parts());
            }
        }
    }

    /// Queue the side effects that may have shaped the subject's world
    fn collect_lineage(&mut self, subject: CallId) {
        let execution = self.execution;
        let started = execution.call(subject).timestamp;
        let ended = execution.call(subject).completed_at;

        for &effect in execution.root_side_effects() {
            let timestamp = execution.side_effect(effect).timestamp;
            if ended.map_or(true, |end| timestamp.is_before(end)) {
                self.candidates.push(effect);
            }
        }

        // Ancestors and earlier siblings
        let mut stack = vec![top_caller(execution, subject)];
        while let Some(call) = stack.pop() {
            let call = execution.call(call);
            self.candidates.extend(
                call.side_effects
                    .iter()
                    .copied()
                    .filter(|e| execution.side_effect(*e).timestamp.is_before(started)),
            );
            stack.extend(
                call.subcalls
                    .iter()
                    .copied()
                    .filter(|c| execution.call(*c).timestamp.is_before(started)),
            );
        }

        // The subject and its descendants. Their effects on the inputs are
        // replayed as well, so setup shows the inputs as the call left them.
        let mut stack = vec![subject];
        while let Some(call) = stack.pop() {
            let call = execution.call(call);
            self.candidates.extend(call.side_effects.iter().copied());
            stack.extend(call.subcalls.iter().copied());
        }
    }

    /// Include side effects on the working set until it stops growing
    fn close(&mut self) {
        let execution = self.execution;
        loop {
            let mut changed = false;
            for i in 0..self.candidates.len() {
                let id = self.candidates[i];
                if self.included.contains(&id) {
                    continue;
                }
                let effect = execution.side_effect(id);
                if !effect.affected_objects.iter().any(|o| self.objects.contains(o)) {
                    continue;
                }
                self.included.insert(id);
                for &object in &effect.referenced_objects {
                    self.add_object(object);
                }
                changed = true;
            }
            if !changed {
                break;
            }
        }
    }

    /// Calls still part of the capture, without resumptions dropped on finalize
    fn captured_calls(&self) -> impl Iterator<Item = &'e Call> + '_ {
        let execution = self.execution;
        execution.captured_calls().iter().map(move |id| execution.call(*id))
    }

    /// How many times each working-set object is used before the horizon
    fn usage_counts(&self) -> FxHashMap<ObjectId, usize> {
        let mut counts: FxHashMap<ObjectId, usize> = FxHashMap::default();
        let mut count = |id: ObjectId| {
            if self.objects.contains(&id) {
                *counts.entry(id).or_insert(0) += 1;
            }
        };

        for call in self.captured_calls() {
            if !self.before_horizon(call.timestamp) {
                continue;
            }
            call.input.values().copied().for_each(&mut count);
            if let Some(receiver) = call.receiver() {
                count(receiver);
            }
            if let Some(outcome) = call.outcome {
                count(outcome.object());
            }
        }

        for &id in &self.objects {
            let object = self.execution.object(id);
            object.parts().into_iter().for_each(&mut count);
            if let Some(activation) = object.as_generator().and_then(|g| g.activation.as_ref()) {
                activation.args.values().copied().for_each(&mut count);
            }
        }

        for &id in &self.included {
            self.execution
                .side_effect(id)
                .referenced_objects
                .iter()
                .copied()
                .for_each(&mut count);
        }
        counts
    }

    fn finish(self) -> Dependencies {
        let execution = self.execution;

        let mut closure: Vec<Dependency> = self
            .objects
            .iter()
            .copied()
            .filter(|id| self.before_horizon(execution.object(*id).timestamp))
            .map(Dependency::Object)
            .chain(
                self.included
                    .iter()
                    .copied()
                    .filter(|id| self.before_horizon(execution.side_effect(*id).timestamp))
                    .map(Dependency::SideEffect),
            )
            .collect();
        closure.sort_by_key(|d| d.timestamp(execution));

        let counts = self.usage_counts();
        let affected: FxHashSet<ObjectId> = self
            .included
            .iter()
            .flat_map(|id| execution.side_effect(*id).affected_objects.iter().copied())
            .collect();
        let receivers: FxHashSet<ObjectId> = self
            .captured_calls()
            .filter(|call| self.before_horizon(call.timestamp))
            .filter_map(|call| call.receiver())
            .collect();

        let needs_name = |id: ObjectId| {
            !execution.object(id).is_immutable()
                && (counts.get(&id).copied().unwrap_or(0) > 1
                    || affected.contains(&id)
                    || receivers.contains(&id))
        };

        let pruned: Vec<Dependency> = closure
            .iter()
            .filter(|d| match d {
                Dependency::Object(id) => needs_name(*id),
                _ => true,
            })
            .cloned()
            .collect();
        let all = optimize(execution, pruned);
        let named = all.iter().filter_map(Dependency::object).collect();

        Dependencies {
            closure,
            all,
            named,
            uses: counts,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
