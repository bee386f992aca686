//! Execution context
//!
//! An [`Execution`] owns everything captured during one run of one entry
//! point: its [`Timeline`], the identity table mapping host handles to
//! serialized objects, and the arenas holding objects, calls and side
//! effects. All ids handed out by an execution index into these arenas.
//!
//! ## Identity
//!
//! `serialize` consults the identity table before creating anything, so the
//! same host object reached as an argument, as a container element or as a
//! return value always yields the same [`ObjectId`]. Every serialized host
//! value is retained until [`Execution::finalize`] so the host cannot recycle
//! its handle while the run is still being observed.
//!
//! ## Usage
//!
//! ```
//! use testscope_core::{Execution, HostValue, Project};
//!
//! let project = Project::new("/work/app").into_shared();
//! let mut execution = Execution::new(project);
//! let items = HostValue::list(10, vec![HostValue::int(11, 1)]);
//! let first = execution.serialize(&items);
//! let again = execution.serialize(&items);
//! assert_eq!(first, again);
//! execution.finalize();
//! ```

use crate::call::{Call, CallKind, CallOutcome};
use crate::error::{Error, Result};
use crate::host::{Handle, HostKind, HostValue, Literal, SequenceShape, BUILTIN_MODULE};
use crate::ids::{CallId, ExecutionId, FunctionId, MethodId, ObjectId, SideEffectId};
use crate::object::{
    library_type, string2id, underscore, Callable, ExceptionObject, GeneratorActivation,
    GeneratorObject, ImmutableObject, Invocation, LibraryObject, MapObject, ObjectKind,
    SequenceObject, SerializedObject, UnknownObject, UserObject,
};
use crate::project::{CaptureRef, CaptureTarget, Definition, SharedProject};
use crate::side_effect::{SideEffect, SideEffectKind};
use crate::timeline::{Timeline, Timestamp};
use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use tracing::{debug, trace, warn};

/// Decides whether a generator has run to completion
///
/// Runtimes signal generator termination differently; the execution only
/// asks this predicate when it cleans up trailing resumptions on finalize.
pub trait ExhaustionCheck {
    /// Whether `generator` can no longer be resumed
    fn is_exhausted(&self, generator: &HostValue) -> bool;
}

/// Check reading the released flag the host sets on a generator's frame
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameReleasedCheck;

impl ExhaustionCheck for FrameReleasedCheck {
    fn is_exhausted(&self, generator: &HostValue) -> bool {
        match generator.kind() {
            HostKind::Generator(frame) => frame.is_released(),
            _ => false,
        }
    }
}

/// Everything captured during one run
#[derive(Debug)]
pub struct Execution {
    id: ExecutionId,
    project: SharedProject,
    timeline: Timeline,

    // Identity
    identity: FxHashMap<Handle, ObjectId>,
    in_progress: FxHashSet<Handle>,
    retained: Vec<HostValue>,
    generators: Vec<(ObjectId, HostValue)>,

    // Arenas
    objects: Vec<SerializedObject>,
    calls: Vec<Call>,
    side_effects: Vec<SideEffect>,

    // Graph
    captured_calls: Vec<CallId>,
    call_graph: Vec<CallId>,
    root_side_effects: Vec<SideEffectId>,

    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    finalized: bool,
}

impl Execution {
    /// Start an empty execution context for `project`
    pub fn new(project: SharedProject) -> Self {
        Execution {
            id: ExecutionId::new(),
            project,
            timeline: Timeline::new(),
            identity: FxHashMap::default(),
            in_progress: FxHashSet::default(),
            retained: Vec::new(),
            generators: Vec::new(),
            objects: Vec::new(),
            calls: Vec::new(),
            side_effects: Vec::new(),
            captured_calls: Vec::new(),
            call_graph: Vec::new(),
            root_side_effects: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            finalized: false,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Execution id used on project links
    pub fn id(&self) -> ExecutionId {
        self.id
    }

    /// Project the execution captures against
    pub fn project(&self) -> &SharedProject {
        &self.project
    }

    /// Wall-clock start of the capture
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Wall-clock end of the capture, once finalized
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Whether `finalize` already ran
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Latest timestamp handed out
    pub fn last_timestamp(&self) -> Timestamp {
        self.timeline.last()
    }

    /// Object by id
    ///
    /// # Panics
    ///
    /// Panics if the id does not belong to this execution.
    pub fn object(&self, id: ObjectId) -> &SerializedObject {
        &self.objects[id.index()]
    }

    /// Object by id, checked
    pub fn try_object(&self, id: ObjectId) -> Result<&SerializedObject> {
        self.objects.get(id.index()).ok_or(Error::UnknownObject(id))
    }

    /// Call by id
    ///
    /// # Panics
    ///
    /// Panics if the id does not belong to this execution.
    pub fn call(&self, id: CallId) -> &Call {
        &self.calls[id.index()]
    }

    /// Call by id, checked
    pub fn try_call(&self, id: CallId) -> Result<&Call> {
        self.calls.get(id.index()).ok_or(Error::UnknownCall(id))
    }

    /// Side effect by id
    ///
    /// # Panics
    ///
    /// Panics if the id does not belong to this execution.
    pub fn side_effect(&self, id: SideEffectId) -> &SideEffect {
        &self.side_effects[id.index()]
    }

    /// Side effect by id, checked
    pub fn try_side_effect(&self, id: SideEffectId) -> Result<&SideEffect> {
        self.side_effects
            .get(id.index())
            .ok_or(Error::UnknownSideEffect(id))
    }

    /// All serialized objects in creation order
    pub fn objects(&self) -> &[SerializedObject] {
        &self.objects
    }

    /// All calls in creation order
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// All side effects in creation order
    pub fn side_effects(&self) -> &[SideEffect] {
        &self.side_effects
    }

    /// Calls captured during the run, in order of capture
    pub fn captured_calls(&self) -> &[CallId] {
        &self.captured_calls
    }

    /// Top-level calls, in order
    pub fn call_graph(&self) -> &[CallId] {
        &self.call_graph
    }

    /// Side effects observed outside of any captured call
    pub fn root_side_effects(&self) -> &[SideEffectId] {
        &self.root_side_effects
    }

    /// Object previously serialized for `handle`
    pub fn lookup(&self, handle: Handle) -> Option<ObjectId> {
        self.identity.get(&handle).copied()
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Serialize a host value, or return the object already serialized for it
    ///
    /// Parts of a composite are serialized before the composite itself, so
    /// they always carry lower timestamps. A value reached again while its own
    /// contents are still being serialized becomes an unknown object.
    pub fn serialize(&mut self, value: &HostValue) -> ObjectId {
        let handle = value.handle();
        if let Some(&id) = self.identity.get(&handle) {
            return id;
        }
        if !self.in_progress.insert(handle) {
            trace!(target: "testscope::capture", type_name = value.type_name(), "Cyclic reference");
            let kind = ObjectKind::Unknown(UnknownObject {
                partial_reconstructor: partial_reconstructor(value),
            });
            return self.push_object(value, kind);
        }

        let kind = self.classify(value);
        self.in_progress.remove(&handle);

        let id = self.push_object(value, kind);
        self.identity.insert(handle, id);
        self.retained.push(value.clone());

        match &self.objects[id.index()].kind {
            ObjectKind::User(user) => {
                let class = user.class;
                self.project.write().link_user_object(
                    class,
                    CaptureRef {
                        execution: self.id,
                        target: CaptureTarget::UserObject(id),
                    },
                );
            }
            ObjectKind::Generator(_) => self.generators.push((id, value.clone())),
            _ => {}
        }
        id
    }

    /// Serialize named call arguments
    pub fn serialize_arguments(&mut self, args: &[(String, HostValue)]) -> BTreeMap<String, ObjectId> {
        args.iter()
            .map(|(name, value)| (name.clone(), self.serialize(value)))
            .collect()
    }

    fn classify(&mut self, value: &HostValue) -> ObjectKind {
        if let HostKind::Generator(_) = value.kind() {
            return ObjectKind::Generator(GeneratorObject::default());
        }
        let class = self
            .project
            .read()
            .find_class(value.type_name(), value.module());
        if let Some(class) = class {
            return ObjectKind::User(UserObject {
                class,
                init_call: None,
                calls: Vec::new(),
            });
        }
        match value.kind() {
            HostKind::Literal(literal) => ObjectKind::Immutable(ImmutableObject::from_literal(literal)),
            HostKind::Sequence { shape, items } => {
                let contained = items.iter().map(|item| self.serialize(item)).collect();
                ObjectKind::Sequence(SequenceObject {
                    shape: *shape,
                    contained,
                })
            }
            HostKind::Map { entries } => {
                let mapping = entries
                    .iter()
                    .map(|(k, v)| (self.serialize(k), self.serialize(v)))
                    .collect();
                ObjectKind::Map(MapObject { mapping })
            }
            HostKind::Exception {
                args,
                builtin: true,
            } => {
                let args = args.iter().map(|arg| self.serialize(arg)).collect();
                ObjectKind::Exception(ExceptionObject { args })
            }
            HostKind::Library { .. } => match library_type(value.module(), value.type_name()) {
                Some(ty) => {
                    let attributes: Option<Vec<&HostValue>> =
                        ty.arguments.iter().map(|name| value.attribute(name)).collect();
                    match attributes {
                        Some(attributes) => ObjectKind::Library(LibraryObject {
                            format: ty.format.to_string(),
                            args: attributes.into_iter().map(|arg| self.serialize(arg)).collect(),
                            imports: BTreeSet::from([ty.import()]),
                        }),
                        None => {
                            trace!(target: "testscope::capture", type_name = ty.name, "Library attribute missing");
                            ObjectKind::Unknown(UnknownObject {
                                partial_reconstructor: partial_reconstructor(value),
                            })
                        }
                    }
                }
                None => ObjectKind::Unknown(UnknownObject {
                    partial_reconstructor: partial_reconstructor(value),
                }),
            },
            _ => ObjectKind::Unknown(UnknownObject {
                partial_reconstructor: partial_reconstructor(value),
            }),
        }
    }

    fn push_object(&mut self, value: &HostValue, kind: ObjectKind) -> ObjectId {
        let id = ObjectId::new(self.objects.len() as u32);
        let timestamp = self.timeline.next_timestamp();
        self.objects.push(SerializedObject {
            id,
            timestamp,
            human_readable_id: human_readable_id(value),
            type_name: value.type_name().to_string(),
            module_name: value.module().to_string(),
            kind,
        });
        id
    }

    /// Whether the object can be rebuilt by generated code
    ///
    /// False when an unknown object or a generator that was never activated
    /// is reachable through builtin composites.
    pub fn can_be_constructed(&self, id: ObjectId) -> bool {
        let object = match self.objects.get(id.index()) {
            Some(object) => object,
            None => return false,
        };
        match &object.kind {
            ObjectKind::Unknown(_) => false,
            ObjectKind::Generator(generator) => generator.is_activated(),
            ObjectKind::Sequence(_)
            | ObjectKind::Map(_)
            | ObjectKind::Exception(_)
            | ObjectKind::Library(_) => object
                .parts()
                .into_iter()
                .all(|part| self.can_be_constructed(part)),
            ObjectKind::Immutable(_) | ObjectKind::User(_) => true,
        }
    }

    /// Whether two objects describe equal values
    ///
    /// Literals compare by reconstruction and builtin or library composites
    /// compare their parts recursively. User objects, generators and unknown
    /// objects are only equal to themselves.
    pub fn content_eq(&self, a: ObjectId, b: ObjectId) -> bool {
        if a == b {
            return true;
        }
        let (left, right) = match (self.objects.get(a.index()), self.objects.get(b.index())) {
            (Some(left), Some(right)) => (left, right),
            _ => return false,
        };
        if left.type_name != right.type_name || left.module_name != right.module_name {
            return false;
        }
        let all_eq = |xs: &[ObjectId], ys: &[ObjectId]| {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| self.content_eq(*x, *y))
        };
        match (&left.kind, &right.kind) {
            (ObjectKind::Immutable(x), ObjectKind::Immutable(y)) => x == y,
            (ObjectKind::Sequence(x), ObjectKind::Sequence(y)) => {
                x.shape == y.shape && all_eq(&x.contained[..], &y.contained[..])
            }
            (ObjectKind::Map(_), ObjectKind::Map(_))
            | (ObjectKind::Exception(_), ObjectKind::Exception(_)) => {
                all_eq(&left.parts()[..], &right.parts()[..])
            }
            (ObjectKind::Library(x), ObjectKind::Library(y)) => {
                x.format == y.format && all_eq(&x.args[..], &y.args[..])
            }
            _ => false,
        }
    }

    /// Hash consistent with [`Execution::content_eq`]
    pub fn content_hash(&self, id: ObjectId) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash_content(id, &mut hasher);
        hasher.finish()
    }

    fn hash_content(&self, id: ObjectId, hasher: &mut FxHasher) {
        let object = match self.objects.get(id.index()) {
            Some(object) => object,
            None => return id.hash(hasher),
        };
        object.type_name.hash(hasher);
        object.module_name.hash(hasher);
        match &object.kind {
            ObjectKind::Immutable(immutable) => {
                immutable.reconstructor.hash(hasher);
                immutable.imports.hash(hasher);
            }
            ObjectKind::Sequence(sequence) => sequence.shape.hash(hasher),
            ObjectKind::Library(library) => library.format.hash(hasher),
            ObjectKind::Map(_) | ObjectKind::Exception(_) => {}
            ObjectKind::Unknown(_) | ObjectKind::User(_) | ObjectKind::Generator(_) => {
                return id.hash(hasher);
            }
        }
        let parts = object.parts();
        parts.len().hash(hasher);
        for part in parts {
            self.hash_content(part, hasher);
        }
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Capture a call to a module-level function
    pub fn create_function_call(
        &mut self,
        function: FunctionId,
        args: &[(String, HostValue)],
        caller: Option<CallId>,
    ) -> CallId {
        let input = self.serialize_arguments(args);
        let id = self.push_call(CallKind::Function, Definition::Function(function), input, caller);
        self.project.write().link_function_capture(
            function,
            CaptureRef {
                execution: self.id,
                target: CaptureTarget::Call(id),
            },
        );
        id
    }

    /// Capture a method call on a user object
    ///
    /// The receiver is serialized before the arguments. The first constructor
    /// call observed on a receiver becomes its `init_call`.
    pub fn create_method_call(
        &mut self,
        method: MethodId,
        receiver: &HostValue,
        args: &[(String, HostValue)],
        caller: Option<CallId>,
    ) -> Result<CallId> {
        let receiver_id = self.serialize(receiver);
        if self.objects[receiver_id.index()].as_user().is_none() {
            return Err(Error::NotAUserObject(receiver_id));
        }
        let input = self.serialize_arguments(args);
        let id = self.push_call(
            CallKind::Method {
                receiver: receiver_id,
            },
            Definition::Method(method),
            input,
            caller,
        );
        let creational = self.project.read().method(method).is_creational();
        if let ObjectKind::User(user) = &mut self.objects[receiver_id.index()].kind {
            user.calls.push(Invocation::Call(id));
            if creational && user.init_call.is_none() {
                user.init_call = Some(id);
            }
        }
        Ok(id)
    }

    /// Capture one resumption of a generator
    ///
    /// The first resumption activates the generator with the arguments its
    /// frame was created with. Resumptions themselves carry no input.
    pub fn create_generator_invocation(
        &mut self,
        generator: &HostValue,
        definition: Definition,
        args: &[(String, HostValue)],
        receiver: Option<&HostValue>,
        caller: Option<CallId>,
    ) -> Result<CallId> {
        let generator_id = self.serialize(generator);
        let activated = match self.objects[generator_id.index()].as_generator() {
            Some(g) => g.is_activated(),
            None => {
                return Err(Error::InvalidOperation(format!(
                    "object {:?} is not a generator",
                    generator_id
                )))
            }
        };

        if !activated {
            let callable = match (definition, receiver) {
                (Definition::Function(function), _) => Callable::Function(function),
                (Definition::Method(_), Some(receiver)) => {
                    let receiver_id = self.serialize(receiver);
                    if self.objects[receiver_id.index()].as_user().is_none() {
                        return Err(Error::NotAUserObject(receiver_id));
                    }
                    Callable::UserObject(receiver_id)
                }
                (Definition::Method(_), None) => {
                    return Err(Error::InvalidOperation(
                        "generator method resumed without a receiver".to_string(),
                    ))
                }
            };
            let args = self.serialize_arguments(args);
            if let ObjectKind::Generator(g) = &mut self.objects[generator_id.index()].kind {
                g.activation = Some(GeneratorActivation {
                    definition,
                    args,
                    callable,
                });
            }
            match callable {
                Callable::Function(function) => self.project.write().link_function_capture(
                    function,
                    CaptureRef {
                        execution: self.id,
                        target: CaptureTarget::Generator(generator_id),
                    },
                ),
                Callable::UserObject(owner) => {
                    if let ObjectKind::User(user) = &mut self.objects[owner.index()].kind {
                        user.calls.push(Invocation::Generator(generator_id));
                    }
                }
            }
            debug!(target: "testscope::capture", generator = ?generator_id, "Generator activated");
        }

        let id = self.push_call(
            CallKind::GeneratorInvocation {
                generator: generator_id,
            },
            definition,
            BTreeMap::new(),
            caller,
        );
        if let ObjectKind::Generator(g) = &mut self.objects[generator_id.index()].kind {
            g.calls.push(id);
        }
        Ok(id)
    }

    fn push_call(
        &mut self,
        kind: CallKind,
        definition: Definition,
        input: BTreeMap<String, ObjectId>,
        caller: Option<CallId>,
    ) -> CallId {
        let id = CallId::new(self.calls.len() as u32);
        let timestamp = self.timeline.next_timestamp();
        let caller = caller.filter(|c| c.index() < self.calls.len());
        self.calls.push(Call {
            id,
            kind,
            definition,
            input,
            outcome: None,
            side_effects: Vec::new(),
            caller,
            subcalls: Vec::new(),
            timestamp,
            completed_at: None,
        });
        match caller {
            Some(parent) => self.calls[parent.index()].subcalls.push(id),
            None => self.call_graph.push(id),
        }
        self.captured_calls.push(id);
        id
    }

    /// Set or replace the outcome of a call
    pub fn set_outcome(&mut self, call: CallId, outcome: CallOutcome) -> Result<()> {
        let call = self.calls.get_mut(call.index()).ok_or(Error::UnknownCall(call))?;
        call.outcome = Some(outcome);
        Ok(())
    }

    /// Forget the outcome of a call (used when a raised exception was handled)
    pub fn clear_outcome(&mut self, call: CallId) -> Result<()> {
        let call = self.calls.get_mut(call.index()).ok_or(Error::UnknownCall(call))?;
        call.outcome = None;
        Ok(())
    }

    /// Stamp the completion of a call
    pub fn complete_call(&mut self, call: CallId) -> Result<Timestamp> {
        if call.index() >= self.calls.len() {
            return Err(Error::UnknownCall(call));
        }
        let timestamp = self.timeline.next_timestamp();
        self.calls[call.index()].completed_at = Some(timestamp);
        Ok(timestamp)
    }

    /// Excise a call from the root list or its caller's subcalls
    pub fn remove_call_from_call_graph(&mut self, call: CallId) -> Result<()> {
        let caller = self.try_call(call)?.caller;
        match caller {
            Some(parent) => self.calls[parent.index()].subcalls.retain(|c| *c != call),
            None => self.call_graph.retain(|c| *c != call),
        }
        Ok(())
    }

    // =========================================================================
    // Side effects
    // =========================================================================

    /// Record a side effect on `owner`, or on the root list when no captured
    /// call is in flight
    pub fn record_side_effect(&mut self, kind: SideEffectKind, owner: Option<CallId>) -> SideEffectId {
        let id = SideEffectId::new(self.side_effects.len() as u32);
        let timestamp = self.timeline.next_timestamp();
        self.side_effects.push(SideEffect::new(id, timestamp, kind));
        match owner.and_then(|c| self.calls.get_mut(c.index())) {
            Some(call) => call.side_effects.push(id),
            None => self.root_side_effects.push(id),
        }
        id
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Finish the capture with the default exhaustion check
    pub fn finalize(&mut self) {
        self.finalize_with(&FrameReleasedCheck);
    }

    /// Finish the capture
    ///
    /// Drops the trailing resumption that returned `None` from every generator
    /// `check` reports as exhausted, then releases every retained host value.
    /// Calling it again has no effect.
    pub fn finalize_with(&mut self, check: &dyn ExhaustionCheck) {
        if self.finalized {
            return;
        }
        let generators = std::mem::take(&mut self.generators);
        for (generator_id, host) in &generators {
            if !check.is_exhausted(host) {
                continue;
            }
            let last = match self.objects[generator_id.index()].as_generator() {
                Some(g) => g.calls.last().copied(),
                None => None,
            };
            let last = match last {
                Some(last) => last,
                None => continue,
            };
            let trailing_none = self.calls[last.index()]
                .output()
                .map_or(false, |output| self.objects[output.index()].is_none());
            if !trailing_none {
                continue;
            }
            if let ObjectKind::Generator(g) = &mut self.objects[generator_id.index()].kind {
                g.calls.pop();
            }
            if let Err(e) = self.remove_call_from_call_graph(last) {
                warn!(target: "testscope::capture", call = ?last, error = %e, "Trailing resumption not unlinked");
            }
            self.captured_calls.retain(|c| *c != last);
            debug!(target: "testscope::capture", generator = ?generator_id, "Dropped trailing resumption");
        }

        self.retained.clear();
        self.identity.clear();
        self.in_progress.clear();
        self.ended_at = Some(Utc::now());
        self.finalized = true;
        debug!(
            target: "testscope::capture",
            execution = %self.id,
            calls = self.captured_calls.len(),
            objects = self.objects.len(),
            "Execution finalized"
        );
    }

    /// Unlink everything this execution captured from the project and clear
    /// all captured state
    pub fn destroy(&mut self) {
        self.project.write().forget_execution(self.id);
        self.timeline = Timeline::new();
        self.identity.clear();
        self.in_progress.clear();
        self.retained.clear();
        self.generators.clear();
        self.objects.clear();
        self.calls.clear();
        self.side_effects.clear();
        self.captured_calls.clear();
        self.call_graph.clear();
        self.root_side_effects.clear();
        self.ended_at = None;
        self.finalized = false;
        debug!(target: "testscope::capture", execution = %self.id, "Execution destroyed");
    }
}

fn partial_reconstructor(value: &HostValue) -> String {
    if value.module() == BUILTIN_MODULE || value.module().is_empty() {
        value.type_name().to_string()
    } else {
        format!("{}.{}", value.module(), value.type_name())
    }
}

/// Short token describing a value, used as a base for variable names
pub fn human_readable_id(value: &HostValue) -> String {
    match value.kind() {
        HostKind::Literal(Literal::Bool(true)) => "true".to_string(),
        HostKind::Literal(Literal::Bool(false)) => "false".to_string(),
        HostKind::Literal(Literal::None) => "None".to_string(),
        HostKind::Literal(Literal::Int(i)) => string2id(&i.to_string()),
        HostKind::Literal(Literal::Float(f)) => string2id(&f.to_string()),
        HostKind::Literal(Literal::Str(s)) => string2id(s),
        HostKind::Literal(Literal::Pattern { pattern, .. }) => {
            format!("{}_pattern", string2id(pattern))
        }
        HostKind::Literal(Literal::Function { name, .. }) => format!("{}_function", name),
        HostKind::Sequence { shape, .. } => match shape {
            SequenceShape::List => "list".to_string(),
            SequenceShape::Tuple => "tuple".to_string(),
            SequenceShape::Set => "set".to_string(),
            SequenceShape::FrozenSet => "frozenset".to_string(),
            SequenceShape::Array(_) => "array".to_string(),
        },
        HostKind::Library { .. } => underscore(value.type_name()),
        HostKind::Map { .. } => "dict".to_string(),
        HostKind::Generator(_) => "generator".to_string(),
        HostKind::Exception { .. } => underscore(value.type_name()),
        HostKind::Instance | HostKind::Opaque => format!("{}_instance", underscore(value.type_name())),
    }
}
