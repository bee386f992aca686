//! Side effects
//!
//! A side effect records a state change (or a read of shared state) observed
//! while a call was in flight. Each one names the objects it changes
//! (`affected`) and the objects it needs in order to be replayed
//! (`referenced`). Every affected object is also referenced.

use crate::ids::{ObjectId, SideEffectId};
use crate::timeline::Timestamp;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

/// Mutating operation on a builtin container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerOp {
    /// `list.append`
    ListAppend,
    /// `list.extend`
    ListExtend,
    /// `list.insert`
    ListInsert,
    /// `list.remove`
    ListRemove,
    /// `list.pop`
    ListPop,
    /// `list.sort`
    ListSort,
    /// `list.reverse`
    ListReverse,
    /// `list.clear`
    ListClear,
    /// `dict[key] = value`
    DictSetItem,
    /// `del dict[key]`
    DictDelItem,
    /// `dict.update`
    DictUpdate,
    /// `dict.setdefault`
    DictSetDefault,
    /// `dict.pop`
    DictPop,
    /// `dict.clear`
    DictClear,
    /// `set.add`
    SetAdd,
    /// `set.discard`
    SetDiscard,
    /// `set.remove`
    SetRemove,
    /// `set.update`
    SetUpdate,
    /// `set.clear`
    SetClear,
}

impl ContainerOp {
    /// Name of the method performing the operation on the receiver
    pub fn method_name(&self) -> &'static str {
        match self {
            ContainerOp::ListAppend => "append",
            ContainerOp::ListExtend => "extend",
            ContainerOp::ListInsert => "insert",
            ContainerOp::ListRemove | ContainerOp::SetRemove => "remove",
            ContainerOp::ListPop | ContainerOp::DictPop => "pop",
            ContainerOp::ListSort => "sort",
            ContainerOp::ListReverse => "reverse",
            ContainerOp::ListClear | ContainerOp::DictClear | ContainerOp::SetClear => "clear",
            ContainerOp::DictSetItem => "__setitem__",
            ContainerOp::DictDelItem => "__delitem__",
            ContainerOp::DictUpdate | ContainerOp::SetUpdate => "update",
            ContainerOp::DictSetDefault => "setdefault",
            ContainerOp::SetAdd => "add",
            ContainerOp::SetDiscard => "discard",
        }
    }
}

/// What happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideEffectKind {
    /// Mutation of a builtin container through one of its methods
    ContainerMutation {
        /// Operation performed
        op: ContainerOp,
        /// Mutated container
        receiver: ObjectId,
        /// Operation arguments
        args: Vec<ObjectId>,
    },
    /// Read of a module-level name
    GlobalRead {
        /// Module holding the name
        module: String,
        /// Name read
        name: String,
        /// Value read
        value: ObjectId,
    },
    /// Rebinding of a module-level name
    GlobalRebind {
        /// Module holding the name
        module: String,
        /// Name rebound
        name: String,
        /// New value
        value: ObjectId,
    },
    /// Rebinding of an attribute on an object
    AttributeRebind {
        /// Object whose attribute changed
        target: ObjectId,
        /// Attribute name
        name: String,
        /// New value
        value: ObjectId,
    },
}

impl SideEffectKind {
    /// Objects whose state the effect changes
    pub fn affected(&self) -> SmallVec<[ObjectId; 2]> {
        match self {
            SideEffectKind::ContainerMutation { receiver, .. } => smallvec![*receiver],
            SideEffectKind::GlobalRead { .. } | SideEffectKind::GlobalRebind { .. } => SmallVec::new(),
            SideEffectKind::AttributeRebind { target, .. } => smallvec![*target],
        }
    }

    /// Objects needed to replay the effect, affected ones first
    pub fn referenced(&self) -> SmallVec<[ObjectId; 4]> {
        match self {
            SideEffectKind::ContainerMutation { receiver, args, .. } => {
                let mut refs: SmallVec<[ObjectId; 4]> = smallvec![*receiver];
                refs.extend(args.iter().copied());
                refs
            }
            SideEffectKind::GlobalRead { value, .. } | SideEffectKind::GlobalRebind { value, .. } => {
                smallvec![*value]
            }
            SideEffectKind::AttributeRebind { target, value, .. } => smallvec![*target, *value],
        }
    }
}

/// Recorded side effect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideEffect {
    /// Arena id
    pub id: SideEffectId,
    /// When it was observed
    pub timestamp: Timestamp,
    /// What happened
    pub kind: SideEffectKind,
    /// Objects changed by the effect
    pub affected_objects: SmallVec<[ObjectId; 2]>,
    /// Objects the effect needs, a superset of `affected_objects`
    pub referenced_objects: SmallVec<[ObjectId; 4]>,
}

impl SideEffect {
    /// Build a side effect, deriving its affected and referenced sets
    pub fn new(id: SideEffectId, timestamp: Timestamp, kind: SideEffectKind) -> Self {
        SideEffect {
            id,
            timestamp,
            affected_objects: kind.affected(),
            referenced_objects: kind.referenced(),
            kind,
        }
    }

    /// Whether `object` is changed by this effect
    pub fn affects(&self, object: ObjectId) -> bool {
        self.affected_objects.contains(&object)
    }

    /// Whether `object` is needed by this effect
    pub fn references(&self, object: ObjectId) -> bool {
        self.referenced_objects.contains(&object)
    }

    /// Append operation on `receiver`, with its single argument
    pub fn as_append_on(&self, receiver: ObjectId) -> Option<ObjectId> {
        match &self.kind {
            SideEffectKind::ContainerMutation {
                op: ContainerOp::ListAppend,
                receiver: r,
                args,
            } if *r == receiver && args.len() == 1 => Some(args[0]),
            _ => None,
        }
    }
}
