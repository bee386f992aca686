//! Captured calls

use crate::ids::{CallId, ObjectId, SideEffectId};
use crate::project::Definition;
use crate::timeline::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shape of a captured call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    /// Module-level function call
    Function,
    /// Method call on a user object
    Method {
        /// The bound receiver
        receiver: ObjectId,
    },
    /// One resumption of a generator
    GeneratorInvocation {
        /// The generator being resumed
        generator: ObjectId,
    },
}

/// How a call completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallOutcome {
    /// Normal return with a value
    Returned(ObjectId),
    /// Escaping exception
    Raised(ObjectId),
}

impl CallOutcome {
    /// Object carried by the outcome
    pub fn object(&self) -> ObjectId {
        match self {
            CallOutcome::Returned(id) | CallOutcome::Raised(id) => *id,
        }
    }
}

/// One captured call
///
/// ## Lifecycle
///
/// Created when the call starts, completed when its frame returns, and never
/// destroyed before the owning execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    /// Arena id
    pub id: CallId,
    /// Function, method or generator resumption
    pub kind: CallKind,
    /// Static definition called
    pub definition: Definition,
    /// Serialized arguments by parameter name (empty for resumptions)
    pub input: BTreeMap<String, ObjectId>,
    /// `None` while the call is in flight
    pub outcome: Option<CallOutcome>,
    /// Side effects observed while this call was the innermost captured one
    pub side_effects: Vec<SideEffectId>,
    /// Enclosing captured call
    pub caller: Option<CallId>,
    /// Captured calls made from this one, in order
    pub subcalls: Vec<CallId>,
    /// Start of the call
    pub timestamp: Timestamp,
    /// Set when the outcome is final
    pub completed_at: Option<Timestamp>,
}

impl Call {
    /// Returned value, if the call returned
    pub fn output(&self) -> Option<ObjectId> {
        match self.outcome {
            Some(CallOutcome::Returned(id)) => Some(id),
            _ => None,
        }
    }

    /// Escaping exception, if the call raised
    pub fn exception(&self) -> Option<ObjectId> {
        match self.outcome {
            Some(CallOutcome::Raised(id)) => Some(id),
            _ => None,
        }
    }

    /// Whether the call raised
    pub fn raised(&self) -> bool {
        self.exception().is_some()
    }

    /// Whether the call completed
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Bound receiver of a method call
    pub fn receiver(&self) -> Option<ObjectId> {
        match self.kind {
            CallKind::Method { receiver } => Some(receiver),
            _ => None,
        }
    }

    /// Generator resumed by this call
    pub fn generator(&self) -> Option<ObjectId> {
        match self.kind {
            CallKind::GeneratorInvocation { generator } => Some(generator),
            _ => None,
        }
    }

    /// Completion timestamp, or the start for calls still in flight
    pub fn end_timestamp(&self) -> Timestamp {
        self.completed_at.unwrap_or(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::FunctionId;

    fn call(outcome: Option<CallOutcome>) -> Call {
        Call {
            id: CallId::new(0),
            kind: CallKind::Function,
            definition: Definition::Function(FunctionId::new(0)),
            input: BTreeMap::new(),
            outcome,
            side_effects: Vec::new(),
            caller: None,
            subcalls: Vec::new(),
            timestamp: Timestamp::from_raw(2),
            completed_at: None,
        }
    }

    #[test]
    fn test_outcome_is_either_output_or_exception() {
        let returned = call(Some(CallOutcome::Returned(ObjectId::new(1))));
        assert_eq!(returned.output(), Some(ObjectId::new(1)));
        assert_eq!(returned.exception(), None);

        let raised = call(Some(CallOutcome::Raised(ObjectId::new(2))));
        assert_eq!(raised.output(), None);
        assert!(raised.raised());
    }

    #[test]
    fn test_in_flight_call() {
        let pending = call(None);
        assert!(!pending.is_completed());
        assert_eq!(pending.end_timestamp(), Timestamp::from_raw(2));
    }
}
