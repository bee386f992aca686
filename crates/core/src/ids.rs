//! Identifier types
//!
//! Arena indices (`ObjectId`, `CallId`, `SideEffectId`) are only meaningful
//! within the execution that produced them. `ExecutionId` is globally unique
//! and links captured facts back to the project's static definitions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(u32);

        impl $name {
            /// Create an id from an arena index
            #[inline]
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// Arena index
            #[inline]
            pub const fn index(&self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_id!(
    /// Serialized object within one execution
    ObjectId
);
arena_id!(
    /// Captured call within one execution
    CallId
);
arena_id!(
    /// Recorded side effect within one execution
    SideEffectId
);
arena_id!(
    /// Function definition within a project
    FunctionId
);
arena_id!(
    /// Class definition within a project
    ClassId
);

/// Method definition: owning class plus position in its method list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MethodId {
    /// Class declaring the method
    pub class: ClassId,
    /// Index into the class's method list
    pub index: u32,
}

/// Unique identifier for one execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    /// Generate a fresh execution id
    pub fn new() -> Self {
        ExecutionId(Uuid::new_v4())
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_id_roundtrip() {
        let id = ObjectId::new(12);
        assert_eq!(id.index(), 12);
        assert_eq!(id, ObjectId::new(12));
        assert!(ObjectId::new(1) < ObjectId::new(2));
    }

    #[test]
    fn test_execution_ids_are_unique() {
        assert_ne!(ExecutionId::new(), ExecutionId::new());
    }

    #[test]
    fn test_method_id_ordering() {
        let a = MethodId { class: ClassId::new(0), index: 1 };
        let b = MethodId { class: ClassId::new(1), index: 0 };
        assert!(a < b);
    }
}
