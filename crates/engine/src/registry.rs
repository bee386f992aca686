//! Side-effect registry for opaque container operations
//!
//! Maps a (receiver type, operation name) pair observed on an opaque call to
//! the [`ContainerOp`] it performs. The registry is filled once by ordinary
//! `register` calls and then shared by reference; the capture controller
//! only reads it.
//!
//! ## Usage
//!
//! ```
//! use testscope_core::ContainerOp;
//! use testscope_engine::SideEffectRegistry;
//!
//! let registry = SideEffectRegistry::standard();
//! assert_eq!(registry.get("list", "append"), Some(ContainerOp::ListAppend));
//!
//! // Unregistered operations are simply not observed
//! assert!(!registry.knows("list", "index"));
//! ```

use rustc_hash::FxHashMap;
use testscope_core::ContainerOp;

/// Registry of recognized container mutations
///
/// Pairs that are not registered are treated as reads.
#[derive(Debug, Clone, Default)]
pub struct SideEffectRegistry {
    operations: FxHashMap<(String, String), ContainerOp>,
}

impl SideEffectRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry covering the mutating methods of builtin lists, dicts and sets
    pub fn standard() -> Self {
        let mut registry = Self::new();

        registry.register("list", "append", ContainerOp::ListAppend);
        registry.register("list", "extend", ContainerOp::ListExtend);
        registry.register("list", "insert", ContainerOp::ListInsert);
        registry.register("list", "remove", ContainerOp::ListRemove);
        registry.register("list", "pop", ContainerOp::ListPop);
        registry.register("list", "sort", ContainerOp::ListSort);
        registry.register("list", "reverse", ContainerOp::ListReverse);
        registry.register("list", "clear", ContainerOp::ListClear);

        registry.register("dict", "__setitem__", ContainerOp::DictSetItem);
        registry.register("dict", "__delitem__", ContainerOp::DictDelItem);
        registry.register("dict", "update", ContainerOp::DictUpdate);
        registry.register("dict", "setdefault", ContainerOp::DictSetDefault);
        registry.register("dict", "pop", ContainerOp::DictPop);
        registry.register("dict", "clear", ContainerOp::DictClear);

        registry.register("set", "add", ContainerOp::SetAdd);
        registry.register("set", "discard", ContainerOp::SetDiscard);
        registry.register("set", "remove", ContainerOp::SetRemove);
        registry.register("set", "update", ContainerOp::SetUpdate);
        registry.register("set", "clear", ContainerOp::SetClear);

        registry
    }

    /// Register an operation
    ///
    /// A later registration for the same pair replaces the earlier one.
    pub fn register(&mut self, receiver_type: &str, operation: &str, op: ContainerOp) {
        self.operations
            .insert((receiver_type.to_string(), operation.to_string()), op);
    }

    /// Get the operation for a receiver type and operation name
    pub fn get(&self, receiver_type: &str, operation: &str) -> Option<ContainerOp> {
        self.operations
            .get(&(receiver_type.to_string(), operation.to_string()))
            .copied()
    }

    /// Check if a pair is registered
    pub fn knows(&self, receiver_type: &str, operation: &str) -> bool {
        self.get(receiver_type, operation).is_some()
    }

    /// List all registered pairs, sorted
    pub fn list(&self) -> Vec<(&str, &str, ContainerOp)> {
        let mut pairs: Vec<_> = self
            .operations
            .iter()
            .map(|((t, o), op)| (t.as_str(), o.as_str(), *op))
            .collect();
        pairs.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        pairs
    }

    /// Get the number of registered pairs
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
