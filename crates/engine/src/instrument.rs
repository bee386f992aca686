//! Idempotent code rewriting
//!
//! Some hosts only report events for code that was rewritten to do so. The
//! [`Instrumenter`] remembers which code units were already handed to the host
//! for rewriting so each one is rewritten at most once, no matter how often it
//! is called, passed to third-party code or reloaded. Each capture seeds it
//! with what the runtime already rewrote, so the rule spans runs too.

use rustc_hash::FxHashSet;
use testscope_core::CodeId;

/// Set of code units already instrumented
#[derive(Debug, Default, Clone)]
pub struct Instrumenter {
    instrumented: FxHashSet<CodeId>,
}

impl Instrumenter {
    /// Create an instrumenter that has rewritten nothing yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Instrumenter that knows `codes` are already rewritten
    pub fn with_instrumented(codes: impl IntoIterator<Item = CodeId>) -> Self {
        Instrumenter {
            instrumented: codes.into_iter().collect(),
        }
    }

    /// Mark `code` as instrumented
    ///
    /// Returns true only the first time a code unit is requested, i.e. when
    /// the host still has to rewrite it.
    pub fn request(&mut self, code: CodeId) -> bool {
        self.instrumented.insert(code)
    }

    /// Whether `code` was already requested
    pub fn is_instrumented(&self, code: CodeId) -> bool {
        self.instrumented.contains(&code)
    }

    /// Number of instrumented code units
    pub fn len(&self) -> usize {
        self.instrumented.len()
    }

    /// Whether nothing was instrumented yet
    pub fn is_empty(&self) -> bool {
        self.instrumented.is_empty()
    }
}
