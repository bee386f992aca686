//! Setup list optimizer
//!
//! Shortens a resolved setup list by replacing pairs of entries with a
//! single one. The only rewrite is list creation followed by an append on
//! that list:
//!
//! ```text
//! x = []            =>    x = [1]
//! x.append(1)
//! ```
//!
//! The rewrite applies repeatedly, so a run of appends folds into one
//! literal. Only named entries are on the list, so replacing an entry there
//! is enough; no other part of the execution refers to the list by position.

use crate::dependencies::{CollapsedSequence, Dependency};
use smallvec::smallvec;
use testscope_core::{Execution, SequenceShape};

/// Fold sequences and the appends immediately following them
pub fn optimize(execution: &Execution, mut timeline: Vec<Dependency>) -> Vec<Dependency> {
    let mut i = 0;
    while i + 1 < timeline.len() {
        if let Some(collapsed) = collapse_pair(execution, &timeline[i], &timeline[i + 1]) {
            timeline[i] = Dependency::Sequence(collapsed);
            timeline.remove(i + 1);
            continue;
        }
        i += 1;
    }
    timeline
}

fn collapse_pair(execution: &Execution, first: &Dependency, second: &Dependency) -> Option<CollapsedSequence> {
    let effect = execution.side_effect(second.side_effect()?);
    match first {
        Dependency::Object(id) => {
            let sequence = execution.object(*id).as_sequence()?;
            if sequence.shape != SequenceShape::List {
                return None;
            }
            let appended = effect.as_append_on(*id)?;
            let mut contained = sequence.contained.clone();
            contained.push(appended);
            Some(CollapsedSequence {
                object: *id,
                shape: sequence.shape,
                contained,
                appends: smallvec![effect.id],
            })
        }
        Dependency::Sequence(sequence) => {
            let appended = effect.as_append_on(sequence.object)?;
            let mut collapsed = sequence.clone();
            collapsed.contained.push(appended);
            collapsed.appends.push(effect.id);
            Some(collapsed)
        }
        Dependency::SideEffect(_) => None,
    }
}
