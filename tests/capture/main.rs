//! Capture pipeline integration tests
//!
//! Every suite replays a scripted event stream through the real tracer and
//! controller, then inspects the finalized execution and its resolved
//! dependencies.

#[path = "../common/mod.rs"]
mod common;

mod generators;
mod lifecycle;
mod properties;
mod scenarios;
