//! Capturing entry points
//!
//! Runs one entry point under the tracer and returns the finalized
//! [`Execution`]. The execution is finalized whether the entry point
//! succeeded or not; a failing entry point is reported next to it rather than
//! as an error, since everything captured up to the failure is still useful.
//!
//! ## Usage
//!
//! ```
//! use testscope_core::Project;
//! use testscope_engine::testing::ScriptedRuntime;
//! use testscope_engine::{capture_point_of_entry, CaptureConfig, EntryPoint, SideEffectRegistry};
//!
//! let project = Project::new("/work/app").into_shared();
//! let mut runtime = ScriptedRuntime::new(vec![]);
//! let entry = EntryPoint::new("smoke", "", "/work/app");
//! let report = capture_point_of_entry(
//!     &mut runtime,
//!     project,
//!     &entry,
//!     &CaptureConfig::default(),
//!     &SideEffectRegistry::standard(),
//! )
//! .unwrap();
//! assert!(report.failure.is_none());
//! assert!(report.execution.is_finalized());
//! ```

use crate::config::CaptureConfig;
use crate::controller::CaptureController;
use crate::instrument::Instrumenter;
use crate::registry::SideEffectRegistry;
use crate::runtime::{EntryPoint, EntryPointFailure, HostRuntime, TracingGuard};
use crate::tracer::Tracer;
use testscope_core::{Execution, ExhaustionCheck, FrameReleasedCheck, Result, SharedProject};
use tracing::{info, warn};

/// Result of one capture
#[derive(Debug)]
pub struct CaptureReport {
    /// Finalized execution
    pub execution: Execution,
    /// Uncaught failure of the entry point, if any
    pub failure: Option<EntryPointFailure>,
}

/// Settings for capturing entry points against one project
pub struct Capture<'a> {
    project: SharedProject,
    config: &'a CaptureConfig,
    registry: &'a SideEffectRegistry,
    check: &'a dyn ExhaustionCheck,
}

impl<'a> Capture<'a> {
    /// Capture against `project` with the default exhaustion check
    pub fn new(project: SharedProject, config: &'a CaptureConfig, registry: &'a SideEffectRegistry) -> Self {
        Capture {
            project,
            config,
            registry,
            check: &FrameReleasedCheck,
        }
    }

    /// Use another generator exhaustion check
    pub fn with_exhaustion_check(mut self, check: &'a dyn ExhaustionCheck) -> Self {
        self.check = check;
        self
    }

    /// Run `entry` on `runtime` and capture it
    ///
    /// Modules the run loaded are unloaded afterwards.
    ///
    /// # Errors
    ///
    /// Fails with `Error::AlreadyTracing` if the runtime is already traced.
    pub fn run<R: HostRuntime + ?Sized>(&self, runtime: &mut R, entry: &EntryPoint) -> Result<CaptureReport> {
        let mut guard = TracingGuard::install(runtime)?;
        let modules_before = guard.runtime().loaded_modules();

        info!(target: "testscope::capture", entry = %entry.name, "Capture started");

        let controller = CaptureController::new(
            Execution::new(self.project.clone()),
            self.registry,
            self.config,
        );
        let instrumenter = Instrumenter::with_instrumented(guard.runtime().rewritten_codes());
        let mut tracer = Tracer::new(controller, self.config).with_instrumenter(instrumenter);
        if let Some(driver) = guard.runtime().driver_code() {
            tracer.ignore_code(driver);
        }

        let failure = guard.runtime().run(entry, &mut tracer).err();
        if let Some(failure) = &failure {
            warn!(target: "testscope::capture", entry = %entry.name, failure = %failure, "Entry point failed");
        }

        let runtime = guard.runtime();
        for module in runtime.loaded_modules() {
            if !modules_before.contains(&module) {
                runtime.unload_module(&module);
            }
        }
        drop(guard);

        let mut execution = tracer.into_callback().into_execution();
        execution.finalize_with(self.check);

        info!(
            target: "testscope::capture",
            entry = %entry.name,
            calls = execution.captured_calls().len(),
            objects = execution.objects().len(),
            "Capture finished"
        );
        Ok(CaptureReport { execution, failure })
    }
}

/// Run `entry` on `runtime` and capture it with the default exhaustion check
pub fn capture_point_of_entry<R: HostRuntime + ?Sized>(
    runtime: &mut R,
    project: SharedProject,
    entry: &EntryPoint,
    config: &CaptureConfig,
    registry: &SideEffectRegistry,
) -> Result<CaptureReport> {
    Capture::new(project, config, registry).run(runtime, entry)
}

/// Entry point with the result of its latest run
///
/// Running it again first destroys the previous execution, so the project
/// never links facts from two runs of the same entry point.
#[derive(Debug)]
pub struct PointOfEntry {
    entry: EntryPoint,
    last_run: Option<CaptureReport>,
}

impl PointOfEntry {
    /// Entry point that was never run
    pub fn new(entry: EntryPoint) -> Self {
        PointOfEntry {
            entry,
            last_run: None,
        }
    }

    /// The entry point
    pub fn entry(&self) -> &EntryPoint {
        &self.entry
    }

    /// Result of the latest run
    pub fn last_run(&self) -> Option<&CaptureReport> {
        self.last_run.as_ref()
    }

    /// Erase everything the latest run captured
    pub fn clear_previous_run(&mut self) {
        if let Some(mut report) = self.last_run.take() {
            report.execution.destroy();
        }
    }

    /// Run the entry point again, replacing the previous run
    pub fn inspect<R: HostRuntime + ?Sized>(&mut self, capture: &Capture<'_>, runtime: &mut R) -> Result<&CaptureReport> {
        self.clear_previous_run();
        let report = capture.run(runtime, &self.entry)?;
        Ok(self.last_run.insert(report))
    }
}
