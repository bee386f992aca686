//! Host runtime abstraction
//!
//! A [`HostRuntime`] runs entry points of the subject program and reports
//! what happens as [`RawEvent`](crate::event::RawEvent)s to an
//! [`EventSink`]. Only one event consumer can be installed on a runtime at a
//! time; [`TracingGuard`] installs it for the duration of one capture and
//! uninstalls it on drop, even when the run fails.

use crate::event::EventSink;
use std::path::PathBuf;
use testscope_core::{CodeId, Result};

/// Sample program driving the subject code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// Name of the entry point
    pub name: String,
    /// Driver source text
    pub snippet: String,
    /// Directory the driver runs in
    pub working_dir: PathBuf,
    /// Extra import paths made visible to the driver
    pub import_paths: Vec<PathBuf>,
}

impl EntryPoint {
    /// Entry point running `snippet` from `working_dir`, which is also put on
    /// the import path
    pub fn new(name: impl Into<String>, snippet: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        EntryPoint {
            name: name.into(),
            snippet: snippet.into(),
            import_paths: vec![working_dir.clone()],
            working_dir,
        }
    }
}

/// Uncaught failure of an entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPointFailure {
    /// Type of the escaping exception, when known
    pub exception_type: Option<String>,
    /// Human readable description
    pub message: String,
}

impl std::fmt::Display for EntryPointFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.exception_type {
            Some(t) => write!(f, "{}: {}", t, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Runtime executing the subject program
pub trait HostRuntime {
    /// Claim the runtime's event stream
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyTracing` if another consumer is installed.
    fn install(&mut self) -> Result<()>;

    /// Release the event stream
    fn uninstall(&mut self);

    /// Run an entry point, reporting events to `sink`
    ///
    /// The runtime must call [`HostRuntime::rewrite`] for every code unit a
    /// directive returned by `sink` asks for before continuing.
    fn run(
        &mut self,
        entry: &EntryPoint,
        sink: &mut dyn EventSink,
    ) -> std::result::Result<(), EntryPointFailure>;

    /// Rewrite a code unit so it reports events
    fn rewrite(&mut self, code: CodeId) -> Result<()>;

    /// Code units already rewritten on this runtime, by any earlier run
    fn rewritten_codes(&self) -> Vec<CodeId>;

    /// Names of currently loaded modules
    fn loaded_modules(&self) -> Vec<String>;

    /// Unload a module
    fn unload_module(&mut self, module: &str);

    /// Code of the driver wrapping the entry point's snippet, if it has one
    fn driver_code(&self) -> Option<CodeId> {
        None
    }
}

/// Installed event consumer, uninstalled on drop
pub struct TracingGuard<'r, R: HostRuntime + ?Sized> {
    runtime: &'r mut R,
}

impl<'r, R: HostRuntime + ?Sized> TracingGuard<'r, R> {
    /// Install on `runtime`
    ///
    /// # Errors
    ///
    /// Fails with `Error::AlreadyTracing` if the runtime is already traced.
    pub fn install(runtime: &'r mut R) -> Result<Self> {
        runtime.install()?;
        Ok(TracingGuard { runtime })
    }

    /// The guarded runtime
    pub fn runtime(&mut self) -> &mut R {
        self.runtime
    }
}

impl<'r, R: HostRuntime + ?Sized> Drop for TracingGuard<'r, R> {
    fn drop(&mut self) {
        self.runtime.uninstall();
    }
}
