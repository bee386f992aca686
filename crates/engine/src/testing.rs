//! Deterministic host runtime for tests
//!
//! [`ScriptedRuntime`] replays a fixed list of events instead of running
//! code. It honours the install/uninstall protocol, applies rewrite
//! directives and tracks modules loaded by the script, which is enough to
//! drive the whole capture pipeline without a real interpreter.

use crate::event::{EventSink, RawEvent};
use crate::runtime::{EntryPoint, EntryPointFailure, HostRuntime};
use testscope_core::{CodeId, Error, Result};

/// Runtime replaying a recorded event script
#[derive(Debug, Default)]
pub struct ScriptedRuntime {
    script: Vec<RawEvent>,
    failure: Option<EntryPointFailure>,
    driver: Option<CodeId>,
    installed: bool,
    rewritten: Vec<CodeId>,
    modules: Vec<String>,
    runs: usize,
}

impl ScriptedRuntime {
    /// Runtime replaying `script` on every run
    pub fn new(script: Vec<RawEvent>) -> Self {
        ScriptedRuntime {
            script,
            ..Self::default()
        }
    }

    /// Report `failure` after the script was replayed
    pub fn failing_with(mut self, failure: EntryPointFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Declare the code of the driver wrapping the snippet
    pub fn with_driver(mut self, code: CodeId) -> Self {
        self.driver = Some(code);
        self
    }

    /// Pretend `module` was loaded before any run
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.modules.push(module.into());
        self
    }

    /// Whether an event consumer is installed
    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Code units rewritten so far, in order
    pub fn rewritten(&self) -> &[CodeId] {
        &self.rewritten
    }

    /// Number of completed runs
    pub fn runs(&self) -> usize {
        self.runs
    }
}

impl HostRuntime for ScriptedRuntime {
    fn install(&mut self) -> Result<()> {
        if self.installed {
            return Err(Error::AlreadyTracing);
        }
        self.installed = true;
        Ok(())
    }

    fn uninstall(&mut self) {
        self.installed = false;
    }

    fn run(
        &mut self,
        _entry: &EntryPoint,
        sink: &mut dyn EventSink,
    ) -> std::result::Result<(), EntryPointFailure> {
        let script = self.script.clone();
        for event in script {
            if let RawEvent::ModuleLoaded { module, .. } = &event {
                self.modules.push(module.clone());
            }
            let directive = sink.on_event(event);
            for code in directive.rewrite {
                self.rewrite(code).map_err(|e| EntryPointFailure {
                    exception_type: None,
                    message: e.to_string(),
                })?;
            }
        }
        self.runs += 1;
        match &self.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }

    fn rewrite(&mut self, code: CodeId) -> Result<()> {
        self.rewritten.push(code);
        Ok(())
    }

    fn rewritten_codes(&self) -> Vec<CodeId> {
        self.rewritten.clone()
    }

    fn loaded_modules(&self) -> Vec<String> {
        self.modules.clone()
    }

    fn unload_module(&mut self, module: &str) {
        self.modules.retain(|m| m != module);
    }

    fn driver_code(&self) -> Option<CodeId> {
        self.driver
    }
}
