//! Per-operation option bundles.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

/// Options of an uninstall operation.
#[derive(Clone, Copy, Debug, Default)]
pub struct UninstallationContext {
    /// Also uninstall dependencies that no remaining package needs.
    pub remove_dependencies: bool,
    /// Skip the dependent check, knowingly leaving orphans behind.
    pub force_remove: bool,
}

impl UninstallationContext {
    /// Creates the default context: no dependency removal, guard active.
    pub fn new() -> Self {
        UninstallationContext::default()
    }

    /// Returns a copy with dependency removal switched on.
    pub fn removing_dependencies(mut self) -> Self {
        self.remove_dependencies = true;
        self
    }

    /// Returns a copy with the dependent guard disabled.
    pub fn forced(mut self) -> Self {
        self.force_remove = true;
        self
    }
}

/// Observations made while an operation executes.
///
/// Shared between the caller and the applier; the applier records paths the
/// caller should surface (currently the readme of directly installed
/// packages).
#[derive(Debug, Default)]
pub struct ExecutionContext {
    files_opened: Mutex<Vec<PathBuf>>,
}

impl ExecutionContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        ExecutionContext::default()
    }

    /// Records a file the caller should open for the user.
    pub fn open_file(&self, path: PathBuf) {
        self.files_opened
            .lock()
            .expect("execution context mutex is never poisoned")
            .push(path);
    }

    /// Returns the recorded files in recording order.
    pub fn files_opened(&self) -> Vec<PathBuf> {
        self.files_opened
            .lock()
            .expect("execution context mutex is never poisoned")
            .clone()
    }
}

/// Options of one apply against a project.
#[derive(Clone, Debug, Default)]
pub struct ProjectContext {
    /// Do not invoke the binding-redirect hook after the apply.
    pub binding_redirects_disabled: bool,
    /// Where the applier records user-facing observations, if anywhere.
    pub execution_context: Option<Arc<ExecutionContext>>,
}

impl ProjectContext {
    /// Creates the default context.
    pub fn new() -> Self {
        ProjectContext::default()
    }

    /// Returns a copy with the binding-redirect hook disabled.
    pub fn without_binding_redirects(mut self) -> Self {
        self.binding_redirects_disabled = true;
        self
    }

    /// Returns a copy recording observations into `execution_context`.
    pub fn with_execution_context(mut self, execution_context: Arc<ExecutionContext>) -> Self {
        self.execution_context = Some(execution_context);
        self
    }
}
