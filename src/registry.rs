//! Named build steps and the registry that owns them.
//!
//! A [`Task`] couples a unique name with the names of its prerequisites and
//! an opaque [`Work`] unit. The [`Registry`] is an explicit, owned object
//! rather than process-wide state, so multiple independent pipelines can
//! coexist in one process (tests rely on this). Registration order is
//! preserved and observable: the resolver uses it to keep level ordering
//! deterministic across runs.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::Environment;
use crate::error::RegistryError;

/// Result from a single executed work unit.
pub type TaskResult<T> = anyhow::Result<T>;

/// Work function pointer used to perform the actual build step. This function
/// is provided by the user from the userland, but it is invoked internally
/// by the executor.
type WorkFnPtr = Arc<dyn Fn(&Environment) -> TaskResult<()> + Send + Sync>;

/// The transform or action a task performs, opaque to the runner.
#[derive(Clone)]
pub struct Work(WorkFnPtr);

impl Work {
    /// Create a new work unit from a closure.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Environment) -> TaskResult<()> + Send + Sync + 'static,
    {
        Self(Arc::new(func))
    }

    /// A work unit that does nothing. Useful for aggregate tasks that exist
    /// only to pull in their prerequisites.
    pub fn noop() -> Self {
        Self::new(|_| Ok(()))
    }

    pub(crate) fn call(&self, env: &Environment) -> TaskResult<()> {
        (self.0)(env)
    }
}

impl Debug for Work {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Work(*)")
    }
}

/// A named, possibly prerequisite-gated unit of build work.
#[derive(Debug, Clone)]
pub struct Task {
    name: String,
    prerequisites: Vec<String>,
    work: Work,
}

impl Task {
    pub fn new(name: impl Into<String>, prerequisites: &[&str], work: Work) -> Self {
        Self {
            name: name.into(),
            prerequisites: prerequisites.iter().map(ToString::to_string).collect(),
            work,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prerequisites(&self) -> &[String] {
        &self.prerequisites
    }

    pub(crate) fn work(&self) -> &Work {
        &self.work
    }
}

/// Position of a task within the registry, in registration order.
pub(crate) type TaskId = usize;

/// Holds every declared task. Initialized once at startup and never mutated
/// afterwards; the graph derived from it is recomputed per run.
#[derive(Debug, Default)]
pub struct Registry {
    tasks: Vec<Task>,
    index: HashMap<String, TaskId>,
    default: Option<TaskId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task. Fails if the name is taken; the registry is left
    /// unchanged by a failed attempt.
    pub fn register(&mut self, task: Task) -> Result<(), RegistryError> {
        if self.index.contains_key(task.name()) {
            return Err(RegistryError::DuplicateTask(task.name().to_string()));
        }

        self.index.insert(task.name().to_string(), self.tasks.len());
        self.tasks.push(task);

        Ok(())
    }

    /// Add a task and mark it as the default target. At most one task can
    /// carry the flag.
    pub fn register_default(&mut self, task: Task) -> Result<(), RegistryError> {
        if let Some(id) = self.default {
            return Err(RegistryError::DuplicateDefault(
                task.name().to_string(),
                self.tasks[id].name().to_string(),
            ));
        }

        self.register(task)?;
        self.default = Some(self.tasks.len() - 1);

        Ok(())
    }

    /// The task marked as default, if any.
    pub fn default_task(&self) -> Option<&Task> {
        self.default.map(|id| &self.tasks[id])
    }

    pub fn lookup(&self, name: &str) -> Option<&Task> {
        self.position(name).map(|id| &self.tasks[id])
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub(crate) fn position(&self, name: &str) -> Option<TaskId> {
        self.index.get(name).copied()
    }

    pub(crate) fn get(&self, id: TaskId) -> &Task {
        &self.tasks[id]
    }

    pub(crate) fn tasks(&self) -> &[Task] {
        &self.tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_order() {
        let mut registry = Registry::new();
        registry.register(Task::new("b", &[], Work::noop())).unwrap();
        registry.register(Task::new("a", &[], Work::noop())).unwrap();

        let names: Vec<_> = registry.tasks().iter().map(Task::name).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(registry.position("b"), Some(0));
        assert_eq!(registry.position("a"), Some(1));
    }

    #[test]
    fn test_duplicate_name() {
        let mut registry = Registry::new();
        registry
            .register(Task::new("styles", &[], Work::noop()))
            .unwrap();

        let err = registry
            .register(Task::new("styles", &["clean"], Work::noop()))
            .unwrap_err();

        assert_eq!(err, RegistryError::DuplicateTask("styles".to_string()));

        // The failed attempt must not leave a trace.
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("styles").unwrap().prerequisites().is_empty());
    }

    #[test]
    fn test_single_default() {
        let mut registry = Registry::new();
        registry
            .register_default(Task::new("build", &[], Work::noop()))
            .unwrap();

        let err = registry
            .register_default(Task::new("deploy", &[], Work::noop()))
            .unwrap_err();

        assert_eq!(
            err,
            RegistryError::DuplicateDefault("deploy".to_string(), "build".to_string())
        );
        assert_eq!(registry.default_task().unwrap().name(), "build");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_missing() {
        let registry = Registry::new();
        assert!(registry.lookup("nope").is_none());
    }
}
