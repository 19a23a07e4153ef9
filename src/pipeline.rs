//! The declaration surface and entry points of a build pipeline.
//!
//! A consumer declares its tasks and watch bindings exactly once at startup
//! through [`PipelineBuilder`], then turns the declarations into an immutable
//! [`Pipeline`] with [`PipelineBuilder::finish`]. All validation that can
//! happen at declaration time does: duplicate names, the default flag and
//! glob patterns fail here, before anything runs.

use std::num::NonZeroUsize;

use camino::Utf8PathBuf;
use console::style;

use crate::error::{MillraceError, RegistryError};
use crate::executor::{self, Diagnostics, FailurePolicy, Options};
use crate::registry::{Registry, Task, Work};
use crate::{Environment, Mode};

#[cfg(feature = "live")]
use crate::watch::{Reload, WatchBinding};

/// A builder struct for declaring a [`Pipeline`] with specified settings.
pub struct PipelineBuilder {
    registry: Registry,
    #[cfg(feature = "live")]
    bindings: Vec<WatchBinding>,
    options: Options,
    serve_dir: Utf8PathBuf,
    http_port: u16,
}

impl PipelineBuilder {
    fn new() -> Self {
        Self {
            registry: Registry::new(),
            #[cfg(feature = "live")]
            bindings: Vec::new(),
            options: Options::default(),
            serve_dir: Utf8PathBuf::from("dist"),
            http_port: 8080,
        }
    }

    /// Declare a task. Fails on a duplicate name.
    pub fn task(
        mut self,
        name: &str,
        prerequisites: &[&str],
        work: Work,
    ) -> Result<Self, RegistryError> {
        self.registry.register(Task::new(name, prerequisites, work))?;
        Ok(self)
    }

    /// Declare a task and mark it as the default target for runs that don't
    /// name one. At most one task can carry the flag.
    pub fn default_task(
        mut self,
        name: &str,
        prerequisites: &[&str],
        work: Work,
    ) -> Result<Self, RegistryError> {
        self.registry
            .register_default(Task::new(name, prerequisites, work))?;
        Ok(self)
    }

    /// Bind a glob pattern to tasks that should re-run whenever a matching
    /// file changes, with an optional reload signal once they settle.
    /// The pattern is validated here; matching happens in watch mode.
    #[cfg(feature = "live")]
    pub fn watch(
        mut self,
        pattern: &str,
        tasks: &[&str],
        reload: Reload,
    ) -> Result<Self, MillraceError> {
        glob::Pattern::new(pattern)?;

        self.bindings.push(WatchBinding {
            pattern: pattern.to_string(),
            tasks: tasks.iter().map(ToString::to_string).collect(),
            reload,
        });

        Ok(self)
    }

    /// Cap on concurrently running tasks within a level. Unbounded when not
    /// set.
    pub fn parallelism(mut self, limit: NonZeroUsize) -> Self {
        self.options.parallelism = Some(limit);
        self
    }

    /// What happens to the rest of a level when one of its tasks fails.
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.options.failure_policy = policy;
        self
    }

    /// Directory served by the development HTTP server. Defaults to `dist`.
    pub fn serve_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.serve_dir = dir.into();
        self
    }

    /// Port of the development HTTP server. Defaults to 8080.
    pub fn http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    pub fn finish(self) -> Pipeline {
        Pipeline {
            registry: self.registry,
            #[cfg(feature = "live")]
            bindings: self.bindings,
            options: self.options,
            serve_dir: self.serve_dir,
            http_port: self.http_port,
        }
    }
}

/// Represents the configured build pipeline and provides methods for running
/// it, either once or in watch mode with live reload.
pub struct Pipeline {
    pub(crate) registry: Registry,
    #[cfg(feature = "live")]
    pub(crate) bindings: Vec<WatchBinding>,
    pub(crate) options: Options,
    pub(crate) serve_dir: Utf8PathBuf,
    pub(crate) http_port: u16,
}

impl Pipeline {
    pub fn design() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs the named task and everything it depends on, once.
    pub fn run(&self, task: &str) -> Result<Diagnostics, MillraceError> {
        #[cfg(feature = "logging")]
        crate::utils::init_logging();

        eprintln!(
            "Running {} in {} mode.",
            style("millrace").red(),
            style("build").blue()
        );

        let env = Environment {
            generator: "millrace",
            mode: Mode::Build,
            port: None,
        };

        executor::run(&self.registry, task, &env, &self.options)
    }

    /// Runs the task marked as default.
    pub fn run_default(&self) -> Result<Diagnostics, MillraceError> {
        let name = self
            .registry
            .default_task()
            .map(|task| task.name().to_string())
            .ok_or(MillraceError::NoDefaultTask)?;

        self.run(&name)
    }

    /// Builds the target once, then watches the bound patterns, re-running
    /// their tasks on change and notifying connected live-reload clients.
    /// Runs until the process is stopped.
    #[cfg(feature = "live")]
    pub fn watch(&self, target: Option<&str>) -> Result<(), MillraceError> {
        #[cfg(feature = "logging")]
        crate::utils::init_logging();

        eprintln!(
            "Running {} in {} mode.",
            style("millrace").red(),
            style("watch").blue()
        );

        crate::watch::watch(self, target)
    }

    /// Read-only access to the declared tasks.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
