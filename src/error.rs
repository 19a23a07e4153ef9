use thiserror::Error;

/// Errors raised while declaring tasks, before anything runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("task '{0}' is already registered")]
    DuplicateTask(String),

    #[error("task '{0}' cannot be the default, '{1}' already is")]
    DuplicateDefault(String, String),
}

/// Errors raised while ordering the task graph for a run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("task '{0}' is not registered")]
    UnknownTask(String),

    #[error("cyclic dependency between tasks: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

/// Errors raised while executing a run.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("task '{0}':\n{1}")]
    Task(String, anyhow::Error),
}

/// Errors raised by the file-record helpers used by the bundled transforms.
#[derive(Debug, Error)]
pub enum FilesError {
    #[error("couldn't load data from file.\n{0}")]
    FileSystem(#[from] std::io::Error),

    #[error("couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),
}

#[cfg(feature = "live")]
#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Notify(#[from] notify::Error),

    #[error(transparent)]
    Recv(#[from] std::sync::mpsc::RecvError),

    #[error("couldn't compile glob pattern.\n{0}")]
    Pattern(#[from] glob::PatternError),
}

#[derive(Debug, Error)]
pub enum MillraceError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("error while building.\n{0}")]
    Build(#[from] BuildError),

    #[cfg(feature = "live")]
    #[error("error while watching for file changes:\n{0}")]
    Watch(#[from] WatchError),

    #[error(transparent)]
    GlobPattern(#[from] glob::PatternError),

    #[error("no task selected and no default task is registered")]
    NoDefaultTask,
}
