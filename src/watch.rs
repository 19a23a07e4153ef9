//! Watch mode is implemented as a three-part system:
//!
//! 1. **File watcher**: the `notify` crate monitors filesystem events
//!    recursively, debounced to prevent duplicate builds from rapid saves.
//! 2. **WebSocket server**: a dedicated thread (`tungstenite`) maintains
//!    persistent connections with open browser tabs; see [`crate::reload`].
//! 3. **Client script**: [`Environment::live_reload_script`] returns a
//!    JavaScript snippet to embed into generated pages. It connects to the
//!    WebSocket server and either reloads the page or re-links stylesheets.
//!
//! ## The loop
//!
//! Each watch binding maps a glob pattern to the tasks to re-run. When a
//! change matches, the bound tasks run as independent executor runs, and a
//! reload signal goes out once they settle. Events that arrive while a
//! rebuild is in flight are coalesced: after the rebuild, the event channel
//! is drained and every binding matched in the meantime is marked pending
//! at most once. Rapid file churn therefore triggers one follow-up rebuild
//! per binding, not an unbounded backlog.

use std::collections::BTreeSet;
use std::sync::mpsc::TryRecvError;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use notify::{EventKind, RecursiveMode};
use notify_debouncer_full::{DebounceEventResult, new_debouncer};

use crate::error::{MillraceError, WatchError};
use crate::pipeline::Pipeline;
use crate::utils::as_overhead;
use crate::{Environment, Mode, executor, reload};

/// Signal sent to connected clients once a binding's tasks settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reload {
    /// Reload the whole page.
    Page,
    /// Re-link stylesheets in place, without a full reload.
    Styles,
    /// No client notification.
    None,
}

/// Immutable rule mapping a glob pattern to the tasks to re-run on change.
/// Created at startup, lives for the duration of the process.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    pub(crate) pattern: String,
    pub(crate) tasks: Vec<String>,
    pub(crate) reload: Reload,
}

pub(crate) fn watch(pipeline: &Pipeline, target: Option<&str>) -> Result<(), MillraceError> {
    let (tcp, port) = reload::reserve_port().map_err(WatchError::Io)?;

    let env = Environment {
        generator: "millrace",
        mode: Mode::Watch,
        port: Some(port),
    };

    let name = match target {
        Some(name) => name.to_string(),
        None => pipeline
            .registry
            .default_task()
            .map(|task| task.name().to_string())
            .ok_or(MillraceError::NoDefaultTask)?,
    };

    tracing::info!("running initial build...");
    executor::run(&pipeline.registry, &name, &env, &pipeline.options)?;
    tracing::info!("initial build completed, now watching for changes...");

    let clients = reload::Clients::default();
    let _thread_i = reload::new_thread_ws_incoming(tcp, clients.clone());
    let (tx_reload, _thread_o) = reload::new_thread_ws_reload(clients);

    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer =
        new_debouncer(Duration::from_millis(250), None, tx).map_err(WatchError::Notify)?;

    // Compile each binding into an absolute matcher and collect the minimal
    // set of directories to subscribe to.
    let mut matchers = Vec::with_capacity(pipeline.bindings.len());
    let mut roots = BTreeSet::new();
    for binding in &pipeline.bindings {
        let (root, pattern) = resolve_watch_path(&binding.pattern)?;
        roots.insert(root);
        matchers.push(pattern);
    }

    for root in collapse_watch_paths(roots) {
        tracing::info!("watching {root}");
        debouncer
            .watch(root.as_std_path(), RecursiveMode::Recursive)
            .map_err(WatchError::Notify)?;
    }

    #[cfg(feature = "server")]
    let _thread_http = crate::serve::start(pipeline.serve_dir.clone(), pipeline.http_port);

    let mut pending: BTreeSet<usize> = BTreeSet::new();

    loop {
        // IDLE: block until something changes.
        let events = rx.recv().map_err(WatchError::Recv)?;
        mark_pending(&events, &matchers, &mut pending);

        // BUILDING: run every marked binding, then fold in whatever changed
        // while we were busy, until no binding is pending.
        while !pending.is_empty() {
            let batch = std::mem::take(&mut pending);
            let start = Instant::now();

            for index in batch {
                let binding = &pipeline.bindings[index];
                let mut settled_clean = true;

                for task in &binding.tasks {
                    // A failed rebuild keeps the watcher alive; the user
                    // fixes the file and saves again.
                    if let Err(err) =
                        executor::run(&pipeline.registry, task, &env, &pipeline.options)
                    {
                        tracing::error!("rebuild of '{task}' failed: {err}");
                        settled_clean = false;
                    }
                }

                // RELOADING: notify connected clients.
                if settled_clean && binding.reload != Reload::None {
                    let _ = tx_reload.send(binding.reload);
                }
            }

            eprintln!("Refreshed {}", as_overhead(start));

            loop {
                match rx.try_recv() {
                    Ok(events) => mark_pending(&events, &matchers, &mut pending),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        return Err(WatchError::Recv(std::sync::mpsc::RecvError).into());
                    }
                }
            }
        }
    }
}

/// Mark every binding whose pattern matches a changed path. A binding is
/// marked at most once no matter how many events hit it; last write wins.
fn mark_pending(
    result: &DebounceEventResult,
    matchers: &[Pattern],
    pending: &mut BTreeSet<usize>,
) {
    let events = match result {
        Ok(events) => events,
        Err(errors) => {
            for err in errors {
                tracing::error!("watch error: {err}");
            }
            return;
        }
    };

    for event in events {
        if !matches!(
            event.event.kind,
            EventKind::Create(..) | EventKind::Modify(..) | EventKind::Remove(..)
        ) {
            continue;
        }

        for path in &event.event.paths {
            for (index, pattern) in matchers.iter().enumerate() {
                if pattern.matches_path(path) {
                    pending.insert(index);
                }
            }
        }
    }
}

/// Splits a glob string into a canonicalized static root path (for
/// watching) and a compiled absolute Pattern (for matching).
fn resolve_watch_path(glob_str: &str) -> Result<(Utf8PathBuf, Pattern), WatchError> {
    let path = Utf8Path::new(glob_str);

    // Split path into static root and dynamic suffix (containing wildcards)
    let components: Vec<_> = path.components().collect();
    let split_idx = components
        .iter()
        .position(|c| c.as_str().contains(['*', '?', '[']))
        .unwrap_or(components.len());

    let root_part: Utf8PathBuf = components.iter().take(split_idx).collect();
    let suffix_part: Utf8PathBuf = components.iter().skip(split_idx).collect();

    // Canonicalize the static root (must exist on disk)
    let absolute_root = root_part.canonicalize_utf8()?;

    // A concrete file has its parent watched so atomic writes are caught.
    let (watch_root, match_pattern) =
        if suffix_part.as_str().is_empty() && absolute_root.is_file() {
            let parent = absolute_root
                .parent()
                .unwrap_or(&absolute_root)
                .to_path_buf();
            (parent, absolute_root)
        } else {
            let pattern = absolute_root.join(&suffix_part);
            (absolute_root, pattern)
        };

    let pattern = Pattern::new(match_pattern.as_str())?;

    Ok((watch_root, pattern))
}

/// Reduces a set of paths to the minimal set of watch roots.
///
/// If we watch `/a` and `/a/b`, we only need to watch `/a` because the
/// watcher is recursive.
fn collapse_watch_paths(paths: BTreeSet<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    let mut filtered: Vec<Utf8PathBuf> = Vec::new();

    for path in paths {
        if let Some(last) = filtered.last()
            && path.starts_with(last)
        {
            continue;
        }
        filtered.push(path);
    }

    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::{Event, EventKind, event::ModifyKind};
    use notify_debouncer_full::DebouncedEvent;
    use std::time::Instant;

    fn modify_event(path: &str) -> DebouncedEvent {
        DebouncedEvent::new(
            Event::new(EventKind::Modify(ModifyKind::Any)).add_path(path.into()),
            Instant::now(),
        )
    }

    #[test]
    fn test_rapid_changes_coalesce_per_binding() {
        let matchers = vec![
            Pattern::new("/site/styles/*.css").expect("Should compile"),
            Pattern::new("/site/scripts/*.js").expect("Should compile"),
        ];
        let mut pending = BTreeSet::new();

        // Two rapid saves of the same stylesheet while a build is running
        // mark the binding once, not twice.
        let first = Ok(vec![modify_event("/site/styles/main.css")]);
        let second = Ok(vec![
            modify_event("/site/styles/main.css"),
            modify_event("/site/styles/other.css"),
        ]);

        mark_pending(&first, &matchers, &mut pending);
        mark_pending(&second, &matchers, &mut pending);

        assert_eq!(pending.into_iter().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_non_matching_paths_mark_nothing() {
        let matchers = vec![Pattern::new("/site/styles/*.css").expect("Should compile")];
        let mut pending = BTreeSet::new();

        let events = Ok(vec![modify_event("/site/images/logo.png")]);
        mark_pending(&events, &matchers, &mut pending);

        assert!(pending.is_empty());
    }

    #[test]
    fn test_one_path_marks_every_matching_binding() {
        let matchers = vec![
            Pattern::new("/site/**/*.css").expect("Should compile"),
            Pattern::new("/site/styles/*.css").expect("Should compile"),
        ];
        let mut pending = BTreeSet::new();

        let events = Ok(vec![modify_event("/site/styles/main.css")]);
        mark_pending(&events, &matchers, &mut pending);

        assert_eq!(pending.into_iter().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_resolve_concrete_directory() {
        let cwd = Utf8PathBuf::try_from(std::env::current_dir().unwrap()).unwrap();

        let (watch, pattern) = resolve_watch_path("src").expect("Should resolve");
        assert_eq!(watch.as_str(), cwd.join("src"));
        assert_eq!(pattern.as_str(), cwd.join("src"));
    }

    #[test]
    fn test_resolve_directory_wildcard() {
        let cwd = Utf8PathBuf::try_from(std::env::current_dir().unwrap()).unwrap();

        let (watch, pattern) = resolve_watch_path("src/**/*.rs").expect("Should resolve");
        assert_eq!(watch.as_str(), cwd.join("src"));
        assert_eq!(pattern.as_str(), cwd.join("src/**/*.rs"));
    }

    #[test]
    fn test_collapse_watch_paths() {
        let paths = BTreeSet::from([
            Utf8PathBuf::from("/a"),
            Utf8PathBuf::from("/a/b"),
            Utf8PathBuf::from("/a/b/c"),
            Utf8PathBuf::from("/b"),
            Utf8PathBuf::from("/c/d"),
        ]);

        let collapsed = collapse_watch_paths(paths);
        assert_eq!(
            collapsed,
            vec![
                Utf8PathBuf::from("/a"),
                Utf8PathBuf::from("/b"),
                Utf8PathBuf::from("/c/d")
            ]
        );
    }

    #[test]
    fn test_collapse_watch_paths_similar_names() {
        let paths = BTreeSet::from([
            Utf8PathBuf::from("/foo"),
            Utf8PathBuf::from("/foo-bar"),
        ]);

        let collapsed = collapse_watch_paths(paths);
        assert_eq!(
            collapsed,
            vec![Utf8PathBuf::from("/foo"), Utf8PathBuf::from("/foo-bar")]
        );
    }
}
