//! Task dependency resolution.
//!
//! Turns the flat registry into a directed graph (prerequisite → dependent)
//! and orders the ancestors of a target into **levels**: each level is a set
//! of tasks with no edges between them whose prerequisites are all satisfied
//! by prior levels. The executor runs one level at a time.
//!
//! The ordering is Kahn's algorithm, restricted to the subgraph reachable
//! from the target through prerequisite edges. Ties within a level break by
//! registration order, which keeps the schedule deterministic across runs.

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};

use crate::error::ResolveError;
use crate::registry::{Registry, TaskId};

pub(crate) fn resolve(registry: &Registry, target: &str) -> Result<Vec<Vec<TaskId>>, ResolveError> {
    let target = registry
        .position(target)
        .ok_or_else(|| ResolveError::UnknownTask(target.to_string()))?;

    // Node order mirrors registration order; the level tie-break relies on it.
    let mut graph = DiGraph::<TaskId, ()>::with_capacity(registry.len(), registry.len());
    for id in 0..registry.len() {
        graph.add_node(id);
    }

    for (id, task) in registry.tasks().iter().enumerate() {
        for name in task.prerequisites() {
            let dep = registry
                .position(name)
                .ok_or_else(|| ResolveError::UnknownTask(name.clone()))?;
            graph.add_edge(NodeIndex::new(dep), NodeIndex::new(id), ());
        }
    }

    // Only the ancestors of the target take part in the sort.
    let mut reachable = vec![false; registry.len()];
    let reversed = Reversed(&graph);
    let mut dfs = Dfs::new(reversed, NodeIndex::new(target));
    while let Some(node) = dfs.next(reversed) {
        reachable[node.index()] = true;
    }

    let mut in_degree: Vec<usize> = (0..registry.len())
        .map(|id| {
            graph
                .neighbors_directed(NodeIndex::new(id), Direction::Incoming)
                .filter(|dep| reachable[dep.index()])
                .count()
        })
        .collect();

    let mut remaining = reachable.iter().filter(|r| **r).count();
    let mut done = vec![false; registry.len()];
    let mut levels = Vec::new();

    while remaining > 0 {
        let level: Vec<TaskId> = (0..registry.len())
            .filter(|&id| reachable[id] && !done[id] && in_degree[id] == 0)
            .collect();

        // Nothing has zero in-degree, yet tasks remain: a cycle.
        if level.is_empty() {
            break;
        }

        for &id in &level {
            done[id] = true;
            for next in graph.neighbors(NodeIndex::new(id)) {
                if reachable[next.index()] && !done[next.index()] {
                    in_degree[next.index()] -= 1;
                }
            }
        }

        remaining -= level.len();
        levels.push(level);
    }

    if remaining > 0 {
        let cycle = (0..registry.len())
            .filter(|&id| reachable[id] && !done[id])
            .map(|id| registry.get(id).name().to_string())
            .collect();
        return Err(ResolveError::Cycle(cycle));
    }

    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Task, Work};

    fn registry(tasks: &[(&str, &[&str])]) -> Registry {
        let mut registry = Registry::new();
        for (name, deps) in tasks {
            registry.register(Task::new(*name, deps, Work::noop())).unwrap();
        }
        registry
    }

    fn names(registry: &Registry, levels: &[Vec<TaskId>]) -> Vec<Vec<String>> {
        levels
            .iter()
            .map(|level| {
                level
                    .iter()
                    .map(|&id| registry.get(id).name().to_string())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_independent_then_join() {
        // A and B are free, C waits on both. Level one lists A before B
        // because A was registered first.
        let registry = registry(&[("a", &[]), ("b", &[]), ("c", &["a", "b"])]);

        let levels = resolve(&registry, "c").expect("Should resolve");
        assert_eq!(names(&registry, &levels), vec![vec!["a", "b"], vec!["c"]]);
    }

    #[test]
    fn test_tie_break_follows_registration() {
        let registry = registry(&[("b", &[]), ("a", &[]), ("c", &["a", "b"])]);

        let levels = resolve(&registry, "c").expect("Should resolve");
        assert_eq!(names(&registry, &levels), vec![vec!["b", "a"], vec!["c"]]);
    }

    #[test]
    fn test_diamond() {
        let registry = registry(&[
            ("base", &[]),
            ("left", &["base"]),
            ("right", &["base"]),
            ("top", &["left", "right"]),
        ]);

        let levels = resolve(&registry, "top").expect("Should resolve");
        assert_eq!(
            names(&registry, &levels),
            vec![vec!["base"], vec!["left", "right"], vec!["top"]]
        );
    }

    #[test]
    fn test_restricted_to_ancestors() {
        // Resolving "left" must not pull in the unrelated "other" task.
        let registry = registry(&[("base", &[]), ("left", &["base"]), ("other", &[])]);

        let levels = resolve(&registry, "left").expect("Should resolve");
        assert_eq!(names(&registry, &levels), vec![vec!["base"], vec!["left"]]);
    }

    #[test]
    fn test_every_task_once_and_after_prerequisites() {
        let registry = registry(&[
            ("a", &[]),
            ("b", &["a"]),
            ("c", &["a"]),
            ("d", &["b", "c"]),
            ("e", &["d", "a"]),
        ]);

        let levels = resolve(&registry, "e").expect("Should resolve");
        let flat = names(&registry, &levels);

        let level_of = |name: &str| {
            flat.iter()
                .position(|level| level.iter().any(|n| n == name))
                .unwrap()
        };

        let all: Vec<_> = flat.iter().flatten().collect();
        assert_eq!(all.len(), 5);

        for task in registry.tasks() {
            for dep in task.prerequisites() {
                assert!(level_of(dep) < level_of(task.name()));
            }
        }
    }

    #[test]
    fn test_unknown_target() {
        let registry = registry(&[("a", &[])]);

        let err = resolve(&registry, "nope").unwrap_err();
        assert_eq!(err, ResolveError::UnknownTask("nope".to_string()));
    }

    #[test]
    fn test_unknown_prerequisite() {
        let registry = registry(&[("a", &["ghost"])]);

        let err = resolve(&registry, "a").unwrap_err();
        assert_eq!(err, ResolveError::UnknownTask("ghost".to_string()));
    }

    #[test]
    fn test_two_cycle() {
        let registry = registry(&[("d", &["e"]), ("e", &["d"])]);

        let err = resolve(&registry, "d").unwrap_err();
        assert_eq!(
            err,
            ResolveError::Cycle(vec!["d".to_string(), "e".to_string()])
        );
    }

    #[test]
    fn test_self_cycle() {
        let registry = registry(&[("loop", &["loop"])]);

        let err = resolve(&registry, "loop").unwrap_err();
        assert_eq!(err, ResolveError::Cycle(vec!["loop".to_string()]));
    }

    #[test]
    fn test_cycle_behind_valid_prefix() {
        // The acyclic prefix resolves into levels, but the run must still
        // fail without returning a partial order.
        let registry = registry(&[("a", &[]), ("b", &["a", "c"]), ("c", &["b"])]);

        let err = resolve(&registry, "b").unwrap_err();
        assert_eq!(
            err,
            ResolveError::Cycle(vec!["b".to_string(), "c".to_string()])
        );
    }
}
