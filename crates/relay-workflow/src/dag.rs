//! DAG validation: resolve dependency references (by id or name) to
//! ids, then reject cycles via a DFS with an explicit recursion stack.

use std::collections::{HashMap, HashSet};

use relay_kernel::{KernelError, KernelResult};

use crate::task::WorkflowTask;

/// Rewrites every dependency entry that names a task by its `name` to
/// that task's `id`, in place. Unresolvable references are rejected.
pub fn normalize_dependencies(tasks: &mut [WorkflowTask]) -> KernelResult<()> {
    let id_set: HashSet<String> = tasks.iter().map(|t| t.id.clone()).collect();
    let name_to_id: HashMap<String, String> = tasks.iter().map(|t| (t.name.clone(), t.id.clone())).collect();

    for task in tasks.iter_mut() {
        let mut resolved = Vec::with_capacity(task.dependencies.len());
        for dep in &task.dependencies {
            if id_set.contains(dep) {
                resolved.push(dep.clone());
            } else if let Some(id) = name_to_id.get(dep) {
                resolved.push(id.clone());
            } else {
                return Err(KernelError::invalid_argument(format!(
                    "task '{}' depends on unresolvable reference '{dep}'",
                    task.id
                )));
            }
        }
        task.dependencies = resolved;
    }
    Ok(())
}

/// Rejects cyclic dependency graphs. Assumes dependencies have already
/// been normalized to ids.
pub fn check_acyclic(tasks: &[WorkflowTask]) -> KernelResult<()> {
    let by_id: HashMap<&str, &WorkflowTask> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }
    let mut marks: HashMap<&str, Mark> = HashMap::new();

    fn visit<'a>(
        id: &'a str,
        by_id: &HashMap<&'a str, &'a WorkflowTask>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> KernelResult<()> {
        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                stack.push(id);
                return Err(KernelError::invalid_argument(format!(
                    "dependency cycle detected: {}",
                    stack.join(" -> ")
                )));
            }
            None => {}
        }
        marks.insert(id, Mark::Visiting);
        stack.push(id);
        if let Some(task) = by_id.get(id) {
            for dep in &task.dependencies {
                visit(dep.as_str(), by_id, marks, stack)?;
            }
        }
        stack.pop();
        marks.insert(id, Mark::Done);
        Ok(())
    }

    for task in tasks {
        let mut stack = Vec::new();
        visit(task.id.as_str(), &by_id, &mut marks, &mut stack)?;
    }
    Ok(())
}

/// Validates and normalizes a task list: dependency references resolved
/// to ids, then checked for cycles.
pub fn validate(tasks: &mut [WorkflowTask]) -> KernelResult<()> {
    normalize_dependencies(tasks)?;
    check_acyclic(tasks)
}

/// Tasks whose every dependency is already in `completed`, excluding
/// tasks already finished (in `completed`, `skipped`, or `failed`).
pub fn ready_tasks<'a>(tasks: &'a [WorkflowTask], completed: &HashSet<String>, done: &HashSet<String>) -> Vec<&'a WorkflowTask> {
    tasks
        .iter()
        .filter(|t| !done.contains(&t.id))
        .filter(|t| t.dependencies.iter().all(|d| completed.contains(d)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;

    fn task(id: &str, deps: &[&str]) -> WorkflowTask {
        WorkflowTask::new(id, id, TaskKind::Sequential, "do work").depends_on(deps.iter().map(|s| s.to_string()))
    }

    #[test]
    fn resolves_dependencies_by_name() {
        let mut tasks = vec![WorkflowTask::new("t1", "fetch", TaskKind::Sequential, "x"), WorkflowTask::new("t2", "process", TaskKind::Sequential, "y").depends_on(["fetch"])];
        normalize_dependencies(&mut tasks).unwrap();
        assert_eq!(tasks[1].dependencies, vec!["t1".to_string()]);
    }

    #[test]
    fn unresolvable_dependency_is_rejected() {
        let mut tasks = vec![task("t1", &["ghost"])];
        assert!(normalize_dependencies(&mut tasks).is_err());
    }

    #[test]
    fn detects_direct_cycle() {
        let tasks = vec![task("a", &["b"]), task("b", &["a"])];
        assert!(check_acyclic(&tasks).is_err());
    }

    #[test]
    fn accepts_diamond_dag() {
        let tasks = vec![task("a", &[]), task("b", &["a"]), task("c", &["a"]), task("d", &["b", "c"])];
        assert!(check_acyclic(&tasks).is_ok());
    }

    #[test]
    fn ready_tasks_respect_completed_set() {
        let tasks = vec![task("a", &[]), task("b", &["a"])];
        let completed = HashSet::new();
        let done = HashSet::new();
        let ready = ready_tasks(&tasks, &completed, &done);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, "a");
    }
}
