//! Dependency resolution
//!
//! Expands a set of requested targets into a [`RunPlan`]: the transitive
//! dependency closure plus any triggered tasks, topologically ordered.
//! Ties are broken by registration order so identical invocations always
//! produce identical plans.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, instrument};

use crate::registry::{RegistryError, TaskRegistry};

/// Errors from plan resolution
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// A target or referenced task name is not registered
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The dependency graph contains a cycle
    #[error("Cyclic dependency detected among tasks: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),
}

/// The resolved, ordered sequence of tasks for one invocation
#[derive(Debug, Clone)]
pub struct RunPlan {
    tasks: Vec<String>,
    targets: BTreeSet<String>,
    satisfied: BTreeSet<String>,
}

impl RunPlan {
    /// Tasks in execution order
    pub fn tasks(&self) -> &[String] {
        &self.tasks
    }

    /// Whether the named task is part of this plan
    pub fn contains(&self, name: &str) -> bool {
        self.tasks.iter().any(|t| t == name)
    }

    /// Whether the named task was requested directly by the caller
    pub fn is_target(&self, name: &str) -> bool {
        self.targets.contains(name)
    }

    /// The requested targets
    pub fn targets(&self) -> &BTreeSet<String> {
        &self.targets
    }

    /// Whether the named task has already completed in this run.
    ///
    /// The executor marks each task satisfied after it succeeds; actions
    /// consult this to avoid redoing work a predecessor covered (e.g.
    /// passing `--no-restore` once restore has run).
    pub fn is_satisfied(&self, name: &str) -> bool {
        self.satisfied.contains(name)
    }

    /// Mark a task as already satisfied so it is not executed again
    /// within this run
    pub fn mark_satisfied(&mut self, name: impl Into<String>) {
        self.satisfied.insert(name.into());
    }

    /// Number of tasks in the plan
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the plan is empty
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Human-readable description of the plan
    pub fn describe(&self, registry: &TaskRegistry) -> String {
        let mut out = String::new();
        for name in &self.tasks {
            let deps: Vec<&str> = registry
                .get(name)
                .map(|t| {
                    t.depends_on()
                        .iter()
                        .map(String::as_str)
                        .filter(|d| self.contains(d))
                        .collect()
                })
                .unwrap_or_default();

            if deps.is_empty() {
                out.push_str(&format!("  {name}\n"));
            } else {
                out.push_str(&format!("  {name} (after: {})\n", deps.join(", ")));
            }
        }
        out
    }
}

/// Resolve the requested targets into an ordered run plan.
///
/// Inclusion rules: targets and their transitive dependencies are always
/// in the plan; a task declaring `triggered_by T` joins only when `T` is
/// in the plan (then its own dependencies join too). `runs_before` only
/// orders tasks that are both present, it never pulls a task in.
#[instrument(skip(registry), fields(targets = ?targets))]
pub fn resolve(registry: &TaskRegistry, targets: &[String]) -> Result<RunPlan, ResolveError> {
    // Every name referenced anywhere must be registered.
    for task in registry.iter() {
        for name in task
            .depends_on()
            .iter()
            .chain(task.triggered_by())
            .chain(task.runs_before())
        {
            registry.get(name)?;
        }
    }

    let tasks: Vec<_> = registry.iter().collect();

    // Transitive dependency closure over registration indices.
    let mut included: BTreeSet<usize> = BTreeSet::new();
    let mut stack: Vec<usize> = Vec::new();
    for target in targets {
        registry.get(target)?;
        stack.push(registry.position(target).unwrap_or_default());
    }
    close_over_dependencies(registry, &mut included, &mut stack);

    // Trigger fixpoint: a task joins once any of its triggers is in.
    loop {
        let mut stack: Vec<usize> = Vec::new();
        for (i, task) in tasks.iter().enumerate() {
            if included.contains(&i) {
                continue;
            }
            let triggered = task
                .triggered_by()
                .iter()
                .filter_map(|t| registry.position(t))
                .any(|t| included.contains(&t));
            if triggered {
                stack.push(i);
            }
        }
        if stack.is_empty() {
            break;
        }
        close_over_dependencies(registry, &mut included, &mut stack);
    }

    // Build edges among included tasks: an edge a -> b means "a runs
    // before b".
    let mut successors: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    let mut in_degree: HashMap<usize, usize> = included.iter().map(|&i| (i, 0)).collect();
    let mut add_edge = |from: usize,
                        to: usize,
                        successors: &mut BTreeMap<usize, BTreeSet<usize>>,
                        in_degree: &mut HashMap<usize, usize>| {
        if successors.entry(from).or_default().insert(to) {
            *in_degree.entry(to).or_default() += 1;
        }
    };

    for &i in &included {
        let task = tasks[i];
        for dep in task.depends_on() {
            let d = registry.position(dep).unwrap_or_default();
            if included.contains(&d) {
                add_edge(d, i, &mut successors, &mut in_degree);
            }
        }
        for trigger in task.triggered_by() {
            let t = registry.position(trigger).unwrap_or_default();
            if included.contains(&t) {
                add_edge(t, i, &mut successors, &mut in_degree);
            }
        }
        for later in task.runs_before() {
            let l = registry.position(later).unwrap_or_default();
            if included.contains(&l) {
                add_edge(i, l, &mut successors, &mut in_degree);
            }
        }
    }

    // Kahn's algorithm; the ready set is ordered by registration index.
    let mut ready: BTreeSet<usize> = included
        .iter()
        .copied()
        .filter(|i| in_degree[i] == 0)
        .collect();
    let mut order: Vec<usize> = Vec::with_capacity(included.len());

    loop {
        let next = ready.iter().next().copied();
        let Some(i) = next else { break };
        ready.remove(&i);
        order.push(i);
        if let Some(succ) = successors.get(&i) {
            for &s in succ {
                let degree = in_degree.entry(s).or_default();
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    ready.insert(s);
                }
            }
        }
    }

    if order.len() != included.len() {
        let sorted: BTreeSet<usize> = order.iter().copied().collect();
        let remaining: BTreeSet<usize> = included.difference(&sorted).copied().collect();
        let cycle = isolate_cycle(&remaining, &successors);
        let names = cycle
            .iter()
            .map(|&i| tasks[i].name().to_string())
            .collect();
        return Err(ResolveError::CyclicDependency(names));
    }

    let plan_tasks: Vec<String> = order.iter().map(|&i| tasks[i].name().to_string()).collect();
    debug!(plan = ?plan_tasks, "plan resolved");

    Ok(RunPlan {
        tasks: plan_tasks,
        targets: targets.iter().cloned().collect(),
        satisfied: BTreeSet::new(),
    })
}

/// Add every index on the stack plus its transitive dependencies to the
/// included set
fn close_over_dependencies(
    registry: &TaskRegistry,
    included: &mut BTreeSet<usize>,
    stack: &mut Vec<usize>,
) {
    let tasks: Vec<_> = registry.iter().collect();
    while let Some(i) = stack.pop() {
        if !included.insert(i) {
            continue;
        }
        for dep in tasks[i].depends_on() {
            if let Some(d) = registry.position(dep) {
                if !included.contains(&d) {
                    stack.push(d);
                }
            }
        }
    }
}

/// Trim nodes that cannot be part of a cycle: repeatedly peel nodes with
/// no predecessors or no successors within the remaining set
fn isolate_cycle(
    remaining: &BTreeSet<usize>,
    successors: &BTreeMap<usize, BTreeSet<usize>>,
) -> BTreeSet<usize> {
    let mut cycle = remaining.clone();
    loop {
        let peel: Vec<usize> = cycle
            .iter()
            .copied()
            .filter(|&i| {
                let has_successor = successors
                    .get(&i)
                    .is_some_and(|s| s.iter().any(|t| cycle.contains(t)));
                let has_predecessor = cycle.iter().any(|&p| {
                    p != i && successors.get(&p).is_some_and(|s| s.contains(&i))
                });
                !has_successor || !has_predecessor
            })
            .collect();
        if peel.is_empty() {
            break;
        }
        for i in peel {
            cycle.remove(&i);
        }
    }
    cycle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    fn noop(name: &str) -> Task {
        Task::new(name, |_| Ok(()))
    }

    fn build_pipeline() -> TaskRegistry {
        let mut registry = TaskRegistry::new();
        registry
            .define(noop("clean").with_runs_before("restore"))
            .unwrap();
        registry.define(noop("restore")).unwrap();
        registry
            .define(noop("compile").with_dependency("restore"))
            .unwrap();
        registry
            .define(noop("test").with_dependency("compile"))
            .unwrap();
        registry
            .define(
                noop("coverage")
                    .with_dependency("test")
                    .with_trigger("test"),
            )
            .unwrap();
        registry.define(noop("publish").with_dependency("test")).unwrap();
        registry
    }

    fn resolve_names(registry: &TaskRegistry, targets: &[&str]) -> Vec<String> {
        let targets: Vec<String> = targets.iter().map(|s| s.to_string()).collect();
        resolve(registry, &targets).unwrap().tasks().to_vec()
    }

    #[test]
    fn test_target_expands_to_dependency_chain() {
        let registry = build_pipeline();
        // coverage is triggered by test, so requesting test pulls it in
        assert_eq!(
            resolve_names(&registry, &["test"]),
            ["restore", "compile", "test", "coverage"]
        );
    }

    #[test]
    fn test_compile_does_not_include_triggered_tasks() {
        let registry = build_pipeline();
        assert_eq!(
            resolve_names(&registry, &["compile"]),
            ["restore", "compile"]
        );
    }

    #[test]
    fn test_trigger_orders_after_trigger_source() {
        let registry = build_pipeline();
        let plan = resolve_names(&registry, &["test"]);
        let test_pos = plan.iter().position(|t| t == "test").unwrap();
        let coverage_pos = plan.iter().position(|t| t == "coverage").unwrap();
        assert!(coverage_pos > test_pos);
    }

    #[test]
    fn test_runs_before_orders_without_including() {
        let registry = build_pipeline();
        // clean is not pulled in by anything
        assert!(!resolve_names(&registry, &["test"]).contains(&"clean".to_string()));
        // but when requested it is ordered before restore
        assert_eq!(
            resolve_names(&registry, &["clean", "compile"]),
            ["clean", "restore", "compile"]
        );
    }

    #[test]
    fn test_every_task_after_its_dependencies() {
        let registry = build_pipeline();
        let plan = resolve_names(&registry, &["publish", "coverage", "clean"]);

        // Each task appears exactly once
        let mut sorted = plan.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), plan.len());

        for name in &plan {
            let pos = plan.iter().position(|t| t == name).unwrap();
            for dep in registry.get(name).unwrap().depends_on() {
                let dep_pos = plan.iter().position(|t| t == dep).unwrap();
                assert!(dep_pos < pos, "{dep} must precede {name}");
            }
        }
    }

    #[test]
    fn test_ties_broken_by_registration_order() {
        let mut registry = TaskRegistry::new();
        registry.define(noop("b-first")).unwrap();
        registry.define(noop("a-second")).unwrap();

        assert_eq!(
            resolve_names(&registry, &["a-second", "b-first"]),
            ["b-first", "a-second"]
        );
    }

    #[test]
    fn test_unknown_target() {
        let registry = build_pipeline();
        let result = resolve(&registry, &["deploy".to_string()]);
        assert!(matches!(
            result,
            Err(ResolveError::Registry(RegistryError::UnknownTask(ref n))) if n == "deploy"
        ));
    }

    #[test]
    fn test_unknown_dependency_reference() {
        let mut registry = TaskRegistry::new();
        registry
            .define(noop("compile").with_dependency("missing"))
            .unwrap();

        let result = resolve(&registry, &["compile".to_string()]);
        assert!(matches!(result, Err(ResolveError::Registry(_))));
    }

    #[test]
    fn test_cycle_detected_with_members() {
        let mut registry = TaskRegistry::new();
        registry.define(noop("a").with_dependency("c")).unwrap();
        registry.define(noop("b").with_dependency("a")).unwrap();
        registry.define(noop("c").with_dependency("b")).unwrap();
        registry.define(noop("d").with_dependency("a")).unwrap();

        let result = resolve(&registry, &["d".to_string()]);
        match result {
            Err(ResolveError::CyclicDependency(members)) => {
                assert_eq!(members, ["a", "b", "c"]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let registry = build_pipeline();
        let first = resolve_names(&registry, &["publish", "coverage"]);
        for _ in 0..10 {
            assert_eq!(resolve_names(&registry, &["publish", "coverage"]), first);
        }
    }

    #[test]
    fn test_plan_satisfied_tracking() {
        let registry = build_pipeline();
        let mut plan = resolve(&registry, &["compile".to_string()]).unwrap();

        assert!(!plan.is_satisfied("restore"));
        plan.mark_satisfied("restore");
        assert!(plan.is_satisfied("restore"));
        assert!(plan.is_target("compile"));
        assert!(!plan.is_target("restore"));
    }

    #[test]
    fn test_describe_lists_dependencies() {
        let registry = build_pipeline();
        let plan = resolve(&registry, &["compile".to_string()]).unwrap();
        let description = plan.describe(&registry);
        assert!(description.contains("restore"));
        assert!(description.contains("compile (after: restore)"));
    }
}
