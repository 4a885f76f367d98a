use crate::error::PlanError;
use crate::planner::types::ExecutionPlan;
use std::collections::{BTreeSet, HashMap};

/// Arena view of a plan's dependency edges.
///
/// Nodes are step positions in the plan; `dependencies[i]` lists the
/// positions step `i` waits on. Dependency ids that do not resolve to a step
/// are kept aside in `dangling` instead of becoming edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    plan_id: String,
    ids: Vec<String>,
    index: HashMap<String, usize>,
    dependencies: Vec<Vec<usize>>,
    dangling: Vec<(usize, String)>,
}

impl DependencyGraph {
    pub fn from_plan(plan: &ExecutionPlan) -> Self {
        let ids: Vec<String> = plan.steps.iter().map(|step| step.id.clone()).collect();
        let index: HashMap<String, usize> = ids
            .iter()
            .enumerate()
            .map(|(position, id)| (id.clone(), position))
            .collect();

        let mut dependencies = vec![Vec::new(); ids.len()];
        let mut dangling = Vec::new();
        for (position, step) in plan.steps.iter().enumerate() {
            for dep in &step.depends_on {
                match index.get(dep) {
                    Some(&target) => dependencies[position].push(target),
                    None => dangling.push((position, dep.clone())),
                }
            }
            dependencies[position].sort_unstable();
            dependencies[position].dedup();
        }

        Self {
            plan_id: plan.id.clone(),
            ids,
            index,
            dependencies,
            dangling,
        }
    }

    pub fn position(&self, step_id: &str) -> Option<usize> {
        self.index.get(step_id).copied()
    }

    /// `(step id, unknown dependency id)` pairs.
    pub fn dangling(&self) -> impl Iterator<Item = (&str, &str)> {
        self.dangling
            .iter()
            .map(|(position, dep)| (self.ids[*position].as_str(), dep.as_str()))
    }

    pub fn dependencies_of(&self, step_id: &str) -> Vec<&str> {
        self.position(step_id)
            .map(|position| {
                self.dependencies[position]
                    .iter()
                    .map(|&dep| self.ids[dep].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Steps that list `step_id` as a dependency, in plan order.
    pub fn dependents_of(&self, step_id: &str) -> Vec<&str> {
        let Some(target) = self.position(step_id) else {
            return Vec::new();
        };
        self.dependencies
            .iter()
            .enumerate()
            .filter(|(_, deps)| deps.contains(&target))
            .map(|(position, _)| self.ids[position].as_str())
            .collect()
    }

    /// Depth-first search from every unvisited node. Returns the first cycle
    /// found as a closed path, e.g. `A -> B -> A`.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut states = vec![None; self.ids.len()];
        let mut stack = Vec::new();

        for start in 0..self.ids.len() {
            if states[start].is_some() {
                continue;
            }
            if let Some(path) = self.detect_cycle(start, &mut states, &mut stack) {
                return Some(path.into_iter().map(|i| self.ids[i].clone()).collect());
            }
        }

        None
    }

    fn detect_cycle(
        &self,
        node: usize,
        states: &mut [Option<NodeState>],
        stack: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        states[node] = Some(NodeState::Visiting);
        stack.push(node);

        for &neighbor in &self.dependencies[node] {
            match states[neighbor] {
                Some(NodeState::Visiting) => {
                    let start = stack.iter().position(|&entry| entry == neighbor)?;
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(neighbor);
                    return Some(cycle);
                }
                Some(NodeState::Visited) => {}
                None => {
                    if let Some(path) = self.detect_cycle(neighbor, states, stack) {
                        return Some(path);
                    }
                }
            }
        }

        stack.pop();
        states[node] = Some(NodeState::Visited);
        None
    }

    /// Dependencies-first order. Ties are broken by position in the plan.
    pub fn topological_order(&self) -> Result<Vec<String>, PlanError> {
        if let Some(path) = self.find_cycle() {
            return Err(PlanError::CircularDependency {
                plan_id: self.plan_id.clone(),
                path,
            });
        }

        let mut remaining: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut dependents = vec![Vec::new(); self.ids.len()];
        for (position, deps) in self.dependencies.iter().enumerate() {
            for &dep in deps {
                dependents[dep].push(position);
            }
        }

        let mut ready: BTreeSet<usize> = remaining
            .iter()
            .enumerate()
            .filter_map(|(position, count)| (*count == 0).then_some(position))
            .collect();

        let mut sorted = Vec::with_capacity(self.ids.len());
        while let Some(position) = ready.pop_first() {
            sorted.push(self.ids[position].clone());
            for &dependent in &dependents[position] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        Ok(sorted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Visiting,
    Visited,
}
