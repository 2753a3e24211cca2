//! Dependency graph resolution over plugin metadata.
//!
//! Ordering uses Kahn's algorithm one depth level at a time: every node
//! whose dependencies are all placed is emitted before any node that only
//! becomes ready through it. Within a level, nodes keep their declaration
//! (discovery) order, so results are deterministic for a given input.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::warn;

use crate::error::{PluginError, PluginResult};
use crate::metadata::PluginMetadata;

/// Outcome of planning a batch load.
#[derive(Debug, Clone, Default)]
pub struct LoadPlan {
    /// Names to load, dependencies first.
    pub order: Vec<String>,
    /// Plugins left out of the plan and why.
    pub excluded: Vec<(String, PluginError)>,
    /// `(plugin, dependency)` pairs where the dependency is neither in the
    /// batch nor registered. These plugins still load; enabling them fails
    /// until the dependency appears.
    pub missing: Vec<(String, String)>,
}

fn index_of<'a>(nodes: &[&'a PluginMetadata]) -> HashMap<&'a str, usize> {
    nodes
        .iter()
        .enumerate()
        .map(|(i, m)| (m.name.as_str(), i))
        .collect()
}

/// Kahn's algorithm restricted to edges between `nodes`.
///
/// Returns indices in dependency order, or the indices that could not be
/// ordered (cycle members and everything downstream of them).
fn kahn(nodes: &[&PluginMetadata]) -> Result<Vec<usize>, Vec<usize>> {
    let index = index_of(nodes);
    let mut in_degree = vec![0usize; nodes.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];

    for (i, meta) in nodes.iter().enumerate() {
        let mut seen = HashSet::new();
        for dep in &meta.dependencies {
            if let Some(&j) = index.get(dep.name.as_str())
                && seen.insert(j)
            {
                in_degree[i] += 1;
                dependents[j].push(i);
            }
        }
    }

    let mut level: BTreeSet<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while !level.is_empty() {
        let mut next = BTreeSet::new();
        for i in level {
            order.push(i);
            for &d in &dependents[i] {
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    next.insert(d);
                }
            }
        }
        level = next;
    }

    if order.len() == nodes.len() {
        Ok(order)
    } else {
        Err((0..nodes.len()).filter(|&i| in_degree[i] > 0).collect())
    }
}

/// Find one cycle among `candidates`, following dependency edges.
///
/// The returned names start and end with the same plugin.
fn find_cycle(nodes: &[&PluginMetadata], candidates: &[usize]) -> Option<Vec<String>> {
    let index = index_of(nodes);
    let allowed: HashSet<usize> = candidates.iter().copied().collect();
    // 0 = unvisited, 1 = on stack, 2 = done
    let mut color = vec![0u8; nodes.len()];

    fn visit(
        i: usize,
        nodes: &[&PluginMetadata],
        index: &HashMap<&str, usize>,
        allowed: &HashSet<usize>,
        color: &mut [u8],
        stack: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        color[i] = 1;
        stack.push(i);
        for dep in &nodes[i].dependencies {
            let Some(&j) = index.get(dep.name.as_str()) else {
                continue;
            };
            if !allowed.contains(&j) {
                continue;
            }
            if color[j] == 1 {
                let start = stack.iter().position(|&k| k == j).unwrap_or(0);
                let mut cycle = stack[start..].to_vec();
                cycle.push(j);
                return Some(cycle);
            }
            if color[j] == 0
                && let Some(cycle) = visit(j, nodes, index, allowed, color, stack)
            {
                return Some(cycle);
            }
        }
        stack.pop();
        color[i] = 2;
        None
    }

    for &start in candidates {
        if color[start] == 0 {
            let mut stack = Vec::new();
            if let Some(cycle) = visit(start, nodes, &index, &allowed, &mut color, &mut stack) {
                return Some(cycle.into_iter().map(|i| nodes[i].name.clone()).collect());
            }
        }
    }
    None
}

/// Order `nodes` so every dependency precedes its dependents.
///
/// Dependencies outside `nodes` are ignored. Fails only on a cycle.
pub fn topological_order(nodes: &[&PluginMetadata]) -> PluginResult<Vec<String>> {
    match kahn(nodes) {
        Ok(order) => Ok(order.into_iter().map(|i| nodes[i].name.clone()).collect()),
        Err(remaining) => Err(PluginError::DependencyCycle {
            members: find_cycle(nodes, &remaining)
                .unwrap_or_else(|| remaining.iter().map(|&i| nodes[i].name.clone()).collect()),
        }),
    }
}

/// Resolve the full prerequisite chain of `metadata` against `known`.
///
/// Returns the transitive dependencies of `metadata` followed by
/// `metadata` itself, in load order. Fails on a missing dependency, a
/// version mismatch, or a cycle.
pub fn check_dependencies(
    metadata: &PluginMetadata,
    known: &[&PluginMetadata],
) -> PluginResult<Vec<String>> {
    let mut nodes: Vec<&PluginMetadata> = known
        .iter()
        .copied()
        .filter(|m| m.name != metadata.name)
        .collect();
    nodes.push(metadata);
    let index = index_of(&nodes);

    let mut closure = BTreeSet::new();
    let mut stack = vec![nodes.len() - 1];
    while let Some(i) = stack.pop() {
        if !closure.insert(i) {
            continue;
        }
        for dep in &nodes[i].dependencies {
            let Some(&j) = index.get(dep.name.as_str()) else {
                return Err(PluginError::dependency(
                    &nodes[i].name,
                    format!("missing dependency '{}'", dep.name),
                ));
            };
            if !dep.accepts(&nodes[j].version) {
                return Err(PluginError::dependency(
                    &nodes[i].name,
                    format!(
                        "requires '{}' {} but version {} is available",
                        dep.name, dep.version, nodes[j].version
                    ),
                ));
            }
            stack.push(j);
        }
    }

    let subset: Vec<&PluginMetadata> = closure.into_iter().map(|i| nodes[i]).collect();
    topological_order(&subset)
}

/// Plan a batch load.
///
/// Plugins caught in a cycle within the batch, or depending on one, are
/// excluded. Dependencies on `registered` plugins are treated as satisfied.
pub fn plan_load_order(batch: &[&PluginMetadata], registered: &[&PluginMetadata]) -> LoadPlan {
    let mut plan = LoadPlan::default();

    let known: HashSet<&str> = batch
        .iter()
        .chain(registered.iter())
        .map(|m| m.name.as_str())
        .collect();
    for meta in batch {
        for dep in &meta.dependencies {
            if !known.contains(dep.name.as_str()) {
                warn!(plugin = %meta.name, dependency = %dep.name, "Dependency not available");
                plan.missing.push((meta.name.clone(), dep.name.clone()));
            }
        }
    }

    let remaining = match kahn(batch) {
        Ok(order) => {
            plan.order = order.into_iter().map(|i| batch[i].name.clone()).collect();
            return plan;
        }
        Err(remaining) => remaining,
    };

    let blocked: HashSet<usize> = remaining.iter().copied().collect();
    plan.order = kahn_partial(batch, &blocked);

    let mut unresolved = remaining;
    while let Some(cycle) = find_cycle(batch, &unresolved) {
        let members: HashSet<&str> = cycle.iter().map(String::as_str).collect();
        unresolved.retain(|&i| {
            let name = batch[i].name.as_str();
            if members.contains(name) {
                plan.excluded.push((
                    name.to_string(),
                    PluginError::DependencyCycle {
                        members: cycle.clone(),
                    },
                ));
                false
            } else {
                true
            }
        });
    }
    for i in unresolved {
        plan.excluded.push((
            batch[i].name.clone(),
            PluginError::dependency(&batch[i].name, "depends on a plugin in a dependency cycle"),
        ));
    }

    plan
}

/// Order the nodes not in `blocked`.
fn kahn_partial(nodes: &[&PluginMetadata], blocked: &HashSet<usize>) -> Vec<String> {
    let subset: Vec<&PluginMetadata> = nodes
        .iter()
        .enumerate()
        .filter(|(i, _)| !blocked.contains(i))
        .map(|(_, m)| *m)
        .collect();
    match kahn(&subset) {
        Ok(order) => order.into_iter().map(|i| subset[i].name.clone()).collect(),
        Err(_) => Vec::new(),
    }
}
