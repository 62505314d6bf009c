//! Execution planning: topological layering of the stage graph into
//! concurrency-safe groups.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::StageConfig;
use crate::core::StageId;
use crate::errors::{CaseflowError, CyclicDependencyError, ValidationError};

/// A batch of mutually independent stages safe to dispatch concurrently.
///
/// Members always come from the same topological layer and are kept in
/// ascending sorted order, which fixes the merge order downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageGroup {
    /// Member stage ids, sorted ascending.
    pub stages: Vec<StageId>,
}

impl StageGroup {
    /// Creates a group from members, sorting them for determinism.
    #[must_use]
    pub fn new(mut stages: Vec<StageId>) -> Self {
        stages.sort();
        Self { stages }
    }

    /// Creates a single-member group.
    #[must_use]
    pub fn singleton(stage: impl Into<StageId>) -> Self {
        Self {
            stages: vec![stage.into()],
        }
    }

    /// Returns true if the group has exactly one member.
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.stages.len() == 1
    }

    /// Returns true if the group contains the stage.
    #[must_use]
    pub fn contains(&self, stage: &str) -> bool {
        self.stages.iter().any(|s| s == stage)
    }
}

/// Converts a set of stage configs into an ordered group sequence.
///
/// Each layer holds stages whose dependencies are fully satisfied by prior
/// layers. Within a layer, parallel-eligible stages share one group
/// (emitted first); every other stage becomes its own singleton group, in
/// ascending id order. Repeated planning over the same graph always yields
/// the same sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionPlanner;

impl ExecutionPlanner {
    /// Plans the group sequence for the given configs.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for duplicate ids or dependencies on
    /// unknown stages, and [`CyclicDependencyError`] if the graph is not a
    /// DAG. Both are fatal and never retried.
    pub fn plan(configs: &[StageConfig]) -> Result<Vec<StageGroup>, CaseflowError> {
        let mut by_id: BTreeMap<&str, &StageConfig> = BTreeMap::new();
        for config in configs {
            if by_id.insert(config.id.as_str(), config).is_some() {
                return Err(ValidationError::new(format!(
                    "duplicate stage id '{}'",
                    config.id
                ))
                .with_stages(vec![config.id.clone()])
                .into());
            }
        }
        for config in configs {
            for dep in &config.depends_on {
                if !by_id.contains_key(dep.as_str()) {
                    return Err(ValidationError::new(format!(
                        "stage '{}' depends on unknown stage '{dep}'",
                        config.id
                    ))
                    .with_stages(vec![config.id.clone(), dep.clone()])
                    .into());
                }
            }
        }

        let mut groups = Vec::new();
        let mut satisfied: BTreeSet<&str> = BTreeSet::new();
        let mut remaining: BTreeSet<&str> = by_id.keys().copied().collect();

        while !remaining.is_empty() {
            // BTreeSet iteration keeps every layer sorted ascending.
            let layer: Vec<&str> = remaining
                .iter()
                .copied()
                .filter(|id| {
                    by_id[id]
                        .depends_on
                        .iter()
                        .all(|dep| satisfied.contains(dep.as_str()))
                })
                .collect();

            if layer.is_empty() {
                let cycle = find_cycle(&remaining, &by_id);
                return Err(CyclicDependencyError::new(cycle).into());
            }

            let parallel: Vec<StageId> = layer
                .iter()
                .filter(|id| by_id[*id].parallel_eligible)
                .map(|id| (*id).to_string())
                .collect();
            if !parallel.is_empty() {
                groups.push(StageGroup::new(parallel));
            }
            for id in &layer {
                if !by_id[*id].parallel_eligible {
                    groups.push(StageGroup::singleton(*id));
                }
            }

            for id in layer {
                satisfied.insert(id);
                remaining.remove(id);
            }
        }

        Ok(groups)
    }
}

/// Walks the unresolvable remainder of the graph to report one concrete
/// cycle, first node repeated at the end.
fn find_cycle(remaining: &BTreeSet<&str>, by_id: &BTreeMap<&str, &StageConfig>) -> Vec<StageId> {
    fn visit(
        node: &str,
        remaining: &BTreeSet<&str>,
        by_id: &BTreeMap<&str, &StageConfig>,
        path: &mut Vec<StageId>,
        visited: &mut BTreeSet<StageId>,
    ) -> Option<Vec<StageId>> {
        if let Some(pos) = path.iter().position(|p| p == node) {
            let mut cycle: Vec<StageId> = path[pos..].to_vec();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        if !visited.insert(node.to_string()) {
            return None;
        }
        path.push(node.to_string());
        if let Some(config) = by_id.get(node) {
            for dep in &config.depends_on {
                if remaining.contains(dep.as_str()) {
                    if let Some(cycle) = visit(dep.as_str(), remaining, by_id, path, visited) {
                        return Some(cycle);
                    }
                }
            }
        }
        path.pop();
        None
    }

    let mut visited = BTreeSet::new();
    for start in remaining {
        let mut path = Vec::new();
        if let Some(cycle) = visit(start, remaining, by_id, &mut path, &mut visited) {
            return cycle;
        }
    }
    remaining.iter().map(|s| (*s).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stage(id: &str) -> StageConfig {
        StageConfig::new(id)
    }

    #[test]
    fn test_plan_linear_chain() {
        let configs = vec![
            stage("scrape"),
            stage("property_lookup").with_dependency("scrape"),
            stage("bid_calc").with_dependency("property_lookup"),
        ];

        let groups = ExecutionPlanner::plan(&configs).unwrap();
        let ids: Vec<Vec<String>> = groups.into_iter().map(|g| g.stages).collect();
        assert_eq!(
            ids,
            vec![
                vec!["scrape".to_string()],
                vec!["property_lookup".to_string()],
                vec!["bid_calc".to_string()],
            ]
        );
    }

    #[test]
    fn test_parallel_eligible_share_a_group() {
        let configs = vec![
            stage("scrape"),
            stage("liens").with_dependency("scrape").parallel(),
            stage("property").with_dependency("scrape").parallel(),
        ];

        let groups = ExecutionPlanner::plan(&configs).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(
            groups[1].stages,
            vec!["liens".to_string(), "property".to_string()]
        );
    }

    #[test]
    fn test_non_eligible_stays_singleton_within_layer() {
        let configs = vec![
            stage("scrape"),
            stage("liens").with_dependency("scrape").parallel(),
            stage("property").with_dependency("scrape").parallel(),
            stage("tax_audit").with_dependency("scrape"),
        ];

        let groups = ExecutionPlanner::plan(&configs).unwrap();
        // Layer two: one parallel pair plus a singleton, pair first.
        assert_eq!(groups.len(), 3);
        assert_eq!(
            groups[1].stages,
            vec!["liens".to_string(), "property".to_string()]
        );
        assert_eq!(groups[2].stages, vec!["tax_audit".to_string()]);
    }

    #[test]
    fn test_dependencies_precede_dependents() {
        let configs = vec![
            stage("d").with_dependencies(["b", "c"]),
            stage("b").with_dependency("a").parallel(),
            stage("c").with_dependency("a").parallel(),
            stage("a"),
        ];

        let groups = ExecutionPlanner::plan(&configs).unwrap();
        for (index, group) in groups.iter().enumerate() {
            let prior: BTreeSet<&String> =
                groups[..index].iter().flat_map(|g| &g.stages).collect();
            for member in &group.stages {
                let config = configs.iter().find(|c| &c.id == member).unwrap();
                for dep in &config.depends_on {
                    assert!(prior.contains(dep), "dep '{dep}' of '{member}' not prior");
                }
            }
        }
    }

    #[test]
    fn test_plan_is_deterministic() {
        let configs = vec![
            stage("z").parallel(),
            stage("a").parallel(),
            stage("m"),
            stage("end").with_dependencies(["a", "m", "z"]),
        ];

        let first = ExecutionPlanner::plan(&configs).unwrap();
        let second = ExecutionPlanner::plan(&configs).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].stages, vec!["a".to_string(), "z".to_string()]);
    }

    #[test]
    fn test_cycle_detected() {
        let configs = vec![
            stage("a").with_dependency("c"),
            stage("b").with_dependency("a"),
            stage("c").with_dependency("b"),
        ];

        let err = ExecutionPlanner::plan(&configs).unwrap_err();
        match err {
            CaseflowError::CyclicDependency(inner) => {
                assert!(inner.cycle_path.len() >= 3);
                assert_eq!(inner.cycle_path.first(), inner.cycle_path.last());
            }
            other => panic!("expected cycle error, got {other}"),
        }
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let configs = vec![stage("a").with_dependency("ghost")];
        let err = ExecutionPlanner::plan(&configs).unwrap_err();
        assert!(matches!(err, CaseflowError::Validation(_)));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let configs = vec![stage("a"), stage("a")];
        let err = ExecutionPlanner::plan(&configs).unwrap_err();
        assert!(matches!(err, CaseflowError::Validation(_)));
    }

    #[test]
    fn test_empty_plan() {
        let groups = ExecutionPlanner::plan(&[]).unwrap();
        assert!(groups.is_empty());
    }
}
