// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Configuration validation for pipeline integrity.
//!
//! A pipeline config is checked before any worker is built so that a broken
//! link or an orphaned resolver is reported up front instead of surfacing as
//! silently absorbed input at runtime.
//!
//! # Validation Pipeline
//!
//! 1. **Uniqueness**: every worker id appears once
//! 2. **References**: `downstream`, `bypass`, `branches`, `outlet` and `entry`
//!    name configured workers
//! 3. **Options**: kind-specific options only appear on the kind they belong to
//! 4. **Pairing**: every resolver waits on a fan-out of the same name
//! 5. **Cycles**: the forward graph (`downstream`, `bypass`, `branches`) is
//!    acyclic
//!
//! Cycle detection runs only when the earlier checks pass, since it needs a
//! graph whose edges all resolve.
//!
//! # Cycle Detection Algorithm
//! Uses **Depth-First Search (DFS) with recursion stack**:
//! - **Time Complexity**: O(V + E) where V = workers, E = forward links
//! - **Space Complexity**: O(V) for visited set and recursion stack
//! - **Advantage**: Provides the actual cycle path for debugging
//!
//! Links that leave the process (queued tasks, results, simple-mode outlets)
//! are not forward edges; a handler's pipeline may legitimately feed a pusher
//! that targets it again.
//!
//! # Example
//! ```rust
//! use the_relay::config::{validate_pipeline, Config};
//! use the_relay::errors::ValidationError;
//!
//! let config: Config = serde_yaml::from_str(r#"
//! workers:
//!   - id: split
//!     kind: slicer
//!     downstream: join
//!   - id: join
//!     kind: resolver
//!     name: splitter
//! "#).unwrap();
//!
//! let errors = validate_pipeline(&config).unwrap_err();
//! assert!(matches!(errors[0], ValidationError::UnpairedResolver { .. }));
//! ```

use std::collections::{HashMap, HashSet};

use crate::config::{Config, WorkerConfig, WorkerKind};
use crate::engine::QueuerMode;
use crate::errors::ValidationError;
use crate::observability::messages::validation::{
    CyclicLinkDetected, DuplicateWorkerId, UnresolvedReference, ValidationCompleted, ValidationFailed,
    ValidationStarted, WorkerRejected,
};
use crate::observability::messages::StructuredLog;

/// Validates a pipeline configuration for structural integrity.
///
/// This is the main validation entry point. All checks except cycle
/// detection accumulate, so every problem is reported in one pass.
///
/// # Returns
///
/// * `Ok(())` - Configuration is valid and ready to build
/// * `Err(Vec<ValidationError>)` - List of all validation errors found
pub fn validate_pipeline(config: &Config) -> Result<(), Vec<ValidationError>> {
    ValidationStarted {
        worker_count: config.workers.len(),
    }
    .log();

    let mut errors = Vec::new();

    for check in [
        validate_unique_worker_ids,
        validate_worker_references,
        validate_worker_options,
        validate_resolver_pairing,
    ] {
        if let Err(found) = check(config) {
            errors.extend(found);
        }
    }

    if errors.is_empty() {
        if let Err(cycle_errors) = validate_acyclic_graph(config) {
            errors.extend(cycle_errors);
        }
    }

    if errors.is_empty() {
        ValidationCompleted {
            worker_count: config.workers.len(),
        }
        .log();
        Ok(())
    } else {
        for error in &errors {
            log_error(error);
        }
        ValidationFailed {
            error_count: errors.len(),
        }
        .log();
        Err(errors)
    }
}

fn log_error(error: &ValidationError) {
    match error {
        ValidationError::CyclicLink { cycle } => CyclicLinkDetected { cycle }.log(),
        ValidationError::UnresolvedReference {
            worker_id,
            link,
            missing,
        } => UnresolvedReference {
            worker_id,
            link,
            missing,
        }
        .log(),
        ValidationError::DuplicateWorkerId { worker_id } => DuplicateWorkerId { worker_id }.log(),
        ValidationError::UnpairedResolver { worker_id, name } => WorkerRejected {
            worker_id,
            reason: &format!("no slicer, broadcaster or queuer is named '{}'", name),
        }
        .log(),
        ValidationError::InvalidOptions { worker_id, reason } => WorkerRejected { worker_id, reason }.log(),
    }
}

fn collect(errors: Vec<ValidationError>) -> Result<(), Vec<ValidationError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validates that all worker ids are unique.
///
/// Ids key the registry, so a second live worker under the same id would be
/// refused at build time anyway.
fn validate_unique_worker_ids(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut seen_ids = HashSet::new();
    let mut errors = Vec::new();

    for worker in &config.workers {
        if !seen_ids.insert(&worker.id) {
            errors.push(ValidationError::DuplicateWorkerId {
                worker_id: worker.id.clone(),
            });
        }
    }

    collect(errors)
}

/// Validates that every link names a configured worker.
fn validate_worker_references(config: &Config) -> Result<(), Vec<ValidationError>> {
    let worker_ids: HashSet<&String> = config.workers.iter().map(|w| &w.id).collect();
    let mut errors = Vec::new();

    for worker in &config.workers {
        let outlet = worker.outlet.iter().map(|t| ("outlet", t));
        for (link, target) in worker.links().chain(outlet) {
            if !worker_ids.contains(target) {
                errors.push(ValidationError::UnresolvedReference {
                    worker_id: worker.id.clone(),
                    link,
                    missing: target.clone(),
                });
            }
        }
    }

    if let Some(entry) = &config.entry {
        if !worker_ids.contains(entry) {
            errors.push(ValidationError::UnresolvedReference {
                worker_id: "<pipeline>".to_string(),
                link: "entry",
                missing: entry.clone(),
            });
        }
    }

    collect(errors)
}

fn invalid(worker: &WorkerConfig, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidOptions {
        worker_id: worker.id.clone(),
        reason: reason.into(),
    }
}

/// Validates that kind-specific options appear only on their kind.
fn validate_worker_options(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for worker in &config.workers {
        let kind = worker.kind.as_str();
        if worker.kind != WorkerKind::Broadcaster && !worker.branches.is_empty() {
            errors.push(invalid(worker, format!("branches are only valid on a broadcaster, not a {}", kind)));
        }
        if worker.kind != WorkerKind::Resolver && worker.collect {
            errors.push(invalid(worker, format!("collect is only valid on a resolver, not a {}", kind)));
        }

        match (&worker.kind, &worker.queuer) {
            (WorkerKind::Queuer, options) => {
                let options = options.clone().unwrap_or_default();
                if worker.outlet.is_some() && options.mode != QueuerMode::Simple {
                    errors.push(invalid(worker, "outlet is only valid in simple mode"));
                }
                if options.mode == QueuerMode::Handler && options.concurrency == 0 {
                    errors.push(invalid(worker, "handler concurrency must be at least 1"));
                }
                if options.high_water_mark == 0 {
                    errors.push(invalid(worker, "high_water_mark must be at least 1"));
                }
            }
            (_, Some(_)) => {
                errors.push(invalid(worker, format!("queuer options are only valid on a queuer, not a {}", kind)));
            }
            (_, None) => {
                if worker.outlet.is_some() {
                    errors.push(invalid(worker, format!("outlet is only valid on a queuer, not a {}", kind)));
                }
            }
        }
    }

    collect(errors)
}

/// Whether `worker` opens a barrier that a resolver can settle.
fn opens_barrier(worker: &WorkerConfig) -> bool {
    match worker.kind {
        WorkerKind::Slicer => true,
        WorkerKind::Broadcaster => worker.resolve,
        WorkerKind::Queuer => matches!(
            worker.queuer.as_ref().map(|q| q.mode).unwrap_or_default(),
            QueuerMode::Simple | QueuerMode::Handler
        ),
        WorkerKind::Worker | WorkerKind::Resolver => false,
    }
}

/// Validates that every resolver shares its name with a barrier-opening
/// worker. An unpaired resolver never settles anything, so every input
/// reaching it would fall through as if no fan-out had happened.
fn validate_resolver_pairing(config: &Config) -> Result<(), Vec<ValidationError>> {
    let fan_outs: HashSet<&str> = config
        .workers
        .iter()
        .filter(|w| opens_barrier(w))
        .map(|w| w.name())
        .collect();

    let errors = config
        .workers
        .iter()
        .filter(|w| w.kind == WorkerKind::Resolver && !fan_outs.contains(w.name()))
        .map(|w| ValidationError::UnpairedResolver {
            worker_id: w.id.clone(),
            name: w.name().to_string(),
        })
        .collect();

    collect(errors)
}

/// Validates that the forward graph is acyclic using DFS-based cycle
/// detection.
///
/// Uses the **"Three Colors"** approach: a node is white before it is
/// explored, gray while it is on the recursion stack and black once all its
/// successors are done. Reaching a gray node means a back edge, and the
/// path segment from that node to the current one is the cycle.
///
/// Workers are visited in configuration order so the reported cycle is
/// stable between runs.
fn validate_acyclic_graph(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut graph: HashMap<&str, Vec<&str>> = HashMap::new();
    for worker in &config.workers {
        let edges = worker.links().map(|(_, target)| target.as_str()).collect();
        graph.insert(worker.id.as_str(), edges);
    }

    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    for worker in &config.workers {
        if !visited.contains(worker.id.as_str()) {
            if let Some(cycle) = dfs_cycle_detection(&worker.id, &graph, &mut visited, &mut rec_stack, &mut path) {
                return Err(vec![ValidationError::CyclicLink { cycle }]);
            }
        }
    }

    Ok(())
}

/// Depth-first search with recursion stack and path tracking.
///
/// ## Example Execution
/// For links A → B → C → A:
/// 1. Start at A: path = [A], rec_stack = {A}
/// 2. Visit B: path = [A, B]
/// 3. Visit C: path = [A, B, C]
/// 4. A is on the stack: cycle = [A, B, C, A]
fn dfs_cycle_detection<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(neighbors) = graph.get(node) {
        for &neighbor in neighbors {
            if !visited.contains(neighbor) {
                if let Some(cycle) = dfs_cycle_detection(neighbor, graph, visited, rec_stack, path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(neighbor) {
                let cycle_start = path.iter().position(|&n| n == neighbor).unwrap_or(0);
                let mut cycle: Vec<String> = path[cycle_start..].iter().map(|n| n.to_string()).collect();
                cycle.push(neighbor.to_string());
                return Some(cycle);
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Config {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn errors_of(yaml: &str) -> Vec<ValidationError> {
        validate_pipeline(&parse(yaml)).unwrap_err()
    }

    #[test]
    fn test_valid_empty_config() {
        assert!(validate_pipeline(&parse("workers: []")).is_ok());
    }

    #[test]
    fn test_valid_fan_out_fan_in() {
        let config = parse(
            r#"
entry: fan
workers:
  - id: fan
    kind: broadcaster
    branches: [left, right]
  - id: left
    downstream: join
  - id: right
    downstream: join
  - id: join
    kind: resolver
    name: fan
"#,
        );
        assert!(validate_pipeline(&config).is_ok());
    }

    #[test]
    fn test_valid_handler_queue() {
        let config = parse(
            r#"
workers:
  - id: resize
    kind: queuer
    queuer: { mode: handler, concurrency: 2 }
    downstream: work
  - id: work
    downstream: done
  - id: done
    kind: resolver
    name: resize
"#,
        );
        assert!(validate_pipeline(&config).is_ok());
    }

    #[test]
    fn test_duplicate_worker_ids() {
        let errors = errors_of(
            r#"
workers:
  - id: a
  - id: a
"#,
        );
        assert_eq!(errors, vec![ValidationError::DuplicateWorkerId { worker_id: "a".into() }]);
    }

    #[test]
    fn test_unresolved_references_accumulate() {
        let errors = errors_of(
            r#"
entry: nowhere
workers:
  - id: a
    downstream: b
    bypass: c
"#,
        );
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::UnresolvedReference {
            worker_id: "a".into(),
            link: "bypass",
            missing: "c".into(),
        }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnresolvedReference { link: "entry", .. })));
    }

    #[test]
    fn test_options_on_wrong_kind() {
        let errors = errors_of(
            r#"
workers:
  - id: a
    branches: [b]
    collect: true
    queuer: { mode: pusher }
  - id: b
"#,
        );
        assert_eq!(errors.len(), 3);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ValidationError::InvalidOptions { worker_id, .. } if worker_id == "a")));
    }

    #[test]
    fn test_outlet_requires_simple_mode() {
        let errors = errors_of(
            r#"
workers:
  - id: q
    kind: queuer
    queuer: { mode: pusher }
    outlet: done
  - id: done
"#,
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("simple mode"));
    }

    #[test]
    fn test_zero_limits_rejected() {
        let errors = errors_of(
            r#"
workers:
  - id: q
    kind: queuer
    queuer: { mode: handler, concurrency: 0, high_water_mark: 0 }
"#,
        );
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_resolver_needs_barrier_partner() {
        let errors = errors_of(
            r#"
workers:
  - id: fan
    kind: broadcaster
    resolve: false
  - id: join
    kind: resolver
    name: fan
"#,
        );
        assert_eq!(
            errors,
            vec![ValidationError::UnpairedResolver {
                worker_id: "join".into(),
                name: "fan".into(),
            }]
        );
    }

    #[test]
    fn test_simple_cycle() {
        let errors = errors_of(
            r#"
workers:
  - id: a
    downstream: b
  - id: b
    downstream: c
  - id: c
    bypass: a
"#,
        );
        assert_eq!(
            errors,
            vec![ValidationError::CyclicLink {
                cycle: vec!["a".into(), "b".into(), "c".into(), "a".into()],
            }]
        );
    }

    #[test]
    fn test_self_loop_through_branch() {
        let errors = errors_of(
            r#"
workers:
  - id: fan
    kind: broadcaster
    branches: [fan]
"#,
        );
        assert!(matches!(&errors[0], ValidationError::CyclicLink { cycle } if cycle == &["fan", "fan"]));
    }

    #[test]
    fn test_cycle_skipped_when_references_fail() {
        let errors = errors_of(
            r#"
workers:
  - id: a
    downstream: a
  - id: b
    downstream: missing
"#,
        );
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ValidationError::UnresolvedReference { .. }));
    }

    #[test]
    fn test_converging_links_are_not_cycles() {
        let config = parse(
            r#"
workers:
  - id: a
    downstream: c
    bypass: b
  - id: b
    downstream: c
  - id: c
"#,
        );
        assert!(validate_pipeline(&config).is_ok());
    }
}
