//! Deterministic install ordering over the lockfile graph.
//!
//! A post-order depth-first walk: a package is emitted only after every
//! package it depends on has been emitted, so iterating the result installs
//! dependencies before their dependents. Roots and dependency edges are
//! sorted before descent, making the order reproducible across runs.

use std::collections::HashSet;

use carton_core::error::CartonError;
use tracing::debug;

use crate::model::Lockfile;
use crate::LockResult;

/// Walk the graph from the given roots and return the install order.
///
/// The visited set is shared across all roots, so a package reachable from
/// several roots appears exactly once. Marking a package visited *before*
/// descending into its dependencies is what makes cyclic graphs terminate:
/// if `a` and `b` depend on each other, visiting `a` marks it, descends to
/// `b`, and `b`'s edge back to `a` returns immediately.
pub fn walk_all(lockfile: &Lockfile, root_ids: &[String]) -> LockResult<Vec<String>> {
    let mut roots = root_ids.to_vec();
    roots.sort();

    let mut visited = HashSet::new();
    let mut order = Vec::new();
    for id in &roots {
        walk(id, lockfile, &mut visited, &mut order)?;
    }
    debug!(packages = order.len(), "install order computed");
    Ok(order)
}

fn walk(
    pkg_id: &str,
    lockfile: &Lockfile,
    visited: &mut HashSet<String>,
    order: &mut Vec<String>,
) -> LockResult<()> {
    if visited.contains(pkg_id) {
        return Ok(());
    }
    visited.insert(pkg_id.to_string());

    // Re-check the edge target even though the validator also does: the
    // walker may run against an in-memory lockfile mutated since its last
    // validation.
    let dep_ids = lockfile
        .dep_ids(pkg_id)
        .ok_or_else(|| CartonError::PackageDataMissing {
            id: pkg_id.to_string(),
        })?;

    for dep_id in &dep_ids {
        walk(dep_id, lockfile, visited, order)?;
    }
    order.push(pkg_id.to_string());
    Ok(())
}
