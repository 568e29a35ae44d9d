//! Organization hierarchy builder
//!
//! Turns the flat list of positions (each pointing at an optional parent) into
//! a forest. Siblings are ordered by `order`, ties keep input order.
//!
//! Entries whose parent does not exist are never reached from a root and are
//! left out of the forest. The same holds for entries on a parent cycle, since
//! with a single parent per entry such a loop has no path back to a root.
//! The walk keeps a visited set so a repeated id (the only way to re-enter an
//! already placed subtree) fails with [`HierarchyError::Cycle`] instead of
//! descending forever.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Occupant details shown on a chart card
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemberSummary {
    pub name: String,
    pub department: Option<String>,
    /// Job title inside the company (not the club position)
    pub title: Option<String>,
}

/// One position in the club's reporting hierarchy
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrganizationEntry {
    pub id: i64,
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "parentId")]
    pub parent_id: Option<i64>,
    pub position: String,
    pub order: i32,
    pub member: MemberSummary,
}

/// An entry together with its ordered children
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ForestNode {
    #[serde(flatten)]
    pub entry: OrganizationEntry,
    pub children: Vec<ForestNode>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("cycle detected in organization hierarchy at entry {id}")]
    Cycle { id: i64 },
}

/// Why an entry does not show up in the forest
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DetachReason {
    /// The declared parent id does not exist
    MissingParent,
    /// Some ancestor has a missing parent
    OrphanedAncestor,
    /// The parent chain loops back on itself
    ParentCycle,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DetachedEntry {
    #[serde(flatten)]
    pub entry: OrganizationEntry,
    pub reason: DetachReason,
}

/// Group entry indices by parent id, each group stably sorted by `order`.
fn children_index(entries: &[OrganizationEntry]) -> HashMap<Option<i64>, Vec<usize>> {
    let mut by_parent: HashMap<Option<i64>, Vec<usize>> = HashMap::new();
    for (idx, entry) in entries.iter().enumerate() {
        by_parent.entry(entry.parent_id).or_default().push(idx);
    }
    for siblings in by_parent.values_mut() {
        // sort_by_key is stable
        siblings.sort_by_key(|&idx| entries[idx].order);
    }
    by_parent
}

/// Build the forest of positions rooted at entries without a parent.
pub fn build_forest(entries: &[OrganizationEntry]) -> Result<Vec<ForestNode>, HierarchyError> {
    let by_parent = children_index(entries);
    let roots = by_parent.get(&None).cloned().unwrap_or_default();

    // Pre-order walk with an explicit stack
    let mut visited: HashSet<i64> = HashSet::with_capacity(entries.len());
    let mut preorder: Vec<usize> = Vec::with_capacity(entries.len());
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();

    while let Some(idx) = stack.pop() {
        let id = entries[idx].id;
        if !visited.insert(id) {
            return Err(HierarchyError::Cycle { id });
        }
        preorder.push(idx);
        if let Some(children) = by_parent.get(&Some(id)) {
            stack.extend(children.iter().rev().copied());
        }
    }

    // Children always follow their parent in pre-order, so assembling in
    // reverse finishes every subtree before its parent needs it.
    let mut built: HashMap<usize, ForestNode> = HashMap::with_capacity(preorder.len());
    for &idx in preorder.iter().rev() {
        let entry = &entries[idx];
        let children = by_parent
            .get(&Some(entry.id))
            .map(|ids| ids.iter().filter_map(|child| built.remove(child)).collect())
            .unwrap_or_default();
        built.insert(
            idx,
            ForestNode {
                entry: entry.clone(),
                children,
            },
        );
    }

    Ok(roots.iter().filter_map(|idx| built.remove(idx)).collect())
}

/// List the entries that [`build_forest`] leaves out, with the reason.
///
/// Output keeps input order.
pub fn diagnose(entries: &[OrganizationEntry]) -> Vec<DetachedEntry> {
    let by_id: HashMap<i64, &OrganizationEntry> = entries
        .iter()
        .rev()
        .map(|entry| (entry.id, entry))
        .collect();
    let by_parent = children_index(entries);

    let mut reachable: HashSet<i64> = HashSet::new();
    let mut stack: Vec<i64> = by_parent
        .get(&None)
        .map(|roots| roots.iter().map(|&idx| entries[idx].id).collect())
        .unwrap_or_default();
    while let Some(id) = stack.pop() {
        if !reachable.insert(id) {
            continue;
        }
        if let Some(children) = by_parent.get(&Some(id)) {
            stack.extend(children.iter().map(|&idx| entries[idx].id));
        }
    }

    entries
        .iter()
        .filter(|entry| !reachable.contains(&entry.id))
        .map(|entry| DetachedEntry {
            entry: entry.clone(),
            reason: detach_reason(entry, &by_id),
        })
        .collect()
}

fn detach_reason(entry: &OrganizationEntry, by_id: &HashMap<i64, &OrganizationEntry>) -> DetachReason {
    let Some(parent_id) = entry.parent_id else {
        // A root is always reachable unless its id is shadowed by a duplicate
        return DetachReason::ParentCycle;
    };
    let Some(mut current) = by_id.get(&parent_id).copied() else {
        return DetachReason::MissingParent;
    };

    let mut seen: HashSet<i64> = HashSet::from([entry.id]);
    loop {
        if !seen.insert(current.id) {
            return DetachReason::ParentCycle;
        }
        match current.parent_id {
            None => return DetachReason::ParentCycle,
            Some(next) => match by_id.get(&next) {
                Some(parent) => current = parent,
                None => return DetachReason::OrphanedAncestor,
            },
        }
    }
}

#[cfg(test)]
pub(crate) fn entry(id: i64, parent_id: Option<i64>, order: i32) -> OrganizationEntry {
    OrganizationEntry {
        id,
        user_id: id * 10,
        parent_id,
        position: format!("position-{}", id),
        order,
        member: MemberSummary {
            name: format!("member-{}", id),
            department: Some("전력관리처".to_string()),
            title: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(nodes: &[ForestNode]) -> Vec<i64> {
        nodes.iter().map(|n| n.entry.id).collect()
    }

    fn count_nodes(nodes: &[ForestNode]) -> usize {
        nodes.iter().map(|n| 1 + count_nodes(&n.children)).sum()
    }

    #[test]
    fn children_are_ordered_by_sort_key() {
        let entries = vec![entry(1, None, 0), entry(2, Some(1), 1), entry(3, Some(1), 0)];
        let forest = build_forest(&entries).unwrap();

        assert_eq!(ids(&forest), vec![1]);
        assert_eq!(ids(&forest[0].children), vec![3, 2]);
        assert!(forest[0].children.iter().all(|c| c.children.is_empty()));
    }

    #[test]
    fn entry_with_missing_parent_is_excluded() {
        let entries = vec![entry(1, Some(99), 0)];
        assert!(build_forest(&entries).unwrap().is_empty());
    }

    #[test]
    fn empty_input_builds_empty_forest() {
        assert!(build_forest(&[]).unwrap().is_empty());
    }

    #[test]
    fn equal_order_siblings_keep_input_order() {
        let entries = vec![
            entry(10, None, 0),
            entry(4, Some(10), 5),
            entry(2, Some(10), 5),
            entry(7, Some(10), 1),
            entry(3, Some(10), 5),
        ];
        let forest = build_forest(&entries).unwrap();
        assert_eq!(ids(&forest[0].children), vec![7, 4, 2, 3]);
    }

    #[test]
    fn multiple_roots_are_sorted_too() {
        let entries = vec![entry(1, None, 3), entry(2, None, 1), entry(3, None, 2)];
        let forest = build_forest(&entries).unwrap();
        assert_eq!(ids(&forest), vec![2, 3, 1]);
    }

    #[test]
    fn every_reachable_entry_appears_exactly_once() {
        let entries = vec![
            entry(1, None, 0),
            entry(2, Some(1), 0),
            entry(3, Some(2), 0),
            entry(4, Some(2), 1),
            entry(5, Some(1), 1),
            entry(6, None, 1),
            entry(7, Some(6), 0),
            entry(8, Some(42), 0),
        ];
        let forest = build_forest(&entries).unwrap();

        assert_eq!(count_nodes(&forest), 7);
        assert_eq!(ids(&forest), vec![1, 6]);
        assert_eq!(ids(&forest[0].children), vec![2, 5]);
        assert_eq!(ids(&forest[0].children[0].children), vec![3, 4]);
        assert_eq!(ids(&forest[1].children), vec![7]);
    }

    #[test]
    fn deep_chain_does_not_overflow() {
        let mut entries = vec![entry(0, None, 0)];
        for id in 1..5_000 {
            entries.push(entry(id, Some(id - 1), 0));
        }
        let forest = build_forest(&entries).unwrap();
        assert_eq!(ids(&forest), vec![0]);

        // Drop iteratively so the test itself stays off the deep recursion path
        let mut node = forest.into_iter().next();
        let mut depth = 0;
        while let Some(mut current) = node {
            depth += 1;
            node = current.children.pop();
        }
        assert_eq!(depth, 5_000);
    }

    #[test]
    fn parent_cycle_is_unreachable_and_terminates() {
        let entries = vec![
            entry(1, None, 0),
            entry(2, Some(3), 0),
            entry(3, Some(2), 0),
            entry(4, Some(4), 0),
        ];
        let forest = build_forest(&entries).unwrap();
        assert_eq!(ids(&forest), vec![1]);
        assert!(forest[0].children.is_empty());
    }

    #[test]
    fn duplicate_id_reports_cycle() {
        let entries = vec![entry(1, None, 0), entry(1, Some(1), 1)];
        assert_eq!(build_forest(&entries), Err(HierarchyError::Cycle { id: 1 }));
    }

    #[test]
    fn diagnose_classifies_detached_entries() {
        let entries = vec![
            entry(1, None, 0),
            entry(2, Some(1), 0),
            entry(3, Some(99), 0),
            entry(4, Some(3), 0),
            entry(5, Some(6), 0),
            entry(6, Some(5), 0),
        ];
        let detached = diagnose(&entries);
        let summary: Vec<(i64, DetachReason)> = detached
            .iter()
            .map(|d| (d.entry.id, d.reason))
            .collect();

        assert_eq!(
            summary,
            vec![
                (3, DetachReason::MissingParent),
                (4, DetachReason::OrphanedAncestor),
                (5, DetachReason::ParentCycle),
                (6, DetachReason::ParentCycle),
            ]
        );
    }

    #[test]
    fn diagnose_is_empty_for_healthy_tree() {
        let entries = vec![entry(1, None, 0), entry(2, Some(1), 0)];
        assert!(diagnose(&entries).is_empty());
    }

    #[test]
    fn deleting_parent_detaches_children() {
        let mut entries = vec![entry(1, None, 0), entry(2, Some(1), 0), entry(3, None, 1)];
        entries.retain(|e| e.id != 1);

        let forest = build_forest(&entries).unwrap();
        assert_eq!(ids(&forest), vec![3]);
        assert_eq!(diagnose(&entries)[0].reason, DetachReason::MissingParent);
    }
}
