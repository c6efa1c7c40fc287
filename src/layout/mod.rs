//! Family tree layout engine.
//!
//! Turns a [`FamilyTreeData`] into a [`LayoutPlan`]: generational rows,
//! ordered columns, continuous offsets in abstract units and routing slots
//! for mate and child connectors. The pipeline is
//!
//! 1. [`ranking`]: longest-path row assignment, mates share a row;
//! 2. [`ordering`]: couples grouped into units, units ordered by the
//!    barycenter of their parents and placed with a two-sided greedy sweep;
//! 3. [`slots`]: lane allocation for connectors that cannot use slot 0.
//!
//! Everything is deterministic: ties break on input order.

mod ordering;
mod ranking;
mod slots;
mod types;

pub use types::*;

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::Result;
use crate::ir::FamilyTreeData;

/// Index-based view of the relationship graph used by every stage.
#[derive(Debug, Clone)]
pub(crate) struct FamilyGraph {
    pub(crate) ids: Vec<String>,
    /// Up to two parents per node, in record order.
    pub(crate) parents: Vec<Vec<usize>>,
    pub(crate) kids: Vec<Vec<usize>>,
    /// Recorded partnerships, deduplicated, in input order.
    pub(crate) mates: Vec<(usize, usize)>,
    /// Position of the node's first record in the children list.
    pub(crate) sibling_rank: Vec<usize>,
    pub(crate) families: Vec<Family>,
}

/// A parent set and the children recorded under it.
#[derive(Debug, Clone)]
pub(crate) struct Family {
    pub(crate) parent1: usize,
    pub(crate) parent2: Option<usize>,
    pub(crate) children: Vec<usize>,
}

impl FamilyGraph {
    pub(crate) fn from_data(data: &FamilyTreeData) -> Self {
        let ids: Vec<String> = data.entity_ids().into_iter().map(str::to_string).collect();
        let index: HashMap<&str, usize> = ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.as_str(), idx))
            .collect();
        let n = ids.len();
        let mut parents: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sibling_rank = vec![usize::MAX; n];

        let mut mates = Vec::new();
        for (a, b) in &data.mates {
            let (a, b) = (index[a.as_str()], index[b.as_str()]);
            if a == b {
                warn!(entity = %ids[a], "ignoring self partnership");
                continue;
            }
            let duplicate = mates
                .iter()
                .any(|&(x, y)| (x == a && y == b) || (x == b && y == a));
            if !duplicate {
                mates.push((a, b));
            }
        }

        for (record_idx, (p1, p2, child)) in data.children.iter().enumerate() {
            let c = index[child.as_str()];
            sibling_rank[c] = sibling_rank[c].min(record_idx);
            if p2.as_deref() == Some(p1.as_str()) {
                warn!(child = %child, parent = %p1, "parent recorded twice in one record");
            }
            for parent in std::iter::once(p1).chain(p2.iter()) {
                let p = index[parent.as_str()];
                if p == c {
                    warn!(entity = %child, "ignoring self parenthood");
                    continue;
                }
                if parents[c].contains(&p) {
                    continue;
                }
                if parents[c].len() >= 2 {
                    warn!(child = %child, extra = %parent, "entity has more than 2 parents, keeping the first two");
                    continue;
                }
                parents[c].push(p);
            }
        }

        let mut kids: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut by_rank: Vec<usize> = (0..n).filter(|&c| !parents[c].is_empty()).collect();
        by_rank.sort_by_key(|&c| (sibling_rank[c], c));
        let mut families: Vec<Family> = Vec::new();
        for &c in &by_rank {
            for &p in &parents[c] {
                kids[p].push(c);
            }
            let (p1, p2) = (parents[c][0], parents[c].get(1).copied());
            let existing = families.iter_mut().find(|family| {
                match (family.parent2, p2) {
                    (None, None) => family.parent1 == p1,
                    (Some(f2), Some(p2)) => {
                        (family.parent1 == p1 && f2 == p2) || (family.parent1 == p2 && f2 == p1)
                    }
                    _ => false,
                }
            });
            match existing {
                Some(family) => family.children.push(c),
                None => families.push(Family {
                    parent1: p1,
                    parent2: p2,
                    children: vec![c],
                }),
            }
        }

        Self {
            ids,
            parents,
            kids,
            mates,
            sibling_rank,
            families,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }

    /// Partner pairs: recorded mates followed by co-parents with no mate record.
    pub(crate) fn partner_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = self.mates.clone();
        for family in &self.families {
            if let Some(p2) = family.parent2 {
                let p1 = family.parent1;
                if !pairs
                    .iter()
                    .any(|&(a, b)| (a == p1 && b == p2) || (a == p2 && b == p1))
                {
                    pairs.push((p1, p2));
                }
            }
        }
        pairs
    }
}

/// A connection before slots are known: parents and the children below them.
#[derive(Debug, Clone)]
pub(crate) struct PendingConnection {
    pub(crate) parent1: usize,
    pub(crate) parent2: Option<usize>,
    pub(crate) children: Vec<usize>,
}

/// Couples first (recorded mates, in input order), then the remaining
/// families in order of their first child.
fn pending_connections(graph: &FamilyGraph) -> Vec<PendingConnection> {
    let mut used = vec![false; graph.families.len()];
    let mut out = Vec::new();
    for &(a, b) in &graph.mates {
        let family = graph.families.iter().position(|family| {
            family.parent2.is_some_and(|f2| {
                (family.parent1 == a && f2 == b) || (family.parent1 == b && f2 == a)
            })
        });
        let children = match family {
            Some(idx) => {
                used[idx] = true;
                graph.families[idx].children.clone()
            }
            None => Vec::new(),
        };
        out.push(PendingConnection {
            parent1: a,
            parent2: Some(b),
            children,
        });
    }
    for (idx, family) in graph.families.iter().enumerate() {
        if used[idx] {
            continue;
        }
        out.push(PendingConnection {
            parent1: family.parent1,
            parent2: family.parent2,
            children: family.children.clone(),
        });
    }
    out
}

/// Lays out a family tree.
///
/// Returns `Ok(None)` when the graph is empty. Fails only for invalid
/// identifiers; data-quality anomalies are logged and repaired.
pub fn layout_family_tree(data: &FamilyTreeData) -> Result<Option<LayoutPlan>> {
    data.validate()?;
    if data.is_empty() {
        return Ok(None);
    }
    let graph = FamilyGraph::from_data(data);
    if graph.len() == 0 {
        return Ok(None);
    }

    let rows = ranking::assign_rows(&graph);
    let placement = ordering::place(&graph, &rows);
    let pending = pending_connections(&graph);
    let lanes = slots::assign_slots(&graph, &rows, &placement, &pending);

    let row_count = placement.rows.len();
    let mut out_rows: Vec<Vec<LayoutNode>> = Vec::with_capacity(row_count);
    let mut min_spacing = f32::INFINITY;
    let mut max_x: f32 = 0.0;
    for (row_idx, row) in placement.rows.iter().enumerate() {
        let mut nodes = Vec::with_capacity(row.len());
        for (column, &node) in row.iter().enumerate() {
            let offset_x = placement.x[node];
            if column > 0 {
                min_spacing = min_spacing.min(offset_x - placement.x[row[column - 1]]);
            }
            max_x = max_x.max(offset_x);
            nodes.push(LayoutNode {
                id: graph.ids[node].clone(),
                row: row_idx,
                column,
                offset_x,
            });
        }
        out_rows.push(nodes);
    }
    if !min_spacing.is_finite() {
        min_spacing = ordering::COUPLE_SPACING;
    }

    let connections: Vec<Connection> = pending
        .iter()
        .zip(lanes.assigned.iter())
        .map(|(conn, assigned)| {
            let children = assigned.children_slot.map(|slot| ChildFan {
                ids: conn.children.iter().map(|&c| graph.ids[c].clone()).collect(),
                slot,
            });
            match conn.parent2 {
                Some(p2) => Connection::Couple {
                    id1: graph.ids[conn.parent1].clone(),
                    id2: graph.ids[p2].clone(),
                    slot1: assigned.mate_slot,
                    children,
                },
                None => Connection::SingleParent {
                    id1: graph.ids[conn.parent1].clone(),
                    children,
                },
            }
        })
        .collect();

    debug!(
        nodes = graph.len(),
        rows = row_count,
        connections = connections.len(),
        "family tree layout computed"
    );

    Ok(Some(LayoutPlan::new(
        out_rows,
        connections,
        max_x + 0.5,
        min_spacing,
        lanes.row_slot_count,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(graph: &FamilyTreeData) -> LayoutPlan {
        layout_family_tree(graph).unwrap().expect("non-empty layout")
    }

    #[test]
    fn empty_graph_has_no_layout() {
        assert!(layout_family_tree(&FamilyTreeData::new()).unwrap().is_none());
    }

    #[test]
    fn empty_identifier_is_invalid_input() {
        let mut graph = FamilyTreeData::new();
        graph.add_root("");
        assert!(layout_family_tree(&graph).is_err());
    }

    #[test]
    fn single_parent_child() {
        let mut graph = FamilyTreeData::new();
        graph.add_root("A").add_child("A", None, "B");
        let plan = plan(&graph);
        assert_eq!(plan.node_from_id("A").unwrap().row, 0);
        assert_eq!(plan.node_from_id("B").unwrap().row, 1);
        assert_eq!(
            plan.connections,
            vec![Connection::SingleParent {
                id1: "A".into(),
                children: Some(ChildFan {
                    ids: vec!["B".into()],
                    slot: 1,
                }),
            }]
        );
        assert_eq!(plan.row_slot_count, vec![1, 0]);
    }

    #[test]
    fn couple_with_child() {
        let mut graph = FamilyTreeData::new();
        graph
            .add_root("A")
            .add_root("C")
            .add_mates("A", "C")
            .add_child("A", Some("C"), "B");
        let plan = plan(&graph);
        assert_eq!(plan.node_from_id("A").unwrap().row, 0);
        assert_eq!(plan.node_from_id("C").unwrap().row, 0);
        assert_eq!(plan.node_from_id("B").unwrap().row, 1);
        assert_eq!(plan.connections.len(), 1);
        match &plan.connections[0] {
            Connection::Couple {
                slot1, children, ..
            } => {
                assert_eq!(*slot1, 0);
                let fan = children.as_ref().unwrap();
                assert_eq!(fan.ids, vec!["B".to_string()]);
                assert!(fan.slot >= 1);
            }
            other => panic!("unexpected connection {other:?}"),
        }
        let b = plan.node_from_id("B").unwrap().offset_x;
        let a = plan.node_from_id("A").unwrap().offset_x;
        let c = plan.node_from_id("C").unwrap().offset_x;
        assert!((b - (a + c) / 2.0).abs() < 1e-4);
    }

    #[test]
    fn siblings_keep_input_order() {
        let mut graph = FamilyTreeData::new();
        graph
            .add_root("P")
            .add_child("P", None, "Second")
            .add_child("P", None, "First");
        let plan = plan(&graph);
        let second = plan.node_from_id("Second").unwrap();
        let first = plan.node_from_id("First").unwrap();
        assert_eq!(second.row, first.row);
        assert!(second.column < first.column);
        assert!(second.offset_x < first.offset_x);
    }

    #[test]
    fn extra_parents_are_truncated() {
        let mut graph = FamilyTreeData::new();
        graph
            .add_root("A")
            .add_root("B")
            .add_root("X")
            .add_child("A", Some("B"), "C")
            .add_child("X", None, "C");
        let plan = plan(&graph);
        assert_eq!(plan.connections.len(), 1);
        assert!(plan.connections[0].touches("A"));
        assert!(plan.connections[0].touches("B"));
        // X keeps its node but has no connection.
        assert!(plan.node_from_id("X").is_some());
    }

    #[test]
    fn co_parents_without_mate_record_become_a_couple() {
        let mut graph = FamilyTreeData::new();
        graph.add_root("A").add_root("B").add_child("A", Some("B"), "C");
        let plan = plan(&graph);
        assert!(matches!(
            &plan.connections[0],
            Connection::Couple { slot1: 0, children: Some(_), .. }
        ));
        let a = plan.node_from_id("A").unwrap();
        let b = plan.node_from_id("B").unwrap();
        assert_eq!(a.column.abs_diff(b.column), 1);
    }

    #[test]
    fn layout_is_deterministic() {
        let mut graph = FamilyTreeData::new();
        graph
            .add_root("G1")
            .add_root("G2")
            .add_mates("G1", "G2")
            .add_child("G1", Some("G2"), "A")
            .add_child("G1", Some("G2"), "B")
            .add_child("A", Some("M"), "K1")
            .add_child("B", None, "K2")
            .add_mates("A", "M")
            .add_mates("A", "N");
        let first = plan(&graph);
        let second = plan(&graph);
        assert_eq!(first.rows, second.rows);
        assert_eq!(first.connections, second.connections);
        assert_eq!(first.row_slot_count, second.row_slot_count);
    }
}
