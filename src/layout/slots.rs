use super::ordering::Placement;
use super::{FamilyGraph, PendingConnection};

/// Lanes in the same row closer than this are treated as touching.
const LANE_MARGIN: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct AssignedSlots {
    pub(super) mate_slot: usize,
    pub(super) children_slot: Option<usize>,
}

#[derive(Debug, Clone)]
pub(super) struct SlotAssignment {
    /// One entry per pending connection, same order.
    pub(super) assigned: Vec<AssignedSlots>,
    pub(super) row_slot_count: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
struct Lane {
    slot: usize,
    lo: f32,
    hi: f32,
}

struct LaneTable {
    rows: Vec<Vec<Lane>>,
    /// Slots already taken by connectors on each node.
    node_slots: Vec<Vec<usize>>,
}

impl LaneTable {
    /// Smallest slot `>= min` that is free on every node in `nodes` and does
    /// not overlap another lane of the same index in `row`.
    fn allocate(&mut self, row: usize, lo: f32, hi: f32, min: usize, nodes: &[usize]) -> usize {
        let mut slot = min.max(1);
        loop {
            let taken_by_node = nodes.iter().any(|&n| self.node_slots[n].contains(&slot));
            let overlaps = self.rows[row].iter().any(|lane| {
                lane.slot == slot && lo <= lane.hi + LANE_MARGIN && lane.lo <= hi + LANE_MARGIN
            });
            if !taken_by_node && !overlaps {
                break;
            }
            slot += 1;
        }
        self.rows[row].push(Lane { slot, lo, hi });
        self.claim(nodes, slot);
        slot
    }

    fn claim(&mut self, nodes: &[usize], slot: usize) {
        for &n in nodes {
            self.node_slots[n].push(slot);
        }
    }
}

/// Assigns mate and child-fan slots to every pending connection.
///
/// Slot 0 is the node's vertical centre and only serves a couple sitting
/// side by side when neither partner already uses it. Everything else gets
/// a lane below the row: a couple's children always use a higher slot than
/// the couple itself, and no node sees the same slot twice.
pub(super) fn assign_slots(
    graph: &FamilyGraph,
    rows: &[usize],
    placement: &Placement,
    pending: &[PendingConnection],
) -> SlotAssignment {
    let row_count = placement.rows.len();
    let mut column = vec![0usize; graph.len()];
    for row in &placement.rows {
        for (idx, &node) in row.iter().enumerate() {
            column[node] = idx;
        }
    }
    let x = &placement.x;
    let mut table = LaneTable {
        rows: vec![Vec::new(); row_count],
        node_slots: vec![Vec::new(); graph.len()],
    };
    let mut centre_taken = vec![false; graph.len()];

    let mut assigned = Vec::with_capacity(pending.len());
    for conn in pending {
        let a = conn.parent1;
        let (mate_slot, source_row, source_x, parents) = match conn.parent2 {
            Some(b) => {
                let same_row = rows[a] == rows[b];
                let mate_slot = if same_row
                    && column[a].abs_diff(column[b]) == 1
                    && !centre_taken[a]
                    && !centre_taken[b]
                {
                    centre_taken[a] = true;
                    centre_taken[b] = true;
                    table.claim(&[a, b], 0);
                    0
                } else {
                    let upper = if rows[a] <= rows[b] { a } else { b };
                    table.allocate(rows[upper], x[a].min(x[b]), x[a].max(x[b]), 1, &[a, b])
                };
                let (source_row, source_x) = if same_row {
                    (rows[a], (x[a] + x[b]) / 2.0)
                } else {
                    let lower = if rows[a] > rows[b] { a } else { b };
                    (rows[lower], x[lower])
                };
                (mate_slot, source_row, source_x, vec![a, b])
            }
            None => (0, rows[a], x[a], vec![a]),
        };

        let children_slot = if conn.children.is_empty() {
            None
        } else {
            let lo = conn
                .children
                .iter()
                .map(|&c| x[c])
                .fold(source_x, f32::min);
            let hi = conn
                .children
                .iter()
                .map(|&c| x[c])
                .fold(source_x, f32::max);
            Some(table.allocate(source_row, lo, hi, mate_slot + 1, &parents))
        };
        assigned.push(AssignedSlots {
            mate_slot,
            children_slot,
        });
    }

    let row_slot_count = table
        .rows
        .iter()
        .map(|lanes| lanes.iter().map(|lane| lane.slot).max().unwrap_or(0))
        .collect();
    SlotAssignment {
        assigned,
        row_slot_count,
    }
}
