use tracing::warn;

use super::FamilyGraph;

/// Generational row for every node.
///
/// Longest-path layering: a child sits at least one row below each parent and
/// mates share a row. Parentless mate clusters are then pulled down to sit
/// directly above their highest child, and rows are shifted so the top row
/// is 0.
pub(super) fn assign_rows(graph: &FamilyGraph) -> Vec<usize> {
    let n = graph.len();
    let mut rows = vec![0usize; n];

    let mut converged = false;
    for _ in 0..=n {
        let mut changed = false;
        for child in 0..n {
            for &parent in &graph.parents[child] {
                if rows[child] < rows[parent] + 1 {
                    rows[child] = rows[parent] + 1;
                    changed = true;
                }
            }
        }
        for &(a, b) in &graph.mates {
            let row = rows[a].max(rows[b]);
            if rows[a] != row || rows[b] != row {
                rows[a] = row;
                rows[b] = row;
                changed = true;
            }
        }
        if !changed {
            converged = true;
            break;
        }
    }
    if !converged {
        warn!("partnerships contradict parent/child generations; rows are approximate");
    }

    for cluster in mate_clusters(graph) {
        if cluster.iter().any(|&node| !graph.parents[node].is_empty()) {
            continue;
        }
        let highest_child = cluster
            .iter()
            .flat_map(|&node| graph.kids[node].iter())
            .map(|&kid| rows[kid])
            .min();
        let Some(highest_child) = highest_child else {
            continue;
        };
        let current = cluster.iter().map(|&node| rows[node]).max().unwrap_or(0);
        if highest_child > current + 1 {
            for &node in &cluster {
                rows[node] = highest_child - 1;
            }
        }
    }

    if let Some(top) = rows.iter().copied().min() {
        for row in &mut rows {
            *row -= top;
        }
    }
    rows
}

/// Connected components over recorded mates, each in node order, ordered by
/// their first node.
pub(super) fn mate_clusters(graph: &FamilyGraph) -> Vec<Vec<usize>> {
    let n = graph.len();
    let mut parent: Vec<usize> = (0..n).collect();
    fn find(parent: &mut [usize], mut node: usize) -> usize {
        while parent[node] != node {
            parent[node] = parent[parent[node]];
            node = parent[node];
        }
        node
    }
    for &(a, b) in &graph.mates {
        let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
        if ra != rb {
            parent[ra.max(rb)] = ra.min(rb);
        }
    }
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    let mut slot_of_root: Vec<Option<usize>> = vec![None; n];
    for node in 0..n {
        let root = find(&mut parent, node);
        match slot_of_root[root] {
            Some(idx) => clusters[idx].push(node),
            None => {
                slot_of_root[root] = Some(clusters.len());
                clusters.push(vec![node]);
            }
        }
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FamilyTreeData;

    fn rows_of(data: &FamilyTreeData) -> (FamilyGraph, Vec<usize>) {
        let graph = FamilyGraph::from_data(data);
        let rows = assign_rows(&graph);
        (graph, rows)
    }

    fn row(graph: &FamilyGraph, rows: &[usize], id: &str) -> usize {
        rows[graph.ids.iter().position(|x| x == id).unwrap()]
    }

    #[test]
    fn children_sit_below_every_parent() {
        let mut data = FamilyTreeData::new();
        data.add_root("GP")
            .add_child("GP", None, "P")
            .add_root("Q")
            .add_child("P", Some("Q"), "C");
        let (graph, rows) = rows_of(&data);
        assert_eq!(row(&graph, &rows, "GP"), 0);
        assert_eq!(row(&graph, &rows, "P"), 1);
        assert_eq!(row(&graph, &rows, "C"), 2);
        // Q has no parents and is pulled down next to its child's other parent.
        assert_eq!(row(&graph, &rows, "Q"), 1);
    }

    #[test]
    fn spouse_follows_partner_generation() {
        let mut data = FamilyTreeData::new();
        data.add_root("GP")
            .add_child("GP", None, "P")
            .add_root("S")
            .add_mates("P", "S");
        let (graph, rows) = rows_of(&data);
        assert_eq!(row(&graph, &rows, "S"), row(&graph, &rows, "P"));
        assert_eq!(row(&graph, &rows, "GP"), 0);
    }

    #[test]
    fn mate_cycles_share_a_row() {
        let mut data = FamilyTreeData::new();
        data.add_root("A")
            .add_mates("A", "B")
            .add_mates("B", "C")
            .add_mates("C", "A")
            .add_child("A", None, "K");
        let (graph, rows) = rows_of(&data);
        let a = row(&graph, &rows, "A");
        assert_eq!(row(&graph, &rows, "B"), a);
        assert_eq!(row(&graph, &rows, "C"), a);
        assert_eq!(row(&graph, &rows, "K"), a + 1);
    }

    #[test]
    fn contradictory_input_terminates() {
        let mut data = FamilyTreeData::new();
        data.add_root("A").add_child("A", None, "B").add_mates("A", "B");
        let (graph, rows) = rows_of(&data);
        assert_eq!(rows.len(), graph.len());
        assert_eq!(rows.iter().copied().min(), Some(0));
    }

    #[test]
    fn clusters_group_by_mates() {
        let mut data = FamilyTreeData::new();
        data.add_root("A")
            .add_root("B")
            .add_root("C")
            .add_mates("C", "A");
        let graph = FamilyGraph::from_data(&data);
        assert_eq!(mate_clusters(&graph), vec![vec![0, 2], vec![1]]);
    }
}
