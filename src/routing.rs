//! Connector routing: turns a [`LayoutPlan`] into pixel geometry.
//!
//! Node rectangles come from scaling the plan's abstract offsets; rows are
//! stacked with extra height for every lane a row uses. Connectors are
//! orthogonal polylines whose horizontal runs sit on the slot lanes the
//! layout engine assigned.

use serde::Serialize;
use tracing::warn;

use crate::config::SizingConfig;
use crate::layout::{ChildFan, Connection, LayoutNode, LayoutPlan};

/// Vertical distance between consecutive lanes, and the horizontal stub
/// used by connectors between partners on different rows.
pub const MATE_SLOT_OFFSET: f32 = 10.0;
/// Share of the horizontal scale taken from the most cramped row.
const CRAMPED_SCALE_WEIGHT: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.left + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.top + self.height / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorKind {
    Mate,
    Child,
}

impl ConnectorKind {
    pub fn class_name(self) -> &'static str {
        match self {
            ConnectorKind::Mate => "family-tree-connection family-tree-connection-mate",
            ConnectorKind::Child => "family-tree-connection family-tree-connection-child",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connector {
    pub kind: ConnectorKind,
    pub points: Vec<(f32, f32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeBox {
    pub id: String,
    pub rect: Rect,
    /// Diagnostic overlay lines, present only when requested.
    pub debug: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub width: f32,
    pub height: f32,
    pub view_box: (f32, f32, f32, f32),
    pub scale_x: f32,
    pub nodes: Vec<NodeBox>,
    pub connectors: Vec<Connector>,
}

struct Geometry<'a> {
    sizing: &'a SizingConfig,
    scale_x: f32,
    row_top: Vec<f32>,
}

impl Geometry<'_> {
    fn node_rect(&self, node: &LayoutNode) -> Rect {
        Rect {
            left: node.offset_x * self.scale_x - self.sizing.node_width / 2.0,
            top: self.row_top[node.row],
            width: self.sizing.node_width,
            height: self.sizing.node_height,
        }
    }

    fn slot_y(&self, rect: &Rect, slot: usize) -> f32 {
        if slot == 0 {
            return rect.center_y();
        }
        rect.bottom() + self.sizing.node_spacing_y / 2.0 + MATE_SLOT_OFFSET * slot as f32
    }
}

/// Computes the scene for `plan`.
pub fn route(plan: &LayoutPlan, sizing: &SizingConfig, debug_info: bool) -> Scene {
    let pitch = sizing.node_width + sizing.node_spacing_x;
    let min_spacing = if plan.min_node_spacing_x > 0.0 {
        plan.min_node_spacing_x
    } else {
        1.0
    };
    let scale_x =
        (pitch / min_spacing) * CRAMPED_SCALE_WEIGHT + pitch * (1.0 - CRAMPED_SCALE_WEIGHT);

    let mut row_top = vec![0.0f32];
    for row in 0..plan.rows.len() {
        let slots = plan.row_slot_count.get(row).copied().unwrap_or(0);
        let next = row_top[row]
            + slots as f32 * MATE_SLOT_OFFSET
            + sizing.node_height
            + sizing.node_spacing_y;
        row_top.push(next);
    }
    let height = row_top.last().copied().unwrap_or(0.0);
    let drawing_width = plan.raw_width * scale_x;
    let width = drawing_width + sizing.node_width;
    let geometry = Geometry {
        sizing,
        scale_x,
        row_top,
    };

    let nodes = plan
        .nodes()
        .map(|node| NodeBox {
            id: node.id.clone(),
            rect: geometry.node_rect(node),
            debug: debug_info.then(|| debug_lines(plan, node)),
        })
        .collect();

    let mut connectors = Vec::new();
    for connection in &plan.connections {
        route_connection(plan, &geometry, connection, &mut connectors);
    }

    Scene {
        width,
        height,
        view_box: (-sizing.node_width / 2.0, 0.0, width, height),
        scale_x,
        nodes,
        connectors,
    }
}

fn debug_lines(plan: &LayoutPlan, node: &LayoutNode) -> Vec<String> {
    let mut lines = vec![format!(
        "{},{} ({:.1})",
        node.row, node.column, node.offset_x
    )];
    lines.extend(
        plan.connections
            .iter()
            .filter(|conn| conn.touches(&node.id))
            .map(Connection::describe),
    );
    lines
}

fn route_connection(
    plan: &LayoutPlan,
    geometry: &Geometry<'_>,
    connection: &Connection,
    out: &mut Vec<Connector>,
) {
    match connection {
        Connection::Couple {
            id1,
            id2,
            slot1,
            children,
        } => {
            let (Some(node1), Some(node2)) = (plan.node_from_id(id1), plan.node_from_id(id2))
            else {
                warn!(%id1, %id2, "couple references a node missing from the layout");
                return;
            };
            let (node_l, node_r) = if node1.offset_x < node2.offset_x {
                (node1, node2)
            } else {
                (node2, node1)
            };
            let rect_l = geometry.node_rect(node_l);
            let rect_r = geometry.node_rect(node_r);

            if *slot1 == 0 && node_l.row == node_r.row {
                let mate_y = rect_l.center_y();
                out.push(Connector {
                    kind: ConnectorKind::Mate,
                    points: vec![(rect_l.right(), mate_y), (rect_r.left, mate_y)],
                });
                let start_x = (rect_l.right() + rect_r.left) / 2.0;
                fan_out(plan, geometry, children.as_ref(), (start_x, mate_y), &rect_l, out);
            } else if node_l.row == node_r.row {
                let slot_y = geometry.slot_y(&rect_l, *slot1);
                out.push(Connector {
                    kind: ConnectorKind::Mate,
                    points: elbow(
                        rect_l.center_x(),
                        rect_l.bottom(),
                        slot_y,
                        rect_r.center_x(),
                        rect_r.bottom(),
                    ),
                });
                let start_x = (rect_l.right() + rect_r.left) / 2.0;
                fan_out(plan, geometry, children.as_ref(), (start_x, slot_y), &rect_l, out);
            } else {
                let (upper, lower) = if node1.row < node2.row {
                    (node1, node2)
                } else {
                    (node2, node1)
                };
                let rect_u = geometry.node_rect(upper);
                let rect_d = geometry.node_rect(lower);
                let slot_y = geometry.slot_y(&rect_u, *slot1);
                let edge_xl = rect_l.right() + MATE_SLOT_OFFSET;
                let edge_xr = rect_r.left - MATE_SLOT_OFFSET;
                out.push(Connector {
                    kind: ConnectorKind::Mate,
                    points: vec![
                        (rect_l.right(), rect_l.center_y()),
                        (edge_xl, rect_l.center_y()),
                        (edge_xl, slot_y),
                        (edge_xr, slot_y),
                        (edge_xr, rect_r.center_y()),
                        (rect_r.left, rect_r.center_y()),
                    ],
                });
                let start_x = if std::ptr::eq(lower, node_l) {
                    rect_l.right() + MATE_SLOT_OFFSET / 2.0
                } else {
                    rect_r.left - MATE_SLOT_OFFSET / 2.0
                };
                fan_out(
                    plan,
                    geometry,
                    children.as_ref(),
                    (start_x, rect_d.center_y()),
                    &rect_d,
                    out,
                );
            }
        }
        Connection::SingleParent { id1, children } => {
            let Some(node) = plan.node_from_id(id1) else {
                warn!(%id1, "single parent missing from the layout");
                return;
            };
            let rect = geometry.node_rect(node);
            fan_out(
                plan,
                geometry,
                children.as_ref(),
                (rect.center_x(), rect.bottom()),
                &rect,
                out,
            );
        }
    }
}

/// One elbow per child from `start` down to the child's top edge, running
/// horizontally on the fan's lane below `lane_rect`.
fn fan_out(
    plan: &LayoutPlan,
    geometry: &Geometry<'_>,
    fan: Option<&ChildFan>,
    start: (f32, f32),
    lane_rect: &Rect,
    out: &mut Vec<Connector>,
) {
    let Some(fan) = fan else {
        return;
    };
    let lane_y = geometry.slot_y(lane_rect, fan.slot);
    for child_id in &fan.ids {
        let Some(child) = plan.node_from_id(child_id) else {
            warn!(child = %child_id, "child missing from the layout");
            continue;
        };
        let rect_c = geometry.node_rect(child);
        out.push(Connector {
            kind: ConnectorKind::Child,
            points: elbow(start.0, start.1, lane_y, rect_c.center_x(), rect_c.top),
        });
    }
}

/// `(x1, y1)` down to `y2`, across to `x3`, down to `(x3, y3)`.
pub fn elbow(x1: f32, y1: f32, y2: f32, x3: f32, y3: f32) -> Vec<(f32, f32)> {
    vec![(x1, y1), (x1, y2), (x3, y2), (x3, y3)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FamilyTreeData;
    use crate::layout::layout_family_tree;

    fn couple_plan() -> LayoutPlan {
        let mut graph = FamilyTreeData::new();
        graph
            .add_root("A")
            .add_root("C")
            .add_mates("A", "C")
            .add_child("A", Some("C"), "B");
        layout_family_tree(&graph).unwrap().unwrap()
    }

    #[test]
    fn rows_grow_with_their_lanes() {
        let plan = couple_plan();
        let sizing = SizingConfig::default();
        let scene = route(&plan, &sizing, false);
        let a = scene.nodes.iter().find(|n| n.id == "A").unwrap();
        let b = scene.nodes.iter().find(|n| n.id == "B").unwrap();
        assert_eq!(a.rect.top, 0.0);
        assert_eq!(b.rect.top, 10.0 + 50.0 + 20.0);
        assert_eq!(scene.height, b.rect.top + 50.0 + 20.0);
        assert_eq!(scene.view_box.0, -50.0);
    }

    #[test]
    fn adjacent_couple_uses_straight_line_and_elbow() {
        let plan = couple_plan();
        let scene = route(&plan, &SizingConfig::default(), false);
        let mates: Vec<&Connector> = scene
            .connectors
            .iter()
            .filter(|c| c.kind == ConnectorKind::Mate)
            .collect();
        assert_eq!(mates.len(), 1);
        assert_eq!(mates[0].points.len(), 2);
        assert_eq!(mates[0].points[0].1, mates[0].points[1].1);

        let child = scene
            .connectors
            .iter()
            .find(|c| c.kind == ConnectorKind::Child)
            .unwrap();
        assert_eq!(child.points.len(), 4);
        let b = scene.nodes.iter().find(|n| n.id == "B").unwrap();
        assert_eq!(child.points[3], (b.rect.center_x(), b.rect.top));
        // Lane 1 below row 0.
        assert_eq!(child.points[1].1, 50.0 + 10.0 + 10.0);
    }

    #[test]
    fn scale_blends_root_and_cramped_spacing() {
        let plan = couple_plan();
        let scene = route(&plan, &SizingConfig::default(), false);
        let expected = 150.0 / plan.min_node_spacing_x * 0.8 + 150.0 * 0.2;
        assert!((scene.scale_x - expected).abs() < 1e-3);
        assert!((scene.width - (plan.raw_width * expected + 100.0)).abs() < 1e-2);
    }

    #[test]
    fn debug_overlay_lists_connections() {
        let plan = couple_plan();
        let scene = route(&plan, &SizingConfig::default(), true);
        let a = scene.nodes.iter().find(|n| n.id == "A").unwrap();
        let lines = a.debug.as_ref().unwrap();
        assert!(lines[0].starts_with("0,"));
        assert!(lines.iter().any(|line| line.contains("S0") && line.contains("CS1")));
        let plain = route(&plan, &SizingConfig::default(), false);
        assert!(plain.nodes.iter().all(|n| n.debug.is_none()));
    }

    fn node(id: &str, row: usize, column: usize, offset_x: f32) -> LayoutNode {
        LayoutNode {
            id: id.into(),
            row,
            column,
            offset_x,
        }
    }

    fn fan(id: &str, slot: usize) -> Option<ChildFan> {
        Some(ChildFan {
            ids: vec![id.into()],
            slot,
        })
    }

    fn connectors_of(scene: &Scene, kind: ConnectorKind) -> Vec<&Connector> {
        scene.connectors.iter().filter(|c| c.kind == kind).collect()
    }

    #[test]
    fn same_row_lane_couple_runs_below_both_nodes() {
        let plan = LayoutPlan::new(
            vec![
                vec![node("A", 0, 0, 0.0), node("M", 0, 1, 1.0), node("B", 0, 2, 2.0)],
                vec![node("K", 1, 0, 1.0)],
            ],
            vec![Connection::Couple {
                id1: "A".into(),
                id2: "B".into(),
                slot1: 1,
                children: fan("K", 2),
            }],
            2.5,
            1.0,
            vec![2, 0],
        );
        let scene = route(&plan, &SizingConfig::default(), false);
        assert_eq!(scene.scale_x, 150.0);

        let mates = connectors_of(&scene, ConnectorKind::Mate);
        assert_eq!(mates.len(), 1);
        // Lane 1: bottom 50 + half spacing 10 + 10.
        assert_eq!(
            mates[0].points,
            vec![(0.0, 50.0), (0.0, 70.0), (300.0, 70.0), (300.0, 50.0)]
        );

        let children = connectors_of(&scene, ConnectorKind::Child);
        assert_eq!(children.len(), 1);
        // Starts between the two rects on the couple lane, runs on lane 2,
        // ends on top of K in the next row (0 + 2 lanes + 50 + 20).
        assert_eq!(
            children[0].points,
            vec![(150.0, 70.0), (150.0, 80.0), (150.0, 80.0), (150.0, 90.0)]
        );
    }

    fn cross_row_plan(upper_x: f32, lower_x: f32) -> LayoutPlan {
        LayoutPlan::new(
            vec![
                vec![node("U", 0, 0, upper_x)],
                vec![node("D", 1, 0, lower_x)],
                vec![node("K", 2, 0, lower_x)],
            ],
            vec![Connection::Couple {
                id1: "D".into(),
                id2: "U".into(),
                slot1: 1,
                children: fan("K", 1),
            }],
            2.5,
            1.0,
            vec![1, 1, 0],
        )
    }

    #[test]
    fn cross_row_couple_uses_upper_lane_and_fans_from_lower_node() {
        let scene = route(&cross_row_plan(0.0, 2.0), &SizingConfig::default(), false);
        let u = scene.nodes.iter().find(|n| n.id == "U").unwrap().rect;
        let d = scene.nodes.iter().find(|n| n.id == "D").unwrap().rect;
        assert_eq!((u.left, u.top), (-50.0, 0.0));
        assert_eq!((d.left, d.top), (250.0, 80.0));

        let mates = connectors_of(&scene, ConnectorKind::Mate);
        assert_eq!(mates.len(), 1);
        assert_eq!(
            mates[0].points,
            vec![
                (50.0, 25.0),
                (60.0, 25.0),
                (60.0, 70.0),
                (240.0, 70.0),
                (240.0, 105.0),
                (250.0, 105.0),
            ]
        );

        let children = connectors_of(&scene, ConnectorKind::Child);
        assert_eq!(children.len(), 1);
        assert_eq!(
            children[0].points,
            vec![(245.0, 105.0), (245.0, 150.0), (300.0, 150.0), (300.0, 160.0)]
        );
    }

    #[test]
    fn cross_row_couple_with_lower_node_on_the_left() {
        let scene = route(&cross_row_plan(2.0, 0.0), &SizingConfig::default(), false);
        let mates = connectors_of(&scene, ConnectorKind::Mate);
        assert_eq!(
            mates[0].points,
            vec![
                (50.0, 105.0),
                (60.0, 105.0),
                (60.0, 70.0),
                (240.0, 70.0),
                (240.0, 25.0),
                (250.0, 25.0),
            ]
        );
        let children = connectors_of(&scene, ConnectorKind::Child);
        assert_eq!(children[0].points[0], (55.0, 105.0));
        assert_eq!(children[0].points[3], (0.0, 160.0));
    }

    #[test]
    fn dangling_connections_are_skipped() {
        let plan = LayoutPlan::new(
            vec![vec![LayoutNode {
                id: "A".into(),
                row: 0,
                column: 0,
                offset_x: 0.0,
            }]],
            vec![
                Connection::Couple {
                    id1: "A".into(),
                    id2: "Ghost".into(),
                    slot1: 0,
                    children: None,
                },
                Connection::SingleParent {
                    id1: "A".into(),
                    children: Some(ChildFan {
                        ids: vec!["Ghost".into()],
                        slot: 1,
                    }),
                },
            ],
            0.5,
            1.0,
            vec![1],
        );
        let scene = route(&plan, &SizingConfig::default(), false);
        assert!(scene.connectors.is_empty());
        assert_eq!(scene.nodes.len(), 1);
    }
}
