use crate::ir::FamilyTreeData;
use crate::layout::{Connection, LayoutPlan};
use crate::routing::Scene;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Diagnostic dump of one render cycle: the labelled input, the abstract
/// plan and the pixel geometry derived from it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDump {
    pub graph: FamilyTreeData,
    pub raw_width: f32,
    pub min_node_spacing_x: f32,
    pub row_slot_count: Vec<usize>,
    pub width: f32,
    pub height: f32,
    pub scale_x: f32,
    pub nodes: Vec<NodeDump>,
    pub connections: Vec<Connection>,
    pub connectors: Vec<ConnectorDump>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDump {
    pub id: String,
    pub label: String,
    pub row: usize,
    pub column: usize,
    pub offset_x: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Serialize)]
pub struct ConnectorDump {
    pub kind: String,
    pub points: Vec<[f32; 2]>,
}

impl LayoutDump {
    pub fn from_plan(plan: &LayoutPlan, scene: &Scene, graph: &FamilyTreeData) -> Self {
        let nodes = plan
            .nodes()
            .zip(scene.nodes.iter())
            .map(|(node, placed)| NodeDump {
                id: node.id.clone(),
                label: graph.label_for(&node.id).to_string(),
                row: node.row,
                column: node.column,
                offset_x: node.offset_x,
                x: placed.rect.left,
                y: placed.rect.top,
                width: placed.rect.width,
                height: placed.rect.height,
            })
            .collect();

        let connectors = scene
            .connectors
            .iter()
            .map(|connector| ConnectorDump {
                kind: format!("{:?}", connector.kind).to_lowercase(),
                points: connector.points.iter().map(|(x, y)| [*x, *y]).collect(),
            })
            .collect();

        LayoutDump {
            graph: graph.to_labelled(),
            raw_width: plan.raw_width,
            min_node_spacing_x: plan.min_node_spacing_x,
            row_slot_count: plan.row_slot_count.clone(),
            width: scene.width,
            height: scene.height,
            scale_x: scene.scale_x,
            nodes,
            connections: plan.connections.clone(),
            connectors,
        }
    }
}

pub fn write_layout_dump(
    path: &Path,
    plan: &LayoutPlan,
    scene: &Scene,
    graph: &FamilyTreeData,
) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_plan(plan, scene, graph);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SizingConfig;
    use crate::layout::layout_family_tree;
    use crate::routing::route;

    #[test]
    fn dump_lists_nodes_with_labels_and_pixels() {
        let mut graph = FamilyTreeData::new();
        graph.add_root("A").add_child("A", None, "B");
        graph.labels.insert("A".into(), "Ada".into());
        let plan = layout_family_tree(&graph).unwrap().unwrap();
        let scene = route(&plan, &SizingConfig::default(), false);
        let dump = LayoutDump::from_plan(&plan, &scene, &graph);

        let value = serde_json::to_value(&dump).unwrap();
        assert_eq!(value["nodes"][0]["label"], "Ada");
        assert_eq!(value["nodes"][1]["label"], "B");
        assert_eq!(value["connections"][0]["kind"], "singleParent");
        assert_eq!(value["connectors"][0]["kind"], "child");
        assert_eq!(value["rowSlotCount"][0], 1);
    }
}
