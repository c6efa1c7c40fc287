use std::collections::HashMap;

use serde::Serialize;

/// Placement of one entity. Offsets are in abstract units, not pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutNode {
    pub id: String,
    pub row: usize,
    pub column: usize,
    pub offset_x: f32,
}

/// Children routed through one lane below their parent(s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildFan {
    pub ids: Vec<String>,
    pub slot: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Connection {
    /// Partnership between `id1` and `id2`, optionally with shared children.
    Couple {
        id1: String,
        id2: String,
        slot1: usize,
        children: Option<ChildFan>,
    },
    /// Children attached below a single parent.
    SingleParent {
        id1: String,
        children: Option<ChildFan>,
    },
}

impl Connection {
    pub fn children(&self) -> Option<&ChildFan> {
        match self {
            Connection::Couple { children, .. } | Connection::SingleParent { children, .. } => {
                children.as_ref()
            }
        }
    }

    /// True if `id` is one of the parents on this connection.
    pub fn touches(&self, id: &str) -> bool {
        match self {
            Connection::Couple { id1, id2, .. } => id1 == id || id2 == id,
            Connection::SingleParent { id1, .. } => id1 == id,
        }
    }

    /// Slot numbers this connection occupies on its parent node(s).
    pub fn slots(&self) -> Vec<usize> {
        let mut slots = Vec::with_capacity(2);
        if let Connection::Couple { slot1, .. } = self {
            slots.push(*slot1);
        }
        if let Some(fan) = self.children() {
            slots.push(fan.slot);
        }
        slots
    }

    /// One-line description used by the debug overlay.
    pub fn describe(&self) -> String {
        let fan = self
            .children()
            .map(|fan| format!(" | CS{}", fan.slot))
            .unwrap_or_default();
        match self {
            Connection::Couple { id1, id2, slot1, .. } => format!("{id1} -- {id2} | S{slot1}{fan}"),
            Connection::SingleParent { id1, .. } => format!("{id1}{fan}"),
        }
    }
}

/// Geometry-independent output of the layout engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutPlan {
    pub rows: Vec<Vec<LayoutNode>>,
    pub connections: Vec<Connection>,
    pub raw_width: f32,
    pub min_node_spacing_x: f32,
    pub row_slot_count: Vec<usize>,
    #[serde(skip)]
    index: HashMap<String, (usize, usize)>,
}

impl LayoutPlan {
    pub fn new(
        rows: Vec<Vec<LayoutNode>>,
        connections: Vec<Connection>,
        raw_width: f32,
        min_node_spacing_x: f32,
        row_slot_count: Vec<usize>,
    ) -> Self {
        let mut index = HashMap::new();
        for (row_idx, row) in rows.iter().enumerate() {
            for (col_idx, node) in row.iter().enumerate() {
                index.insert(node.id.clone(), (row_idx, col_idx));
            }
        }
        Self {
            rows,
            connections,
            raw_width,
            min_node_spacing_x,
            row_slot_count,
            index,
        }
    }

    pub fn node_from_id(&self, id: &str) -> Option<&LayoutNode> {
        let (row, col) = *self.index.get(id)?;
        self.rows.get(row)?.get(col)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &LayoutNode> {
        self.rows.iter().flatten()
    }

    pub fn node_count(&self) -> usize {
        self.index.len()
    }
}
