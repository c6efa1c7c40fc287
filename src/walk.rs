//! Bounded breadth-first traversal over genealogical relations.
//!
//! The knowledge-graph backend is abstracted behind [`RelationSource`]; the
//! bundled [`RelationStore`] reads the relations from a JSON document.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FamilyTreeError, Result};
use crate::ir::FamilyTreeData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Parent,
    Child,
    Mate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub relation: RelationKind,
    pub target: String,
}

/// Anything that can answer "which relations does this entity have".
pub trait RelationSource {
    /// `None` when the entity is unknown to the backend.
    fn relations_for(&self, id: &str) -> Option<&[Relation]>;

    fn label_for(&self, id: &str) -> Option<&str>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityRecord {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

/// In-memory relation store, typically loaded from a JSON export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationStore {
    #[serde(default)]
    pub entities: BTreeMap<String, EntityRecord>,
}

impl RelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input)
            .or_else(|_| json5::from_str(input))
            .map_err(|err: json5::Error| FamilyTreeError::Parse {
                what: "relation store",
                message: err.to_string(),
            })
    }

    pub fn set_label(&mut self, id: &str, label: &str) {
        self.entities.entry(id.to_string()).or_default().label = Some(label.to_string());
    }

    /// Records `child` under `parent` on both sides.
    pub fn add_parent(&mut self, child: &str, parent: &str) {
        self.push(child, RelationKind::Parent, parent);
        self.push(parent, RelationKind::Child, child);
    }

    pub fn add_mates(&mut self, a: &str, b: &str) {
        self.push(a, RelationKind::Mate, b);
        self.push(b, RelationKind::Mate, a);
    }

    fn push(&mut self, id: &str, relation: RelationKind, target: &str) {
        self.entities
            .entry(id.to_string())
            .or_default()
            .relations
            .push(Relation {
                relation,
                target: target.to_string(),
            });
    }
}

impl RelationSource for RelationStore {
    fn relations_for(&self, id: &str) -> Option<&[Relation]> {
        self.entities.get(id).map(|record| record.relations.as_slice())
    }

    fn label_for(&self, id: &str) -> Option<&str> {
        self.entities.get(id).and_then(|record| record.label.as_deref())
    }
}

/// Walks parent, child and mate relations outward from `start`.
///
/// Entities at `max_distance` are recorded but their relations are not
/// followed, so they show up as roots. `None` walks the whole component.
pub fn walk<S: RelationSource + ?Sized>(
    source: &S,
    start: &str,
    max_distance: Option<i64>,
) -> Result<FamilyTreeData> {
    if let Some(distance) = max_distance
        && distance < 0
    {
        return Err(FamilyTreeError::NegativeDistance(distance));
    }
    if source.relations_for(start).is_none() {
        return Err(FamilyTreeError::UnknownEntity(start.to_string()));
    }

    let mut graph = FamilyTreeData::new();
    let mut queue: VecDeque<(i64, String)> = VecDeque::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut mate_keys: HashSet<(String, String)> = HashSet::new();
    queue.push_back((0, start.to_string()));

    while let Some((distance, id)) = queue.pop_front() {
        if !visited.insert(id.clone()) {
            continue;
        }
        let Some(relations) = source.relations_for(&id) else {
            continue;
        };
        if let Some(label) = source.label_for(&id) {
            graph.labels.insert(id.clone(), label.to_string());
        }
        let mut parent1: Option<&str> = None;
        let mut parent2: Option<&str> = None;
        for relation in relations {
            if max_distance.is_some_and(|max| distance + 1 > max) {
                continue;
            }
            match relation.relation {
                RelationKind::Parent => {
                    if parent1.is_none() {
                        parent1 = Some(relation.target.as_str());
                    } else if parent2.is_none() && parent1 != Some(relation.target.as_str()) {
                        parent2 = Some(relation.target.as_str());
                    } else if parent1 != Some(relation.target.as_str())
                        && parent2 != Some(relation.target.as_str())
                    {
                        warn!(entity = %id, extra = %relation.target, "entity has more than 2 parents");
                    }
                }
                RelationKind::Mate => {
                    let key = unordered_pair(&id, &relation.target);
                    if mate_keys.insert(key.clone()) {
                        graph.mates.push(key);
                    }
                }
                RelationKind::Child => {}
            }
            if !visited.contains(&relation.target) {
                queue.push_back((distance + 1, relation.target.clone()));
            }
        }
        match parent1 {
            None => graph.roots.push(id),
            Some(p1) => graph
                .children
                .push((p1.to_string(), parent2.map(str::to_string), id)),
        }
    }

    debug!(
        roots = graph.roots.len(),
        mates = graph.mates.len(),
        children = graph.children.len(),
        "family tree walk finished"
    );
    Ok(graph)
}

fn unordered_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}
