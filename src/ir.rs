use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{FamilyTreeError, Result};

/// Prefix given to bare entity ids.
pub const DEFAULT_ENTITY_PREFIX: &str = "wd";

static QUALIFIED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?P<prefix>[A-Za-z][A-Za-z0-9_.-]*):)?(?P<local>[^\s:][^\s]*)$")
        .expect("qualified name pattern")
});

/// `(parent1, parent2, child)` as recorded by the traversal.
pub type ChildRecord = (String, Option<String>, String);

/// Relationship graph handed to the layout engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyTreeData {
    #[serde(default)]
    pub roots: Vec<String>,
    #[serde(default)]
    pub mates: Vec<(String, String)>,
    #[serde(default)]
    pub children: Vec<ChildRecord>,
    /// Display labels. Entities without one render their id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl FamilyTreeData {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when there is nothing to lay out.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty() && self.mates.is_empty() && self.children.is_empty()
    }

    pub fn add_root(&mut self, id: &str) -> &mut Self {
        self.roots.push(id.to_string());
        self
    }

    pub fn add_mates(&mut self, a: &str, b: &str) -> &mut Self {
        self.mates.push((a.to_string(), b.to_string()));
        self
    }

    pub fn add_child(&mut self, parent1: &str, parent2: Option<&str>, child: &str) -> &mut Self {
        self.children.push((
            parent1.to_string(),
            parent2.map(str::to_string),
            child.to_string(),
        ));
        self
    }

    /// Every referenced identifier in first-appearance order: roots, then
    /// children triples, then mates.
    pub fn entity_ids(&self) -> Vec<&str> {
        let candidates = self
            .roots
            .iter()
            .map(String::as_str)
            .chain(
                self.children
                    .iter()
                    .flat_map(|(p1, p2, c)| [Some(p1.as_str()), p2.as_deref(), Some(c.as_str())])
                    .flatten(),
            )
            .chain(self.mates.iter().flat_map(|(a, b)| [a.as_str(), b.as_str()]));
        let mut seen = std::collections::HashSet::new();
        let mut ids = Vec::new();
        for id in candidates {
            if seen.insert(id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Rejects empty or malformed identifiers anywhere in the graph.
    pub fn validate(&self) -> Result<()> {
        let all = self
            .roots
            .iter()
            .chain(self.mates.iter().flat_map(|(a, b)| [a, b]))
            .chain(
                self.children
                    .iter()
                    .flat_map(|(p1, p2, c)| [Some(p1), p2.as_ref(), Some(c)])
                    .flatten(),
            );
        for id in all {
            if !is_valid_entity_id(id) {
                return Err(FamilyTreeError::InvalidIdentifier(id.clone()));
            }
        }
        Ok(())
    }

    /// Display label for `id`, falling back to the id itself.
    pub fn label_for<'a>(&'a self, id: &'a str) -> &'a str {
        self.labels.get(id).map(String::as_str).unwrap_or(id)
    }

    /// Same graph with every id replaced by its label. Diagnostics only.
    pub fn to_labelled(&self) -> FamilyTreeData {
        FamilyTreeData {
            roots: self.roots.iter().map(|id| self.label_for(id).to_string()).collect(),
            mates: self
                .mates
                .iter()
                .map(|(a, b)| (self.label_for(a).to_string(), self.label_for(b).to_string()))
                .collect(),
            children: self
                .children
                .iter()
                .map(|(p1, p2, c)| {
                    (
                        self.label_for(p1).to_string(),
                        p2.as_deref().map(|p| self.label_for(p).to_string()),
                        self.label_for(c).to_string(),
                    )
                })
                .collect(),
            labels: BTreeMap::new(),
        }
    }
}

/// Identifiers must be non-empty and free of whitespace.
pub fn is_valid_entity_id(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(|ch| ch.is_whitespace() || ch.is_control())
}

/// Normalizes user-supplied entity ids to qualified names (`Q42` → `wd:Q42`).
pub fn normalize_entity_id(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let caps = QUALIFIED_NAME
        .captures(trimmed)
        .ok_or_else(|| FamilyTreeError::InvalidIdentifier(raw.to_string()))?;
    let local = &caps["local"];
    match caps.name("prefix") {
        Some(prefix) => Ok(format!("{}:{}", prefix.as_str(), local)),
        None => Ok(format!("{DEFAULT_ENTITY_PREFIX}:{local}")),
    }
}

/// Parses a graph document. Strict JSON first, JSON5 for hand-written files.
pub fn parse_family_tree(input: &str) -> Result<FamilyTreeData> {
    let graph = match serde_json::from_str::<FamilyTreeData>(input) {
        Ok(graph) => graph,
        Err(json_err) => json5::from_str::<FamilyTreeData>(input).map_err(|_| {
            FamilyTreeError::Parse {
                what: "family tree",
                message: json_err.to_string(),
            }
        })?,
    };
    graph.validate()?;
    Ok(graph)
}
