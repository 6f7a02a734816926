//! Dependency data model.
//!
//! [`DependencyEdge`] rows come from the platform's dependency API and are
//! consumed as-is. [`DependencyView`] is derived per entity by the
//! [`graph`](crate::graph) module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// "Entity `id` uses entity `ref_id`".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEdge {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub ref_id: String,
    pub ref_name: String,
    pub ref_type: String,
}

impl DependencyEdge {
    pub fn new(
        (id, name, kind): (&str, &str, &str),
        (ref_id, ref_name, ref_type): (&str, &str, &str),
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind: kind.to_string(),
            ref_id: ref_id.to_string(),
            ref_name: ref_name.to_string(),
            ref_type: ref_type.to_string(),
        }
    }

    /// The entity on the using side.
    pub fn source(&self) -> DependencyItem {
        DependencyItem {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind.clone(),
        }
    }

    /// The entity being used.
    pub fn target(&self) -> DependencyItem {
        DependencyItem {
            id: self.ref_id.clone(),
            name: self.ref_name.clone(),
            kind: self.ref_type.clone(),
        }
    }
}

/// One side of a dependency edge.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// What an entity uses, what uses it, and how many referrers of each type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyView {
    pub using: Vec<DependencyItem>,
    pub referenced: Vec<DependencyItem>,
    pub referenced_by_types: BTreeMap<String, usize>,
}

impl DependencyView {
    pub fn is_empty(&self) -> bool {
        self.using.is_empty() && self.referenced.is_empty()
    }
}
