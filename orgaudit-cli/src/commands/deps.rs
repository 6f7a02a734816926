//! Deps command - dependency view of one entity
//!
//! Reads a JSON array of dependency edges and shows what the entity uses and
//! what references it.

use crate::output::{Output, OutputConfig, OutputFormat, TableDisplay, TableOutput};
use anyhow::{Context, Result};
use colored::Colorize;
use orgaudit_core::types::{DependencyEdge, DependencyItem};
use orgaudit_core::{build_view, CaseSafeId, DependencyIndex, DependencyView, IdNormalizer};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepsReport {
    pub id: String,
    #[serde(flatten)]
    pub view: DependencyView,
}

fn item_rows(items: &[DependencyItem]) -> Vec<Vec<String>> {
    items
        .iter()
        .map(|item| vec![item.id.clone(), item.name.clone(), item.kind.clone()])
        .collect()
}

impl TableDisplay for DepsReport {
    fn to_table(&self, config: &OutputConfig) -> String {
        let mut output = format!("{} {}\n", "Dependencies of".bold(), self.id.cyan());
        if self.view.is_empty() {
            output.push_str(&"  No dependencies found.\n".dimmed().to_string());
            return output;
        }

        let headers = ["Id", "Name", "Type"];
        output.push_str(&format!("\n{} ({})\n", "Using".bold(), self.view.using.len()));
        output.push_str(&TableOutput::from_rows(&headers, &item_rows(&self.view.using), config));
        output.push_str(&format!(
            "\n{} ({})\n",
            "Referenced by".bold(),
            self.view.referenced.len()
        ));
        output.push_str(&TableOutput::from_rows(
            &headers,
            &item_rows(&self.view.referenced),
            config,
        ));

        if !self.view.referenced_by_types.is_empty() {
            let counts: Vec<Vec<String>> = self
                .view
                .referenced_by_types
                .iter()
                .map(|(kind, count)| vec![kind.clone(), count.to_string()])
                .collect();
            output.push('\n');
            output.push_str(&TableOutput::from_rows(&["Type", "Count"], &counts, config));
        }
        output
    }
}

/// Load edges from a JSON file.
pub fn load_edges(path: &str) -> Result<Vec<DependencyEdge>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not a dependency edge list", path))
}

pub async fn run(edges_path: &str, id: &str, indexed: bool, format: OutputFormat) -> Result<()> {
    let edges = load_edges(edges_path)?;
    let id = CaseSafeId.normalize(id);

    let view = if indexed {
        let index = DependencyIndex::from_edges(edges);
        tracing::debug!(
            "Indexed {} nodes and {} edges",
            index.node_count(),
            index.edge_count()
        );
        index.view(&id)
    } else {
        build_view(&edges, &id)
    };

    Output::new(DepsReport { id, view }, format).render()
}
