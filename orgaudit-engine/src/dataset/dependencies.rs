//! Raw metadata dependency edges.

use async_trait::async_trait;
use orgaudit_core::types::DependencyEdge;

use super::{Dataset, DatasetContext, DatasetParameters, DatasetValue, DEPENDENCIES};
use crate::error::{DatasetError, Result};
use crate::query::{Query, RowExt};

const DEPENDENCIES_QUERY: &str = "SELECT MetadataComponentId, MetadataComponentName, \
     MetadataComponentType, RefMetadataComponentId, RefMetadataComponentName, \
     RefMetadataComponentType \
     FROM MetadataComponentDependency";

/// Every "uses" edge of the org, as a sequence of [`DependencyEdge`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DependenciesDataset;

#[async_trait]
impl Dataset for DependenciesDataset {
    async fn run(&self, ctx: &DatasetContext, _params: &DatasetParameters) -> Result<DatasetValue> {
        let results = ctx
            .execute(DEPENDENCIES, &[Query::tooling(DEPENDENCIES_QUERY)])
            .await?;

        let edges = results[0]
            .records
            .iter()
            .map(|row| {
                let edge = DependencyEdge {
                    id: ctx.normalize(&row.string("MetadataComponentId")),
                    name: row.string("MetadataComponentName"),
                    kind: row.string("MetadataComponentType"),
                    ref_id: ctx.normalize(&row.string("RefMetadataComponentId")),
                    ref_name: row.string("RefMetadataComponentName"),
                    ref_type: row.string("RefMetadataComponentType"),
                };
                serde_json::to_value(edge)
                    .map_err(|e| DatasetError::transform(DEPENDENCIES, e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DatasetValue::Sequence(edges))
    }
}
