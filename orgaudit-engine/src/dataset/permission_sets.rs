//! Permission sets and permission set groups.

use async_trait::async_trait;
use orgaudit_core::entities::{is_blank, EntityInfo, PermissionSet};
use std::collections::HashMap;

use super::{keyed, Dataset, DatasetContext, DatasetParameters, DatasetValue, PERMISSION_SETS};
use crate::error::Result;
use crate::query::{Query, RowExt};

const PERMISSION_SETS_QUERY: &str = "SELECT Id, Name, Label, Description, IsCustom, Type, \
     NamespacePrefix, PermissionSetGroupId, CreatedDate, LastModifiedDate \
     FROM PermissionSet \
     WHERE IsOwnedByProfile = FALSE";

const ASSIGNMENTS_QUERY: &str = "SELECT PermissionSetId, COUNT(Id) CountAssignee \
     FROM PermissionSetAssignment \
     WHERE PermissionSet.IsOwnedByProfile = FALSE \
     GROUP BY PermissionSetId";

const GROUP_COMPONENTS_QUERY: &str = "SELECT PermissionSetGroupId, PermissionSetId \
     FROM PermissionSetGroupComponent";

const GROUP_TYPE: &str = "Group";

/// Permission sets not owned by a profile, keyed by normalized id.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionSetsDataset;

#[async_trait]
impl Dataset for PermissionSetsDataset {
    async fn run(&self, ctx: &DatasetContext, _params: &DatasetParameters) -> Result<DatasetValue> {
        let queries = [
            Query::standard(PERMISSION_SETS_QUERY),
            Query::standard(ASSIGNMENTS_QUERY),
            Query::standard(GROUP_COMPONENTS_QUERY),
        ];
        let results = ctx.execute(PERMISSION_SETS, &queries).await?;

        let mut sets: Vec<(String, PermissionSet)> = Vec::with_capacity(results[0].records.len());
        let mut index: HashMap<String, usize> = HashMap::new();
        // Group permission sets are also reachable through their group record id.
        let mut group_index: HashMap<String, usize> = HashMap::new();

        for row in &results[0].records {
            let id = ctx.normalize(&row.string("Id"));
            let description = row.str_field("Description").map(str::to_string);
            let is_custom = row.bool_field("IsCustom");
            let is_group = row.str_field("Type") == Some(GROUP_TYPE);
            let set = PermissionSet {
                info: EntityInfo {
                    id: id.clone(),
                    name: row.string("Name"),
                    package: row.string("NamespacePrefix"),
                    created_date: row.datetime("CreatedDate"),
                    last_modified_date: row.datetime("LastModifiedDate"),
                },
                label: row.string("Label"),
                is_undescribed_custom: is_custom && is_blank(description.as_deref()),
                description,
                is_custom,
                is_group,
                ..Default::default()
            };
            if is_group {
                if let Some(group_id) = row.str_field("PermissionSetGroupId") {
                    group_index.insert(ctx.normalize(group_id), sets.len());
                }
            }
            index.insert(id.clone(), sets.len());
            sets.push((id, set));
        }

        for row in &results[1].records {
            let id = ctx.normalize(&row.string("PermissionSetId"));
            if let Some(&i) = index.get(&id) {
                sets[i].1.nb_assignments = row.u64_field("CountAssignee").unwrap_or(0);
            }
        }

        for row in &results[2].records {
            let id = ctx.normalize(&row.string("PermissionSetId"));
            let group_id = ctx.normalize(&row.string("PermissionSetGroupId"));
            // Report the group as the permission set that represents it, when known.
            let group_id = match group_index.get(&group_id) {
                Some(&g) => sets[g].0.clone(),
                None => group_id,
            };
            if let Some(&i) = index.get(&id) {
                sets[i].1.group_ids.push(group_id);
            }
        }

        for (_, set) in sets.iter_mut() {
            set.group_ids.sort();
            set.group_ids.dedup();
            set.is_unused = set.nb_assignments == 0 && set.group_ids.is_empty();
        }

        keyed(PERMISSION_SETS, sets)
    }
}
