//! Custom fields of one object.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use orgaudit_core::entities::{is_blank, CustomField, EntityInfo, ObjectRef};
use regex::Regex;

use super::{keyed, Dataset, DatasetContext, DatasetParameters, DatasetValue, OBJECT_FIELDS};
use crate::error::{DatasetError, Result};
use crate::query::{Query, RowExt};

/// Name of the parameter holding the object API name.
pub const OBJECT_PARAMETER: &str = "object";

static OBJECT_API_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("Invalid regex"));

fn fields_query(object: &str) -> String {
    format!(
        "SELECT Id, DeveloperName, NamespacePrefix, Description, EntityDefinitionId, \
         EntityDefinition.QualifiedApiName, CreatedDate, LastModifiedDate \
         FROM CustomField \
         WHERE EntityDefinition.QualifiedApiName = '{}'",
        object
    )
}

/// Custom fields of the object named by the `object` parameter, keyed by
/// normalized id. Request it with a per-object cache key.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectFieldsDataset;

#[async_trait]
impl Dataset for ObjectFieldsDataset {
    async fn run(&self, ctx: &DatasetContext, params: &DatasetParameters) -> Result<DatasetValue> {
        let object = params.require_str(OBJECT_PARAMETER)?;
        // The name is spliced into the query text.
        if !OBJECT_API_NAME.is_match(object) {
            return Err(DatasetError::invalid_parameter(
                OBJECT_PARAMETER,
                format!("'{}' is not an object API name", object),
            ));
        }

        let results = ctx
            .execute(OBJECT_FIELDS, &[Query::tooling(fields_query(object))])
            .await?;

        let fields: Vec<(String, CustomField)> = results[0]
            .records
            .iter()
            .map(|row| {
                let id = ctx.normalize(&row.string("Id"));
                let description = row.str_field("Description").map(str::to_string);
                let object_api_name = row
                    .str_field("EntityDefinition.QualifiedApiName")
                    .unwrap_or(object)
                    .to_string();
                let field = CustomField {
                    info: EntityInfo {
                        id: id.clone(),
                        name: row.string("DeveloperName"),
                        package: row.string("NamespacePrefix"),
                        created_date: row.datetime("CreatedDate"),
                        last_modified_date: row.datetime("LastModifiedDate"),
                    },
                    is_undescribed: is_blank(description.as_deref()),
                    description,
                    object_ref: Some(ObjectRef {
                        id: ctx.normalize(&row.string("EntityDefinitionId")),
                        api_name: object_api_name.clone(),
                    }),
                    object_api_name,
                };
                (id, field)
            })
            .collect();

        ctx.logger.section_continues(
            OBJECT_FIELDS,
            &format!("{} custom fields on {}", fields.len(), object),
        );
        keyed(OBJECT_FIELDS, fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FixtureQueryInterface, RawRow};
    use serde_json::json;
    use std::sync::Arc;

    fn fixture() -> Arc<FixtureQueryInterface> {
        let rows: Vec<RawRow> = serde_json::from_value(json!([
            {
                "Id": "00N000000000001AAA",
                "DeveloperName": "Rating",
                "Description": null,
                "EntityDefinitionId": "01I000000000001AAA",
                "EntityDefinition": {"QualifiedApiName": "Account"}
            }
        ]))
        .unwrap();
        Arc::new(FixtureQueryInterface::new().with_rows("CustomField", rows))
    }

    #[tokio::test]
    async fn test_fields_carry_object_reference() {
        let query = fixture();
        let ctx = DatasetContext::new(query.clone());
        let params = DatasetParameters::new().with(OBJECT_PARAMETER, "Account");
        let value = ObjectFieldsDataset.run(&ctx, &params).await.unwrap();

        let field: CustomField =
            serde_json::from_value(value.get("00N000000000001").cloned().unwrap()).unwrap();
        assert_eq!(field.info.name, "Rating");
        assert_eq!(field.object_api_name, "Account");
        assert!(field.is_undescribed);
        assert_eq!(
            field.object_ref,
            Some(ObjectRef {
                id: "01I000000000001".to_string(),
                api_name: "Account".to_string()
            })
        );
        assert!(query.batches()[0][0]
            .text
            .ends_with("QualifiedApiName = 'Account'"));
    }

    #[tokio::test]
    async fn test_object_parameter_is_validated() {
        let query = fixture();
        let ctx = DatasetContext::new(query.clone());

        let err = ObjectFieldsDataset
            .run(&ctx, &DatasetParameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DatasetError::InvalidParameter { .. }));

        let params = DatasetParameters::new().with(OBJECT_PARAMETER, "Account' OR Id != '");
        let err = ObjectFieldsDataset.run(&ctx, &params).await.unwrap_err();
        assert!(matches!(err, DatasetError::InvalidParameter { .. }));
        assert_eq!(query.calls(), 0);
    }
}
