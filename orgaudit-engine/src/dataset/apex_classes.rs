//! Apex classes with static analysis, coverage and scheduling.

use async_trait::async_trait;
use orgaudit_core::entities::{coverage_ratio, ApexClass, EntityInfo};
use orgaudit_core::scanner;
use rayon::prelude::*;
use std::collections::HashMap;

use super::{keyed, Dataset, DatasetContext, DatasetParameters, DatasetValue, APEX_CLASSES};
use crate::error::Result;
use crate::query::{Query, RawRow, RowExt};

const CLASSES_QUERY: &str = "SELECT Id, Name, ApiVersion, NamespacePrefix, Body, \
     LengthWithoutComments, CreatedDate, LastModifiedDate \
     FROM ApexClass \
     WHERE ManageableState IN ('installedEditable', 'unmanaged')";

const RELATIONS_QUERY: &str = "SELECT ApexClassOrTriggerId, ApexTestClassId \
     FROM ApexCodeCoverage \
     GROUP BY ApexClassOrTriggerId, ApexTestClassId";

const COVERAGE_QUERY: &str = "SELECT ApexClassOrTriggerId, NumLinesCovered, NumLinesUncovered \
     FROM ApexCodeCoverageAggregate";

const SCHEDULED_QUERY: &str = "SELECT ApexClassId \
     FROM AsyncApexJob \
     WHERE JobType = 'ScheduledApex'";

/// Unmanaged and editable Apex classes keyed by normalized id.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApexClassesDataset;

#[async_trait]
impl Dataset for ApexClassesDataset {
    async fn run(&self, ctx: &DatasetContext, _params: &DatasetParameters) -> Result<DatasetValue> {
        let queries = [
            Query::tooling(CLASSES_QUERY),
            Query::tooling(RELATIONS_QUERY),
            Query::tooling(COVERAGE_QUERY),
            Query::standard(SCHEDULED_QUERY),
        ];
        let mut results = ctx.execute(APEX_CLASSES, &queries).await?.into_iter();
        let mut next = || results.next().map(|r| r.records).unwrap_or_default();
        let (classes, relations, coverage, scheduled) = (next(), next(), next(), next());

        ctx.logger.section_continues(
            APEX_CLASSES,
            &format!("Scanning {} class bodies", classes.len()),
        );
        let mut classes: Vec<(String, ApexClass)> = classes
            .par_iter()
            .map(|row| {
                let class = build_class(ctx, row);
                (class.info.id.clone(), class)
            })
            .collect();
        let index: HashMap<String, usize> = classes
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (id.clone(), i))
            .collect();

        for row in &relations {
            let class_id = ctx.normalize(&row.string("ApexClassOrTriggerId"));
            let test_id = ctx.normalize(&row.string("ApexTestClassId"));
            if let Some(&i) = index.get(&class_id) {
                classes[i].1.related_test_class_ids.push(test_id.clone());
            }
            if let Some(&i) = index.get(&test_id) {
                classes[i].1.related_class_ids.push(class_id);
            }
        }

        for row in &coverage {
            let class_id = ctx.normalize(&row.string("ApexClassOrTriggerId"));
            if let Some(&i) = index.get(&class_id) {
                let class = &mut classes[i].1;
                class.lines_covered = row.u64_field("NumLinesCovered").unwrap_or(0);
                class.lines_uncovered = row.u64_field("NumLinesUncovered").unwrap_or(0);
                class.coverage = coverage_ratio(class.lines_covered, class.lines_uncovered);
            }
        }

        for row in &scheduled {
            let class_id = ctx.normalize(&row.string("ApexClassId"));
            if let Some(&i) = index.get(&class_id) {
                classes[i].1.is_scheduled = true;
            }
        }

        for (_, class) in classes.iter_mut() {
            class.related_test_class_ids.sort();
            class.related_test_class_ids.dedup();
            class.related_class_ids.sort();
            class.related_class_ids.dedup();
        }

        keyed(APEX_CLASSES, classes)
    }
}

fn build_class(ctx: &DatasetContext, row: &RawRow) -> ApexClass {
    let scan = scanner::scan(row.str_field("Body").unwrap_or_default());
    ApexClass {
        info: EntityInfo {
            id: ctx.normalize(&row.string("Id")),
            name: row.string("Name"),
            package: row.string("NamespacePrefix"),
            created_date: row.datetime("CreatedDate"),
            last_modified_date: row.datetime("LastModifiedDate"),
        },
        api_version: row.f64_field("ApiVersion"),
        length: row.u64_field("LengthWithoutComments"),
        is_sharing_missing: scan.is_sharing_missing(),
        scan,
        ..Default::default()
    }
}
