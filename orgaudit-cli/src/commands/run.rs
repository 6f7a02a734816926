//! Run command - run datasets against recorded query results
//!
//! Rows are replayed from a fixture file mapping object names to row arrays.
//! Results go through the configured cache, so a second run is served from it.

use crate::commands::open_manager;
use crate::config::OrgAuditConfig;
use crate::output::{Output, OutputConfig, OutputFormat, TableDisplay, TableOutput};
use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use orgaudit_engine::dataset::OBJECT_FIELDS;
use orgaudit_engine::{CacheValue, DatasetRunRequest, FixtureQueryInterface};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Outcome of one dataset.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub alias: String,
    pub cache_key: String,
    /// Served from cache rather than fetched.
    pub cached: bool,
    pub kind: &'static str,
    pub entries: Option<usize>,
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub datasets: Vec<DatasetSummary>,
    /// Query batches sent to the fixture.
    pub batches: usize,
}

impl TableDisplay for RunReport {
    fn to_table(&self, config: &OutputConfig) -> String {
        let rows: Vec<Vec<String>> = self
            .datasets
            .iter()
            .map(|d| {
                vec![
                    d.alias.clone(),
                    d.cache_key.clone(),
                    if d.cached {
                        "cache".green().to_string()
                    } else {
                        "fetched".to_string()
                    },
                    d.kind.to_string(),
                    d.entries.map_or("-".to_string(), |n| n.to_string()),
                ]
            })
            .collect();
        let mut output = TableOutput::from_rows(
            &["Dataset", "Cache key", "Source", "Kind", "Entries"],
            &rows,
            config,
        );
        output.push_str(&format!(
            "\n{} query batch(es) executed\n",
            self.batches.to_string().bold()
        ));
        output
    }
}

fn kind(value: &CacheValue) -> &'static str {
    match value {
        CacheValue::Scalar(_) => "scalar",
        CacheValue::Sequence(_) => "sequence",
        CacheValue::Map(_) => "map",
    }
}

/// Requests for `aliases`; `object-fields` needs an object name.
pub fn build_requests(aliases: &[String], object: Option<&str>) -> Result<Vec<DatasetRunRequest>> {
    aliases
        .iter()
        .map(|alias| {
            if alias == OBJECT_FIELDS {
                match object {
                    Some(object) => Ok(DatasetRunRequest::object_fields(object)),
                    None => Err(anyhow!("'{}' needs --object <NAME>", OBJECT_FIELDS)),
                }
            } else {
                Ok(DatasetRunRequest::new(alias.clone()))
            }
        })
        .collect()
}

pub async fn run(
    aliases: &[String],
    fixtures: &str,
    object: Option<&str>,
    config: &OrgAuditConfig,
    format: OutputFormat,
) -> Result<()> {
    let content = std::fs::read_to_string(fixtures)
        .with_context(|| format!("Failed to read fixtures {}", fixtures))?;
    let query = Arc::new(
        FixtureQueryInterface::from_json_str(&content)
            .with_context(|| format!("{} is not a fixture file", fixtures))?,
    );
    let manager = open_manager(config, Path::new("."), query.clone())?;

    let requests = build_requests(aliases, object)?;
    let cached: Vec<bool> = requests
        .iter()
        .map(|r| manager.cache().has(&r.cache_key))
        .collect();

    let results = manager
        .run(requests.clone())
        .await
        .context("Dataset run failed")?;

    let datasets = requests
        .into_iter()
        .zip(cached)
        .filter_map(|(request, cached)| {
            let value = results.get(&request.alias)?;
            Some(DatasetSummary {
                kind: kind(value),
                entries: value.len(),
                data: value.to_json(),
                alias: request.alias,
                cache_key: request.cache_key,
                cached,
            })
        })
        .collect();

    Output::new(
        RunReport {
            datasets,
            batches: query.calls(),
        },
        format,
    )
    .render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_fields_needs_object() {
        let aliases = vec!["object-fields".to_string()];
        assert!(build_requests(&aliases, None).is_err());

        let requests = build_requests(&aliases, Some("Account")).unwrap();
        assert_eq!(requests[0].cache_key, "object-fields-Account");
    }

    #[test]
    fn test_plain_aliases_use_alias_as_key() {
        let aliases = vec!["apex-classes".to_string(), "unknown".to_string()];
        let requests = build_requests(&aliases, None).unwrap();
        assert_eq!(requests[0].cache_key, "apex-classes");
        assert_eq!(requests[1].alias, "unknown");
    }
}
