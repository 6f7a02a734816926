//! Remote query collaborator.
//!
//! Execution of queries is not part of the engine. Datasets talk to a
//! [`QueryInterface`], which returns one result set per query, in order, or
//! fails the whole batch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::QueryError;

/// One raw record as returned by the remote interface.
pub type RawRow = Map<String, Value>;

/// A query string and the API it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub text: String,
    /// Route through the extended (tooling) API instead of the data API.
    pub use_extended_api: bool,
}

impl Query {
    pub fn standard(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            use_extended_api: false,
        }
    }

    pub fn tooling(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            use_extended_api: true,
        }
    }
}

/// Rows returned for one query of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub records: Vec<RawRow>,
}

/// Executes batches of queries in a single round trip.
#[async_trait]
pub trait QueryInterface: Send + Sync {
    async fn execute_batch(&self, queries: &[Query]) -> Result<Vec<QueryResult>, QueryError>;
}

/// Typed access to row fields, including dotted paths into nested records
/// such as `EntityDefinition.QualifiedApiName`.
pub trait RowExt {
    fn field(&self, path: &str) -> Option<&Value>;

    fn str_field(&self, path: &str) -> Option<&str> {
        self.field(path).and_then(Value::as_str)
    }

    /// The field as an owned string, empty when missing.
    fn string(&self, path: &str) -> String {
        self.str_field(path).unwrap_or_default().to_string()
    }

    fn u64_field(&self, path: &str) -> Option<u64> {
        let value = self.field(path)?;
        value
            .as_u64()
            .or_else(|| value.as_f64().filter(|n| *n >= 0.0).map(|n| n as u64))
    }

    fn f64_field(&self, path: &str) -> Option<f64> {
        self.field(path).and_then(Value::as_f64)
    }

    fn bool_field(&self, path: &str) -> bool {
        self.field(path).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Timestamps come as RFC 3339 or with a `+0000` style offset.
    fn datetime(&self, path: &str) -> Option<DateTime<Utc>> {
        let raw = self.str_field(path)?;
        DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl RowExt for RawRow {
    fn field(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }
}

static FROM_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bFROM\s+(\w+)").expect("Invalid regex"));

/// Object a query reads from, if it has a `FROM` clause.
pub fn queried_object(text: &str) -> Option<&str> {
    FROM_CLAUSE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Replays canned rows keyed by queried object.
///
/// Fixture files map object names to row arrays:
///
/// ```json
/// { "ApexClass": [ { "Id": "01p...", "Name": "AccountService" } ] }
/// ```
///
/// Objects without rows yield empty result sets. Every executed batch is
/// recorded for inspection.
#[derive(Debug, Default)]
pub struct FixtureQueryInterface {
    rows: HashMap<String, Vec<RawRow>>,
    failure: Option<QueryError>,
    calls: AtomicUsize,
    batches: Mutex<Vec<Vec<Query>>>,
}

impl FixtureQueryInterface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let rows: HashMap<String, Vec<RawRow>> = serde_json::from_str(json)?;
        Ok(Self {
            rows,
            ..Self::default()
        })
    }

    pub fn with_rows(mut self, object: impl Into<String>, rows: Vec<RawRow>) -> Self {
        self.rows.insert(object.into(), rows);
        self
    }

    /// Fail every batch with `error`.
    pub fn failing(mut self, error: QueryError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Number of batches executed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> Vec<Vec<Query>> {
        match self.batches.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl QueryInterface for FixtureQueryInterface {
    async fn execute_batch(&self, queries: &[Query]) -> Result<Vec<QueryResult>, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.batches.lock() {
            Ok(mut guard) => guard.push(queries.to_vec()),
            Err(poisoned) => {
                tracing::warn!("Recovering from poisoned fixture mutex");
                poisoned.into_inner().push(queries.to_vec())
            }
        }

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        Ok(queries
            .iter()
            .map(|query| QueryResult {
                records: queried_object(&query.text)
                    .and_then(|object| self.rows.get(object))
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> RawRow {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_row_paths() {
        let r = row(json!({
            "Name": "Rating__c",
            "EntityDefinition": {"QualifiedApiName": "Account", "DurableId": "01I000000000001"},
            "expr0": 3.0,
            "IsCustom": true,
            "CreatedDate": "2023-04-05T06:07:08.000+0000"
        }));
        assert_eq!(r.str_field("Name"), Some("Rating__c"));
        assert_eq!(r.string("EntityDefinition.QualifiedApiName"), "Account");
        assert_eq!(r.string("Missing.Path"), "");
        assert_eq!(r.u64_field("expr0"), Some(3));
        assert!(r.bool_field("IsCustom"));
        assert!(!r.bool_field("IsOwnedByProfile"));
        let created = r.datetime("CreatedDate").unwrap();
        assert_eq!(created.to_rfc3339(), "2023-04-05T06:07:08+00:00");
    }

    #[test]
    fn test_queried_object() {
        assert_eq!(
            queried_object("SELECT Id FROM ApexClass WHERE Name = 'x'"),
            Some("ApexClass")
        );
        assert_eq!(queried_object("select id from PermissionSet"), Some("PermissionSet"));
        assert_eq!(queried_object("garbage"), None);
    }

    #[tokio::test]
    async fn test_fixture_replays_rows_in_order() {
        let fixture = FixtureQueryInterface::from_json_str(
            r#"{"ApexClass": [{"Id": "a"}, {"Id": "b"}], "AsyncApexJob": [{"ApexClassId": "a"}]}"#,
        )
        .unwrap();
        let results = fixture
            .execute_batch(&[
                Query::standard("SELECT ApexClassId FROM AsyncApexJob"),
                Query::tooling("SELECT Id FROM ApexClass"),
                Query::tooling("SELECT Id FROM ApexCodeCoverage"),
            ])
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].records.len(), 1);
        assert_eq!(results[1].records.len(), 2);
        assert!(results[2].records.is_empty());
        assert_eq!(fixture.calls(), 1);
        assert!(fixture.batches()[0][1].use_extended_api);
    }

    #[tokio::test]
    async fn test_fixture_failure_rejects_batch() {
        let fixture = FixtureQueryInterface::new().failing(QueryError::new("INVALID_SESSION_ID"));
        let err = fixture
            .execute_batch(&[Query::standard("SELECT Id FROM User")])
            .await
            .unwrap_err();
        assert_eq!(err.message, "INVALID_SESSION_ID");
        assert_eq!(fixture.calls(), 1);
    }
}
