//! Datasets: named units of retrieval plus derivation.
//!
//! A dataset issues one batch of queries through the [`QueryInterface`],
//! joins the result sets on normalized ids and returns a [`DatasetValue`].
//! Datasets never touch the cache; the [`DatasetManager`] does.

mod apex_classes;
mod dependencies;
mod object_fields;
mod permission_sets;

pub use apex_classes::ApexClassesDataset;
pub use dependencies::DependenciesDataset;
pub use object_fields::ObjectFieldsDataset;
pub use permission_sets::PermissionSetsDataset;

use async_trait::async_trait;
use orgaudit_core::{CaseSafeId, IdNormalizer};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::CacheValue;
use crate::error::{DatasetError, Result};
use crate::logger::{SectionLogger, TracingLogger};
use crate::manager::DatasetManager;
use crate::query::{Query, QueryInterface, QueryResult};

/// What a dataset produces. Same shape as a cache value.
pub type DatasetValue = CacheValue;

/// Values per alias from one [`DatasetManager::run`] call.
pub type DatasetResultSet = HashMap<String, Arc<DatasetValue>>;

/// Alias of [`ApexClassesDataset`].
pub const APEX_CLASSES: &str = "apex-classes";
/// Alias of [`PermissionSetsDataset`].
pub const PERMISSION_SETS: &str = "permission-sets";
/// Alias of [`ObjectFieldsDataset`].
pub const OBJECT_FIELDS: &str = "object-fields";
/// Alias of [`DependenciesDataset`].
pub const DEPENDENCIES: &str = "dependencies";

/// Collaborators handed to every dataset run.
#[derive(Clone)]
pub struct DatasetContext {
    pub query: Arc<dyn QueryInterface>,
    pub normalizer: Arc<dyn IdNormalizer>,
    pub logger: Arc<dyn SectionLogger>,
}

impl DatasetContext {
    /// Context with case-safe id normalization and tracing output.
    pub fn new(query: Arc<dyn QueryInterface>) -> Self {
        Self {
            query,
            normalizer: Arc::new(CaseSafeId),
            logger: Arc::new(TracingLogger),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn IdNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn SectionLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn normalize(&self, id: &str) -> String {
        self.normalizer.normalize(id)
    }

    /// Run `queries` as one batch and check that every result set came back.
    pub async fn execute(&self, source: &str, queries: &[Query]) -> Result<Vec<QueryResult>> {
        let results = self.query.execute_batch(queries).await?;
        if results.len() != queries.len() {
            return Err(DatasetError::transform(
                source,
                format!(
                    "expected {} result sets, got {}",
                    queries.len(),
                    results.len()
                ),
            ));
        }
        Ok(results)
    }
}

impl std::fmt::Debug for DatasetContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetContext").finish_non_exhaustive()
    }
}

/// Named run parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetParameters(HashMap<String, Value>);

impl DatasetParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A required, non-empty string parameter.
    pub fn require_str(&self, name: &str) -> Result<&str> {
        match self.0.get(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
            Some(_) => Err(DatasetError::invalid_parameter(
                name,
                "expected a non-empty string",
            )),
            None => Err(DatasetError::invalid_parameter(name, "missing")),
        }
    }
}

/// One dataset to run, and where to cache its output.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRunRequest {
    pub alias: String,
    /// Differs from `alias` when one dataset is run with several parameter sets.
    pub cache_key: String,
    pub parameters: DatasetParameters,
}

impl DatasetRunRequest {
    /// Request cached under its own alias, without parameters.
    pub fn new(alias: impl Into<String>) -> Self {
        let alias = alias.into();
        Self {
            cache_key: alias.clone(),
            alias,
            parameters: DatasetParameters::default(),
        }
    }

    pub fn with_cache_key(mut self, cache_key: impl Into<String>) -> Self {
        self.cache_key = cache_key.into();
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters = self.parameters.with(name, value);
        self
    }

    /// Fields of one object, cached per object.
    pub fn object_fields(object: &str) -> Self {
        Self::new(OBJECT_FIELDS)
            .with_cache_key(format!("{}-{}", OBJECT_FIELDS, object))
            .with_parameter(object_fields::OBJECT_PARAMETER, object)
    }
}

/// Retrieval and derivation logic for one data category.
#[async_trait]
pub trait Dataset: Send + Sync {
    async fn run(&self, ctx: &DatasetContext, params: &DatasetParameters) -> Result<DatasetValue>;
}

/// Register every built-in dataset under its alias.
pub fn register_defaults(manager: &DatasetManager) -> Result<()> {
    manager.register(APEX_CLASSES, Arc::new(ApexClassesDataset))?;
    manager.register(PERMISSION_SETS, Arc::new(PermissionSetsDataset))?;
    manager.register(OBJECT_FIELDS, Arc::new(ObjectFieldsDataset))?;
    manager.register(DEPENDENCIES, Arc::new(DependenciesDataset))?;
    Ok(())
}

/// Serialize keyed entities into an ordered map value.
fn keyed<T: Serialize>(source: &str, entities: Vec<(String, T)>) -> Result<DatasetValue> {
    let mut map = Map::with_capacity(entities.len());
    for (id, entity) in entities {
        let value = serde_json::to_value(entity)
            .map_err(|e| DatasetError::transform(source, e.to_string()))?;
        map.insert(id, value);
    }
    Ok(DatasetValue::Map(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_require_str() {
        let params = DatasetParameters::new()
            .with("object", "Account")
            .with("blank", " ")
            .with("number", 3);
        assert_eq!(params.require_str("object").unwrap(), "Account");
        assert!(matches!(
            params.require_str("missing"),
            Err(DatasetError::InvalidParameter { .. })
        ));
        assert!(params.require_str("blank").is_err());
        assert!(params.require_str("number").is_err());
        assert_eq!(params.get("number"), Some(&json!(3)));
    }

    #[test]
    fn test_object_fields_request_has_own_cache_key() {
        let request = DatasetRunRequest::object_fields("Account");
        assert_eq!(request.alias, "object-fields");
        assert_eq!(request.cache_key, "object-fields-Account");
        assert_eq!(
            request.parameters.require_str("object").unwrap(),
            "Account"
        );
        assert_eq!(DatasetRunRequest::new("dependencies").cache_key, "dependencies");
    }

    #[test]
    fn test_keyed_keeps_order() {
        let value = keyed("test", vec![("b".to_string(), 1), ("a".to_string(), 2)]).unwrap();
        let DatasetValue::Map(map) = value else {
            panic!("expected a map");
        };
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }
}
