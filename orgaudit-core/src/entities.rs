//! Typed records for audited artifacts.
//!
//! Every entity flattens an [`EntityInfo`] header and adds the attributes
//! derived for its category. Entities are built once per dataset run and are
//! read-only afterwards.
//!
//! Fields whose serialized name ends in `Ref` are back-references to other
//! entities. They are never written to the cache, so they come back as `None`
//! after a cache hit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scanner::CodeScan;

/// Attributes shared by every audited artifact.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityInfo {
    pub id: String,
    pub name: String,
    /// Namespace prefix of the owning package; empty for unpackaged metadata.
    pub package: String,
    pub created_date: Option<DateTime<Utc>>,
    pub last_modified_date: Option<DateTime<Utc>>,
}

/// An Apex class with static-analysis, coverage and scheduling attributes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApexClass {
    #[serde(flatten)]
    pub info: EntityInfo,
    pub api_version: Option<f64>,
    /// Source length without comments, as reported by the platform.
    pub length: Option<u64>,
    #[serde(flatten)]
    pub scan: CodeScan,
    pub is_sharing_missing: bool,
    pub lines_covered: u64,
    pub lines_uncovered: u64,
    /// `covered / (covered + uncovered)`, `None` when no line was measured.
    pub coverage: Option<f64>,
    pub is_scheduled: bool,
    /// Test classes that exercise this class.
    pub related_test_class_ids: Vec<String>,
    /// Classes exercised by this class when it is a test.
    pub related_class_ids: Vec<String>,
}

/// A permission set or permission set group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSet {
    #[serde(flatten)]
    pub info: EntityInfo,
    pub label: String,
    pub description: Option<String>,
    pub is_custom: bool,
    pub is_group: bool,
    pub nb_assignments: u64,
    /// Groups this permission set is a component of.
    pub group_ids: Vec<String>,
    pub is_unused: bool,
    pub is_undescribed_custom: bool,
}

/// Parent object of a custom field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    pub id: String,
    pub api_name: String,
}

/// A custom field of one object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomField {
    #[serde(flatten)]
    pub info: EntityInfo,
    pub object_api_name: String,
    pub description: Option<String>,
    pub is_undescribed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_ref: Option<ObjectRef>,
}

/// Ratio of covered lines, guarding the empty case.
pub fn coverage_ratio(covered: u64, uncovered: u64) -> Option<f64> {
    let total = covered + uncovered;
    if total == 0 {
        None
    } else {
        Some(covered as f64 / total as f64)
    }
}

/// A description made only of whitespace counts as missing.
pub fn is_blank(text: Option<&str>) -> bool {
    text.map_or(true, |t| t.trim().is_empty())
}
