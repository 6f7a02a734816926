//! Cache command - inspect and clear cached datasets

use crate::commands::open_manager;
use crate::config::OrgAuditConfig;
use crate::output::{flag, Output, OutputConfig, OutputFormat, TableDisplay, TableOutput};
use anyhow::Result;
use colored::Colorize;
use orgaudit_engine::{DatasetCacheInfo, FixtureQueryInterface};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct CacheListing {
    pub entries: Vec<DatasetCacheInfo>,
}

impl TableDisplay for CacheListing {
    fn to_table(&self, config: &OutputConfig) -> String {
        let rows: Vec<Vec<String>> = self
            .entries
            .iter()
            .map(|e| {
                vec![
                    e.name.clone(),
                    if e.is_empty {
                        "expired".red().to_string()
                    } else {
                        "live".green().to_string()
                    },
                    flag(e.is_map),
                    e.length.map_or("-".to_string(), |n| n.to_string()),
                    e.created
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ]
            })
            .collect();
        TableOutput::from_rows(&["Name", "State", "Map", "Length", "Created"], &rows, config)
    }
}

/// Outcome of a remove or clear.
#[derive(Debug, Serialize)]
pub struct CacheChange {
    pub removed: Vec<String>,
}

impl TableDisplay for CacheChange {
    fn to_table(&self, _config: &OutputConfig) -> String {
        if self.removed.is_empty() {
            "Nothing to remove".dimmed().to_string()
        } else {
            format!(
                "{} {}",
                "Removed".green(),
                self.removed.join(", ")
            )
        }
    }
}

pub enum CacheAction<'a> {
    List,
    Remove(&'a str),
    Clear,
}

pub async fn run(action: CacheAction<'_>, config: &OrgAuditConfig, format: OutputFormat) -> Result<()> {
    // Administration never queries, so an empty fixture stands in.
    let manager = open_manager(config, Path::new("."), Arc::new(FixtureQueryInterface::new()))?;
    let names = || -> Vec<String> {
        manager
            .cache_information()
            .into_iter()
            .map(|e| e.name)
            .collect()
    };

    match action {
        CacheAction::List => Output::new(
            CacheListing {
                entries: manager.cache_information(),
            },
            format,
        )
        .render(),
        CacheAction::Remove(name) => {
            let removed = if names().iter().any(|n| n == name) {
                manager.remove_cache(name);
                vec![name.to_string()]
            } else {
                Vec::new()
            };
            Output::new(CacheChange { removed }, format).render()
        }
        CacheAction::Clear => {
            let removed = names();
            manager.remove_all_cache();
            Output::new(CacheChange { removed }, format).render()
        }
    }
}
