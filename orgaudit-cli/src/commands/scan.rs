//! Scan command - static analysis of one source file

use crate::output::{flag, Output, OutputConfig, OutputFormat, TableDisplay, TableOutput};
use anyhow::{Context, Result};
use colored::Colorize;
use orgaudit_core::scanner::{self, CodeScan, CommentDialect};
use serde::Serialize;

/// Findings for one file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub file: String,
    pub dialect: &'static str,
    #[serde(flatten)]
    pub scan: CodeScan,
    /// Only meaningful for code.
    pub is_sharing_missing: bool,
}

impl TableDisplay for ScanReport {
    fn to_table(&self, config: &OutputConfig) -> String {
        let mut output = format!("{} {}\n", "Scan of".bold(), self.file.cyan());

        let mut pairs = vec![("Hardcoded hosts", self.scan.hardcoded_hosts.len().to_string())];
        pairs.push(("Hardcoded ids", self.scan.hardcoded_ids.len().to_string()));
        if self.dialect == "code" {
            let sharing = self
                .scan
                .specified_sharing
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|| "-".to_string());
            pairs.extend([
                ("Interface", flag(self.scan.is_interface)),
                ("Enum", flag(self.scan.is_enum)),
                ("Test", flag(self.scan.is_test)),
                ("SeeAllData", flag(self.scan.is_test_see_all_data)),
                ("Sharing", sharing),
                ("Sharing missing", flag(self.is_sharing_missing)),
                ("Asserts", self.scan.nb_asserts.to_string()),
                ("Queries", flag(self.scan.has_query)),
                ("DML", flag(self.scan.has_data_mutation)),
            ]);
        }
        output.push_str(&TableOutput::format_key_value(&pairs, config));

        for (label, values) in [
            ("Hosts", &self.scan.hardcoded_hosts),
            ("Ids", &self.scan.hardcoded_ids),
        ] {
            if !values.is_empty() {
                output.push_str(&format!("\n{}:\n", label.bold()));
                for value in values {
                    output.push_str(&format!("  {}\n", value));
                }
            }
        }
        output
    }
}

/// Build the report for `code`.
pub fn scan_source(file: &str, code: &str, markup: bool) -> ScanReport {
    if markup {
        let stripped = scanner::remove_comments(code, CommentDialect::Markup);
        ScanReport {
            file: file.to_string(),
            dialect: "markup",
            scan: CodeScan {
                hardcoded_hosts: scanner::find_hardcoded_hosts(&stripped),
                hardcoded_ids: scanner::find_hardcoded_ids(&stripped),
                ..Default::default()
            },
            is_sharing_missing: false,
        }
    } else {
        let scan = scanner::scan(code);
        ScanReport {
            file: file.to_string(),
            dialect: "code",
            is_sharing_missing: scan.is_sharing_missing(),
            scan,
        }
    }
}

pub async fn run(file: &str, markup: bool, format: OutputFormat) -> Result<()> {
    let code = std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))?;
    let report = scan_source(file, &code, markup);
    Output::new(report, format).render()
}
