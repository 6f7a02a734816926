//! Static pattern scanning over Apex and markup source.
//!
//! Every function here is pure and total: empty input yields `false`, `0`
//! or an empty list. Callers are expected to run [`remove_comments`] first so
//! that commented-out code does not produce findings; [`scan`] does that for
//! you and bundles every check into a [`CodeScan`].
//!
//! The `find_*` functions return sorted, de-duplicated values. First-occurrence
//! order is not preserved.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Comment syntax to strip in [`remove_comments`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentDialect {
    /// `/* block */` and `// line` comments (Apex, JavaScript).
    #[default]
    Code,
    /// `<!-- ... -->` comments (Visualforce, Aura, LWC templates).
    Markup,
}

// Line comments must not eat `://` in URLs nor escaped slashes, so the
// character before `//` is captured and written back.
static CODE_COMMENTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)/\*(?s:.)*?\*/|(^|[^\\:])//.*$").expect("valid comment regex")
});
static MARKUP_COMMENTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid markup comment regex"));
static NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n").expect("valid newline regex"));

static INTERFACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:public|global)\s+(?:virtual\s+)?interface\s+\w+(?:\s+extends\s+[\w.,\s]+?)?\s*\{")
        .expect("valid interface regex")
});
static ENUM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:public|global)\s+enum\s+\w+\s*\{").expect("valid enum regex")
});
static TEST_ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)@isTest\b").expect("valid test annotation regex"));
static TEST_SEE_ALL_DATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)@isTest\s*\([^)]*SeeAllData\s*=\s*true[^)]*\)")
        .expect("valid see-all-data regex")
});
static SHARING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(with|without|inherited)\s+sharing\b").expect("valid sharing regex")
});
static ASSERTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)System\.assert(?:Equals|NotEquals)?\s*\(|\bAssert\.[a-z]+\s*\(")
        .expect("valid assert regex")
});
static QUERY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[\s*(?:SELECT|FIND)\b").expect("valid query regex"));
static DATA_MUTATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:insert|update|upsert|delete)\s*(?:\s\w+|\(|\[)")
        .expect("valid dml regex")
});
static HOSTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:[a-z0-9-]{1,63}\.)+[a-z]{2,6}\b").expect("valid host regex")
});
// 15 or 18 characters with the pod marker `0` in sixth position, bounded by
// a delimiter on both sides.
static RECORD_IDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[,"'\s(][a-zA-Z0-9]{5}0[a-zA-Z0-9]{9}(?:[a-zA-Z0-9]{3})?[,"'\s)]"#)
        .expect("valid id regex")
});

/// Domain fragments that identify a platform-hosted URL.
const PLATFORM_DOMAINS: &[&str] = &[
    ".salesforce.com",
    ".force.com",
    ".visualforce.com",
    ".cloudforce.com",
    ".salesforce-sites.com",
    ".my.site.com",
];

/// Generated Visualforce domain of the org itself; always present, never a finding.
const TENANT_GENERATED_DOMAIN: &str = ".vf.force.com";

/// Explicit sharing modifier declared on a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharingModel {
    With,
    Without,
    Inherited,
}

impl SharingModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SharingModel::With => "with",
            SharingModel::Without => "without",
            SharingModel::Inherited => "inherited",
        }
    }
}

/// Result of running every check over one source unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeScan {
    pub is_test: bool,
    pub is_test_see_all_data: bool,
    pub is_interface: bool,
    pub is_enum: bool,
    pub specified_sharing: Option<SharingModel>,
    pub nb_asserts: usize,
    pub has_query: bool,
    pub has_data_mutation: bool,
    pub hardcoded_hosts: Vec<String>,
    pub hardcoded_ids: Vec<String>,
}

impl CodeScan {
    /// A class needs an explicit sharing keyword unless it is a test,
    /// an interface or an enum.
    pub fn is_sharing_missing(&self) -> bool {
        self.specified_sharing.is_none() && !self.is_test && !self.is_interface && !self.is_enum
    }
}

/// Strip comments and collapse line breaks into spaces.
pub fn remove_comments(code: &str, dialect: CommentDialect) -> String {
    if code.is_empty() {
        return String::new();
    }
    let stripped = match dialect {
        CommentDialect::Code => CODE_COMMENTS.replace_all(code, "$1"),
        CommentDialect::Markup => MARKUP_COMMENTS.replace_all(code, ""),
    };
    NEWLINES.replace_all(&stripped, " ").into_owned()
}

pub fn is_interface(code: &str) -> bool {
    INTERFACE.is_match(code)
}

pub fn is_enum(code: &str) -> bool {
    ENUM.is_match(code)
}

pub fn is_test(code: &str) -> bool {
    TEST_ANNOTATION.is_match(code)
}

/// Whether a test annotation turns off data isolation (`SeeAllData=true`).
pub fn is_test_with_see_all_data(code: &str) -> bool {
    TEST_SEE_ALL_DATA.is_match(code)
}

/// First explicit sharing modifier found, if any.
pub fn specified_sharing(code: &str) -> Option<SharingModel> {
    let caps = SHARING.captures(code)?;
    match caps.get(1)?.as_str().to_ascii_lowercase().as_str() {
        "with" => Some(SharingModel::With),
        "without" => Some(SharingModel::Without),
        "inherited" => Some(SharingModel::Inherited),
        _ => None,
    }
}

/// Number of assertion calls (every occurrence counts).
pub fn count_asserts(code: &str) -> usize {
    ASSERTS.find_iter(code).count()
}

pub fn has_query(code: &str) -> bool {
    QUERY.is_match(code)
}

pub fn has_data_mutation(code: &str) -> bool {
    DATA_MUTATION.is_match(code)
}

/// Platform host names written literally in the source.
pub fn find_hardcoded_hosts(code: &str) -> Vec<String> {
    HOSTS
        .find_iter(code)
        .map(|m| m.as_str().to_ascii_lowercase())
        .filter(|host| is_platform_host(host))
        .filter(|host| !host.ends_with(TENANT_GENERATED_DOMAIN))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Record ids written literally in the source, without their delimiters.
pub fn find_hardcoded_ids(code: &str) -> Vec<String> {
    RECORD_IDS
        .find_iter(code)
        .map(|m| {
            m.as_str()
                .trim_matches(|c: char| !c.is_ascii_alphanumeric())
                .to_string()
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn is_platform_host(host: &str) -> bool {
    let dotted = format!(".{}", host);
    PLATFORM_DOMAINS.iter().any(|fragment| dotted.contains(fragment))
}

/// Run every check over comment-stripped Apex source.
pub fn scan(code: &str) -> CodeScan {
    let code = remove_comments(code, CommentDialect::Code);
    CodeScan {
        is_test: is_test(&code),
        is_test_see_all_data: is_test_with_see_all_data(&code),
        is_interface: is_interface(&code),
        is_enum: is_enum(&code),
        specified_sharing: specified_sharing(&code),
        nb_asserts: count_asserts(&code),
        has_query: has_query(&code),
        has_data_mutation: has_data_mutation(&code),
        hardcoded_hosts: find_hardcoded_hosts(&code),
        hardcoded_ids: find_hardcoded_ids(&code),
    }
}
