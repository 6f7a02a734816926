//! OrgAudit core - static analysis and dependency views for org metadata.
//!
//! This crate has no I/O and no async code. It provides:
//!
//! - **Code scanning**: regex-driven checks over Apex and markup source
//!   ([`scanner`])
//! - **Dependency views**: using/referenced projections over a flat edge list
//!   ([`graph`])
//! - **Identifier normalization**: joining 15- and 18-character record ids
//!   ([`ids`])
//! - **Entity model**: typed records produced by the retrieval engine
//!   ([`entities`], [`types`])
//!
//! # Usage
//!
//! ```
//! use orgaudit_core::{graph, scanner, types::DependencyEdge};
//!
//! assert!(scanner::is_interface("public interface Greeter {"));
//!
//! let edges = vec![DependencyEdge::new(
//!     ("A", "AccountService", "ApexClass"),
//!     ("B", "Account.Rating__c", "CustomField"),
//! )];
//! let view = graph::build_view(&edges, "B");
//! assert_eq!(view.referenced[0].name, "AccountService");
//! ```

pub mod entities;
pub mod graph;
pub mod ids;
pub mod scanner;
pub mod types;

pub use graph::{build_view, DependencyIndex};
pub use ids::{case_safe_id, CaseSafeId, IdNormalizer};
pub use scanner::{CodeScan, CommentDialect, SharingModel};
pub use types::{DependencyEdge, DependencyItem, DependencyView};
