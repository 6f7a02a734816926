//! Record identifier normalization.
//!
//! The platform hands out the same record id in two shapes: a 15-character
//! case-sensitive form and an 18-character form with a 3-character checksum
//! suffix. Rows from different APIs must be joined on a single shape.

/// Maps any representation of an identifier to one canonical string.
///
/// Implementations must be pure and idempotent:
/// `normalize(normalize(x)) == normalize(x)`.
pub trait IdNormalizer: Send + Sync {
    fn normalize(&self, id: &str) -> String;
}

/// Canonical form is the 15-character prefix of an 18-character id.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseSafeId;

impl IdNormalizer for CaseSafeId {
    fn normalize(&self, id: &str) -> String {
        case_safe_id(id).to_string()
    }
}

/// Truncate an 18-character id to 15 characters; any other input is returned unchanged.
pub fn case_safe_id(id: &str) -> &str {
    if id.len() == 18 && id.is_ascii() {
        &id[..15]
    } else {
        id
    }
}
