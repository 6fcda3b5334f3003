//! Logical-to-actual column name resolution.
//!
//! Shard files of the same dataset release are not consistent about column
//! naming: one drop spells a column `URL`, the next `url`, and older
//! metadata releases carry the text column as `caption`. Resolution maps the
//! caller's logical column names onto whatever a given shard actually has,
//! in request order, using a fixed precedence:
//!
//! 1. exact case-sensitive match,
//! 2. lowercase match,
//! 3. the `TEXT` -> `caption` alias.
//!
//! Names that match nothing are dropped *per shard*, not per run, and the
//! dropped set is reported so callers can surface it. Whether any column
//! resolved at all is the caller's concern; this module only computes the
//! mapping.

use arrow::datatypes::Schema;

/// Outcome of resolving a logical column request against one shard's schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    /// Actual column names present in the shard, in request order.
    pub actual: Vec<String>,
    /// Requested logical names that matched nothing in this shard.
    pub dropped: Vec<String>,
}

impl ResolvedColumns {
    /// True when no requested name resolved against the shard.
    pub fn is_empty(&self) -> bool {
        self.actual.is_empty()
    }
}

/// Resolve `requested` logical column names against a shard schema.
///
/// Two logical names resolving to the same actual column keep the first
/// occurrence only, so the resulting projection never repeats a column.
pub fn resolve_columns(schema: &Schema, requested: &[String]) -> ResolvedColumns {
    let mut actual: Vec<String> = Vec::with_capacity(requested.len());
    let mut dropped = Vec::new();

    let has = |name: &str| schema.fields().iter().any(|f| f.name().as_str() == name);

    for col in requested {
        let resolved = if has(col) {
            Some(col.clone())
        } else {
            let lower = col.to_lowercase();
            if has(&lower) {
                Some(lower)
            } else if col.to_uppercase() == "TEXT" && has("caption") {
                Some("caption".to_string())
            } else {
                None
            }
        };

        match resolved {
            Some(name) if !actual.contains(&name) => actual.push(name),
            // duplicate target, first request wins
            Some(_) => {}
            None => dropped.push(col.clone()),
        }
    }

    ResolvedColumns { actual, dropped }
}
