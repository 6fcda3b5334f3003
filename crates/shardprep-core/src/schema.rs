//! Output projection pinning and drift detection.
//!
//! Resolution runs per shard, so two shards read under the same logical
//! request may legally resolve to different actual columns. Appending both
//! to one file would produce mixed-schema output, so the resolved projection
//! of the first written shard is pinned and every later shard must resolve
//! to the same actual columns, in the same order, with the same Arrow type
//! and nullability. Divergence is a typed error, not a silent append.

use std::sync::Arc;

use arrow::datatypes::{FieldRef, Schema, SchemaRef};
use snafu::prelude::*;

/// Errors raised when a shard's resolved projection diverges from the pinned one.
#[derive(Debug, Snafu)]
pub enum ProjectionMismatchError {
    /// The shard resolved to a different set or order of actual columns.
    #[snafu(display(
        "resolved columns [{}] do not match pinned projection [{}]",
        found.join(", "),
        expected.join(", ")
    ))]
    ColumnSet {
        /// Actual column names the pinned projection expects, in order.
        expected: Vec<String>,
        /// Actual column names this shard resolved to, in order.
        found: Vec<String>,
    },

    /// A resolved column carries a different Arrow type or nullability.
    #[snafu(display("column {column}: pinned projection has {expected}, shard has {found}"))]
    FieldMismatch {
        /// Name of the diverging column.
        column: String,
        /// Type and nullability recorded in the pinned projection.
        expected: String,
        /// Type and nullability found in the shard.
        found: String,
    },
}

fn describe(field: &FieldRef) -> String {
    format!("{} (nullable: {})", field.data_type(), field.is_nullable())
}

/// The output projection pinned from the first successfully written shard.
///
/// Holds the Arrow schema the output file is created with. All later shards
/// are checked against it via [`ensure_match`] before any of their data is
/// decoded.
///
/// [`ensure_match`]: PinnedProjection::ensure_match
#[derive(Debug, Clone)]
pub struct PinnedProjection {
    schema: SchemaRef,
}

impl PinnedProjection {
    /// Pin a projection from the first shard's resolved fields, in resolved order.
    pub fn new(fields: Vec<FieldRef>) -> Self {
        Self {
            schema: Arc::new(Schema::new(fields)),
        }
    }

    /// The Arrow schema of the output file.
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// Require a later shard's resolved fields to match this projection exactly.
    ///
    /// Order-sensitive on names; strict on data type and nullability. Field
    /// metadata is ignored so files produced by different writers still
    /// compare equal.
    pub fn ensure_match(&self, fields: &[FieldRef]) -> Result<(), ProjectionMismatchError> {
        let expected: Vec<String> = self
            .schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        let found: Vec<String> = fields.iter().map(|f| f.name().clone()).collect();
        if expected != found {
            return ColumnSetSnafu { expected, found }.fail();
        }

        for (pinned, field) in self.schema.fields().iter().zip(fields) {
            if pinned.data_type() != field.data_type()
                || pinned.is_nullable() != field.is_nullable()
            {
                return FieldMismatchSnafu {
                    column: pinned.name().clone(),
                    expected: describe(pinned),
                    found: describe(field),
                }
                .fail();
            }
        }

        Ok(())
    }
}
