//! The shard consolidation engine.
//!
//! [`SubsetWriter`] owns the single output file and the running row budget
//! for one consolidation run. Shards are appended one at a time:
//!
//! - the schema is read from the parquet footer, without touching data pages,
//! - the requested logical columns are resolved against it,
//! - only the resolved columns are decoded, streaming batch by batch into
//!   the output, so at most one batch of one shard's projected data is held
//!   in memory.
//!
//! The output file is created lazily on the first shard that resolves, so a
//! run that never resolves anything leaves no file behind. Its schema is
//! pinned to that first shard's resolved projection; later shards must match
//! it exactly. A positive row budget can split mid-shard: the overflowing
//! batch is sliced from its start to exactly fill the remainder.
//!
//! [`build_subset`] is the whole-run entry point: it sorts the shard paths
//! ascending, appends each shard until the budget is exhausted, and
//! finalizes the output. Output row order is therefore a deterministic
//! function of the shard path names, independent of input order.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::{FieldRef, SchemaRef};
use arrow::error::ArrowError;
use log::warn;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::{ArrowWriter, ProjectionMask};
use parquet::errors::ParquetError;
use snafu::prelude::*;

use crate::resolve::resolve_columns;
use crate::schema::{PinnedProjection, ProjectionMismatchError};

/// Errors raised while consolidating shards into a subset file.
#[derive(Debug, Snafu)]
pub enum SubsetError {
    /// A shard file could not be opened for reading.
    #[snafu(display("Failed to open shard {}: {source}", path.display()))]
    OpenShard {
        /// Path of the shard.
        path: PathBuf,
        /// Underlying filesystem error.
        source: std::io::Error,
    },

    /// The parquet reader rejected a shard.
    #[snafu(display("Parquet read error for {}: {source}", path.display()))]
    ParquetRead {
        /// Path of the shard.
        path: PathBuf,
        /// Parquet error emitted by the reader.
        source: ParquetError,
    },

    /// No requested logical column resolved against a shard's schema.
    #[snafu(display(
        "None of requested columns [{}] found in {}; available: [{}]",
        requested.join(", "),
        path.display(),
        available.join(", ")
    ))]
    NoColumnsResolved {
        /// Path of the shard that failed resolution.
        path: PathBuf,
        /// Logical column names the caller requested.
        requested: Vec<String>,
        /// Column names actually present in the shard.
        available: Vec<String>,
    },

    /// A later shard resolved to a different projection than the pinned one.
    #[snafu(display("Projection drift in {}: {source}", path.display()))]
    ProjectionDrift {
        /// Path of the diverging shard.
        path: PathBuf,
        /// Detail of the divergence.
        source: ProjectionMismatchError,
    },

    /// Arrow failed to decode or rebuild a record batch.
    #[snafu(display("Arrow error while reading {}: {source}", path.display()))]
    ArrowRead {
        /// Path of the shard being read.
        path: PathBuf,
        /// Arrow error emitted while decoding.
        source: ArrowError,
    },

    /// The output parent directory could not be created.
    #[snafu(display("Failed to create output directory {}: {source}", path.display()))]
    CreateOutputDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying filesystem error.
        source: std::io::Error,
    },

    /// The output file could not be created.
    #[snafu(display("Failed to create output file {}: {source}", path.display()))]
    CreateOutput {
        /// Path of the output file.
        path: PathBuf,
        /// Underlying filesystem error.
        source: std::io::Error,
    },

    /// The parquet writer rejected a write or failed to finalize.
    #[snafu(display("Parquet write error for {}: {source}", path.display()))]
    ParquetWrite {
        /// Path of the output file.
        path: PathBuf,
        /// Parquet error emitted by the writer.
        source: ParquetError,
    },
}

/// Result alias for subset operations.
pub type SubsetResult<T> = Result<T, SubsetError>;

/// Caller-facing knobs for one consolidation run.
#[derive(Debug, Clone)]
pub struct SubsetOptions {
    /// Logical column names to keep, in output order.
    pub columns: Vec<String>,
    /// Maximum total rows across all shards; `0` disables the cap.
    pub max_rows: u64,
}

/// Per-shard outcome returned by [`SubsetWriter::append_shard`].
#[derive(Debug, Clone)]
pub struct ShardAppend {
    /// Shard that was consumed.
    pub shard: PathBuf,
    /// Actual column names read from the shard, in output order.
    pub resolved: Vec<String>,
    /// Requested logical names that matched nothing in this shard.
    pub dropped: Vec<String>,
    /// Rows this shard contributed, after any budget truncation.
    pub rows_appended: u64,
    /// Cumulative rows written across the run so far.
    pub rows_total: u64,
    /// True when the shard was cut short to fit the row budget.
    pub truncated: bool,
}

/// Final outcome of a consolidation run that created an output file.
#[derive(Debug, Clone)]
pub struct SubsetSummary {
    /// Path of the output parquet file.
    pub path: PathBuf,
    /// Total rows written.
    pub rows_written: u64,
    /// Number of shards that contributed a resolved projection.
    pub shards_consumed: usize,
}

/// Run-scoped consolidation context: the lazily-created output writer plus
/// the running row counter.
///
/// The output file is created on the first [`append_shard`] that resolves at
/// least one column; its schema is pinned to that shard's resolved
/// projection. Dropping the context finalizes the output (footer included),
/// so partially-written output from a failed run is still a readable parquet
/// file. Call [`finish`] to finalize explicitly and observe close errors.
///
/// [`append_shard`]: SubsetWriter::append_shard
/// [`finish`]: SubsetWriter::finish
pub struct SubsetWriter {
    out_path: PathBuf,
    options: SubsetOptions,
    writer: Option<ArrowWriter<File>>,
    projection: Option<PinnedProjection>,
    rows_written: u64,
    shards_consumed: usize,
}

impl SubsetWriter {
    /// Create a consolidation context that will write to `out_path`.
    ///
    /// No file is created until the first shard resolves.
    pub fn create(out_path: impl Into<PathBuf>, options: SubsetOptions) -> Self {
        Self {
            out_path: out_path.into(),
            options,
            writer: None,
            projection: None,
            rows_written: 0,
            shards_consumed: 0,
        }
    }

    /// Rows written so far across all shards.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// True once a positive row budget has been filled.
    pub fn budget_exhausted(&self) -> bool {
        self.options.max_rows > 0 && self.rows_written >= self.options.max_rows
    }

    /// Append one shard's resolved projection to the output.
    ///
    /// Reads only the resolved columns, slicing the overflowing batch when
    /// the row budget would be exceeded. A shard where no requested column
    /// resolves is a hard error; so is a shard whose resolved projection
    /// diverges from the pinned one. Errors leave previously appended shards
    /// intact and the output finalizable.
    pub fn append_shard(&mut self, shard: &Path) -> SubsetResult<ShardAppend> {
        let file = File::open(shard).context(OpenShardSnafu { path: shard })?;
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(file).context(ParquetReadSnafu { path: shard })?;
        let shard_schema = builder.schema().clone();

        let resolved = resolve_columns(&shard_schema, &self.options.columns);

        if !resolved.dropped.is_empty() {
            warn!(
                "shard {}: no match for requested columns [{}]",
                shard.display(),
                resolved.dropped.join(", ")
            );
        }

        if resolved.is_empty() {
            return NoColumnsResolvedSnafu {
                path: shard,
                requested: self.options.columns.clone(),
                available: shard_schema
                    .fields()
                    .iter()
                    .map(|f| f.name().clone())
                    .collect::<Vec<_>>(),
            }
            .fail();
        }

        let mut fields: Vec<FieldRef> = Vec::with_capacity(resolved.actual.len());
        for name in &resolved.actual {
            let field = shard_schema
                .field_with_name(name)
                .context(ArrowReadSnafu { path: shard })?;
            fields.push(Arc::new(field.clone()));
        }

        let out_schema = match &self.projection {
            Some(pinned) => {
                pinned
                    .ensure_match(&fields)
                    .context(ProjectionDriftSnafu { path: shard })?;
                pinned.schema()
            }
            None => {
                let pinned = PinnedProjection::new(fields);
                let schema = pinned.schema();
                self.projection = Some(pinned);
                schema
            }
        };

        if self.writer.is_none() {
            self.writer = Some(open_output(&self.out_path, out_schema.clone())?);
        }

        let mask = ProjectionMask::columns(
            builder.parquet_schema(),
            resolved.actual.iter().map(|s| s.as_str()),
        );
        let reader = builder
            .with_projection(mask)
            .build()
            .context(ParquetReadSnafu { path: shard })?;

        let max_rows = self.options.max_rows;
        let rows_before = self.rows_written;
        let mut appended: u64 = 0;
        let mut truncated = false;

        for batch in reader {
            let batch = batch.context(ArrowReadSnafu { path: shard })?;
            if batch.num_rows() == 0 {
                continue;
            }

            let mut take = batch.num_rows() as u64;
            if max_rows > 0 {
                let remaining = max_rows.saturating_sub(rows_before + appended);
                if remaining == 0 {
                    truncated = true;
                    break;
                }
                if take > remaining {
                    take = remaining;
                    truncated = true;
                }
            }

            let sliced = if take as usize == batch.num_rows() {
                batch
            } else {
                batch.slice(0, take as usize)
            };
            let out = project_batch(&sliced, &resolved.actual, out_schema.clone(), shard)?;
            if let Some(writer) = self.writer.as_mut() {
                writer.write(&out).context(ParquetWriteSnafu {
                    path: &self.out_path,
                })?;
            }
            appended += take;
        }

        self.rows_written = rows_before + appended;
        self.shards_consumed += 1;

        Ok(ShardAppend {
            shard: shard.to_path_buf(),
            resolved: resolved.actual,
            dropped: resolved.dropped,
            rows_appended: appended,
            rows_total: self.rows_written,
            truncated,
        })
    }

    /// Finalize the output, writing the parquet footer.
    ///
    /// Returns `Ok(None)` when no shard ever resolved, in which case no file
    /// was created.
    pub fn finish(mut self) -> SubsetResult<Option<SubsetSummary>> {
        match self.writer.take() {
            Some(writer) => {
                writer.close().context(ParquetWriteSnafu {
                    path: &self.out_path,
                })?;
                Ok(Some(SubsetSummary {
                    path: self.out_path.clone(),
                    rows_written: self.rows_written,
                    shards_consumed: self.shards_consumed,
                }))
            }
            None => Ok(None),
        }
    }
}

impl Drop for SubsetWriter {
    fn drop(&mut self) {
        // Failure paths still get a footer; partial output stays readable.
        if let Some(writer) = self.writer.take() {
            let _ = writer.close();
        }
    }
}

fn open_output(out_path: &Path, schema: SchemaRef) -> SubsetResult<ArrowWriter<File>> {
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context(CreateOutputDirSnafu { path: parent })?;
        }
    }

    let file = File::create(out_path).context(CreateOutputSnafu { path: out_path })?;
    ArrowWriter::try_new(file, schema, None).context(ParquetWriteSnafu { path: out_path })
}

/// Rebuild `batch` with columns in resolved request order against the pinned
/// output schema. Also normalizes schema-level metadata differences between
/// shards written by different producers.
fn project_batch(
    batch: &RecordBatch,
    columns: &[String],
    schema: SchemaRef,
    shard: &Path,
) -> SubsetResult<RecordBatch> {
    let batch_schema = batch.schema();
    let mut arrays = Vec::with_capacity(columns.len());
    for name in columns {
        let idx = batch_schema
            .index_of(name)
            .context(ArrowReadSnafu { path: shard })?;
        arrays.push(batch.column(idx).clone());
    }

    RecordBatch::try_new(schema, arrays).context(ArrowReadSnafu { path: shard })
}

/// Consolidate `shards` into a single parquet file at `out_path`.
///
/// Shards are consumed in ascending lexicographic order of their path,
/// regardless of input order; consumption stops as soon as a positive row
/// budget is filled. Returns `Ok(None)` when no data was written (empty
/// shard list). The output resource is finalized on every exit path,
/// including a resolution or I/O failure after earlier shards were already
/// appended; the partial output is kept, not rolled back.
pub fn build_subset(
    shards: &[PathBuf],
    out_path: &Path,
    options: &SubsetOptions,
) -> SubsetResult<Option<SubsetSummary>> {
    let mut ordered: Vec<&PathBuf> = shards.iter().collect();
    ordered.sort();

    let mut writer = SubsetWriter::create(out_path, options.clone());
    for shard in ordered {
        if writer.budget_exhausted() {
            break;
        }
        writer.append_shard(shard)?;
    }
    writer.finish()
}
