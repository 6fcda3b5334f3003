//! Parquet fixture helpers shared by the engine tests.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Float64Builder, RecordBatch, StringArray, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

pub(crate) type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

fn write_batch(path: &Path, schema: Schema, batch: RecordBatch) -> TestResult {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, Arc::new(schema), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// Write a shard with two string columns named `(first, second)`.
pub(crate) fn write_string_shard(
    path: &Path,
    column_names: (&str, &str),
    rows: &[(&str, &str)],
) -> TestResult {
    let mut first = StringBuilder::new();
    let mut second = StringBuilder::new();
    for (a, b) in rows {
        first.append_value(a);
        second.append_value(b);
    }

    let schema = Schema::new(vec![
        Field::new(column_names.0, DataType::Utf8, false),
        Field::new(column_names.1, DataType::Utf8, false),
    ]);
    let batch = RecordBatch::try_new(
        Arc::new(schema.clone()),
        vec![Arc::new(first.finish()) as _, Arc::new(second.finish()) as _],
    )?;

    write_batch(path, schema, batch)
}

/// Write a shard with `rows` generated rows, values `<col>-<tag>-<i>`.
pub(crate) fn write_numbered_shard(
    path: &Path,
    column_names: (&str, &str),
    tag: &str,
    rows: usize,
) -> TestResult {
    let owned: Vec<(String, String)> = (0..rows)
        .map(|i| (format!("url-{tag}-{i}"), format!("text-{tag}-{i}")))
        .collect();
    let borrowed: Vec<(&str, &str)> = owned
        .iter()
        .map(|(a, b)| (a.as_str(), b.as_str()))
        .collect();
    write_string_shard(path, column_names, &borrowed)
}

/// Write a shard whose second column is Float64 instead of Utf8.
pub(crate) fn write_string_float_shard(
    path: &Path,
    string_column: &str,
    float_column: &str,
    rows: &[(&str, f64)],
) -> TestResult {
    let mut first = StringBuilder::new();
    let mut second = Float64Builder::with_capacity(rows.len());
    for (a, b) in rows {
        first.append_value(a);
        second.append_value(*b);
    }

    let schema = Schema::new(vec![
        Field::new(string_column, DataType::Utf8, false),
        Field::new(float_column, DataType::Float64, false),
    ]);
    let batch = RecordBatch::try_new(
        Arc::new(schema.clone()),
        vec![Arc::new(first.finish()) as _, Arc::new(second.finish()) as _],
    )?;

    write_batch(path, schema, batch)
}

/// Column names of a parquet file, in file order.
pub(crate) fn read_column_names(path: &Path) -> TestResult<Vec<String>> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    Ok(builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect())
}

/// All rows of a two-string-column parquet file, in row order.
pub(crate) fn read_string_rows(path: &Path) -> TestResult<Vec<(String, String)>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?.build()?;

    let mut out = Vec::new();
    for batch in reader {
        let batch = batch?;
        let first = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or("first column is not a string array")?;
        let second = batch
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or("second column is not a string array")?;
        for i in 0..batch.num_rows() {
            out.push((first.value(i).to_string(), second.value(i).to_string()));
        }
    }
    Ok(out)
}
