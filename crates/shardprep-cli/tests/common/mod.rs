#![allow(missing_docs)]

use std::fs::File;
use std::io;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;

use arrow::array::{RecordBatch, StringArray, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub fn cli_bin() -> &'static str {
    env!("CARGO_BIN_EXE_shardprep")
}

pub fn run_cli(args: &[&str]) -> io::Result<Output> {
    Command::new(cli_bin()).args(args).output()
}

pub fn run_cli_strings(args: &[String]) -> io::Result<Output> {
    Command::new(cli_bin()).args(args).output()
}

pub fn assert_cli_success(output: &Output) {
    assert!(
        output.status.success(),
        "stdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Write a shard with two string columns named `(first, second)`.
pub fn write_shard(path: &Path, column_names: (&str, &str), rows: &[(&str, &str)]) -> TestResult {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

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

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, Arc::new(schema), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

pub fn read_rows(path: &Path) -> TestResult<Vec<(String, String)>> {
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

pub fn read_column_names(path: &Path) -> TestResult<Vec<String>> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    Ok(builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect())
}
