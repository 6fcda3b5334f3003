//! CLI tool for fetching dataset metadata shards and consolidating a column
//! subset into a single parquet file.

mod error;
mod hub;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use shardprep_core::subset::{SubsetOptions, SubsetSummary, SubsetWriter};
use snafu::ResultExt;

use crate::error::{CliResult, FetchSnafu, SubsetSnafu};
use crate::hub::HubClient;

const DEFAULT_REPO_ID: &str = "laion/laion400m-met-release";
const DEFAULT_SHARDS: &str = "part-00000-4227e361-38e7-40d5-8822-c6db46ea077c-c000.snappy.parquet";
const DEFAULT_COLUMNS: &str = "URL,TEXT";
const HF_TOKEN_ENV: &str = "HF_TOKEN";

#[derive(Debug, Subcommand)]
enum Command {
    /// Download shards and build the column subset in one run
    Prepare {
        /// Hugging Face dataset repo id holding the shards
        #[arg(long = "repo-id", default_value = DEFAULT_REPO_ID)]
        repo_id: String,

        /// Comma-separated shard filenames, exactly as named in the repo
        #[arg(long, default_value = DEFAULT_SHARDS)]
        shards: String,

        /// Directory where downloaded shards are materialized
        #[arg(long = "out-dir", default_value = "./laion_meta")]
        out_dir: PathBuf,

        /// Output parquet path for the consolidated subset
        #[arg(long = "out-parquet", default_value = "./laion_meta/laion_subset.parquet")]
        out_parquet: PathBuf,

        /// Cap on total output rows (0 keeps every row)
        #[arg(long = "max-rows", default_value_t = 0)]
        max_rows: u64,

        /// Comma-separated logical columns to keep
        #[arg(long, default_value = DEFAULT_COLUMNS)]
        columns: String,

        /// Hugging Face access token for gated datasets (default: HF_TOKEN env var)
        #[arg(long = "hf-token")]
        hf_token: Option<String>,
    },

    /// Download shards without building a subset
    Fetch {
        #[arg(long = "repo-id", default_value = DEFAULT_REPO_ID)]
        repo_id: String,

        #[arg(long, default_value = DEFAULT_SHARDS)]
        shards: String,

        #[arg(long = "out-dir", default_value = "./laion_meta")]
        out_dir: PathBuf,

        #[arg(long = "hf-token")]
        hf_token: Option<String>,
    },

    /// Build a subset from shard files already on local disk
    Build {
        /// Local shard path (repeatable)
        #[arg(long = "parquet", required = true)]
        parquet: Vec<PathBuf>,

        #[arg(long = "out-parquet")]
        out_parquet: PathBuf,

        #[arg(long = "max-rows", default_value_t = 0)]
        max_rows: u64,

        #[arg(long, default_value = DEFAULT_COLUMNS)]
        columns: String,
    },
}

#[derive(Debug, Parser)]
#[command(
    name = "shardprep",
    about = "Download dataset metadata shards and build a combined parquet \
             with a chosen column subset, optionally capped at a row count."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn resolve_token(flag: Option<String>) -> Option<String> {
    flag.or_else(|| std::env::var(HF_TOKEN_ENV).ok())
}

async fn fetch_shards(
    repo_id: &str,
    shards: &[String],
    out_dir: &Path,
    token: Option<String>,
) -> CliResult<Vec<PathBuf>> {
    let client = HubClient::new(repo_id, token).context(FetchSnafu)?;

    let mut local_paths = Vec::with_capacity(shards.len());
    for shard in shards {
        let fetched = client.fetch(shard, out_dir).await.context(FetchSnafu)?;
        if fetched.downloaded {
            println!("Downloaded {} -> {}", shard, fetched.path.display());
        } else {
            println!("Using cached {} -> {}", shard, fetched.path.display());
        }
        local_paths.push(fetched.path);
    }
    Ok(local_paths)
}

/// Consolidate `shards` into `out_parquet`, printing a progress line per
/// consumed shard. Sorts ascending by path, mirroring the engine's own
/// ordering contract.
fn build_with_progress(
    shards: &[PathBuf],
    out_parquet: &Path,
    options: SubsetOptions,
) -> CliResult<Option<SubsetSummary>> {
    let mut ordered: Vec<PathBuf> = shards.to_vec();
    ordered.sort();

    let mut writer = SubsetWriter::create(out_parquet, options);
    for shard in &ordered {
        if writer.budget_exhausted() {
            break;
        }
        let outcome = writer.append_shard(shard).context(SubsetSnafu)?;
        println!("Wrote {} rows so far", outcome.rows_total);
    }
    writer.finish().context(SubsetSnafu)
}

fn report_summary(summary: Option<SubsetSummary>) {
    match summary {
        Some(s) => println!("Final output: {}, rows: {}", s.path.display(), s.rows_written),
        None => println!("No data written (no shards?)"),
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Prepare {
            repo_id,
            shards,
            out_dir,
            out_parquet,
            max_rows,
            columns,
            hf_token,
        } => {
            let shard_names = split_csv(&shards);
            let columns = split_csv(&columns);
            let token = resolve_token(hf_token);

            let local = fetch_shards(&repo_id, &shard_names, &out_dir, token).await?;
            let summary =
                build_with_progress(&local, &out_parquet, SubsetOptions { columns, max_rows })?;
            report_summary(summary);
            Ok(())
        }

        Command::Fetch {
            repo_id,
            shards,
            out_dir,
            hf_token,
        } => {
            let shard_names = split_csv(&shards);
            let token = resolve_token(hf_token);
            fetch_shards(&repo_id, &shard_names, &out_dir, token).await?;
            Ok(())
        }

        Command::Build {
            parquet,
            out_parquet,
            max_rows,
            columns,
        } => {
            let summary = build_with_progress(
                &parquet,
                &out_parquet,
                SubsetOptions {
                    columns: split_csv(&columns),
                    max_rows,
                },
            )?;
            report_summary(summary);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run().await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
