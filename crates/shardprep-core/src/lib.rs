//! Consolidation engine for columnar dataset shards.
//!
//! This crate turns a set of local parquet shard files into a single output
//! parquet containing only a caller-requested subset of columns:
//!
//! - Logical column names are resolved against each shard's actual schema
//!   with a small fixed set of naming heuristics (`resolve` module), since
//!   shards of the same dataset release are not consistent about spelling.
//! - The first shard that resolves pins the output projection; later shards
//!   must resolve to the same columns, in the same order, with the same
//!   types (`schema` module).
//! - Shards stream into a lazily-created, append-only writer one batch at a
//!   time, under an optional global row budget that can split mid-shard
//!   (`subset` module).
//!
//! The engine is fully synchronous: one shard is read and appended at a
//! time, so output row order is a deterministic function of the shard path
//! names. Acquisition of remote shards and the command-line surface live in
//! the companion CLI crate.
#![deny(missing_docs)]
pub mod resolve;
pub mod schema;
pub mod subset;

#[cfg(test)]
mod test_util;
