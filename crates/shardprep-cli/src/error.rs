use shardprep_core::subset::SubsetError;
use snafu::Snafu;

use crate::hub::FetchError;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("Shard download failed: {source}"))]
    Fetch { source: FetchError },

    #[snafu(display("Subset build failed: {source}"))]
    Subset { source: SubsetError },
}
