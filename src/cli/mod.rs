//! CLI command implementations.

pub mod commands;
pub mod delete;
pub mod import;
pub mod serve;

use hostdb::config::HostdbConfig;
use hostdb::storage::RedbRepository;
use hostdb::Result;

/// Open the configured database.
pub(crate) fn open_repository(config: &HostdbConfig) -> Result<RedbRepository> {
    tracing::debug!(path = %config.database.display(), "opening database");
    RedbRepository::open(&config.database)
}
