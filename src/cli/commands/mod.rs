//! Subcommand implementations.

pub mod migrate;
pub mod serve;

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::storage::ConnectionPool;
use crate::store::TodoStore;

/// Open the configured database and make sure the schema is in place.
pub(crate) async fn open_store(config: &ServiceConfig) -> Result<TodoStore> {
    let pool = ConnectionPool::open(&config.database, config.pool);
    let store = TodoStore::new(pool).with_statement_timeout(config.statement_timeout);
    store.ensure_schema().await?;
    Ok(store)
}
