//! MongoDB-backed event store.

mod config;
mod connection;
mod error;
mod models;
/// The store implementation itself.
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoEventStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
