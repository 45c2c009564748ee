use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised by the MongoDB backend, scoped per operation so logs say
/// which collection misbehaved.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("write to collection `{collection}` failed")]
    Write {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("read from collection `{collection}` failed")]
    Read {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("delete from collection `{collection}` failed")]
    Delete {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
}
