use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

/// Parsed MongoDB connection settings.
#[derive(Clone)]
pub struct MongoConfig {
    /// Parsed client options for the deployment.
    pub options: ClientOptions,
    /// Database holding the game collections.
    pub database_name: String,
}

impl MongoConfig {
    /// Parse a connection URI, defaulting the database name when unset.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or("escape_hunt").to_owned();
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        Ok(Self {
            options,
            database_name,
        })
    }
}
