use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use homecord_core::ports::StoreError;

pub mod blocklist;
pub mod guild_config;
pub mod memory;
pub mod showcase;
pub mod user_config;

pub use blocklist::SqlBlocklistRepository;
pub use guild_config::SqlGuildConfigRepository;
pub use memory::{
    InMemoryBlocklistRepository, InMemoryGuildConfigRepository, InMemoryShowcaseStore,
    InMemoryUserConfigRepository,
};
pub use showcase::SqlShowcaseStore;
pub use user_config::SqlUserConfigRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(sqlx::Error::Database(error))
                if error.is_unique_violation() =>
            {
                StoreError::Duplicate
            }
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text.
pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

pub(crate) fn decode_column<T>(column: &str, value: Option<T>) -> Result<T, RepositoryError> {
    value.ok_or_else(|| RepositoryError::Decode(format!("unrecognized value in `{column}`")))
}
