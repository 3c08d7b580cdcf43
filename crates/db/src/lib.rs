pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, ping, DbPool};
pub use repositories::{
    InMemoryBlocklistRepository, InMemoryGuildConfigRepository, InMemoryShowcaseStore,
    InMemoryUserConfigRepository, RepositoryError, SqlBlocklistRepository,
    SqlGuildConfigRepository, SqlShowcaseStore, SqlUserConfigRepository,
};
