//! Storage and platform seams the engine depends on.
//!
//! SQL and in-memory implementations live in `homecord-db`; the REST lookup lives in
//! `homecord-gateway`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::blocklist::{BlockType, BlocklistEntry};
use crate::domain::content::{
    ChannelSnapshot, MemberSnapshot, MessageSnapshot, ScheduledEventSnapshot,
};
use crate::domain::guild::{GuildActivityConfig, UserPrivacy};
use crate::domain::ids::{ChannelId, ContentId, GuildId, UserId};
use crate::domain::showcase::{ShowcaseCategory, ShowcasedItem};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("record already exists")]
    Duplicate,
    #[error("collection is at capacity")]
    CapacityExceeded,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("platform object not found: {0}")]
    NotFound(String),
    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

/// Durable set of showcased items, bounded per guild and category.
///
/// `insert` is the single authority for uniqueness and capacity. Concurrent inserts of the
/// same content must leave exactly one row; the loser gets [`StoreError::Duplicate`].
#[async_trait]
pub trait ShowcaseStore: Send + Sync {
    async fn count(&self, guild_id: &GuildId, category: ShowcaseCategory)
        -> Result<u32, StoreError>;

    async fn exists(
        &self,
        guild_id: &GuildId,
        content_id: &ContentId,
        categories: &[ShowcaseCategory],
    ) -> Result<bool, StoreError>;

    async fn insert(&self, item: ShowcasedItem) -> Result<(), StoreError>;

    async fn delete_by_content_id(
        &self,
        content_id: &ContentId,
        categories: &[ShowcaseCategory],
    ) -> Result<u64, StoreError>;

    /// Removes items posted in the channel as well as an item that is the channel itself.
    async fn delete_by_channel_id(&self, channel_id: &ChannelId) -> Result<u64, StoreError>;

    async fn delete_for_guild(&self, guild_id: &GuildId) -> Result<u64, StoreError>;

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn list_for_guild(&self, guild_id: &GuildId) -> Result<Vec<ShowcasedItem>, StoreError>;
}

#[async_trait]
pub trait GuildConfigRepository: Send + Sync {
    async fn find(&self, guild_id: &GuildId) -> Result<Option<GuildActivityConfig>, StoreError>;
    /// Fails with [`StoreError::Duplicate`] when the guild already has a row.
    async fn create(&self, config: GuildActivityConfig) -> Result<(), StoreError>;
    async fn save(&self, config: GuildActivityConfig) -> Result<(), StoreError>;
    async fn delete(&self, guild_id: &GuildId) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait UserConfigRepository: Send + Sync {
    async fn find(&self, user_id: &UserId) -> Result<Option<UserPrivacy>, StoreError>;
    async fn save(&self, privacy: UserPrivacy) -> Result<(), StoreError>;
}

#[async_trait]
pub trait BlocklistRepository: Send + Sync {
    /// True when any of `item_ids` is blocked in the guild, whatever its block type.
    async fn any_blocked(&self, guild_id: &GuildId, item_ids: &[String])
        -> Result<bool, StoreError>;

    async fn list(
        &self,
        guild_id: &GuildId,
        block_type: Option<BlockType>,
    ) -> Result<Vec<BlocklistEntry>, StoreError>;

    /// Enforces [`crate::domain::blocklist::MAX_BLOCKED_PER_TYPE`].
    async fn add(&self, entry: BlocklistEntry) -> Result<(), StoreError>;

    async fn remove_item(&self, guild_id: &GuildId, item_id: &str) -> Result<bool, StoreError>;

    async fn delete_for_guild(&self, guild_id: &GuildId) -> Result<u64, StoreError>;
}

/// Live lookups against the community platform.
#[async_trait]
pub trait PlatformLookup: Send + Sync {
    async fn fetch_message(
        &self,
        channel_id: &ChannelId,
        message_id: &ContentId,
    ) -> Result<MessageSnapshot, PlatformError>;

    /// `Ok(None)` when the user is no longer a member of the guild.
    async fn fetch_member(
        &self,
        guild_id: &GuildId,
        user_id: &UserId,
    ) -> Result<Option<MemberSnapshot>, PlatformError>;

    async fn fetch_channel(&self, channel_id: &ChannelId) -> Result<ChannelSnapshot, PlatformError>;

    async fn fetch_scheduled_event(
        &self,
        guild_id: &GuildId,
        event_id: &ContentId,
    ) -> Result<ScheduledEventSnapshot, PlatformError>;
}
