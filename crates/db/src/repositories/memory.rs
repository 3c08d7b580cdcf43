use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use homecord_core::domain::blocklist::{BlockType, BlocklistEntry, MAX_BLOCKED_PER_TYPE};
use homecord_core::domain::guild::{GuildActivityConfig, UserPrivacy};
use homecord_core::domain::ids::{ChannelId, ContentId, GuildId, UserId};
use homecord_core::domain::showcase::{ShowcaseCategory, ShowcaseLimits, ShowcasedItem};
use homecord_core::ports::{
    BlocklistRepository, GuildConfigRepository, ShowcaseStore, StoreError, UserConfigRepository,
};
use homecord_core::Clock;

/// Showcase store held in process memory. The write lock makes each insert atomic.
/// Expired entries stay until purged but are invisible to reads and checks.
pub struct InMemoryShowcaseStore {
    items: RwLock<Vec<ShowcasedItem>>,
    limits: ShowcaseLimits,
    clock: Arc<dyn Clock>,
}

impl InMemoryShowcaseStore {
    pub fn new(limits: ShowcaseLimits, clock: Arc<dyn Clock>) -> Self {
        Self { items: RwLock::new(Vec::new()), limits, clock }
    }

    fn live<'a>(
        &self,
        items: &'a [ShowcasedItem],
        guild_id: &'a GuildId,
    ) -> impl Iterator<Item = &'a ShowcasedItem> + 'a {
        let now = self.clock.now();
        items.iter().filter(move |item| &item.guild_id == guild_id && !item.is_expired(now))
    }

    async fn remove_where(&self, predicate: impl Fn(&ShowcasedItem) -> bool) -> u64 {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|item| !predicate(item));
        (before - items.len()) as u64
    }
}

#[async_trait]
impl ShowcaseStore for InMemoryShowcaseStore {
    async fn count(
        &self,
        guild_id: &GuildId,
        category: ShowcaseCategory,
    ) -> Result<u32, StoreError> {
        let items = self.items.read().await;
        let count = self.live(&items, guild_id).filter(|item| item.category == category).count();
        Ok(count as u32)
    }

    async fn exists(
        &self,
        guild_id: &GuildId,
        content_id: &ContentId,
        categories: &[ShowcaseCategory],
    ) -> Result<bool, StoreError> {
        let items = self.items.read().await;
        let found = self
            .live(&items, guild_id)
            .any(|item| &item.content_id == content_id && categories.contains(&item.category));
        Ok(found)
    }

    async fn insert(&self, item: ShowcasedItem) -> Result<(), StoreError> {
        let mut items = self.items.write().await;
        let conflicting = item.category.conflicting();
        if self.live(&items, &item.guild_id).any(|existing| {
            existing.content_id == item.content_id && conflicting.contains(&existing.category)
        }) {
            return Err(StoreError::Duplicate);
        }
        let used = self
            .live(&items, &item.guild_id)
            .filter(|existing| existing.category == item.category)
            .count() as u32;
        if used >= self.limits.for_category(item.category) {
            return Err(StoreError::CapacityExceeded);
        }
        items.push(item);
        Ok(())
    }

    async fn delete_by_content_id(
        &self,
        content_id: &ContentId,
        categories: &[ShowcaseCategory],
    ) -> Result<u64, StoreError> {
        Ok(self
            .remove_where(|item| {
                &item.content_id == content_id && categories.contains(&item.category)
            })
            .await)
    }

    async fn delete_by_channel_id(&self, channel_id: &ChannelId) -> Result<u64, StoreError> {
        Ok(self
            .remove_where(|item| {
                item.channel_id.as_ref() == Some(channel_id) || item.content_id.0 == channel_id.0
            })
            .await)
    }

    async fn delete_for_guild(&self, guild_id: &GuildId) -> Result<u64, StoreError> {
        Ok(self.remove_where(|item| &item.guild_id == guild_id).await)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(self.remove_where(|item| item.is_expired(now)).await)
    }

    async fn list_for_guild(&self, guild_id: &GuildId) -> Result<Vec<ShowcasedItem>, StoreError> {
        let items = self.items.read().await;
        Ok(self.live(&items, guild_id).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryGuildConfigRepository {
    configs: RwLock<HashMap<String, GuildActivityConfig>>,
}

#[async_trait]
impl GuildConfigRepository for InMemoryGuildConfigRepository {
    async fn find(&self, guild_id: &GuildId) -> Result<Option<GuildActivityConfig>, StoreError> {
        let configs = self.configs.read().await;
        Ok(configs.get(&guild_id.0).cloned())
    }

    async fn create(&self, config: GuildActivityConfig) -> Result<(), StoreError> {
        let mut configs = self.configs.write().await;
        if configs.contains_key(&config.guild_id.0) {
            return Err(StoreError::Duplicate);
        }
        configs.insert(config.guild_id.0.clone(), config);
        Ok(())
    }

    async fn save(&self, config: GuildActivityConfig) -> Result<(), StoreError> {
        let mut configs = self.configs.write().await;
        configs.insert(config.guild_id.0.clone(), config);
        Ok(())
    }

    async fn delete(&self, guild_id: &GuildId) -> Result<bool, StoreError> {
        let mut configs = self.configs.write().await;
        Ok(configs.remove(&guild_id.0).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryUserConfigRepository {
    users: RwLock<HashMap<String, UserPrivacy>>,
}

#[async_trait]
impl UserConfigRepository for InMemoryUserConfigRepository {
    async fn find(&self, user_id: &UserId) -> Result<Option<UserPrivacy>, StoreError> {
        let users = self.users.read().await;
        Ok(users.get(&user_id.0).cloned())
    }

    async fn save(&self, privacy: UserPrivacy) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        users.insert(privacy.user_id.0.clone(), privacy);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryBlocklistRepository {
    entries: RwLock<Vec<BlocklistEntry>>,
}

#[async_trait]
impl BlocklistRepository for InMemoryBlocklistRepository {
    async fn any_blocked(
        &self,
        guild_id: &GuildId,
        item_ids: &[String],
    ) -> Result<bool, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .any(|entry| &entry.guild_id == guild_id && item_ids.contains(&entry.item_id)))
    }

    async fn list(
        &self,
        guild_id: &GuildId,
        block_type: Option<BlockType>,
    ) -> Result<Vec<BlocklistEntry>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|entry| &entry.guild_id == guild_id)
            .filter(|entry| block_type.map_or(true, |wanted| wanted == entry.block_type))
            .cloned()
            .collect())
    }

    async fn add(&self, entry: BlocklistEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        if entries
            .iter()
            .any(|existing| existing.guild_id == entry.guild_id && existing.item_id == entry.item_id)
        {
            return Err(StoreError::Duplicate);
        }
        let used = entries
            .iter()
            .filter(|existing| {
                existing.guild_id == entry.guild_id && existing.block_type == entry.block_type
            })
            .count() as u32;
        if used >= MAX_BLOCKED_PER_TYPE {
            return Err(StoreError::CapacityExceeded);
        }
        entries.push(entry);
        Ok(())
    }

    async fn remove_item(&self, guild_id: &GuildId, item_id: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|entry| !(&entry.guild_id == guild_id && entry.item_id == item_id));
        Ok(entries.len() != before)
    }

    async fn delete_for_guild(&self, guild_id: &GuildId) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|entry| &entry.guild_id != guild_id);
        Ok((before - entries.len()) as u64)
    }
}
