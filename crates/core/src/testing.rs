//! In-process fakes for the storage and platform ports, shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::RwLock;

use crate::clock::{Clock, ManualClock};
use crate::domain::blocklist::{BlockType, BlocklistEntry, MAX_BLOCKED_PER_TYPE};
use crate::domain::content::{
    AuthorSnapshot, ChannelKind, ChannelSnapshot, MemberSnapshot, MessageKind, MessageSnapshot,
    ScheduledEventSnapshot, ScheduledEventStatus,
};
use crate::domain::guild::{GuildActivityConfig, MessagePrivacy, UserPrivacy};
use crate::domain::ids::{ChannelId, ContentId, GuildId, RoleId, UserId};
use crate::domain::showcase::{ShowcaseCategory, ShowcaseLimits, ShowcaseType, ShowcasedItem};
use crate::ports::{
    BlocklistRepository, GuildConfigRepository, PlatformError, PlatformLookup, ShowcaseStore,
    StoreError, UserConfigRepository,
};

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("valid timestamp")
}

pub fn member(user: &str, roles: &[&str]) -> MemberSnapshot {
    MemberSnapshot {
        user_id: UserId(user.to_owned()),
        bot: false,
        roles: roles.iter().map(|r| RoleId((*r).to_owned())).collect(),
    }
}

pub fn thread(id: &str, parent: &str, owner: &str) -> ChannelSnapshot {
    ChannelSnapshot {
        id: ChannelId(id.to_owned()),
        guild_id: None,
        kind: ChannelKind::PublicThread,
        parent_id: Some(ChannelId(parent.to_owned())),
        owner_id: Some(UserId(owner.to_owned())),
        archived: false,
        created_at: Some(start_time() - Duration::hours(1)),
    }
}

pub fn text_channel(id: &str, category: Option<&str>) -> ChannelSnapshot {
    ChannelSnapshot {
        id: ChannelId(id.to_owned()),
        guild_id: None,
        kind: ChannelKind::Text,
        parent_id: category.map(|c| ChannelId(c.to_owned())),
        owner_id: None,
        archived: false,
        created_at: None,
    }
}

pub fn scheduled_event(guild_id: &GuildId, id: &str, user_count: u32) -> ScheduledEventSnapshot {
    ScheduledEventSnapshot {
        id: ContentId(id.to_owned()),
        guild_id: guild_id.clone(),
        channel_id: None,
        status: ScheduledEventStatus::Scheduled,
        user_count,
        scheduled_end_time: None,
    }
}

#[derive(Default)]
pub struct FakeShowcase {
    limits: ShowcaseLimits,
    items: RwLock<Vec<ShowcasedItem>>,
    failures_remaining: AtomicUsize,
    pub insert_attempts: AtomicUsize,
}

impl FakeShowcase {
    pub fn new(limits: ShowcaseLimits) -> Self {
        Self { limits, ..Self::default() }
    }

    /// The next `count` inserts fail with [`StoreError::Unavailable`].
    pub fn fail_next_inserts(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub async fn items(&self) -> Vec<ShowcasedItem> {
        self.items.read().await.clone()
    }
}

#[async_trait]
impl ShowcaseStore for FakeShowcase {
    async fn count(
        &self,
        guild_id: &GuildId,
        category: ShowcaseCategory,
    ) -> Result<u32, StoreError> {
        let items = self.items.read().await;
        Ok(items.iter().filter(|i| &i.guild_id == guild_id && i.category == category).count()
            as u32)
    }

    async fn exists(
        &self,
        guild_id: &GuildId,
        content_id: &ContentId,
        categories: &[ShowcaseCategory],
    ) -> Result<bool, StoreError> {
        let items = self.items.read().await;
        Ok(items.iter().any(|i| {
            &i.guild_id == guild_id && &i.content_id == content_id && categories.contains(&i.category)
        }))
    }

    async fn insert(&self, item: ShowcasedItem) -> Result<(), StoreError> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        // let concurrent callers interleave before the write lands
        tokio::task::yield_now().await;
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Unavailable("injected failure".to_owned()));
        }

        let mut items = self.items.write().await;
        if items.iter().any(|i| {
            i.guild_id == item.guild_id
                && i.content_id == item.content_id
                && item.category.conflicting().contains(&i.category)
        }) {
            return Err(StoreError::Duplicate);
        }
        let used = items
            .iter()
            .filter(|i| i.guild_id == item.guild_id && i.category == item.category)
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
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|i| !(&i.content_id == content_id && categories.contains(&i.category)));
        Ok((before - items.len()) as u64)
    }

    async fn delete_by_channel_id(&self, channel_id: &ChannelId) -> Result<u64, StoreError> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|i| i.channel_id.as_ref() != Some(channel_id) && i.content_id.0 != channel_id.0);
        Ok((before - items.len()) as u64)
    }

    async fn delete_for_guild(&self, guild_id: &GuildId) -> Result<u64, StoreError> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|i| &i.guild_id != guild_id);
        Ok((before - items.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|i| !i.is_expired(now));
        Ok((before - items.len()) as u64)
    }

    async fn list_for_guild(&self, guild_id: &GuildId) -> Result<Vec<ShowcasedItem>, StoreError> {
        let items = self.items.read().await;
        Ok(items.iter().filter(|i| &i.guild_id == guild_id).cloned().collect())
    }
}

#[derive(Default)]
pub struct FakeGuildConfigs {
    configs: RwLock<HashMap<GuildId, GuildActivityConfig>>,
}

#[async_trait]
impl GuildConfigRepository for FakeGuildConfigs {
    async fn find(&self, guild_id: &GuildId) -> Result<Option<GuildActivityConfig>, StoreError> {
        Ok(self.configs.read().await.get(guild_id).cloned())
    }

    async fn create(&self, config: GuildActivityConfig) -> Result<(), StoreError> {
        let mut configs = self.configs.write().await;
        if configs.contains_key(&config.guild_id) {
            return Err(StoreError::Duplicate);
        }
        configs.insert(config.guild_id.clone(), config);
        Ok(())
    }

    async fn save(&self, config: GuildActivityConfig) -> Result<(), StoreError> {
        self.configs.write().await.insert(config.guild_id.clone(), config);
        Ok(())
    }

    async fn delete(&self, guild_id: &GuildId) -> Result<bool, StoreError> {
        Ok(self.configs.write().await.remove(guild_id).is_some())
    }
}

#[derive(Default)]
pub struct FakeUsers {
    users: RwLock<HashMap<UserId, UserPrivacy>>,
}

#[async_trait]
impl UserConfigRepository for FakeUsers {
    async fn find(&self, user_id: &UserId) -> Result<Option<UserPrivacy>, StoreError> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn save(&self, privacy: UserPrivacy) -> Result<(), StoreError> {
        self.users.write().await.insert(privacy.user_id.clone(), privacy);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeBlocklist {
    entries: RwLock<Vec<BlocklistEntry>>,
}

#[async_trait]
impl BlocklistRepository for FakeBlocklist {
    async fn any_blocked(
        &self,
        guild_id: &GuildId,
        item_ids: &[String],
    ) -> Result<bool, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().any(|e| &e.guild_id == guild_id && item_ids.contains(&e.item_id)))
    }

    async fn list(
        &self,
        guild_id: &GuildId,
        block_type: Option<BlockType>,
    ) -> Result<Vec<BlocklistEntry>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| &e.guild_id == guild_id && block_type.map_or(true, |t| t == e.block_type))
            .cloned()
            .collect())
    }

    async fn add(&self, entry: BlocklistEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|e| e.guild_id == entry.guild_id && e.item_id == entry.item_id) {
            return Err(StoreError::Duplicate);
        }
        let used = entries
            .iter()
            .filter(|e| e.guild_id == entry.guild_id && e.block_type == entry.block_type)
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
        entries.retain(|e| !(&e.guild_id == guild_id && e.item_id == item_id));
        Ok(entries.len() != before)
    }

    async fn delete_for_guild(&self, guild_id: &GuildId) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| &e.guild_id != guild_id);
        Ok((before - entries.len()) as u64)
    }
}

#[derive(Default)]
pub struct FakePlatform {
    pub messages: RwLock<HashMap<ContentId, MessageSnapshot>>,
    pub members: RwLock<HashMap<UserId, MemberSnapshot>>,
    pub channels: RwLock<HashMap<ChannelId, ChannelSnapshot>>,
    pub events: RwLock<HashMap<ContentId, ScheduledEventSnapshot>>,
    pub event_fetches: AtomicUsize,
}

impl FakePlatform {
    pub async fn put_message(&self, message: MessageSnapshot) {
        self.messages.write().await.insert(message.id.clone(), message);
    }

    pub async fn put_member(&self, member: MemberSnapshot) {
        self.members.write().await.insert(member.user_id.clone(), member);
    }

    pub async fn put_channel(&self, channel: ChannelSnapshot) {
        self.channels.write().await.insert(channel.id.clone(), channel);
    }

    pub async fn put_event(&self, event: ScheduledEventSnapshot) {
        self.events.write().await.insert(event.id.clone(), event);
    }
}

#[async_trait]
impl PlatformLookup for FakePlatform {
    async fn fetch_message(
        &self,
        _channel_id: &ChannelId,
        message_id: &ContentId,
    ) -> Result<MessageSnapshot, PlatformError> {
        self.messages
            .read()
            .await
            .get(message_id)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("message {message_id}")))
    }

    async fn fetch_member(
        &self,
        _guild_id: &GuildId,
        user_id: &UserId,
    ) -> Result<Option<MemberSnapshot>, PlatformError> {
        Ok(self.members.read().await.get(user_id).cloned())
    }

    async fn fetch_channel(&self, channel_id: &ChannelId) -> Result<ChannelSnapshot, PlatformError> {
        self.channels
            .read()
            .await
            .get(channel_id)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("channel {channel_id}")))
    }

    async fn fetch_scheduled_event(
        &self,
        _guild_id: &GuildId,
        event_id: &ContentId,
    ) -> Result<ScheduledEventSnapshot, PlatformError> {
        self.event_fetches.fetch_add(1, Ordering::SeqCst);
        self.events
            .read()
            .await
            .get(event_id)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("event {event_id}")))
    }
}

/// One guild's worth of fakes wired to a shared manual clock.
pub struct Fixture {
    pub guild_id: GuildId,
    pub clock: Arc<ManualClock>,
    pub showcase: Arc<FakeShowcase>,
    pub guild_configs: Arc<FakeGuildConfigs>,
    pub users: Arc<FakeUsers>,
    pub blocklist: Arc<FakeBlocklist>,
    pub platform: Arc<FakePlatform>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            guild_id: GuildId("G-1".to_owned()),
            clock: Arc::new(ManualClock::new(start_time())),
            showcase: Arc::new(FakeShowcase::new(ShowcaseLimits::default())),
            guild_configs: Arc::new(FakeGuildConfigs::default()),
            users: Arc::new(FakeUsers::default()),
            blocklist: Arc::new(FakeBlocklist::default()),
            platform: Arc::new(FakePlatform::default()),
        }
    }

    pub async fn set_privacy(&self, user: &str, privacy: MessagePrivacy) {
        self.users
            .save(UserPrivacy { user_id: UserId(user.to_owned()), message_privacy: privacy })
            .await
            .expect("save privacy");
    }

    pub fn message(&self, id: &str, author: &str) -> MessageSnapshot {
        MessageSnapshot {
            id: ContentId(id.to_owned()),
            channel_id: ChannelId("general".to_owned()),
            guild_id: self.guild_id.clone(),
            author: AuthorSnapshot { id: UserId(author.to_owned()), bot: false, system: false },
            kind: MessageKind::Default,
            webhook_id: None,
            is_forward: false,
            uses_components_v2: false,
            created_at: self.clock.now() - Duration::hours(1),
            referenced_message_id: None,
        }
    }

    pub fn item(
        &self,
        content_id: &str,
        category: ShowcaseCategory,
        showcase_type: ShowcaseType,
    ) -> ShowcasedItem {
        ShowcasedItem {
            guild_id: self.guild_id.clone(),
            content_id: ContentId(content_id.to_owned()),
            channel_id: Some(ChannelId("general".to_owned())),
            category,
            showcase_type,
            expires_at: self.clock.now() + Duration::days(1),
            created_at: self.clock.now(),
        }
    }
}
