//! Keeps the showcase and guild settings consistent with what still exists on the platform.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::domain::guild::GuildActivityConfig;
use crate::domain::ids::{ChannelId, ContentId, GuildId, RoleId};
use crate::domain::showcase::ShowcaseCategory;
use crate::ports::{BlocklistRepository, GuildConfigRepository, ShowcaseStore, StoreError};

/// Guilds joined longer ago than this are treated as a reconnect, not a fresh install.
pub const FRESH_JOIN_WINDOW_MS: i64 = 600_000;

const MESSAGE_CATEGORIES: &[ShowcaseCategory] =
    &[ShowcaseCategory::Message, ShowcaseCategory::Announcement];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub showcased_items: u64,
    pub blocklist_entries: u64,
    pub guild_config: bool,
}

pub struct ShowcaseJanitor {
    guild_configs: Arc<dyn GuildConfigRepository>,
    blocklist: Arc<dyn BlocklistRepository>,
    showcase: Arc<dyn ShowcaseStore>,
    clock: Arc<dyn Clock>,
}

impl ShowcaseJanitor {
    pub fn new(
        guild_configs: Arc<dyn GuildConfigRepository>,
        blocklist: Arc<dyn BlocklistRepository>,
        showcase: Arc<dyn ShowcaseStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { guild_configs, blocklist, showcase, clock }
    }

    pub async fn on_message_deleted(&self, message_id: &ContentId) -> Result<u64, StoreError> {
        let removed = self.showcase.delete_by_content_id(message_id, MESSAGE_CATEGORIES).await?;
        log_removed("message_deleted", &message_id.0, removed);
        Ok(removed)
    }

    pub async fn on_messages_bulk_deleted(
        &self,
        message_ids: &[ContentId],
    ) -> Result<u64, StoreError> {
        let mut removed = 0;
        for message_id in message_ids {
            removed += self.showcase.delete_by_content_id(message_id, MESSAGE_CATEGORIES).await?;
        }
        debug!(
            event_name = "engine.janitor.bulk_deleted",
            messages = message_ids.len(),
            removed,
            "bulk message delete processed"
        );
        Ok(removed)
    }

    /// Drops everything posted in the channel, a thread that is the channel, and any block on it.
    pub async fn on_channel_deleted(
        &self,
        guild_id: &GuildId,
        channel_id: &ChannelId,
    ) -> Result<u64, StoreError> {
        let removed = self.showcase.delete_by_channel_id(channel_id).await?;
        let unblocked = self.blocklist.remove_item(guild_id, &channel_id.0).await?;
        debug!(
            event_name = "engine.janitor.channel_deleted",
            guild_id = %guild_id,
            channel_id = %channel_id,
            removed,
            unblocked,
            "channel delete processed"
        );
        Ok(removed)
    }

    pub async fn on_role_deleted(
        &self,
        guild_id: &GuildId,
        role_id: &RoleId,
    ) -> Result<bool, StoreError> {
        let unblocked = self.blocklist.remove_item(guild_id, &role_id.0).await?;
        debug!(
            event_name = "engine.janitor.role_deleted",
            guild_id = %guild_id,
            role_id = %role_id,
            unblocked,
            "role delete processed"
        );
        Ok(unblocked)
    }

    pub async fn on_thread_deleted(&self, thread_id: &ChannelId) -> Result<u64, StoreError> {
        let content_id = ContentId::from(thread_id);
        let removed =
            self.showcase.delete_by_content_id(&content_id, &[ShowcaseCategory::Thread]).await?;
        log_removed("thread_deleted", &thread_id.0, removed);
        Ok(removed)
    }

    /// Only archiving takes a thread down. Other edits leave it showcased.
    pub async fn on_thread_updated(
        &self,
        thread_id: &ChannelId,
        archived: bool,
    ) -> Result<u64, StoreError> {
        if !archived {
            return Ok(0);
        }
        let content_id = ContentId::from(thread_id);
        let removed =
            self.showcase.delete_by_content_id(&content_id, &[ShowcaseCategory::Thread]).await?;
        log_removed("thread_archived", &thread_id.0, removed);
        Ok(removed)
    }

    pub async fn on_scheduled_event_deleted(&self, event_id: &ContentId) -> Result<u64, StoreError> {
        let removed =
            self.showcase.delete_by_content_id(event_id, &[ShowcaseCategory::Event]).await?;
        log_removed("event_deleted", &event_id.0, removed);
        Ok(removed)
    }

    /// Completed and cancelled events come down. Rescheduling or going live does not.
    pub async fn on_scheduled_event_updated(
        &self,
        event_id: &ContentId,
        finished: bool,
    ) -> Result<u64, StoreError> {
        if !finished {
            return Ok(0);
        }
        let removed =
            self.showcase.delete_by_content_id(event_id, &[ShowcaseCategory::Event]).await?;
        log_removed("event_finished", &event_id.0, removed);
        Ok(removed)
    }

    /// Writes default settings for a guild the bot just joined. Returns whether a row was created.
    pub async fn on_guild_joined(
        &self,
        guild_id: &GuildId,
        joined_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let age = self.clock.now() - joined_at;
        if age > Duration::milliseconds(FRESH_JOIN_WINDOW_MS) {
            debug!(
                event_name = "engine.janitor.guild_join_skipped",
                guild_id = %guild_id,
                joined_secs_ago = age.num_seconds(),
                "guild join is not fresh"
            );
            return Ok(false);
        }

        match self.guild_configs.create(GuildActivityConfig::new(guild_id.clone())).await {
            Ok(()) => {
                info!(
                    event_name = "engine.janitor.guild_initialized",
                    guild_id = %guild_id,
                    "default guild settings created"
                );
                Ok(true)
            }
            Err(StoreError::Duplicate) => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Removes all guild data when the bot leaves. Outages (`unavailable`) are not departures.
    pub async fn on_guild_removed(
        &self,
        guild_id: &GuildId,
        unavailable: bool,
    ) -> Result<Option<PurgeReport>, StoreError> {
        if unavailable {
            debug!(
                event_name = "engine.janitor.guild_unavailable",
                guild_id = %guild_id,
                "guild outage ignored"
            );
            return Ok(None);
        }

        let report = PurgeReport {
            showcased_items: self.showcase.delete_for_guild(guild_id).await?,
            blocklist_entries: self.blocklist.delete_for_guild(guild_id).await?,
            guild_config: self.guild_configs.delete(guild_id).await?,
        };
        info!(
            event_name = "engine.janitor.guild_purged",
            guild_id = %guild_id,
            showcased_items = report.showcased_items,
            blocklist_entries = report.blocklist_entries,
            guild_config = report.guild_config,
            "guild data purged"
        );
        Ok(Some(report))
    }

    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let removed = self.showcase.delete_expired(self.clock.now()).await?;
        if removed > 0 {
            info!(
                event_name = "engine.janitor.expired_purged",
                removed,
                "expired showcase entries removed"
            );
        }
        Ok(removed)
    }
}

fn log_removed(reason: &'static str, id: &str, removed: u64) {
    debug!(event_name = "engine.janitor.removed", reason, id, removed, "showcase cleanup");
}
