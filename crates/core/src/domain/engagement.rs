use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::activity::ActivityCategory;
use crate::domain::ids::{ChannelId, ContentId, GuildId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementKind {
    Reply,
    Reaction,
    ThreadMessage,
    EventInterest,
}

impl EngagementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reply => "reply",
            Self::Reaction => "reaction",
            Self::ThreadMessage => "thread_message",
            Self::EventInterest => "event_interest",
        }
    }

    pub fn activity_category(&self) -> ActivityCategory {
        match self {
            Self::Reply | Self::Reaction => ActivityCategory::Message,
            Self::ThreadMessage => ActivityCategory::Thread,
            Self::EventInterest => ActivityCategory::Event,
        }
    }
}

/// One engagement signal, already decoded from the gateway.
///
/// `content_id` is the item being engaged with: the replied-to or reacted-to message,
/// the thread, or the scheduled event. `channel_id` is absent for event interest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementEvent {
    pub kind: EngagementKind,
    pub guild_id: GuildId,
    pub actor_id: UserId,
    pub content_id: ContentId,
    pub channel_id: Option<ChannelId>,
    pub thread_id: Option<ChannelId>,
    pub event_id: Option<ContentId>,
    pub emoji: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl EngagementEvent {
    pub fn reply(
        guild_id: GuildId,
        actor_id: UserId,
        channel_id: ChannelId,
        replied_to: ContentId,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: EngagementKind::Reply,
            guild_id,
            actor_id,
            content_id: replied_to,
            channel_id: Some(channel_id),
            thread_id: None,
            event_id: None,
            emoji: None,
            timestamp,
        }
    }

    pub fn reaction(
        guild_id: GuildId,
        actor_id: UserId,
        channel_id: ChannelId,
        message_id: ContentId,
        emoji: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: EngagementKind::Reaction,
            guild_id,
            actor_id,
            content_id: message_id,
            channel_id: Some(channel_id),
            thread_id: None,
            event_id: None,
            emoji: Some(emoji.into()),
            timestamp,
        }
    }

    pub fn thread_message(
        guild_id: GuildId,
        actor_id: UserId,
        thread_id: ChannelId,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: EngagementKind::ThreadMessage,
            guild_id,
            actor_id,
            content_id: ContentId::from(&thread_id),
            channel_id: Some(thread_id.clone()),
            thread_id: Some(thread_id),
            event_id: None,
            emoji: None,
            timestamp,
        }
    }

    pub fn event_interest(
        guild_id: GuildId,
        actor_id: UserId,
        event_id: ContentId,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: EngagementKind::EventInterest,
            guild_id,
            actor_id,
            content_id: event_id.clone(),
            channel_id: None,
            thread_id: None,
            event_id: Some(event_id),
            emoji: None,
            timestamp,
        }
    }
}
