//! Read-only snapshots of platform objects the engine inspects.
//!
//! These are fetched through [`crate::ports::PlatformLookup`] and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{ChannelId, ContentId, GuildId, RoleId, UserId};

/// Message type codes the platform uses for generated notices (joins, pins, boosts and similar).
const SYSTEM_MESSAGE_CODES: &[u8] = &[
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 14, 15, 16, 17, 18, 22, 24, 25, 26, 27, 28, 29, 30, 31,
    32, 36, 37, 38, 39, 40, 42, 44, 46, 49, 51, 55, 58, 59, 60, 61, 62, 63,
];

const REPLY_CODE: u8 = 19;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Default,
    Reply,
    System(u8),
    Other(u8),
}

impl MessageKind {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Default,
            REPLY_CODE => Self::Reply,
            code if SYSTEM_MESSAGE_CODES.contains(&code) => Self::System(code),
            code => Self::Other(code),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Default => 0,
            Self::Reply => REPLY_CODE,
            Self::System(code) | Self::Other(code) => *code,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System(_))
    }

    /// Plain and reply messages are the only kinds that can be counted or featured.
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Default | Self::Reply)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSnapshot {
    pub id: UserId,
    pub bot: bool,
    pub system: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSnapshot {
    pub id: ContentId,
    pub channel_id: ChannelId,
    pub guild_id: GuildId,
    pub author: AuthorSnapshot,
    pub kind: MessageKind,
    pub webhook_id: Option<String>,
    pub is_forward: bool,
    pub uses_components_v2: bool,
    pub created_at: DateTime<Utc>,
    pub referenced_message_id: Option<ContentId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSnapshot {
    pub user_id: UserId,
    pub bot: bool,
    pub roles: Vec<RoleId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
    Announcement,
    AnnouncementThread,
    PublicThread,
    PrivateThread,
    Stage,
    Forum,
    Media,
    Other(u8),
}

impl ChannelKind {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Text,
            2 => Self::Voice,
            4 => Self::Category,
            5 => Self::Announcement,
            10 => Self::AnnouncementThread,
            11 => Self::PublicThread,
            12 => Self::PrivateThread,
            13 => Self::Stage,
            15 => Self::Forum,
            16 => Self::Media,
            other => Self::Other(other),
        }
    }

    /// Threads visible to the whole guild. Forum posts arrive as public threads.
    pub fn is_public_thread(&self) -> bool {
        matches!(self, Self::PublicThread | Self::AnnouncementThread)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub kind: ChannelKind,
    pub parent_id: Option<ChannelId>,
    pub owner_id: Option<UserId>,
    pub archived: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl ChannelSnapshot {
    /// The channel itself followed by its parent, the ids a location block is matched against.
    pub fn location(&self) -> Vec<ChannelId> {
        let mut ids = vec![self.id.clone()];
        if let Some(parent) = &self.parent_id {
            ids.push(parent.clone());
        }
        ids
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduledEventStatus {
    Scheduled,
    Active,
    Completed,
    Canceled,
}

impl ScheduledEventStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Scheduled),
            2 => Some(Self::Active),
            3 => Some(Self::Completed),
            4 => Some(Self::Canceled),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEventSnapshot {
    pub id: ContentId,
    pub guild_id: GuildId,
    pub channel_id: Option<ChannelId>,
    pub status: ScheduledEventStatus,
    pub user_count: u32,
    pub scheduled_end_time: Option<DateTime<Utc>>,
}
