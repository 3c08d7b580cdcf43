use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{ChannelId, ContentId, GuildId};

/// Showcase collection an item belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowcaseCategory {
    Message,
    Announcement,
    Thread,
    Event,
}

impl ShowcaseCategory {
    pub const ALL: [ShowcaseCategory; 4] =
        [Self::Message, Self::Announcement, Self::Thread, Self::Event];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Announcement => "announcement",
            Self::Thread => "thread",
            Self::Event => "event",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "message" => Some(Self::Message),
            "announcement" => Some(Self::Announcement),
            "thread" => Some(Self::Thread),
            "event" => Some(Self::Event),
            _ => None,
        }
    }

    /// Collections that must not already hold the same content before this one may take it.
    /// A message lives in at most one of Message/Announcement.
    pub fn conflicting(&self) -> &'static [ShowcaseCategory] {
        match self {
            Self::Message | Self::Announcement => &[Self::Message, Self::Announcement],
            Self::Thread => &[Self::Thread],
            Self::Event => &[Self::Event],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShowcaseType {
    /// Promoted automatically once activity crossed a threshold.
    Highlight,
    /// Placed by a moderator through the manual feature flow.
    Feature,
}

impl ShowcaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Highlight => "HIGHLIGHT",
            Self::Feature => "FEATURE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "HIGHLIGHT" => Some(Self::Highlight),
            "FEATURE" => Some(Self::Feature),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowcasedItem {
    pub guild_id: GuildId,
    pub content_id: ContentId,
    /// Channel the message was posted in, the thread's parent, or the event's venue channel.
    pub channel_id: Option<ChannelId>,
    pub category: ShowcaseCategory,
    pub showcase_type: ShowcaseType,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ShowcasedItem {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Durations a moderator can pick when featuring content by hand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureDuration {
    TwelveHours,
    OneDay,
    ThreeDays,
    SevenDays,
}

impl FeatureDuration {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwelveHours => "TWELVE_HOURS",
            Self::OneDay => "ONE_DAY",
            Self::ThreeDays => "THREE_DAYS",
            Self::SevenDays => "SEVEN_DAYS",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TWELVE_HOURS" => Some(Self::TwelveHours),
            "ONE_DAY" => Some(Self::OneDay),
            "THREE_DAYS" => Some(Self::ThreeDays),
            "SEVEN_DAYS" => Some(Self::SevenDays),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Duration {
        match self {
            Self::TwelveHours => Duration::hours(12),
            Self::OneDay => Duration::days(1),
            Self::ThreeDays => Duration::days(3),
            Self::SevenDays => Duration::days(7),
        }
    }
}

/// Collection a moderator chooses for a featured message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureKind {
    Standard,
    Announcement,
}

impl FeatureKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "STANDARD" => Some(Self::Standard),
            "ANNOUNCEMENT" => Some(Self::Announcement),
            _ => None,
        }
    }

    pub fn category(&self) -> ShowcaseCategory {
        match self {
            Self::Standard => ShowcaseCategory::Message,
            Self::Announcement => ShowcaseCategory::Announcement,
        }
    }
}

/// Maximum number of live showcase entries per guild, per collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowcaseLimits {
    pub messages: u32,
    pub announcements: u32,
    pub threads: u32,
    pub events: u32,
}

impl Default for ShowcaseLimits {
    fn default() -> Self {
        Self { messages: 5, announcements: 4, threads: 5, events: 5 }
    }
}

impl ShowcaseLimits {
    pub fn for_category(&self, category: ShowcaseCategory) -> u32 {
        match category {
            ShowcaseCategory::Message => self.messages,
            ShowcaseCategory::Announcement => self.announcements,
            ShowcaseCategory::Thread => self.threads,
            ShowcaseCategory::Event => self.events,
        }
    }
}
