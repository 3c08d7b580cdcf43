use serde::{Deserialize, Serialize};

use crate::domain::activity::{ActivityCategory, ActivityLevel};
use crate::domain::ids::{GuildId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessagePrivacy {
    Public,
    Anonymous,
    Private,
}

impl MessagePrivacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "PUBLIC",
            Self::Anonymous => "ANONYMOUS",
            Self::Private => "PRIVATE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PUBLIC" => Some(Self::Public),
            "ANONYMOUS" => Some(Self::Anonymous),
            "PRIVATE" => Some(Self::Private),
            _ => None,
        }
    }

    pub fn allows_showcasing(&self) -> bool {
        !matches!(self, Self::Private)
    }
}

/// Per-guild settings the engine reads. Edited by the settings panel, never by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildActivityConfig {
    pub guild_id: GuildId,
    pub homecord_enabled: bool,
    pub default_message_privacy: MessagePrivacy,
    pub allow_starboard_reactions: bool,
    pub message_activity_level: ActivityLevel,
    pub event_activity_level: ActivityLevel,
    pub thread_activity_level: ActivityLevel,
}

impl GuildActivityConfig {
    /// Settings written when the bot first joins a guild. Showcasing stays off until an admin opts in.
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            homecord_enabled: false,
            default_message_privacy: MessagePrivacy::Public,
            allow_starboard_reactions: false,
            message_activity_level: ActivityLevel::Medium,
            event_activity_level: ActivityLevel::Medium,
            thread_activity_level: ActivityLevel::Medium,
        }
    }

    pub fn level_for(&self, category: ActivityCategory) -> ActivityLevel {
        match category {
            ActivityCategory::Message => self.message_activity_level,
            ActivityCategory::Thread => self.thread_activity_level,
            ActivityCategory::Event => self.event_activity_level,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPrivacy {
    pub user_id: UserId,
    pub message_privacy: MessagePrivacy,
}

#[cfg(test)]
mod tests {
    use super::{GuildActivityConfig, MessagePrivacy};
    use crate::domain::activity::{ActivityCategory, ActivityLevel};
    use crate::domain::ids::GuildId;

    #[test]
    fn fresh_guild_config_is_opt_in() {
        let config = GuildActivityConfig::new(GuildId("G-1".to_owned()));
        assert!(!config.homecord_enabled);
        assert!(!config.allow_starboard_reactions);
        assert_eq!(config.level_for(ActivityCategory::Thread), ActivityLevel::Medium);
    }

    #[test]
    fn only_private_blocks_showcasing() {
        assert!(MessagePrivacy::Public.allows_showcasing());
        assert!(MessagePrivacy::Anonymous.allows_showcasing());
        assert!(!MessagePrivacy::Private.allows_showcasing());
        assert_eq!(MessagePrivacy::parse(" anonymous "), Some(MessagePrivacy::Anonymous));
    }
}
