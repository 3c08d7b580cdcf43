use serde::{Deserialize, Serialize};

use crate::domain::ids::GuildId;

/// Upper bound on blocklist entries of a single type within one guild.
pub const MAX_BLOCKED_PER_TYPE: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    Channel,
    Category,
    Role,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Channel => "CHANNEL",
            Self::Category => "CATEGORY",
            Self::Role => "ROLE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CHANNEL" => Some(Self::Channel),
            "CATEGORY" => Some(Self::Category),
            "ROLE" => Some(Self::Role),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocklistEntry {
    pub guild_id: GuildId,
    pub item_id: String,
    pub block_type: BlockType,
}

impl BlocklistEntry {
    pub fn new(guild_id: GuildId, item_id: impl Into<String>, block_type: BlockType) -> Self {
        Self { guild_id, item_id: item_id.into(), block_type }
    }
}
