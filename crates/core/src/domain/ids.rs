use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GuildId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(pub String);

/// Identifier of a showcaseable item: a message, a thread, or a scheduled event.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentId(pub String);

impl RoleId {
    /// The implicit "everyone" role shares its id with the guild.
    pub fn is_everyone(&self, guild_id: &GuildId) -> bool {
        self.0 == guild_id.0
    }
}

impl From<&ChannelId> for ContentId {
    fn from(value: &ChannelId) -> Self {
        Self(value.0.clone())
    }
}

impl From<&ContentId> for ChannelId {
    fn from(value: &ContentId) -> Self {
        Self(value.0.clone())
    }
}

macro_rules! display_as_inner {
    ($($ty:ty),+) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }
        )+
    };
}

display_as_inner!(GuildId, UserId, ChannelId, RoleId, ContentId);
