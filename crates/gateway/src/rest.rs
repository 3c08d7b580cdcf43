//! Live platform lookups over the REST API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use homecord_core::config::DiscordConfig;
use homecord_core::domain::content::{
    AuthorSnapshot, ChannelKind, ChannelSnapshot, MemberSnapshot, MessageKind, MessageSnapshot,
    ScheduledEventSnapshot, ScheduledEventStatus,
};
use homecord_core::ports::{PlatformError, PlatformLookup};
use homecord_core::{ChannelId, ContentId, GuildId, RoleId, UserId};

/// Milliseconds between the Unix epoch and the platform's snowflake epoch (2015-01-01).
const SNOWFLAKE_EPOCH_MS: i64 = 1_420_070_400_000;
/// `message_reference.type` for forwarded messages.
const REFERENCE_TYPE_FORWARD: u8 = 1;
/// Message flag set on messages built with the v2 component system.
const FLAG_IS_COMPONENTS_V2: u64 = 1 << 15;

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    #[serde(default)]
    bot: bool,
    #[serde(default)]
    system: bool,
}

#[derive(Debug, Deserialize)]
struct WireMessageReference {
    #[serde(rename = "type", default)]
    kind: u8,
    message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    channel_id: String,
    guild_id: Option<String>,
    author: WireUser,
    #[serde(rename = "type", default)]
    kind: u8,
    webhook_id: Option<String>,
    #[serde(default)]
    flags: u64,
    timestamp: String,
    message_reference: Option<WireMessageReference>,
}

#[derive(Debug, Deserialize)]
struct WireMember {
    user: Option<WireUser>,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireThreadMetadata {
    #[serde(default)]
    archived: bool,
    create_timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    guild_id: Option<String>,
    parent_id: Option<String>,
    owner_id: Option<String>,
    thread_metadata: Option<WireThreadMetadata>,
}

#[derive(Debug, Deserialize)]
struct WireScheduledEvent {
    id: String,
    guild_id: String,
    channel_id: Option<String>,
    status: u8,
    #[serde(default)]
    user_count: u32,
    scheduled_end_time: Option<String>,
}

fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, PlatformError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| PlatformError::Unavailable(format!("invalid {field} `{raw}`: {e}")))
}

/// Creation time encoded in a snowflake id.
fn snowflake_timestamp(id: &str) -> Option<DateTime<Utc>> {
    let raw = id.parse::<u64>().ok()?;
    let millis = i64::try_from(raw >> 22).ok()? + SNOWFLAKE_EPOCH_MS;
    Utc.timestamp_millis_opt(millis).single()
}

fn message_snapshot(
    wire: WireMessage,
    fallback_guild: Option<GuildId>,
) -> Result<MessageSnapshot, PlatformError> {
    let guild_id = wire.guild_id.map(GuildId).or(fallback_guild).ok_or_else(|| {
        PlatformError::NotFound(format!("message {} is not in a guild", wire.id))
    })?;
    let created_at = parse_timestamp("message timestamp", &wire.timestamp)?;
    let (is_forward, referenced_message_id) = match wire.message_reference {
        Some(reference) if reference.kind == REFERENCE_TYPE_FORWARD => (true, None),
        Some(reference) => (false, reference.message_id.map(ContentId)),
        None => (false, None),
    };

    Ok(MessageSnapshot {
        id: ContentId(wire.id),
        channel_id: ChannelId(wire.channel_id),
        guild_id,
        author: AuthorSnapshot {
            id: UserId(wire.author.id),
            bot: wire.author.bot,
            system: wire.author.system,
        },
        kind: MessageKind::from_code(wire.kind),
        webhook_id: wire.webhook_id,
        is_forward,
        uses_components_v2: wire.flags & FLAG_IS_COMPONENTS_V2 != 0,
        created_at,
        referenced_message_id,
    })
}

fn member_snapshot(wire: WireMember, user_id: &UserId) -> MemberSnapshot {
    MemberSnapshot {
        user_id: user_id.clone(),
        bot: wire.user.map(|user| user.bot).unwrap_or(false),
        roles: wire.roles.into_iter().map(RoleId).collect(),
    }
}

fn channel_snapshot(wire: WireChannel) -> Result<ChannelSnapshot, PlatformError> {
    let (archived, created_at) = match wire.thread_metadata {
        Some(meta) => {
            let created = match meta.create_timestamp {
                Some(raw) => Some(parse_timestamp("thread create_timestamp", &raw)?),
                None => snowflake_timestamp(&wire.id),
            };
            (meta.archived, created)
        }
        None => (false, snowflake_timestamp(&wire.id)),
    };

    Ok(ChannelSnapshot {
        kind: ChannelKind::from_code(wire.kind),
        guild_id: wire.guild_id.map(GuildId),
        parent_id: wire.parent_id.map(ChannelId),
        owner_id: wire.owner_id.map(UserId),
        archived,
        created_at,
        id: ChannelId(wire.id),
    })
}

fn scheduled_event_snapshot(
    wire: WireScheduledEvent,
) -> Result<ScheduledEventSnapshot, PlatformError> {
    let status = ScheduledEventStatus::from_code(wire.status).ok_or_else(|| {
        PlatformError::Unavailable(format!("unknown scheduled event status {}", wire.status))
    })?;
    let scheduled_end_time = wire
        .scheduled_end_time
        .as_deref()
        .map(|raw| parse_timestamp("scheduled_end_time", raw))
        .transpose()?;

    Ok(ScheduledEventSnapshot {
        id: ContentId(wire.id),
        guild_id: GuildId(wire.guild_id),
        channel_id: wire.channel_id.map(ChannelId),
        status,
        user_count: wire.user_count,
        scheduled_end_time,
    })
}

pub struct RestPlatformLookup {
    client: Client,
    base_url: String,
    bot_token: SecretString,
}

impl RestPlatformLookup {
    pub fn new(config: &DiscordConfig) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PlatformError::Unavailable(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            bot_token: config.bot_token.clone(),
        })
    }

    fn authorization(&self) -> String {
        let token = self.bot_token.expose_secret();
        format!("Bot {}", token.strip_prefix("Bot ").unwrap_or(token))
    }

    /// `Ok(None)` on 404.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, PlatformError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.authorization())
            .send()
            .await
            .map_err(|e| PlatformError::Unavailable(format!("GET {path}: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            warn!(
                event_name = "platform.rest.request_failed",
                path,
                status = status.as_u16(),
                "platform lookup returned an error status"
            );
            return Err(PlatformError::Unavailable(format!("GET {path} returned {status}")));
        }

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| PlatformError::Unavailable(format!("GET {path}: invalid body: {e}")))
    }

    async fn require<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T, PlatformError> {
        self.get(path).await?.ok_or_else(|| PlatformError::NotFound(what.to_owned()))
    }
}

#[async_trait]
impl PlatformLookup for RestPlatformLookup {
    async fn fetch_message(
        &self,
        channel_id: &ChannelId,
        message_id: &ContentId,
    ) -> Result<MessageSnapshot, PlatformError> {
        let wire: WireMessage = self
            .require(
                &format!("/channels/{}/messages/{}", channel_id.0, message_id.0),
                &format!("message {message_id}"),
            )
            .await?;
        let fallback_guild = match wire.guild_id {
            Some(_) => None,
            None => self.fetch_channel(channel_id).await?.guild_id,
        };
        message_snapshot(wire, fallback_guild)
    }

    async fn fetch_member(
        &self,
        guild_id: &GuildId,
        user_id: &UserId,
    ) -> Result<Option<MemberSnapshot>, PlatformError> {
        let wire: Option<WireMember> =
            self.get(&format!("/guilds/{}/members/{}", guild_id.0, user_id.0)).await?;
        Ok(wire.map(|member| member_snapshot(member, user_id)))
    }

    async fn fetch_channel(&self, channel_id: &ChannelId) -> Result<ChannelSnapshot, PlatformError> {
        let wire: WireChannel = self
            .require(&format!("/channels/{}", channel_id.0), &format!("channel {channel_id}"))
            .await?;
        channel_snapshot(wire)
    }

    async fn fetch_scheduled_event(
        &self,
        guild_id: &GuildId,
        event_id: &ContentId,
    ) -> Result<ScheduledEventSnapshot, PlatformError> {
        let wire: WireScheduledEvent = self
            .require(
                &format!(
                    "/guilds/{}/scheduled-events/{}?with_user_count=true",
                    guild_id.0, event_id.0
                ),
                &format!("scheduled event {event_id}"),
            )
            .await?;
        scheduled_event_snapshot(wire)
    }
}
