use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use homecord_core::domain::content::{ChannelKind, MessageSnapshot, ScheduledEventStatus};
use homecord_core::domain::showcase::{FeatureDuration, FeatureKind};
use homecord_core::feature::{FeatureError, FeatureRequest, FeatureTarget, ManualFeatureFlow};
use homecord_core::janitor::ShowcaseJanitor;
use homecord_core::ports::StoreError;
use homecord_core::promotion::{PromotionEngine, PromotionError, PromotionOutcome};
use homecord_core::{
    ApplicationError, ChannelId, ContentId, DomainError, EngagementEvent, GuildId, RoleId, UserId,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayEnvelope {
    pub envelope_id: String,
    pub received_at: DateTime<Utc>,
    pub event: GatewayEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayEvent {
    MessageCreate(MessageCreateEvent),
    ReactionAdd(ReactionAddEvent),
    ScheduledEventUserAdd { guild_id: GuildId, event_id: ContentId, user_id: UserId },
    FeatureMessageCommand(FeatureCommandEvent),
    FeatureMessageSubmit(FeatureSubmitEvent),
    MessageDelete { message_id: ContentId },
    MessageDeleteBulk { message_ids: Vec<ContentId> },
    ChannelDelete { guild_id: GuildId, channel_id: ChannelId },
    RoleDelete { guild_id: GuildId, role_id: RoleId },
    ThreadDelete { thread_id: ChannelId },
    ThreadUpdate { thread_id: ChannelId, archived: bool },
    ScheduledEventDelete { event_id: ContentId },
    ScheduledEventUpdate { event_id: ContentId, status: Option<ScheduledEventStatus> },
    GuildCreate { guild_id: GuildId, joined_at: DateTime<Utc> },
    GuildDelete { guild_id: GuildId, unavailable: bool },
    Unsupported { event_type: String },
}

impl GatewayEvent {
    pub fn event_type(&self) -> GatewayEventType {
        match self {
            Self::MessageCreate(_) => GatewayEventType::MessageCreate,
            Self::ReactionAdd(_) => GatewayEventType::ReactionAdd,
            Self::ScheduledEventUserAdd { .. } => GatewayEventType::ScheduledEventUserAdd,
            Self::FeatureMessageCommand(_) => GatewayEventType::FeatureMessageCommand,
            Self::FeatureMessageSubmit(_) => GatewayEventType::FeatureMessageSubmit,
            Self::MessageDelete { .. } => GatewayEventType::MessageDelete,
            Self::MessageDeleteBulk { .. } => GatewayEventType::MessageDeleteBulk,
            Self::ChannelDelete { .. } => GatewayEventType::ChannelDelete,
            Self::RoleDelete { .. } => GatewayEventType::RoleDelete,
            Self::ThreadDelete { .. } => GatewayEventType::ThreadDelete,
            Self::ThreadUpdate { .. } => GatewayEventType::ThreadUpdate,
            Self::ScheduledEventDelete { .. } => GatewayEventType::ScheduledEventDelete,
            Self::ScheduledEventUpdate { .. } => GatewayEventType::ScheduledEventUpdate,
            Self::GuildCreate { .. } => GatewayEventType::GuildCreate,
            Self::GuildDelete { .. } => GatewayEventType::GuildDelete,
            Self::Unsupported { .. } => GatewayEventType::Unsupported,
        }
    }

    /// Guild the event belongs to, when the payload carries one.
    pub fn guild_id(&self) -> Option<&GuildId> {
        match self {
            Self::MessageCreate(event) => Some(&event.message.guild_id),
            Self::ReactionAdd(event) => event.guild_id.as_ref(),
            Self::FeatureMessageCommand(event) => Some(&event.guild_id),
            Self::FeatureMessageSubmit(event) => Some(&event.guild_id),
            Self::ScheduledEventUserAdd { guild_id, .. }
            | Self::ChannelDelete { guild_id, .. }
            | Self::RoleDelete { guild_id, .. }
            | Self::GuildCreate { guild_id, .. }
            | Self::GuildDelete { guild_id, .. } => Some(guild_id),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GatewayEventType {
    MessageCreate,
    ReactionAdd,
    ScheduledEventUserAdd,
    FeatureMessageCommand,
    FeatureMessageSubmit,
    MessageDelete,
    MessageDeleteBulk,
    ChannelDelete,
    RoleDelete,
    ThreadDelete,
    ThreadUpdate,
    ScheduledEventDelete,
    ScheduledEventUpdate,
    GuildCreate,
    GuildDelete,
    Unsupported,
}

impl GatewayEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageCreate => "MESSAGE_CREATE",
            Self::ReactionAdd => "MESSAGE_REACTION_ADD",
            Self::ScheduledEventUserAdd => "GUILD_SCHEDULED_EVENT_USER_ADD",
            Self::FeatureMessageCommand => "FEATURE_MESSAGE_COMMAND",
            Self::FeatureMessageSubmit => "FEATURE_MESSAGE_SUBMIT",
            Self::MessageDelete => "MESSAGE_DELETE",
            Self::MessageDeleteBulk => "MESSAGE_DELETE_BULK",
            Self::ChannelDelete => "CHANNEL_DELETE",
            Self::RoleDelete => "GUILD_ROLE_DELETE",
            Self::ThreadDelete => "THREAD_DELETE",
            Self::ThreadUpdate => "THREAD_UPDATE",
            Self::ScheduledEventDelete => "GUILD_SCHEDULED_EVENT_DELETE",
            Self::ScheduledEventUpdate => "GUILD_SCHEDULED_EVENT_UPDATE",
            Self::GuildCreate => "GUILD_CREATE",
            Self::GuildDelete => "GUILD_DELETE",
            Self::Unsupported => "UNSUPPORTED",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageCreateEvent {
    pub message: MessageSnapshot,
    /// Kind of the channel the message was posted in, when the gateway resolved it.
    pub channel_kind: Option<ChannelKind>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionAddEvent {
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub message_id: ContentId,
    pub user_id: UserId,
    pub emoji: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureCommandEvent {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: ContentId,
    pub invoked_by: UserId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureSubmitEvent {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: ContentId,
    pub requested_by: UserId,
    /// Raw modal values, validated by the handler.
    pub kind: String,
    pub duration: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractionReply {
    pub content: String,
    pub ephemeral: bool,
}

impl InteractionReply {
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self { content: content.into(), ephemeral: true }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Replied(InteractionReply),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Promotion(#[from] PromotionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error("malformed gateway payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

impl From<EventHandlerError> for ApplicationError {
    fn from(value: EventHandlerError) -> Self {
        match value {
            EventHandlerError::Promotion(error) => error.into(),
            EventHandlerError::Store(error) => error.into(),
            EventHandlerError::Feature(error) => error.into(),
            EventHandlerError::Malformed(detail) => DomainError::MalformedEvent(detail).into(),
        }
    }
}

impl From<DispatchError> for ApplicationError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Handler(error) => error.into(),
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_types(&self) -> &'static [GatewayEventType];
    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<GatewayEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for every event type it declares. Later registrations win.
    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        let handler: Arc<dyn EventHandler> = Arc::new(handler);
        for event_type in handler.event_types() {
            self.handlers.insert(*event_type, Arc::clone(&handler));
        }
    }

    pub async fn dispatch(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn handles(&self, event_type: GatewayEventType) -> bool {
        self.handlers.contains_key(&event_type)
    }
}

pub fn default_dispatcher(
    engine: Arc<PromotionEngine>,
    flow: Arc<ManualFeatureFlow>,
    janitor: Arc<ShowcaseJanitor>,
) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(EngagementHandler::new(engine));
    dispatcher.register(FeatureHandler::new(flow));
    dispatcher.register(CleanupHandler::new(janitor));
    dispatcher
}

/// Why a created message never reaches the engine.
fn prefilter_reason(message: &MessageSnapshot) -> Option<&'static str> {
    if message.author.bot {
        Some("automated_author")
    } else if message.author.system || message.kind.is_system() {
        Some("system_message")
    } else if message.webhook_id.is_some() {
        Some("webhook_message")
    } else if message.is_forward {
        Some("forwarded_message")
    } else {
        None
    }
}

/// Translates gateway activity into engagement signals for the promotion engine.
pub struct EngagementHandler {
    engine: Arc<PromotionEngine>,
}

impl EngagementHandler {
    pub fn new(engine: Arc<PromotionEngine>) -> Self {
        Self { engine }
    }

    /// A created message can be both a reply and a thread message.
    fn engagements(event: &MessageCreateEvent, at: DateTime<Utc>) -> Vec<EngagementEvent> {
        let message = &event.message;
        let mut engagements = Vec::with_capacity(2);
        if let Some(replied_to) = &message.referenced_message_id {
            engagements.push(EngagementEvent::reply(
                message.guild_id.clone(),
                message.author.id.clone(),
                message.channel_id.clone(),
                replied_to.clone(),
                at,
            ));
        }
        if event.channel_kind.is_some_and(|kind| kind.is_public_thread()) {
            engagements.push(EngagementEvent::thread_message(
                message.guild_id.clone(),
                message.author.id.clone(),
                message.channel_id.clone(),
                at,
            ));
        }
        engagements
    }

    async fn apply(
        &self,
        engagements: Vec<EngagementEvent>,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        if engagements.is_empty() {
            return Ok(HandlerResult::Ignored);
        }
        // Each engagement is counted on its own; the first failure is reported after all ran.
        let mut first_error = None;
        for engagement in &engagements {
            match self.engine.handle(engagement).await {
                Ok(PromotionOutcome::Promoted(item)) => debug!(
                    event_name = "ingress.gateway.engagement_promoted",
                    correlation_id = %ctx.correlation_id,
                    guild_id = %item.guild_id,
                    content_id = %item.content_id,
                    "engagement produced a highlight"
                ),
                Ok(_) => {}
                Err(error) => {
                    warn!(
                        event_name = "ingress.gateway.engagement_failed",
                        correlation_id = %ctx.correlation_id,
                        content_id = %engagement.content_id,
                        kind = engagement.kind.as_str(),
                        error = %error,
                        "engagement could not be applied"
                    );
                    first_error.get_or_insert(error);
                }
            }
        }
        match first_error {
            Some(error) => Err(error.into()),
            None => Ok(HandlerResult::Processed),
        }
    }
}

#[async_trait]
impl EventHandler for EngagementHandler {
    fn event_types(&self) -> &'static [GatewayEventType] {
        &[
            GatewayEventType::MessageCreate,
            GatewayEventType::ReactionAdd,
            GatewayEventType::ScheduledEventUserAdd,
        ]
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let at = envelope.received_at;
        let engagements = match &envelope.event {
            GatewayEvent::MessageCreate(event) => {
                if let Some(reason) = prefilter_reason(&event.message) {
                    debug!(
                        event_name = "ingress.gateway.message_filtered",
                        correlation_id = %ctx.correlation_id,
                        content_id = %event.message.id,
                        reason,
                        "message ignored before counting"
                    );
                    return Ok(HandlerResult::Ignored);
                }
                Self::engagements(event, at)
            }
            GatewayEvent::ReactionAdd(event) => {
                let Some(guild_id) = &event.guild_id else {
                    return Ok(HandlerResult::Ignored);
                };
                vec![EngagementEvent::reaction(
                    guild_id.clone(),
                    event.user_id.clone(),
                    event.channel_id.clone(),
                    event.message_id.clone(),
                    event.emoji.clone(),
                    at,
                )]
            }
            GatewayEvent::ScheduledEventUserAdd { guild_id, event_id, user_id } => {
                vec![EngagementEvent::event_interest(
                    guild_id.clone(),
                    user_id.clone(),
                    event_id.clone(),
                    at,
                )]
            }
            _ => return Ok(HandlerResult::Ignored),
        };

        self.apply(engagements, ctx).await
    }
}

/// Moderator "feature this message" command and its modal submission.
pub struct FeatureHandler {
    flow: Arc<ManualFeatureFlow>,
}

impl FeatureHandler {
    pub fn new(flow: Arc<ManualFeatureFlow>) -> Self {
        Self { flow }
    }

    fn parse_submission(
        event: &FeatureSubmitEvent,
    ) -> Result<(FeatureKind, FeatureDuration), EventHandlerError> {
        let kind = FeatureKind::parse(&event.kind).ok_or_else(|| {
            EventHandlerError::Malformed(format!("unknown feature kind `{}`", event.kind))
        })?;
        let duration = FeatureDuration::parse(&event.duration).ok_or_else(|| {
            EventHandlerError::Malformed(format!("unknown feature duration `{}`", event.duration))
        })?;
        Ok((kind, duration))
    }

    /// Every refusal becomes an ephemeral reply. Infrastructure failures are logged and the
    /// operator is asked to retry with a reference to the correlation id.
    fn refusal(error: FeatureError, ctx: &EventContext) -> Result<HandlerResult, EventHandlerError> {
        match error {
            FeatureError::Store(_) | FeatureError::Platform(_) => {
                let reason = error.to_string();
                let interface = ApplicationError::from(error).into_interface(ctx.correlation_id.as_str());
                warn!(
                    event_name = "ingress.gateway.feature_failed",
                    correlation_id = %ctx.correlation_id,
                    error = %reason,
                    "feature request failed on a dependency"
                );
                Ok(HandlerResult::Replied(InteractionReply::ephemeral(format!(
                    "{} (reference: {})",
                    interface.user_message(),
                    ctx.correlation_id
                ))))
            }
            refused => {
                debug!(
                    event_name = "ingress.gateway.feature_refused",
                    correlation_id = %ctx.correlation_id,
                    reason = %refused,
                    "feature request refused"
                );
                Ok(HandlerResult::Replied(InteractionReply::ephemeral(refused.user_message())))
            }
        }
    }
}

#[async_trait]
impl EventHandler for FeatureHandler {
    fn event_types(&self) -> &'static [GatewayEventType] {
        &[GatewayEventType::FeatureMessageCommand, GatewayEventType::FeatureMessageSubmit]
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        match &envelope.event {
            GatewayEvent::FeatureMessageCommand(event) => {
                let target = FeatureTarget {
                    guild_id: event.guild_id.clone(),
                    channel_id: event.channel_id.clone(),
                    message_id: event.message_id.clone(),
                };
                match self.flow.precheck(&target).await {
                    Ok(_) => Ok(HandlerResult::Replied(InteractionReply::ephemeral(
                        "Choose a collection and how long the message should stay featured.",
                    ))),
                    Err(error) => Self::refusal(error, ctx),
                }
            }
            GatewayEvent::FeatureMessageSubmit(event) => {
                let (kind, duration) = match Self::parse_submission(event) {
                    Ok(parsed) => parsed,
                    Err(error) => {
                        debug!(
                            event_name = "ingress.gateway.feature_malformed",
                            correlation_id = %ctx.correlation_id,
                            error = %error,
                            "feature submission rejected"
                        );
                        return Ok(HandlerResult::Replied(InteractionReply::ephemeral(
                            "That selection is not valid. Please try again.",
                        )));
                    }
                };
                let request = FeatureRequest {
                    target: FeatureTarget {
                        guild_id: event.guild_id.clone(),
                        channel_id: event.channel_id.clone(),
                        message_id: event.message_id.clone(),
                    },
                    kind,
                    duration,
                    requested_by: event.requested_by.clone(),
                };
                match self.flow.submit(request).await {
                    Ok(_) => Ok(HandlerResult::Replied(InteractionReply::ephemeral(
                        "Message featured.",
                    ))),
                    Err(error) => Self::refusal(error, ctx),
                }
            }
            _ => Ok(HandlerResult::Ignored),
        }
    }
}

/// Deletion and guild lifecycle events that keep stored showcase data in step with the platform.
pub struct CleanupHandler {
    janitor: Arc<ShowcaseJanitor>,
}

impl CleanupHandler {
    pub fn new(janitor: Arc<ShowcaseJanitor>) -> Self {
        Self { janitor }
    }
}

#[async_trait]
impl EventHandler for CleanupHandler {
    fn event_types(&self) -> &'static [GatewayEventType] {
        &[
            GatewayEventType::MessageDelete,
            GatewayEventType::MessageDeleteBulk,
            GatewayEventType::ChannelDelete,
            GatewayEventType::RoleDelete,
            GatewayEventType::ThreadDelete,
            GatewayEventType::ThreadUpdate,
            GatewayEventType::ScheduledEventDelete,
            GatewayEventType::ScheduledEventUpdate,
            GatewayEventType::GuildCreate,
            GatewayEventType::GuildDelete,
        ]
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        match &envelope.event {
            GatewayEvent::MessageDelete { message_id } => {
                self.janitor.on_message_deleted(message_id).await?;
            }
            GatewayEvent::MessageDeleteBulk { message_ids } => {
                self.janitor.on_messages_bulk_deleted(message_ids).await?;
            }
            GatewayEvent::ChannelDelete { guild_id, channel_id } => {
                self.janitor.on_channel_deleted(guild_id, channel_id).await?;
            }
            GatewayEvent::RoleDelete { guild_id, role_id } => {
                self.janitor.on_role_deleted(guild_id, role_id).await?;
            }
            GatewayEvent::ThreadDelete { thread_id } => {
                self.janitor.on_thread_deleted(thread_id).await?;
            }
            GatewayEvent::ThreadUpdate { thread_id, archived } => {
                self.janitor.on_thread_updated(thread_id, *archived).await?;
            }
            GatewayEvent::ScheduledEventDelete { event_id } => {
                self.janitor.on_scheduled_event_deleted(event_id).await?;
            }
            GatewayEvent::ScheduledEventUpdate { event_id, status } => {
                let finished = status.is_some_and(|status| status.is_finished());
                self.janitor.on_scheduled_event_updated(event_id, finished).await?;
            }
            GatewayEvent::GuildCreate { guild_id, joined_at } => {
                self.janitor.on_guild_joined(guild_id, *joined_at).await?;
            }
            GatewayEvent::GuildDelete { guild_id, unavailable } => {
                self.janitor.on_guild_removed(guild_id, *unavailable).await?;
            }
            _ => return Ok(HandlerResult::Ignored),
        }
        Ok(HandlerResult::Processed)
    }
}
