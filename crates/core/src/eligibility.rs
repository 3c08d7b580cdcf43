//! Ordered eligibility checks applied before anything is counted or showcased.
//!
//! The checks run in a fixed order and stop at the first failure:
//! content kind, self-interaction, location block, role block, age, author privacy,
//! capacity, duplicate. Everything is re-read on every call so blocklist or privacy
//! changes made after the first engagement still apply at promotion time.

use std::sync::Arc;

use chrono::Duration;
use tracing::debug;

use crate::clock::Clock;
use crate::domain::content::{
    ChannelSnapshot, MemberSnapshot, MessageSnapshot, ScheduledEventSnapshot,
};
use crate::domain::guild::MessagePrivacy;
use crate::domain::ids::{ChannelId, GuildId, UserId};
use crate::domain::showcase::{ShowcaseCategory, ShowcaseLimits};
use crate::ports::{BlocklistRepository, ShowcaseStore, StoreError, UserConfigRepository};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rejection {
    AutomatedAccount,
    SystemContent,
    WebhookContent,
    UnsupportedMessageType,
    ForwardedMessage,
    ComponentsV2,
    InactiveEvent,
    ArchivedThread,
    UnsupportedChannel,
    SelfInteraction,
    LocationBlocked,
    RoleBlocked,
    TooOld,
    AuthorPrivate,
    CapacityReached,
    AlreadyShowcased,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutomatedAccount => "automated_account",
            Self::SystemContent => "system_content",
            Self::WebhookContent => "webhook_content",
            Self::UnsupportedMessageType => "unsupported_message_type",
            Self::ForwardedMessage => "forwarded_message",
            Self::ComponentsV2 => "components_v2",
            Self::InactiveEvent => "inactive_event",
            Self::ArchivedThread => "archived_thread",
            Self::UnsupportedChannel => "unsupported_channel",
            Self::SelfInteraction => "self_interaction",
            Self::LocationBlocked => "location_blocked",
            Self::RoleBlocked => "role_blocked",
            Self::TooOld => "too_old",
            Self::AuthorPrivate => "author_private",
            Self::CapacityReached => "capacity_reached",
            Self::AlreadyShowcased => "already_showcased",
        }
    }

    /// Text shown to a moderator when a manual feature request is refused.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::AutomatedAccount
            | Self::SystemContent
            | Self::WebhookContent
            | Self::UnsupportedMessageType => {
                "Messages from bots, webhooks or the system cannot be featured."
            }
            Self::ForwardedMessage => "Forwarded messages cannot be featured yet.",
            Self::ComponentsV2 => "Messages using the newer component layout cannot be featured yet.",
            Self::InactiveEvent => "Completed or cancelled events cannot be showcased.",
            Self::ArchivedThread => "Archived threads cannot be showcased.",
            Self::UnsupportedChannel => "Content in this kind of channel cannot be showcased.",
            Self::SelfInteraction => "Interacting with your own content does not count.",
            Self::LocationBlocked => "This channel or category is blocked from showcasing.",
            Self::RoleBlocked => "The author holds a role that is blocked from showcasing.",
            Self::TooOld => "That message is too old to be featured.",
            Self::AuthorPrivate => "The author's privacy settings do not allow featuring their messages.",
            Self::CapacityReached => {
                "The showcase is full for that category. Remove something first or wait for an entry to expire."
            }
            Self::AlreadyShowcased => "That message is already showcased.",
        }
    }
}

/// Which checks a caller needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    /// Automatic counting: every check.
    Engagement,
    /// Manual feature before the collection is chosen: no self-interaction, capacity or duplicate checks.
    FeaturePrecheck,
    /// Manual feature insert: every check except self-interaction.
    FeatureSubmit,
}

impl FilterMode {
    fn checks_self_interaction(&self) -> bool {
        matches!(self, Self::Engagement)
    }

    fn checks_collection(&self) -> bool {
        !matches!(self, Self::FeaturePrecheck)
    }
}

#[derive(Clone, Copy, Debug)]
pub enum Subject<'a> {
    Message(&'a MessageSnapshot),
    Thread(&'a ChannelSnapshot),
    Event(&'a ScheduledEventSnapshot),
}

impl Subject<'_> {
    fn author_id(&self) -> Option<&UserId> {
        match self {
            Self::Message(message) => Some(&message.author.id),
            Self::Thread(thread) => thread.owner_id.as_ref(),
            Self::Event(_) => None,
        }
    }
}

/// Everything the filter needs to judge one piece of content for one target collection.
#[derive(Clone, Copy, Debug)]
pub struct Candidate<'a> {
    pub guild_id: &'a GuildId,
    pub category: ShowcaseCategory,
    pub subject: Subject<'a>,
    /// User whose engagement triggered the check.
    pub actor_id: Option<&'a UserId>,
    pub actor: Option<&'a MemberSnapshot>,
    /// Member record of the message author or thread owner.
    pub author: Option<&'a MemberSnapshot>,
    /// Channel ids the content sits under, innermost first.
    pub location: &'a [ChannelId],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Eligible,
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }
}

pub struct EligibilityFilter {
    blocklist: Arc<dyn BlocklistRepository>,
    user_configs: Arc<dyn UserConfigRepository>,
    showcase: Arc<dyn ShowcaseStore>,
    limits: ShowcaseLimits,
    max_content_age: Duration,
    clock: Arc<dyn Clock>,
}

impl EligibilityFilter {
    pub fn new(
        blocklist: Arc<dyn BlocklistRepository>,
        user_configs: Arc<dyn UserConfigRepository>,
        showcase: Arc<dyn ShowcaseStore>,
        limits: ShowcaseLimits,
        max_content_age: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { blocklist, user_configs, showcase, limits, max_content_age, clock }
    }

    pub fn limits(&self) -> ShowcaseLimits {
        self.limits
    }

    pub async fn evaluate(
        &self,
        candidate: &Candidate<'_>,
        mode: FilterMode,
    ) -> Result<Verdict, StoreError> {
        let verdict = self.run_checks(candidate, mode).await?;
        if let Verdict::Rejected(reason) = verdict {
            debug!(
                event_name = "engine.eligibility.rejected",
                guild_id = %candidate.guild_id,
                category = candidate.category.as_str(),
                reason = reason.as_str(),
                "content not eligible"
            );
        }
        Ok(verdict)
    }

    async fn run_checks(
        &self,
        candidate: &Candidate<'_>,
        mode: FilterMode,
    ) -> Result<Verdict, StoreError> {
        if let Some(reason) = check_kind(candidate) {
            return Ok(Verdict::Rejected(reason));
        }

        if mode.checks_self_interaction() {
            if let (Subject::Message(message), Some(actor_id)) =
                (candidate.subject, candidate.actor_id)
            {
                if *actor_id == message.author.id {
                    return Ok(Verdict::Rejected(Rejection::SelfInteraction));
                }
            }
        }

        let location: Vec<String> = candidate.location.iter().map(|id| id.0.clone()).collect();
        if !location.is_empty() && self.blocklist.any_blocked(candidate.guild_id, &location).await?
        {
            return Ok(Verdict::Rejected(Rejection::LocationBlocked));
        }

        let roles = blockable_roles(candidate);
        if !roles.is_empty() && self.blocklist.any_blocked(candidate.guild_id, &roles).await? {
            return Ok(Verdict::Rejected(Rejection::RoleBlocked));
        }

        if self.is_too_old(candidate) {
            return Ok(Verdict::Rejected(Rejection::TooOld));
        }

        match candidate.subject.author_id() {
            Some(author_id) => {
                let privacy = self.user_configs.find(author_id).await?.map(|p| p.message_privacy);
                if privacy_blocks(privacy) {
                    return Ok(Verdict::Rejected(Rejection::AuthorPrivate));
                }
            }
            // unknown thread owner counts as no saved preference
            None if matches!(candidate.subject, Subject::Thread(_)) => {
                return Ok(Verdict::Rejected(Rejection::AuthorPrivate));
            }
            None => {}
        }

        if mode.checks_collection() {
            let limit = self.limits.for_category(candidate.category);
            if self.showcase.count(candidate.guild_id, candidate.category).await? >= limit {
                return Ok(Verdict::Rejected(Rejection::CapacityReached));
            }

            let content_id = match candidate.subject {
                Subject::Message(message) => message.id.clone(),
                Subject::Thread(thread) => (&thread.id).into(),
                Subject::Event(event) => event.id.clone(),
            };
            if self
                .showcase
                .exists(candidate.guild_id, &content_id, candidate.category.conflicting())
                .await?
            {
                return Ok(Verdict::Rejected(Rejection::AlreadyShowcased));
            }
        }

        Ok(Verdict::Eligible)
    }

    fn is_too_old(&self, candidate: &Candidate<'_>) -> bool {
        let created_at = match candidate.subject {
            Subject::Message(message) => Some(message.created_at),
            Subject::Thread(thread) => thread.created_at,
            Subject::Event(_) => None,
        };
        created_at.is_some_and(|at| self.clock.now() - at > self.max_content_age)
    }
}

fn check_kind(candidate: &Candidate<'_>) -> Option<Rejection> {
    let member_is_bot = |member: Option<&MemberSnapshot>| member.is_some_and(|m| m.bot);
    if member_is_bot(candidate.actor) || member_is_bot(candidate.author) {
        return Some(Rejection::AutomatedAccount);
    }

    match candidate.subject {
        Subject::Message(message) => {
            if message.author.bot {
                Some(Rejection::AutomatedAccount)
            } else if message.author.system || message.kind.is_system() {
                Some(Rejection::SystemContent)
            } else if message.webhook_id.is_some() {
                Some(Rejection::WebhookContent)
            } else if !message.kind.is_supported() {
                Some(Rejection::UnsupportedMessageType)
            } else if message.is_forward {
                Some(Rejection::ForwardedMessage)
            } else if message.uses_components_v2 {
                Some(Rejection::ComponentsV2)
            } else {
                None
            }
        }
        Subject::Thread(thread) => {
            if !thread.kind.is_public_thread() {
                Some(Rejection::UnsupportedChannel)
            } else if thread.archived {
                Some(Rejection::ArchivedThread)
            } else {
                None
            }
        }
        Subject::Event(event) => event.status.is_finished().then_some(Rejection::InactiveEvent),
    }
}

/// Roles of the actor and the author, minus the implicit everyone role.
fn blockable_roles(candidate: &Candidate<'_>) -> Vec<String> {
    let mut roles: Vec<String> = [candidate.actor, candidate.author]
        .into_iter()
        .flatten()
        .flat_map(|member| member.roles.iter())
        .filter(|role| !role.is_everyone(candidate.guild_id))
        .map(|role| role.0.clone())
        .collect();
    roles.sort();
    roles.dedup();
    roles
}

/// No saved preference blocks showcasing just like an explicit `Private`.
pub fn privacy_blocks(privacy: Option<MessagePrivacy>) -> bool {
    !privacy.is_some_and(|p| p.allows_showcasing())
}
