//! Moderator-driven featuring that skips activity counting entirely.
//!
//! The flow has two steps: `precheck` runs when the context command is used and answers
//! whether the message may be featured at all; `submit` runs once the moderator picked
//! the collection and duration and performs the insert.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::domain::content::MessageSnapshot;
use crate::domain::ids::{ChannelId, ContentId, GuildId, UserId};
use crate::domain::showcase::{FeatureDuration, FeatureKind, ShowcaseCategory, ShowcaseType, ShowcasedItem};
use crate::eligibility::{Candidate, EligibilityFilter, FilterMode, Rejection, Subject, Verdict};
use crate::ports::{GuildConfigRepository, PlatformError, PlatformLookup, ShowcaseStore, StoreError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureTarget {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: ContentId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureRequest {
    pub target: FeatureTarget,
    pub kind: FeatureKind,
    pub duration: FeatureDuration,
    pub requested_by: UserId,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeatureError {
    #[error("guild has no stored settings")]
    NotConfigured,
    #[error("showcasing is disabled for this guild")]
    Disabled,
    #[error("message is not eligible: {}", .0.as_str())]
    Ineligible(Rejection),
    #[error("showcase store failure: {0}")]
    Store(#[from] StoreError),
    #[error("platform lookup failure: {0}")]
    Platform(#[from] PlatformError),
}

impl FeatureError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotConfigured => {
                "No settings were found for this server. Ask an admin to set it up first."
            }
            Self::Disabled => "Showcasing is turned off for this server.",
            Self::Ineligible(rejection) => rejection.user_message(),
            Self::Store(_) | Self::Platform(_) => {
                "Something went wrong while featuring that message. Please try again."
            }
        }
    }
}

pub struct ManualFeatureFlow {
    guild_configs: Arc<dyn GuildConfigRepository>,
    platform: Arc<dyn PlatformLookup>,
    showcase: Arc<dyn ShowcaseStore>,
    filter: Arc<EligibilityFilter>,
    clock: Arc<dyn Clock>,
}

impl ManualFeatureFlow {
    pub fn new(
        guild_configs: Arc<dyn GuildConfigRepository>,
        platform: Arc<dyn PlatformLookup>,
        showcase: Arc<dyn ShowcaseStore>,
        filter: Arc<EligibilityFilter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { guild_configs, platform, showcase, filter, clock }
    }

    pub async fn precheck(&self, target: &FeatureTarget) -> Result<MessageSnapshot, FeatureError> {
        self.ensure_enabled(&target.guild_id).await?;
        let message = self.platform.fetch_message(&target.channel_id, &target.message_id).await?;
        self.check(target, &message, ShowcaseCategory::Message, FilterMode::FeaturePrecheck).await?;
        Ok(message)
    }

    pub async fn submit(&self, request: FeatureRequest) -> Result<ShowcasedItem, FeatureError> {
        let target = &request.target;
        self.ensure_enabled(&target.guild_id).await?;
        let message = self.platform.fetch_message(&target.channel_id, &target.message_id).await?;
        let category = request.kind.category();
        self.check(target, &message, category, FilterMode::FeatureSubmit).await?;

        let now = self.clock.now();
        let item = ShowcasedItem {
            guild_id: target.guild_id.clone(),
            content_id: message.id.clone(),
            channel_id: Some(message.channel_id.clone()),
            category,
            showcase_type: ShowcaseType::Feature,
            expires_at: now + request.duration.as_duration(),
            created_at: now,
        };

        match self.showcase.insert(item.clone()).await {
            Ok(()) => {
                info!(
                    event_name = "engine.feature.featured",
                    guild_id = %item.guild_id,
                    content_id = %item.content_id,
                    category = category.as_str(),
                    duration = request.duration.as_str(),
                    requested_by = %request.requested_by,
                    "message featured"
                );
                Ok(item)
            }
            Err(StoreError::Duplicate) => Err(FeatureError::Ineligible(Rejection::AlreadyShowcased)),
            Err(StoreError::CapacityExceeded) => {
                Err(FeatureError::Ineligible(Rejection::CapacityReached))
            }
            Err(error) => {
                warn!(
                    event_name = "engine.feature.store_failed",
                    guild_id = %item.guild_id,
                    content_id = %item.content_id,
                    error = %error,
                    "feature write failed"
                );
                Err(error.into())
            }
        }
    }

    async fn ensure_enabled(&self, guild_id: &GuildId) -> Result<(), FeatureError> {
        match self.guild_configs.find(guild_id).await? {
            None => Err(FeatureError::NotConfigured),
            Some(config) if !config.homecord_enabled => Err(FeatureError::Disabled),
            Some(_) => Ok(()),
        }
    }

    async fn check(
        &self,
        target: &FeatureTarget,
        message: &MessageSnapshot,
        category: ShowcaseCategory,
        mode: FilterMode,
    ) -> Result<(), FeatureError> {
        let location = self.platform.fetch_channel(&message.channel_id).await?.location();
        let author = self.platform.fetch_member(&target.guild_id, &message.author.id).await?;
        let verdict = self
            .filter
            .evaluate(
                &Candidate {
                    guild_id: &target.guild_id,
                    category,
                    subject: Subject::Message(message),
                    actor_id: None,
                    actor: None,
                    author: author.as_ref(),
                    location: &location,
                },
                mode,
            )
            .await?;
        match verdict {
            Verdict::Eligible => Ok(()),
            Verdict::Rejected(rejection) => Err(FeatureError::Ineligible(rejection)),
        }
    }
}
