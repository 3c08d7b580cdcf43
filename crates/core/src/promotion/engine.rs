use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{highlight_expiry, PromotionError, PromotionOutcome, SkipReason, Tally};
use crate::cache::{ActivityCaches, ActivityCounter, EventDebounceMark, ThreadCounter};
use crate::clock::Clock;
use crate::domain::activity::ActivityLevel;
use crate::domain::engagement::{EngagementEvent, EngagementKind};
use crate::domain::guild::GuildActivityConfig;
use crate::domain::ids::{ChannelId, ContentId, GuildId};
use crate::domain::showcase::{ShowcaseCategory, ShowcaseType, ShowcasedItem};
use crate::eligibility::{Candidate, EligibilityFilter, FilterMode, Rejection, Subject, Verdict};
use crate::ports::{GuildConfigRepository, PlatformLookup, ShowcaseStore, StoreError};
use crate::thresholds::{ThresholdTable, Thresholds};

const STAR_EMOJI: &str = "\u{2b50}";

struct ActiveCategory {
    config: GuildActivityConfig,
    level: ActivityLevel,
    thresholds: Thresholds,
}

/// The item an engagement lands on, after its platform context passed the filter.
struct Target {
    content_id: ContentId,
    channel_id: Option<ChannelId>,
    scheduled_end: Option<DateTime<Utc>>,
    /// Count reported by the platform, for categories without a local counter.
    reported: u32,
}

impl Target {
    fn at(content_id: ContentId, channel_id: Option<ChannelId>) -> Self {
        Self { content_id, channel_id, scheduled_end: None, reported: 0 }
    }
}

type Screened = Result<Target, Rejection>;

/// Turns engagement events into counter updates and, once a threshold is crossed,
/// a single highlight in the showcase store.
///
/// Every kind runs the same steps: gate on guild config, admit, resolve and screen
/// the target, count, then commit.
pub struct PromotionEngine {
    guild_configs: Arc<dyn GuildConfigRepository>,
    platform: Arc<dyn PlatformLookup>,
    showcase: Arc<dyn ShowcaseStore>,
    filter: Arc<EligibilityFilter>,
    caches: Arc<ActivityCaches>,
    clock: Arc<dyn Clock>,
}

impl PromotionEngine {
    pub fn new(
        guild_configs: Arc<dyn GuildConfigRepository>,
        platform: Arc<dyn PlatformLookup>,
        showcase: Arc<dyn ShowcaseStore>,
        filter: Arc<EligibilityFilter>,
        caches: Arc<ActivityCaches>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { guild_configs, platform, showcase, filter, caches, clock }
    }

    pub fn caches(&self) -> &Arc<ActivityCaches> {
        &self.caches
    }

    pub async fn handle(&self, event: &EngagementEvent) -> Result<PromotionOutcome, PromotionError> {
        let outcome = self.promote(event).await?;

        match &outcome {
            PromotionOutcome::Skipped(reason) => debug!(
                event_name = "engine.promotion.skipped",
                guild_id = %event.guild_id,
                content_id = %event.content_id,
                kind = event.kind.as_str(),
                reason = reason.as_str(),
                "engagement skipped"
            ),
            PromotionOutcome::Rejected(reason) => debug!(
                event_name = "engine.promotion.rejected",
                guild_id = %event.guild_id,
                content_id = %event.content_id,
                kind = event.kind.as_str(),
                reason = reason.as_str(),
                "engagement not counted"
            ),
            PromotionOutcome::Counting(tally) => debug!(
                event_name = "engine.promotion.counted",
                guild_id = %event.guild_id,
                content_id = %event.content_id,
                kind = event.kind.as_str(),
                tally = ?tally,
                "engagement counted"
            ),
            PromotionOutcome::Promoted(_) | PromotionOutcome::AlreadyPromoted => {}
        }
        Ok(outcome)
    }

    async fn promote(&self, event: &EngagementEvent) -> Result<PromotionOutcome, PromotionError> {
        let active = match self.gate(&event.guild_id, event.kind).await? {
            Ok(active) => active,
            Err(reason) => return Ok(PromotionOutcome::Skipped(reason)),
        };
        if let Some(reason) = self.admit(event, &active.config) {
            return Ok(PromotionOutcome::Skipped(reason));
        }
        let target = match self.resolve(event).await? {
            Ok(target) => target,
            Err(rejection) => return Ok(PromotionOutcome::Rejected(rejection)),
        };

        let tally = self.count(event.kind, &target);
        if !tally.meets(&active.thresholds) {
            return Ok(PromotionOutcome::Counting(tally));
        }

        let claim = self.claim(event.kind, &target.content_id);
        if claim == Some(false) {
            return Ok(PromotionOutcome::Skipped(SkipReason::CooldownActive));
        }
        let content_id = target.content_id.clone();
        let outcome = self.commit(event, active.level, target).await;

        let settled = matches!(
            outcome,
            Ok(PromotionOutcome::Promoted(_)) | Ok(PromotionOutcome::AlreadyPromoted)
        );
        if claim == Some(true) && !settled {
            self.caches.reaction_cooldowns.update(&content_id, |mark| {
                mark.threshold_met = false;
            });
        }
        outcome
    }

    async fn gate(
        &self,
        guild_id: &GuildId,
        kind: EngagementKind,
    ) -> Result<Result<ActiveCategory, SkipReason>, PromotionError> {
        let Some(config) = self.guild_configs.find(guild_id).await? else {
            return Ok(Err(SkipReason::NotConfigured));
        };
        if !config.homecord_enabled {
            return Ok(Err(SkipReason::HomecordDisabled));
        }
        let level = config.level_for(kind.activity_category());
        let Some(thresholds) = ThresholdTable::lookup(level) else {
            return Ok(Err(SkipReason::CategoryDisabled));
        };
        Ok(Ok(ActiveCategory { config, level, thresholds }))
    }

    /// Cheap checks that need no platform lookup. Event interest consumes its debounce
    /// window here.
    fn admit(&self, event: &EngagementEvent, config: &GuildActivityConfig) -> Option<SkipReason> {
        match event.kind {
            EngagementKind::Reaction
                if !config.allow_starboard_reactions
                    && event.emoji.as_deref().is_some_and(is_starboard_emoji) =>
            {
                Some(SkipReason::StarboardReaction)
            }
            EngagementKind::EventInterest => {
                let (_, fresh) =
                    self.caches.event_debounce.get_or_create(event_id(event), || EventDebounceMark);
                (!fresh).then_some(SkipReason::Debounced)
            }
            _ => None,
        }
    }

    async fn resolve(&self, event: &EngagementEvent) -> Result<Screened, PromotionError> {
        match event.kind {
            EngagementKind::Reply | EngagementKind::Reaction => self.resolve_message(event).await,
            EngagementKind::ThreadMessage => self.resolve_thread(event).await,
            EngagementKind::EventInterest => self.resolve_event(event).await,
        }
    }

    async fn resolve_message(&self, event: &EngagementEvent) -> Result<Screened, PromotionError> {
        let channel_id = event.channel_id.as_ref().ok_or_else(|| {
            PromotionError::MalformedEvent(format!("{} without channel", event.kind.as_str()))
        })?;
        let message = self.platform.fetch_message(channel_id, &event.content_id).await?;
        let location = self.platform.fetch_channel(&message.channel_id).await?.location();
        let actor = self.platform.fetch_member(&event.guild_id, &event.actor_id).await?;
        let author = self.platform.fetch_member(&event.guild_id, &message.author.id).await?;

        let candidate = Candidate {
            guild_id: &event.guild_id,
            category: ShowcaseCategory::Message,
            subject: Subject::Message(&message),
            actor_id: Some(&event.actor_id),
            actor: actor.as_ref(),
            author: author.as_ref(),
            location: &location,
        };
        let target = Target::at(event.content_id.clone(), Some(channel_id.clone()));
        self.screen(&candidate, target).await
    }

    /// Location runs from the thread itself through its parent channel and category.
    async fn resolve_thread(&self, event: &EngagementEvent) -> Result<Screened, PromotionError> {
        let thread_id = event.thread_id.as_ref().or(event.channel_id.as_ref()).ok_or_else(|| {
            PromotionError::MalformedEvent("thread message without thread".to_owned())
        })?;
        let thread = self.platform.fetch_channel(thread_id).await?;
        let mut location = vec![thread.id.clone()];
        if let Some(parent_id) = &thread.parent_id {
            location.extend(self.platform.fetch_channel(parent_id).await?.location());
        }
        let actor = self.platform.fetch_member(&event.guild_id, &event.actor_id).await?;
        let owner = match &thread.owner_id {
            Some(owner_id) => self.platform.fetch_member(&event.guild_id, owner_id).await?,
            None => None,
        };

        let candidate = Candidate {
            guild_id: &event.guild_id,
            category: ShowcaseCategory::Thread,
            subject: Subject::Thread(&thread),
            actor_id: Some(&event.actor_id),
            actor: actor.as_ref(),
            author: owner.as_ref(),
            location: &location,
        };
        let target = Target::at(ContentId::from(&thread.id), thread.parent_id.clone());
        self.screen(&candidate, target).await
    }

    async fn resolve_event(&self, event: &EngagementEvent) -> Result<Screened, PromotionError> {
        let scheduled =
            self.platform.fetch_scheduled_event(&event.guild_id, event_id(event)).await?;
        let location = match &scheduled.channel_id {
            Some(channel_id) => self.platform.fetch_channel(channel_id).await?.location(),
            None => Vec::new(),
        };

        let candidate = Candidate {
            guild_id: &event.guild_id,
            category: ShowcaseCategory::Event,
            subject: Subject::Event(&scheduled),
            actor_id: None,
            actor: None,
            author: None,
            location: &location,
        };
        let target = Target {
            content_id: scheduled.id.clone(),
            channel_id: scheduled.channel_id.clone(),
            scheduled_end: scheduled.scheduled_end_time,
            reported: scheduled.user_count,
        };
        self.screen(&candidate, target).await
    }

    async fn screen(
        &self,
        candidate: &Candidate<'_>,
        target: Target,
    ) -> Result<Screened, PromotionError> {
        Ok(match self.filter.evaluate(candidate, FilterMode::Engagement).await? {
            Verdict::Eligible => Ok(target),
            Verdict::Rejected(rejection) => Err(rejection),
        })
    }

    /// Bumps the counter the kind feeds and returns the resulting tally.
    fn count(&self, kind: EngagementKind, target: &Target) -> Tally {
        let content_id = &target.content_id;
        match kind {
            EngagementKind::Reply | EngagementKind::Reaction => {
                let replies = u32::from(kind == EngagementKind::Reply);
                let reactions = 1 - replies;
                let now = self.clock.now();
                let (counter, _) = self.caches.messages.upsert(
                    content_id,
                    || ActivityCounter {
                        id: content_id.clone(),
                        reply_count: replies,
                        reaction_count: reactions,
                        created_at: now,
                    },
                    |counter| {
                        counter.reply_count += replies;
                        counter.reaction_count += reactions;
                    },
                );
                if kind == EngagementKind::Reaction {
                    self.caches.reaction_cooldowns.get_or_create(content_id, Default::default);
                }
                Tally::Message { replies: counter.reply_count, reactions: counter.reaction_count }
            }
            EngagementKind::ThreadMessage => {
                let (counter, _) = self.caches.threads.upsert(
                    content_id,
                    || ThreadCounter { id: content_id.clone(), message_count: 1 },
                    |counter| counter.message_count += 1,
                );
                Tally::Thread { messages: counter.message_count }
            }
            EngagementKind::EventInterest => Tally::Event { interested: target.reported },
        }
    }

    /// The cooldown mark lets exactly one of a burst of reactions attempt the insert.
    /// `None` when the kind has no cooldown or the mark already expired.
    fn claim(&self, kind: EngagementKind, content_id: &ContentId) -> Option<bool> {
        if kind != EngagementKind::Reaction {
            return None;
        }
        self.caches.reaction_cooldowns.update(content_id, |mark| {
            if mark.threshold_met {
                false
            } else {
                mark.threshold_met = true;
                true
            }
        })
    }

    /// Writes the highlight and evicts the counter. A failed write keeps the counter so the
    /// next engagement retries.
    async fn commit(
        &self,
        event: &EngagementEvent,
        level: ActivityLevel,
        target: Target,
    ) -> Result<PromotionOutcome, PromotionError> {
        let now = self.clock.now();
        let Some(expires_at) = highlight_expiry(level, now, target.scheduled_end) else {
            return Ok(PromotionOutcome::Skipped(SkipReason::CategoryDisabled));
        };
        let item = ShowcasedItem {
            guild_id: event.guild_id.clone(),
            content_id: target.content_id,
            channel_id: target.channel_id,
            category: event.kind.activity_category().showcase_category(),
            showcase_type: ShowcaseType::Highlight,
            expires_at,
            created_at: now,
        };

        match self.showcase.insert(item.clone()).await {
            Ok(()) => {
                self.evict(event.kind, &item.content_id);
                info!(
                    event_name = "engine.promotion.highlighted",
                    guild_id = %item.guild_id,
                    content_id = %item.content_id,
                    category = item.category.as_str(),
                    expires_at = %item.expires_at,
                    "content highlighted"
                );
                Ok(PromotionOutcome::Promoted(item))
            }
            Err(StoreError::Duplicate) => {
                self.evict(event.kind, &item.content_id);
                debug!(
                    event_name = "engine.promotion.duplicate",
                    guild_id = %item.guild_id,
                    content_id = %item.content_id,
                    "content already highlighted by a concurrent attempt"
                );
                Ok(PromotionOutcome::AlreadyPromoted)
            }
            Err(StoreError::CapacityExceeded) => {
                Ok(PromotionOutcome::Rejected(Rejection::CapacityReached))
            }
            Err(error) => {
                warn!(
                    event_name = "engine.promotion.store_failed",
                    guild_id = %item.guild_id,
                    content_id = %item.content_id,
                    category = item.category.as_str(),
                    error = %error,
                    "highlight write failed; counter retained"
                );
                Err(error.into())
            }
        }
    }

    fn evict(&self, kind: EngagementKind, content_id: &ContentId) {
        match kind {
            EngagementKind::Reply | EngagementKind::Reaction => {
                self.caches.messages.delete(content_id);
            }
            EngagementKind::ThreadMessage => {
                self.caches.threads.delete(content_id);
            }
            EngagementKind::EventInterest => {}
        }
    }
}

fn event_id(event: &EngagementEvent) -> &ContentId {
    event.event_id.as_ref().unwrap_or(&event.content_id)
}

fn is_starboard_emoji(emoji: &str) -> bool {
    emoji == STAR_EMOJI || emoji.eq_ignore_ascii_case("star")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::PromotionEngine;
    use crate::cache::{ActivityCaches, CacheTtls};
    use crate::clock::Clock;
    use crate::domain::activity::ActivityLevel;
    use crate::domain::blocklist::{BlockType, BlocklistEntry};
    use crate::domain::content::MessageKind;
    use crate::domain::engagement::EngagementEvent;
    use crate::domain::guild::{GuildActivityConfig, MessagePrivacy};
    use crate::domain::ids::{ChannelId, ContentId, UserId};
    use crate::domain::showcase::{ShowcaseCategory, ShowcaseLimits, ShowcaseType};
    use crate::eligibility::{EligibilityFilter, Rejection};
    use crate::ports::{BlocklistRepository, GuildConfigRepository, PlatformError, StoreError};
    use crate::promotion::{PromotionError, PromotionOutcome, SkipReason, Tally};
    use crate::testing::{self, Fixture};

    fn engine(fixture: &Fixture) -> PromotionEngine {
        let filter = EligibilityFilter::new(
            fixture.blocklist.clone(),
            fixture.users.clone(),
            fixture.showcase.clone(),
            ShowcaseLimits::default(),
            Duration::days(7),
            fixture.clock.clone(),
        );
        PromotionEngine::new(
            fixture.guild_configs.clone(),
            fixture.platform.clone(),
            fixture.showcase.clone(),
            Arc::new(filter),
            Arc::new(ActivityCaches::new(CacheTtls::default(), fixture.clock.clone())),
            fixture.clock.clone(),
        )
    }

    async fn enable(fixture: &Fixture, level: ActivityLevel) {
        let mut config = GuildActivityConfig::new(fixture.guild_id.clone());
        config.homecord_enabled = true;
        config.message_activity_level = level;
        config.thread_activity_level = level;
        config.event_activity_level = level;
        fixture.guild_configs.save(config).await.expect("save config");
    }

    async fn seed_message(fixture: &Fixture, id: &str, author: &str) {
        fixture.platform.put_message(fixture.message(id, author)).await;
        fixture.platform.put_channel(testing::text_channel("general", Some("cat-1"))).await;
    }

    fn reply(fixture: &Fixture, from: &str, to: &str) -> EngagementEvent {
        EngagementEvent::reply(
            fixture.guild_id.clone(),
            UserId(from.to_owned()),
            ChannelId("general".to_owned()),
            ContentId(to.to_owned()),
            fixture.clock.now(),
        )
    }

    fn reaction(fixture: &Fixture, from: &str, to: &str, emoji: &str) -> EngagementEvent {
        EngagementEvent::reaction(
            fixture.guild_id.clone(),
            UserId(from.to_owned()),
            ChannelId("general".to_owned()),
            ContentId(to.to_owned()),
            emoji,
            fixture.clock.now(),
        )
    }

    fn interest(fixture: &Fixture, from: &str, event: &str) -> EngagementEvent {
        EngagementEvent::event_interest(
            fixture.guild_id.clone(),
            UserId(from.to_owned()),
            ContentId(event.to_owned()),
            fixture.clock.now(),
        )
    }

    #[tokio::test]
    async fn three_replies_at_low_level_highlight_for_seven_days() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::Low).await;
        fixture.set_privacy("author", MessagePrivacy::Public).await;
        seed_message(&fixture, "m1", "author").await;
        let engine = engine(&fixture);

        let first = engine.handle(&reply(&fixture, "r1", "m1")).await.expect("first reply");
        assert_eq!(first, PromotionOutcome::Counting(Tally::Message { replies: 1, reactions: 0 }));
        let second = engine.handle(&reply(&fixture, "r2", "m1")).await.expect("second reply");
        assert_eq!(second, PromotionOutcome::Counting(Tally::Message { replies: 2, reactions: 0 }));

        let third = engine.handle(&reply(&fixture, "r3", "m1")).await.expect("third reply");
        let PromotionOutcome::Promoted(item) = third else {
            panic!("expected promotion, got {third:?}");
        };
        assert_eq!(item.showcase_type, ShowcaseType::Highlight);
        assert_eq!(item.category, ShowcaseCategory::Message);
        assert_eq!(item.expires_at, fixture.clock.now() + Duration::days(7));
        assert_eq!(item.channel_id, Some(ChannelId("general".to_owned())));
        assert!(!engine.caches().messages.contains(&ContentId("m1".to_owned())));
        assert_eq!(fixture.showcase.items().await.len(), 1);
    }

    #[tokio::test]
    async fn mixed_engagement_meets_blended_threshold() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::Low).await;
        fixture.set_privacy("author", MessagePrivacy::Public).await;
        seed_message(&fixture, "m1", "author").await;
        let engine = engine(&fixture);

        engine.handle(&reply(&fixture, "r1", "m1")).await.expect("reply");
        engine.handle(&reaction(&fixture, "x1", "m1", "fire")).await.expect("reaction");
        engine.handle(&reply(&fixture, "r2", "m1")).await.expect("reply");
        let outcome =
            engine.handle(&reaction(&fixture, "x2", "m1", "fire")).await.expect("reaction");
        assert!(matches!(outcome, PromotionOutcome::Promoted(_)), "got {outcome:?}");
    }

    #[tokio::test]
    async fn reaction_burst_writes_exactly_once() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::Low).await;
        fixture.set_privacy("author", MessagePrivacy::Public).await;
        seed_message(&fixture, "m1", "author").await;
        let engine = engine(&fixture);

        let first = engine.handle(&reaction(&fixture, "u0", "m1", "fire")).await.expect("first");
        assert_eq!(first, PromotionOutcome::Counting(Tally::Message { replies: 0, reactions: 1 }));

        let (a, b, c, d) = (
            reaction(&fixture, "u1", "m1", "fire"),
            reaction(&fixture, "u2", "m1", "fire"),
            reaction(&fixture, "u3", "m1", "fire"),
            reaction(&fixture, "u4", "m1", "fire"),
        );
        let results =
            tokio::join!(engine.handle(&a), engine.handle(&b), engine.handle(&c), engine.handle(&d));
        let outcomes = [
            results.0.expect("burst 1"),
            results.1.expect("burst 2"),
            results.2.expect("burst 3"),
            results.3.expect("burst 4"),
        ];

        let promoted =
            outcomes.iter().filter(|o| matches!(o, PromotionOutcome::Promoted(_))).count();
        assert_eq!(promoted, 1, "outcomes: {outcomes:?}");
        assert!(outcomes.iter().all(|o| matches!(
            o,
            PromotionOutcome::Promoted(_)
                | PromotionOutcome::Counting(_)
                | PromotionOutcome::AlreadyPromoted
                | PromotionOutcome::Rejected(Rejection::AlreadyShowcased)
                | PromotionOutcome::Skipped(SkipReason::CooldownActive)
        )));
        assert_eq!(fixture.showcase.items().await.len(), 1);
        assert_eq!(
            fixture.showcase.insert_attempts.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn concurrent_reply_promotions_resolve_through_store_duplicate() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::Low).await;
        fixture.set_privacy("author", MessagePrivacy::Public).await;
        seed_message(&fixture, "m1", "author").await;
        let engine = engine(&fixture);
        engine.handle(&reply(&fixture, "r1", "m1")).await.expect("reply");
        engine.handle(&reply(&fixture, "r2", "m1")).await.expect("reply");

        let (a, b) = (reply(&fixture, "r3", "m1"), reply(&fixture, "r4", "m1"));
        let (left, right) = tokio::join!(engine.handle(&a), engine.handle(&b));
        let outcomes = [left.expect("left"), right.expect("right")];

        assert_eq!(
            outcomes.iter().filter(|o| matches!(o, PromotionOutcome::Promoted(_))).count(),
            1
        );
        assert!(outcomes.contains(&PromotionOutcome::AlreadyPromoted), "outcomes: {outcomes:?}");
        assert_eq!(fixture.showcase.items().await.len(), 1);
    }

    #[tokio::test]
    async fn private_author_is_never_promoted() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::VeryLow).await;
        fixture.set_privacy("author", MessagePrivacy::Private).await;
        seed_message(&fixture, "m1", "author").await;
        let engine = engine(&fixture);

        for n in 0..6 {
            let outcome =
                engine.handle(&reply(&fixture, &format!("r{n}"), "m1")).await.expect("reply");
            assert_eq!(outcome, PromotionOutcome::Rejected(Rejection::AuthorPrivate));
            let outcome = engine
                .handle(&reaction(&fixture, &format!("x{n}"), "m1", "fire"))
                .await
                .expect("reaction");
            assert_eq!(outcome, PromotionOutcome::Rejected(Rejection::AuthorPrivate));
        }
        assert!(fixture.showcase.items().await.is_empty());
        assert!(engine.caches().messages.is_empty());
    }

    #[tokio::test]
    async fn event_promotes_once_threshold_met_and_debounces_repeats() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::Low).await;
        fixture.platform.put_event(testing::scheduled_event(&fixture.guild_id, "e1", 4)).await;
        let engine = engine(&fixture);

        let below = engine.handle(&interest(&fixture, "u1", "e1")).await.expect("below");
        assert_eq!(below, PromotionOutcome::Counting(Tally::Event { interested: 4 }));

        fixture.clock.advance(Duration::minutes(61));
        fixture.platform.put_event(testing::scheduled_event(&fixture.guild_id, "e1", 5)).await;
        let met = engine.handle(&interest(&fixture, "u2", "e1")).await.expect("met");
        let PromotionOutcome::Promoted(item) = met else {
            panic!("expected promotion, got {met:?}");
        };
        assert_eq!(item.category, ShowcaseCategory::Event);
        assert_eq!(item.expires_at, fixture.clock.now() + Duration::days(7));

        let repeat = engine.handle(&interest(&fixture, "u3", "e1")).await.expect("repeat");
        assert_eq!(repeat, PromotionOutcome::Skipped(SkipReason::Debounced));
        assert_eq!(fixture.platform.event_fetches.load(std::sync::atomic::Ordering::SeqCst), 2);

        fixture.clock.advance(Duration::minutes(61));
        let later = engine.handle(&interest(&fixture, "u4", "e1")).await.expect("later");
        assert_eq!(later, PromotionOutcome::Rejected(Rejection::AlreadyShowcased));
        assert_eq!(fixture.showcase.items().await.len(), 1);
    }

    #[tokio::test]
    async fn event_highlight_ends_with_the_event() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::VeryLow).await;
        let mut scheduled = testing::scheduled_event(&fixture.guild_id, "e1", 10);
        let end = fixture.clock.now() + Duration::hours(2);
        scheduled.scheduled_end_time = Some(end);
        fixture.platform.put_event(scheduled).await;
        let engine = engine(&fixture);

        let outcome = engine.handle(&interest(&fixture, "u1", "e1")).await.expect("interest");
        let PromotionOutcome::Promoted(item) = outcome else {
            panic!("expected promotion, got {outcome:?}");
        };
        assert_eq!(item.expires_at, end);
    }

    #[tokio::test]
    async fn counter_expiring_before_threshold_produces_nothing() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::Low).await;
        fixture.set_privacy("author", MessagePrivacy::Public).await;
        seed_message(&fixture, "m1", "author").await;
        let engine = engine(&fixture);

        engine.handle(&reply(&fixture, "r1", "m1")).await.expect("reply");
        engine.handle(&reply(&fixture, "r2", "m1")).await.expect("reply");
        fixture.clock.advance(Duration::days(3));
        assert_eq!(engine.caches().sweep().messages, 1);

        let outcome = engine.handle(&reply(&fixture, "r3", "m1")).await.expect("reply");
        assert_eq!(outcome, PromotionOutcome::Counting(Tally::Message { replies: 1, reactions: 0 }));
        assert!(fixture.showcase.items().await.is_empty());
    }

    #[tokio::test]
    async fn store_failure_keeps_counter_for_retry() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::Low).await;
        fixture.set_privacy("author", MessagePrivacy::Public).await;
        seed_message(&fixture, "m1", "author").await;
        let engine = engine(&fixture);
        engine.handle(&reply(&fixture, "r1", "m1")).await.expect("reply");
        engine.handle(&reply(&fixture, "r2", "m1")).await.expect("reply");

        fixture.showcase.fail_next_inserts(1);
        let failed = engine.handle(&reply(&fixture, "r3", "m1")).await;
        assert!(matches!(failed, Err(PromotionError::Store(StoreError::Unavailable(_)))));
        let counter =
            engine.caches().messages.get(&ContentId("m1".to_owned())).expect("counter kept");
        assert_eq!(counter.reply_count, 3);

        let retried = engine.handle(&reply(&fixture, "r4", "m1")).await.expect("retry");
        assert!(matches!(retried, PromotionOutcome::Promoted(_)));
    }

    #[tokio::test]
    async fn failed_reaction_write_releases_cooldown() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::VeryLow).await;
        fixture.set_privacy("author", MessagePrivacy::Public).await;
        seed_message(&fixture, "m1", "author").await;
        let engine = engine(&fixture);
        engine.handle(&reaction(&fixture, "u1", "m1", "fire")).await.expect("reaction");
        engine.handle(&reaction(&fixture, "u2", "m1", "fire")).await.expect("reaction");

        fixture.showcase.fail_next_inserts(1);
        assert!(engine.handle(&reaction(&fixture, "u3", "m1", "fire")).await.is_err());

        let outcome = engine.handle(&reaction(&fixture, "u4", "m1", "fire")).await.expect("retry");
        assert!(matches!(outcome, PromotionOutcome::Promoted(_)), "got {outcome:?}");
    }

    #[tokio::test]
    async fn blocklist_change_applies_at_promotion_time() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::Low).await;
        fixture.set_privacy("author", MessagePrivacy::Public).await;
        seed_message(&fixture, "m1", "author").await;
        let engine = engine(&fixture);
        engine.handle(&reply(&fixture, "r1", "m1")).await.expect("reply");
        engine.handle(&reply(&fixture, "r2", "m1")).await.expect("reply");

        fixture
            .blocklist
            .add(BlocklistEntry::new(fixture.guild_id.clone(), "cat-1", BlockType::Category))
            .await
            .expect("block category");
        let outcome = engine.handle(&reply(&fixture, "r3", "m1")).await.expect("reply");
        assert_eq!(outcome, PromotionOutcome::Rejected(Rejection::LocationBlocked));
        assert!(fixture.showcase.items().await.is_empty());
    }

    #[tokio::test]
    async fn replying_to_yourself_does_not_count() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::Low).await;
        fixture.set_privacy("author", MessagePrivacy::Public).await;
        seed_message(&fixture, "m1", "author").await;
        let engine = engine(&fixture);

        let outcome = engine.handle(&reply(&fixture, "author", "m1")).await.expect("reply");
        assert_eq!(outcome, PromotionOutcome::Rejected(Rejection::SelfInteraction));
        assert!(engine.caches().messages.is_empty());
    }

    #[tokio::test]
    async fn guild_gates_short_circuit() {
        let fixture = Fixture::new();
        fixture.set_privacy("author", MessagePrivacy::Public).await;
        seed_message(&fixture, "m1", "author").await;
        let engine = engine(&fixture);

        let outcome = engine.handle(&reply(&fixture, "r1", "m1")).await.expect("reply");
        assert_eq!(outcome, PromotionOutcome::Skipped(SkipReason::NotConfigured));

        fixture
            .guild_configs
            .save(GuildActivityConfig::new(fixture.guild_id.clone()))
            .await
            .expect("save config");
        let outcome = engine.handle(&reply(&fixture, "r1", "m1")).await.expect("reply");
        assert_eq!(outcome, PromotionOutcome::Skipped(SkipReason::HomecordDisabled));

        enable(&fixture, ActivityLevel::Disabled).await;
        let outcome = engine.handle(&reply(&fixture, "r1", "m1")).await.expect("reply");
        assert_eq!(outcome, PromotionOutcome::Skipped(SkipReason::CategoryDisabled));
    }

    #[tokio::test]
    async fn star_reactions_ignored_unless_allowed() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::Low).await;
        fixture.set_privacy("author", MessagePrivacy::Public).await;
        seed_message(&fixture, "m1", "author").await;
        let engine = engine(&fixture);

        let outcome =
            engine.handle(&reaction(&fixture, "u1", "m1", "\u{2b50}")).await.expect("reaction");
        assert_eq!(outcome, PromotionOutcome::Skipped(SkipReason::StarboardReaction));

        let mut config = fixture
            .guild_configs
            .find(&fixture.guild_id)
            .await
            .expect("find")
            .expect("config present");
        config.allow_starboard_reactions = true;
        fixture.guild_configs.save(config).await.expect("save");
        let outcome =
            engine.handle(&reaction(&fixture, "u1", "m1", "\u{2b50}")).await.expect("reaction");
        assert_eq!(outcome, PromotionOutcome::Counting(Tally::Message { replies: 0, reactions: 1 }));
    }

    #[tokio::test]
    async fn busy_thread_is_highlighted_under_its_parent() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::VeryLow).await;
        fixture.set_privacy("owner", MessagePrivacy::Anonymous).await;
        fixture.platform.put_channel(testing::thread("t1", "forum", "owner")).await;
        fixture.platform.put_channel(testing::text_channel("forum", Some("cat-1"))).await;
        let engine = engine(&fixture);

        let mut last = None;
        for n in 0..5 {
            let event = EngagementEvent::thread_message(
                fixture.guild_id.clone(),
                UserId(format!("u{n}")),
                ChannelId("t1".to_owned()),
                fixture.clock.now(),
            );
            last = Some(engine.handle(&event).await.expect("thread message"));
        }
        let Some(PromotionOutcome::Promoted(item)) = last else {
            panic!("expected promotion, got {last:?}");
        };
        assert_eq!(item.category, ShowcaseCategory::Thread);
        assert_eq!(item.channel_id, Some(ChannelId("forum".to_owned())));
        assert_eq!(item.expires_at, fixture.clock.now() + Duration::days(7));
    }

    #[tokio::test]
    async fn missing_message_surfaces_platform_error() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::Low).await;
        let engine = engine(&fixture);

        let outcome = engine.handle(&reply(&fixture, "r1", "gone")).await;
        assert!(matches!(outcome, Err(PromotionError::Platform(PlatformError::NotFound(_)))));
    }

    #[tokio::test]
    async fn blocked_author_role_stops_replies_and_reactions() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::VeryLow).await;
        fixture.set_privacy("author", MessagePrivacy::Public).await;
        seed_message(&fixture, "m1", "author").await;
        fixture.platform.put_member(testing::member("author", &["mods"])).await;
        fixture
            .blocklist
            .add(BlocklistEntry::new(fixture.guild_id.clone(), "mods", BlockType::Role))
            .await
            .expect("block role");
        let engine = engine(&fixture);

        let outcome = engine.handle(&reply(&fixture, "r1", "m1")).await.expect("reply");
        assert_eq!(outcome, PromotionOutcome::Rejected(Rejection::RoleBlocked));
        let outcome =
            engine.handle(&reaction(&fixture, "x1", "m1", "fire")).await.expect("reaction");
        assert_eq!(outcome, PromotionOutcome::Rejected(Rejection::RoleBlocked));
        assert!(engine.caches().messages.is_empty());
    }

    #[tokio::test]
    async fn blocked_parent_channel_stops_thread_messages() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::VeryLow).await;
        fixture.set_privacy("owner", MessagePrivacy::Public).await;
        fixture.platform.put_channel(testing::thread("t1", "forum", "owner")).await;
        fixture.platform.put_channel(testing::text_channel("forum", Some("cat-1"))).await;
        fixture
            .blocklist
            .add(BlocklistEntry::new(fixture.guild_id.clone(), "forum", BlockType::Channel))
            .await
            .expect("block channel");
        let engine = engine(&fixture);

        let event = EngagementEvent::thread_message(
            fixture.guild_id.clone(),
            UserId("u1".to_owned()),
            ChannelId("t1".to_owned()),
            fixture.clock.now(),
        );
        let outcome = engine.handle(&event).await.expect("thread message");
        assert_eq!(outcome, PromotionOutcome::Rejected(Rejection::LocationBlocked));
        assert!(engine.caches().threads.is_empty());
    }

    #[tokio::test]
    async fn event_hosted_under_blocked_category_is_rejected() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::VeryLow).await;
        let mut scheduled = testing::scheduled_event(&fixture.guild_id, "e1", 50);
        scheduled.channel_id = Some(ChannelId("stage".to_owned()));
        fixture.platform.put_event(scheduled).await;
        fixture.platform.put_channel(testing::text_channel("stage", Some("cat-9"))).await;
        fixture
            .blocklist
            .add(BlocklistEntry::new(fixture.guild_id.clone(), "cat-9", BlockType::Category))
            .await
            .expect("block category");
        let engine = engine(&fixture);

        let outcome = engine.handle(&interest(&fixture, "u1", "e1")).await.expect("interest");
        assert_eq!(outcome, PromotionOutcome::Rejected(Rejection::LocationBlocked));
        assert!(fixture.showcase.items().await.is_empty());
    }

    #[tokio::test]
    async fn automated_and_system_content_never_counts() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::VeryLow).await;
        fixture.set_privacy("author", MessagePrivacy::Public).await;
        fixture.platform.put_channel(testing::text_channel("general", Some("cat-1"))).await;

        let mut from_bot = fixture.message("m-bot", "author");
        from_bot.author.bot = true;
        let mut system = fixture.message("m-sys", "author");
        system.kind = MessageKind::System(7);
        let mut components = fixture.message("m-cv2", "author");
        components.uses_components_v2 = true;
        for message in [from_bot, system, components] {
            fixture.platform.put_message(message).await;
        }
        seed_message(&fixture, "m1", "author").await;
        let mut bot_member = testing::member("helper-bot", &[]);
        bot_member.bot = true;
        fixture.platform.put_member(bot_member).await;
        let engine = engine(&fixture);

        let cases = [
            (reply(&fixture, "r1", "m-bot"), Rejection::AutomatedAccount),
            (reaction(&fixture, "helper-bot", "m1", "fire"), Rejection::AutomatedAccount),
            (reply(&fixture, "r1", "m-sys"), Rejection::SystemContent),
            (reaction(&fixture, "x1", "m-cv2", "fire"), Rejection::ComponentsV2),
        ];
        for (event, expected) in cases {
            let outcome = engine.handle(&event).await.expect("engagement");
            assert_eq!(outcome, PromotionOutcome::Rejected(expected), "{}", event.content_id);
        }
        assert!(engine.caches().messages.is_empty());
    }

    #[tokio::test]
    async fn replies_topped_up_by_reaction_burst_claim_once() {
        let fixture = Fixture::new();
        enable(&fixture, ActivityLevel::Low).await;
        fixture.set_privacy("author", MessagePrivacy::Public).await;
        seed_message(&fixture, "m1", "author").await;
        let engine = engine(&fixture);

        engine.handle(&reply(&fixture, "r1", "m1")).await.expect("reply");
        engine.handle(&reply(&fixture, "r2", "m1")).await.expect("reply");
        let first = engine.handle(&reaction(&fixture, "u0", "m1", "fire")).await.expect("first");
        assert_eq!(first, PromotionOutcome::Counting(Tally::Message { replies: 2, reactions: 1 }));

        let (a, b, c) = (
            reaction(&fixture, "u1", "m1", "fire"),
            reaction(&fixture, "u2", "m1", "fire"),
            reaction(&fixture, "u3", "m1", "fire"),
        );
        let results = tokio::join!(engine.handle(&a), engine.handle(&b), engine.handle(&c));
        let outcomes =
            [results.0.expect("burst 1"), results.1.expect("burst 2"), results.2.expect("burst 3")];

        assert_eq!(
            outcomes.iter().filter(|o| matches!(o, PromotionOutcome::Promoted(_))).count(),
            1,
            "outcomes: {outcomes:?}"
        );
        assert!(outcomes.iter().all(|o| matches!(
            o,
            PromotionOutcome::Promoted(_)
                | PromotionOutcome::Counting(_)
                | PromotionOutcome::Rejected(Rejection::AlreadyShowcased)
                | PromotionOutcome::Skipped(SkipReason::CooldownActive)
        )));
        assert_eq!(
            fixture.showcase.insert_attempts.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }
}
