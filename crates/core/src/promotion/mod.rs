//! Threshold-driven promotion of engaged content into the showcase.

mod engine;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::domain::activity::ActivityLevel;
use crate::domain::showcase::ShowcasedItem;
use crate::eligibility::Rejection;
use crate::ports::{PlatformError, StoreError};
use crate::thresholds::Thresholds;

pub use engine::PromotionEngine;

/// Current count for one item, in the dimension(s) its category tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tally {
    Message { replies: u32, reactions: u32 },
    Thread { messages: u32 },
    /// Live interest count fetched from the platform, not a local counter.
    Event { interested: u32 },
}

impl Tally {
    pub fn meets(&self, thresholds: &Thresholds) -> bool {
        match *self {
            Self::Message { replies, reactions } => {
                replies >= thresholds.reply
                    || reactions >= thresholds.reaction
                    || replies + reactions >= thresholds.blended_message()
            }
            Self::Thread { messages } => messages >= thresholds.thread_message,
            Self::Event { interested } => interested >= thresholds.event_interest,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    NotConfigured,
    HomecordDisabled,
    CategoryDisabled,
    StarboardReaction,
    CooldownActive,
    Debounced,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::HomecordDisabled => "homecord_disabled",
            Self::CategoryDisabled => "category_disabled",
            Self::StarboardReaction => "starboard_reaction",
            Self::CooldownActive => "cooldown_active",
            Self::Debounced => "debounced",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// Counted, threshold not reached yet.
    Counting(Tally),
    Promoted(ShowcasedItem),
    /// Another attempt won the insert. Not an error.
    AlreadyPromoted,
    Rejected(Rejection),
    Skipped(SkipReason),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromotionError {
    #[error("showcase store failure: {0}")]
    Store(#[from] StoreError),
    #[error("platform lookup failure: {0}")]
    Platform(#[from] PlatformError),
    #[error("malformed engagement event: {0}")]
    MalformedEvent(String),
}

/// When a highlight comes down. Events end with the event itself when its end is still ahead.
pub fn highlight_expiry(
    level: ActivityLevel,
    now: DateTime<Utc>,
    scheduled_end: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    if let Some(end) = scheduled_end.filter(|end| *end > now) {
        return Some(end);
    }
    level.highlight_duration().map(|ttl: Duration| now + ttl)
}
