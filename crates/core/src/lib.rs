pub mod cache;
pub mod clock;
pub mod config;
pub mod domain;
pub mod eligibility;
pub mod errors;
pub mod feature;
pub mod janitor;
pub mod ports;
pub mod promotion;
pub mod thresholds;

#[cfg(test)]
mod testing;

pub use cache::{spawn_expiry_sweeper, ActivityCaches, CacheStats, CacheTtls};
pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::activity::{ActivityCategory, ActivityLevel};
pub use domain::engagement::{EngagementEvent, EngagementKind};
pub use domain::guild::{GuildActivityConfig, MessagePrivacy, UserPrivacy};
pub use domain::ids::{ChannelId, ContentId, GuildId, RoleId, UserId};
pub use domain::showcase::{ShowcaseCategory, ShowcaseLimits, ShowcaseType, ShowcasedItem};
pub use eligibility::{EligibilityFilter, Rejection};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use feature::{FeatureError, FeatureRequest, FeatureTarget, ManualFeatureFlow};
pub use janitor::{PurgeReport, ShowcaseJanitor};
pub use ports::{
    BlocklistRepository, GuildConfigRepository, PlatformError, PlatformLookup, ShowcaseStore,
    StoreError, UserConfigRepository,
};
pub use promotion::{PromotionEngine, PromotionError, PromotionOutcome};
