//! Platform gateway interface for HomeCord
//!
//! - **Events** (`events`) - gateway event shapes, the dispatcher, and handlers that feed the
//!   promotion engine, the manual feature flow and the showcase janitor
//! - **Runner** (`socket`) - pulls envelopes from a transport with reconnection logic
//! - **REST** (`rest`) - live message, member, channel and scheduled-event lookups
//!
//! ```text
//! Gateway → GatewayRunner → EventDispatcher → Handlers → PromotionEngine / ManualFeatureFlow / ShowcaseJanitor
//!                                                              ↓
//!                                                     RestPlatformLookup
//! ```

pub mod events;
pub mod rest;
pub mod socket;
