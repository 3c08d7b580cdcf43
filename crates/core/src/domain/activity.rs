use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::domain::showcase::ShowcaseCategory;

/// Per-category sensitivity a guild picks for automatic highlighting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum ActivityLevel {
    Disabled,
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ActivityLevel {
    pub const ALL: [ActivityLevel; 6] =
        [Self::Disabled, Self::VeryLow, Self::Low, Self::Medium, Self::High, Self::VeryHigh];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "DISABLED",
            Self::VeryLow => "VERY-LOW",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::VeryHigh => "VERY-HIGH",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().replace('_', "-").as_str() {
            "DISABLED" => Some(Self::Disabled),
            "VERY-LOW" => Some(Self::VeryLow),
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            "VERY-HIGH" => Some(Self::VeryHigh),
            _ => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// How long an automatic highlight stays up. Quieter guilds keep highlights longer.
    pub fn highlight_duration(&self) -> Option<Duration> {
        match self {
            Self::Disabled => None,
            Self::VeryLow | Self::Low => Some(Duration::days(7)),
            Self::Medium => Some(Duration::days(5)),
            Self::High | Self::VeryHigh => Some(Duration::days(3)),
        }
    }
}

/// The three engagement streams the engine watches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityCategory {
    Message,
    Thread,
    Event,
}

impl ActivityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Thread => "thread",
            Self::Event => "event",
        }
    }

    /// Collection an automatic highlight for this stream lands in.
    pub fn showcase_category(&self) -> ShowcaseCategory {
        match self {
            Self::Message => ShowcaseCategory::Message,
            Self::Thread => ShowcaseCategory::Thread,
            Self::Event => ShowcaseCategory::Event,
        }
    }
}
