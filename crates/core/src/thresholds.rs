use crate::domain::activity::ActivityLevel;

/// Counts an item must reach at a given activity level before it is highlighted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Thresholds {
    pub reply: u32,
    pub reaction: u32,
    pub thread_message: u32,
    pub event_interest: u32,
}

impl Thresholds {
    /// Combined reply + reaction count that also qualifies a message.
    pub fn blended_message(&self) -> u32 {
        (self.reply + self.reaction).div_ceil(2)
    }
}

pub struct ThresholdTable;

impl ThresholdTable {
    pub fn lookup(level: ActivityLevel) -> Option<Thresholds> {
        let (reply, reaction, thread_message, event_interest) = match level {
            ActivityLevel::Disabled => return None,
            ActivityLevel::VeryLow => (2, 3, 5, 3),
            ActivityLevel::Low => (3, 5, 8, 5),
            ActivityLevel::Medium => (5, 8, 12, 8),
            ActivityLevel::High => (8, 12, 20, 12),
            ActivityLevel::VeryHigh => (12, 20, 30, 20),
        };
        Some(Thresholds { reply, reaction, thread_message, event_interest })
    }
}
