pub mod activity;
pub mod blocklist;
pub mod content;
pub mod engagement;
pub mod guild;
pub mod ids;
pub mod showcase;
