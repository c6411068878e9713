//! Work timer with site lock-in for staying focused. A background daemon
//! tracks where browsing time goes, auto-pauses the timer when the user goes
//! idle and schedules wellness reminders; the cli drives the timer, the site
//! lists and the daily breakdown from a terminal.
//!

pub mod classifier;
pub mod cli;
pub mod daemon;
pub mod host;
pub mod storage;
pub mod timer;
pub mod utils;
