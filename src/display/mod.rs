//! Monitor blackout
//!
//! Picks the primary monitor and keeps an opaque cover window on every
//! other one.

pub mod blackout;
pub mod primary;


pub use blackout::{MonitorBlackoutManager, RefreshReport};
pub use primary::{find_primary, mark_primary, PrimarySource};
