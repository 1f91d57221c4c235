//! Persistence of prayer requests in SQLite.

pub mod requests;

pub use requests::{PrayerRequest, PrayerStore};
