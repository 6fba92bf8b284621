//! Durable per-user profiles
//!
//! A profile holds the two cover letter documents, the saved job search
//! preference and the daily digest toggle. It is created on the first write
//! from any flow and never deleted.

mod store;
mod types;

pub use store::{toggle_alert, AlertToggle, FileProfileStore, MemoryProfileStore, ProfileStore};
pub use types::{JobPreference, UserProfile};
