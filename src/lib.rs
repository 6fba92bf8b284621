//! jobpilot - Telegram job digest and cover letter assistant
//!
//! jobpilot searches job boards once a day on behalf of each user, delivers
//! a short digest of matching postings to Telegram and writes a German cover
//! letter for any posting the user picks, in the user's own style.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         jobpilot Gateway                          │
//! │                                                                   │
//! │   ┌──────────────┐  events   ┌──────────────────────────────┐    │
//! │   │   Telegram   │──────────▶│  Per-user lanes (ordered)     │    │
//! │   │   adapter    │◀──┐       └──────────────┬───────────────┘    │
//! │   └──────────────┘   │                      │                     │
//! │                      │       ┌──────────────▼───────────────┐    │
//! │                      │       │             Bot               │    │
//! │                      │       │  commands · links · buttons   │    │
//! │                      │       └───┬──────────┬───────────┬───┘    │
//! │                      │           │          │           │        │
//! │                      │  ┌────────▼───┐ ┌────▼──────┐ ┌──▼─────┐  │
//! │                      │  │Conversation│ │  Action   │ │ Digest │  │
//! │                      │  │  Engine    │ │ Resolver  │ │Scheduler│ │
//! │                      │  └─────┬──────┘ └──┬─────┬──┘ └─┬───┬──┘  │
//! │                      │        │           │     │      │   │     │
//! │                      │  ┌─────▼───────────▼─┐ ┌─▼──────▼┐  │     │
//! │                      │  │  Profile Store    │ │  Item   │  │     │
//! │                      │  └───────────────────┘ │  Cache  │  │     │
//! │                      │                        └─────────┘  │     │
//! │                      └──────────── notices ◀───────────────┘     │
//! │                                                                   │
//! │   Worker pool: job source · generator · document extraction      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`gateway`]: service lifecycle and the HTTP control API
//! - [`bot`]: command routing and per-user event lanes
//! - [`conversation`]: multi-step setup flows with checkpointed sessions
//! - [`digest`]: daily search and delivery of posting notices
//! - [`actions`]: button references and cover letter generation
//! - [`profile`]: durable user profiles
//! - [`cache`]: per-user batch of the latest postings
//! - [`channels`]: Telegram and recording adapters
//! - [`jobs`], [`generation`], [`documents`]: collaborator clients
//! - [`workers`]: bounded pool for blocking calls
//! - [`config`]: configuration management

pub mod actions;
pub mod bot;
pub mod cache;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod digest;
pub mod documents;
pub mod error;
pub mod gateway;
pub mod generation;
pub mod jobs;
pub mod profile;
pub mod workers;

mod storage;

#[cfg(test)]
mod testing;

pub use config::JobPilotConfig;
pub use error::{Error, Result};
