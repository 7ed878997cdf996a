//! Core domain + application logic for the community moderation bot.
//!
//! This crate is framework-agnostic. The chat platform and the persistent
//! store live behind ports (traits) implemented in adapter crates.

pub mod access;
pub mod audit;
pub mod config;
pub mod context;
pub mod domain;
pub mod errors;
pub mod governor;
pub mod logging;
pub mod platform;
pub mod rights;
pub mod router;
pub mod store;
pub mod sweeper;
pub mod threshold;
pub mod votes;

#[cfg(test)]
pub(crate) mod testing;

pub use context::BotContext;
pub use errors::{Error, Result};
