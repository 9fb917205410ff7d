//! Core of the Chronicle chat bot.
//!
//! Command dispatch, the command registry, per-room custom commands and the
//! dice / arithmetic evaluator. The crate is transport-agnostic: chat networks
//! live behind [`messaging::port::MessagingPort`] in adapter crates.

pub mod config;
pub mod dice;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod expr;
pub mod handlers;
pub mod logging;
pub mod messaging;
pub mod registry;
pub mod security;
pub mod store;
pub mod utils;

pub use errors::{Error, Result};
