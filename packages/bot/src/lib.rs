//! WG-Gesucht flatshare application bot.
//!
//! Polls the offer search for new listings matching the configured
//! criteria, writes a personalized application message for each one
//! with Claude, sends it, and records the contact in a ledger so no
//! offer is messaged twice.

pub mod composer;
pub mod config;
pub mod ledger;
pub mod search;
pub mod session_store;

pub use config::Config;
