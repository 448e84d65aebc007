//! Local session plumbing for a mobile client shell.
//!
//! - [`cache`]: two-tier key-value cache (memory in front of SQLite) holding
//!   the session, profile and entitlement snapshots and the offline queue
//! - [`auth`]: deep-link callback parsing and the session bootstrap state machine

pub mod auth;
pub mod cache;
pub mod config;
pub mod logging;
