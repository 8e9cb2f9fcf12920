//! Poptato - client core for the Poptato to-do service
//!
//! Optimistic list state with snapshot rollback, single-flight session
//! refresh, and the REST gateway behind both. This library crate exposes the
//! modules for the command-line front end and integration tests.

pub mod config;
pub mod data;
pub mod integrations;
pub mod lists;
pub mod prefs;
pub mod session;
pub mod util;
