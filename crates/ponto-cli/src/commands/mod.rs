//! Command handlers

pub mod auth;
pub mod clock;
pub mod config;
pub mod proxy;
pub mod queue;
pub mod status;
pub mod sync;
pub mod watch;
