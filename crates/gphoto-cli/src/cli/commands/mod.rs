//! CLI command handlers.

pub mod auth;
pub mod config;
pub mod download;
pub mod picker;
pub mod setup;
pub mod view;
