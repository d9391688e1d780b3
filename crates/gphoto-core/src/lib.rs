//! Core gphoto library (OAuth session, picker protocol, media fetch and preview).

pub mod auth;
pub mod config;
pub mod error;
pub mod media;
pub mod picker;
pub mod wait;

pub use error::{Error, Result};
