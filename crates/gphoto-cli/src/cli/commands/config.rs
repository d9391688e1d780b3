//! Config command handlers.

use std::fs;
use std::io;

use anyhow::{Context, Result};
use gphoto_core::auth::TokenStore;
use gphoto_core::config::{self, Config};

pub fn path() {
    println!("{}", config::paths::config_path().display());
}

pub fn show() -> Result<()> {
    let config_path = config::paths::config_path();
    let config = Config::load().context("load config")?;

    println!("Config file: {}", config_path.display());
    println!();
    println!("Google Client ID:     {}", display_secret(&config.google_client_id));
    println!("Google Client Secret: {}", display_secret(&config.google_client_secret));
    println!("Redirect URI:         {}", config.google_redirect_uri);
    println!("Auth method:          {}", config.auth_method);
    println!("OAuth scope:          {}", config.google_scope);

    if !config.is_configured() {
        println!();
        println!("Client credentials are missing. Run `gphoto setup` to configure them.");
    }
    Ok(())
}

fn display_secret(value: &str) -> String {
    if value.is_empty() {
        "(not set)".to_string()
    } else {
        config::mask_secret(value)
    }
}

pub fn reset(store: &TokenStore) -> Result<()> {
    let config_path = config::paths::config_path();
    match fs::remove_file(&config_path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("remove {}", config_path.display()));
        }
    }

    if let Err(err) = store.clear() {
        eprintln!("Warning: failed to remove saved credential: {err}");
    }

    println!("✓ Configuration reset");
    println!("  Run `gphoto setup` to configure again.");
    Ok(())
}
