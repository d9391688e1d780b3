//! Login/logout command handlers.

use anyhow::{Context, Result};
use gphoto_core::auth::{AuthFlowEngine, TokenStore, mask_token};
use tokio_util::sync::CancellationToken;

pub async fn login(
    engine: &mut AuthFlowEngine,
    store: &TokenStore,
    cancel: &CancellationToken,
) -> Result<()> {
    let credential = engine.acquire(cancel).await?;
    store
        .save(&credential)
        .with_context(|| format!("save credential to {}", store.path().display()))?;

    println!("✓ Logged in (token: {})", mask_token(&credential.access_token));
    println!("  Credential saved to: {}", store.path().display());
    Ok(())
}

pub fn logout(store: &TokenStore) -> Result<()> {
    if store.clear().context("remove saved credential")? {
        println!("✓ Logged out");
        println!("  Credential removed from: {}", store.path().display());
    } else {
        println!("Not logged in (no saved credential).");
    }
    Ok(())
}
