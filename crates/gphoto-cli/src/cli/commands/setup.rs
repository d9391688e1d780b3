//! Interactive first-run configuration.

use anyhow::{Context, Result, bail};
use gphoto_core::auth::Console;
use gphoto_core::config::{self, AUTH_METHOD_OOB, AUTH_METHOD_SERVER, Config, OOB_REDIRECT_URI};

pub fn run() -> Result<()> {
    let mut console = Console::stdio();
    let config = prompt_config(&mut console)?;

    let config_path = config::paths::config_path();
    config
        .save_to(&config_path)
        .with_context(|| format!("save config to {}", config_path.display()))?;

    console.say("")?;
    console.say("✓ Setup complete")?;
    console.say(format!("  Config file: {}", config_path.display()))?;
    console.say("")?;
    console.say("Next: run `gphoto picker` to select photos.")?;
    Ok(())
}

fn prompt_config(console: &mut Console) -> Result<Config> {
    console.say("gphoto setup")?;
    console.say("============")?;
    console.say("")?;
    console.say("You need an OAuth 2.0 client from the Google Cloud Console:")?;
    console.say("1. Open https://console.cloud.google.com/ and pick a project")?;
    console.say("2. APIs & Services > Credentials > Create OAuth client ID")?;
    console.say("   - Application type: Desktop app")?;
    console.say(format!(
        "   - Authorized redirect URI: {}",
        config::DEFAULT_REDIRECT_URI
    ))?;
    console.say("3. Copy the client ID and client secret")?;
    console.say("")?;

    let google_client_id = required(console, "Google Client ID: ")?;
    let google_client_secret = required(console, "Google Client Secret: ")?;
    let mut config = Config {
        google_client_id,
        google_client_secret,
        ..Config::default()
    };

    console.say("")?;
    console.say("Sign-in method:")?;
    console.say("1. Automatic (recommended): local callback server")?;
    console.say("2. Manual: paste the authorization code")?;
    let choice = console
        .prompt("Choice (1 or 2) [1]: ")?
        .unwrap_or_default();

    match choice.trim() {
        "" | "1" => config.auth_method = AUTH_METHOD_SERVER.to_string(),
        "2" => {
            config.auth_method = AUTH_METHOD_OOB.to_string();
            config.google_redirect_uri = OOB_REDIRECT_URI.to_string();
        }
        other => {
            console.say(format!("Unknown choice '{other}', using automatic sign-in."))?;
            config.auth_method = AUTH_METHOD_SERVER.to_string();
        }
    }

    Ok(config)
}

fn required(console: &mut Console, prompt: &str) -> Result<String> {
    let Some(value) = console.prompt(prompt)? else {
        bail!("setup aborted: no input");
    };
    let value = value.trim();
    if value.is_empty() {
        bail!("{} is required", prompt.trim_end_matches([':', ' ']));
    }
    Ok(value.to_string())
}
