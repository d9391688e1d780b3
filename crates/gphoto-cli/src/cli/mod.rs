//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gphoto_core::auth::{AuthFlowEngine, TokenStore};
use gphoto_core::config::Config;
use gphoto_core::media::{DEFAULT_WIDTH, ImageFetcher, MAX_WIDTH, MIN_WIDTH};
use gphoto_core::picker::PickerClient;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod commands;
mod interrupt;

#[derive(Parser)]
#[command(name = "gphoto")]
#[command(version)]
#[command(about = "Select, download and preview Google Photos from the terminal")]
struct Cli {
    /// Log debug output (HTTP bodies, auth steps) to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Configure Google OAuth client credentials interactively
    Setup,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Sign in to Google Photos (replaces any saved credential)
    Login,

    /// Remove the saved credential
    Logout,

    /// Select photos in the Google Photos Picker and list them
    Picker,

    /// Select photos and download them
    Download {
        /// Directory to save photos to (default: ~/gphoto-downloads)
        #[arg(short, long, value_name = "DIR", env = "GPHOTO_DOWNLOAD_DIR")]
        output: Option<PathBuf>,

        /// Download 800x600 thumbnails instead of originals
        #[arg(long)]
        thumbnail: bool,
    },

    /// Select photos and preview them as ASCII art
    View {
        /// Preview width in terminal columns
        #[arg(
            short,
            long,
            default_value_t = DEFAULT_WIDTH,
            value_parser = clap::value_parser!(u32).range(i64::from(MIN_WIDTH)..=i64::from(MAX_WIDTH))
        )]
        width: u32,

        /// Also open each photo in the system image viewer
        #[arg(long)]
        open: bool,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the current configuration (secrets masked)
    Show,
    /// Show the path to the config file
    Path,
    /// Delete the config file and the saved credential
    Reset,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    let cancel = interrupt::install(&rt);

    rt.block_on(async move { dispatch(cli.command, &cancel).await })
}

fn init_tracing(verbose: bool) {
    let default_directives = if verbose {
        "warn,gphoto=debug,gphoto_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn dispatch(command: Commands, cancel: &CancellationToken) -> Result<()> {
    let store = TokenStore::default();

    match command {
        Commands::Setup => commands::setup::run(),
        Commands::Config { command } => match command {
            ConfigCommands::Show => commands::config::show(),
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Reset => commands::config::reset(&store),
        },
        Commands::Login => {
            let mut engine = auth_engine()?;
            commands::auth::login(&mut engine, &store, cancel).await
        }
        Commands::Logout => commands::auth::logout(&store),
        Commands::Picker => {
            let mut engine = auth_engine()?;
            let credential = engine.authorize(&store, cancel).await?;
            let picker = PickerClient::new(&credential.access_token);
            commands::picker::run(&picker, cancel).await
        }
        Commands::Download { output, thumbnail } => {
            let mut engine = auth_engine()?;
            let credential = engine.authorize(&store, cancel).await?;
            let picker = PickerClient::new(&credential.access_token);
            let fetcher = ImageFetcher::new(&credential.access_token);
            let options = commands::download::DownloadOptions {
                output_dir: output
                    .unwrap_or_else(gphoto_core::config::paths::default_download_dir),
                thumbnail,
            };
            commands::download::run(&picker, &fetcher, &options, cancel).await
        }
        Commands::View { width, open } => {
            let mut engine = auth_engine()?;
            let credential = engine.authorize(&store, cancel).await?;
            let picker = PickerClient::new(&credential.access_token);
            let fetcher = ImageFetcher::new(&credential.access_token);
            commands::view::run(&picker, &fetcher, width, open, cancel).await
        }
    }
}

/// Builds the auth engine from the loaded config, failing early if unconfigured.
fn auth_engine() -> Result<AuthFlowEngine> {
    let config = Config::load().context("load config")?;
    let auth_config = config.auth_config()?;
    Ok(AuthFlowEngine::new(auth_config))
}
