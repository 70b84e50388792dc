mod commands;
mod config;
mod output;

use std::collections::HashMap;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{business, event, feed, interests, pending};
use whatson_sync::{telemetry, App};

#[derive(Parser)]
#[command(name = "whatson")]
#[command(about = "What's On CLI - browse local events and manage business listings")]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "Firebase project ID")]
    project: Option<String>,

    #[arg(long, global = true, help = "Firebase web API key")]
    api_key: Option<String>,

    #[arg(long, global = true, help = "Output format", default_value = "table")]
    format: output::Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure CLI settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Sign in as a business with its access code
    Login {
        #[arg(help = "Business access code")]
        code: String,
    },
    /// Sign out of the business account
    Logout,
    /// Browse and manage businesses
    Business {
        #[command(subcommand)]
        command: business::Commands,
    },
    /// Browse and manage events
    Event {
        #[command(subcommand)]
        command: event::Commands,
    },
    /// Manage events waiting on video processing
    Pending {
        #[command(subcommand)]
        command: pending::Commands,
    },
    /// Show the upcoming events feed
    Feed(feed::FeedArgs),
    /// Poll for new events until interrupted
    Watch,
    /// Manage the interests saved on this device
    Interests {
        #[command(subcommand)]
        command: interests::Commands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set configuration values
    Set {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        storage_bucket: Option<String>,
        #[arg(long, value_delimiter = ',', help = "Comma-separated access codes")]
        business_codes: Option<Vec<String>>,
        #[arg(long)]
        poll_interval_secs: Option<u64>,
    },
    /// Show current configuration
    Show,
    /// Get config file path
    Path,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let result = run(cli).await;
    telemetry::shutdown();

    if let Err(e) = result {
        output::print_error(&e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut file = config::FileConfig::load()?;
    if let Commands::Config { command } = cli.command {
        return configure(command, &mut file);
    }

    let mut overrides = HashMap::new();
    if let Some(project) = cli.project {
        overrides.insert("FIREBASE_PROJECT_ID", project);
    }
    if let Some(api_key) = cli.api_key {
        overrides.insert("FIREBASE_API_KEY", api_key);
    }
    let cfg = file.resolve(&overrides)?;

    telemetry::init(&cfg)?;
    let app = App::new(cfg).await?;

    match cli.command {
        Commands::Config { .. } => {}
        Commands::Login { code } => {
            let code = app.admin().login(&code).await?;
            output::print_success(&format!("Signed in as {code}"));
        }
        Commands::Logout => {
            app.admin().logout().await?;
            output::print_success("Signed out");
        }
        Commands::Business { command } => {
            business::run(command, &app, cli.format).await?;
        }
        Commands::Event { command } => {
            event::run(command, &app, cli.format).await?;
        }
        Commands::Pending { command } => {
            pending::run(command, &app, cli.format).await?;
        }
        Commands::Feed(args) => {
            feed::run(args, &app, cli.format).await?;
        }
        Commands::Watch => {
            feed::watch(&app, cli.format).await?;
        }
        Commands::Interests { command } => {
            interests::run(command, &app, cli.format).await?;
        }
    }

    Ok(())
}

fn configure(command: ConfigCommands, file: &mut config::FileConfig) -> Result<()> {
    match command {
        ConfigCommands::Set {
            project,
            api_key,
            storage_bucket,
            business_codes,
            poll_interval_secs,
        } => {
            if let Some(p) = project {
                file.project_id = Some(p);
            }
            if let Some(k) = api_key {
                file.api_key = Some(k);
            }
            if let Some(b) = storage_bucket {
                file.storage_bucket = Some(b);
            }
            if let Some(codes) = business_codes {
                file.business_codes = codes.into_iter().map(|c| c.trim().to_string()).collect();
            }
            if let Some(secs) = poll_interval_secs {
                file.poll_interval_secs = Some(secs);
            }
            file.save()?;
            output::print_success("Configuration saved");
        }
        ConfigCommands::Show => {
            let unset = || "(not set)".to_string();
            println!("Project: {}", file.project_id.clone().unwrap_or_else(unset));
            println!(
                "API Key: {}",
                file.api_key
                    .as_ref()
                    .map(|k| format!("{}...", &k[..12.min(k.len())]))
                    .unwrap_or_else(unset)
            );
            println!(
                "Storage bucket: {}",
                file.storage_bucket.clone().unwrap_or_else(unset)
            );
            println!("Business codes: {}", file.business_codes.len());
            println!(
                "Poll interval: {}",
                file.poll_interval_secs
                    .map(|s| format!("{s}s"))
                    .unwrap_or_else(unset)
            );
        }
        ConfigCommands::Path => {
            println!("{}", config::config_path()?.display());
        }
    }
    Ok(())
}
