use anyhow::Result;
use clap::Subcommand;
use whatson_sync::domain::Interest;
use whatson_sync::App;

use crate::output::{self, Format};

#[derive(Subcommand)]
pub enum Commands {
    /// Show the interests saved on this device
    Show,
    /// Replace the saved interests
    Set {
        #[arg(required = true, help = "Interest categories, e.g. \"Live Music\" Markets")]
        interests: Vec<Interest>,
    },
    /// Forget the saved interests
    Clear,
    /// List every interest category
    Available,
}

fn print_interests(interests: &[Interest], format: Format) {
    match format {
        Format::Json => output::print_json(interests),
        Format::Table if interests.is_empty() => println!("No interests selected"),
        Format::Table => {
            for interest in interests {
                println!("  {interest}");
            }
        }
    }
}

pub async fn run(cmd: Commands, app: &App, format: Format) -> Result<()> {
    let cache = app.cache();

    match cmd {
        Commands::Show => {
            print_interests(&cache.interests().await?, format);
        }
        Commands::Set { mut interests } => {
            interests.sort();
            interests.dedup();
            cache.store_interests(&interests).await?;
            output::print_success(&format!("Saved {} interests", interests.len()));
        }
        Commands::Clear => {
            cache.store_interests(&[]).await?;
            output::print_success("Interests cleared");
        }
        Commands::Available => print_interests(&Interest::ALL, format),
    }

    Ok(())
}
