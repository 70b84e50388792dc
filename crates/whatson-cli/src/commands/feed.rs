use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::Args;
use tracing::info;
use whatson_sync::domain::Interest;
use whatson_sync::error::AppError;
use whatson_sync::feed::{matching_interests, on_day, upcoming};
use whatson_sync::sync::{attach_business_names, CombinedFeed};
use whatson_sync::App;

use super::event::EventRow;
use crate::output::{self, Format};

#[derive(Args)]
pub struct FeedArgs {
    #[arg(long = "interest", help = "Only these interest categories, repeatable")]
    interests: Vec<Interest>,
    #[arg(long, help = "Use the interests saved on this device")]
    mine: bool,
    #[arg(long, help = "Only events on this day (YYYY-MM-DD)")]
    day: Option<NaiveDate>,
    #[arg(long, help = "Include events that already started")]
    all: bool,
    #[arg(long, help = "Show the last cached feed without going online")]
    cached: bool,
}

/// Fresh feed, falling back to the cached snapshot when the store is down.
async fn load(app: &App, cached_only: bool) -> Result<CombinedFeed> {
    let sync = app.synchronizer();
    if cached_only {
        return Ok(sync.cached_combined().await?);
    }
    match sync.load_combined().await {
        Ok(feed) => Ok(feed),
        Err(e @ AppError::RemoteUnavailable(_)) => {
            output::print_notice(&format!("{} Showing saved events.", e.user_message()));
            Ok(sync.cached_combined().await?)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn run(args: FeedArgs, app: &App, format: Format) -> Result<()> {
    let feed = load(app, args.cached).await?;

    let interests = if args.interests.is_empty() && args.mine {
        app.cache().interests().await?
    } else {
        args.interests
    };

    let mut events = if args.all {
        feed.events
    } else {
        upcoming(&feed.events, Utc::now())
    };
    events = matching_interests(&events, &interests);
    if let Some(day) = args.day {
        events = on_day(&events, day);
    }

    output::print_items::<_, EventRow>(&events, format);
    Ok(())
}

/// Keeps polling and prints the upcoming events whenever new ones appear.
pub async fn watch(app: &App, format: Format) -> Result<()> {
    let sync = app.synchronizer();
    let feed = sync.load_combined().await?;
    let interval = sync.options().interval;

    output::print_success(&format!(
        "Watching {} events, checking every {}s (Ctrl+C to stop)",
        feed.events.len(),
        interval.as_secs()
    ));

    let businesses = feed.businesses;
    let handle = sync.start_polling(move |events| {
        let joined = attach_business_names(events, &businesses);
        let fresh = upcoming(&joined, Utc::now());
        output::print_success(&format!("New events! {} upcoming", fresh.len()));
        output::print_items::<_, EventRow>(&fresh, format);
    });

    tokio::signal::ctrl_c().await?;
    info!("stopping watch");
    handle.cancel();
    sync.stop_polling();
    Ok(())
}
