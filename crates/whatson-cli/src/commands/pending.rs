use anyhow::Result;
use clap::Subcommand;
use whatson_sync::domain::Media;
use whatson_sync::error::AppError;
use whatson_sync::App;

use super::event::EventRow;
use super::signed_in_code;
use crate::output::{self, Format};

#[derive(Subcommand)]
pub enum Commands {
    /// List events of the signed-in business still waiting on video processing
    List,
    /// Publish a pending event with its processed video
    Promote {
        #[arg(help = "Pending event ID")]
        id: String,
        #[arg(long, help = "URL of the processed video")]
        video_url: String,
    },
    /// Discard a pending event and its uploaded video
    Delete {
        #[arg(help = "Pending event ID")]
        id: String,
    },
}

pub async fn run(cmd: Commands, app: &App, format: Format) -> Result<()> {
    let store = app.store();
    let code = signed_in_code(app).await?;

    match cmd {
        Commands::List => {
            let pending = store.fetch_pending_events_for_business(&code).await?;
            output::print_items::<_, EventRow>(&pending, format);
        }
        Commands::Promote { id, video_url } => {
            if !store.promote_pending_event(&id, &video_url).await? {
                return Err(AppError::NotFound(format!("Pending event {id}")).into());
            }
            output::print_success("Event published");
        }
        Commands::Delete { id } => {
            let event = store
                .fetch_pending_events_for_business(&code)
                .await?
                .into_iter()
                .find(|e| e.id == id)
                .ok_or_else(|| AppError::NotFound(format!("Pending event {id}")))?;

            if let Some(Media::Video(url)) = &event.media {
                store.delete_video_blobs(url).await;
            }
            store.delete_pending_event(&id).await?;
            output::print_success("Pending event discarded");
        }
    }

    Ok(())
}
